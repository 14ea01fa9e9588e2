mod commands;
mod config;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use registrar_core::{ProcessedStatus, StageKey};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::commands::CliError;
use crate::config::{ConfigFile, Overrides, Settings};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Multi-tier approval workflow for academic-metrics records.
#[derive(Parser)]
#[command(
    name = "registrar",
    version,
    about = "Multi-tier approval workflow for academic-metrics records"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Config file (default: ./registrar.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the academic-metrics data service
    #[arg(long, global = true)]
    service_url: Option<String>,

    /// Local JSON data file used instead of a data service
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Refuse every approval action (degraded connectivity)
    #[arg(long, global = true)]
    read_only: bool,

    /// Role held by the acting officer; repeatable
    #[arg(long = "role", global = true)]
    roles: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the approval chain
    Stages,

    /// List records awaiting your stage's approval
    Pending {
        /// Maximum records to show (0 = all)
        #[arg(long, default_value_t = 0)]
        limit: usize,
        /// Stage to view as (default: the first stage your roles hold)
        #[arg(long = "as", value_name = "STAGE")]
        as_stage: Option<StageKey>,
    },

    /// List records your stage has approved, flagged or responded to
    Processed {
        /// approved, flagged, responded or all
        #[arg(long, default_value = "all")]
        status: ProcessedStatus,
        /// Maximum records to show (0 = all)
        #[arg(long, default_value_t = 0)]
        limit: usize,
        #[arg(long = "as", value_name = "STAGE")]
        as_stage: Option<StageKey>,
    },

    /// Approve a record at your stage
    Approve {
        /// Metrics id of the record
        id: String,
        #[arg(long = "as", value_name = "STAGE")]
        as_stage: Option<StageKey>,
    },

    /// Flag a stage of a record with a note
    Flag {
        id: String,
        /// Stage to flag (ceo, hod or dean)
        #[arg(long)]
        stage: StageKey,
        #[arg(long)]
        note: String,
        #[arg(long = "as", value_name = "STAGE")]
        as_stage: Option<StageKey>,
    },

    /// Resolve a flagged stage with a response
    Resolve {
        id: String,
        /// Flagged stage to resolve
        #[arg(long)]
        stage: StageKey,
        #[arg(long)]
        response: String,
        #[arg(long = "as", value_name = "STAGE")]
        as_stage: Option<StageKey>,
    },

    /// Withdraw your stage's approval
    Unapprove {
        id: String,
        /// Optional note recorded with the withdrawal
        #[arg(long)]
        note: Option<String>,
        #[arg(long = "as", value_name = "STAGE")]
        as_stage: Option<StageKey>,
    },

    /// Serve a data file as a mock academic-metrics service
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = cli.output;
    let quiet = cli.quiet;
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(
                &format!("error: failed to start async runtime: {e}"),
                output,
                quiet,
            );
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        report_failure(&e, output, quiet);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let output = cli.output;
    let quiet = cli.quiet;
    let overrides = Overrides {
        service_url: cli.service_url,
        data: cli.data,
        read_only: cli.read_only,
        roles: cli.roles,
    };
    let config = cli.config;

    match cli.command {
        Commands::Stages => {
            commands::cmd_stages(output, quiet);
            Ok(())
        }
        Commands::Pending { limit, as_stage } => {
            let engine = connect(config, &overrides).await?;
            commands::cmd_pending(&engine, as_stage, limit, output, quiet).await
        }
        Commands::Processed {
            status,
            limit,
            as_stage,
        } => {
            let engine = connect(config, &overrides).await?;
            commands::cmd_processed(&engine, as_stage, status, limit, output, quiet).await
        }
        Commands::Approve { id, as_stage } => {
            let engine = connect(config, &overrides).await?;
            commands::cmd_approve(&engine, &id, as_stage, output, quiet).await
        }
        Commands::Flag {
            id,
            stage,
            note,
            as_stage,
        } => {
            let engine = connect(config, &overrides).await?;
            commands::cmd_flag(&engine, &id, stage, &note, as_stage, output, quiet).await
        }
        Commands::Resolve {
            id,
            stage,
            response,
            as_stage,
        } => {
            let engine = connect(config, &overrides).await?;
            commands::cmd_resolve(&engine, &id, stage, &response, as_stage, output, quiet).await
        }
        Commands::Unapprove { id, note, as_stage } => {
            let engine = connect(config, &overrides).await?;
            commands::cmd_unapprove(&engine, &id, note.as_deref(), as_stage, output, quiet).await
        }
        Commands::Serve { port, host } => {
            let file = ConfigFile::load(config.as_deref())?;
            let data = overrides
                .data
                .or_else(|| {
                    std::env::var("REGISTRAR_DATA_FILE")
                        .ok()
                        .filter(|v| !v.trim().is_empty())
                        .map(PathBuf::from)
                })
                .or(file.service.data_file)
                .ok_or_else(|| CliError::Usage("serve needs a data file (--data FILE)".into()))?;
            serve::start_server(&host, port, data)
                .await
                .map_err(|e| CliError::Server(e.to_string()))
        }
    }
}

async fn connect(
    config: Option<PathBuf>,
    overrides: &Overrides,
) -> Result<registrar_engine::ApprovalEngine, CliError> {
    let file = ConfigFile::load(config.as_deref())?;
    let settings = Settings::resolve(file, overrides, |name| std::env::var(name).ok())?;
    Ok(settings.engine().await?)
}

/// Install the stderr log subscriber. `-v` flags win over `REGISTRAR_LOG`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => std::env::var("REGISTRAR_LOG")
            .ok()
            .and_then(|v| v.parse::<Level>().ok())
            .unwrap_or(Level::WARN),
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Report an error message to stderr in the appropriate format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
    }
}

fn report_failure(error: &CliError, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Text => report_error(&format!("error: {}", error.message()), output, quiet),
        OutputFormat::Json if !quiet => eprintln!(
            "{}",
            serde_json::json!({ "error": error.message(), "kind": error.kind() })
        ),
        OutputFormat::Json => {}
    }
}
