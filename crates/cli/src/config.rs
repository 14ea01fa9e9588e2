//! `registrar.toml` loading and settings resolution.
//!
//! Precedence, highest first: command-line flags, environment
//! (`REGISTRAR_SERVICE_URL`, `REGISTRAR_DATA_FILE`, `REGISTRAR_AUTH_TOKEN`,
//! `REGISTRAR_READ_ONLY`), the config file, built-in defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use registrar_core::{Actor, OfficerProfile, Registry, Role};
use registrar_engine::{ApprovalEngine, HttpApprovalService, StaticSession, DEFAULT_TIMEOUT};
use registrar_storage::{ApprovalService, MemoryApprovalService, ServiceError};
use serde::Deserialize;

/// Config file read from the working directory when `--config` is absent.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "registrar.toml";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value '{value}' for {name}")]
    InvalidValue { name: &'static str, value: String },

    #[error("{0}")]
    Role(#[from] registrar_core::RegistryError),

    #[error("{origin} sets both a service URL and a data file; choose one")]
    ConflictingBackends { origin: &'static str },

    #[error("no data service configured (use --service-url, --data or registrar.toml)")]
    NoBackend,

    #[error(transparent)]
    Service(#[from] ServiceError),
}

// ──────────────────────────────────────────────
// File format
// ──────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConfigFile {
    #[serde(default)]
    pub(crate) service: ServiceSection,
    #[serde(default)]
    pub(crate) officer: OfficerSection,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ServiceSection {
    pub(crate) base_url: Option<String>,
    pub(crate) data_file: Option<PathBuf>,
    pub(crate) auth_token: Option<String>,
    pub(crate) timeout_secs: Option<u64>,
    pub(crate) read_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OfficerSection {
    #[serde(default)]
    pub(crate) roles: Vec<String>,
    #[serde(flatten)]
    pub(crate) profile: OfficerProfile,
}

impl ConfigFile {
    pub(crate) fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load `explicit`, or `registrar.toml` if it exists, or nothing.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(ConfigFile::default());
                }
                default
            }
        };
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&content, &path)
    }
}

// ──────────────────────────────────────────────
// Resolution
// ──────────────────────────────────────────────

/// Values given on the command line.
#[derive(Debug, Default)]
pub(crate) struct Overrides {
    pub(crate) service_url: Option<String>,
    pub(crate) data: Option<PathBuf>,
    pub(crate) read_only: bool,
    pub(crate) roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Backend {
    Http {
        base_url: String,
        auth_token: Option<String>,
    },
    DataFile(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Settings {
    pub(crate) backend: Backend,
    pub(crate) timeout: Duration,
    pub(crate) read_only: bool,
    pub(crate) actor: Actor,
}

impl Settings {
    /// Merge the layers. `env` looks up one environment variable.
    pub(crate) fn resolve(
        file: ConfigFile,
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env_url = env("REGISTRAR_SERVICE_URL").filter(|v| !v.trim().is_empty());
        let env_data = env("REGISTRAR_DATA_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let layers = [
            ("the command line", overrides.service_url.clone(), overrides.data.clone()),
            ("the environment", env_url, env_data),
            ("the config file", file.service.base_url.clone(), file.service.data_file.clone()),
        ];
        let mut backend = None;
        for (origin, url, data) in layers {
            backend = match (url, data) {
                (Some(_), Some(_)) => return Err(ConfigError::ConflictingBackends { origin }),
                (Some(base_url), None) => Some(Backend::Http {
                    base_url,
                    auth_token: None,
                }),
                (None, Some(path)) => Some(Backend::DataFile(path)),
                (None, None) => continue,
            };
            break;
        }
        let mut backend = backend.ok_or(ConfigError::NoBackend)?;
        if let Backend::Http { auth_token, .. } = &mut backend {
            *auth_token = env("REGISTRAR_AUTH_TOKEN")
                .filter(|v| !v.is_empty())
                .or(file.service.auth_token.clone());
        }

        let read_only = if overrides.read_only {
            true
        } else if let Some(value) = env("REGISTRAR_READ_ONLY") {
            parse_flag("REGISTRAR_READ_ONLY", &value)?
        } else {
            file.service.read_only.unwrap_or(false)
        };

        let timeout = file
            .service
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        let role_names = if overrides.roles.is_empty() {
            &file.officer.roles
        } else {
            &overrides.roles
        };
        let roles = role_names
            .iter()
            .map(|r| r.parse::<Role>())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Settings {
            backend,
            timeout,
            read_only,
            actor: Actor::new(roles, file.officer.profile),
        })
    }

    pub(crate) async fn connect_service(&self) -> Result<Arc<dyn ApprovalService>, ConfigError> {
        let service: Arc<dyn ApprovalService> = match &self.backend {
            Backend::Http {
                base_url,
                auth_token,
            } => Arc::new(HttpApprovalService::new(
                base_url,
                auth_token.clone(),
                self.timeout,
            )),
            Backend::DataFile(path) => Arc::new(MemoryApprovalService::open(path).await?),
        };
        Ok(service)
    }

    /// Build an engine over the configured service and a fixed session.
    pub(crate) async fn engine(&self) -> Result<ApprovalEngine, ConfigError> {
        let service = self.connect_service().await?;
        tracing::debug!(backend = ?self.backend, read_only = self.read_only, "connected");
        let session = Arc::new(StaticSession::new(self.actor.clone(), self.read_only));
        Ok(ApprovalEngine::new(Registry::standard(), service, session))
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
[service]
base_url = "http://localhost:8080"
auth_token = "file-token"
timeout_secs = 5
read_only = true

[officer]
roles = ["hod"]
title = "Dr"
surname = "Okafor"
firstname = "Ada"
department = "Computer Science"
college = "Physical Sciences"
"#;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn sample() -> ConfigFile {
        ConfigFile::parse(SAMPLE, Path::new("registrar.toml")).unwrap()
    }

    #[test]
    fn file_values_apply_without_overrides() {
        let settings = Settings::resolve(sample(), &Overrides::default(), env(&[])).unwrap();
        assert_eq!(
            settings.backend,
            Backend::Http {
                base_url: "http://localhost:8080".into(),
                auth_token: Some("file-token".into()),
            }
        );
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert!(settings.read_only);
        assert_eq!(settings.actor.roles, vec![Role::Hod]);
        assert_eq!(settings.actor.profile.surname, "Okafor");
        assert!(settings.actor.profile.middlename.is_empty());
    }

    #[test]
    fn environment_beats_file_and_flags_beat_environment() {
        let vars = env(&[
            ("REGISTRAR_DATA_FILE", "env.json"),
            ("REGISTRAR_READ_ONLY", "false"),
        ]);
        let settings = Settings::resolve(sample(), &Overrides::default(), &vars).unwrap();
        assert_eq!(settings.backend, Backend::DataFile("env.json".into()));
        assert!(!settings.read_only);

        let overrides = Overrides {
            service_url: Some("http://cli:9000".into()),
            read_only: true,
            roles: vec!["dean".into()],
            ..Default::default()
        };
        let settings = Settings::resolve(sample(), &overrides, &vars).unwrap();
        assert_eq!(
            settings.backend,
            Backend::Http {
                base_url: "http://cli:9000".into(),
                auth_token: Some("file-token".into()),
            }
        );
        assert!(settings.read_only);
        assert_eq!(settings.actor.roles, vec![Role::Dean]);
    }

    #[test]
    fn env_token_overrides_file_token() {
        let settings = Settings::resolve(
            sample(),
            &Overrides::default(),
            env(&[("REGISTRAR_AUTH_TOKEN", "env-token")]),
        )
        .unwrap();
        assert!(matches!(
            settings.backend,
            Backend::Http { auth_token: Some(ref t), .. } if t == "env-token"
        ));
    }

    #[test]
    fn defaults_without_file() {
        let overrides = Overrides {
            data: Some("records.json".into()),
            roles: vec!["ceo".into()],
            ..Default::default()
        };
        let settings = Settings::resolve(ConfigFile::default(), &overrides, env(&[])).unwrap();
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
        assert!(!settings.read_only);
        assert_eq!(settings.actor.roles, vec![Role::ExamOfficer]);
    }

    #[test]
    fn missing_backend_is_an_error() {
        let result = Settings::resolve(ConfigFile::default(), &Overrides::default(), env(&[]));
        assert!(matches!(result, Err(ConfigError::NoBackend)));
    }

    #[test]
    fn both_backends_in_one_layer_conflict() {
        let overrides = Overrides {
            service_url: Some("http://a".into()),
            data: Some("b.json".into()),
            ..Default::default()
        };
        let result = Settings::resolve(ConfigFile::default(), &overrides, env(&[]));
        assert!(matches!(
            result,
            Err(ConfigError::ConflictingBackends { origin: "the command line" })
        ));
    }

    #[test]
    fn bad_role_and_bad_flag_are_reported() {
        let overrides = Overrides {
            data: Some("r.json".into()),
            roles: vec!["registrar".into()],
            ..Default::default()
        };
        let err = Settings::resolve(ConfigFile::default(), &overrides, env(&[])).unwrap_err();
        assert!(err.to_string().contains("registrar"));

        let overrides = Overrides {
            data: Some("r.json".into()),
            ..Default::default()
        };
        let err = Settings::resolve(
            ConfigFile::default(),
            &overrides,
            env(&[("REGISTRAR_READ_ONLY", "maybe")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "REGISTRAR_READ_ONLY", .. }));
    }

    #[test]
    fn malformed_file_names_the_path() {
        let err = ConfigFile::parse("[service\nbase_url=", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
