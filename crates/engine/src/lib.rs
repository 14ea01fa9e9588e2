//! registrar-engine: runs approval actions against a data service and keeps
//! the session's cached listings consistent with the service's answers.
//!
//! - [`ApprovalEngine`] -- gating, transition, service call, reconciliation
//! - [`RecordStore`] -- per-session cache of pending and processed listings
//! - [`reconcile()`] -- applies an authoritative update back into the cache
//! - [`HttpApprovalService`] -- `ApprovalService` over HTTP
//! - [`StaticSession`] -- fixed identity and connectivity mode

pub mod engine;
pub mod error;
pub mod http;
pub mod reconcile;
pub mod session;
pub mod store;

pub use engine::{ApprovalEngine, SubmitRequest, Submission};
pub use error::{EngineError, ErrorKind};
pub use http::{HttpApprovalService, DEFAULT_TIMEOUT};
pub use reconcile::{merge_updated, reconcile, Reconciliation, ViewScope};
pub use session::{SessionProvider, StaticSession};
pub use store::{CachedPage, QueryKey, RecordCache, RecordStore};
