//! Application state shared across request handlers.

use registrar_storage::MemoryApprovalService;

pub(crate) struct AppState {
    /// Records served, persisted to the data file on every update.
    pub(crate) service: MemoryApprovalService,
    /// Optional API key for authentication. None = no auth required.
    pub(crate) api_key: Option<String>,
}
