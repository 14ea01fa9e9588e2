//! registrar-storage: the data service seam of the approval engine.
//!
//! Defines the [`ApprovalService`] trait, its wire record types, the
//! [`ServiceError`] type, an in-memory implementation and a conformance
//! suite any implementation can run.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::{ServiceError, GENERIC_UPDATE_FAILURE};
pub use memory::MemoryApprovalService;
pub use record::{Page, UpdatedMetrics};
pub use traits::ApprovalService;
