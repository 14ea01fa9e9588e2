use std::sync::Arc;

use async_trait::async_trait;
use registrar_core::{ApprovalFields, ProcessedStatus, Role};

use crate::error::ServiceError;
use crate::record::{Page, UpdatedMetrics};

/// The academic-metrics data service the approval engine talks to.
///
/// ## Listings
///
/// `fetch_pending` returns records whose entry for the role's stage is not
/// approved; `fetch_processed` returns records the stage has acted on,
/// filtered by status facet. Both order by most recent approval activity
/// first and cap at `limit` (0 means no cap), with `total` counted before
/// the cap. A role with no approval stage is rejected.
///
/// ## Updates
///
/// `update_approval` applies a flat map of stage-prefixed fields to one
/// record atomically: either every field lands or none does. The service
/// stamps timestamps itself and may refuse an update that conflicts with
/// the record's current state (`ServiceError::Rejected`).
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be shared between the
/// engine, axum application state and spawned tasks.
#[async_trait]
pub trait ApprovalService: Send + Sync + 'static {
    async fn fetch_pending(&self, role: Role, limit: usize) -> Result<Page, ServiceError>;

    async fn fetch_processed(
        &self,
        role: Role,
        status: ProcessedStatus,
        limit: usize,
    ) -> Result<Page, ServiceError>;

    async fn update_approval(
        &self,
        metrics_id: &str,
        fields: &ApprovalFields,
    ) -> Result<UpdatedMetrics, ServiceError>;
}

#[async_trait]
impl<T: ApprovalService + ?Sized> ApprovalService for Arc<T> {
    async fn fetch_pending(&self, role: Role, limit: usize) -> Result<Page, ServiceError> {
        (**self).fetch_pending(role, limit).await
    }

    async fn fetch_processed(
        &self,
        role: Role,
        status: ProcessedStatus,
        limit: usize,
    ) -> Result<Page, ServiceError> {
        (**self).fetch_processed(role, status, limit).await
    }

    async fn update_approval(
        &self,
        metrics_id: &str,
        fields: &ApprovalFields,
    ) -> Result<UpdatedMetrics, ServiceError> {
        (**self).update_approval(metrics_id, fields).await
    }
}
