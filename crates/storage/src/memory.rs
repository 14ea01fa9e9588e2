//! In-memory `ApprovalService`, optionally backed by a JSON data file.
//!
//! Used as the local data backend of the CLI, as the store behind the mock
//! HTTP service, and as a test double for the engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use registrar_core::{
    is_pending_for, matches_status, sort_by_activity, ApprovalFields, ApprovalRecord,
    ApprovalUpdate, ProcessedStatus, Registry, Role, StageKey,
};
use tokio::sync::{Mutex, RwLock};

use crate::error::ServiceError;
use crate::record::{Page, UpdatedMetrics};
use crate::traits::ApprovalService;

pub struct MemoryApprovalService {
    registry: Registry,
    records: RwLock<BTreeMap<String, ApprovalRecord>>,
    data_file: Option<PathBuf>,
    update_calls: AtomicUsize,
    fail_next: Mutex<Option<ServiceError>>,
}

impl Default for MemoryApprovalService {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MemoryApprovalService {
    pub fn new(records: Vec<ApprovalRecord>) -> Self {
        Self::with_registry(Registry::standard(), records)
    }

    pub fn with_registry(registry: Registry, records: Vec<ApprovalRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|r| (r.metrics_id.clone(), r))
            .collect();
        MemoryApprovalService {
            registry,
            records: RwLock::new(records),
            data_file: None,
            update_calls: AtomicUsize::new(0),
            fail_next: Mutex::new(None),
        }
    }

    /// Load records from a JSON array file. Successful updates are written
    /// back to the same file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServiceError::Backend(format!("failed to read {}: {e}", path.display())))?;
        let records: Vec<ApprovalRecord> = serde_json::from_str(&content).map_err(|e| {
            ServiceError::Backend(format!("invalid data file {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), records = records.len(), "loaded data file");

        let mut service = Self::new(records);
        service.data_file = Some(path.to_path_buf());
        Ok(service)
    }

    /// Snapshot of every record, in metrics id order.
    pub async fn records(&self) -> Vec<ApprovalRecord> {
        self.records.read().await.values().cloned().collect()
    }

    pub async fn record(&self, metrics_id: &str) -> Option<ApprovalRecord> {
        self.records.read().await.get(metrics_id).cloned()
    }

    /// Number of `update_approval` calls received, including failed ones.
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Make the next `update_approval` call fail with `error` without
    /// touching any record.
    pub async fn fail_next_update(&self, error: ServiceError) {
        *self.fail_next.lock().await = Some(error);
    }

    fn stage_for(&self, role: Role) -> Result<StageKey, ServiceError> {
        self.registry
            .stage_for(role)
            .map(|s| s.key)
            .ok_or_else(|| ServiceError::rejected(format!("role '{role}' has no approval stage")))
    }

    async fn listing<P>(&self, limit: usize, keep: P) -> Page
    where
        P: Fn(&ApprovalRecord) -> bool,
    {
        let mut items: Vec<ApprovalRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| keep(r))
            .cloned()
            .collect();
        sort_by_activity(&mut items);
        Page::capped(items, limit)
    }

    fn check_conflicts(
        &self,
        record: &ApprovalRecord,
        update: &ApprovalUpdate,
    ) -> Result<(), ServiceError> {
        let stage = update.stage;
        if update.approved == Some(true) {
            if record.is_approved_by(stage) {
                return Err(ServiceError::rejected(format!(
                    "Record has already been approved at the {stage} stage"
                )));
            }
            if let Some(flagged) = record.primary_flag(&self.registry) {
                return Err(ServiceError::rejected(format!(
                    "Record is flagged at the {flagged} stage; resolve the flag before approving"
                )));
            }
        }
        if update.response.is_some() && !record.is_flagged_at(stage) {
            return Err(ServiceError::rejected(format!(
                "The {stage} stage has no flag to resolve"
            )));
        }
        Ok(())
    }

    async fn persist(&self, records: &BTreeMap<String, ApprovalRecord>) -> Result<(), ServiceError> {
        let Some(path) = &self.data_file else {
            return Ok(());
        };
        let all: Vec<&ApprovalRecord> = records.values().collect();
        let json = serde_json::to_string_pretty(&all)
            .map_err(|e| ServiceError::Backend(format!("failed to serialize records: {e}")))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| ServiceError::Backend(format!("failed to write {}: {e}", path.display())))
    }
}

#[async_trait]
impl ApprovalService for MemoryApprovalService {
    async fn fetch_pending(&self, role: Role, limit: usize) -> Result<Page, ServiceError> {
        let stage = self.stage_for(role)?;
        Ok(self.listing(limit, |r| is_pending_for(r, stage)).await)
    }

    async fn fetch_processed(
        &self,
        role: Role,
        status: ProcessedStatus,
        limit: usize,
    ) -> Result<Page, ServiceError> {
        let stage = self.stage_for(role)?;
        Ok(self
            .listing(limit, |r| matches_status(r, stage, status))
            .await)
    }

    async fn update_approval(
        &self,
        metrics_id: &str,
        fields: &ApprovalFields,
    ) -> Result<UpdatedMetrics, ServiceError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.fail_next.lock().await.take() {
            return Err(error);
        }

        let update =
            ApprovalUpdate::from_fields(fields).map_err(|e| ServiceError::rejected(e.to_string()))?;

        let mut records = self.records.write().await;
        let current = records
            .get(metrics_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound {
                metrics_id: metrics_id.to_string(),
            })?;
        self.check_conflicts(&current, &update)?;

        let mut next = current.clone();
        update.apply(next.approvals.entry(update.stage).or_default(), &now_rfc3339());
        records.insert(metrics_id.to_string(), next.clone());

        if let Err(e) = self.persist(&records).await {
            records.insert(metrics_id.to_string(), current);
            return Err(e);
        }

        tracing::debug!(metrics_id, stage = %update.stage, "approval updated");
        Ok(UpdatedMetrics::from(&next))
    }
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}
