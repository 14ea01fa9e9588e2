//! The approval engine: gating, transition, service call, reconciliation.
//!
//! ```text
//! submit ─▶ GatingPolicy ─▶ transition() ─▶ ApprovalService::update_approval
//!                                               │
//!                                 reconcile() ◀─┘ (success only)
//! ```
//!
//! The service call and its reconciliation run on a spawned task, so a
//! caller that stops waiting (a closed dialog) does not cancel them.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use registrar_core::{
    transition, ActionKind, Actor, ApprovalAction, ApprovalRecord, GateContext, GatingPolicy,
    ProcessedStatus, Registry, Role, StageKey, Transition, TransitionError, TransitionRequest,
    Veto,
};
use registrar_storage::{ApprovalService, ServiceError, UpdatedMetrics};
use tokio::sync::RwLock;

use crate::error::EngineError;
use crate::reconcile::{reconcile, Reconciliation, ViewScope};
use crate::session::SessionProvider;
use crate::store::{CachedPage, QueryKey, RecordCache, RecordStore};

/// One requested action on one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub metrics_id: String,
    /// Stage the actor submits as.
    pub acting_stage: StageKey,
    /// Stage whose entry changes.
    pub target_stage: StageKey,
    pub action: ApprovalAction,
}

/// A completed submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub transition: Transition,
    /// The service's authoritative record state.
    pub updated: UpdatedMetrics,
    pub reconciliation: Reconciliation,
    /// Non-blocking notes, such as upstream stages that have not approved.
    pub advisories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InFlightKey {
    metrics_id: String,
    stage: StageKey,
    kind: ActionKind,
}

/// Holds an in-flight slot; releasing it on drop also covers a panicking
/// service call.
struct InFlightGuard<C> {
    inner: Arc<Inner<C>>,
    key: InFlightKey,
}

impl<C> InFlightGuard<C> {
    fn claim(inner: &Arc<Inner<C>>, key: InFlightKey) -> Option<Self> {
        let inserted = inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        inserted.then(|| InFlightGuard {
            inner: Arc::clone(inner),
            key,
        })
    }
}

impl<C> Drop for InFlightGuard<C> {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

struct Inner<C> {
    registry: Registry,
    service: Arc<dyn ApprovalService>,
    session: Arc<dyn SessionProvider>,
    cache: RwLock<C>,
    selected_status: RwLock<ProcessedStatus>,
    in_flight: Mutex<HashSet<InFlightKey>>,
}

pub struct ApprovalEngine<C = RecordStore> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for ApprovalEngine<C> {
    fn clone(&self) -> Self {
        ApprovalEngine {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ApprovalEngine<RecordStore> {
    pub fn new(
        registry: Registry,
        service: Arc<dyn ApprovalService>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self::with_cache(registry, service, session, RecordStore::new())
    }
}

impl<C: RecordCache> ApprovalEngine<C> {
    pub fn with_cache(
        registry: Registry,
        service: Arc<dyn ApprovalService>,
        session: Arc<dyn SessionProvider>,
        cache: C,
    ) -> Self {
        ApprovalEngine {
            inner: Arc::new(Inner {
                registry,
                service,
                session,
                cache: RwLock::new(cache),
                selected_status: RwLock::new(ProcessedStatus::default()),
                in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn actor(&self) -> Actor {
        self.inner.session.actor()
    }

    pub fn read_only(&self) -> bool {
        self.inner.session.read_only()
    }

    /// The stage the session acts as by default: the first one in chain
    /// order whose role the actor holds.
    pub fn default_stage(&self) -> Option<StageKey> {
        self.actor().own_stage(&self.inner.registry)
    }

    // ── Listings ─────────────────────────────────────────────────────────────

    pub async fn refresh_pending(&self, role: Role, limit: usize) -> Result<CachedPage, EngineError> {
        let page = self.inner.service.fetch_pending(role, limit).await?;
        tracing::debug!(%role, items = page.items.len(), total = page.total, "pending refreshed");
        let key = QueryKey::Pending(role);
        let mut cache = self.inner.cache.write().await;
        cache.put(key, page);
        Ok(cache.get(&key).cloned().unwrap_or_default())
    }

    /// Fetch a processed listing and make `status` the selected facet.
    pub async fn refresh_processed(
        &self,
        role: Role,
        status: ProcessedStatus,
        limit: usize,
    ) -> Result<CachedPage, EngineError> {
        let page = self
            .inner
            .service
            .fetch_processed(role, status, limit)
            .await?;
        tracing::debug!(%role, %status, items = page.items.len(), total = page.total, "processed refreshed");
        *self.inner.selected_status.write().await = status;
        let key = QueryKey::Processed(role, status);
        let mut cache = self.inner.cache.write().await;
        cache.put(key, page);
        Ok(cache.get(&key).cloned().unwrap_or_default())
    }

    pub async fn pending(&self, role: Role) -> Option<CachedPage> {
        self.inner
            .cache
            .read()
            .await
            .get(&QueryKey::Pending(role))
            .cloned()
    }

    pub async fn processed(&self, role: Role, status: ProcessedStatus) -> Option<CachedPage> {
        self.inner
            .cache
            .read()
            .await
            .get(&QueryKey::Processed(role, status))
            .cloned()
    }

    pub async fn record(&self, metrics_id: &str) -> Option<ApprovalRecord> {
        self.inner.cache.read().await.find(metrics_id).cloned()
    }

    /// Submissions currently awaiting the service.
    pub async fn in_flight_count(&self) -> usize {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // ── Actions ──────────────────────────────────────────────────────────────

    pub async fn approve(&self, metrics_id: &str, stage: StageKey) -> Result<Submission, EngineError> {
        self.submit(SubmitRequest {
            metrics_id: metrics_id.to_string(),
            acting_stage: stage,
            target_stage: stage,
            action: ApprovalAction::Approve,
        })
        .await
    }

    pub async fn flag(
        &self,
        metrics_id: &str,
        acting: StageKey,
        target: StageKey,
        note: &str,
    ) -> Result<Submission, EngineError> {
        self.submit(SubmitRequest {
            metrics_id: metrics_id.to_string(),
            acting_stage: acting,
            target_stage: target,
            action: ApprovalAction::Flag {
                note: note.to_string(),
            },
        })
        .await
    }

    pub async fn resolve(
        &self,
        metrics_id: &str,
        acting: StageKey,
        target: StageKey,
        response: &str,
    ) -> Result<Submission, EngineError> {
        self.submit(SubmitRequest {
            metrics_id: metrics_id.to_string(),
            acting_stage: acting,
            target_stage: target,
            action: ApprovalAction::Resolve {
                response: response.to_string(),
            },
        })
        .await
    }

    pub async fn unapprove(
        &self,
        metrics_id: &str,
        stage: StageKey,
        note: Option<&str>,
    ) -> Result<Submission, EngineError> {
        self.submit(SubmitRequest {
            metrics_id: metrics_id.to_string(),
            acting_stage: stage,
            target_stage: stage,
            action: ApprovalAction::Unapprove {
                note: note.map(str::to_string),
            },
        })
        .await
    }

    /// Run one action end to end.
    ///
    /// Local refusals (vetoes, illegal transitions, a duplicate in-flight
    /// submission) return before any service call. On a service failure the
    /// cache is left untouched.
    pub async fn submit(&self, req: SubmitRequest) -> Result<Submission, EngineError> {
        let inner = &self.inner;
        let actor = inner.session.actor();
        let read_only = inner.session.read_only();
        let kind = req.action.kind();

        let record = inner.cache.read().await.find(&req.metrics_id).cloned();
        let Some(record) = record else {
            if read_only {
                return Err(refused(&req, Veto::ReadOnly.into()));
            }
            return Err(refused(&req, EngineError::RecordNotLoaded(req.metrics_id.clone())));
        };

        GatingPolicy::new(&inner.registry)
            .check(&GateContext {
                actor: &actor,
                read_only,
                record: &record,
                acting_stage: req.acting_stage,
                target_stage: req.target_stage,
                action: kind,
            })
            .map_err(|veto| refused(&req, veto.into()))?;

        let transition = transition(
            &inner.registry,
            &TransitionRequest {
                record: &record,
                acting_stage: req.acting_stage,
                target_stage: req.target_stage,
                action: &req.action,
                actor: &actor,
            },
            &now_rfc3339(),
        )
        .map_err(|e| refused(&req, e.into()))?;

        let advisories = self.dependency_advisories(&record, &req);

        let viewer = inner
            .registry
            .stage(req.acting_stage)
            .map(|s| s.role)
            .ok_or(TransitionError::UnknownStage(req.acting_stage))?;
        let scope = ViewScope {
            viewer,
            acting_stage: req.acting_stage,
            selected_status: *inner.selected_status.read().await,
        };

        let key = InFlightKey {
            metrics_id: req.metrics_id.clone(),
            stage: req.target_stage,
            kind,
        };
        let Some(guard) = InFlightGuard::claim(inner, key.clone()) else {
            return Err(refused(
                &req,
                EngineError::InFlight {
                    metrics_id: key.metrics_id,
                    stage: key.stage,
                    kind,
                },
            ));
        };

        let task_inner = Arc::clone(inner);
        let fields = transition.update.to_fields();
        let metrics_id = req.metrics_id.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            let updated = task_inner
                .service
                .update_approval(&metrics_id, &fields)
                .await?;
            let mut cache = task_inner.cache.write().await;
            let reconciliation = reconcile(&mut *cache, scope, &metrics_id, &updated);
            Ok::<_, ServiceError>((updated, reconciliation))
        });

        let (updated, reconciliation) = match handle.await {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                tracing::warn!(
                    metrics_id = %req.metrics_id,
                    stage = %req.target_stage,
                    action = %kind,
                    error = %e,
                    "approval update failed"
                );
                return Err(e.into());
            }
            Err(e) => return Err(EngineError::Task(e.to_string())),
        };

        tracing::info!(
            metrics_id = %req.metrics_id,
            acting = %req.acting_stage,
            stage = %req.target_stage,
            action = %kind,
            removed_from_pending = reconciliation.removed_from_pending,
            "approval updated"
        );

        Ok(Submission {
            transition,
            updated,
            reconciliation,
            advisories,
        })
    }

    /// Upstream stages an approval conventionally waits for. Advisory only.
    fn dependency_advisories(&self, record: &ApprovalRecord, req: &SubmitRequest) -> Vec<String> {
        if req.action != ApprovalAction::Approve {
            return Vec::new();
        }
        let Some(stage) = self.inner.registry.stage(req.target_stage) else {
            return Vec::new();
        };
        let advisories: Vec<String> = stage
            .dependencies
            .iter()
            .filter(|dep| !record.is_approved_by(**dep))
            .map(|dep| {
                let label = self
                    .inner
                    .registry
                    .stage(*dep)
                    .map_or(dep.as_str(), |s| s.label);
                format!("{label} has not approved this record yet")
            })
            .collect();
        for advisory in &advisories {
            tracing::warn!(metrics_id = %req.metrics_id, stage = %req.target_stage, "{advisory}");
        }
        advisories
    }
}

fn refused(req: &SubmitRequest, error: EngineError) -> EngineError {
    tracing::debug!(
        metrics_id = %req.metrics_id,
        acting = %req.acting_stage,
        stage = %req.target_stage,
        action = %req.action.kind(),
        reason = %error,
        "approval action refused"
    );
    error
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}
