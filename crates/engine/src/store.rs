//! Per-session cache of approval listings.
//!
//! Each cached page is keyed by the query that produced it. Records are never
//! created here; they arrive from the data service and are later patched or
//! removed by the reconciler.

use std::collections::HashMap;

use registrar_core::{ApprovalRecord, ProcessedStatus, Role};
use registrar_storage::Page;

/// The listing query a cached page answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Pending(Role),
    Processed(Role, ProcessedStatus),
}

/// A cached listing. `stale` means a refetch is due before counts can be
/// trusted again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedPage {
    pub items: Vec<ApprovalRecord>,
    pub total: usize,
    pub stale: bool,
}

impl From<Page> for CachedPage {
    fn from(page: Page) -> Self {
        CachedPage {
            items: page.items,
            total: page.total,
            stale: false,
        }
    }
}

/// Repository over cached listings.
pub trait RecordCache: Send + Sync + 'static {
    fn get(&self, key: &QueryKey) -> Option<&CachedPage>;

    /// Replace a listing with a freshly fetched page.
    fn put(&mut self, key: QueryKey, page: Page);

    /// Apply `f` to the cached copy of `metrics_id` under `key`. Returns
    /// whether a copy was found.
    fn patch(
        &mut self,
        key: &QueryKey,
        metrics_id: &str,
        f: &mut dyn FnMut(&mut ApprovalRecord),
    ) -> bool;

    /// Drop a record from a listing, decrementing its total.
    fn remove(&mut self, key: &QueryKey, metrics_id: &str) -> Option<ApprovalRecord>;

    /// Mark a listing stale. Missing listings are ignored.
    fn invalidate(&mut self, key: &QueryKey);

    fn keys(&self) -> Vec<QueryKey>;

    /// The freshest cached copy of `metrics_id`: a listing that is not
    /// stale wins, then the most recently fetched one.
    fn find(&self, metrics_id: &str) -> Option<&ApprovalRecord>;
}

/// `HashMap`-backed [`RecordCache`].
#[derive(Debug, Default)]
pub struct RecordStore {
    pages: HashMap<QueryKey, CachedPage>,
    /// Fetch order of each listing; higher is newer.
    fetched: HashMap<QueryKey, u64>,
    next_fetch: u64,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.pages.get(key).is_some_and(|p| p.stale)
    }
}

impl RecordCache for RecordStore {
    fn get(&self, key: &QueryKey) -> Option<&CachedPage> {
        self.pages.get(key)
    }

    fn put(&mut self, key: QueryKey, page: Page) {
        self.next_fetch += 1;
        self.fetched.insert(key, self.next_fetch);
        self.pages.insert(key, CachedPage::from(page));
    }

    fn patch(
        &mut self,
        key: &QueryKey,
        metrics_id: &str,
        f: &mut dyn FnMut(&mut ApprovalRecord),
    ) -> bool {
        let Some(record) = self
            .pages
            .get_mut(key)
            .and_then(|p| p.items.iter_mut().find(|r| r.metrics_id == metrics_id))
        else {
            return false;
        };
        f(record);
        true
    }

    fn remove(&mut self, key: &QueryKey, metrics_id: &str) -> Option<ApprovalRecord> {
        let page = self.pages.get_mut(key)?;
        let index = page.items.iter().position(|r| r.metrics_id == metrics_id)?;
        page.total = page.total.saturating_sub(1);
        Some(page.items.remove(index))
    }

    fn invalidate(&mut self, key: &QueryKey) {
        if let Some(page) = self.pages.get_mut(key) {
            page.stale = true;
        }
    }

    fn keys(&self) -> Vec<QueryKey> {
        self.pages.keys().copied().collect()
    }

    fn find(&self, metrics_id: &str) -> Option<&ApprovalRecord> {
        self.pages
            .iter()
            .filter_map(|(key, page)| {
                let record = page.items.iter().find(|r| r.metrics_id == metrics_id)?;
                let fetched = self.fetched.get(key).copied().unwrap_or_default();
                Some(((!page.stale, fetched), record))
            })
            .max_by_key(|(rank, _)| *rank)
            .map(|(_, record)| record)
    }
}
