//! In-memory stores used by tests and local demos.
//!
//! Each store counts the calls it receives and can be told to fail or to stall,
//! which is how reconciler degradation and timeout paths are exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hearth_core::{
    ContentQuery, ContentRecord, OpFilter, OperationalRecord, ParticipationRecord, Sort,
};
use tokio::sync::RwLock;

use crate::{
    ContentCollection, OperationalTable, ParticipationStore, StoreError, StoreResult,
};

#[derive(Debug, Default)]
struct Faults {
    failure: Mutex<Option<String>>,
    batch_failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
}

impl Faults {
    async fn check(&self) -> StoreResult<()> {
        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone();
        match failure {
            Some(message) => Err(StoreError::Unavailable(message)),
            None => Ok(()),
        }
    }

    async fn check_batch(&self) -> StoreResult<()> {
        self.check().await?;
        let failure = self.batch_failure.lock().unwrap_or_else(|e| e.into_inner()).clone();
        match failure {
            Some(message) => Err(StoreError::Unavailable(message)),
            None => Ok(()),
        }
    }

    fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }

    fn fail_batches_with(&self, message: impl Into<String>) {
        *self.batch_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }

    fn stall_for(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }

    fn heal(&self) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.batch_failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// Call counters, one per contract operation.
#[derive(Debug, Default)]
pub struct CallCounts {
    queries: AtomicUsize,
    gets: AtomicUsize,
    batches: AtomicUsize,
}

impl CallCounts {
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

fn window<T>(items: Vec<T>, limit: usize, offset: usize) -> Vec<T> {
    items.into_iter().skip(offset).take(limit).collect()
}

#[derive(Debug, Default)]
pub struct MemoryTable<R> {
    rows: RwLock<Vec<R>>,
    faults: Faults,
    calls: CallCounts,
    batch_limit: Option<usize>,
}

impl<R: OperationalRecord> MemoryTable<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Self {
            rows: RwLock::new(rows),
            faults: Faults::default(),
            calls: CallCounts::default(),
            batch_limit: None,
        }
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = Some(limit.max(1));
        self
    }

    pub async fn insert(&self, row: R) {
        let mut rows = self.rows.write().await;
        rows.retain(|existing| existing.id() != row.id());
        rows.push(row);
    }

    pub fn fail_with(&self, message: impl Into<String>) {
        self.faults.fail_with(message);
    }

    /// Fails `batch_get` only; queries and single gets keep answering.
    pub fn fail_batches_with(&self, message: impl Into<String>) {
        self.faults.fail_batches_with(message);
    }

    pub fn stall_for(&self, delay: Duration) {
        self.faults.stall_for(delay);
    }

    pub fn heal(&self) {
        self.faults.heal();
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }
}

#[async_trait]
impl<R: OperationalRecord> OperationalTable<R> for MemoryTable<R> {
    async fn query(
        &self,
        filter: &OpFilter,
        sort: Sort,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<R>> {
        self.calls.queries.fetch_add(1, Ordering::SeqCst);
        self.faults.check().await?;
        let rows = self.rows.read().await;
        let mut matched = rows
            .iter()
            .filter(|row| filter.matches(*row))
            .cloned()
            .collect::<Vec<_>>();
        matched.sort_by(|a, b| {
            sort.compare_values(a.field(sort.column).as_ref(), b.field(sort.column).as_ref())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(window(matched, limit, offset))
    }

    async fn get(&self, id: &str) -> StoreResult<Option<R>> {
        self.calls.gets.fetch_add(1, Ordering::SeqCst);
        self.faults.check().await?;
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|row| row.id() == id).cloned())
    }

    async fn batch_get(&self, ids: &[String]) -> StoreResult<HashMap<String, R>> {
        self.calls.batches.fetch_add(1, Ordering::SeqCst);
        self.faults.check_batch().await?;
        if let Some(limit) = self.batch_limit {
            if ids.len() > limit {
                return Err(StoreError::Unavailable(format!(
                    "batch of {} ids exceeds limit {limit}",
                    ids.len()
                )));
            }
        }
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|row| ids.iter().any(|id| id == row.id()))
            .map(|row| (row.id().to_string(), row.clone()))
            .collect())
    }

    fn batch_limit(&self) -> Option<usize> {
        self.batch_limit
    }
}

#[derive(Debug, Default)]
pub struct MemoryCollection<D> {
    docs: RwLock<Vec<D>>,
    faults: Faults,
    calls: CallCounts,
    batch_limit: Option<usize>,
}

impl<D: ContentRecord> MemoryCollection<D> {
    pub fn new(docs: Vec<D>) -> Self {
        Self {
            docs: RwLock::new(docs),
            faults: Faults::default(),
            calls: CallCounts::default(),
            batch_limit: None,
        }
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = Some(limit.max(1));
        self
    }

    pub async fn insert(&self, doc: D) {
        let mut docs = self.docs.write().await;
        docs.retain(|existing| existing.content_id() != doc.content_id());
        docs.push(doc);
    }

    pub fn fail_with(&self, message: impl Into<String>) {
        self.faults.fail_with(message);
    }

    /// Fails `batch_get` only; queries and single gets keep answering.
    pub fn fail_batches_with(&self, message: impl Into<String>) {
        self.faults.fail_batches_with(message);
    }

    pub fn stall_for(&self, delay: Duration) {
        self.faults.stall_for(delay);
    }

    pub fn heal(&self) {
        self.faults.heal();
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }
}

#[async_trait]
impl<D: ContentRecord> ContentCollection<D> for MemoryCollection<D> {
    async fn query(&self, query: &ContentQuery, limit: usize, offset: usize) -> StoreResult<Vec<D>> {
        self.calls.queries.fetch_add(1, Ordering::SeqCst);
        self.faults.check().await?;
        let docs = self.docs.read().await;
        let mut matched = docs
            .iter()
            .filter(|doc| query.matches(*doc))
            .cloned()
            .collect::<Vec<_>>();
        matched.sort_by(|a, b| {
            let by_order = match query.order {
                Some(order) => order.compare_values(
                    a.field(order.column).as_ref(),
                    b.field(order.column).as_ref(),
                ),
                None => std::cmp::Ordering::Equal,
            };
            by_order.then_with(|| a.content_id().cmp(b.content_id()))
        });
        Ok(window(matched, limit, offset))
    }

    async fn get(&self, id: &str) -> StoreResult<Option<D>> {
        self.calls.gets.fetch_add(1, Ordering::SeqCst);
        self.faults.check().await?;
        let docs = self.docs.read().await;
        Ok(docs.iter().find(|doc| doc.content_id() == id).cloned())
    }

    async fn batch_get(&self, ids: &[String]) -> StoreResult<Vec<D>> {
        self.calls.batches.fetch_add(1, Ordering::SeqCst);
        self.faults.check_batch().await?;
        if let Some(limit) = self.batch_limit {
            if ids.len() > limit {
                return Err(StoreError::Unavailable(format!(
                    "batch of {} ids exceeds limit {limit}",
                    ids.len()
                )));
            }
        }
        let docs = self.docs.read().await;
        Ok(docs
            .iter()
            .filter(|doc| ids.iter().any(|id| id == doc.content_id()))
            .cloned()
            .collect())
    }

    fn batch_limit(&self) -> Option<usize> {
        self.batch_limit
    }
}

#[derive(Debug, Default)]
pub struct MemoryParticipation {
    records: RwLock<Vec<ParticipationRecord>>,
    faults: Faults,
    lookups: AtomicUsize,
}

impl MemoryParticipation {
    pub fn new(records: Vec<ParticipationRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            faults: Faults::default(),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn fail_with(&self, message: impl Into<String>) {
        self.faults.fail_with(message);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ParticipationStore for MemoryParticipation {
    async fn get_for_user(&self, user_id: &str) -> StoreResult<Vec<ParticipationRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.faults.check().await?;
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert(&self, record: ParticipationRecord) -> StoreResult<ParticipationRecord> {
        self.faults.check().await?;
        let mut records = self.records.write().await;
        records.retain(|r| !(r.user_id == record.user_id && r.event_id == record.event_id));
        records.push(record.clone());
        Ok(record)
    }
}
