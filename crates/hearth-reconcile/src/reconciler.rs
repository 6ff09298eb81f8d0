use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hearth_core::{Condition, ContentRecord, FilterValue, OpFilter, OperationalRecord};
use hearth_mapping::{merge, Entity, MergedEntity};
use hearth_storage::{ContentCollection, OperationalTable, StoreError, StoreResult};
use tracing::{debug, warn};

use crate::{
    BatchLookup, Clock, ListFilter, Listing, Page, ReconcileConfig, ReconcileError, ReconcileResult,
};

/// Operational rows keyed by the content id they reference.
#[derive(Debug)]
pub struct CrossReferenceIndex<'a, R> {
    by_content_ref: HashMap<&'a str, &'a R>,
}

impl<'a, R: OperationalRecord> CrossReferenceIndex<'a, R> {
    /// The first row wins when several reference the same document.
    pub fn build(rows: &'a [R]) -> Self {
        let mut by_content_ref = HashMap::with_capacity(rows.len());
        for row in rows {
            if let Some(content_ref) = row.content_ref() {
                by_content_ref.entry(content_ref).or_insert(row);
            }
        }
        Self { by_content_ref }
    }

    pub fn contains(&self, content_id: &str) -> bool {
        self.by_content_ref.contains_key(content_id)
    }

    pub fn get(&self, content_id: &str) -> Option<&'a R> {
        self.by_content_ref.get(content_id).copied()
    }

    pub fn content_refs(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.by_content_ref.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_content_ref.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_content_ref.is_empty()
    }
}

pub(crate) async fn with_deadline<T>(
    deadline: Duration,
    call: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(deadline)),
    }
}

/// Counterparts found outside the windows fetched for a listing.
struct Verified<R, D> {
    rows: Vec<R>,
    docs: Vec<D>,
    degraded: bool,
}

impl<R, D> Default for Verified<R, D> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            docs: Vec::new(),
            degraded: false,
        }
    }
}

#[derive(Clone)]
pub struct Reconciler {
    config: ReconcileConfig,
    clock: Arc<dyn Clock>,
    batch: BatchLookup,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(config: ReconcileConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            batch: BatchLookup::new(),
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn batch(&self) -> &BatchLookup {
        &self.batch
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) async fn operational_call<T>(
        &self,
        call: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        with_deadline(self.config.operational_timeout(), call).await
    }

    pub(crate) async fn content_call<T>(
        &self,
        call: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        with_deadline(self.config.content_timeout(), call).await
    }

    /// One page of merged entities drawn from both stores.
    pub async fn list<E, F>(
        &self,
        operational: &dyn OperationalTable<E::Operational>,
        content: &dyn ContentCollection<E::Content>,
        filters: &F,
        page: Page,
    ) -> ReconcileResult<Listing<E>>
    where
        E: Entity,
        F: ListFilter<E> + ?Sized,
    {
        page.validate(&self.config)?;
        filters.validate()?;
        let now = self.clock.now();
        let window = page.fetch_window();
        let op_filter = filters.operational();
        let content_query = filters.content().ordered_by(E::content_order());

        let (rows, docs) = tokio::join!(
            self.operational_call(operational.query(&op_filter, E::operational_sort(), window, 0)),
            self.content_call(content.query(&content_query, window, 0)),
        );
        let rows = rows.map_err(|err| ReconcileError::operational(E::KIND, "list", err))?;
        let (docs, mut degraded) = match docs {
            Ok(docs) => (docs, false),
            Err(err) => {
                degrade::<E>("list", &err);
                (Vec::new(), true)
            }
        };
        let full_window = rows.len() >= window || docs.len() >= window;

        let index = CrossReferenceIndex::build(&rows);
        let verified = if self.config.verify_cross_references && !degraded {
            self.verify::<E>(operational, content, &index, &docs).await?
        } else {
            Verified::default()
        };
        degraded |= verified.degraded;

        let docs_by_id = docs
            .iter()
            .chain(verified.docs.iter())
            .map(|doc| (doc.content_id(), doc))
            .collect::<HashMap<_, _>>();
        let claimed = rows
            .iter()
            .chain(verified.rows.iter())
            .filter_map(|row| row.content_ref())
            .collect::<HashSet<_>>();

        let mut items = Vec::with_capacity(rows.len() + docs.len());
        let (mut both, mut operational_only, mut content_only) = (0usize, 0usize, 0usize);
        for row in rows.iter().chain(verified.rows.iter()) {
            let doc = row
                .content_ref()
                .and_then(|content_ref| docs_by_id.get(content_ref).copied());
            match doc {
                Some(_) => both += 1,
                None => operational_only += 1,
            }
            items.push(merge::<E>(Some(row), doc, now)?);
        }
        for doc in docs.iter().filter(|doc| !claimed.contains(doc.content_id())) {
            content_only += 1;
            items.push(merge::<E>(None, Some(doc), now)?);
        }
        debug!(
            entity = %E::KIND,
            both,
            operational_only,
            content_only,
            "classified merge candidates"
        );

        items.retain(|item| filters.matches(item));
        items.sort_by(E::canonical_cmp);
        let has_more = full_window || items.len() > page.end();
        let items = items
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect::<Vec<_>>();

        Ok(Listing {
            items,
            has_more,
            degraded,
        })
    }

    /// Resolves counterparts that one store's filter or window left out: documents
    /// referenced by fetched rows, and rows referencing fetched documents.
    async fn verify<E: Entity>(
        &self,
        operational: &dyn OperationalTable<E::Operational>,
        content: &dyn ContentCollection<E::Content>,
        index: &CrossReferenceIndex<'_, E::Operational>,
        docs: &[E::Content],
    ) -> ReconcileResult<Verified<E::Operational, E::Content>> {
        let fetched = docs.iter().map(|doc| doc.content_id()).collect::<HashSet<_>>();
        let dangling = index
            .content_refs()
            .filter(|content_ref| !fetched.contains(content_ref))
            .collect::<Vec<_>>();
        let orphans = docs
            .iter()
            .map(|doc| doc.content_id())
            .filter(|content_id| !index.contains(content_id))
            .map(str::to_string)
            .collect::<Vec<_>>();
        if dangling.is_empty() && orphans.is_empty() {
            return Ok(Verified::default());
        }

        let referenced_docs = async {
            if dangling.is_empty() {
                Ok(HashMap::new())
            } else {
                self.content_call(self.batch.content(content, dangling.iter().copied()))
                    .await
            }
        };
        let referencing_rows = async {
            if orphans.is_empty() {
                Ok(Vec::new())
            } else {
                let filter = OpFilter::new().and(Condition::in_list("content_ref", orphans.clone()));
                self.operational_call(operational.query(
                    &filter,
                    E::operational_sort(),
                    self.config.max_fetch_window,
                    0,
                ))
                .await
            }
        };
        let (referenced_docs, referencing_rows) = tokio::join!(referenced_docs, referencing_rows);

        let rows = referencing_rows
            .map_err(|err| ReconcileError::operational(E::KIND, "verify_cross_references", err))?;
        let (docs, degraded) = match referenced_docs {
            Ok(found) => {
                let mut docs = found.into_values().collect::<Vec<_>>();
                docs.sort_by(|a, b| a.content_id().cmp(b.content_id()));
                (docs, false)
            }
            Err(err) => {
                degrade::<E>("verify_cross_references", &err);
                (Vec::new(), true)
            }
        };
        debug!(
            entity = %E::KIND,
            dangling = dangling.len(),
            resolved_docs = docs.len(),
            orphans = orphans.len(),
            resolved_rows = rows.len(),
            "verified cross references"
        );
        Ok(Verified {
            rows,
            docs,
            degraded,
        })
    }

    /// Resolves one identity, operational id first, then content id.
    pub async fn get<E: Entity>(
        &self,
        operational: &dyn OperationalTable<E::Operational>,
        content: &dyn ContentCollection<E::Content>,
        id: &str,
    ) -> ReconcileResult<MergedEntity<E>> {
        if id.trim().is_empty() {
            return Err(ReconcileError::validation("id must not be empty"));
        }
        let now = self.clock.now();
        let row = self
            .operational_call(operational.get(id))
            .await
            .map_err(|err| ReconcileError::operational(E::KIND, "get", err))?;

        if let Some(row) = row {
            let doc = match row.content_ref() {
                Some(content_ref) => match self.content_call(content.get(content_ref)).await {
                    Ok(doc) => doc,
                    Err(err) => {
                        degrade::<E>("get", &err);
                        None
                    }
                },
                None => None,
            };
            return Ok(merge::<E>(Some(&row), doc.as_ref(), now)?);
        }

        let by_reference = OpFilter::new().and(Condition::eq("content_ref", FilterValue::text(id)));
        let (doc, referencing) = tokio::join!(
            self.content_call(content.get(id)),
            self.operational_call(operational.query(&by_reference, E::operational_sort(), 1, 0)),
        );
        let referencing = referencing
            .map_err(|err| ReconcileError::operational(E::KIND, "get", err))?
            .into_iter()
            .next();
        let doc = match (doc, &referencing) {
            (Ok(doc), _) => doc,
            // Without a referencing row there is nothing to degrade to.
            (Err(err), None) => return Err(ReconcileError::content(E::KIND, "get", err)),
            (Err(err), Some(_)) => {
                degrade::<E>("get", &err);
                None
            }
        };
        match (referencing, doc) {
            (None, None) => Err(ReconcileError::NotFound {
                entity: E::KIND,
                id: id.to_string(),
            }),
            (row, doc) => Ok(merge::<E>(row.as_ref(), doc.as_ref(), now)?),
        }
    }
}

fn degrade<E: Entity>(operation: &'static str, err: &StoreError) {
    warn!(
        entity = %E::KIND,
        operation,
        timed_out = err.is_timeout(),
        error = %err,
        "content store unavailable; serving operational fields only"
    );
}
