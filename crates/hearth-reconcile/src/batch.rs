use std::collections::{BTreeSet, HashMap};

use hearth_core::{ContentRecord, OperationalRecord};
use hearth_storage::{ContentCollection, OperationalTable, StoreResult};
use tracing::debug;

/// Resolves foreign keys in bulk: one store call, one merged map out. Requests
/// are split only where the store declares a hard limit on ids per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchLookup;

impl BatchLookup {
    pub fn new() -> Self {
        Self
    }

    fn chunk_size(&self, store_limit: Option<usize>) -> usize {
        store_limit.map(|limit| limit.max(1)).unwrap_or(usize::MAX)
    }

    pub async fn operational<'a, R: OperationalRecord>(
        &self,
        table: &dyn OperationalTable<R>,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> StoreResult<HashMap<String, R>> {
        let ids = unique_ids(ids);
        let mut found = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(self.chunk_size(table.batch_limit())) {
            let batch = table.batch_get(chunk).await?;
            found.extend(
                batch
                    .into_iter()
                    .filter(|(key, row)| row.id() == key && chunk.contains(key)),
            );
        }
        debug!(requested = ids.len(), found = found.len(), "operational batch lookup");
        Ok(found)
    }

    pub async fn content<'a, D: ContentRecord>(
        &self,
        collection: &dyn ContentCollection<D>,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> StoreResult<HashMap<String, D>> {
        let ids = unique_ids(ids);
        let mut found = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(self.chunk_size(collection.batch_limit())) {
            for doc in collection.batch_get(chunk).await? {
                let id = doc.content_id().to_string();
                if chunk.contains(&id) {
                    found.insert(id, doc);
                }
            }
        }
        debug!(requested = ids.len(), found = found.len(), "content batch lookup");
        Ok(found)
    }
}

fn unique_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    ids.into_iter()
        .filter(|id| !id.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
