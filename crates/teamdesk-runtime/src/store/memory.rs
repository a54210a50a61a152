use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use teamdesk_core::error::{Result, TeamdeskError};

use super::{DocumentStore, Filter, FindOptions, StoreFuture};

#[derive(Default)]
struct Collection {
    docs: HashMap<Uuid, Entry>,
    unique: HashMap<String, Uuid>,
    next_seq: u64,
}

struct Entry {
    seq: u64,
    unique_key: Option<String>,
    doc: Value,
}

impl Collection {
    fn claim_key(&self, collection: &str, id: Uuid, key: &Option<String>) -> Result<()> {
        if let Some(key) = key {
            if self.unique.get(key).is_some_and(|owner| *owner != id) {
                return Err(TeamdeskError::Duplicate {
                    collection: collection.to_string(),
                    key: key.clone(),
                });
            }
        }
        Ok(())
    }

    fn matching(&self, filter: &Filter) -> Vec<&Entry> {
        let mut hits: Vec<&Entry> = self.docs.values().filter(|e| filter.matches(&e.doc)).collect();
        hits.sort_by_key(|e| e.seq);
        hits
    }
}

/// In-process store used by tests and `memory://` deployments.
///
/// Documents live in insertion order; unique keys are enforced per collection.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<&'static str, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn insert(
        &self,
        collection: &'static str,
        id: Uuid,
        unique_key: Option<String>,
        doc: Value,
    ) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut collections = self.collections.write().await;
            let coll = collections.entry(collection).or_default();
            if coll.docs.contains_key(&id) {
                return Err(TeamdeskError::Duplicate {
                    collection: collection.to_string(),
                    key: format!("id:{}", id),
                });
            }
            coll.claim_key(collection, id, &unique_key)?;
            if let Some(key) = &unique_key {
                coll.unique.insert(key.clone(), id);
            }
            let seq = coll.next_seq;
            coll.next_seq += 1;
            coll.docs.insert(
                id,
                Entry {
                    seq,
                    unique_key,
                    doc,
                },
            );
            Ok(())
        })
    }

    fn replace(
        &self,
        collection: &'static str,
        id: Uuid,
        unique_key: Option<String>,
        doc: Value,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut collections = self.collections.write().await;
            let Some(coll) = collections.get_mut(collection) else {
                return Ok(false);
            };
            if !coll.docs.contains_key(&id) {
                return Ok(false);
            }
            coll.claim_key(collection, id, &unique_key)?;
            let Some(entry) = coll.docs.get_mut(&id) else {
                return Ok(false);
            };
            let previous = std::mem::replace(&mut entry.unique_key, unique_key.clone());
            entry.doc = doc;
            if let Some(old) = previous {
                coll.unique.remove(&old);
            }
            if let Some(key) = unique_key {
                coll.unique.insert(key, id);
            }
            Ok(true)
        })
    }

    fn get(&self, collection: &'static str, id: Uuid) -> StoreFuture<'_, Option<Value>> {
        Box::pin(async move {
            let collections = self.collections.read().await;
            Ok(collections
                .get(collection)
                .and_then(|c| c.docs.get(&id))
                .map(|e| e.doc.clone()))
        })
    }

    fn find(
        &self,
        collection: &'static str,
        filter: Filter,
        options: FindOptions,
    ) -> StoreFuture<'_, Vec<Value>> {
        Box::pin(async move {
            let collections = self.collections.read().await;
            let Some(coll) = collections.get(collection) else {
                return Ok(Vec::new());
            };
            let mut hits = coll.matching(&filter);
            // stable: ties keep insertion order
            hits.sort_by(|a, b| options.cmp_docs(&a.doc, &b.doc));
            let skip = usize::try_from(options.skip.unwrap_or(0)).unwrap_or(usize::MAX);
            let limit = options.limit.map_or(usize::MAX, |l| l as usize);
            Ok(hits
                .into_iter()
                .skip(skip)
                .take(limit)
                .map(|e| e.doc.clone())
                .collect())
        })
    }

    fn count(&self, collection: &'static str, filter: Filter) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let collections = self.collections.read().await;
            Ok(collections
                .get(collection)
                .map_or(0, |c| c.matching(&filter).len() as u64))
        })
    }

    fn delete(&self, collection: &'static str, id: Uuid) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut collections = self.collections.write().await;
            let Some(coll) = collections.get_mut(collection) else {
                return Ok(false);
            };
            match coll.docs.remove(&id) {
                Some(entry) => {
                    if let Some(key) = entry.unique_key {
                        coll.unique.remove(&key);
                    }
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn delete_many(&self, collection: &'static str, filter: Filter) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let mut collections = self.collections.write().await;
            let Some(coll) = collections.get_mut(collection) else {
                return Ok(0);
            };
            let doomed: Vec<Uuid> = coll
                .docs
                .iter()
                .filter(|(_, e)| filter.matches(&e.doc))
                .map(|(id, _)| *id)
                .collect();
            for id in &doomed {
                if let Some(key) = coll.docs.remove(id).and_then(|e| e.unique_key) {
                    coll.unique.remove(&key);
                }
            }
            Ok(doomed.len() as u64)
        })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}
