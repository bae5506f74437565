use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use super::{Fields, RemoteDocument, RemoteError, RemoteStore, TENANT_FIELD};
use crate::model::EntityKind;

/// In-process document store for local runs and tests.
///
/// `set_failing(true)` makes every call return [`RemoteError::Unavailable`].
#[derive(Default)]
pub struct MemoryRemoteStore {
    collections: Mutex<HashMap<EntityKind, BTreeMap<String, Fields>>>,
    next_id: AtomicU64,
    list_calls: AtomicU64,
    failing: AtomicBool,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Insert a document under a caller-chosen id.
    pub fn seed(&self, kind: EntityKind, id: impl Into<String>, fields: Value) {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Fields::new(),
        };
        self.lock().entry(kind).or_default().insert(id.into(), fields);
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> Option<Fields> {
        self.lock().get(&kind).and_then(|c| c.get(id).cloned())
    }

    /// How many `list` round trips have been made so far.
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.lock().get(&kind).map_or(0, BTreeMap::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<EntityKind, BTreeMap<String, Fields>>> {
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RemoteError::Unavailable("memory store set to fail".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn list(
        &self,
        kind: EntityKind,
        tenant: Option<&str>,
    ) -> Result<Vec<RemoteDocument>, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let guard = self.lock();
        let Some(collection) = guard.get(&kind) else {
            return Ok(Vec::new());
        };
        Ok(collection
            .iter()
            .filter(|(_, fields)| match tenant {
                Some(t) => fields.get(TENANT_FIELD).and_then(Value::as_str) == Some(t),
                None => true,
            })
            .map(|(id, fields)| RemoteDocument {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect())
    }

    async fn create(&self, kind: EntityKind, fields: Fields) -> Result<String, RemoteError> {
        self.check()?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("{}-{n}", kind.label());
        self.lock().entry(kind).or_default().insert(id.clone(), fields);
        Ok(id)
    }

    async fn update(&self, kind: EntityKind, id: &str, fields: Fields) -> Result<(), RemoteError> {
        self.check()?;
        let mut guard = self.lock();
        let doc = guard
            .get_mut(&kind)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| RemoteError::Api {
                status: 404,
                message: format!("{}/{id} not found", kind.collection()),
            })?;
        doc.extend(fields);
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), RemoteError> {
        self.check()?;
        if let Some(collection) = self.lock().get_mut(&kind) {
            collection.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn list_filters_by_tenant() {
        let store = MemoryRemoteStore::new();
        store.seed(EntityKind::Horse, "h1", json!({"userId": "u1", "name": "Star"}));
        store.seed(EntityKind::Horse, "h2", json!({"userId": "u2", "name": "Moon"}));

        let mine = store.list(EntityKind::Horse, Some("u1")).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, "h1");
        assert_eq!(store.list(EntityKind::Horse, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_update_delete() {
        let store = MemoryRemoteStore::new();
        let id = store
            .create(EntityKind::Visit, json!({"vetName": "A"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        store
            .update(EntityKind::Visit, &id, json!({"vetName": "B"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        assert_eq!(store.get(EntityKind::Visit, &id).unwrap()["vetName"], "B");
        store.delete(EntityKind::Visit, &id).await.unwrap();
        assert_eq!(store.count(EntityKind::Visit), 0);
    }

    #[tokio::test]
    async fn failing_mode_rejects_calls() {
        let store = MemoryRemoteStore::new();
        store.set_failing(true);
        assert!(store.list(EntityKind::Horse, None).await.is_err());
        assert!(store.delete(EntityKind::Horse, "x").await.is_err());
        store.set_failing(false);
        assert!(store.delete(EntityKind::Horse, "x").await.is_ok());
    }
}
