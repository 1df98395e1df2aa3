use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Default)]
struct StoreState {
    collections: HashMap<String, BTreeMap<String, Value>>,
    unique_indexes: HashMap<String, Vec<String>>,
}

struct UndoEntry {
    collection: String,
    id: String,
    previous: Option<Value>,
}

/// Shared in-process document store. Every read and write goes through a
/// [`Transaction`]; transactions are serialized, so a conditional update
/// observed inside one is never interleaved with another writer.
#[derive(Clone, Default)]
pub struct DocumentStore {
    state: Arc<Mutex<StoreState>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a top-level field whose non-null values must be unique within a collection.
    pub async fn ensure_unique_index(&self, collection: &str, field: &str) {
        let mut state = self.state.lock().await;
        let fields = state
            .unique_indexes
            .entry(collection.to_string())
            .or_default();
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
    }

    pub async fn begin(&self) -> Transaction {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let id = Uuid::new_v4();
        debug!("Transaction {} started", id);

        Transaction {
            id,
            guard,
            undo: Vec::new(),
            finished: false,
        }
    }
}

/// Unit of work over a [`DocumentStore`]. Dropping it without calling
/// [`Transaction::commit`] rolls every write back.
pub struct Transaction {
    id: Uuid,
    guard: OwnedMutexGuard<StoreState>,
    undo: Vec<UndoEntry>,
    finished: bool,
}

impl Transaction {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, DatabaseError> {
        match self.guard.collections.get(collection).and_then(|docs| docs.get(id)) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn find<T, F>(&self, collection: &str, predicate: F) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let Some(docs) = self.guard.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matches = Vec::new();
        for value in docs.values() {
            let doc: T = serde_json::from_value(value.clone())?;
            if predicate(&doc) {
                matches.push(doc);
            }
        }
        Ok(matches)
    }

    pub fn insert<T: Serialize>(
        &mut self,
        collection: &str,
        id: &str,
        doc: &T,
    ) -> Result<(), DatabaseError> {
        let value = serde_json::to_value(doc)?;

        if self.exists(collection, id) {
            return Err(DatabaseError::DuplicateKey {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        self.check_unique(collection, id, &value)?;
        self.write(collection, id, Some(value));
        Ok(())
    }

    pub fn replace<T: Serialize>(
        &mut self,
        collection: &str,
        id: &str,
        doc: &T,
    ) -> Result<(), DatabaseError> {
        let value = serde_json::to_value(doc)?;

        if !self.exists(collection, id) {
            return Err(DatabaseError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        self.check_unique(collection, id, &value)?;
        self.write(collection, id, Some(value));
        Ok(())
    }

    /// Apply `mutate` only if the stored document currently satisfies
    /// `condition`. Returns `false` when the condition did not match.
    pub fn update_where<T, C, M>(
        &mut self,
        collection: &str,
        id: &str,
        condition: C,
        mutate: M,
    ) -> Result<bool, DatabaseError>
    where
        T: Serialize + DeserializeOwned,
        C: FnOnce(&T) -> bool,
        M: FnOnce(&mut T),
    {
        let Some(mut doc) = self.get::<T>(collection, id)? else {
            return Ok(false);
        };
        if !condition(&doc) {
            return Ok(false);
        }
        mutate(&mut doc);
        self.replace(collection, id, &doc)?;
        Ok(true)
    }

    pub fn delete(&mut self, collection: &str, id: &str) -> Result<bool, DatabaseError> {
        if !self.exists(collection, id) {
            return Ok(false);
        }
        self.write(collection, id, None);
        Ok(true)
    }

    pub fn commit(mut self) {
        debug!("Transaction {} committed ({} writes)", self.id, self.undo.len());
        self.undo.clear();
        self.finished = true;
    }

    pub fn rollback(mut self) {
        self.undo_all();
        self.finished = true;
    }

    fn exists(&self, collection: &str, id: &str) -> bool {
        self.guard
            .collections
            .get(collection)
            .map(|docs| docs.contains_key(id))
            .unwrap_or(false)
    }

    fn check_unique(&self, collection: &str, id: &str, value: &Value) -> Result<(), DatabaseError> {
        let Some(fields) = self.guard.unique_indexes.get(collection) else {
            return Ok(());
        };
        let Some(docs) = self.guard.collections.get(collection) else {
            return Ok(());
        };

        for field in fields {
            let candidate = match value.get(field) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };
            let clash = docs
                .iter()
                .any(|(other_id, other)| other_id != id && other.get(field) == Some(candidate));
            if clash {
                return Err(DatabaseError::UniqueViolation {
                    collection: collection.to_string(),
                    field: field.clone(),
                    value: candidate.to_string(),
                });
            }
        }
        Ok(())
    }

    fn write(&mut self, collection: &str, id: &str, value: Option<Value>) {
        let docs = self
            .guard
            .collections
            .entry(collection.to_string())
            .or_default();

        let previous = match value {
            Some(value) => docs.insert(id.to_string(), value),
            None => docs.remove(id),
        };

        self.undo.push(UndoEntry {
            collection: collection.to_string(),
            id: id.to_string(),
            previous,
        });
    }

    fn undo_all(&mut self) {
        if self.undo.is_empty() {
            return;
        }
        warn!("Transaction {} rolled back ({} writes undone)", self.id, self.undo.len());

        while let Some(entry) = self.undo.pop() {
            let docs = self.guard.collections.entry(entry.collection).or_default();
            match entry.previous {
                Some(previous) => {
                    docs.insert(entry.id, previous);
                }
                None => {
                    docs.remove(&entry.id);
                }
            }
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            self.undo_all();
        }
    }
}
