//! In-Memory Entity Store
//!
//! Transactional JSON document store implementing the domain's
//! `EntityStore` contract. All five collections live behind one writer
//! lock; a transaction applies its ops inside a single short critical
//! section, so partial effects are never visible to concurrent readers.
//! On failure the touched documents are restored from a snapshot taken
//! before the first op ran.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::domain::entities::{Chat, User};
use crate::domain::store::{
    from_document, to_document, Collection, DocRef, EntityStore, Record, Transaction, WriteOp,
};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Unique indexes enforced at write time: (collection, field).
const UNIQUE_INDEXES: &[(Collection, &'static str)] = &[
    (Collection::Users, User::USERNAME),
    (Collection::Chats, Chat::PAIR_KEY),
];

/// Unique index fields for one collection.
fn unique_fields(collection: Collection) -> impl Iterator<Item = &'static str> {
    UNIQUE_INDEXES
        .iter()
        .filter(move |(c, _)| *c == collection)
        .map(|(_, field)| *field)
}

/// Documents and unique-index state for one collection.
///
/// Index maps are derived state: every entry points at the document that
/// currently holds the indexed value. Ops keep this derivation intact at
/// every return point, which is what makes snapshot rollback sound.
#[derive(Debug, Default)]
struct CollectionData {
    docs: BTreeMap<i64, Value>,
    /// field -> indexed value -> document id
    unique: HashMap<&'static str, HashMap<String, i64>>,
}

impl CollectionData {
    fn index_insert(&mut self, field: &'static str, value: String, id: i64) {
        self.unique.entry(field).or_default().insert(value, id);
    }

    fn index_remove(&mut self, field: &'static str, value: &str, id: i64) {
        if let Some(map) = self.unique.get_mut(field) {
            if map.get(value) == Some(&id) {
                map.remove(value);
            }
        }
    }

    fn index_holder(&self, field: &'static str, value: &str) -> Option<i64> {
        self.unique.get(field).and_then(|map| map.get(value)).copied()
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    users: CollectionData,
    posts: CollectionData,
    comments: CollectionData,
    chats: CollectionData,
    messages: CollectionData,
}

impl StoreInner {
    fn data(&self, collection: Collection) -> &CollectionData {
        match collection {
            Collection::Users => &self.users,
            Collection::Posts => &self.posts,
            Collection::Comments => &self.comments,
            Collection::Chats => &self.chats,
            Collection::Messages => &self.messages,
        }
    }

    fn data_mut(&mut self, collection: Collection) -> &mut CollectionData {
        match collection {
            Collection::Users => &mut self.users,
            Collection::Posts => &mut self.posts,
            Collection::Comments => &mut self.comments,
            Collection::Chats => &mut self.chats,
            Collection::Messages => &mut self.messages,
        }
    }
}

/// Per-op result surfaced by the single-op convenience methods.
#[derive(Debug, Clone, Copy)]
enum OpEffect {
    Done,
    SetChanged(bool),
    Counter(i64),
}

/// In-memory `EntityStore` implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply ops under the writer lock, all-or-nothing.
    fn commit_ops(&self, ops: &[WriteOp]) -> Result<Vec<OpEffect>, AppError> {
        let mut inner = self.inner.write();
        let snapshot = Self::snapshot(&inner, ops);

        match Self::apply_all(&mut inner, ops) {
            Ok(effects) => {
                metrics::record_store_transaction("committed");
                Ok(effects)
            }
            Err(e) => {
                Self::restore(&mut inner, snapshot);
                metrics::record_store_transaction("failed");
                tracing::warn!(error = %e, ops = ops.len(), "Transaction rolled back");
                Err(e)
            }
        }
    }

    /// First-touch state of every document the ops reference.
    fn snapshot(inner: &StoreInner, ops: &[WriteOp]) -> Vec<(DocRef, Option<Value>)> {
        let mut seen = HashSet::new();
        let mut snapshot = Vec::new();
        for op in ops {
            let target = op.target();
            if seen.insert(target) {
                let current = inner.data(target.collection).docs.get(&target.id).cloned();
                snapshot.push((target, current));
            }
        }
        snapshot
    }

    /// Put every touched document (and its derived index entries) back to
    /// its snapshotted state.
    fn restore(inner: &mut StoreInner, snapshot: Vec<(DocRef, Option<Value>)>) {
        for (target, old) in snapshot {
            let data = inner.data_mut(target.collection);

            let current_entries: Vec<(&'static str, String)> = match data.docs.get(&target.id) {
                Some(doc) => unique_fields(target.collection)
                    .filter_map(|f| {
                        doc.get(f)
                            .and_then(Value::as_str)
                            .map(|v| (f, v.to_string()))
                    })
                    .collect(),
                None => Vec::new(),
            };
            for (field, value) in current_entries {
                data.index_remove(field, &value, target.id);
            }

            match old {
                Some(doc) => {
                    for field in unique_fields(target.collection) {
                        if let Some(value) = doc.get(field).and_then(Value::as_str) {
                            data.index_insert(field, value.to_string(), target.id);
                        }
                    }
                    data.docs.insert(target.id, doc);
                }
                None => {
                    data.docs.remove(&target.id);
                }
            }
        }
    }

    fn apply_all(inner: &mut StoreInner, ops: &[WriteOp]) -> Result<Vec<OpEffect>, AppError> {
        let mut effects = Vec::with_capacity(ops.len());
        let mut counter_checks: Vec<(DocRef, &'static str, &'static str)> = Vec::new();

        for op in ops {
            effects.push(Self::apply_op(inner, op)?);
            match op {
                WriteOp::AddToSet {
                    target,
                    field,
                    counter: Some(counter),
                    ..
                }
                | WriteOp::Push {
                    target,
                    field,
                    counter: Some(counter),
                    ..
                }
                | WriteOp::Pull {
                    target,
                    field,
                    counter: Some(counter),
                    ..
                } => counter_checks.push((*target, field, counter)),
                _ => {}
            }
        }

        // Counter-paired ops must leave count == len; drift means some
        // unpaired write corrupted the document.
        for (target, field, counter) in counter_checks {
            let Some(doc) = inner.data(target.collection).docs.get(&target.id) else {
                continue; // deleted later in the same transaction
            };
            let len = doc
                .get(field)
                .and_then(Value::as_array)
                .map(|a| a.len() as i64)
                .unwrap_or(-1);
            let count = doc.get(counter).and_then(Value::as_i64).unwrap_or(i64::MIN);
            if len != count {
                return Err(AppError::Invariant(format!(
                    "{}: {} is {} but {} holds {} elements",
                    target, counter, count, field, len
                )));
            }
        }

        Ok(effects)
    }

    /// Apply one op. Error exits happen before any mutation of the op's
    /// target, so a failed op leaves documents and indexes consistent.
    fn apply_op(inner: &mut StoreInner, op: &WriteOp) -> Result<OpEffect, AppError> {
        match op {
            WriteOp::Insert {
                collection,
                id,
                document,
            } => {
                let data = inner.data_mut(*collection);
                if data.docs.contains_key(id) {
                    return Err(AppError::Conflict(format!(
                        "{} already exists",
                        DocRef::new(*collection, *id)
                    )));
                }
                let entries: Vec<(&'static str, String)> = unique_fields(*collection)
                    .filter_map(|f| {
                        document
                            .get(f)
                            .and_then(Value::as_str)
                            .map(|v| (f, v.to_string()))
                    })
                    .collect();
                for (field, value) in &entries {
                    if data.index_holder(field, value).is_some() {
                        return Err(AppError::Conflict(format!(
                            "{} with {} \"{}\" already exists",
                            collection, field, value
                        )));
                    }
                }
                for (field, value) in entries {
                    data.index_insert(field, value, *id);
                }
                data.docs.insert(*id, document.clone());
                Ok(OpEffect::Done)
            }

            WriteOp::Update { target, fields } => {
                let incoming = fields.as_object().ok_or_else(|| {
                    AppError::Internal(format!("Update fields for {} must be an object", target))
                })?;
                let data = inner.data_mut(target.collection);
                if !data.docs.contains_key(&target.id) {
                    return Err(AppError::NotFound(target.to_string()));
                }

                // Conflict-check unique fields before touching anything.
                let mut index_moves: Vec<(&'static str, Option<String>, String)> = Vec::new();
                for field in unique_fields(target.collection) {
                    let Some(new_value) = incoming.get(field).and_then(Value::as_str) else {
                        continue;
                    };
                    let old_value = data
                        .docs
                        .get(&target.id)
                        .and_then(|d| d.get(field))
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    if old_value.as_deref() == Some(new_value) {
                        continue;
                    }
                    if let Some(holder) = data.index_holder(field, new_value) {
                        if holder != target.id {
                            return Err(AppError::Conflict(format!(
                                "{} with {} \"{}\" already exists",
                                target.collection, field, new_value
                            )));
                        }
                    }
                    index_moves.push((field, old_value, new_value.to_string()));
                }

                let doc = data
                    .docs
                    .get_mut(&target.id)
                    .ok_or_else(|| AppError::NotFound(target.to_string()))?;
                let doc_obj = doc.as_object_mut().ok_or_else(|| {
                    AppError::Internal(format!("Corrupt document at {}", target))
                })?;
                for (key, value) in incoming {
                    doc_obj.insert(key.clone(), value.clone());
                }
                for (field, old_value, new_value) in index_moves {
                    if let Some(old) = old_value {
                        data.index_remove(field, &old, target.id);
                    }
                    data.index_insert(field, new_value, target.id);
                }
                Ok(OpEffect::Done)
            }

            WriteOp::Delete { target } => {
                let data = inner.data_mut(target.collection);
                let doc = data
                    .docs
                    .remove(&target.id)
                    .ok_or_else(|| AppError::NotFound(target.to_string()))?;
                let entries: Vec<(&'static str, String)> = unique_fields(target.collection)
                    .filter_map(|f| {
                        doc.get(f)
                            .and_then(Value::as_str)
                            .map(|v| (f, v.to_string()))
                    })
                    .collect();
                for (field, value) in entries {
                    data.index_remove(field, &value, target.id);
                }
                Ok(OpEffect::Done)
            }

            WriteOp::AddToSet {
                target,
                field,
                value,
                counter,
            } => {
                let changed = Self::mutate_array(inner, *target, field, *counter, |arr| {
                    let json = Value::from(*value);
                    if arr.contains(&json) {
                        0
                    } else {
                        arr.push(json);
                        1
                    }
                })?;
                Ok(OpEffect::SetChanged(changed != 0))
            }

            WriteOp::Push {
                target,
                field,
                value,
                counter,
            } => {
                Self::mutate_array(inner, *target, field, *counter, |arr| {
                    arr.push(Value::from(*value));
                    1
                })?;
                Ok(OpEffect::Done)
            }

            WriteOp::Pull {
                target,
                field,
                value,
                counter,
            } => {
                let removed = Self::mutate_array(inner, *target, field, *counter, |arr| {
                    let before = arr.len();
                    arr.retain(|v| v.as_i64() != Some(*value));
                    -((before - arr.len()) as i64)
                })?;
                Ok(OpEffect::SetChanged(removed != 0))
            }

            WriteOp::Increment {
                target,
                field,
                delta,
            } => {
                let data = inner.data_mut(target.collection);
                let doc = data
                    .docs
                    .get_mut(&target.id)
                    .ok_or_else(|| AppError::NotFound(target.to_string()))?;
                let current = doc.get(field).and_then(Value::as_i64).ok_or_else(|| {
                    AppError::Internal(format!("{} field {} is not a number", target, field))
                })?;
                let next = current + delta;
                doc[field] = Value::from(next);
                Ok(OpEffect::Counter(next))
            }
        }
    }

    /// Mutate an array field and adjust its paired counter by the delta
    /// the mutation reports. Shape checks run before the mutation.
    fn mutate_array(
        inner: &mut StoreInner,
        target: DocRef,
        field: &'static str,
        counter: Option<&'static str>,
        mutate: impl FnOnce(&mut Vec<Value>) -> i64,
    ) -> Result<i64, AppError> {
        let data = inner.data_mut(target.collection);
        let doc = data
            .docs
            .get_mut(&target.id)
            .ok_or_else(|| AppError::NotFound(target.to_string()))?;

        if let Some(counter) = counter {
            if doc.get(counter).and_then(Value::as_i64).is_none() {
                return Err(AppError::Internal(format!(
                    "{} field {} is not a number",
                    target, counter
                )));
            }
        }
        let arr = doc.get_mut(field).and_then(Value::as_array_mut).ok_or_else(|| {
            AppError::Internal(format!("{} field {} is not an array", target, field))
        })?;

        let delta = mutate(arr);
        if delta != 0 {
            if let Some(counter) = counter {
                // Checked numeric above.
                let current = doc.get(counter).and_then(Value::as_i64).unwrap_or(0);
                doc[counter] = Value::from(current + delta);
            }
        }
        Ok(delta)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get<R: Record>(&self, id: i64) -> Result<Option<R>, AppError> {
        let doc = {
            let inner = self.inner.read();
            inner.data(R::COLLECTION).docs.get(&id).cloned()
        };
        doc.map(from_document).transpose()
    }

    async fn list<R: Record>(&self) -> Result<Vec<R>, AppError> {
        let docs: Vec<Value> = {
            let inner = self.inner.read();
            inner.data(R::COLLECTION).docs.values().cloned().collect()
        };
        docs.into_iter().map(from_document).collect()
    }

    async fn find<R, P>(&self, predicate: P) -> Result<Vec<R>, AppError>
    where
        R: Record,
        P: Fn(&R) -> bool + Send + Sync,
    {
        let all = self.list::<R>().await?;
        Ok(all.into_iter().filter(|r| predicate(r)).collect())
    }

    async fn insert<R: Record>(&self, record: &R) -> Result<(), AppError> {
        let op = WriteOp::Insert {
            collection: R::COLLECTION,
            id: record.id(),
            document: to_document(record)?,
        };
        self.commit_ops(std::slice::from_ref(&op))?;
        Ok(())
    }

    async fn update_fields(&self, target: DocRef, fields: Value) -> Result<(), AppError> {
        let op = WriteOp::Update { target, fields };
        self.commit_ops(std::slice::from_ref(&op))?;
        Ok(())
    }

    async fn delete(&self, target: DocRef) -> Result<(), AppError> {
        let op = WriteOp::Delete { target };
        self.commit_ops(std::slice::from_ref(&op))?;
        Ok(())
    }

    async fn add_to_set(
        &self,
        target: DocRef,
        field: &'static str,
        value: i64,
        counter: Option<&'static str>,
    ) -> Result<bool, AppError> {
        let op = WriteOp::AddToSet {
            target,
            field,
            value,
            counter,
        };
        match self.commit_ops(std::slice::from_ref(&op))?.first() {
            Some(OpEffect::SetChanged(changed)) => Ok(*changed),
            _ => Err(AppError::Internal("AddToSet produced no effect".into())),
        }
    }

    async fn remove_from_set(
        &self,
        target: DocRef,
        field: &'static str,
        value: i64,
        counter: Option<&'static str>,
    ) -> Result<bool, AppError> {
        let op = WriteOp::Pull {
            target,
            field,
            value,
            counter,
        };
        match self.commit_ops(std::slice::from_ref(&op))?.first() {
            Some(OpEffect::SetChanged(changed)) => Ok(*changed),
            _ => Err(AppError::Internal("Pull produced no effect".into())),
        }
    }

    async fn push(
        &self,
        target: DocRef,
        field: &'static str,
        value: i64,
        counter: Option<&'static str>,
    ) -> Result<(), AppError> {
        let op = WriteOp::Push {
            target,
            field,
            value,
            counter,
        };
        self.commit_ops(std::slice::from_ref(&op))?;
        Ok(())
    }

    async fn pull(
        &self,
        target: DocRef,
        field: &'static str,
        value: i64,
        counter: Option<&'static str>,
    ) -> Result<bool, AppError> {
        let op = WriteOp::Pull {
            target,
            field,
            value,
            counter,
        };
        match self.commit_ops(std::slice::from_ref(&op))?.first() {
            Some(OpEffect::SetChanged(changed)) => Ok(*changed),
            _ => Err(AppError::Internal("Pull produced no effect".into())),
        }
    }

    async fn increment(
        &self,
        target: DocRef,
        field: &'static str,
        delta: i64,
    ) -> Result<i64, AppError> {
        let op = WriteOp::Increment {
            target,
            field,
            delta,
        };
        match self.commit_ops(std::slice::from_ref(&op))?.first() {
            Some(OpEffect::Counter(value)) => Ok(*value),
            _ => Err(AppError::Internal("Increment produced no effect".into())),
        }
    }

    async fn run_transaction(&self, tx: Transaction) -> Result<(), AppError> {
        if tx.is_empty() {
            return Ok(());
        }
        self.commit_ops(tx.ops())?;
        Ok(())
    }
}
