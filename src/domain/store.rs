//! Entity store contract.
//!
//! The store is treated as a transactional document store: every entity is
//! a JSON document in one of five collections, addressed by snowflake id.
//! The trait lives in the domain layer and is implemented in the
//! infrastructure layer to maintain dependency inversion.
//!
//! Multi-record mutations are expressed as a [`Transaction`], an ordered
//! list of [`WriteOp`]s committed all-or-nothing. Array fields with a
//! denormalized counter pass the counter field alongside the array op; the
//! store bumps the counter by exactly the number of elements the op
//! actually added or removed, which is what keeps `count == len`
//! invariants from drifting.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::shared::error::AppError;

/// Storage collections, one per record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Posts,
    Comments,
    Chats,
    Messages,
}

impl Collection {
    /// Every collection, in a fixed order.
    pub const ALL: [Collection; 5] = [
        Collection::Users,
        Collection::Posts,
        Collection::Comments,
        Collection::Chats,
        Collection::Messages,
    ];

    /// Collection name as stored and logged.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Posts => "posts",
            Self::Comments => "comments",
            Self::Chats => "chats",
            Self::Messages => "messages",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A record stored as a JSON document in one collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The collection this record type lives in.
    const COLLECTION: Collection;

    /// The record's snowflake id.
    fn id(&self) -> i64;
}

/// Typed pointer to a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocRef {
    pub collection: Collection,
    pub id: i64,
}

impl DocRef {
    pub fn new(collection: Collection, id: i64) -> Self {
        Self { collection, id }
    }

    pub fn user(id: i64) -> Self {
        Self::new(Collection::Users, id)
    }

    pub fn post(id: i64) -> Self {
        Self::new(Collection::Posts, id)
    }

    pub fn comment(id: i64) -> Self {
        Self::new(Collection::Comments, id)
    }

    pub fn chat(id: i64) -> Self {
        Self::new(Collection::Chats, id)
    }

    pub fn message(id: i64) -> Self {
        Self::new(Collection::Messages, id)
    }
}

impl std::fmt::Display for DocRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Serialize a record into its document form.
pub fn to_document<R: Record>(record: &R) -> Result<Value, AppError> {
    serde_json::to_value(record)
        .map_err(|e| AppError::Internal(format!("Failed to serialize {}: {}", R::COLLECTION, e)))
}

/// Deserialize a document back into a record.
pub fn from_document<R: Record>(document: Value) -> Result<R, AppError> {
    serde_json::from_value(document)
        .map_err(|e| AppError::Internal(format!("Corrupt {} document: {}", R::COLLECTION, e)))
}

/// One write inside a transaction.
///
/// Array ops carry an optional `counter` field name; when set, the counter
/// is adjusted by the number of elements the op actually changed.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert a new document. Fails with `Conflict` on a duplicate id or a
    /// unique index violation.
    Insert {
        collection: Collection,
        id: i64,
        document: Value,
    },

    /// Merge the given fields into an existing document.
    Update { target: DocRef, fields: Value },

    /// Remove a document.
    Delete { target: DocRef },

    /// Add a value to a set-valued array field; no-op when already present.
    AddToSet {
        target: DocRef,
        field: &'static str,
        value: i64,
        counter: Option<&'static str>,
    },

    /// Append a value to an ordered array field.
    Push {
        target: DocRef,
        field: &'static str,
        value: i64,
        counter: Option<&'static str>,
    },

    /// Remove every occurrence of a value from an array field; no-op when
    /// absent.
    Pull {
        target: DocRef,
        field: &'static str,
        value: i64,
        counter: Option<&'static str>,
    },

    /// Add a signed delta to a numeric field.
    Increment {
        target: DocRef,
        field: &'static str,
        delta: i64,
    },
}

impl WriteOp {
    /// The document this op touches.
    pub fn target(&self) -> DocRef {
        match self {
            WriteOp::Insert { collection, id, .. } => DocRef::new(*collection, *id),
            WriteOp::Update { target, .. }
            | WriteOp::Delete { target }
            | WriteOp::AddToSet { target, .. }
            | WriteOp::Push { target, .. }
            | WriteOp::Pull { target, .. }
            | WriteOp::Increment { target, .. } => *target,
        }
    }
}

/// An ordered list of writes committed all-or-nothing.
///
/// Ops are applied in the order they were added; if any op fails, none of
/// them remain visible.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    ops: Vec<WriteOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an insert of a full record.
    pub fn insert<R: Record>(&mut self, record: &R) -> Result<(), AppError> {
        self.ops.push(WriteOp::Insert {
            collection: R::COLLECTION,
            id: record.id(),
            document: to_document(record)?,
        });
        Ok(())
    }

    /// Queue a field merge.
    pub fn update(&mut self, target: DocRef, fields: Value) {
        self.ops.push(WriteOp::Update { target, fields });
    }

    /// Queue a document removal.
    pub fn delete(&mut self, target: DocRef) {
        self.ops.push(WriteOp::Delete { target });
    }

    /// Queue a set insertion.
    pub fn add_to_set(
        &mut self,
        target: DocRef,
        field: &'static str,
        value: i64,
        counter: Option<&'static str>,
    ) {
        self.ops.push(WriteOp::AddToSet {
            target,
            field,
            value,
            counter,
        });
    }

    /// Queue an ordered append.
    pub fn push(
        &mut self,
        target: DocRef,
        field: &'static str,
        value: i64,
        counter: Option<&'static str>,
    ) {
        self.ops.push(WriteOp::Push {
            target,
            field,
            value,
            counter,
        });
    }

    /// Queue an array removal.
    pub fn pull(
        &mut self,
        target: DocRef,
        field: &'static str,
        value: i64,
        counter: Option<&'static str>,
    ) {
        self.ops.push(WriteOp::Pull {
            target,
            field,
            value,
            counter,
        });
    }

    /// Queue a numeric delta.
    pub fn increment(&mut self, target: DocRef, field: &'static str, delta: i64) {
        self.ops.push(WriteOp::Increment {
            target,
            field,
            delta,
        });
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Data access contract for all five record types.
///
/// Implementations must guarantee:
/// - `run_transaction` commits every op or none of them; partial effects
///   are never visible to concurrent readers
/// - unique index violations surface as `Conflict`
/// - counter-paired array ops keep the counter equal to the array length
/// - a timed-out round trip surfaces as the retryable `Unavailable`
#[async_trait]
pub trait EntityStore: Send + Sync + 'static {
    /// Fetch one record by id.
    async fn get<R: Record>(&self, id: i64) -> Result<Option<R>, AppError>;

    /// Fetch every record in a collection.
    async fn list<R: Record>(&self) -> Result<Vec<R>, AppError>;

    /// Fetch the records matching a predicate.
    async fn find<R, P>(&self, predicate: P) -> Result<Vec<R>, AppError>
    where
        R: Record,
        P: Fn(&R) -> bool + Send + Sync;

    /// Insert a new record. Fails with `Conflict` on a duplicate id or a
    /// unique index violation.
    async fn insert<R: Record>(&self, record: &R) -> Result<(), AppError>;

    /// Merge fields into an existing document.
    async fn update_fields(&self, target: DocRef, fields: Value) -> Result<(), AppError>;

    /// Remove a document.
    async fn delete(&self, target: DocRef) -> Result<(), AppError>;

    /// Atomically add a value to a set-valued field. Returns whether the
    /// set changed; a paired counter is bumped only on change.
    async fn add_to_set(
        &self,
        target: DocRef,
        field: &'static str,
        value: i64,
        counter: Option<&'static str>,
    ) -> Result<bool, AppError>;

    /// Atomically remove a value from a set-valued field. Returns whether
    /// the set changed; a paired counter is decremented only on change.
    async fn remove_from_set(
        &self,
        target: DocRef,
        field: &'static str,
        value: i64,
        counter: Option<&'static str>,
    ) -> Result<bool, AppError>;

    /// Atomically append a value to an ordered array field. A paired
    /// counter is bumped with the append.
    async fn push(
        &self,
        target: DocRef,
        field: &'static str,
        value: i64,
        counter: Option<&'static str>,
    ) -> Result<(), AppError>;

    /// Atomically remove every occurrence of a value from an array field.
    /// Returns whether the array changed; a paired counter moves by the
    /// number of removed elements.
    async fn pull(
        &self,
        target: DocRef,
        field: &'static str,
        value: i64,
        counter: Option<&'static str>,
    ) -> Result<bool, AppError>;

    /// Atomically add a delta to a numeric field, returning the new value.
    async fn increment(
        &self,
        target: DocRef,
        field: &'static str,
        delta: i64,
    ) -> Result<i64, AppError>;

    /// Commit an ordered list of writes all-or-nothing.
    async fn run_transaction(&self, tx: Transaction) -> Result<(), AppError>;
}
