//! Document store contract
//!
//! The validators never talk to a concrete database. They resolve a collection
//! handle through a [`Connection`] and run a single count query built with
//! [`CountQuery`]. Any store able to answer "how many documents match this
//! filter" can back the validators.

use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreResult;

/// Transaction handle inherited from the document being validated
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    id: Uuid,
}

impl Session {
    /// Start a new session with a fresh identity
    pub fn start() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Identity part of a count filter
#[derive(Debug, Clone, PartialEq)]
pub enum IdFilter {
    /// `_id` equals the value
    Eq(Value),
    /// `_id` is any of the values
    In(Vec<Value>),
}

impl IdFilter {
    pub fn matches(&self, id: &Value) -> bool {
        match self {
            IdFilter::Eq(expected) => expected == id,
            IdFilter::In(candidates) => candidates.contains(id),
        }
    }
}

/// Full filter handed to [`Collection::count`]
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    pub id: IdFilter,
    /// Additional equality constraints, in the order they were added
    pub conditions: Vec<(String, Value)>,
}

/// Handle to one backing data store instance
pub trait Connection: Send + Sync {
    /// Connection name, used in logs
    fn name(&self) -> &str;

    /// Resolve a collection handle by name
    fn model(&self, name: &str) -> StoreResult<Arc<dyn Collection>>;
}

/// Handle to one named collection
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Count the documents matching `filter`, inside `session` when given
    async fn count(&self, filter: &QueryFilter, session: Option<&Session>) -> StoreResult<u64>;
}

/// Deferred count query
pub struct CountQuery {
    collection: Arc<dyn Collection>,
    filter: QueryFilter,
    session: Option<Session>,
}

/// Build a deferred count query against `collection`
pub fn count_documents(collection: Arc<dyn Collection>, id: IdFilter) -> CountQuery {
    CountQuery {
        collection,
        filter: QueryFilter {
            id,
            conditions: Vec::new(),
        },
        session: None,
    }
}

impl CountQuery {
    /// Add an equality filter on `field`
    pub fn where_eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filter.conditions.push((field.into(), value));
        self
    }

    /// Bind the query to a transaction context
    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn filter(&self) -> &QueryFilter {
        &self.filter
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    /// Run the query
    pub async fn exec(self) -> StoreResult<u64> {
        self.collection
            .count(&self.filter, self.session.as_ref())
            .await
    }
}

impl fmt::Debug for CountQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountQuery")
            .field("collection", &self.collection.name())
            .field("filter", &self.filter)
            .field("session", &self.session)
            .finish()
    }
}

static DEFAULT_CONNECTION: OnceLock<RwLock<Option<Arc<dyn Connection>>>> = OnceLock::new();

fn default_slot() -> &'static RwLock<Option<Arc<dyn Connection>>> {
    DEFAULT_CONNECTION.get_or_init(|| RwLock::new(None))
}

/// Install the process-wide default connection
pub fn set_default_connection(connection: Arc<dyn Connection>) {
    let mut slot = default_slot()
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *slot = Some(connection);
}

/// The process-wide default connection, if one was installed
pub fn default_connection() -> Option<Arc<dyn Connection>> {
    default_slot()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}
