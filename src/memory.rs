//! In-memory document store
//!
//! Implements the store contract over JSON documents. Each collection counts
//! the queries it answers and records the sessions they ran in, and can be told
//! to fail, so callers can observe exactly what the validators asked for.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::document::{Doc, lookup};
use crate::error::{Result, StoreError, StoreResult};
use crate::schema::Schema;
use crate::store::{Collection, Connection, QueryFilter, Session};
use crate::validation::{ValidationConfig, ValidationReport, validate_document};

/// Generate a fresh document id
pub fn generate_id() -> Value {
    Value::String(Uuid::new_v4().simple().to_string())
}

pub struct MemoryConnection {
    name: String,
    collections: RwLock<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryConnection {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            collections: RwLock::new(HashMap::new()),
        })
    }

    /// Register a collection, returning the existing one if the name is taken
    pub fn create_collection(&self, name: &str) -> Arc<MemoryCollection> {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            collections
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MemoryCollection::new(name))),
        )
    }

    pub fn collection(&self, name: &str) -> Option<Arc<MemoryCollection>> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Remove every document from every collection
    pub fn drop_database(&self) {
        for collection in self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
        {
            collection.clear();
        }
    }
}

impl Connection for MemoryConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self, name: &str) -> StoreResult<Arc<dyn Collection>> {
        match self.collection(name) {
            Some(collection) => Ok(collection as Arc<dyn Collection>),
            None => Err(StoreError::UnknownCollection {
                name: name.to_string(),
            }),
        }
    }
}

pub struct MemoryCollection {
    name: String,
    documents: RwLock<Vec<Map<String, Value>>>,
    count_calls: AtomicUsize,
    sessions: Mutex<Vec<Uuid>>,
    failure: Mutex<Option<StoreError>>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(Vec::new()),
            count_calls: AtomicUsize::new(0),
            sessions: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    /// Store a JSON object, replacing any document with the same `_id`
    ///
    /// Returns the document id, generated when the object carries none.
    pub fn insert(&self, document: Value) -> StoreResult<Value> {
        let mut fields = match document {
            Value::Object(fields) => fields,
            other => {
                return Err(StoreError::InvalidDocument {
                    collection: self.name.clone(),
                    details: format!("expected a JSON object, got {}", other),
                });
            }
        };
        let id = fields
            .entry("_id")
            .or_insert_with(generate_id)
            .clone();

        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match documents
            .iter_mut()
            .find(|existing| existing.get("_id") == Some(&id))
        {
            Some(existing) => *existing = fields,
            None => documents.push(fields),
        }
        Ok(id)
    }

    /// Remove the document with `id`; returns whether one was removed
    pub fn remove(&self, id: &Value) -> bool {
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = documents.len();
        documents.retain(|existing| existing.get("_id") != Some(id));
        documents.len() != before
    }

    pub fn clear(&self) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn find_by_id(&self, id: &Value) -> Option<Map<String, Value>> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|existing| existing.get("_id") == Some(id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of count queries answered or refused so far
    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn sessions_seen(&self) -> Vec<Uuid> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make every following count query fail with `error`
    pub fn fail_with(&self, error: StoreError) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn matches(document: &Map<String, Value>, filter: &QueryFilter) -> bool {
        let id_matches = document
            .get("_id")
            .is_some_and(|id| filter.id.matches(id));
        id_matches
            && filter
                .conditions
                .iter()
                .all(|(field, expected)| lookup(document, field) == Some(expected))
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn count(&self, filter: &QueryFilter, session: Option<&Session>) -> StoreResult<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(session) = session {
            self.sessions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(session.id());
        }
        if let Some(error) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }

        let documents = self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(documents
            .iter()
            .filter(|document| Self::matches(document, filter))
            .count() as u64)
    }
}

/// A schema bound to a collection, driving validate and save cycles
pub struct MemoryModel {
    schema: Arc<Schema>,
    collection: Arc<MemoryCollection>,
    config: ValidationConfig,
}

impl MemoryModel {
    pub fn new(schema: Arc<Schema>, collection: Arc<MemoryCollection>) -> Self {
        Self {
            schema,
            collection,
            config: ValidationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn collection(&self) -> &Arc<MemoryCollection> {
        &self.collection
    }

    pub async fn validate(&self, doc: &Doc) -> Result<ValidationReport> {
        validate_document(&self.schema, doc, self.config).await
    }

    /// Validate, then persist the document if every reference checked out
    pub async fn save(&self, doc: &mut Doc) -> Result<ValidationReport> {
        if doc.id().is_none() {
            doc.set("_id", generate_id());
        }

        let report = self.validate(doc).await?;
        if report.is_valid() {
            self.collection
                .insert(Value::Object(doc.fields().clone()))?;
            doc.mark_clean();
        }
        Ok(report)
    }

    /// Load a stored document; the result has no modified paths
    pub fn find_by_id(&self, id: &Value) -> Option<Doc> {
        self.collection.find_by_id(id).map(Doc::from_persisted)
    }
}
