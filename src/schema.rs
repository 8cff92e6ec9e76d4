//! Schema description consumed by the validators
//!
//! A [`Schema`] is an ordered set of declared fields plus the validators
//! registered on them. Schemas are shared behind `Arc`, carry a process-unique
//! [`SchemaId`] and accept new fields after construction, which is what allows
//! a schema to contain itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::BoxFuture;
use serde_json::Value;

use crate::conditions::Conditions;
use crate::document::Document;
use crate::error::{IdValidatorError, Result};

static NEXT_SCHEMA_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique schema identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(u64);

/// Declared type of a field
#[derive(Debug, Clone)]
pub enum SchemaType {
    ObjectId,
    String,
    Number,
    Boolean,
    Mixed,
    /// Array whose elements are cast through the given element definition
    Array(Box<FieldDef>),
    /// Array of embedded documents following a sub-schema
    DocumentArray(Arc<Schema>),
    /// Single embedded document following a sub-schema
    Embedded(Arc<Schema>),
}

/// Per-field options relevant to reference checking
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    /// Static target collection (`ref`)
    pub reference: Option<String>,
    /// Sibling field naming the target collection (`refPath`)
    pub reference_path: Option<String>,
    /// Extra constraints on the referenced document (`refConditions`)
    pub conditions: Option<Conditions>,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub kind: SchemaType,
    pub options: FieldOptions,
}

impl FieldDef {
    pub fn new(kind: SchemaType) -> Self {
        Self {
            kind,
            options: FieldOptions::default(),
        }
    }

    pub fn object_id() -> Self {
        Self::new(SchemaType::ObjectId)
    }

    pub fn string() -> Self {
        Self::new(SchemaType::String)
    }

    pub fn number() -> Self {
        Self::new(SchemaType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(SchemaType::Boolean)
    }

    pub fn mixed() -> Self {
        Self::new(SchemaType::Mixed)
    }

    /// An id field referencing a fixed collection
    pub fn reference(collection: impl Into<String>) -> Self {
        Self::object_id().with_ref(collection)
    }

    /// An id field whose target collection is named by `field` on the same document
    pub fn dynamic_reference(field: impl Into<String>) -> Self {
        Self::object_id().with_ref_path(field)
    }

    /// An array field; an array of embedded documents becomes a document array
    pub fn array_of(element: FieldDef) -> Self {
        match element.kind {
            SchemaType::Embedded(schema) => Self::new(SchemaType::DocumentArray(schema)),
            kind => Self::new(SchemaType::Array(Box::new(FieldDef {
                kind,
                options: element.options,
            }))),
        }
    }

    pub fn documents(schema: Arc<Schema>) -> Self {
        Self::new(SchemaType::DocumentArray(schema))
    }

    pub fn embedded(schema: Arc<Schema>) -> Self {
        Self::new(SchemaType::Embedded(schema))
    }

    pub fn with_ref(mut self, collection: impl Into<String>) -> Self {
        self.options.reference = Some(collection.into());
        self
    }

    pub fn with_ref_path(mut self, field: impl Into<String>) -> Self {
        self.options.reference_path = Some(field.into());
        self
    }

    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.options.conditions = Some(conditions);
        self
    }

    /// Element definition for array fields
    pub fn element(&self) -> Option<&FieldDef> {
        match &self.kind {
            SchemaType::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Sub-schema for embedded and document-array fields, including arrays of embedded elements
    pub fn sub_schema(&self) -> Option<&Arc<Schema>> {
        match &self.kind {
            SchemaType::DocumentArray(schema) | SchemaType::Embedded(schema) => Some(schema),
            SchemaType::Array(element) => element.sub_schema(),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self.kind,
            SchemaType::Array(_) | SchemaType::DocumentArray(_)
        )
    }
}

/// Asynchronous field check run during a validation pass
///
/// Implementations do all document-dependent work synchronously in
/// `validate` and return an owned future, so the outcome reflects the document
/// exactly as it was when validation was invoked.
pub trait AsyncValidator: Send + Sync {
    fn validate(&self, doc: &dyn Document, value: Option<&Value>) -> BoxFuture<'static, Result<bool>>;
}

/// A validator registered on a schema path with its failure message template
#[derive(Clone)]
pub struct RegisteredValidator {
    pub validator: Arc<dyn AsyncValidator>,
    pub message: String,
}

impl fmt::Debug for RegisteredValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredValidator")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

pub struct Schema {
    id: SchemaId,
    fields: RwLock<Vec<(String, FieldDef)>>,
    validators: RwLock<HashMap<String, Vec<RegisteredValidator>>>,
}

impl Schema {
    /// An empty schema; add fields with [`Schema::add`]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: SchemaId(NEXT_SCHEMA_ID.fetch_add(1, Ordering::Relaxed)),
            fields: RwLock::new(Vec::new()),
            validators: RwLock::new(HashMap::new()),
        })
    }

    /// A schema with the given fields, in order
    pub fn with_fields<I, S>(fields: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (S, FieldDef)>,
        S: Into<String>,
    {
        let schema = Self::new();
        for (name, def) in fields {
            schema.add(name, def);
        }
        schema
    }

    pub fn id(&self) -> SchemaId {
        self.id
    }

    /// Declare a field, replacing an existing declaration of the same name
    pub fn add(&self, name: impl Into<String>, def: FieldDef) {
        let name = name.into();
        let mut fields = self.fields.write().unwrap_or_else(PoisonError::into_inner);
        match fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = def,
            None => fields.push((name, def)),
        }
    }

    /// Snapshot of every declared field, in declaration order
    pub fn each_path(&self) -> Vec<(String, FieldDef)> {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn path(&self, name: &str) -> Option<FieldDef> {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, def)| def.clone())
    }

    /// Register a validator on a declared path
    pub fn add_validator(
        &self,
        path: &str,
        validator: Arc<dyn AsyncValidator>,
        message: impl Into<String>,
    ) -> Result<()> {
        if self.path(path).is_none() {
            return Err(IdValidatorError::UnknownPath {
                path: path.to_string(),
            });
        }

        self.validators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_string())
            .or_default()
            .push(RegisteredValidator {
                validator,
                message: message.into(),
            });
        Ok(())
    }

    pub fn validators(&self, path: &str) -> Vec<RegisteredValidator> {
        self.validators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn validator_count(&self) -> usize {
        self.validators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Field definitions may contain this schema again; print names only
        let names: Vec<String> = self
            .fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        f.debug_struct("Schema")
            .field("id", &self.id)
            .field("fields", &names)
            .finish_non_exhaustive()
    }
}
