//! Filter conditions a referenced document must satisfy beyond existing
//!
//! Entries are literals, nested condition maps, or resolvers that compute the
//! value from the document being validated. Resolvers run once per validation
//! against that document, never ahead of time.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::document::Document;

/// Computes a condition value from the document under validation
pub type ConditionResolver = Arc<dyn Fn(&dyn Document) -> Value + Send + Sync>;

#[derive(Clone)]
pub enum ConditionValue {
    Literal(Value),
    Resolver(ConditionResolver),
    Nested(Conditions),
    /// Sequence whose items may themselves be resolvers, as in `{"$in": [..]}`
    List(Vec<ConditionValue>),
}

impl ConditionValue {
    /// A value computed from the validated document
    pub fn resolver<F>(resolver: F) -> Self
    where
        F: Fn(&dyn Document) -> Value + Send + Sync + 'static,
    {
        ConditionValue::Resolver(Arc::new(resolver))
    }

    fn has_resolvers(&self) -> bool {
        match self {
            ConditionValue::Literal(_) => false,
            ConditionValue::Resolver(_) => true,
            ConditionValue::Nested(nested) => nested.has_resolvers(),
            ConditionValue::List(items) => items.iter().any(ConditionValue::has_resolvers),
        }
    }

    fn resolve(&self, doc: &dyn Document) -> Value {
        match self {
            ConditionValue::Literal(value) => value.clone(),
            ConditionValue::Resolver(resolver) => resolver(doc),
            ConditionValue::Nested(nested) => Value::Object(nested.resolve(doc)),
            ConditionValue::List(items) => {
                Value::Array(items.iter().map(|item| item.resolve(doc)).collect())
            }
        }
    }

    fn to_literal(&self) -> Option<Value> {
        match self {
            ConditionValue::Literal(value) => Some(value.clone()),
            ConditionValue::Resolver(_) => None,
            ConditionValue::Nested(nested) => nested.to_literal().map(Value::Object),
            ConditionValue::List(items) => items
                .iter()
                .map(ConditionValue::to_literal)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
        }
    }
}

impl fmt::Debug for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            ConditionValue::Resolver(_) => f.write_str("Resolver(..)"),
            ConditionValue::Nested(nested) => f.debug_tuple("Nested").field(nested).finish(),
            ConditionValue::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

impl From<Value> for ConditionValue {
    fn from(value: Value) -> Self {
        ConditionValue::Literal(value)
    }
}

impl From<Vec<ConditionValue>> for ConditionValue {
    fn from(items: Vec<ConditionValue>) -> Self {
        ConditionValue::List(items)
    }
}

impl From<Conditions> for ConditionValue {
    fn from(nested: Conditions) -> Self {
        ConditionValue::Nested(nested)
    }
}

/// Ordered field-name to condition mapping
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    entries: Vec<(String, ConditionValue)>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a literal or nested entry
    pub fn with(mut self, field: impl Into<String>, value: impl Into<ConditionValue>) -> Self {
        self.insert(field.into(), value.into());
        self
    }

    /// Add or replace an entry computed from the validated document
    pub fn with_resolver<F>(mut self, field: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&dyn Document) -> Value + Send + Sync + 'static,
    {
        self.insert(field.into(), ConditionValue::resolver(resolver));
        self
    }

    fn insert(&mut self, field: String, value: ConditionValue) {
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, field: &str) -> Option<&ConditionValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Whether any entry, at any depth, needs the validated document
    pub fn has_resolvers(&self) -> bool {
        self.entries.iter().any(|(_, value)| value.has_resolvers())
    }

    /// Resolve a fresh copy against `doc`
    pub fn resolve(&self, doc: &dyn Document) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(field, value)| (field.clone(), value.resolve(doc)))
            .collect()
    }

    /// The conditions as plain values, when no entry needs a document
    pub fn to_literal(&self) -> Option<Map<String, Value>> {
        self.entries
            .iter()
            .map(|(field, value)| value.to_literal().map(|v| (field.clone(), v)))
            .collect()
    }
}

impl From<Map<String, Value>> for Conditions {
    fn from(map: Map<String, Value>) -> Self {
        let entries = map
            .into_iter()
            .map(|(field, value)| (field, ConditionValue::Literal(value)))
            .collect();
        Self { entries }
    }
}
