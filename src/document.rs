//! Validation-time view of a document
//!
//! Validators read three things from the document under validation: field
//! values, whether a field changed since the document was loaded, and the
//! transaction handle the document is bound to. The last two are optional
//! capabilities; a document that cannot answer them returns `None`.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::store::Session;

pub trait Document: Send + Sync {
    /// Value at a dotted path
    fn get(&self, path: &str) -> Option<&Value>;

    /// Whether `path` changed since the document was loaded, if the document tracks changes
    fn is_modified(&self, _path: &str) -> Option<bool> {
        None
    }

    /// Transaction handle the document is bound to
    fn session(&self) -> Option<Session> {
        None
    }
}

/// Walk a dotted path through nested objects and arrays
pub fn lookup<'a>(fields: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn paths_overlap(changed: &str, asked: &str) -> bool {
    fn is_prefix(prefix: &str, path: &str) -> bool {
        path.len() > prefix.len()
            && path.starts_with(prefix)
            && path.as_bytes()[prefix.len()] == b'.'
    }
    changed == asked || is_prefix(changed, asked) || is_prefix(asked, changed)
}

/// Owned JSON document with change tracking
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Doc {
    fields: Map<String, Value>,
    modified: BTreeSet<String>,
    session: Option<Session>,
}

impl Doc {
    /// A new, unsaved document; every top-level field counts as modified
    pub fn new(fields: Map<String, Value>) -> Self {
        let modified = fields.keys().cloned().collect();
        Self {
            fields,
            modified,
            session: None,
        }
    }

    /// Build a new document from a JSON object literal; non-objects yield an empty document
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self::new(fields),
            _ => Self::default(),
        }
    }

    /// A document as loaded from the store; nothing is modified
    pub fn from_persisted(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            modified: BTreeSet::new(),
            session: None,
        }
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Set a top-level field and mark it modified
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        self.modified.insert(field.clone());
        self.fields.insert(field, value);
    }

    /// Forget all recorded modifications, as after a successful save
    pub fn mark_clean(&mut self) {
        self.modified.clear();
    }

    pub fn id(&self) -> Option<&Value> {
        self.fields.get("_id")
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn modified_paths(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(String::as_str)
    }
}

impl Document for Doc {
    fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.fields, path)
    }

    fn is_modified(&self, path: &str) -> Option<bool> {
        Some(
            self.modified
                .iter()
                .any(|changed| paths_overlap(changed, path)),
        )
    }

    fn session(&self) -> Option<Session> {
        self.session.clone()
    }
}

/// Embedded object seen as a document of its own
///
/// Field lookups are local to the embedded object. Modification and session
/// queries go to the parent with the embedding prefix applied.
pub struct SubDocument<'a> {
    parent: &'a dyn Document,
    prefix: String,
    fields: &'a Map<String, Value>,
}

impl<'a> SubDocument<'a> {
    pub fn new(parent: &'a dyn Document, prefix: String, fields: &'a Map<String, Value>) -> Self {
        Self {
            parent,
            prefix,
            fields,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Document for SubDocument<'_> {
    fn get(&self, path: &str) -> Option<&Value> {
        lookup(self.fields, path)
    }

    fn is_modified(&self, path: &str) -> Option<bool> {
        self.parent
            .is_modified(&format!("{}.{}", self.prefix, path))
    }

    fn session(&self) -> Option<Session> {
        self.parent.session()
    }
}
