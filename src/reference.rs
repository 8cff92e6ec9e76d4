//! Field classification
//!
//! Every declared field falls into exactly one [`FieldShape`]: a reference to
//! check, a sub-schema to walk, or a plain field to leave alone.

use std::sync::Arc;

use serde_json::Value;

use crate::conditions::Conditions;
use crate::document::Document;
use crate::error::{IdValidatorError, Result};
use crate::schema::{FieldDef, FieldOptions, Schema};

/// Whether the field holds one id or a list of ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Scalar,
    Collection,
}

/// Where the referenced documents live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    /// Fixed collection name
    Static(String),
    /// Name of a field on the validated document holding the collection name
    Dynamic(String),
}

impl RefTarget {
    /// Effective collection name for `doc`
    pub fn resolve(&self, path: &str, doc: &dyn Document) -> Result<String> {
        match self {
            RefTarget::Static(name) => Ok(name.clone()),
            RefTarget::Dynamic(ref_path) => match doc.get(ref_path) {
                Some(Value::String(name)) if !name.is_empty() => Ok(name.clone()),
                _ => Err(IdValidatorError::UnresolvedRefPath {
                    path: path.to_string(),
                    ref_path: ref_path.clone(),
                }),
            },
        }
    }
}

/// Everything needed to check one reference field
#[derive(Debug, Clone)]
pub struct FieldReference {
    pub path: String,
    pub kind: ReferenceKind,
    pub target: RefTarget,
    pub conditions: Conditions,
}

#[derive(Debug, Clone)]
pub enum FieldShape {
    Reference(FieldReference),
    SubSchema(Arc<Schema>),
    Plain,
}

fn declared_target(options: &FieldOptions) -> Option<RefTarget> {
    match (&options.reference, &options.reference_path) {
        (Some(name), _) => Some(RefTarget::Static(name.clone())),
        (None, Some(ref_path)) => Some(RefTarget::Dynamic(ref_path.clone())),
        (None, None) => None,
    }
}

/// Classify one declared field
///
/// Sub-schema fields are reported as such whatever their options say. For
/// other fields the field's own `ref`/`refPath` wins over the element's.
/// Conditions come with the winning target; when the element supplies the
/// target without conditions, the field's own conditions apply.
pub fn classify(path: &str, def: &FieldDef) -> FieldShape {
    if let Some(schema) = def.sub_schema() {
        return FieldShape::SubSchema(Arc::clone(schema));
    }

    let kind = if def.is_array() {
        ReferenceKind::Collection
    } else {
        ReferenceKind::Scalar
    };

    let declared = match declared_target(&def.options) {
        Some(target) => Some((target, def.options.conditions.clone())),
        None => def.element().and_then(|element| {
            declared_target(&element.options).map(|target| {
                let conditions = element
                    .options
                    .conditions
                    .clone()
                    .or_else(|| def.options.conditions.clone());
                (target, conditions)
            })
        }),
    };

    match declared {
        Some((target, conditions)) => FieldShape::Reference(FieldReference {
            path: path.to_string(),
            kind,
            target,
            conditions: conditions.unwrap_or_default(),
        }),
        None => FieldShape::Plain,
    }
}
