//! Existence checks
//!
//! Each check issues exactly one count query against the target collection and
//! compares the count with the number of ids it expects to find. A mismatch is
//! `Ok(false)`; only a failing query is an `Err`.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Result;
use crate::reference::ReferenceKind;
use crate::store::{Connection, CountQuery, IdFilter, Session, count_documents};

/// Whether `value` holds no reference at all for a field of `kind`
///
/// Absent references are always valid; making them mandatory is a separate
/// schema constraint.
pub fn is_absent(kind: ReferenceKind, value: Option<&Value>) -> bool {
    match (kind, value) {
        (_, None | Some(Value::Null)) => true,
        (ReferenceKind::Collection, Some(Value::Array(items))) => items.is_empty(),
        _ => false,
    }
}

/// The id carried by a reference value; embedded documents contribute their `_id`
fn id_of(value: &Value) -> Value {
    match value {
        Value::Object(fields) => fields.get("_id").cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

/// Check a single reference
pub async fn validate_id(
    connection: Arc<dyn Connection>,
    target: String,
    value: Option<Value>,
    conditions: Map<String, Value>,
    session: Option<Session>,
) -> Result<bool> {
    let value = match value {
        None | Some(Value::Null) => return Ok(true),
        Some(value) => id_of(&value),
    };

    let collection = connection.model(&target)?;
    let mut query = count_documents(collection, IdFilter::Eq(value));
    if let Some(session) = session {
        query = query.session(session);
    }

    execute_query(query, conditions, 1).await
}

/// Check a list of references
///
/// With `allow_duplicates` the ids are deduplicated first (keeping first
/// occurrences) and every distinct id must exist. Without it the raw list
/// length is expected, so a repeated id can never be satisfied.
pub async fn validate_id_array(
    connection: Arc<dyn Connection>,
    target: String,
    values: Option<Value>,
    conditions: Map<String, Value>,
    session: Option<Session>,
    allow_duplicates: bool,
) -> Result<bool> {
    let values: Vec<Value> = match values {
        None | Some(Value::Null) => return Ok(true),
        Some(Value::Array(items)) => items.iter().map(id_of).collect(),
        Some(single) => vec![id_of(&single)],
    };
    if values.is_empty() {
        return Ok(true);
    }

    let check_values = if allow_duplicates {
        let mut unique: Vec<Value> = Vec::with_capacity(values.len());
        for value in values {
            if !unique.contains(&value) {
                unique.push(value);
            }
        }
        unique
    } else {
        values
    };

    let expected = check_values.len() as u64;
    let collection = connection.model(&target)?;
    let mut query = count_documents(collection, IdFilter::In(check_values));
    if let Some(session) = session {
        query = query.session(session);
    }

    execute_query(query, conditions, expected).await
}

/// Apply `conditions` as equality filters, run the query and compare counts
pub async fn execute_query(
    query: CountQuery,
    conditions: Map<String, Value>,
    expected: u64,
) -> Result<bool> {
    let query = conditions
        .into_iter()
        .fold(query, |query, (field, value)| query.where_eq(field, value));
    let collection = query.collection_name().to_string();

    match query.exec().await {
        Ok(count) => {
            debug!(collection = %collection, count, expected, "reference count query finished");
            Ok(count == expected)
        }
        Err(err) => {
            warn!(collection = %collection, error = %err, "reference count query failed");
            Err(err.into())
        }
    }
}
