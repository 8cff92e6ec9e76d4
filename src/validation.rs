//! Validation pass over one document
//!
//! Collects every validator registered on the document's schema and on the
//! sub-schemas of its embedded documents, starts all checks as independent
//! tokio tasks and gathers their verdicts into a [`ValidationReport`]:
//! - **Sync preparation**: each validator reads the document before any task starts
//! - **Concurrent checks**: one spawned task per registered validator
//! - **Verdicts**: `Ok(false)` becomes a [`ValidationFailure`], `Err` aborts the pass

use std::sync::{Arc, OnceLock};

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::ValidatorConfig;
use crate::document::{Document, SubDocument};
use crate::error::{IdValidatorError, Result};
use crate::schema::Schema;

/// Cached regex for message placeholders
static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| {
        Regex::new(r"\{(PATH|VALUE)\}").expect("Failed to compile placeholder regex")
    })
}

/// Substitute `{PATH}` and `{VALUE}` in a failure message template
pub fn format_message(template: &str, path: &str, value: Option<&Value>) -> String {
    get_placeholder_regex()
        .replace_all(template, |caps: &regex::Captures<'_>| match &caps[1] {
            "PATH" => path.to_string(),
            _ => match value {
                Some(Value::String(text)) => text.clone(),
                Some(other) => other.to_string(),
                None => "undefined".to_string(),
            },
        })
        .into_owned()
}

/// Validation pass configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationConfig {
    /// Return at the first failing field instead of waiting for every check
    pub fail_fast: bool,
}

impl From<&ValidatorConfig> for ValidationConfig {
    fn from(config: &ValidatorConfig) -> Self {
        Self {
            fail_fast: config.fail_fast,
        }
    }
}

/// One field whose references did not check out
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFailure {
    /// Full path of the field, including embedding prefixes such as `contacts.0.`
    pub path: String,
    pub message: String,
    pub value: Option<Value>,
}

/// Outcome of a validation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    /// The failure recorded for `path`, if any
    pub fn failure(&self, path: &str) -> Option<&ValidationFailure> {
        self.failures.iter().find(|failure| failure.path == path)
    }

    pub fn into_result(self) -> std::result::Result<(), DocumentValidationError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(DocumentValidationError {
                failures: self.failures,
            })
        }
    }
}

/// A document failed validation on one or more fields
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Validation failed: {}", join_messages(.failures))]
pub struct DocumentValidationError {
    pub failures: Vec<ValidationFailure>,
}

fn join_messages(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

struct PendingCheck {
    path: String,
    message: String,
    value: Option<Value>,
    check: BoxFuture<'static, Result<bool>>,
}

fn collect_checks(schema: &Arc<Schema>, doc: &dyn Document, prefix: &str, out: &mut Vec<PendingCheck>) {
    for (name, def) in schema.each_path() {
        let full_path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        let value = doc.get(&name);

        for registered in schema.validators(&name) {
            out.push(PendingCheck {
                path: full_path.clone(),
                message: format_message(&registered.message, &full_path, value),
                value: value.cloned(),
                check: registered.validator.validate(doc, value),
            });
        }

        let Some(sub) = def.sub_schema() else {
            continue;
        };
        match value {
            Some(Value::Object(fields)) if !def.is_array() => {
                collect_embedded(sub, doc, full_path, fields, out);
            }
            Some(Value::Array(items)) if def.is_array() => {
                for (index, item) in items.iter().enumerate() {
                    if let Value::Object(fields) = item {
                        collect_embedded(sub, doc, format!("{}.{}", full_path, index), fields, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn collect_embedded(
    schema: &Arc<Schema>,
    parent: &dyn Document,
    prefix: String,
    fields: &Map<String, Value>,
    out: &mut Vec<PendingCheck>,
) {
    let sub = SubDocument::new(parent, prefix, fields);
    collect_checks(schema, &sub, sub.prefix(), out);
}

type CheckHandle = JoinHandle<(String, String, Option<Value>, Result<bool>)>;

fn join_error(err: tokio::task::JoinError) -> IdValidatorError {
    IdValidatorError::Concurrency {
        details: format!("Task join error: {}", err),
    }
}

/// Run every registered validator against `doc`
///
/// Checks run as spawned tasks and always run to completion, even when
/// `fail_fast` returns before they finish. A store error from any check is
/// returned as `Err`; with several, the first in declaration order wins.
pub async fn validate_document(
    schema: &Arc<Schema>,
    doc: &dyn Document,
    config: ValidationConfig,
) -> Result<ValidationReport> {
    let mut pending = Vec::new();
    collect_checks(schema, doc, "", &mut pending);
    debug!(checks = pending.len(), fail_fast = config.fail_fast, "starting validation pass");

    let handles: Vec<CheckHandle> = pending
        .into_iter()
        .map(|pending| {
            tokio::spawn(async move {
                let outcome = pending.check.await;
                (pending.path, pending.message, pending.value, outcome)
            })
        })
        .collect();

    let mut report = ValidationReport::default();

    if config.fail_fast {
        let mut in_flight: FuturesUnordered<CheckHandle> = handles.into_iter().collect();
        while let Some(joined) = in_flight.next().await {
            let (path, message, value, outcome) = joined.map_err(join_error)?;
            if !outcome? {
                report.failures.push(ValidationFailure { path, message, value });
                break;
            }
        }
        return Ok(report);
    }

    let mut first_error = None;
    for handle in handles {
        let (path, message, value, outcome) = handle.await.map_err(join_error)?;
        match outcome {
            Ok(true) => {}
            Ok(false) => report.failures.push(ValidationFailure { path, message, value }),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => {
            debug!(failures = report.failures.len(), "validation pass finished");
            Ok(report)
        }
    }
}
