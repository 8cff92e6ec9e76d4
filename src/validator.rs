//! Reference validator attachment
//!
//! [`attach`] walks a schema once, classifies every field and registers a
//! [`ReferenceValidator`] on each reference field. Sub-schemas are walked with
//! the same message and connection; a visited set of [`SchemaId`]s stops the
//! walk on self-referencing and mutually-referencing schemas.
//!
//! [`IdValidator`] is the stateful variant: every schema attached through one
//! instance shares its on/off switch.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::checker::{is_absent, validate_id, validate_id_array};
use crate::config::{DEFAULT_MESSAGE, ValidatorOptions};
use crate::document::Document;
use crate::error::{IdValidatorError, Result};
use crate::reference::{FieldReference, FieldShape, ReferenceKind, classify};
use crate::schema::{AsyncValidator, Schema, SchemaId};
use crate::store::{Connection, Session, default_connection};

/// Attach reference validators to `schema` and every sub-schema it contains
pub fn attach(schema: &Arc<Schema>, options: ValidatorOptions) -> Result<()> {
    attach_with_toggle(schema, options, None)
}

/// Plugin instance with a shared enable/disable switch
#[derive(Debug, Clone)]
pub struct IdValidator {
    enabled: Arc<AtomicBool>,
}

impl Default for IdValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdValidator {
    pub fn new() -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Same as [`attach`], with every registered validator bound to this instance's switch
    pub fn validate(&self, schema: &Arc<Schema>, options: ValidatorOptions) -> Result<()> {
        attach_with_toggle(schema, options, Some(Arc::clone(&self.enabled)))
    }
}

fn attach_with_toggle(
    schema: &Arc<Schema>,
    options: ValidatorOptions,
    toggle: Option<Arc<AtomicBool>>,
) -> Result<()> {
    let mut walker = SchemaWalker {
        message: options
            .message
            .unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
        connection: options.connection,
        toggle,
        visited: HashSet::new(),
    };
    walker.walk(schema, options.allow_duplicates)
}

struct SchemaWalker {
    message: String,
    connection: Option<Arc<dyn Connection>>,
    toggle: Option<Arc<AtomicBool>>,
    visited: HashSet<SchemaId>,
}

impl SchemaWalker {
    fn walk(&mut self, schema: &Arc<Schema>, allow_duplicates: bool) -> Result<()> {
        self.visited.insert(schema.id());

        for (path, def) in schema.each_path() {
            match classify(&path, &def) {
                FieldShape::SubSchema(sub) => {
                    // The duplicate policy stays with the schema it was given for
                    if !self.visited.contains(&sub.id()) {
                        self.walk(&sub, false)?;
                    }
                }
                FieldShape::Reference(reference) => {
                    debug!(
                        path = %reference.path,
                        target = ?reference.target,
                        kind = ?reference.kind,
                        "registering reference validator"
                    );
                    let validator = ReferenceValidator::new(
                        reference,
                        self.connection.clone(),
                        allow_duplicates,
                        self.toggle.clone(),
                    );
                    schema.add_validator(&path, Arc::new(validator), self.message.clone())?;
                }
                FieldShape::Plain => {}
            }
        }

        Ok(())
    }
}

/// Validator registered on one reference field
pub struct ReferenceValidator {
    reference: FieldReference,
    /// Conditions resolved once when none of them depend on the document
    literal_conditions: Option<Map<String, Value>>,
    connection: Option<Arc<dyn Connection>>,
    allow_duplicates: bool,
    toggle: Option<Arc<AtomicBool>>,
}

struct PreparedCheck {
    connection: Arc<dyn Connection>,
    target: String,
    conditions: Map<String, Value>,
    session: Option<Session>,
}

impl ReferenceValidator {
    pub fn new(
        reference: FieldReference,
        connection: Option<Arc<dyn Connection>>,
        allow_duplicates: bool,
        toggle: Option<Arc<AtomicBool>>,
    ) -> Self {
        let literal_conditions = reference.conditions.to_literal();
        Self {
            reference,
            literal_conditions,
            connection,
            allow_duplicates,
            toggle,
        }
    }

    pub fn reference(&self) -> &FieldReference {
        &self.reference
    }

    fn is_enabled(&self) -> bool {
        self.toggle
            .as_ref()
            .is_none_or(|enabled| enabled.load(Ordering::SeqCst))
    }

    fn prepare(&self, doc: &dyn Document) -> Result<PreparedCheck> {
        let path = &self.reference.path;
        let connection = self
            .connection
            .clone()
            .or_else(default_connection)
            .ok_or_else(|| IdValidatorError::NoConnection { path: path.clone() })?;
        let target = self.reference.target.resolve(path, doc)?;
        let conditions = match &self.literal_conditions {
            Some(literal) => literal.clone(),
            None => self.reference.conditions.resolve(doc),
        };

        Ok(PreparedCheck {
            connection,
            target,
            conditions,
            session: doc.session(),
        })
    }
}

impl AsyncValidator for ReferenceValidator {
    fn validate(&self, doc: &dyn Document, value: Option<&Value>) -> BoxFuture<'static, Result<bool>> {
        let path = &self.reference.path;

        if doc.is_modified(path) == Some(false) {
            trace!(path = %path, "reference unchanged since load, skipping check");
            return future::ready(Ok(true)).boxed();
        }
        if !self.is_enabled() {
            trace!(path = %path, "reference validation disabled, skipping check");
            return future::ready(Ok(true)).boxed();
        }
        if is_absent(self.reference.kind, value) {
            return future::ready(Ok(true)).boxed();
        }

        let check = match self.prepare(doc) {
            Ok(check) => check,
            Err(err) => return future::ready(Err(err)).boxed(),
        };
        let value = value.cloned();

        match self.reference.kind {
            ReferenceKind::Scalar => validate_id(
                check.connection,
                check.target,
                value,
                check.conditions,
                check.session,
            )
            .boxed(),
            ReferenceKind::Collection => validate_id_array(
                check.connection,
                check.target,
                value,
                check.conditions,
                check.session,
                self.allow_duplicates,
            )
            .boxed(),
        }
    }
}
