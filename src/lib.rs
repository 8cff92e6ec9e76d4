//! # id-validator Library
//!
//! Referential-integrity validators for schema-driven document stores. Attach
//! the validators to a schema once and every validation pass confirms that
//! the documents its reference fields point at actually exist, optionally
//! subject to extra filter conditions.

pub mod checker;
pub mod conditions;
pub mod config;
pub mod document;
pub mod error;
pub mod memory;
pub mod reference;
pub mod schema;
pub mod store;
pub mod validation;
pub mod validator;

pub use checker::{execute_query, validate_id, validate_id_array};
pub use conditions::{ConditionResolver, ConditionValue, Conditions};
pub use config::{
    ConfigManager, DEFAULT_MESSAGE, EnvProvider, SystemEnvProvider, ValidatorConfig,
    ValidatorOptions,
};
pub use document::{Doc, Document, SubDocument};
pub use error::{ConfigError, IdValidatorError, Result, StoreError};
pub use memory::{MemoryCollection, MemoryConnection, MemoryModel};
pub use reference::{FieldReference, FieldShape, RefTarget, ReferenceKind, classify};
pub use schema::{AsyncValidator, FieldDef, FieldOptions, Schema, SchemaId, SchemaType};
pub use store::{
    Collection, Connection, CountQuery, IdFilter, QueryFilter, Session, count_documents,
    default_connection, set_default_connection,
};
pub use validation::{
    DocumentValidationError, ValidationConfig, ValidationFailure, ValidationReport,
    format_message, validate_document,
};
pub use validator::{IdValidator, ReferenceValidator, attach};
