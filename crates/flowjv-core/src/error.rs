//! Error taxonomy.
//!
//! Every variant carries a stable `FLOWJV_E_*` code so hosts can match on
//! errors without parsing messages.
//!
//! | error | raised | fatal to |
//! |---|---|---|
//! | [`LogicError::UnknownOperator`] | schema load | the load |
//! | [`LogicError::TypeMismatch`] | evaluation | one validation (recorded as its failure) |
//! | [`FlowError::PathShapeMismatch`] | `set` / `mark_touched` | that call, tree unchanged |
//!
//! A validation evaluating to anything but `true` is not an error at all; it
//! is the expected output of the engine and lands in the field's error list.

use crate::path::Path;
use thiserror::Error;

/// Errors raised while compiling or evaluating a logic expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LogicError {
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("operator '{op}' expects {expected} argument(s) but got {got}")]
    Arity {
        op: String,
        expected: &'static str,
        got: usize,
    },

    #[error("'$data' expects a literal dotted path string, got {0}")]
    InvalidDataPath(String),

    #[error("invalid regex '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("type mismatch in '{op}': expected {expected}, got {got}")]
    TypeMismatch {
        op: String,
        expected: &'static str,
        got: String,
    },

    #[error("custom operator '{op}' failed: {message}")]
    Custom { op: String, message: String },
}

impl LogicError {
    pub fn code(&self) -> &'static str {
        match self {
            LogicError::UnknownOperator(_) => "FLOWJV_E_UNKNOWN_OPERATOR",
            LogicError::Arity { .. } => "FLOWJV_E_ARITY",
            LogicError::InvalidDataPath(_) => "FLOWJV_E_DATA_PATH",
            LogicError::InvalidRegex { .. } => "FLOWJV_E_REGEX",
            LogicError::TypeMismatch { .. } => "FLOWJV_E_TYPE_MISMATCH",
            LogicError::Custom { .. } => "FLOWJV_E_CUSTOM_OP",
        }
    }

    pub(crate) fn type_mismatch(op: &str, expected: &'static str, got: &serde_json::Value) -> Self {
        LogicError::TypeMismatch {
            op: op.to_string(),
            expected,
            got: json_type_name(got).to_string(),
        }
    }
}

/// Errors raised while loading a schema document.
///
/// Locations are schema patterns (`personalDetails.array.[].subobj`), since
/// array items have no concrete index until data exists.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("invalid schema document: {0}")]
    Parse(String),

    #[error("root schema must be an object, got '{0}'")]
    RootNotObject(String),

    #[error("duplicate property key '{key}' under '{at}'")]
    DuplicateKey { at: String, key: String },

    #[error("property under '{at}' has no key")]
    MissingKey { at: String },

    #[error("validation {index} at '{at}' references '{target}', which is not in the schema")]
    UnresolvedReference {
        at: String,
        index: usize,
        target: Path,
    },

    #[error("validation {index} at '{at}': {source}")]
    Logic {
        at: String,
        index: usize,
        #[source]
        source: LogicError,
    },
}

impl SchemaError {
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::Parse(_) => "FLOWJV_E_SCHEMA_PARSE",
            SchemaError::RootNotObject(_) => "FLOWJV_E_ROOT_TYPE",
            SchemaError::DuplicateKey { .. } => "FLOWJV_E_DUPLICATE_KEY",
            SchemaError::MissingKey { .. } => "FLOWJV_E_MISSING_KEY",
            SchemaError::UnresolvedReference { .. } => "FLOWJV_E_UNRESOLVED_REF",
            SchemaError::Logic { source, .. } => source.code(),
        }
    }
}

/// Errors surfaced by the form-level API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("path '{path}' does not fit the schema: {reason}")]
    PathShapeMismatch { path: Path, reason: String },
}

impl FlowError {
    pub fn code(&self) -> &'static str {
        match self {
            FlowError::Schema(err) => err.code(),
            FlowError::PathShapeMismatch { .. } => "FLOWJV_E_PATH_SHAPE",
        }
    }

    pub(crate) fn shape(path: &Path, reason: impl Into<String>) -> Self {
        FlowError::PathShapeMismatch {
            path: path.clone(),
            reason: reason.into(),
        }
    }
}

pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "absent",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
