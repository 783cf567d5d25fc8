//! Validation errors raised before any remote call.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown resource kind '{0}'")]
    UnknownKind(String),

    #[error("missing required property '{field}'")]
    MissingRequired { field: String },

    #[error("property '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("unknown property '{field}'")]
    UnknownField { field: String },

    #[error("property '{field}' is an output and cannot be supplied")]
    OutputSupplied { field: String },

    #[error("property '{field}' must be one of [{allowed}], got {found}")]
    NotAllowed {
        field: String,
        allowed: String,
        found: String,
    },

    #[error("{reason}")]
    Invalid { field: String, reason: String },
}

impl ValidationError {
    /// The field this error is about, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::UnknownKind(_) => None,
            ValidationError::MissingRequired { field }
            | ValidationError::TypeMismatch { field, .. }
            | ValidationError::UnknownField { field }
            | ValidationError::OutputSupplied { field }
            | ValidationError::NotAllowed { field, .. }
            | ValidationError::Invalid { field, .. } => Some(field),
        }
    }

    pub fn missing(field: &str) -> Self {
        ValidationError::MissingRequired {
            field: field.to_string(),
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Short JSON type name for error messages
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_names_field() {
        let err = ValidationError::missing("scheduleCron");
        assert_eq!(err.to_string(), "missing required property 'scheduleCron'");
        assert_eq!(err.field(), Some("scheduleCron"));
    }

    #[test]
    fn test_unknown_kind_has_no_field() {
        assert_eq!(ValidationError::UnknownKind("nope".into()).field(), None);
    }
}
