//! Hook error types.

/// Validation failures recorded in a hook's error state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    /// A field that must be a number held something else.
    #[error("field '{field}' must be numeric, got {value}")]
    NotNumeric {
        /// Field name.
        field: String,
        /// Offending value, JSON-encoded.
        value: String,
    },

    /// A required field was absent.
    #[error("missing field '{0}'")]
    MissingField(String),

    /// A field held a value outside its domain.
    #[error("invalid value for '{field}': {value}")]
    InvalidField {
        /// Field name.
        field: String,
        /// Offending value, JSON-encoded.
        value: String,
    },

    /// The hook configuration is unusable.
    #[error("invalid hook configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_error_display() {
        let err = HookError::NotNumeric {
            field: "value".to_string(),
            value: "\"12\"".to_string(),
        };
        assert_eq!(err.to_string(), "field 'value' must be numeric, got \"12\"");

        let err = HookError::MissingField("title".to_string());
        assert_eq!(err.to_string(), "missing field 'title'");

        let err = HookError::InvalidConfig("max_alerts must be > 0".to_string());
        assert!(err.to_string().contains("max_alerts"));
    }
}
