//! Error types for the FQL client.

use thiserror::Error;

use crate::response::ServiceError;

/// The main error type for codec, query building and client operations.
#[derive(Debug, Error)]
pub enum FaunaError {
    /// An integer does not fit any wire numeric tag.
    #[error("Precision loss when converting {0} to a Fauna type")]
    PrecisionLoss(String),

    /// An infinite number cannot be represented on the wire.
    #[error("Cannot convert {0} to a Fauna type")]
    NotFinite(f64),

    /// A date/time payload was not a string.
    #[error("Expected {expected} but received {found}")]
    Type {
        expected: &'static str,
        found: String,
    },

    /// A `@date` payload failed the plain date grammar.
    #[error("Expected a plain date string but received '{0}'")]
    InvalidDate(String),

    /// A `@time` payload failed the ISO date-time grammar.
    #[error("Expected an ISO date string but received '{0}'")]
    InvalidTime(String),

    /// A `@doc` string payload is not `collection:id`.
    #[error("Expected a document reference of the form 'collection:id' but received '{0}'")]
    InvalidDocumentRef(String),

    /// A tag payload has the wrong shape for its tag.
    #[error("Invalid payload for tag '{tag}': {reason}")]
    InvalidTag { tag: &'static str, reason: String },

    /// Template fragments and interpolations are out of step.
    #[error(
        "Invalid query template: {fragments} fragment(s) for {interpolations} interpolation(s)"
    )]
    InvalidTemplate {
        fragments: usize,
        interpolations: usize,
    },

    /// Malformed JSON on the wire.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service rejected the query.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The response body matched neither the success nor the failure shape.
    #[error("Protocol error (HTTP {status}): {message}")]
    Protocol { status: u16, message: String },

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FaunaError {
    /// Create a type error for a payload that should have been a string.
    pub fn not_a_string(found: &serde_json::Value) -> Self {
        Self::Type {
            expected: "string",
            found: format!("{}: {}", json_kind(found), found),
        }
    }

    /// Create an invalid-payload error for a tag.
    pub fn invalid_tag(tag: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidTag {
            tag,
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Result type alias for FQL operations.
pub type FaunaResult<T> = Result<T, FaunaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FaunaError::InvalidTemplate {
            fragments: 2,
            interpolations: 2,
        };
        assert_eq!(
            err.to_string(),
            "Invalid query template: 2 fragment(s) for 2 interpolation(s)"
        );
    }

    #[test]
    fn test_not_a_string_names_kind() {
        let err = FaunaError::not_a_string(&serde_json::json!(12));
        assert_eq!(err.to_string(), "Expected string but received number: 12");
    }
}
