//! Wire response shapes and service error classification.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{FaunaError, FaunaResult};
use crate::tagged;
use crate::values::Value;

/// Resource usage reported with every response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryStats {
    pub compute_ops: u64,
    pub read_ops: u64,
    pub write_ops: u64,
    pub query_time_ms: u64,
    pub storage_bytes_read: u64,
    pub storage_bytes_written: u64,
    pub contention_retries: u64,
}

/// A successful query response with its data decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySuccess {
    pub data: Value,
    pub static_type: Option<String>,
    pub summary: Option<String>,
    pub txn_ts: Option<i64>,
    pub query_tags: BTreeMap<String, String>,
    pub stats: Option<QueryStats>,
}

/// The `error` member of a failure response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// A failed query response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryFailure {
    pub error: ErrorInfo,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub txn_ts: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub query_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub stats: Option<QueryStats>,
}

/// Response metadata, read before the data is decoded.
#[derive(Debug, Deserialize)]
struct SuccessEnvelope {
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    static_type: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    txn_ts: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_tags")]
    query_tags: BTreeMap<String, String>,
    #[serde(default)]
    stats: Option<QueryStats>,
}

/// Tags arrive either as `k=v,k=v` or as a JSON object.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        Joined(String),
        Map(BTreeMap<String, String>),
        Null(()),
    }

    Ok(match Tags::deserialize(deserializer)? {
        Tags::Joined(s) => parse_tags(&s),
        Tags::Map(map) => map,
        Tags::Null(()) => BTreeMap::new(),
    })
}

/// Parse `k=v,k=v`. Entries without `=` are skipped.
pub fn parse_tags(joined: &str) -> BTreeMap<String, String> {
    joined
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// The class of a service-side failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorKind {
    /// The query failed static checks.
    QueryCheck,
    /// The query failed while running.
    QueryRuntime,
    /// The query exceeded its timeout.
    QueryTimeout,
    /// The secret is missing or invalid.
    Authentication,
    /// The secret lacks permission.
    Authorization,
    /// Too many requests.
    Throttling,
    /// Unexpected server failure.
    ServiceInternal,
    /// The service timed out.
    ServiceTimeout,
    /// Any other status.
    Other,
}

const QUERY_CHECK_CODES: &[&str] = &[
    "invalid_query",
    "invalid_function_definition",
    "invalid_identifier",
    "invalid_syntax",
    "invalid_type",
];

impl ServiceErrorKind {
    /// Classify by HTTP status and wire error code.
    pub fn classify(status: u16, code: &str) -> Self {
        match status {
            400 if QUERY_CHECK_CODES.contains(&code) => ServiceErrorKind::QueryCheck,
            400 => ServiceErrorKind::QueryRuntime,
            401 => ServiceErrorKind::Authentication,
            403 => ServiceErrorKind::Authorization,
            429 => ServiceErrorKind::Throttling,
            440 => ServiceErrorKind::QueryTimeout,
            500 => ServiceErrorKind::ServiceInternal,
            503 => ServiceErrorKind::ServiceTimeout,
            _ => ServiceErrorKind::Other,
        }
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceErrorKind::QueryCheck => "QueryCheckError",
            ServiceErrorKind::QueryRuntime => "QueryRuntimeError",
            ServiceErrorKind::QueryTimeout => "QueryTimeoutError",
            ServiceErrorKind::Authentication => "AuthenticationError",
            ServiceErrorKind::Authorization => "AuthorizationError",
            ServiceErrorKind::Throttling => "ThrottlingError",
            ServiceErrorKind::ServiceInternal => "ServiceInternalError",
            ServiceErrorKind::ServiceTimeout => "ServiceTimeoutError",
            ServiceErrorKind::Other => "ServiceError",
        };
        f.write_str(name)
    }
}

/// A classified failure reported by the service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} ({http_status} {code}): {message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub http_status: u16,
    pub code: String,
    pub message: String,
    pub summary: Option<String>,
    pub stats: Option<QueryStats>,
}

impl ServiceError {
    pub fn from_failure(failure: QueryFailure, http_status: u16) -> Self {
        Self {
            kind: ServiceErrorKind::classify(http_status, &failure.error.code),
            http_status,
            code: failure.error.code,
            message: failure.error.message,
            summary: failure.summary,
            stats: failure.stats,
        }
    }
}

/// Interpret a raw response body.
///
/// A body with an `error` member becomes a classified [`ServiceError`]; a
/// 2xx body is decoded through the codec; anything else is a protocol error.
pub fn parse_response(status: u16, body: &[u8]) -> FaunaResult<QuerySuccess> {
    let json: serde_json::Value = serde_json::from_slice(body).map_err(|e| FaunaError::Protocol {
        status,
        message: format!("response body is not JSON: {}", e),
    })?;

    if json.get("error").is_some() {
        let failure: QueryFailure =
            serde_json::from_value(json).map_err(|e| FaunaError::Protocol {
                status,
                message: format!("malformed error response: {}", e),
            })?;
        return Err(ServiceError::from_failure(failure, status).into());
    }

    if !(200..300).contains(&status) || json.get("data").is_none() {
        return Err(FaunaError::Protocol {
            status,
            message: format!("unexpected response body: {}", json),
        });
    }

    let envelope: SuccessEnvelope =
        serde_json::from_value(json).map_err(|e| FaunaError::Protocol {
            status,
            message: format!("malformed success response: {}", e),
        })?;

    Ok(QuerySuccess {
        data: tagged::decode_value(envelope.data)?,
        static_type: envelope.static_type,
        summary: envelope.summary,
        txn_ts: envelope.txn_ts,
        query_tags: envelope.query_tags,
        stats: envelope.stats,
    })
}
