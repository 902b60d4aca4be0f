//! # fauna-fql: tagged wire format and FQL query templates
//!
//! > **Stop concatenating strings. Compose queries.**
//!
//! Two pieces do the real work:
//!
//! - [`tagged`] converts native [`Value`]s to and from the wire's tagged
//!   JSON, keeping integer widths, dates, instants and references intact.
//! - [`query`] composes a [`Query`] from text fragments, literal values and
//!   nested queries, and renders it into one `{query, arguments}` payload.
//!
//! [`Client`] sends rendered queries over HTTP and decodes the response.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use fauna_fql::prelude::*;
//!
//! let client = Client::new(ClientConfiguration::new())?;  // FAUNA_SECRET
//!
//! let email = "ada@example.com";
//! let by_email = fql!("Users.byEmail(", email, ")");
//! let result = client.query(&fql!("", by_email, ".first()"), None).await?;
//! println!("{:?}", result.data);
//! ```
//!
//! ## Tags
//!
//! | Tag       | Carries                          |
//! |-----------|----------------------------------|
//! | `@int`    | 32-bit integer                   |
//! | `@long`   | 64-bit integer                   |
//! | `@double` | floating point                   |
//! | `@date`   | calendar date                    |
//! | `@time`   | instant                          |
//! | `@mod`    | module reference                 |
//! | `@doc`    | document reference               |
//! | `@ref`    | reference descriptor             |
//! | `@set`    | set descriptor                   |
//! | `@object` | object whose keys start with `@` |

pub mod client;
pub mod config;
pub mod error;
pub mod options;
pub mod query;
pub mod response;
pub mod tagged;
pub mod values;

pub use client::Client;
pub use config::ClientConfiguration;
pub use error::{FaunaError, FaunaResult};
pub use options::QueryOptions;
pub use query::{Interpolation, Query, QueryRequest};
pub use values::{DateStub, DocumentReference, Module, TimeStub, Value};

pub mod prelude {
    pub use crate::client::{Client, HttpClient, ReqwestClient};
    pub use crate::config::ClientConfiguration;
    pub use crate::error::*;
    pub use crate::fql;
    pub use crate::options::QueryOptions;
    pub use crate::query::{Interpolation, Query, QueryRequest};
    pub use crate::response::{QueryStats, QuerySuccess, ServiceError, ServiceErrorKind};
    pub use crate::values::{DateStub, DocumentReference, Module, TimeStub, Value};
}

/// Encode a native value into tagged JSON.
///
/// # Example
///
/// ```
/// use fauna_fql::{encode, Value};
///
/// let wire = encode(&Value::from(2147483648i64)).unwrap();
/// assert_eq!(wire, serde_json::json!({ "@long": "2147483648" }));
/// ```
pub fn encode(value: &Value) -> FaunaResult<serde_json::Value> {
    tagged::encode(value)
}

/// Decode tagged JSON text into a native value.
///
/// # Example
///
/// ```
/// use fauna_fql::{decode, DocumentReference, Value};
///
/// let v = decode(r#"{"@doc": "Users:123"}"#).unwrap();
/// assert_eq!(v, Value::Doc(DocumentReference::new("Users", "123")));
/// ```
pub fn decode(input: &str) -> FaunaResult<Value> {
    tagged::decode(input)
}
