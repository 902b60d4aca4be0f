//! Client configuration.
//!
//! Resolved from explicit values, the environment, or a TOML file:
//!
//! ```toml
//! [client]
//! endpoint = "local"          # cloud | preview | local | localhost | URL
//! timeout_ms = 30000
//!
//! [query]
//! linearized = true
//! query_tags = { team = "core" }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::error::{FaunaError, FaunaResult};
use crate::options::QueryOptions;

/// Environment variable holding the secret.
pub const SECRET_ENV: &str = "FAUNA_SECRET";

pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Named service endpoints.
pub mod endpoints {
    pub const CLOUD: &str = "https://db.fauna.com";
    pub const PREVIEW: &str = "https://db.fauna-preview.com";
    pub const LOCAL: &str = "http://localhost:8443";
}

/// Resolve an endpoint name (`cloud`, `preview`, `local`, `localhost`) or URL.
pub fn resolve_endpoint(name_or_url: &str) -> FaunaResult<Url> {
    let raw = match name_or_url {
        "cloud" => endpoints::CLOUD,
        "preview" => endpoints::PREVIEW,
        "local" | "localhost" => endpoints::LOCAL,
        other => other,
    };
    Url::parse(raw).map_err(|e| FaunaError::config(format!("invalid endpoint '{}': {}", raw, e)))
}

/// Settings a [`Client`](crate::client::Client) is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfiguration {
    pub endpoint: Url,
    pub secret: Option<String>,
    /// Client-side HTTP timeout.
    pub timeout_ms: u64,
    /// Defaults applied to every query.
    pub query: QueryOptions,
}

impl Default for ClientConfiguration {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(endpoints::CLOUD).expect("static endpoint URL is valid"),
            secret: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            query: QueryOptions::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    client: FileClientSection,
    query: QueryOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileClientSection {
    endpoint: Option<String>,
    secret: Option<String>,
    timeout_ms: Option<u64>,
}

impl ClientConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn query_options(mut self, query: QueryOptions) -> Self {
        self.query = query;
        self
    }

    /// Parse a TOML document with optional `[client]` and `[query]` tables.
    pub fn from_toml_str(content: &str) -> FaunaResult<Self> {
        let file: FileConfig = toml::from_str(content)
            .map_err(|e| FaunaError::config(format!("invalid config file: {}", e)))?;

        let mut config = Self::default();
        if let Some(endpoint) = &file.client.endpoint {
            config.endpoint = resolve_endpoint(endpoint)?;
        }
        config.secret = file.client.secret;
        if let Some(ms) = file.client.timeout_ms {
            config.timeout_ms = ms;
        }
        config.query = file.query;
        Ok(config)
    }

    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> FaunaResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// The secret to authenticate with: the configured one, else
    /// `FAUNA_SECRET` from the environment.
    pub fn resolve_secret(&self) -> FaunaResult<String> {
        if let Some(secret) = self.secret.as_ref().filter(|s| !s.is_empty()) {
            return Ok(secret.clone());
        }
        match std::env::var(SECRET_ENV) {
            Ok(secret) if !secret.is_empty() => Ok(secret),
            _ => Err(FaunaError::config(format!(
                "You must provide a secret to the driver. Set it in an environmental variable named {} or pass it to the client configuration.",
                SECRET_ENV
            ))),
        }
    }
}

/// `<config dir>/fauna/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fauna").join("config.toml"))
}
