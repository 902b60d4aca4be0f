//! HTTP client for the query endpoint.
//!
//! The transport sits behind [`HttpClient`] so requests can be served by
//! reqwest in production and by an in-memory stub in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfiguration;
use crate::error::{FaunaError, FaunaResult};
use crate::options::QueryOptions;
use crate::query::{Query, QueryRequest};
use crate::response::{QuerySuccess, parse_response};

/// Path of the query endpoint relative to the configured base URL.
pub const QUERY_PATH: &str = "query/1";

/// An outgoing HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Sends a POST and returns the raw response, or a network error.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> FaunaResult<HttpResponse>;
}

/// [`HttpClient`] backed by reqwest.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> FaunaResult<HttpResponse> {
        let mut builder = self
            .inner
            .post(request.url)
            .timeout(request.timeout)
            .body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FaunaError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| FaunaError::Network(e.to_string()))?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// A client for one database, identified by its secret.
pub struct Client {
    config: ClientConfiguration,
    query_url: Url,
    base_headers: Vec<(String, String)>,
    http: Arc<dyn HttpClient>,
    /// Highest `txn_ts` seen; 0 until the first response.
    last_txn_ts: AtomicI64,
}

impl Client {
    /// Build a client using reqwest as the transport.
    pub fn new(config: ClientConfiguration) -> FaunaResult<Self> {
        Self::with_http(config, Arc::new(ReqwestClient::new()))
    }

    /// Build a client over a custom transport.
    pub fn with_http(
        config: ClientConfiguration,
        http: Arc<dyn HttpClient>,
    ) -> FaunaResult<Self> {
        let secret = config.resolve_secret()?;
        let query_url = config
            .endpoint
            .join(QUERY_PATH)
            .map_err(|e| FaunaError::config(format!("invalid endpoint: {}", e)))?;

        let base_headers = vec![
            ("Authorization".to_string(), format!("Bearer {}", secret)),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("X-Format".to_string(), "tagged".to_string()),
        ];

        Ok(Self {
            config,
            query_url,
            base_headers,
            http,
            last_txn_ts: AtomicI64::new(0),
        })
    }

    pub fn config(&self) -> &ClientConfiguration {
        &self.config
    }

    /// The highest transaction time observed, if any.
    pub fn last_txn_ts(&self) -> Option<i64> {
        match self.last_txn_ts.load(Ordering::Acquire) {
            0 => None,
            ts => Some(ts),
        }
    }

    /// Advance the observed transaction time. Never moves backwards.
    pub fn set_last_txn_ts(&self, ts: i64) {
        let previous = self.last_txn_ts.fetch_max(ts, Ordering::AcqRel);
        if ts > previous {
            debug!(txn_ts = ts, "advanced last transaction time");
        }
    }

    /// Render a query with the client's defaults merged with `options`.
    pub fn render(
        &self,
        query: &Query,
        options: Option<&QueryOptions>,
    ) -> FaunaResult<QueryRequest> {
        let mut merged = match options {
            Some(overrides) => self.config.query.merge(overrides),
            None => self.config.query.clone(),
        };
        if merged.last_txn_ts.is_none() {
            merged.last_txn_ts = self.last_txn_ts();
        }
        query.render(&merged)
    }

    /// Render, send and decode a query.
    pub async fn query(
        &self,
        query: &Query,
        options: Option<&QueryOptions>,
    ) -> FaunaResult<QuerySuccess> {
        let request = self.render(query, options)?;
        self.send(&request).await
    }

    /// Send an already-rendered request.
    pub async fn send(&self, request: &QueryRequest) -> FaunaResult<QuerySuccess> {
        let body = serde_json::to_vec(request)?;

        let mut headers = self.base_headers.clone();
        headers.extend(
            request
                .options
                .to_headers()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v)),
        );

        let timeout = Duration::from_millis(
            request
                .options
                .query_timeout_ms
                .map_or(self.config.timeout_ms, |ms| ms.max(self.config.timeout_ms)),
        );

        debug!(
            url = %self.query_url,
            arguments = request.arguments.len(),
            "sending query"
        );

        let response = self
            .http
            .send(HttpRequest {
                url: self.query_url.clone(),
                headers,
                body,
                timeout,
            })
            .await?;

        match parse_response(response.status, &response.body) {
            Ok(success) => {
                if let Some(ts) = success.txn_ts {
                    self.set_last_txn_ts(ts);
                }
                Ok(success)
            }
            Err(FaunaError::Service(service)) => {
                warn!(
                    kind = %service.kind,
                    status = service.http_status,
                    code = %service.code,
                    "query failed"
                );
                Err(FaunaError::Service(service))
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fql;
    use crate::values::Value;
    use std::sync::Mutex;

    /// Replays canned responses and records requests.
    struct StubHttp {
        responses: Mutex<Vec<HttpResponse>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl StubHttp {
        fn new(responses: Vec<(u16, &str)>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .rev()
                        .map(|(status, body)| HttpResponse {
                            status,
                            body: body.as_bytes().to_vec(),
                        })
                        .collect(),
                ),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpClient for StubHttp {
        async fn send(&self, request: HttpRequest) -> FaunaResult<HttpResponse> {
            self.seen.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| FaunaError::Network("no more responses".into()))
        }
    }

    fn client(http: Arc<StubHttp>) -> Client {
        let config = ClientConfiguration::new()
            .secret("secret")
            .endpoint(Url::parse("http://localhost:8443").unwrap());
        Client::with_http(config, http).unwrap()
    }

    #[tokio::test]
    async fn test_query_roundtrip() {
        let http = StubHttp::new(vec![(200, r#"{"data": {"@long": "42"}, "txn_ts": 10}"#)]);
        let client = client(http.clone());

        let result = client.query(&fql!("Math.add(", 1, ")"), None).await.unwrap();
        assert_eq!(result.data, Value::Long(42));
        assert_eq!(client.last_txn_ts(), Some(10));

        let seen = http.seen.lock().unwrap();
        let request = &seen[0];
        assert_eq!(request.url.as_str(), "http://localhost:8443/query/1");
        assert_eq!(request.header("authorization"), Some("Bearer secret"));
        assert_eq!(request.header("x-last-txn-ts"), None);

        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["query"]["fql"][0], "Math.add(");
        assert_eq!(body["query"]["fql"][1]["value"]["@int"], "1");
    }

    #[tokio::test]
    async fn test_last_txn_is_sent_and_monotone() {
        let http = StubHttp::new(vec![
            (200, r#"{"data": null, "txn_ts": 20}"#),
            (200, r#"{"data": null, "txn_ts": 5}"#),
            (200, r#"{"data": null}"#),
        ]);
        let client = client(http.clone());

        client.query(&fql!("1"), None).await.unwrap();
        client.query(&fql!("2"), None).await.unwrap();
        assert_eq!(client.last_txn_ts(), Some(20));

        let explicit = QueryOptions::new().last_txn_ts(7);
        client.query(&fql!("3"), Some(&explicit)).await.unwrap();

        let seen = http.seen.lock().unwrap();
        assert_eq!(seen[1].header("x-last-txn-ts"), Some("20"));
        assert_eq!(seen[2].header("x-last-txn-ts"), Some("7"));
    }

    #[tokio::test]
    async fn test_service_error_is_classified() {
        let http = StubHttp::new(vec![(
            403,
            r#"{"error": {"code": "forbidden", "message": "no access"}}"#,
        )]);
        let client = client(http);

        let err = client.query(&fql!("Users.all()"), None).await.unwrap_err();
        match err {
            FaunaError::Service(service) => {
                assert_eq!(service.kind, crate::response::ServiceErrorKind::Authorization)
            }
            other => panic!("expected a service error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_network_error_propagates() {
        let client = client(StubHttp::new(vec![]));
        let err = client.query(&fql!("1"), None).await.unwrap_err();
        assert!(matches!(err, FaunaError::Network(_)));
    }

    #[test]
    fn test_defaults_merge_into_headers() {
        let config = ClientConfiguration::new()
            .secret("secret")
            .query_options(QueryOptions::new().linearized(true));
        let client = Client::with_http(config, StubHttp::new(vec![])).unwrap();

        let request = client
            .render(&fql!("1"), Some(&QueryOptions::new().traceparent("tp")))
            .unwrap();
        assert_eq!(request.options.linearized, Some(true));
        assert_eq!(request.options.traceparent.as_deref(), Some("tp"));
    }
}
