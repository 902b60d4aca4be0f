//! Per-query overrides carried as HTTP headers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Options a query is rendered and sent with.
///
/// Every field is optional; unset fields send no header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryOptions {
    /// Read at or after this transaction time (microseconds since epoch).
    pub last_txn_ts: Option<i64>,
    /// Server-side query timeout.
    pub query_timeout_ms: Option<u64>,
    /// Force strictly serialized reads.
    pub linearized: Option<bool>,
    /// Retries the server may spend on contention.
    pub max_contention_retries: Option<u32>,
    /// W3C trace context.
    pub traceparent: Option<String>,
    /// Tags echoed back in the response and logs.
    pub query_tags: BTreeMap<String, String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_txn_ts(mut self, ts: i64) -> Self {
        self.last_txn_ts = Some(ts);
        self
    }

    pub fn query_timeout_ms(mut self, ms: u64) -> Self {
        self.query_timeout_ms = Some(ms);
        self
    }

    pub fn linearized(mut self, linearized: bool) -> Self {
        self.linearized = Some(linearized);
        self
    }

    pub fn max_contention_retries(mut self, retries: u32) -> Self {
        self.max_contention_retries = Some(retries);
        self
    }

    pub fn traceparent(mut self, traceparent: impl Into<String>) -> Self {
        self.traceparent = Some(traceparent.into());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_tags.insert(key.into(), value.into());
        self
    }

    /// Layer `overrides` on top of `self`. Set fields in `overrides` win;
    /// tags are merged key by key.
    pub fn merge(&self, overrides: &QueryOptions) -> QueryOptions {
        let mut query_tags = self.query_tags.clone();
        query_tags.extend(
            overrides
                .query_tags
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        QueryOptions {
            last_txn_ts: overrides.last_txn_ts.or(self.last_txn_ts),
            query_timeout_ms: overrides.query_timeout_ms.or(self.query_timeout_ms),
            linearized: overrides.linearized.or(self.linearized),
            max_contention_retries: overrides
                .max_contention_retries
                .or(self.max_contention_retries),
            traceparent: overrides
                .traceparent
                .clone()
                .or_else(|| self.traceparent.clone()),
            query_tags,
        }
    }

    /// Header name/value pairs for the set options.
    pub fn to_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(ts) = self.last_txn_ts {
            headers.push(("x-last-txn-ts", ts.to_string()));
        }
        if let Some(ms) = self.query_timeout_ms {
            headers.push(("x-query-timeout-ms", ms.to_string()));
        }
        if let Some(linearized) = self.linearized {
            headers.push(("x-linearized", linearized.to_string()));
        }
        if let Some(retries) = self.max_contention_retries {
            headers.push(("x-max-contention-retries", retries.to_string()));
        }
        if let Some(traceparent) = &self.traceparent {
            headers.push(("traceparent", traceparent.clone()));
        }
        if !self.query_tags.is_empty() {
            let tags: Vec<String> = self
                .query_tags
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            headers.push(("x-query-tags", tags.join(",")));
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_options_send_nothing() {
        assert!(QueryOptions::new().to_headers().is_empty());
    }

    #[test]
    fn test_headers() {
        let opts = QueryOptions::new()
            .last_txn_ts(1700000000000000)
            .linearized(true)
            .traceparent("00-abc-def-01")
            .tag("team", "core")
            .tag("env", "test");

        assert_eq!(
            opts.to_headers(),
            vec![
                ("x-last-txn-ts", "1700000000000000".to_string()),
                ("x-linearized", "true".to_string()),
                ("traceparent", "00-abc-def-01".to_string()),
                ("x-query-tags", "env=test,team=core".to_string()),
            ]
        );
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let defaults = QueryOptions::new()
            .query_timeout_ms(5000)
            .linearized(false)
            .tag("env", "prod");
        let overrides = QueryOptions::new().linearized(true).tag("req", "42");

        let merged = defaults.merge(&overrides);
        assert_eq!(merged.query_timeout_ms, Some(5000));
        assert_eq!(merged.linearized, Some(true));
        assert_eq!(merged.query_tags.len(), 2);
    }
}
