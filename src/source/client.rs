//! Neo4j Query API client
//!
//! Talks to `POST /db/{database}/query/v2` with typed JSON responses and
//! basic auth. Bolt-style URIs are mapped onto the HTTP endpoint of the same
//! host so the usual `neo4j+s://...:7687` connection strings keep working.

use super::decode::{QueryData, QueryResponse};
use super::rate_limit::RateLimiter;
use super::types::{GraphSource, SourceEntity};
use crate::config::SourceSettings;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

const TYPED_JSON: &str = "application/vnd.neo4j.query";
const NODE_COLUMN: &str = "n";

/// Graph source backed by the Neo4j HTTP Query API
pub struct Neo4jHttpSource {
    client: Client,
    endpoint: Url,
    user: String,
    password: String,
    label: Option<String>,
    rate_limiter: Option<RateLimiter>,
}

impl Neo4jHttpSource {
    /// Create a client from validated settings
    pub fn new(settings: &SourceSettings, timeout: Option<Duration>) -> Result<Self> {
        let endpoint = query_endpoint(settings.uri()?, &settings.database)?;

        let mut builder =
            Client::builder().user_agent(format!("neo4j-snapshot/{}", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint,
            user: settings.user.clone(),
            password: settings.password()?.to_string(),
            label: settings.label.clone(),
            rate_limiter: settings.requests_per_second.map(RateLimiter::per_second),
        })
    }

    /// The resolved query endpoint
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Range query over the configured label, in element id order
    pub fn range_query(&self) -> String {
        let pattern = match &self.label {
            Some(label) => format!("(n:`{label}`)"),
            None => "(n)".to_string(),
        };
        format!("MATCH {pattern} RETURN n ORDER BY elementId(n) SKIP $skip LIMIT $limit")
    }

    async fn run_query(&self, statement: &str, parameters: Value) -> Result<QueryData> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let response = self
            .client
            .post(self.endpoint.clone())
            .basic_auth(&self.user, Some(&self.password))
            .header(ACCEPT, TYPED_JSON)
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({ "statement": statement, "parameters": parameters }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // Error bodies carry Neo4j status codes, which decide retryability
        if let Ok(parsed) = serde_json::from_str::<QueryResponse>(&body) {
            if let Some(err) = parsed.errors.first() {
                return Err(err.into());
            }
            if status.is_success() {
                return Ok(parsed.data.unwrap_or_default());
            }
        }

        if status.is_success() {
            return Err(Error::malformed(format!(
                "unparseable query response: {}",
                truncate(&body, 200)
            )));
        }
        Err(Error::http_status(status.as_u16(), truncate(&body, 500)))
    }
}

#[async_trait]
impl GraphSource for Neo4jHttpSource {
    async fn fetch_range(&self, skip: u64, limit: u64) -> Result<Vec<SourceEntity>> {
        let data = self
            .run_query(
                &self.range_query(),
                json!({ "skip": skip, "limit": limit }),
            )
            .await?;
        let entities = data.nodes(NODE_COLUMN)?;
        debug!(skip, limit, returned = entities.len(), "Range query complete");
        Ok(entities)
    }

    async fn verify(&self) -> Result<()> {
        self.run_query("RETURN 1 AS ok", json!({})).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("neo4j {}", self.endpoint)
    }
}

impl std::fmt::Debug for Neo4jHttpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jHttpSource")
            .field("endpoint", &self.endpoint.as_str())
            .field("user", &self.user)
            .field("label", &self.label)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Resolve the Query API endpoint for a connection URI
///
/// - `neo4j+s://host:7687`, `bolt+s://host` -> `https://host/db/{db}/query/v2`
/// - `neo4j://host:7687`, `bolt://host` -> `http://host:7474/db/{db}/query/v2`
/// - `http(s)://host[:port][/base]` -> used as the base as-is
pub fn query_endpoint(uri: &str, database: &str) -> Result<Url> {
    let parsed = Url::parse(uri)?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::invalid_value("NEO4J_URI", format!("no host in '{uri}'")))?;

    let base = match parsed.scheme() {
        "neo4j+s" | "neo4j+ssc" | "bolt+s" | "bolt+ssc" => format!("https://{host}"),
        "neo4j" | "bolt" => {
            let port = match parsed.port() {
                None | Some(7687) => 7474,
                Some(port) => port,
            };
            format!("http://{host}:{port}")
        }
        "http" | "https" => {
            let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
            let path = parsed.path().trim_end_matches('/');
            format!("{}://{host}{port}{path}", parsed.scheme())
        }
        other => {
            return Err(Error::invalid_value(
                "NEO4J_URI",
                format!("unsupported scheme '{other}'"),
            ))
        }
    };

    Ok(Url::parse(&format!("{base}/db/{database}/query/v2"))?)
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
