/*
[INPUT]:  HTTP configuration (project URL, API key, table, timeouts)
[OUTPUT]: Configured reqwest client ready for REST calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::http::{KanbanError, Result};
use crate::types::ApiErrorBody;

const REST_PATH: &str = "rest/v1/";
const DEFAULT_TABLE: &str = "tasks";
const DEFAULT_SCHEMA: &str = "public";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub table: String,
    pub schema: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            table: DEFAULT_TABLE.to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }
}

/// REST client for the hosted task table
#[derive(Debug, Clone)]
pub struct KanbanClient {
    http_client: Client,
    project_url: Url,
    rest_base_url: Url,
    api_key: String,
    table: String,
    schema: String,
    timeout: Duration,
}

impl KanbanClient {
    /// Create a new client with default configuration
    pub fn new(project_url: &str, api_key: &str) -> Result<Self> {
        Self::with_config(ClientConfig::default(), project_url, api_key)
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig, project_url: &str, api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(KanbanError::Config("api key must not be empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        let key_value = HeaderValue::from_str(api_key)
            .map_err(|err| KanbanError::Config(format!("invalid api key: {err}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|err| KanbanError::Config(format!("invalid api key: {err}")))?;
        headers.insert("apikey", key_value);
        headers.insert(AUTHORIZATION, bearer);

        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .default_headers(headers)
            .build()?;

        let project_url = normalize_base(project_url)?;
        let rest_base_url = project_url.join(REST_PATH)?;

        Ok(Self {
            http_client,
            project_url,
            rest_base_url,
            api_key: api_key.to_string(),
            table: config.table,
            schema: config.schema,
            timeout: config.timeout,
        })
    }

    /// Project root URL (used to derive the realtime endpoint)
    pub fn project_url(&self) -> &Url {
        &self.project_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Build request builder for the task table endpoint
    pub(crate) fn table_request(&self, method: Method) -> Result<RequestBuilder> {
        let url = self.rest_base_url.join(&self.table)?;
        let builder = self.http_client.request(method.clone(), url);
        // PostgREST picks the schema from profile headers
        let builder = if method == Method::GET {
            builder.header("Accept-Profile", &self.schema)
        } else {
            builder.header("Content-Profile", &self.schema)
        };
        Ok(builder)
    }

    /// Send a request and decode a JSON body
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.send(builder).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(KanbanError::from)
    }

    /// Send a request and discard the body
    pub(crate) async fn send_empty(&self, builder: RequestBuilder) -> Result<()> {
        self.send(builder).await?;
        Ok(())
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                KanbanError::Timeout {
                    duration: self.timeout.as_secs(),
                }
            } else {
                KanbanError::Http(err)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let raw = response.text().await.unwrap_or_default();
        let body: ApiErrorBody = serde_json::from_str(&raw).unwrap_or_default();
        debug!(status = status.as_u16(), body = %raw, "rest request failed");
        Err(KanbanError::api_error(status, body.describe(&raw)))
    }
}

/// Ensure the base ends with `/` so `join` appends rather than replaces.
fn normalize_base(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') {
        Ok(Url::parse(trimmed)?)
    } else {
        Ok(Url::parse(&format!("{trimmed}/"))?)
    }
}
