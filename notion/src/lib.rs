//! Minimal Notion API client.
//!
//! Covers the two read operations a database-backed tool needs:
//! - Querying a database with a compound filter, one page of results at a time
//! - Retrieving a single page by id
//!
//! Page properties are exposed as typed values (see [`page`]) and filters are
//! built with [`Filter`].

pub mod filter;
pub mod page;

pub use filter::{Condition, Filter, NumberCondition, PropertyFilter, RelationCondition, TextCondition};
pub use page::{Page, PropertyValue, RelationRef, RichText, SelectOption};

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

const API_BASE: &str = "https://api.notion.com/v1";
const API_VERSION: &str = "2022-06-28";

/// Errors that can occur when using the Notion client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Integration token not configured")]
    NoToken,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}, {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether the API reported the object as missing or not shared.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status: 404, .. })
    }
}

/// Body of a database query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatabaseQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl DatabaseQuery {
    pub fn new(filter: Option<Filter>) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn with_start_cursor(mut self, cursor: Option<String>) -> Self {
        self.start_cursor = cursor;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<Page>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Notion API client.
#[derive(Clone)]
pub struct Notion {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl Notion {
    /// Create a new client with an integration token.
    pub fn new(token: impl Into<String>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            token: token.into(),
            base_url: API_BASE.to_string(),
        })
    }

    /// Create a client from the NOTION_TOKEN environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let token = std::env::var("NOTION_TOKEN").map_err(|_| Error::NoToken)?;
        Self::new(token)
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Run one page of a database query.
    #[instrument(level = "debug", skip(self, query))]
    pub async fn query_database(
        &self,
        database_id: &str,
        query: &DatabaseQuery,
    ) -> Result<QueryResponse, Error> {
        if let Ok(body) = serde_json::to_string(query) {
            debug!(query = %body, "querying database");
        }

        let response = self
            .client
            .post(format!("{}/databases/{database_id}/query", self.base_url))
            .headers(self.build_headers()?)
            .json(query)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let response = check_status(response).await?;
        let page: QueryResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        debug!(
            results = page.results.len(),
            has_more = page.has_more,
            "query page received"
        );
        Ok(page)
    }

    /// Retrieve a single page by id.
    #[instrument(level = "debug", skip(self))]
    pub async fn retrieve_page(&self, page_id: &str) -> Result<Page, Error> {
        let response = self
            .client
            .get(format!("{}/pages/{page_id}", self.base_url))
            .headers(self.build_headers()?)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token))
                .map_err(|e| Error::Config(format!("Invalid token: {e}")))?,
        );
        headers.insert("Notion-Version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(api_error(status, &body))
}

fn api_error(status: u16, body: &str) -> Error {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => Error::Api {
            status,
            code: parsed.code,
            message: parsed.message,
        },
        Err(_) => Error::Api {
            status,
            code: String::new(),
            message: body.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = Notion::new("secret").expect("client should build");
        assert_eq!(client.base_url, API_BASE);

        let client = client.with_base_url("http://localhost:9000/v1/");
        assert_eq!(client.base_url, "http://localhost:9000/v1");
    }

    #[test]
    fn test_headers() {
        let client = Notion::new("secret").expect("client should build");
        let headers = client.build_headers().expect("valid headers");
        assert_eq!(headers[AUTHORIZATION], "Bearer secret");
        assert_eq!(headers["Notion-Version"], API_VERSION);
    }

    #[test]
    fn test_query_body_omits_empty_fields() {
        let query = DatabaseQuery::new(None);
        assert_eq!(serde_json::to_value(&query).unwrap(), json!({}));

        let query = DatabaseQuery::new(Some(Filter::title_equals("Name", "A")))
            .with_start_cursor(Some("cursor-2".to_string()))
            .with_page_size(50);
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({
                "filter": {"property": "Name", "title": {"equals": "A"}},
                "start_cursor": "cursor-2",
                "page_size": 50
            })
        );
    }

    #[test]
    fn test_query_response_parses() {
        let response: QueryResponse = serde_json::from_value(json!({
            "object": "list",
            "results": [{"object": "page", "id": "p1", "properties": {}}],
            "has_more": true,
            "next_cursor": "c2",
            "type": "page_or_database"
        }))
        .unwrap();
        assert_eq!(response.results.len(), 1);
        assert!(response.has_more);
        assert_eq!(response.next_cursor.as_deref(), Some("c2"));
    }

    #[test]
    fn test_api_error_parsing() {
        let err = api_error(
            404,
            r#"{"object":"error","status":404,"code":"object_not_found","message":"Could not find page"}"#,
        );
        assert!(err.is_not_found());
        assert!(matches!(
            err,
            Error::Api { ref code, ref message, .. }
                if code == "object_not_found" && message == "Could not find page"
        ));

        let err = api_error(502, "bad gateway");
        assert!(!err.is_not_found());
        assert!(matches!(err, Error::Api { ref message, .. } if message == "bad gateway"));
    }
}
