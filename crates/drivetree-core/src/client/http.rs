/// Google Drive v3 listing client over blocking HTTP.
///
/// Credentials are opaque to this module: the caller supplies either an
/// OAuth bearer token or an API key, obtained elsewhere. Every request
/// carries a per-call timeout so a stalled connection cannot hang a crawl.
use super::{ItemMetadata, ListPage, ListingClient, RawItem};
use crate::error::{ListingError, MetadataError};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Fields requested for each child in a listing page.
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,size,modifiedTime)";

/// Provider error reasons that mean "slow down" even when the status is 403.
const RATE_LIMIT_REASONS: &[&str] = &["rateLimitExceeded", "userRateLimitExceeded"];

/// How requests are authenticated.
#[derive(Clone)]
pub enum DriveAuth {
    Bearer(String),
    ApiKey(String),
}

impl std::fmt::Debug for DriveAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveAuth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            DriveAuth::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriveClientConfig {
    pub base_url: String,
    pub auth: DriveAuth,
    /// Timeout applied to every individual request.
    pub timeout: Duration,
    /// Items requested per listing page (the API caps this at 1000).
    pub page_size: u32,
}

impl DriveClientConfig {
    pub fn new(auth: DriveAuth) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth,
            timeout: Duration::from_secs(30),
            page_size: 1000,
        }
    }
}

pub struct DriveClient {
    http: Client,
    config: DriveClientConfig,
}

impl DriveClient {
    pub fn new(config: DriveClientConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("drivetree/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    fn authorised(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth {
            DriveAuth::Bearer(token) => request.bearer_auth(token),
            DriveAuth::ApiKey(key) => request.query(&[("key", key.as_str())]),
        }
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
}

impl ListingClient for DriveClient {
    fn get_metadata(&self, id: &str) -> Result<ItemMetadata, MetadataError> {
        let url = format!("{}/files/{}", self.base(), id);
        debug!("GET metadata {id}");

        let request = self
            .http
            .get(&url)
            .query(&[("fields", "id,name"), ("supportsAllDrives", "true")]);
        let response = self
            .authorised(request)
            .send()
            .map_err(|e| MetadataError::Connection(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(MetadataError::NotFound(id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(MetadataError::Api {
                code: status.as_u16(),
                message: api_message(&body),
            });
        }

        response
            .json::<ItemMetadata>()
            .map_err(|e| MetadataError::Connection(format!("malformed metadata response: {e}")))
    }

    fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ListPage, ListingError> {
        let url = format!("{}/files", self.base());
        let query = format!("'{}' in parents and trashed = false", escape_query(folder_id));
        let page_size = self.config.page_size.to_string();
        debug!("GET children of {folder_id} (page token: {page_token:?})");

        let mut request = self.http.get(&url).query(&[
            ("q", query.as_str()),
            ("fields", LIST_FIELDS),
            ("pageSize", page_size.as_str()),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        // Transport-level failures (DNS, refused, timeout) never produced a status.
        let response = self
            .authorised(request)
            .send()
            .map_err(|e| ListingError::Connection(e.to_string()))?;

        parse_list_response(response)
    }
}

fn parse_list_response(response: Response) -> Result<ListPage, ListingError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(classify_listing_failure(status.as_u16(), &body));
    }

    let payload: FileListDto = response.json().map_err(|e| ListingError::Api {
        code: status.as_u16(),
        message: format!("malformed listing response: {e}"),
    })?;

    Ok(ListPage {
        items: payload.files,
        next_page_token: payload.next_page_token.filter(|t| !t.is_empty()),
    })
}

/// Map a non-success listing status to the crawler's error taxonomy.
pub(crate) fn classify_listing_failure(code: u16, body: &str) -> ListingError {
    if code == 429 {
        return ListingError::RateLimited;
    }

    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    if code == 403 {
        let throttled = parsed.as_ref().is_some_and(|env| {
            env.error
                .errors
                .iter()
                .any(|e| RATE_LIMIT_REASONS.contains(&e.reason.as_str()))
        });
        if throttled {
            return ListingError::RateLimited;
        }
    }

    let message = parsed
        .map(|env| env.error.message)
        .unwrap_or_else(|| body.trim().to_string());
    ListingError::Api { code, message }
}

/// Extract the provider's human-readable message from an error body.
fn api_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Folder ids are embedded in a quoted query literal.
fn escape_query(id: &str) -> String {
    id.replace('\\', "\\\\").replace('\'', "\\'")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListDto {
    #[serde(default)]
    files: Vec<RawItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}
