//! The authenticated request pipeline.
//!
//! Every backend call goes through [`ApiClient::send`], which decorates the
//! request with the current bearer token (unless the path is public),
//! unwraps the JSON payload on success, and on failure both notifies the
//! user and returns the error to the caller.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::ErrorPayload;
use crate::core::credentials::CredentialStore;
use crate::core::notify::Notifier;
use crate::utils::url::{construct_api_url, normalize_base_url, normalize_endpoint_path};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8082/ai";

/// Generous on purpose: a chat call blocks on a generative model.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

pub const DEFAULT_PUBLIC_PATHS: &[&str] = &["/auth/login", "/auth/register"];

/// Shown when the backend gives no message of its own.
pub const REQUEST_FAILED: &str = "Request failed";

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout: Duration,
    /// Paths sent without a bearer token. A trailing `*` matches by prefix.
    pub public_paths: Vec<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            public_paths: DEFAULT_PUBLIC_PATHS
                .iter()
                .map(|path| path.to_string())
                .collect(),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    /// The HTTP client could not be constructed.
    Client(reqwest::Error),
    /// No response reached us: connection, TLS, or timeout failure.
    Transport(reqwest::Error),
    /// The backend answered with a non-success status.
    Rejected {
        status: StatusCode,
        message: Option<String>,
    },
    /// The backend answered successfully but the payload had the wrong shape.
    Decode {
        status: StatusCode,
        source: serde_json::Error,
    },
    /// A sign-in succeeded but the backend handed out an empty token.
    EmptyToken,
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Rejected { status, .. } | ApiError::Decode { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status(),
            ApiError::Client(_) | ApiError::EmptyToken => None,
        }
    }

    /// True for 401 responses. Reacting (clearing credentials, prompting
    /// for login) is up to the caller.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    /// The human-readable text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected {
                message: Some(message),
                ..
            } => message.clone(),
            _ => REQUEST_FAILED.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Client(err) => write!(f, "Failed to build HTTP client: {err}"),
            ApiError::Transport(err) => write!(f, "{REQUEST_FAILED}: {err}"),
            ApiError::Rejected {
                status,
                message: Some(message),
            } => write!(f, "API request failed with status {status}: {message}"),
            ApiError::Rejected {
                status,
                message: None,
            } => write!(f, "API request failed with status {status}"),
            ApiError::Decode { status, source } => {
                write!(f, "Unexpected response payload (status {status}): {source}")
            }
            ApiError::EmptyToken => write!(f, "Sign-in response carried no token"),
        }
    }
}

impl StdError for ApiError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ApiError::Client(err) | ApiError::Transport(err) => Some(err),
            ApiError::Decode { source, .. } => Some(source),
            ApiError::Rejected { .. } | ApiError::EmptyToken => None,
        }
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    public_paths: Vec<String>,
    credentials: Arc<CredentialStore>,
    notifier: Arc<dyn Notifier>,
}

impl ApiClient {
    pub fn new(
        settings: &ApiSettings,
        credentials: Arc<CredentialStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self::with_http_client(http, settings, credentials, notifier))
    }

    /// Use a preconfigured `reqwest::Client`; `settings.timeout` is ignored.
    pub fn with_http_client(
        http: reqwest::Client,
        settings: &ApiSettings,
        credentials: Arc<CredentialStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            http,
            base_url: normalize_base_url(&settings.base_url),
            public_paths: settings
                .public_paths
                .iter()
                .map(|pattern| normalize_pattern(pattern))
                .collect(),
            credentials,
            notifier,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Whether `path` is on the allow-list and must go out without a token.
    pub fn is_public(&self, path: &str) -> bool {
        let path = normalize_endpoint_path(path);
        self.public_paths.iter().any(|pattern| {
            match pattern.strip_suffix('*') {
                Some(prefix) => path.starts_with(prefix),
                None => path == *pattern,
            }
        })
    }

    pub async fn send<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let result = self.execute(method.clone(), path, body, query).await;
        if let Err(err) = &result {
            warn!(%method, path, "{err}");
            self.notifier.notify(&err.user_message());
        }
        result
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<T, ()>(Method::GET, path, None, &[]).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::POST, path, Some(body), &[]).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<T, ()>(Method::DELETE, path, None, &[]).await
    }

    async fn execute<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = construct_api_url(&self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);

        if !query.is_empty() {
            request = request.query(query);
        }

        // Without a token the call still goes out; the backend decides.
        if !self.is_public(path) {
            if let Some(bearer) = self.credentials.bearer_header() {
                request = request.header(AUTHORIZATION, bearer);
            }
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, url, "sending request");
        let response = request.send().await.map_err(ApiError::Transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(ApiError::Transport)?;

        if !status.is_success() {
            return Err(ApiError::Rejected {
                status,
                message: extract_message(&bytes),
            });
        }

        decode_payload(status, &bytes)
    }
}

fn normalize_pattern(pattern: &str) -> String {
    match pattern.strip_suffix('*') {
        Some(prefix) => format!("/{}*", prefix.trim_start_matches('/')),
        None => normalize_endpoint_path(pattern),
    }
}

fn extract_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.message)
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
}

/// An empty body is read as JSON `null`, which lets `()`-typed calls such
/// as delete succeed on `204 No Content`.
fn decode_payload<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, ApiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|source| ApiError::Decode { status, source })
}
