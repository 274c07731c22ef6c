//! Shared fixtures for unit tests: a one-shot HTTP responder and a scripted
//! chat backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::api::client::{ApiClient, ApiError, ApiSettings};
use crate::api::{ChatBackend, ChatRequest, ChatResponse, HistoryEntry};
use crate::core::credentials::CredentialStore;
use crate::core::notify::RecordingNotifier;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    /// Request target including any query string.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    content_type: &'static str,
    body: String,
}

impl MockResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/html",
            body: body.to_string(),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: String::new(),
        }
    }
}

/// Serve `responses` in order, one connection each, and hand back what was
/// received once they are all used up.
pub async fn spawn_mock_server(
    responses: Vec<MockResponse>,
) -> (String, JoinHandle<Result<Vec<CapturedRequest>, String>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");

    let server_task = tokio::spawn(async move {
        let mut captured = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().await.map_err(|err| err.to_string())?;
            captured.push(read_http_request(&mut stream).await?);

            let reply = format!(
                "HTTP/1.1 {} Mock\r\ncontent-type: {}\r\nconnection: close\r\ncontent-length: {}\r\n\r\n{}",
                response.status,
                response.content_type,
                response.body.len(),
                response.body
            );
            stream
                .write_all(reply.as_bytes())
                .await
                .map_err(|err| err.to_string())?;
            stream.shutdown().await.map_err(|err| err.to_string())?;
        }
        Ok::<_, String>(captured)
    });

    (format!("http://{addr}"), server_task)
}

async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.expect("header end should exist");
    let header_text =
        std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    for line in lines {
        let mut parts = line.splitn(2, ':');
        let Some(name) = parts.next() else {
            continue;
        };
        let value = parts.next().unwrap_or_default().trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length - body.len()];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }

    Ok(CapturedRequest {
        method,
        path,
        headers,
        body,
    })
}

/// An `ApiClient` that bypasses any proxy configured in the environment.
pub fn test_api_client(
    base_url: &str,
    credentials: Arc<CredentialStore>,
    notifier: RecordingNotifier,
) -> ApiClient {
    let http = reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("client should build");
    let settings = ApiSettings {
        base_url: base_url.to_string(),
        ..ApiSettings::default()
    };
    ApiClient::with_http_client(http, &settings, credentials, Arc::new(notifier))
}

pub fn rejected(status: u16, message: &str) -> ApiError {
    ApiError::Rejected {
        status: StatusCode::from_u16(status).expect("valid status"),
        message: Some(message.to_string()),
    }
}

/// Calls observed by [`FakeBackend`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    ListModels,
    ListSessions,
    History(String),
    Send {
        message: String,
        session_id: String,
        model_id: Option<String>,
    },
    Delete(String),
}

#[derive(Default)]
struct Script {
    models: VecDeque<Result<Vec<String>, ApiError>>,
    sessions: VecDeque<Result<Vec<String>, ApiError>>,
    histories: VecDeque<(String, Result<Vec<HistoryEntry>, ApiError>)>,
    replies: VecDeque<Result<ChatResponse, ApiError>>,
    deletes: VecDeque<Result<(), ApiError>>,
    stalled_sends: usize,
    calls: Vec<BackendCall>,
}

/// A `ChatBackend` that answers from queued results. Unscripted calls fail
/// with a 500 so a test never silently depends on a default.
#[derive(Clone, Default)]
pub struct FakeBackend {
    script: Arc<Mutex<Script>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("script lock")
    }

    pub fn push_models(&self, result: Result<Vec<&str>, ApiError>) -> &Self {
        self.script()
            .models
            .push_back(result.map(|models| models.into_iter().map(str::to_string).collect()));
        self
    }

    pub fn push_sessions(&self, result: Result<Vec<&str>, ApiError>) -> &Self {
        self.script()
            .sessions
            .push_back(result.map(|ids| ids.into_iter().map(str::to_string).collect()));
        self
    }

    pub fn push_history(
        &self,
        session_id: &str,
        result: Result<Vec<(&str, &str)>, ApiError>,
    ) -> &Self {
        let result = result.map(|entries| {
            entries
                .into_iter()
                .map(|(role, message)| HistoryEntry {
                    role: Some(role.to_string()),
                    message: message.to_string(),
                    model_id: None,
                })
                .collect()
        });
        self.script()
            .histories
            .push_back((session_id.to_string(), result));
        self
    }

    /// Queue an assistant reply. `session_id` of `None` echoes the request.
    pub fn push_reply(&self, session_id: Option<&str>, message: &str) -> &Self {
        self.script().replies.push_back(Ok(ChatResponse {
            message: message.to_string(),
            session_id: session_id.unwrap_or_default().to_string(),
            role: Some("assistant".to_string()),
            model_id: None,
        }));
        self
    }

    pub fn push_reply_error(&self, err: ApiError) -> &Self {
        self.script().replies.push_back(Err(err));
        self
    }

    /// Make the next send hang forever, as a request the caller gives up on.
    pub fn stall_next_send(&self) -> &Self {
        self.script().stalled_sends += 1;
        self
    }

    pub fn push_delete(&self, result: Result<(), ApiError>) -> &Self {
        self.script().deletes.push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.script().calls.clone()
    }
}

fn unscripted<T>(what: &str) -> Result<T, ApiError> {
    Err(rejected(500, &format!("unscripted {what}")))
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn list_models(&self) -> Result<Vec<String>, ApiError> {
        let mut script = self.script();
        script.calls.push(BackendCall::ListModels);
        script
            .models
            .pop_front()
            .unwrap_or_else(|| unscripted("models"))
    }

    async fn list_sessions(&self) -> Result<Vec<String>, ApiError> {
        let mut script = self.script();
        script.calls.push(BackendCall::ListSessions);
        script
            .sessions
            .pop_front()
            .unwrap_or_else(|| unscripted("sessions"))
    }

    async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, ApiError> {
        let mut script = self.script();
        script.calls.push(BackendCall::History(session_id.to_string()));
        let position = script
            .histories
            .iter()
            .position(|(id, _)| id == session_id);
        match position.and_then(|index| script.histories.remove(index)) {
            Some((_, result)) => result,
            None => unscripted("history"),
        }
    }

    async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        let reply = {
            let mut script = self.script();
            script.calls.push(BackendCall::Send {
                message: request.message.clone(),
                session_id: request.session_id.clone(),
                model_id: request.model_id.clone(),
            });
            if script.stalled_sends > 0 {
                script.stalled_sends -= 1;
                None
            } else {
                Some(script.replies.pop_front())
            }
        };
        let Some(reply) = reply else {
            return std::future::pending().await;
        };
        match reply {
            Some(Ok(mut reply)) => {
                if reply.session_id.is_empty() {
                    reply.session_id = request.session_id.clone();
                }
                reply.model_id = reply.model_id.or_else(|| request.model_id.clone());
                Ok(reply)
            }
            Some(Err(err)) => Err(err),
            None => unscripted("send"),
        }
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        let mut script = self.script();
        script.calls.push(BackendCall::Delete(session_id.to_string()));
        script
            .deletes
            .pop_front()
            .unwrap_or_else(|| unscripted("delete"))
    }
}
