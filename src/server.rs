//! HTTP boundary for the assist and run pipelines
//!
//! Hand-rolled HTTP/1.1 handling, one task per connection. Only the JSON API
//! exists here; static assets belong to the web frontend's own host. Every
//! failure resolves to a JSON error response, so nothing is fatal to the
//! process.

use crate::assist::{dispatch, AssistError, TextModel, TokioSleeper};
use crate::runner::RunnerClient;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const MAX_HEAD_BYTES: usize = 16_384;
const MAX_BODY_BYTES: usize = 1_048_576;

/// Shared server state, generic over the model so tests can script one.
pub struct AppState<M: TextModel> {
    model: M,
    runner: RunnerClient,
    inflight: InflightGuard,
}

impl<M: TextModel> AppState<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            runner: RunnerClient::new(),
            inflight: InflightGuard::default(),
        }
    }
}

/// Single-slot in-flight guard keyed on session: one outstanding chat
/// request per session, concurrent sessions unaffected.
#[derive(Default)]
struct InflightGuard {
    active: Mutex<HashSet<String>>,
}

impl InflightGuard {
    fn begin(&self, session: &str) -> bool {
        self.active.lock().unwrap().insert(session.to_string())
    }

    fn end(&self, session: &str) {
        self.active.lock().unwrap().remove(session);
    }
}

/// RAII slot: released when the request handler finishes, error paths
/// included.
struct InflightSlot<'a> {
    guard: &'a InflightGuard,
    session: String,
}

impl<'a> InflightSlot<'a> {
    fn acquire(guard: &'a InflightGuard, session: String) -> Option<Self> {
        if guard.begin(&session) {
            Some(Self { guard, session })
        } else {
            None
        }
    }
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        self.guard.end(&self.session);
    }
}

#[derive(Debug, PartialEq, Eq)]
struct RequestHead {
    method: String,
    path: String,
    session: Option<String>,
    content_length: usize,
}

#[derive(Debug)]
struct Response {
    status: u16,
    body: serde_json::Value,
}

impl Response {
    fn ok(body: serde_json::Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
        }
    }
}

/// Bind and serve until the process is stopped.
pub async fn serve<M: TextModel>(addr: &str, state: Arc<AppState<M>>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed binding server on {addr}"))?;
    log::info!(
        "listening on http://{}",
        listener.local_addr().context("failed reading bound address")?
    );

    loop {
        let (stream, peer) = listener.accept().await.context("accept failed")?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, peer, state).await {
                log::warn!("connection from {peer} failed: {err:#}");
            }
        });
    }
}

async fn handle_connection<M: TextModel>(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: Arc<AppState<M>>,
) -> Result<()> {
    let Some((head, body)) = read_request(&mut stream).await? else {
        return Ok(());
    };
    let response = route(&state, &head, &body, &peer.ip().to_string()).await;
    write_response(&mut stream, &response).await
}

async fn route<M: TextModel>(
    state: &AppState<M>,
    head: &RequestHead,
    body: &[u8],
    peer: &str,
) -> Response {
    match (head.method.as_str(), head.path.as_str()) {
        ("POST", "/api/chat") => handle_chat(state, head, body, peer).await,
        ("POST", "/api/run") => handle_run(state, body).await,
        (_, "/api/chat") | (_, "/api/run") => Response::error(405, "Method not allowed"),
        _ => Response::error(404, "Not found"),
    }
}

#[derive(Deserialize)]
struct ChatBody {
    message: Option<String>,
    code: Option<String>,
    language: Option<String>,
}

async fn handle_chat<M: TextModel>(
    state: &AppState<M>,
    head: &RequestHead,
    body: &[u8],
    peer: &str,
) -> Response {
    let Ok(body) = serde_json::from_slice::<ChatBody>(body) else {
        return Response::error(400, "Invalid request body");
    };
    let message = body.message.as_deref().unwrap_or("");
    if message.trim().is_empty() {
        return Response::error(400, "Message is required");
    }

    let session = head.session.clone().unwrap_or_else(|| peer.to_string());
    let Some(_slot) = InflightSlot::acquire(&state.inflight, session) else {
        return Response::error(429, "A request is already in progress for this session");
    };

    match dispatch(
        &state.model,
        &TokioSleeper,
        message,
        body.code.as_deref(),
        body.language.as_deref(),
    )
    .await
    {
        Ok(text) => Response::ok(json!({ "response": text })),
        Err(AssistError::InvalidRequest) => Response::error(400, "Message is required"),
        Err(err) => {
            let mut body = json!({ "error": "Failed to get AI response" });
            if let Some(detail) = err.detail() {
                body["details"] = json!(detail);
            }
            Response { status: 500, body }
        }
    }
}

#[derive(Deserialize)]
struct RunBody {
    language: String,
    file_name: String,
    content: String,
}

async fn handle_run<M: TextModel>(state: &AppState<M>, body: &[u8]) -> Response {
    let Ok(body) = serde_json::from_slice::<RunBody>(body) else {
        return Response::error(400, "Invalid request body");
    };

    match state
        .runner
        .execute(&body.language, &body.file_name, &body.content)
        .await
    {
        Ok(outcome) => Response::ok(json!({
            "success": outcome.success,
            "output": outcome.panel,
        })),
        Err(err) => {
            log::error!("remote execution failed: {err}");
            Response {
                status: 502,
                body: json!({
                    "error": "Failed to execute code",
                    "details": err.to_string(),
                }),
            }
        }
    }
}

async fn read_request(stream: &mut TcpStream) -> Result<Option<(RequestHead, Vec<u8>)>> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_HEAD_BYTES {
            bail!("request head too large");
        }
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..read]);
    };

    let head_text = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let Some(head) = parse_head(&head_text) else {
        bail!("malformed request head");
    };
    if head.content_length > MAX_BODY_BYTES {
        bail!("request body too large");
    }

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < head.content_length {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(head.content_length);
    Ok(Some((head, body)))
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_head(head: &str) -> Option<RequestHead> {
    let mut lines = head.lines();
    let first = lines.next()?;
    let mut parts = first.split_whitespace();
    let method = parts.next()?.to_string();
    let raw_path = parts.next()?;
    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();

    let mut session = None;
    let mut content_length = 0;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse().ok()?;
        } else if name.eq_ignore_ascii_case("x-session-id") && !value.is_empty() {
            session = Some(value.to_string());
        }
    }

    Some(RequestHead {
        method,
        path,
        session,
        content_length,
    })
}

async fn write_response(stream: &mut TcpStream, response: &Response) -> Result<()> {
    let body = serde_json::to_vec(&response.body)?;
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        status_text(response.status),
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&body).await?;
    Ok(())
}

fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "OK",
    }
}
