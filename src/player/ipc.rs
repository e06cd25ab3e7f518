use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

/// Windows `ERROR_PIPE_BUSY`: every pipe instance is held by another client
const ERROR_PIPE_BUSY: i32 = 231;
const PIPE_BUSY_ATTEMPTS: u32 = 20;
const PIPE_BUSY_RETRY: Duration = Duration::from_millis(25);

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("control channel failed: {0}")]
    Channel(#[from] std::io::Error),
    #[error("control channel closed")]
    Closed,
    #[error("player rejected command: {0}")]
    Command(String),
}

impl IpcError {
    /// True when the player itself is gone, as opposed to a command the
    /// player answered with an error.
    pub fn is_channel_failure(&self) -> bool {
        matches!(self, IpcError::Channel(_) | IpcError::Closed)
    }
}

/// Request/reply access to a running player.
///
/// Implementors only provide `send`; the property helpers build mpv commands
/// on top of it.
#[allow(async_fn_in_trait)]
pub trait PlayerControl {
    /// Send one command and wait for its reply's `data`.
    async fn send(&self, command: Vec<Value>) -> Result<Value, IpcError>;

    async fn get_property(&self, name: &str) -> Result<Value, IpcError> {
        self.send(vec![json!("get_property"), json!(name)]).await
    }

    async fn get_f64(&self, name: &str) -> Result<f64, IpcError> {
        let value = self.get_property(name).await?;
        value
            .as_f64()
            .ok_or_else(|| IpcError::Command(format!("{} is not a number: {}", name, value)))
    }

    async fn set_property(&self, name: &str, value: Value) -> Result<(), IpcError> {
        self.send(vec![json!("set_property"), json!(name), value])
            .await
            .map(|_| ())
    }

    /// Absolute seek to `seconds`
    async fn seek(&self, seconds: u64) -> Result<(), IpcError> {
        self.send(vec![json!("seek"), json!(seconds), json!("absolute")])
            .await
            .map(|_| ())
    }

    /// Called once the episode is over.
    async fn close(&mut self) {}
}

/// mpv JSON IPC over a Unix socket (or a named pipe on Windows).
///
/// Every request opens its own connection, so concurrent callers never share
/// a stream and never see each other's replies.
#[derive(Debug)]
pub struct MpvIpc {
    endpoint: PathBuf,
    next_id: AtomicU64,
}

impl MpvIpc {
    pub fn new(endpoint: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &Path {
        &self.endpoint
    }

    /// Check that the endpoint accepts connections.
    pub async fn probe(&self) -> Result<(), IpcError> {
        open(&self.endpoint).await?;
        Ok(())
    }
}

impl PlayerControl for MpvIpc {
    async fn send(&self, command: Vec<Value>) -> Result<Value, IpcError> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let stream = open(&self.endpoint).await?;
        exchange(stream, request_id, command).await
    }
}

#[cfg(unix)]
async fn open(endpoint: &Path) -> std::io::Result<tokio::net::UnixStream> {
    tokio::net::UnixStream::connect(endpoint).await
}

#[cfg(windows)]
async fn open(
    endpoint: &Path,
) -> std::io::Result<tokio::net::windows::named_pipe::NamedPipeClient> {
    retry_busy(|| async move {
        tokio::net::windows::named_pipe::ClientOptions::new().open(endpoint)
    })
    .await
}

pub fn is_pipe_busy(error: &std::io::Error) -> bool {
    error.raw_os_error() == Some(ERROR_PIPE_BUSY)
}

/// Call `connect` again while the pipe reports busy. The poller and the
/// duration task connect on the same tick, so one of them can briefly find
/// the pipe taken.
pub async fn retry_busy<T, F, Fut>(mut connect: F) -> std::io::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    let mut attempt = 1;
    loop {
        match connect().await {
            Err(e) if is_pipe_busy(&e) && attempt < PIPE_BUSY_ATTEMPTS => {
                trace!(attempt, "ipc pipe busy, retrying");
                attempt += 1;
                tokio::time::sleep(PIPE_BUSY_RETRY).await;
            }
            other => return other,
        }
    }
}

/// Write one request line and read lines until the reply carrying
/// `request_id` shows up. Events and unparseable lines are skipped.
pub async fn exchange<S>(stream: S, request_id: u64, command: Vec<Value>) -> Result<Value, IpcError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);
    let mut request = json!({ "command": command, "request_id": request_id }).to_string();
    request.push('\n');

    trace!(request = %request.trim_end(), "mpv ipc request");
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    let mut line = String::new();
    loop {
        line.clear();
        if stream.read_line(&mut line).await? == 0 {
            return Err(IpcError::Closed);
        }
        if let Some(reply) = parse_reply(&line, request_id) {
            return reply;
        }
    }
}

/// `None` when the line is not the reply to `request_id`.
pub fn parse_reply(line: &str, request_id: u64) -> Option<Result<Value, IpcError>> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;
    if value.get("request_id").and_then(Value::as_u64) != Some(request_id) {
        return None;
    }

    let status = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("success");
    if status != "success" {
        return Some(Err(IpcError::Command(status.to_string())));
    }

    Some(Ok(value.get("data").cloned().unwrap_or(Value::Null)))
}
