mod ipc;

pub use ipc::{IpcError, MpvIpc, PlayerControl, exchange, is_pipe_busy, parse_reply, retry_busy};

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::PlayerConfig;

/// Attempts made while waiting for the control channel to come up
const CHANNEL_ATTEMPTS: u32 = 60;
const CHANNEL_RETRY: Duration = Duration::from_millis(100);

static LAUNCH_COUNTER: AtomicU32 = AtomicU32::new(0);

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("failed to launch player '{0}': {1}. Is the player installed and in your PATH?")]
    Launch(String, String),

    #[error("player exited before its control channel came up ({0})")]
    ExitedEarly(String),

    #[error("timed out waiting for the player control channel at {0}")]
    ChannelTimeout(PathBuf),
}

/// Starts one player process per episode.
#[allow(async_fn_in_trait)]
pub trait PlayerLauncher {
    type Player: PlayerControl;

    /// Start the player on `source` and return once its control channel
    /// answers.
    async fn launch(&self, source: &str) -> Result<Self::Player, PlayerError>;
}

/// A running mpv process together with its control channel
pub struct MpvPlayer {
    child: Child,
    ipc: MpvIpc,
}

impl MpvPlayer {
    pub fn ipc(&self) -> &MpvIpc {
        &self.ipc
    }
}

impl PlayerControl for MpvPlayer {
    async fn send(&self, command: Vec<Value>) -> Result<Value, IpcError> {
        self.ipc.send(command).await
    }

    async fn close(&mut self) {
        match timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "player process reaped"),
            Ok(Err(e)) => warn!(error = %e, "failed to wait for player"),
            Err(_) => {
                warn!("player still running after its control channel closed, killing it");
                let _ = self.child.kill().await;
            }
        }

        #[cfg(unix)]
        {
            if let Err(e) = tokio::fs::remove_file(self.ipc.endpoint()).await {
                debug!(error = %e, "failed to remove ipc socket (may not exist)");
            }
        }
    }
}

/// Launches the configured player with an IPC endpoint per episode
#[derive(Debug, Clone)]
pub struct MpvLauncher {
    command: String,
    args: Vec<String>,
}

impl MpvLauncher {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }
}

impl PlayerLauncher for MpvLauncher {
    type Player = MpvPlayer;

    async fn launch(&self, source: &str) -> Result<MpvPlayer, PlayerError> {
        let endpoint = ipc_endpoint();
        let mut child = launch_player(&self.command, &self.args, source, &endpoint)?;
        let ipc = MpvIpc::new(endpoint);

        for _ in 0..CHANNEL_ATTEMPTS {
            tokio::time::sleep(CHANNEL_RETRY).await;
            if ipc.probe().await.is_ok() {
                info!(endpoint = %ipc.endpoint().display(), "player control channel up");
                return Ok(MpvPlayer { child, ipc });
            }
            if let Ok(Some(status)) = child.try_wait() {
                return Err(PlayerError::ExitedEarly(status.to_string()));
            }
        }

        let _ = child.kill().await;
        Err(PlayerError::ChannelTimeout(ipc.endpoint().to_path_buf()))
    }
}

/// A fresh IPC endpoint path for each launch
fn ipc_endpoint() -> PathBuf {
    let n = LAUNCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = format!("flick-mpv-{}-{}", std::process::id(), n);

    if cfg!(windows) {
        PathBuf::from(format!(r"\\.\pipe\{}", name))
    } else {
        std::env::temp_dir().join(format!("{}.sock", name))
    }
}

/// Spawn the player detached from the terminal
pub fn launch_player(
    command: &str,
    args: &[String],
    source: &str,
    endpoint: &std::path::Path,
) -> Result<Child, PlayerError> {
    let program = which::which(command)
        .map_err(|e| PlayerError::Launch(command.to_string(), e.to_string()))?;

    let mut cmd = Command::new(program);
    cmd.arg(format!("--input-ipc-server={}", endpoint.display()))
        .arg("--really-quiet");
    cmd.args(args);
    cmd.arg(source);

    // Keep the player off our terminal
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    info!(player = %command, source, "launching player");
    cmd.spawn()
        .map_err(|e| PlayerError::Launch(command.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipc_endpoints_are_unique() {
        let a = ipc_endpoint();
        let b = ipc_endpoint();
        assert_ne!(a, b);
        assert!(a.to_string_lossy().contains("flick-mpv-"));
    }

    #[tokio::test]
    async fn test_launch_missing_player() {
        let launcher = MpvLauncher::new(&PlayerConfig {
            command: "definitely-not-a-player-binary".to_string(),
            args: Vec::new(),
        });

        let err = launcher.launch("https://example.com/video.mkv").await.err().unwrap();
        assert!(matches!(err, PlayerError::Launch(cmd, _) if cmd == "definitely-not-a-player-binary"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_player_exits_early() {
        // `false` ignores its arguments and exits immediately
        let launcher = MpvLauncher::new(&PlayerConfig {
            command: "false".to_string(),
            args: Vec::new(),
        });

        let err = launcher.launch("https://example.com/video.mkv").await.err().unwrap();
        assert!(matches!(err, PlayerError::ExitedEarly(_)));
    }
}
