//! One continuous watch session: launch the player, poll its position, and on
//! exit either advance to the next episode or stop.

mod state;

pub use state::{
    PlayerSession, SessionState, Tick, clamp_position, exit_decision, percentage_watched,
};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogError, Episode, EpisodeSource, next_episode};
use crate::player::{PlayerControl, PlayerError, PlayerLauncher};
use crate::store::{Show, WatchStore};
use crate::tui::{SelectError, SelectOption, Selector};

/// What to do when the player closes before the completion threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EarlyStop {
    /// Go back to the main menu
    #[default]
    EndSession,
    /// Quit flick
    ExitProcess,
}

/// Settings for a playback session, built once from the config
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Percent watched at which an episode counts as finished
    pub completion_threshold: f64,
    pub save_speed: bool,
    pub next_episode_prompt: bool,
    pub on_early_stop: EarlyStop,
    pub poll_interval: Duration,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            completion_threshold: 90.0,
            save_speed: false,
            next_episode_prompt: false,
            on_early_stop: EarlyStop::EndSession,
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Player(#[from] PlayerError),
    #[error("failed to load the next episode: {0}")]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Select(#[from] SelectError),
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Last episode watched past the threshold
    SeriesComplete,
    /// Player closed before the threshold
    StoppedEarly,
    /// User declined the next episode
    Declined,
}

pub struct PlaybackSession<'a, C, L, S> {
    ctx: &'a SessionContext,
    catalog: &'a C,
    launcher: &'a L,
    selector: &'a S,
    store: &'a WatchStore,
}

impl<'a, C, L, S> PlaybackSession<'a, C, L, S>
where
    C: EpisodeSource,
    L: PlayerLauncher,
    S: Selector,
{
    pub fn new(
        ctx: &'a SessionContext,
        catalog: &'a C,
        launcher: &'a L,
        selector: &'a S,
        store: &'a WatchStore,
    ) -> Self {
        Self {
            ctx,
            catalog,
            launcher,
            selector,
            store,
        }
    }

    /// Watch `show` starting at its current episode. With `resume`, the first
    /// successful position read seeks to the stored playback time.
    pub async fn run(&self, mut show: Show, resume: bool) -> Result<SessionEnd, SessionError> {
        let mut state = SessionState::Idle;
        let mut session = PlayerSession::new(1.0, resume);
        let mut duration = 0;

        loop {
            debug!(state = state.name(), episode = %show.episode_id, "session step");
            state = match state {
                SessionState::Idle => SessionState::Launching,
                SessionState::Launching => {
                    let source = self.catalog.source_url(&show.episode_id);
                    SessionState::Polling(self.launcher.launch(&source).await?)
                }
                SessionState::Polling(mut player) => {
                    duration = self.play_episode(&player, &mut show, &mut session).await;
                    player.close().await;

                    let percentage = session.watched_percentage(show.playback_time, duration);
                    info!(
                        playback_time = show.playback_time,
                        duration,
                        percentage,
                        threshold = self.ctx.completion_threshold,
                        "player exited"
                    );
                    exit_decision(percentage, self.ctx.completion_threshold)
                }
                SessionState::Completed => {
                    let catalog = self.catalog.list_episodes(&show.id).await?;
                    let Some(next) = next_episode(&catalog, &show.episode_id) else {
                        info!(show = %show.id, "no more episodes");
                        return Ok(SessionEnd::SeriesComplete);
                    };

                    info!(
                        season = next.season,
                        episode = next.episode,
                        "starting next episode"
                    );
                    show.episode_id = next.id.clone();
                    show.playback_time = 0;
                    self.persist(&show);

                    if self.ctx.next_episode_prompt && !self.confirm_next(next).await? {
                        return Ok(SessionEnd::Declined);
                    }

                    session = PlayerSession::new(session.speed, false);
                    SessionState::Launching
                }
                SessionState::Exited => {
                    debug!(duration, "episode not finished, ending session");
                    return Ok(SessionEnd::StoppedEarly);
                }
            };
        }
    }

    /// Poll one episode until the player goes away. Returns the duration the
    /// background task found, 0 if none.
    async fn play_episode(
        &self,
        player: &L::Player,
        show: &mut Show,
        session: &mut PlayerSession,
    ) -> u64 {
        let (duration_tx, duration_rx) = watch::channel(0u64);
        let cancel = CancellationToken::new();

        let poll = async {
            // Tears the duration task down however polling ends
            let _guard = cancel.clone().drop_guard();
            self.poll_position(player, show, session, &duration_rx).await;
        };
        let discover = discover_duration(player, self.ctx.poll_interval, duration_tx, cancel.clone());

        tokio::join!(poll, discover);

        *duration_rx.borrow()
    }

    async fn poll_position(
        &self,
        player: &L::Player,
        show: &mut Show,
        session: &mut PlayerSession,
        duration: &watch::Receiver<u64>,
    ) {
        loop {
            tokio::time::sleep(self.ctx.poll_interval).await;

            let position = match player.get_f64("time-pos").await {
                Ok(position) => position,
                Err(e) if e.is_channel_failure() => {
                    debug!(error = %e, "control channel gone");
                    return;
                }
                Err(e) => {
                    debug!(error = %e, "position not available yet");
                    continue;
                }
            };

            let known_duration = *duration.borrow();
            match session.on_position(
                position,
                known_duration,
                self.ctx.save_speed,
                show.playback_time,
            ) {
                Tick::Started { set_speed, seek_to } => {
                    info!(episode = %show.episode_id, "playback started");
                    if let Some(speed) = set_speed {
                        if let Err(e) = player.set_property("speed", json!(speed)).await {
                            warn!(error = %e, "failed to set playback speed");
                        }
                    }
                    if let Some(seconds) = seek_to {
                        info!(seconds, "resuming playback");
                        if let Err(e) = player.seek(seconds).await {
                            warn!(error = %e, "resume seek failed");
                        }
                    }
                }
                Tick::Progress { playback_time } => {
                    show.playback_time = playback_time;
                    if self.ctx.save_speed {
                        match player.get_f64("speed").await {
                            Ok(speed) => session.speed = speed,
                            Err(e) => debug!(error = %e, "failed to read playback speed"),
                        }
                    }
                    self.persist(show);
                }
            }
        }
    }

    async fn confirm_next(&self, next: &Episode) -> Result<bool, SessionError> {
        let choice = self
            .selector
            .select(
                "Play the next episode?",
                vec![
                    SelectOption::new("y", format!("Play {}", next.display_title())),
                    SelectOption::new("n", "Stop here"),
                ],
            )
            .await?;
        Ok(choice.key == "y")
    }

    fn persist(&self, show: &Show) {
        if let Err(e) = self.store.upsert(show) {
            error!(error = %e, show = %show.id, "failed to save watch state");
        }
    }
}

/// Poll `duration` every `interval` until a non-zero value shows up once or
/// `cancel` fires. Publishes the value (whole seconds) on `tx`.
pub async fn discover_duration<P: PlayerControl>(
    player: &P,
    interval: Duration,
    tx: watch::Sender<u64>,
    cancel: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("duration discovery cancelled");
                return;
            }
            result = async {
                tokio::time::sleep(interval).await;
                player.get_f64("duration").await
            } => result,
        };

        match result {
            Ok(seconds) if seconds > 0.0 => {
                let seconds = (seconds.round() as u64).max(1);
                info!(seconds, "episode duration");
                tx.send_replace(seconds);
                return;
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "duration not available yet"),
        }
    }
}
