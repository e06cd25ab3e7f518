/// Where a playback session is. `P` is the running player while polling.
#[derive(Debug)]
pub enum SessionState<P> {
    /// No player running
    Idle,
    /// About to start a player on the current episode
    Launching,
    /// Player running, position polled every tick
    Polling(P),
    /// Player gone and the episode counts as watched
    Completed,
    /// Player gone before the completion threshold
    Exited,
}

impl<P> SessionState<P> {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Launching => "launching",
            SessionState::Polling(_) => "polling",
            SessionState::Completed => "completed",
            SessionState::Exited => "exited",
        }
    }
}

/// What the poller has to do after a successful position read
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// First read of the episode
    Started {
        set_speed: Option<f64>,
        seek_to: Option<u64>,
    },
    /// Regular read; persist the new position
    Progress { playback_time: u64 },
}

/// Transient state of one episode's player.
///
/// `duration` is not stored here: the duration task publishes it and the
/// poller passes the latest value in.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSession {
    pub started: bool,
    /// Last speed seen on the player, carried to the next episode
    pub speed: f64,
    pub pending_resume: bool,
}

impl PlayerSession {
    pub fn new(speed: f64, pending_resume: bool) -> Self {
        Self {
            started: false,
            speed,
            pending_resume,
        }
    }

    /// Handle a successful `time-pos` read.
    ///
    /// The first read starts the session and yields the one-off speed/seek
    /// commands; it is not persisted because it predates the resume seek.
    pub fn on_position(
        &mut self,
        position: f64,
        duration: u64,
        save_speed: bool,
        resume_at: u64,
    ) -> Tick {
        if !self.started {
            self.started = true;
            let seek_to = std::mem::take(&mut self.pending_resume).then_some(resume_at);
            return Tick::Started {
                set_speed: save_speed.then_some(self.speed),
                seek_to,
            };
        }

        Tick::Progress {
            playback_time: clamp_position(position, duration),
        }
    }

    /// Percentage used for the exit decision; nothing counts before the
    /// session started.
    pub fn watched_percentage(&self, playback_time: u64, duration: u64) -> f64 {
        if self.started {
            percentage_watched(playback_time, duration)
        } else {
            0.0
        }
    }
}

/// Round to whole seconds and keep within `[0, duration]` once the duration
/// is known.
pub fn clamp_position(position: f64, duration: u64) -> u64 {
    let secs = if position.is_finite() && position > 0.0 {
        position.round() as u64
    } else {
        0
    };
    if duration > 0 { secs.min(duration) } else { secs }
}

/// `100 * playback_time / duration`, or 0 while the duration is unknown.
pub fn percentage_watched(playback_time: u64, duration: u64) -> f64 {
    if duration == 0 {
        return 0.0;
    }
    playback_time as f64 / duration as f64 * 100.0
}

/// State to leave polling for.
pub fn exit_decision<P>(percentage: f64, threshold: f64) -> SessionState<P> {
    if percentage >= threshold {
        SessionState::Completed
    } else {
        SessionState::Exited
    }
}
