use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::session::EarlyStop;

#[derive(Debug, Parser)]
#[command(
    name = "flick",
    version,
    about = "Stream shows through mpv and pick up where you left off"
)]
pub struct Cli {
    /// Player executable to launch
    #[arg(long)]
    pub player: Option<String>,

    /// Directory holding the watch history and the debug log
    #[arg(long)]
    pub storage_path: Option<String>,

    /// Percent of an episode that must be watched before moving on
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub percentage_to_mark_complete: Option<u8>,

    /// Carry the playback speed over to the next episode
    #[arg(long)]
    pub save_mpv_speed: Option<bool>,

    /// Ask before starting the next episode
    #[arg(long)]
    pub next_episode_prompt: Option<bool>,

    /// What to do when the player is closed before the episode is finished
    #[arg(long, value_enum)]
    pub on_early_stop: Option<EarlyStop>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replace this binary with the latest release
    Update,
    /// Open the config file in $EDITOR
    EditConfig,
    /// Inspect or prune the watch history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum HistoryAction {
    /// Print every tracked show
    List,
    /// Forget the given shows
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Forget everything
    Clear,
}

impl Cli {
    /// Flags given on the command line win over the config file.
    pub fn apply(&self, config: &mut Config) {
        if let Some(player) = &self.player {
            config.player.command = player.clone();
        }
        if let Some(path) = &self.storage_path {
            config.storage.path = Some(path.clone());
        }
        if let Some(pct) = self.percentage_to_mark_complete {
            config.playback.percentage_to_mark_complete = pct;
        }
        if let Some(save) = self.save_mpv_speed {
            config.playback.save_speed = save;
        }
        if let Some(prompt) = self.next_episode_prompt {
            config.playback.next_episode_prompt = prompt;
        }
        if let Some(mode) = self.on_early_stop {
            config.playback.on_early_stop = mode;
        }
    }
}
