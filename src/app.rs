//! Top-level flows: main menu, browsing, playback, and the maintenance
//! subcommands.

use std::io::Write;
use std::path::Path;
use std::process::Command as ProcessCommand;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogClient, CatalogError, Directory, is_video_file};
use crate::cli::{Command, HistoryAction};
use crate::config::{Config, ConfigError};
use crate::player::MpvLauncher;
use crate::session::{EarlyStop, PlaybackSession, SessionContext, SessionEnd, SessionError};
use crate::store::{Show, StoreError, WatchStore};
use crate::tui::{PARENT_KEY, SelectError, SelectOption, Selector, TerminalSelector};
use crate::update::{UpdateError, UpdateOutcome, Updater};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("update failed: {0}")]
    Update(#[from] UpdateError),
    #[error("no playable files found in directory {0}")]
    EmptyDirectory(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the user wants to go from the main menu
enum MenuChoice {
    Play { show: Show, resume: bool },
    Quit,
}

pub async fn run(config: Config, command: Option<Command>) -> Result<(), AppError> {
    match command {
        Some(Command::Update) => self_update().await,
        Some(Command::EditConfig) => edit_config(),
        Some(Command::History { action }) => {
            let store = WatchStore::new(config.storage.database_file());
            history(&store, action)
        }
        None => watch(config).await,
    }
}

async fn watch(config: Config) -> Result<(), AppError> {
    let store = WatchStore::new(config.storage.database_file());
    let catalog = CatalogClient::new(&config.catalog);
    let launcher = MpvLauncher::new(&config.player);
    let selector = TerminalSelector;
    let ctx = config.session_context();

    info!(
        database = %store.path().display(),
        threshold = ctx.completion_threshold,
        "flick started"
    );

    loop {
        let (show, resume) = match main_menu(&store, &catalog, &selector).await? {
            MenuChoice::Play { show, resume } => (show, resume),
            MenuChoice::Quit => return Ok(()),
        };

        if !resume {
            record_new_show(&store, &show);
        }

        println!("Playing {}", show.episode_id);
        let session = PlaybackSession::new(&ctx, &catalog, &launcher, &selector, &store);
        match session.run(show, resume).await? {
            SessionEnd::SeriesComplete => println!("No more episodes found"),
            SessionEnd::Declined => {}
            SessionEnd::StoppedEarly => {
                if should_exit(&ctx) {
                    return Ok(());
                }
            }
        }
    }
}

fn should_exit(ctx: &SessionContext) -> bool {
    ctx.on_early_stop == EarlyStop::ExitProcess
}

async fn main_menu<S: Selector>(
    store: &WatchStore,
    catalog: &CatalogClient,
    selector: &S,
) -> Result<MenuChoice, AppError> {
    let shows = saved_shows(store);

    if !shows.is_empty() {
        let choice = selector
            .select(
                "flick",
                vec![
                    SelectOption::new("y", "Continue watching"),
                    SelectOption::new("n", "Search for a new show"),
                ],
            )
            .await?;
        if choice.is_quit() {
            return Ok(MenuChoice::Quit);
        }
        if choice.key == "y" {
            return continue_watching(shows, catalog, selector).await;
        }
    }

    search(catalog, selector).await
}

/// New content gets its record before the player starts. A write failure is
/// logged and playback goes ahead.
fn record_new_show(store: &WatchStore, show: &Show) {
    if let Err(e) = store.upsert(show) {
        error!(error = %e, show = %show.id, "failed to save watch state");
    }
}

/// Shows to offer under "Continue watching". An unreadable table is logged and
/// treated as empty so the user can still search.
fn saved_shows(store: &WatchStore) -> Vec<Show> {
    store.get_all().unwrap_or_else(|e| {
        error!(error = %e, "failed to load watch state");
        Vec::new()
    })
}

async fn continue_watching<S: Selector>(
    shows: Vec<Show>,
    catalog: &CatalogClient,
    selector: &S,
) -> Result<MenuChoice, AppError> {
    let mut options = Vec::with_capacity(shows.len());
    for show in &shows {
        let name = match catalog.show_name(&show.id).await {
            Ok(name) => name,
            Err(e) => {
                warn!(show = %show.id, error = %e, "failed to resolve show name");
                show.id.clone()
            }
        };
        options.push(SelectOption::new(
            show.id.clone(),
            format!("{} (Episode ID: {})", name, show.episode_id),
        ));
    }

    let choice = selector.select("Continue watching", options).await?;
    Ok(shows
        .into_iter()
        .find(|s| s.id == choice.key)
        .map(|show| MenuChoice::Play { show, resume: true })
        .unwrap_or(MenuChoice::Quit))
}

async fn search<S: Selector>(catalog: &CatalogClient, selector: &S) -> Result<MenuChoice, AppError> {
    let query = read_line("Enter name: ").await?;
    if query.is_empty() {
        return Ok(MenuChoice::Quit);
    }

    let results = catalog.search(&query).await?;
    info!(query = %query, results = results.len(), "search finished");

    let options = results
        .iter()
        .map(|r| SelectOption::new(r.id.clone(), r.name.clone()))
        .collect();
    let choice = selector.select("Select show", options).await?;
    if choice.is_quit() {
        return Ok(MenuChoice::Quit);
    }

    match browse_directory(catalog, selector, &choice.key).await? {
        Some(episode_id) => Ok(MenuChoice::Play {
            show: Show::new(choice.key, episode_id, 0),
            resume: false,
        }),
        None => Ok(MenuChoice::Quit),
    }
}

/// Walk directories until a video file is picked. `None` when the user quits.
pub async fn browse_directory<S: Selector>(
    catalog: &CatalogClient,
    selector: &S,
    start: &str,
) -> Result<Option<String>, AppError> {
    let mut dir_id = start.to_string();

    loop {
        let dir = catalog.get_directory(&dir_id).await?;
        let options = directory_options(&dir);
        if options.is_empty() {
            return Err(AppError::EmptyDirectory(dir.name));
        }

        let choice = selector.select(&dir.name, options).await?;
        if choice.is_quit() {
            return Ok(None);
        }
        if choice.key == PARENT_KEY {
            debug!(from = %dir.id, to = %dir.parent, "going up");
            dir_id = dir.parent;
            continue;
        }

        match dir.files.iter().find(|f| f.id == choice.key) {
            Some(file) if file.dir => dir_id = file.id.clone(),
            Some(file) => return Ok(Some(file.id.clone())),
            None => return Ok(None),
        }
    }
}

/// Sub-directories and video files, with a parent entry when there is one.
pub fn directory_options(dir: &Directory) -> Vec<SelectOption> {
    let parent = dir
        .has_parent()
        .then(|| SelectOption::new(PARENT_KEY, "📁 .."));

    parent
        .into_iter()
        .chain(dir.files.iter().filter_map(|file| {
            if file.dir {
                Some(SelectOption::new(file.id.clone(), format!("📁 {}", file.name)))
            } else if is_video_file(&file.name) {
                Some(SelectOption::new(file.id.clone(), format!("🎬 {}", file.name)))
            } else {
                None
            }
        }))
        .collect()
}

async fn read_line(prompt: &str) -> Result<String, AppError> {
    print!("{}", prompt);
    std::io::stdout().flush()?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim().to_string())
}

fn history(store: &WatchStore, action: HistoryAction) -> Result<(), AppError> {
    match action {
        HistoryAction::List => {
            let shows = store.get_all()?;
            if shows.is_empty() {
                println!("No shows in history");
            }
            for show in shows {
                println!("{}\t{}\t{}s", show.id, show.episode_id, show.playback_time);
            }
        }
        HistoryAction::Remove { ids } => {
            if let [id] = ids.as_slice() {
                store.delete(id)?;
            } else {
                store.delete_many(ids.as_slice())?;
            }
            println!("Removed {} show(s)", ids.len());
        }
        HistoryAction::Clear => {
            store.clear()?;
            println!("History cleared");
        }
    }
    Ok(())
}

async fn self_update() -> Result<(), AppError> {
    let exe = std::env::current_exe()?;
    match Updater::new()?.update(&exe).await? {
        UpdateOutcome::UpToDate(version) => println!("flick {} is already the latest", version),
        UpdateOutcome::Updated { from, to } => println!("Updated flick {} -> {}", from, to),
    }
    Ok(())
}

fn edit_config() -> Result<(), AppError> {
    let path = Config::config_path()?;
    if !path.exists() {
        Config::default().save_to(&path)?;
    }

    let editor = editor_command(std::env::var("EDITOR").ok());
    info!(editor = %editor, path = %path.display(), "editing config");
    open_in_editor(&editor, &path)?;

    // Reject the edit early rather than on next start
    Config::load_from(&path)?;
    println!("Config file updated!");
    Ok(())
}

fn editor_command(env: Option<String>) -> String {
    match env {
        Some(editor) if !editor.trim().is_empty() => editor,
        _ if cfg!(windows) => "notepad".to_string(),
        _ => "vim".to_string(),
    }
}

fn open_in_editor(editor: &str, path: &Path) -> std::io::Result<()> {
    let status = ProcessCommand::new(editor).arg(path).status()?;
    if !status.success() {
        warn!(editor, ?status, "editor exited with an error");
    }
    Ok(())
}
