use clap::Parser;
use flick::cli::Cli;
use flick::config::Config;
use flick::{app, tui};
use std::fs::File;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            if let Ok(path) = Config::config_path() {
                eprintln!("\nFix or remove the config file at: {}", path.display());
            }
            std::process::exit(1);
        }
    };
    cli.apply(&mut config);

    // Log to a file so output does not interfere with the TUI
    let log_path = config.storage.log_file();
    let log_file = log_path
        .parent()
        .and_then(|dir| std::fs::create_dir_all(dir).ok())
        .and_then(|()| File::create(&log_path).ok());

    if let Some(file) = log_file {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .with_ansi(false)
            .with_writer(file)
            .init();
    } else {
        // Fallback to stderr if can't create log file
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_target(false)
            .init();
    }

    tui::install_panic_hook();

    if let Err(e) = app::run(config, cli.command).await {
        tracing::error!(error = %e, "fatal error");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
