pub mod app;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod player;
pub mod session;
pub mod store;
pub mod tui;
pub mod update;
