//! GitHub contribution heatmap and account-link manager for the terminal

pub mod cli;
pub mod config;
pub mod services;
pub mod tui;
pub mod types;
