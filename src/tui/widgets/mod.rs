//! TUI widgets

pub mod accounts;
pub mod heatmap;
pub mod help;
pub mod legend;
pub mod spinner;
pub mod tabs;
