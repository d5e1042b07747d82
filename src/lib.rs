pub mod cli;
pub mod commands;
pub mod config;
pub mod platform;
pub mod registry;
pub mod tunnel;
pub mod ui;
