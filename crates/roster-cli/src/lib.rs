//! Roster CLI library.
//!
//! This crate provides the command-line interface over the availability store.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, MembersAction, TemplateAction};
pub use config::Config;
