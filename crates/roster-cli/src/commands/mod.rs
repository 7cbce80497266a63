//! CLI subcommand implementations.

pub mod available;
pub mod members;
pub mod replace;
pub mod set;
pub mod show;
pub mod stats;
pub mod status;
pub mod template;
pub mod util;
