//! CLI module - argument parsing, interactive prompts and subcommand runners

mod args;
pub mod commands;
mod prompts;

pub use args::{Cli, Commands, EmbedArgs, SourceArgs};
pub use prompts::*;
