//! CLI command implementations

pub mod auth_cmd;
pub mod collect;
pub mod error;

pub use auth_cmd::AuthCommand;
pub use collect::{Cli, CollectArgs, Commands};
pub use error::CliError;
