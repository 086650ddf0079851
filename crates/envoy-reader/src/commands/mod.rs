//! Command dispatch: bridges CLI args -> gateway session -> output formatting.

pub mod config_cmd;
pub mod info;
pub mod login;
pub mod read;
pub mod util;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::config::{Config, ResolvedGateway};
use crate::error::CliError;

/// Dispatch a gateway-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: Config,
    resolved: &ResolvedGateway,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Info => info::handle(config, resolved, global).await,
        Command::Login(args) => login::handle(resolved, args, global).await,
        Command::Read(args) => read::handle(resolved, args, global).await,
        Command::Watch(args) => watch::handle(resolved, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
