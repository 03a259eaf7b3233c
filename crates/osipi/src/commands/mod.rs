//! Command dispatch: bridges CLI args -> core calls -> output formatting.

pub mod config_cmd;
pub mod info;
pub mod points;
pub mod search;
pub mod util;
pub mod watch;

use osipi_core::WebApi;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, api: &WebApi, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Info => info::handle(api, global),
        Command::Search(args) => search::handle(api, args, global).await,
        Command::Points(args) => points::handle(api, args, global).await,
        Command::Watch(args) => watch::handle(api, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
