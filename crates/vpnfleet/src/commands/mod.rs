//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod config_cmd;
pub mod fleet;
pub mod generate;
pub mod topology;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Dispatch a command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    // Config commands report on the file itself, so they load it their own way
    if let Command::Config(args) = cmd {
        return config_cmd::handle(args, global);
    }

    let cfg = config::load(global)?;
    match cmd {
        Command::Topology => topology::handle(&cfg, global),
        Command::Generate(args) => generate::handle(&cfg, args, global),
        Command::Status => fleet::status(&cfg, global).await,
        Command::Version => fleet::version(&cfg, global).await,
        Command::LoadStats => fleet::load_stats(&cfg, global).await,
        Command::Kill(args) => fleet::kill(&cfg, &args, global).await,
        // Handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
