//! Control socket command handlers.

use std::path::Path;

use anyhow::{bail, Context};
use aoa_driver::control::{self, ControlCommand};
use aoa_driver::UsbId;

use super::CommandResult;
use crate::cli::KnownCommands;

/// `vvvv:pppp` or the two halves as separate arguments
fn parse_id(parts: &[String]) -> anyhow::Result<UsbId> {
    Ok(parts.join(" ").parse()?)
}

async fn send(runtime_dir: &Path, command: ControlCommand) -> CommandResult {
    let reply = control::request(runtime_dir, &command)
        .await
        .with_context(|| {
            format!(
                "no daemon listening at {}",
                control::control_path(runtime_dir).display()
            )
        })?;

    if let Some(message) = reply.trim_end().strip_prefix("error: ") {
        bail!("{}: {}", command.name(), message);
    }
    print!("{reply}");
    Ok(())
}

pub async fn known(runtime_dir: &Path, command: KnownCommands) -> CommandResult {
    let command = match command {
        KnownCommands::Add { id } => ControlCommand::AddKnownDevice(parse_id(&id)?),
        KnownCommands::Remove { id } => ControlCommand::RemoveKnownDevice(parse_id(&id)?),
        KnownCommands::List => ControlCommand::ShowKnownDevices,
    };
    send(runtime_dir, command).await
}

pub async fn slots(runtime_dir: &Path) -> CommandResult {
    send(runtime_dir, ControlCommand::Slots).await
}
