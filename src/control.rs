//! Text control socket for runtime administration
//!
//! One command per connection; the reply is written and the connection
//! closed. Commands:
//!
//! - `add_known_device <vid> <pid>`
//! - `remove_known_device <vid> <pid>`
//! - `show_known_devices`
//! - `slots`

use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use aoa_hid::AccessoryHub;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use crate::known_devices::{KnownDeviceError, KnownDevices, UsbId};

/// File name of the control socket inside the runtime directory
pub const CONTROL_SOCKET: &str = "control.sock";

/// Longest accepted command line
const MAX_COMMAND_LEN: u64 = 256;

pub fn control_path(runtime_dir: &Path) -> PathBuf {
    runtime_dir.join(CONTROL_SOCKET)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    AddKnownDevice(UsbId),
    RemoveKnownDevice(UsbId),
    ShowKnownDevices,
    Slots,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("empty command")]
    Empty,

    #[error("unknown command \"{0}\"")]
    UnknownCommand(String),

    #[error("{0} takes no arguments")]
    UnexpectedArguments(&'static str),

    #[error(transparent)]
    KnownDevice(#[from] KnownDeviceError),
}

impl ControlCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ControlCommand::AddKnownDevice(_) => "add_known_device",
            ControlCommand::RemoveKnownDevice(_) => "remove_known_device",
            ControlCommand::ShowKnownDevices => "show_known_devices",
            ControlCommand::Slots => "slots",
        }
    }
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlCommand::AddKnownDevice(id) | ControlCommand::RemoveKnownDevice(id) => {
                write!(f, "{} {:04x} {:04x}", self.name(), id.vendor, id.product)
            }
            _ => f.write_str(self.name()),
        }
    }
}

impl FromStr for ControlCommand {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let (name, args) = line
            .split_once(char::is_whitespace)
            .map(|(name, args)| (name, args.trim()))
            .unwrap_or((line, ""));

        let no_args = |command: ControlCommand| {
            if args.is_empty() {
                Ok(command)
            } else {
                Err(ControlError::UnexpectedArguments(command.name()))
            }
        };

        match name {
            "" => Err(ControlError::Empty),
            "add_known_device" => Ok(ControlCommand::AddKnownDevice(args.parse()?)),
            "remove_known_device" => Ok(ControlCommand::RemoveKnownDevice(args.parse()?)),
            "show_known_devices" => no_args(ControlCommand::ShowKnownDevices),
            "slots" => no_args(ControlCommand::Slots),
            other => Err(ControlError::UnknownCommand(other.to_string())),
        }
    }
}

/// Runtime state the control socket operates on
#[derive(Clone)]
pub struct ControlContext {
    pub known: Arc<KnownDevices>,
    pub hub: Arc<AccessoryHub>,
}

impl ControlContext {
    /// Run one command and render its reply
    pub fn handle(&self, command: ControlCommand) -> Result<String, ControlError> {
        match command {
            ControlCommand::AddKnownDevice(id) => {
                self.known.add(id)?;
                Ok("ok".into())
            }
            ControlCommand::RemoveKnownDevice(id) => {
                self.known.remove(id)?;
                Ok("ok".into())
            }
            ControlCommand::ShowKnownDevices => Ok(self.known.listing()),
            ControlCommand::Slots => Ok(self.slot_listing()),
        }
    }

    /// Parse and run one command line; errors become `error: <message>`
    pub fn execute(&self, line: &str) -> String {
        match line.parse().and_then(|command| self.handle(command)) {
            Ok(reply) => reply,
            Err(e) => format!("error: {e}"),
        }
    }

    /// One line per bound slot: `<slot> <vvvv:pppp> <peer> <product>`
    fn slot_listing(&self) -> String {
        self.hub
            .bound_slots()
            .iter()
            .map(|bound| {
                format!(
                    "{} {} {} {}\n",
                    bound.token.slot(),
                    bound.info.vid_pid(),
                    bound.info.id,
                    bound.info.product_name.as_deref().unwrap_or("-")
                )
            })
            .collect()
    }
}

/// Bind the control socket, replacing a stale one
pub fn bind(runtime_dir: &Path) -> io::Result<UnixListener> {
    let path = control_path(runtime_dir);
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    let listener = UnixListener::bind(&path)?;
    info!(path = %path.display(), "Control socket listening");
    Ok(listener)
}

/// Accept and answer control connections until the task is dropped
pub async fn serve(listener: UnixListener, context: ControlContext) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let context = context.clone();
                tokio::spawn(async move {
                    if let Err(e) = answer(stream, &context).await {
                        debug!("Control connection failed: {}", e);
                    }
                });
            }
            Err(e) => {
                warn!("Control socket accept failed: {}", e);
                return;
            }
        }
    }
}

async fn answer(stream: UnixStream, context: &ControlContext) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut line = String::new();
    BufReader::new(reader.take(MAX_COMMAND_LEN))
        .read_line(&mut line)
        .await?;

    debug!(command = line.trim(), "Control command");
    let mut reply = context.execute(&line);
    if !reply.ends_with('\n') {
        reply.push('\n');
    }
    writer.write_all(reply.as_bytes()).await?;
    writer.shutdown().await
}

/// Client: send one command and return the reply text
pub async fn request(runtime_dir: &Path, command: &ControlCommand) -> io::Result<String> {
    let mut stream = UnixStream::connect(control_path(runtime_dir)).await?;
    stream.write_all(format!("{command}\n").as_bytes()).await?;
    stream.shutdown().await?;

    let mut reply = String::new();
    stream.read_to_string(&mut reply).await?;
    Ok(reply)
}
