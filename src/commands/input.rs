//! Channel socket command handlers.

use std::path::Path;

use anyhow::{bail, Context};
use aoa_driver::endpoint::{socket_path, status, EndpointClient};
use aoa_hid::{DeviceKind, MAX_KEYBOARD_WRITE, STEP_DOWN, STEP_UP};

use super::CommandResult;
use crate::cli::Step;

async fn connect(
    runtime_dir: &Path,
    kind: DeviceKind,
    slot: usize,
) -> anyhow::Result<EndpointClient> {
    let path = socket_path(runtime_dir, kind, slot);
    EndpointClient::connect(&path)
        .await
        .with_context(|| format!("slot {slot} has no {kind} endpoint at {}", path.display()))
}

async fn send(
    client: &mut EndpointClient,
    kind: DeviceKind,
    payload: &[u8],
) -> anyhow::Result<usize> {
    let reply = client.write(payload).await?;
    if !reply.is_ok() {
        bail!("{} write rejected: {}", kind, status::name(reply.status));
    }
    Ok(usize::from(reply.count))
}

/// Type `text`, at most one keyboard write's worth per request
pub async fn type_text(runtime_dir: &Path, slot: usize, text: &str) -> CommandResult {
    if text.is_empty() {
        return Ok(());
    }
    let mut client = connect(runtime_dir, DeviceKind::Keyboard, slot).await?;
    let mut typed = 0;
    for chunk in text.as_bytes().chunks(MAX_KEYBOARD_WRITE) {
        typed += send(&mut client, DeviceKind::Keyboard, chunk).await?;
    }
    println!("Typed {typed} bytes on slot {slot}");
    Ok(())
}

pub async fn mouse(
    runtime_dir: &Path,
    slot: usize,
    dx: i8,
    dy: i8,
    wheel: i8,
    click: bool,
) -> CommandResult {
    let payload = [dx as u8, dy as u8, wheel as u8, u8::from(click)];
    let mut client = connect(runtime_dir, DeviceKind::Mouse, slot).await?;
    send(&mut client, DeviceKind::Mouse, &payload).await?;
    Ok(())
}

/// Volume or brightness step
pub async fn step(runtime_dir: &Path, kind: DeviceKind, slot: usize, step: Step) -> CommandResult {
    let payload = match step {
        Step::Up => STEP_UP,
        Step::Down => STEP_DOWN,
    };
    let mut client = connect(runtime_dir, kind, slot).await?;
    send(&mut client, kind, &[payload]).await?;
    Ok(())
}
