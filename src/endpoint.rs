//! Per-slot channel endpoints on Unix stream sockets
//!
//! Every bound slot gets one socket per device kind, named
//! `<node name><slot>.sock` in the runtime directory. A connection holds the
//! channel open; only one connection per socket is admitted at a time.
//!
//! Wire format, per request:
//!
//! ```text
//! request: [len: u8][payload: len bytes]
//! reply:   [status: u8][count: u8]
//! ```

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aoa_hid::{AccessoryHub, Channel, DeviceKind, HidError, SlotToken};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Reply status codes
pub mod status {
    pub const OK: u8 = 0;
    pub const INVALID_ARGUMENT: u8 = 1;
    pub const TRANSPORT: u8 = 2;
    pub const UNBOUND: u8 = 3;
    pub const ALREADY_OPEN: u8 = 4;
    pub const INTERNAL: u8 = 5;

    /// Get human-readable name for a status code
    pub fn name(status: u8) -> &'static str {
        match status {
            OK => "ok",
            INVALID_ARGUMENT => "invalid argument",
            TRANSPORT => "transport error",
            UNBOUND => "slot not bound",
            ALREADY_OPEN => "channel already open",
            INTERNAL => "internal error",
            _ => "unknown status",
        }
    }
}

/// Socket file mode
const SOCKET_MODE: u32 = 0o660;

/// Status byte for a failed write
pub fn status_of(err: &HidError) -> u8 {
    match err {
        HidError::InvalidArgument(_) => status::INVALID_ARGUMENT,
        HidError::Transport(_) | HidError::ProtocolMismatch { .. } => status::TRANSPORT,
        HidError::Unbound { .. } => status::UNBOUND,
        HidError::AlreadyOpen { .. } => status::ALREADY_OPEN,
        HidError::CapacityExceeded { .. }
        | HidError::AlreadyClosed { .. }
        | HidError::RegistrationInProgress { .. }
        | HidError::ResourceExhausted(_) => status::INTERNAL,
    }
}

/// `<runtime_dir>/<node name><slot>.sock`
pub fn socket_path(runtime_dir: &Path, kind: DeviceKind, slot: usize) -> PathBuf {
    runtime_dir.join(format!("{}{}.sock", kind.node_name(), slot))
}

/// One reply frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub status: u8,
    pub count: u8,
}

impl Reply {
    pub fn ok(count: usize) -> Self {
        Self {
            status: status::OK,
            count: u8::try_from(count).unwrap_or(u8::MAX),
        }
    }

    pub fn error(err: &HidError) -> Self {
        Self {
            status: status_of(err),
            count: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == status::OK
    }

    pub fn to_bytes(self) -> [u8; 2] {
        [self.status, self.count]
    }

    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self {
            status: bytes[0],
            count: bytes[1],
        }
    }
}

/// Read one request frame; `None` on a clean end of stream
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let len = match reader.read_u8().await {
        Ok(len) => len,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut payload = vec![0u8; usize::from(len)];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Write one request frame
pub async fn write_request<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = u8::try_from(payload.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("payload of {} bytes does not fit one frame", payload.len()),
        )
    })?;
    writer.write_u8(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

pub async fn read_reply<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Reply> {
    let mut bytes = [0u8; 2];
    reader.read_exact(&mut bytes).await?;
    Ok(Reply::from_bytes(bytes))
}

async fn write_reply<W: AsyncWrite + Unpin>(writer: &mut W, reply: Reply) -> io::Result<()> {
    writer.write_all(&reply.to_bytes()).await?;
    writer.flush().await
}

/// Client side of one channel endpoint
pub struct EndpointClient {
    stream: UnixStream,
}

impl EndpointClient {
    pub async fn connect(path: &Path) -> io::Result<Self> {
        let stream = UnixStream::connect(path).await?;
        Ok(Self { stream })
    }

    /// Send one payload and wait for its reply
    pub async fn write(&mut self, payload: &[u8]) -> io::Result<Reply> {
        // A refused connection has its reply already queued; read it even if the write fails
        let sent = write_request(&mut self.stream, payload).await;
        match read_reply(&mut self.stream).await {
            Ok(reply) => Ok(reply),
            Err(e) => Err(sent.err().unwrap_or(e)),
        }
    }
}

/// Sockets serving one bound slot; closed and unlinked on drop
pub struct SlotEndpoints {
    token: SlotToken,
    listeners: Vec<(PathBuf, JoinHandle<()>)>,
}

impl SlotEndpoints {
    /// Create the four sockets of `token`'s slot and start accepting
    pub fn spawn(hub: Arc<AccessoryHub>, runtime_dir: &Path, token: SlotToken) -> io::Result<Self> {
        let slot = token.slot().index();
        let mut endpoints = Self {
            token,
            listeners: Vec::with_capacity(DeviceKind::COUNT),
        };

        for kind in DeviceKind::ALL {
            let path = socket_path(runtime_dir, kind, slot);
            // Stale socket from an earlier run
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
            let listener = UnixListener::bind(&path)?;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(SOCKET_MODE))?;
            debug!(%kind, slot, path = %path.display(), "Channel endpoint listening");

            let handle = tokio::spawn(accept_loop(Arc::clone(&hub), kind, token, listener));
            endpoints.listeners.push((path, handle));
        }

        info!(slot, "Channel endpoints created");
        Ok(endpoints)
    }

    pub fn token(&self) -> SlotToken {
        self.token
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.listeners.iter().map(|(path, _)| path.as_path())
    }
}

impl Drop for SlotEndpoints {
    fn drop(&mut self) {
        for (path, handle) in self.listeners.drain(..) {
            handle.abort();
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), "Failed to remove endpoint: {}", e);
                }
            }
        }
        info!(slot = %self.token.slot(), "Channel endpoints removed");
    }
}

/// Accept connections until aborted; aborting drops every live connection
async fn accept_loop(
    hub: Arc<AccessoryHub>,
    kind: DeviceKind,
    token: SlotToken,
    listener: UnixListener,
) {
    let mut connections = JoinSet::new();
    loop {
        while connections.try_join_next().is_some() {}

        match listener.accept().await {
            Ok((stream, _)) => {
                connections.spawn(serve_connection(Arc::clone(&hub), kind, token, stream));
            }
            Err(e) => {
                warn!(%kind, slot = %token.slot(), "Accept failed: {}", e);
                return;
            }
        }
    }
}

async fn serve_connection(
    hub: Arc<AccessoryHub>,
    kind: DeviceKind,
    token: SlotToken,
    mut stream: UnixStream,
) {
    let slot = token.slot();
    let channel = match hub.open_channel(kind, token) {
        Ok(channel) => Arc::new(channel),
        Err(e) => {
            debug!(%kind, %slot, "Refusing connection: {}", e);
            if let Err(e) = write_reply(&mut stream, Reply::error(&e)).await {
                debug!(%kind, %slot, "Reply failed: {}", e);
            }
            return;
        }
    };

    if let Err(e) = run_channel(&channel, &mut stream).await {
        debug!(%kind, %slot, "Connection closed: {}", e);
    }
}

/// Serve requests in order until the client hangs up
async fn run_channel(channel: &Arc<Channel>, stream: &mut UnixStream) -> io::Result<()> {
    while let Some(payload) = read_request(stream).await? {
        let worker = Arc::clone(channel);
        let result = tokio::task::spawn_blocking(move || worker.write(&payload)).await;

        let reply = match result {
            Ok(Ok(count)) => Reply::ok(count),
            Ok(Err(e)) => {
                debug!(kind = %channel.kind(), slot = %channel.token().slot(), "Write failed: {}", e);
                Reply::error(&e)
            }
            Err(e) => {
                warn!(kind = %channel.kind(), "Write worker failed: {}", e);
                Reply {
                    status: status::INTERNAL,
                    count: 0,
                }
            }
        };
        write_reply(stream, reply).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoa_transport::TransportError;

    #[test]
    fn test_socket_path() {
        let path = socket_path(Path::new("/run/aoa-hid"), DeviceKind::Mouse, 63);
        assert_eq!(path, PathBuf::from("/run/aoa-hid/android_mouse63.sock"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(&HidError::InvalidArgument("x".into())), 1);
        assert_eq!(status_of(&HidError::Transport(TransportError::Timeout)), 2);
        assert_eq!(status_of(&HidError::Unbound { slot: 0 }), 3);
        assert_eq!(
            status_of(&HidError::AlreadyOpen {
                kind: DeviceKind::Volume,
                slot: 0
            }),
            4
        );
        assert_eq!(status_of(&HidError::ResourceExhausted("x".into())), 5);
        assert_eq!(status::name(status::UNBOUND), "slot not bound");
    }

    #[test]
    fn test_reply_saturates_count() {
        assert_eq!(Reply::ok(300).count, u8::MAX);
        assert_eq!(Reply::ok(4).to_bytes(), [0, 4]);
    }

    #[tokio::test]
    async fn test_request_framing() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_request(&mut a, b"hey").await.unwrap();
        write_request(&mut a, &[]).await.unwrap();
        drop(a);

        assert_eq!(read_request(&mut b).await.unwrap(), Some(b"hey".to_vec()));
        assert_eq!(read_request(&mut b).await.unwrap(), Some(Vec::new()));
        assert_eq!(read_request(&mut b).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_request_rejected() {
        let (mut a, _b) = tokio::io::duplex(512);
        let err = write_request(&mut a, &[0u8; 256]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_truncated_request_is_an_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&[5, 1, 2]).await.unwrap();
        drop(a);
        assert!(read_request(&mut b).await.is_err());
    }
}
