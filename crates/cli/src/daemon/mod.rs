//! Control socket: the daemon side and a small client for it.

mod host;
mod server;

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use blynx_protocol::{BroadcastEvent, ClientEnvelope, ControlRequest, ControlResponse, ServerMessage};
pub use host::CommandWindowHost;
pub use server::Daemon;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, ReadHalf, WriteHalf};
#[cfg(windows)]
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::debug;

/// Loopback port used instead of a socket file on Windows.
pub const DAEMON_TCP_PORT: u16 = 19333;

#[cfg(unix)]
type Stream = UnixStream;
#[cfg(windows)]
type Stream = TcpStream;

/// Control socket path for the current user.
///
/// `$XDG_RUNTIME_DIR/blynx.sock` when that directory is set, otherwise
/// `/tmp/blynx-{uid}.sock`.
#[cfg(unix)]
pub fn default_socket_path() -> PathBuf {
	if let Some(runtime) = std::env::var_os("XDG_RUNTIME_DIR").filter(|v| !v.is_empty()) {
		return PathBuf::from(runtime).join("blynx.sock");
	}

	let uid = unsafe { libc::getuid() };
	PathBuf::from(format!("/tmp/blynx-{uid}.sock"))
}

/// Unused on Windows, where the daemon listens on [`DAEMON_TCP_PORT`].
#[cfg(windows)]
pub fn default_socket_path() -> PathBuf {
	std::env::temp_dir().join("blynx.sock")
}

/// True for connect errors that just mean no daemon is listening.
pub fn is_not_running(err: &io::Error) -> bool {
	matches!(err.kind(), io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused)
}

async fn connect_stream(socket: &Path) -> io::Result<Stream> {
	#[cfg(unix)]
	{
		UnixStream::connect(socket).await
	}

	#[cfg(windows)]
	{
		let _ = socket;
		TcpStream::connect(("127.0.0.1", DAEMON_TCP_PORT)).await
	}
}

/// One connection to the daemon.
///
/// Events that arrive while waiting for a response are queued and handed
/// out by [`DaemonClient::next_event`].
pub struct DaemonClient {
	lines: Lines<BufReader<ReadHalf<Stream>>>,
	writer: WriteHalf<Stream>,
	next_id: u64,
	events: VecDeque<BroadcastEvent>,
}

impl DaemonClient {
	pub async fn connect(socket: &Path) -> io::Result<Self> {
		let stream = connect_stream(socket).await?;
		let (reader, writer) = tokio::io::split(stream);
		Ok(Self {
			lines: BufReader::new(reader).lines(),
			writer,
			next_id: 0,
			events: VecDeque::new(),
		})
	}

	/// Connects, or returns `None` when no daemon is listening.
	pub async fn try_connect(socket: &Path) -> Result<Option<Self>> {
		match Self::connect(socket).await {
			Ok(client) => Ok(Some(client)),
			Err(err) if is_not_running(&err) => Ok(None),
			Err(err) => {
				Err(err).with_context(|| format!("Failed to connect to daemon at {}", socket.display()))
			}
		}
	}

	pub async fn request(&mut self, request: ControlRequest) -> Result<ControlResponse> {
		self.next_id += 1;
		let id = self.next_id;
		debug!(target = "blynx.daemon", id, request = request.name(), "sending request");

		let mut line = serde_json::to_vec(&ClientEnvelope { id, request })?;
		line.push(b'\n');
		self.writer.write_all(&line).await.context("Failed to write request")?;
		self.writer.flush().await?;

		loop {
			match self.read_message().await? {
				Some(ServerMessage::Response { id: Some(got), response }) if got == id => return Ok(response),
				// Only our own line can be rejected as unparseable.
				Some(ServerMessage::Response { id: None, response }) => return Ok(response),
				Some(ServerMessage::Response { id: Some(other), .. }) => {
					debug!(target = "blynx.daemon", id = other, "ignoring stale response");
				}
				Some(ServerMessage::Event { event }) => self.events.push_back(event),
				None => bail!("Daemon closed the connection"),
			}
		}
	}

	/// Next broadcast event, or `None` once the daemon hangs up.
	pub async fn next_event(&mut self) -> Result<Option<BroadcastEvent>> {
		if let Some(event) = self.events.pop_front() {
			return Ok(Some(event));
		}
		loop {
			match self.read_message().await? {
				Some(ServerMessage::Event { event }) => return Ok(Some(event)),
				Some(ServerMessage::Response { .. }) => continue,
				None => return Ok(None),
			}
		}
	}

	async fn read_message(&mut self) -> Result<Option<ServerMessage>> {
		let Some(line) = self.lines.next_line().await.context("Failed to read from daemon")? else {
			return Ok(None);
		};
		serde_json::from_str(&line)
			.map(Some)
			.with_context(|| format!("Invalid daemon message: {line}"))
	}
}
