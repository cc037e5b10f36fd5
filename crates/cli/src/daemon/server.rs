use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use blynx::SharedControl;
use blynx_protocol::{ClientEnvelope, ControlRequest, ControlResponse, ServerMessage, codes};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
#[cfg(windows)]
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[cfg(windows)]
use super::DAEMON_TCP_PORT;

/// Serves [`SharedControl`] to every window that connects.
pub struct Daemon {
	control: Arc<SharedControl>,
	socket_path: PathBuf,
	shutdown_tx: watch::Sender<bool>,
	shutdown_rx: watch::Receiver<bool>,
	#[cfg(unix)]
	listener: UnixListener,
	#[cfg(windows)]
	listener: TcpListener,
}

impl Daemon {
	/// Binds the control socket, replacing a stale socket file.
	pub async fn bind(socket_path: &Path, control: Arc<SharedControl>) -> Result<Self> {
		let (shutdown_tx, shutdown_rx) = watch::channel(false);

		#[cfg(unix)]
		let listener = {
			if socket_path.exists() {
				std::fs::remove_file(socket_path)
					.with_context(|| format!("Failed to remove stale socket: {}", socket_path.display()))?;
			}
			if let Some(parent) = socket_path.parent().filter(|p| !p.as_os_str().is_empty()) {
				std::fs::create_dir_all(parent)
					.with_context(|| format!("Failed to create socket directory: {}", parent.display()))?;
			}
			let listener = UnixListener::bind(socket_path)
				.with_context(|| format!("Failed to bind control socket: {}", socket_path.display()))?;
			info!(target = "blynx.daemon", socket = %socket_path.display(), "daemon listening");
			listener
		};

		#[cfg(windows)]
		let listener = {
			let addr = format!("127.0.0.1:{DAEMON_TCP_PORT}");
			let listener = TcpListener::bind(&addr)
				.await
				.with_context(|| format!("Failed to bind control port: {addr}"))?;
			info!(target = "blynx.daemon", addr, "daemon listening");
			listener
		};

		Ok(Self {
			control,
			socket_path: socket_path.to_path_buf(),
			shutdown_tx,
			shutdown_rx,
			listener,
		})
	}

	/// Accepts connections until a `shutdown` request or a termination signal.
	pub async fn run(mut self) -> Result<()> {
		let signal = shutdown_signal();
		tokio::pin!(signal);

		loop {
			tokio::select! {
				_ = self.shutdown_rx.changed() => {
					if *self.shutdown_rx.borrow() {
						info!(target = "blynx.daemon", "shutdown requested via message");
						break;
					}
				}
				name = &mut signal => {
					info!(target = "blynx.daemon", signal = name?, "shutting down");
					break;
				}
				accept = self.listener.accept() => {
					let (stream, _) = accept.context("Daemon accept failed")?;
					let control = Arc::clone(&self.control);
					let shutdown_tx = self.shutdown_tx.clone();
					tokio::spawn(async move {
						if let Err(err) = handle_client(stream, control, shutdown_tx).await {
							warn!(target = "blynx.daemon", error = %err, "connection error");
						}
					});
				}
			}
		}

		#[cfg(unix)]
		if let Err(err) = std::fs::remove_file(&self.socket_path) {
			debug!(target = "blynx.daemon", error = %err, "socket already gone");
		}
		Ok(())
	}
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str> {
	use tokio::signal::unix::{SignalKind, signal};

	let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
	let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
	tokio::select! {
		_ = sigterm.recv() => Ok("SIGTERM"),
		_ = sigint.recv() => Ok("SIGINT"),
	}
}

#[cfg(windows)]
async fn shutdown_signal() -> Result<&'static str> {
	tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
	Ok("ctrl-c")
}

/// Answers request lines and forwards every broadcast event to one client.
async fn handle_client<S>(stream: S, control: Arc<SharedControl>, shutdown_tx: watch::Sender<bool>) -> Result<()>
where
	S: AsyncRead + AsyncWrite + Send + 'static,
{
	let (reader, mut writer) = tokio::io::split(stream);
	let mut lines = BufReader::new(reader).lines();
	let mut events = control.subscribe();

	loop {
		tokio::select! {
			line = lines.next_line() => {
				let Some(line) = line.context("Failed to read request")? else {
					break;
				};
				if line.trim().is_empty() {
					continue;
				}
				let (message, stop) = answer(&control, &line).await;
				write_message(&mut writer, &message).await?;
				if stop {
					let _ = shutdown_tx.send(true);
					break;
				}
			}
			event = events.recv() => {
				let Some(event) = event else {
					break;
				};
				write_message(&mut writer, &ServerMessage::Event { event }).await?;
			}
		}
	}

	Ok(())
}

/// Response for one request line, and whether the daemon should stop.
async fn answer(control: &SharedControl, line: &str) -> (ServerMessage, bool) {
	let envelope: ClientEnvelope = match serde_json::from_str(line) {
		Ok(envelope) => envelope,
		Err(err) => {
			warn!(target = "blynx.daemon", error = %err, "malformed request line");
			let response = ControlResponse::error(codes::INVALID_REQUEST, format!("Invalid request: {err}"));
			return (ServerMessage::Response { id: None, response }, false);
		}
	};

	debug!(target = "blynx.daemon", id = envelope.id, request = envelope.request.name(), "request");
	let stop = matches!(envelope.request, ControlRequest::Shutdown);
	let response = control.handle(envelope.request).await;
	(
		ServerMessage::Response {
			id: Some(envelope.id),
			response,
		},
		stop,
	)
}

async fn write_message<W>(writer: &mut W, message: &ServerMessage) -> Result<()>
where
	W: AsyncWrite + Unpin,
{
	let mut payload = serde_json::to_vec(message).context("Failed to serialize message")?;
	payload.push(b'\n');
	writer.write_all(&payload).await.context("Failed to write message")?;
	writer.flush().await.context("Failed to flush message")?;
	Ok(())
}
