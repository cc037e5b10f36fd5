#![cfg(unix)]

use std::path::Path;
use std::time::Duration;

use blynx::notifier::DEFAULT_CAPACITY;
use blynx_cli::commands::open_control;
use blynx_cli::config::Config;
use blynx_cli::daemon::{Daemon, DaemonClient};
use blynx_protocol::{BroadcastEvent, ControlRequest, ControlResponse, Profile, ServerMessage, codes};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn config(dir: &TempDir) -> Config {
	Config {
		user_data_dir: dir.path().join("userdata"),
		app_dir: dir.path().join("app"),
		socket_path: dir.path().join("run/blynx.sock"),
		window_command: Vec::new(),
		event_capacity: DEFAULT_CAPACITY,
	}
}

async fn start(config: &Config) -> JoinHandle<anyhow::Result<()>> {
	let control = std::sync::Arc::new(open_control(config).unwrap());
	let daemon = Daemon::bind(&config.socket_path, control).await.unwrap();
	tokio::spawn(daemon.run())
}

async fn client(socket: &Path) -> DaemonClient {
	let mut client = DaemonClient::connect(socket).await.unwrap();
	// The first answer means the connection is served and subscribed.
	let pong = client.request(ControlRequest::Ping).await.unwrap();
	assert_eq!(pong, ControlResponse::ok("pong"));
	client
}

#[tokio::test]
async fn switch_is_broadcast_to_other_windows() {
	let dir = TempDir::new().unwrap();
	let config = config(&dir);
	let server = start(&config).await;

	let mut a = client(&config.socket_path).await;
	let mut b = client(&config.socket_path).await;

	let created: Profile = a
		.request(ControlRequest::ProfilesCreate {
			name: Some("Work".into()),
		})
		.await
		.unwrap()
		.decode()
		.unwrap();
	let switched: bool = a
		.request(ControlRequest::ProfilesSwitch {
			profile_id: created.id.clone(),
		})
		.await
		.unwrap()
		.decode()
		.unwrap();
	assert!(switched);

	let event = timeout(WAIT, b.next_event()).await.unwrap().unwrap();
	assert_eq!(event, Some(BroadcastEvent::ProfileChanged { profile_id: created.id.clone() }));

	let current: String = b.request(ControlRequest::ProfilesCurrent).await.unwrap().decode().unwrap();
	assert_eq!(current, created.id);

	assert!(a.request(ControlRequest::Shutdown).await.unwrap().is_ok());
	timeout(WAIT, server).await.unwrap().unwrap().unwrap();
	assert!(!config.socket_path.exists());
}

#[tokio::test]
async fn malformed_line_gets_invalid_request() {
	let dir = TempDir::new().unwrap();
	let config = config(&dir);
	let server = start(&config).await;

	let stream = UnixStream::connect(&config.socket_path).await.unwrap();
	let (reader, mut writer) = stream.into_split();
	let mut lines = BufReader::new(reader).lines();

	writer.write_all(b"{\"id\":1,\"request\":{\"type\":\"no_such_thing\"}}\n").await.unwrap();
	let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
	match serde_json::from_str::<ServerMessage>(&line).unwrap() {
		ServerMessage::Response {
			id: None,
			response: ControlResponse::Error { code, .. },
		} => assert_eq!(code, codes::INVALID_REQUEST),
		other => panic!("unexpected message: {other:?}"),
	}

	// The connection stays usable.
	writer.write_all(b"{\"id\":2,\"request\":{\"type\":\"ping\"}}\n").await.unwrap();
	let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
	assert_eq!(line, r#"{"kind":"response","id":2,"response":{"status":"ok","value":"pong"}}"#);

	drop(writer);
	let mut stopper = client(&config.socket_path).await;
	stopper.request(ControlRequest::Shutdown).await.unwrap();
	timeout(WAIT, server).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn state_survives_restart() {
	let dir = TempDir::new().unwrap();
	let config = config(&dir);

	let server = start(&config).await;
	let mut a = client(&config.socket_path).await;
	a.request(ControlRequest::StoreSet {
		key: "searchEngine".into(),
		value: "duckduckgo".into(),
	})
	.await
	.unwrap();
	a.request(ControlRequest::Shutdown).await.unwrap();
	timeout(WAIT, server).await.unwrap().unwrap().unwrap();

	let server = start(&config).await;
	let mut b = client(&config.socket_path).await;
	let engine: String = b.request(ControlRequest::GetSearchEngine).await.unwrap().decode().unwrap();
	assert_eq!(engine, "duckduckgo");
	b.request(ControlRequest::Shutdown).await.unwrap();
	timeout(WAIT, server).await.unwrap().unwrap().unwrap();
}
