// ── frpc process client ──
//
// Runs the frpc binary as a child process. The rendered configuration is
// written to `<work_dir>/frpc.toml`; stdout and stderr are read line by
// line and logged at debug level. A successful relay login is reported as
// `Connected`, a lost relay connection or failed re-login as
// `Disconnected`, and process exit (for whatever reason) as `Exited`.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{TunnelClient, TunnelControl, TunnelEvent, TunnelSession};
use crate::error::CoreError;
use crate::relay_config::ClientConfig;

const CONFIG_FILE: &str = "frpc.toml";
const LOGIN_SUCCESS: &str = "login to server success";
const LOGIN_FAILED: &str = "login to server failed";
const RECONNECTING: &str = "try to reconnect";

/// [`TunnelClient`] backed by the `frpc` executable.
#[derive(Debug, Clone)]
pub struct FrpcClient {
    binary: PathBuf,
    work_dir: PathBuf,
}

impl FrpcClient {
    /// `binary` may be a bare name resolved through `PATH`.
    pub fn new(binary: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            work_dir: work_dir.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn config_path(&self) -> PathBuf {
        self.work_dir.join(CONFIG_FILE)
    }

    async fn write_config(&self, config: &ClientConfig) -> Result<PathBuf, CoreError> {
        let rendered = config.render()?;
        let path = self.config_path();
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| process_err(format!("create {}: {e}", self.work_dir.display())))?;
        write_private(&path, rendered.as_bytes())
            .await
            .map_err(|e| process_err(format!("write {}: {e}", path.display())))?;
        debug!(path = %path.display(), "wrote frpc configuration");
        Ok(path)
    }
}

/// Owner-only on unix, also when an older copy already exists. The file
/// carries the relay token.
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
    }
    file.write_all(contents).await?;
    file.flush().await
}

fn process_err(message: String) -> CoreError {
    CoreError::Process { message }
}

#[async_trait]
impl TunnelClient for FrpcClient {
    async fn launch(&self, config: &ClientConfig) -> Result<TunnelSession, CoreError> {
        let config_path = self.write_config(config).await?;

        let mut child = Command::new(&self.binary)
            .arg("-c")
            .arg(&config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| process_err(format!("failed to spawn {}: {e}", self.binary.display())))?;
        info!(
            binary = %self.binary.display(),
            pid = child.id(),
            proxies = config.proxies.len(),
            "frpc launched"
        );

        let (events_tx, events_rx) = mpsc::channel(16);
        let last_error = Arc::new(Mutex::new(None::<String>));

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, "stdout", events_tx.clone(), Arc::clone(&last_error)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, "stderr", events_tx.clone(), Arc::clone(&last_error)));
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(wait_for_exit(child, kill_rx, readers, last_error, events_tx));

        Ok(TunnelSession {
            events: events_rx,
            control: Box::new(FrpcControl {
                kill: Mutex::new(Some(kill_tx)),
            }),
        })
    }
}

fn spawn_reader<R>(
    stream: R,
    source: &'static str,
    events: mpsc::Sender<TunnelEvent>,
    last_error: Arc<Mutex<Option<String>>>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    debug!(source, error = %e, "frpc output stream closed");
                    break;
                }
            };
            debug!(target: "camtunnel_core::tunnel::frpc", source, "{line}");

            // Receiver gone means the session was abandoned; keep draining.
            if line.contains(LOGIN_SUCCESS) {
                let _ = events.send(TunnelEvent::Connected).await;
                continue;
            }
            if is_error_line(&line) {
                *last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error_text(&line));
            }
            if is_disconnect_line(&line) {
                let reason = error_text(&line);
                let _ = events.send(TunnelEvent::Disconnected { reason }).await;
            }
        }
    })
}

async fn wait_for_exit(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    readers: Vec<JoinHandle<()>>,
    last_error: Arc<Mutex<Option<String>>>,
    events: mpsc::Sender<TunnelEvent>,
) {
    // A dropped control handle counts as a kill request.
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = kill_rx => None,
    };
    let requested = exited.is_none();
    let status = match exited {
        Some(status) => status,
        None => {
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "frpc already gone when kill was requested");
            }
            child.wait().await
        }
    };

    // Readers finish once the pipes close; wait so the last error line is in.
    for reader in readers {
        let _ = reader.await;
    }
    let last_error = last_error
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();

    let reason = exit_reason(requested, status.as_ref().ok(), last_error.as_deref());
    if requested {
        info!("frpc terminated");
    } else {
        match &status {
            Ok(status) => warn!(%status, reason = %reason, "frpc exited"),
            Err(e) => warn!(error = %e, "failed to wait on frpc"),
        }
    }
    let _ = events.send(TunnelEvent::Exited { reason }).await;
}

fn exit_reason(requested: bool, status: Option<&ExitStatus>, last_error: Option<&str>) -> String {
    if requested {
        return "terminated".into();
    }
    let status = status.map_or_else(|| "unknown exit status".to_owned(), ToString::to_string);
    match last_error {
        Some(line) => format!("{status}: {line}"),
        None => status,
    }
}

/// frpc tags errors `[E]` (or `[F]` for fatal) after the timestamp.
fn is_error_line(line: &str) -> bool {
    line.contains("[E]") || line.contains("[F]")
}

/// Lines frpc logs when it loses the relay or fails to log back in.
fn is_disconnect_line(line: &str) -> bool {
    line.contains(RECONNECTING) || line.contains(LOGIN_FAILED)
}

/// Strip the timestamp, level and source-location prefixes frpc puts in
/// front of the message.
fn error_text(line: &str) -> String {
    line.rsplit_once("] ")
        .map_or(line, |(_, msg)| msg)
        .trim()
        .to_owned()
}

/// Control handle for one frpc run.
struct FrpcControl {
    kill: Mutex<Option<oneshot::Sender<()>>>,
}

#[async_trait]
impl TunnelControl for FrpcControl {
    async fn terminate(&self) -> Result<(), CoreError> {
        let sender = self
            .kill
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            // Err means the waiter already saw the process exit.
            let _ = sender.send(());
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{NewCamera, RelayServerConfig};
    use chrono::Utc;
    use std::time::Duration;

    fn config() -> ClientConfig {
        let cam = NewCamera::new("Front Door", "192.168.1.10", 6001).into_record(Utc::now());
        ClientConfig::build(&RelayServerConfig::new("relay.example.com", 7000), &[cam]).unwrap()
    }

    #[test]
    fn error_lines_are_trimmed_to_the_message() {
        let line = "2024/05/01 10:00:00 [E] [service.go:301] login to server failed: token mismatch";
        assert!(is_error_line(line));
        assert_eq!(error_text(line), "login to server failed: token mismatch");
        assert!(!is_error_line("2024/05/01 10:00:00 [I] [proxy_manager.go:150] start proxy success"));
    }

    #[test]
    fn exit_reason_prefers_last_error() {
        assert_eq!(exit_reason(true, None, Some("ignored")), "terminated");
        assert_eq!(exit_reason(false, None, None), "unknown exit status");
        assert_eq!(
            exit_reason(false, None, Some("login to server failed")),
            "unknown exit status: login to server failed"
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_process_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = FrpcClient::new(dir.path().join("no-such-frpc"), dir.path());
        let Err(err) = client.launch(&config()).await else {
            panic!("launch should fail");
        };
        assert_eq!(err.kind(), crate::error::ErrorKind::Process);
        // The configuration is still written for inspection.
        let written = std::fs::read_to_string(client.config_path()).unwrap();
        assert!(written.contains("remotePort = 6001"));
    }

    #[cfg(unix)]
    fn fake_frpc(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-frpc");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reports_login_then_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_frpc(
            dir.path(),
            "echo '2024/05/01 10:00:00 [I] [service.go:288] login to server success'\nexec sleep 30",
        );
        let client = FrpcClient::new(bin, dir.path().join("work"));
        let mut session = client.launch(&config()).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(10), session.events.recv())
            .await
            .unwrap();
        assert_eq!(first, Some(TunnelEvent::Connected));

        session.control.terminate().await.unwrap();
        session.control.terminate().await.unwrap();
        let last = tokio::time::timeout(Duration::from_secs(10), session.events.recv())
            .await
            .unwrap();
        assert_eq!(
            last,
            Some(TunnelEvent::Exited {
                reason: "terminated".into()
            })
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_login_surfaces_in_exit_reason() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_frpc(
            dir.path(),
            "echo '2024/05/01 10:00:00 [E] [service.go:301] login to server failed: token mismatch' >&2\nexit 1",
        );
        let client = FrpcClient::new(bin, dir.path().join("work"));
        let mut session = client.launch(&config()).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(10), session.events.recv())
            .await
            .unwrap();
        assert_eq!(
            event,
            Some(TunnelEvent::Disconnected {
                reason: "login to server failed: token mismatch".into()
            })
        );
        let event = tokio::time::timeout(Duration::from_secs(10), session.events.recv())
            .await
            .unwrap();
        let Some(TunnelEvent::Exited { reason }) = event else {
            panic!("expected exit, got {event:?}");
        };
        assert!(reason.contains("token mismatch"), "{reason}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn lost_relay_is_reported_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_frpc(
            dir.path(),
            "echo '2024/05/01 10:00:00 [I] [service.go:288] login to server success'
echo '2024/05/01 10:05:00 [W] [service.go:132] [a1b2c3] try to reconnect to server...'
echo '2024/05/01 10:05:01 [E] [service.go:301] login to server failed: dial tcp: connection refused'
exec sleep 30",
        );
        let client = FrpcClient::new(bin, dir.path().join("work"));
        let mut session = client.launch(&config()).await.unwrap();

        let mut events = Vec::new();
        for _ in 0..3 {
            let event = tokio::time::timeout(Duration::from_secs(10), session.events.recv())
                .await
                .unwrap()
                .unwrap();
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                TunnelEvent::Connected,
                TunnelEvent::Disconnected {
                    reason: "try to reconnect to server...".into()
                },
                TunnelEvent::Disconnected {
                    reason: "login to server failed: dial tcp: connection refused".into()
                },
            ]
        );
        session.control.terminate().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn config_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        let stale = work.join(CONFIG_FILE);
        std::fs::write(&stale, "old").unwrap();
        std::fs::set_permissions(&stale, std::fs::Permissions::from_mode(0o644)).unwrap();

        let client = FrpcClient::new(dir.path().join("no-such-frpc"), work.clone());
        assert!(client.launch(&config()).await.is_err());

        let meta = std::fs::metadata(client.config_path()).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        let written = std::fs::read_to_string(client.config_path()).unwrap();
        assert!(written.contains("serverAddr"));
    }
}
