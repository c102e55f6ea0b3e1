// ── Tunnel lifecycle manager ──
//
// Owns the tunnel state machine and the running client session.
//
//   Stopped ──start──▶ Starting ──connected──▶ Active ──stop──▶ Stopping ──exit──▶ Stopped
//                         │                      │                 │
//                         └──fail/timeout──▶ Error ◀──crash────────┘◀──timeout
//
// `start`, `stop` and `recover` run under one async lock, so concurrent
// callers are queued and each sees a settled pre-state. Every transition
// is persisted before it is swapped in and published; if the write fails
// the transition is abandoned and nothing is published.
//
// A client that loses the relay while Active counts as a crash even though
// the process keeps running: the session is terminated and the manager
// moves to Error.

use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use chrono::Utc;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{TunnelClient, TunnelControl, TunnelEvent};
use crate::broadcast::{BroadcastStream, Broadcaster, SubscriberError, Subscription};
use crate::config::TunnelOptions;
use crate::error::CoreError;
use crate::model::{TunnelState, TunnelStatus};
use crate::registry::CameraRegistry;
use crate::relay_config::ClientConfig;
use crate::store::Storage;

/// Drives the tunnel client through its lifecycle.
///
/// Cheaply cloneable; all clones share one state machine. Call
/// [`shutdown`](Self::shutdown) before dropping the last clone to stop the
/// client and its supervisor task.
#[derive(Clone)]
pub struct TunnelManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    options: TunnelOptions,
    storage: Storage,
    registry: Arc<CameraRegistry>,
    client: Arc<dyn TunnelClient>,
    status_hub: Broadcaster<TunnelStatus>,
    /// Last committed status. Only written with `lifecycle` held.
    current: ArcSwap<TunnelStatus>,
    lifecycle: Mutex<Lifecycle>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Lifecycle {
    /// Incremented for every launch so stale exit reports can be told apart.
    epoch: u64,
    session: Option<ActiveSession>,
}

struct ActiveSession {
    epoch: u64,
    control: Box<dyn TunnelControl>,
    /// Flips to `true` once the client has exited.
    exited: watch::Receiver<bool>,
}

/// Outcome the supervisor hands back to a waiting `start`.
type ConnectSignal = Result<(), String>;

impl TunnelManager {
    pub fn new(
        storage: Storage,
        registry: Arc<CameraRegistry>,
        client: Arc<dyn TunnelClient>,
        options: TunnelOptions,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                options,
                storage,
                registry,
                client,
                status_hub: Broadcaster::new("tunnel-status"),
                current: ArcSwap::from_pointee(TunnelStatus::default()),
                lifecycle: Mutex::new(Lifecycle::default()),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn options(&self) -> &TunnelOptions {
        &self.inner.options
    }

    /// Current status. Never blocks on an in-flight transition.
    pub fn status(&self) -> TunnelStatus {
        TunnelStatus::clone(&self.inner.current.load())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Reconcile with the status a previous run persisted.
    ///
    /// No client survives a restart, so a persisted Starting, Active or
    /// Stopping is rewritten to Stopped. Stopped and Error are adopted
    /// as-is.
    pub async fn recover(&self) -> Result<TunnelStatus, CoreError> {
        let inner = &self.inner;
        let lc = inner.lifecycle.lock().await;
        if lc.session.is_some() {
            return Ok(self.status());
        }

        let Some(persisted) = inner.storage.load_tunnel_status().await? else {
            debug!("no persisted tunnel status");
            return Ok(self.status());
        };

        match persisted.state {
            TunnelState::Stopped | TunnelState::Error => {
                debug!(state = %persisted.state, "adopted persisted tunnel status");
                inner.current.store(Arc::new(persisted.clone()));
                Ok(persisted)
            }
            TunnelState::Starting | TunnelState::Active | TunnelState::Stopping => {
                info!(
                    state = %persisted.state,
                    "previous run left the tunnel mid-lifecycle; resetting to stopped"
                );
                let next = TunnelStatus::stopped(Utc::now());
                inner.commit(next.clone()).await?;
                Ok(next)
            }
        }
    }

    /// Launch the tunnel client and wait for it to log in to the relay.
    ///
    /// A no-op returning the current status while a client is already
    /// starting or running. Fails with `Precondition` (status untouched)
    /// when no enabled relay or camera exists. Any later failure leaves
    /// the manager in Error.
    pub async fn start(&self) -> Result<TunnelStatus, CoreError> {
        let inner = &self.inner;
        let mut lc = inner.lifecycle.lock().await;

        let current = self.status();
        if current.state.is_running() && lc.session.is_some() {
            debug!(state = %current.state, "start: tunnel already running");
            return Ok(current);
        }
        inner.discard_session(&mut lc).await;

        let relay = inner
            .storage
            .load_relay_config()
            .await?
            .filter(|r| r.enabled)
            .ok_or_else(|| CoreError::precondition("no enabled relay server is configured"))?;
        let cameras = inner.registry.enabled().await?;
        if cameras.is_empty() {
            return Err(CoreError::precondition("no enabled cameras to expose"));
        }

        inner.commit(TunnelStatus::starting(Vec::new(), Utc::now())).await?;

        let config = match ClientConfig::build(&relay, &cameras) {
            Ok(config) => config,
            Err(e) => return Err(inner.fail(e).await),
        };
        let session = match inner.client.launch(&config).await {
            Ok(session) => session,
            Err(e) => return Err(inner.fail(e).await),
        };

        lc.epoch += 1;
        let epoch = lc.epoch;
        let (connected_tx, connected_rx) = oneshot::channel();
        let (exited_tx, exited_rx) = watch::channel(false);
        tokio::spawn(supervise(
            Arc::downgrade(inner),
            epoch,
            session.events,
            connected_tx,
            exited_tx,
            inner.cancel.child_token(),
        ));
        lc.session = Some(ActiveSession {
            epoch,
            control: session.control,
            exited: exited_rx,
        });
        debug!(epoch, proxies = config.proxies.len(), "waiting for tunnel login");

        let timeout = inner.options.start_timeout;
        match tokio::time::timeout(timeout, connected_rx).await {
            Ok(Ok(Ok(()))) => {
                let next = TunnelStatus::active(config.mapped_ports(), Utc::now());
                if let Err(e) = inner.commit(next.clone()).await {
                    inner.discard_session(&mut lc).await;
                    return Err(e);
                }
                Ok(next)
            }
            Ok(Ok(Err(reason))) => {
                lc.session = None;
                Err(inner
                    .fail(CoreError::Process {
                        message: format!("tunnel client exited before connecting: {reason}"),
                    })
                    .await)
            }
            Ok(Err(_)) => {
                inner.discard_session(&mut lc).await;
                Err(inner
                    .fail(CoreError::Process {
                        message: "tunnel supervisor stopped before the client connected".into(),
                    })
                    .await)
            }
            Err(_) => {
                inner.discard_session(&mut lc).await;
                Err(inner
                    .fail(CoreError::Timeout {
                        operation: "tunnel connection".into(),
                        timeout_secs: timeout.as_secs(),
                    })
                    .await)
            }
        }
    }

    /// Terminate the client and wait for it to exit.
    ///
    /// A no-op while Stopped or Stopping. From Error, any leftover client
    /// is discarded and the manager returns to Stopped.
    pub async fn stop(&self) -> Result<TunnelStatus, CoreError> {
        let inner = &self.inner;
        let mut lc = inner.lifecycle.lock().await;

        let current = self.status();
        if current.state.is_at_rest() {
            debug!(state = %current.state, "stop: nothing to stop");
            return Ok(current);
        }
        if current.state == TunnelState::Error {
            inner.discard_session(&mut lc).await;
            let next = TunnelStatus::stopped(Utc::now());
            inner.commit(next.clone()).await?;
            return Ok(next);
        }

        inner
            .commit(TunnelStatus::stopping(&current, Utc::now()))
            .await?;

        if let Some(session) = lc.session.take() {
            if let Err(e) = session.control.terminate().await {
                return Err(inner.fail(e).await);
            }
            let timeout = inner.options.stop_timeout;
            let mut exited = session.exited;
            // A closed channel means the supervisor is gone, which it only
            // is once the client has exited or on shutdown.
            let confirmed = tokio::time::timeout(timeout, async move {
                let _ = exited.wait_for(|gone| *gone).await;
            })
            .await;
            if confirmed.is_err() {
                return Err(inner
                    .fail(CoreError::Timeout {
                        operation: "tunnel shutdown".into(),
                        timeout_secs: timeout.as_secs(),
                    })
                    .await);
            }
        }

        let next = TunnelStatus::stopped(Utc::now());
        inner.commit(next.clone()).await?;
        Ok(next)
    }

    /// Stop, then start with a configuration rebuilt from current data.
    pub async fn restart(&self) -> Result<TunnelStatus, CoreError> {
        self.stop().await?;
        self.start().await
    }

    /// Stop the tunnel and cancel background tasks. The manager must not
    /// be used afterwards.
    ///
    /// An Error status stays on record for the next run to report; only a
    /// leftover client is terminated.
    pub async fn shutdown(&self) {
        let in_error = {
            let mut lc = self.inner.lifecycle.lock().await;
            let in_error = self.status().state == TunnelState::Error;
            if in_error {
                self.inner.discard_session(&mut lc).await;
            }
            in_error
        };
        if !in_error {
            if let Err(e) = self.stop().await {
                warn!(error = %e, "tunnel did not stop cleanly during shutdown");
            }
        }
        self.inner.cancel.cancel();
        debug!("tunnel manager shut down");
    }

    // ── Status subscriptions ─────────────────────────────────────────

    /// Register `handler` for every future status change.
    ///
    /// No replay: call [`status`](Self::status) right after subscribing
    /// to learn the current state.
    #[must_use = "keep the Subscription to be able to unsubscribe"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&TunnelStatus) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.inner.status_hub.subscribe(handler)
    }

    /// Channel-backed subscription; the manager never waits on the reader.
    pub fn subscribe_stream(&self) -> BroadcastStream<TunnelStatus> {
        self.inner.status_hub.subscribe_stream()
    }
}

impl ManagerInner {
    /// Persist, swap in, publish. Callers hold the lifecycle lock.
    async fn commit(&self, next: TunnelStatus) -> Result<(), CoreError> {
        if let Err(e) = self.storage.save_tunnel_status(&next).await {
            error!(to = %next.state, error = %e, "could not persist tunnel status; transition abandoned");
            return Err(e.into());
        }
        let previous = self.current.swap(Arc::new(next.clone()));
        info!(
            from = %previous.state,
            to = %next.state,
            error = next.last_error.as_deref(),
            "tunnel state changed"
        );
        self.status_hub.publish(&next);
        Ok(())
    }

    /// Move to Error carrying `err`, and hand `err` back to the caller.
    async fn fail(&self, err: CoreError) -> CoreError {
        let status = TunnelStatus::error(err.to_string(), Utc::now());
        if let Err(store_err) = self.commit(status).await {
            warn!(error = %err, store_error = %store_err, "tunnel failure could not be recorded");
        }
        err
    }

    /// Terminate and forget any session left behind. Its supervisor keeps
    /// draining events; the exit report is ignored once the session is gone.
    async fn discard_session(&self, lc: &mut Lifecycle) {
        if let Some(session) = lc.session.take() {
            debug!(epoch = session.epoch, "discarding tunnel session");
            if let Err(e) = session.control.terminate().await {
                warn!(error = %e, "failed to terminate discarded tunnel client");
            }
        }
    }

    /// The client of run `epoch` lost the relay. While Active the run is
    /// abandoned and the manager moves to Error; its exit report is then
    /// ignored as retired.
    async fn on_disconnect(&self, epoch: u64, reason: &str) {
        let mut lc = self.lifecycle.lock().await;
        if !lc.session.as_ref().is_some_and(|s| s.epoch == epoch) {
            debug!(epoch, reason, "disconnect of a retired tunnel client");
            return;
        }
        let state = self.current.load().state;
        if state != TunnelState::Active {
            debug!(epoch, %state, reason, "tunnel client disconnected");
            return;
        }
        warn!(epoch, reason, "tunnel lost its relay connection");
        self.discard_session(&mut lc).await;
        let status = TunnelStatus::error(format!("relay connection lost: {reason}"), Utc::now());
        if let Err(e) = self.commit(status).await {
            error!(error = %e, "tunnel disconnect could not be recorded");
        }
    }

    /// The client of run `epoch` went away without being asked to.
    async fn on_process_exit(&self, epoch: u64, reason: &str) {
        let mut lc = self.lifecycle.lock().await;
        if !lc.session.as_ref().is_some_and(|s| s.epoch == epoch) {
            debug!(epoch, reason, "exit of a retired tunnel client");
            return;
        }
        lc.session = None;

        let state = self.current.load().state;
        if state != TunnelState::Active {
            debug!(epoch, %state, reason, "tunnel client exited");
            return;
        }
        warn!(epoch, reason, "tunnel client exited unexpectedly");
        let status = TunnelStatus::error(
            format!("tunnel client exited unexpectedly: {reason}"),
            Utc::now(),
        );
        if let Err(e) = self.commit(status).await {
            error!(error = %e, "tunnel crash could not be recorded");
        }
    }
}

/// Relays session events to the manager for one client run.
async fn supervise(
    manager: Weak<ManagerInner>,
    epoch: u64,
    mut events: mpsc::Receiver<TunnelEvent>,
    connected: oneshot::Sender<ConnectSignal>,
    exited: watch::Sender<bool>,
    cancel: CancellationToken,
) {
    let mut connected = Some(connected);
    let reason = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(epoch, "tunnel supervisor cancelled");
                return;
            }
            event = events.recv() => match event {
                Some(TunnelEvent::Connected) => {
                    if let Some(tx) = connected.take() {
                        let _ = tx.send(Ok(()));
                    }
                }
                Some(TunnelEvent::Disconnected { reason }) => {
                    // Before the first login frpc exits on its own.
                    if connected.is_some() {
                        debug!(epoch, reason = %reason, "tunnel client login attempt failed");
                    } else if let Some(inner) = manager.upgrade() {
                        // Off this task: `stop` may hold the lifecycle lock
                        // while it waits for the exit this loop reports.
                        tokio::spawn(async move { inner.on_disconnect(epoch, &reason).await });
                    }
                }
                Some(TunnelEvent::Exited { reason }) => break reason,
                None => break "tunnel client event stream closed".to_owned(),
            },
        }
    };

    exited.send_replace(true);
    if let Some(tx) = connected.take() {
        let _ = tx.send(Err(reason.clone()));
    }
    if let Some(inner) = manager.upgrade() {
        inner.on_process_exit(epoch, &reason).await;
    }
}
