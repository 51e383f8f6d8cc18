//! Async driver for a [`Session`].
//!
//! [`SessionRunner::spawn`] moves a session into a single tokio task. That
//! task is the only place the session is touched: triggers from
//! [`SessionHandle`], radio changes, transport completions and the scan
//! timer all arrive as messages and are applied one at a time, so the
//! session never observes concurrent mutation.
//!
//! Transport calls run on their own tasks, each bounded by the timeout
//! configured for that phase, and post their result back as a
//! [`SessionInput`]. Disconnects are spawned and never awaited by the
//! session.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{Error, Result, TransactionError};
use crate::events::{EventDispatcher, EventReceiver, SessionEvent};
use crate::session::{
    Effect, Session, SessionInput, SessionSnapshot, TransactionId, TransactionOutcome,
};
use crate::transport::Transport;

/// Upper bound on a disconnect issued while shutting down.
pub const SHUTDOWN_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `fut`, failing with [`Error::Timeout`] after `duration`.
async fn bounded<T>(
    operation: &str,
    duration: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| Error::timeout(operation, duration))?
}

type Reply = oneshot::Sender<TransactionOutcome>;

enum Request {
    Send { reply: Option<Reply> },
}

/// Client side of a running session.
///
/// Dropping the handle stops the runner; use [`shutdown`](Self::shutdown)
/// to also wait for the in-flight transaction to be released.
#[derive(Debug)]
pub struct SessionHandle {
    requests: mpsc::UnboundedSender<Request>,
    snapshot: watch::Receiver<SessionSnapshot>,
    events: EventDispatcher,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Trigger a transaction without waiting for its outcome.
    ///
    /// A trigger while busy is logged and dropped by the session. The
    /// outcome of every transaction is published as
    /// [`SessionEvent::TransactionFinished`].
    pub fn send_command(&self) -> std::result::Result<(), TransactionError> {
        self.requests
            .send(Request::Send { reply: None })
            .map_err(|_| TransactionError::Shutdown)
    }

    /// Trigger a transaction and wait for it to finish.
    ///
    /// Resolves to [`TransactionError::Busy`] right away if another
    /// transaction is in flight.
    pub async fn transact(&self) -> TransactionOutcome {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(Request::Send { reply: Some(tx) })
            .map_err(|_| TransactionError::Shutdown)?;
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransactionError::Shutdown),
        }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Whether a transaction is in flight.
    pub fn is_busy(&self) -> bool {
        self.snapshot.borrow().busy
    }

    /// Watch snapshots as they change.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Stop the runner, releasing any peripheral it holds.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!("Session runner task failed: {}", e);
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Owns a [`Session`] and executes its effects against a [`Transport`].
pub struct SessionRunner<T: Transport> {
    transport: Arc<T>,
    session: Session<T::Peripheral>,
    config: SessionConfig,
    events: EventDispatcher,
    snapshot: watch::Sender<SessionSnapshot>,
    inbox: mpsc::UnboundedSender<SessionInput<T::Peripheral>>,
    shutdown: CancellationToken,
    scan_timer: Option<CancellationToken>,
    scan: Option<CancellationToken>,
    waiter: Option<(TransactionId, Reply)>,
    peripheral_label: Option<String>,
}

impl<T: Transport> SessionRunner<T> {
    /// Validate `config` and start a session task on the current runtime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(transport: Arc<T>, config: SessionConfig) -> Result<SessionHandle> {
        config.validate()?;

        let session = Session::new(&config);
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let events = EventDispatcher::default();
        let shutdown = CancellationToken::new();

        let runner = SessionRunner {
            transport,
            session,
            config,
            events: events.clone(),
            snapshot: snapshot_tx,
            inbox: inbox_tx,
            shutdown: shutdown.clone(),
            scan_timer: None,
            scan: None,
            waiter: None,
            peripheral_label: None,
        };
        let task = tokio::spawn(runner.run(requests_rx, inbox_rx));

        Ok(SessionHandle {
            requests: requests_tx,
            snapshot: snapshot_rx,
            events,
            shutdown,
            task: Some(task),
        })
    }

    #[instrument(level = "debug", name = "session_runner", skip_all)]
    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<Request>,
        mut inbox: mpsc::UnboundedReceiver<SessionInput<T::Peripheral>>,
    ) {
        self.watch_radio().await;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some(input) = inbox.recv() => self.apply(input, None).await,
                request = requests.recv() => match request {
                    Some(Request::Send { reply }) => {
                        self.apply(SessionInput::SendCommand, reply).await;
                    }
                    None => break,
                },
            }
        }

        self.shut_down().await;
    }

    async fn watch_radio(&mut self) {
        let mut states = match self.transport.radio_states().await {
            Ok(states) => states,
            Err(e) => {
                warn!("Radio state unavailable: {}", e);
                return;
            }
        };
        let inbox = self.inbox.clone();
        let token = self.shutdown.child_token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    next = states.next() => match next {
                        Some(state) => {
                            if inbox.send(SessionInput::RadioStateChanged(state)).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });
    }

    async fn apply(&mut self, input: SessionInput<T::Peripheral>, mut reply: Option<Reply>) {
        if let SessionInput::RadioStateChanged(state) = &input {
            self.events
                .send(SessionEvent::RadioStateChanged { state: *state });
        }

        let from = self.session.state();
        let effects = self.session.handle(input);
        let to = self.session.state();
        if from != to {
            self.events.send(SessionEvent::StateChanged { from, to });
        }

        for effect in effects {
            self.execute(effect, &mut reply).await;
        }
        self.snapshot.send_replace(self.session.snapshot());
    }

    async fn execute(&mut self, effect: Effect<T::Peripheral>, reply: &mut Option<Reply>) {
        match effect {
            Effect::StartScan {
                transaction,
                service,
            } => {
                if let Some(reply) = reply.take() {
                    self.waiter = Some((transaction, reply));
                }
                self.start_scan(transaction, service);
            }
            Effect::ArmScanTimer {
                transaction,
                timeout,
            } => self.arm_scan_timer(transaction, timeout),
            Effect::CancelScanTimer { transaction } => {
                if let Some(timer) = self.scan_timer.take() {
                    debug!("Cancelling scan timer for transaction {}", transaction);
                    timer.cancel();
                }
            }
            Effect::StopScan => self.stop_scan().await,
            Effect::Connect {
                transaction,
                peripheral,
            } => {
                let label = self.transport.peripheral_label(&peripheral);
                self.events.send(SessionEvent::PeripheralDiscovered {
                    transaction,
                    peripheral: label.clone(),
                });
                self.peripheral_label = Some(label);

                let transport = Arc::clone(&self.transport);
                let timeout = self.config.connect_timeout;
                self.spawn_input(async move {
                    match bounded("connect", timeout, transport.connect(&peripheral)).await {
                        Ok(()) => SessionInput::Connected { transaction },
                        Err(e) => SessionInput::ConnectFailed {
                            transaction,
                            reason: e.to_string(),
                        },
                    }
                });
            }
            Effect::DiscoverServices {
                transaction,
                peripheral,
                services,
            } => {
                let transport = Arc::clone(&self.transport);
                let timeout = self.config.discovery_timeout;
                self.spawn_input(async move {
                    let result = bounded(
                        "discover services",
                        timeout,
                        transport.discover_services(&peripheral, &services),
                    )
                    .await;
                    SessionInput::ServicesDiscovered {
                        transaction,
                        result: result.map_err(|e| e.to_string()),
                    }
                });
            }
            Effect::DiscoverCharacteristics {
                transaction,
                peripheral,
                service,
            } => {
                let transport = Arc::clone(&self.transport);
                let timeout = self.config.discovery_timeout;
                self.spawn_input(async move {
                    let result = bounded(
                        "discover characteristics",
                        timeout,
                        transport.discover_characteristics(&peripheral, &service),
                    )
                    .await;
                    SessionInput::CharacteristicsDiscovered {
                        transaction,
                        service,
                        result: result.map_err(|e| e.to_string()),
                    }
                });
            }
            Effect::Write {
                transaction,
                peripheral,
                characteristic,
                payload,
            } => {
                let transport = Arc::clone(&self.transport);
                let timeout = self.config.write_timeout;
                self.spawn_input(async move {
                    let result = bounded(
                        "write",
                        timeout,
                        transport.write_value(&peripheral, &characteristic, &payload),
                    )
                    .await;
                    SessionInput::WriteCompleted {
                        transaction,
                        result: result.map_err(|e| e.to_string()),
                    }
                });
            }
            Effect::Read {
                transaction,
                peripheral,
                characteristic,
            } => {
                let transport = Arc::clone(&self.transport);
                let timeout = self.config.read_timeout;
                self.spawn_input(async move {
                    let result = bounded(
                        "read",
                        timeout,
                        transport.read_value(&peripheral, &characteristic),
                    )
                    .await;
                    SessionInput::ReadCompleted {
                        transaction,
                        characteristic: characteristic.uuid,
                        result: result.map_err(|e| e.to_string()),
                    }
                });
            }
            Effect::Disconnect { peripheral } => {
                let transport = Arc::clone(&self.transport);
                tokio::spawn(async move {
                    if let Err(e) = transport.disconnect(&peripheral).await {
                        warn!("Disconnect failed: {}", e);
                    }
                });
            }
            Effect::ResponseReceived {
                transaction,
                response,
            } => {
                self.events.send(SessionEvent::ResponseReceived {
                    transaction,
                    response,
                });
            }
            Effect::Rejected { error } => {
                if let Some(reply) = reply.take() {
                    let _ = reply.send(Err(error.clone()));
                }
                self.events.send(SessionEvent::CommandRejected { error });
            }
            Effect::Finish {
                transaction,
                outcome,
            } => self.finish(transaction, outcome),
        }
    }

    fn start_scan(&mut self, transaction: TransactionId, service: Uuid) {
        let token = self.shutdown.child_token();
        if let Some(previous) = self.scan.replace(token.clone()) {
            previous.cancel();
        }
        let transport = Arc::clone(&self.transport);
        let inbox = self.inbox.clone();

        tokio::spawn(async move {
            let started = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                started = transport.start_scan(service) => started,
            };
            let mut discovered = match started {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = inbox.send(SessionInput::ScanFailed {
                        transaction,
                        reason: e.to_string(),
                    });
                    return;
                }
            };
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    next = discovered.next() => match next {
                        Some(peripheral) => {
                            let input = SessionInput::Discovered { transaction, peripheral };
                            if inbox.send(input).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });
    }

    fn arm_scan_timer(&mut self, transaction: TransactionId, timeout: Duration) {
        let token = self.shutdown.child_token();
        if let Some(previous) = self.scan_timer.replace(token.clone()) {
            previous.cancel();
        }
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    let _ = inbox.send(SessionInput::ScanTimerFired { transaction });
                }
            }
        });
    }

    async fn stop_scan(&mut self) {
        if let Some(scan) = self.scan.take() {
            scan.cancel();
        }
        if let Err(e) = self.transport.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }
    }

    fn spawn_input<F>(&self, operation: F)
    where
        F: Future<Output = SessionInput<T::Peripheral>> + Send + 'static,
    {
        let inbox = self.inbox.clone();
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                input = operation => {
                    let _ = inbox.send(input);
                }
            }
        });
    }

    fn finish(&mut self, transaction: TransactionId, outcome: TransactionOutcome) {
        let label = self.peripheral_label.take();
        let outcome = outcome.map(|mut report| {
            report.peripheral = label;
            report
        });
        match &outcome {
            Ok(report) => info!(
                "Transaction {} completed with {} response(s)",
                transaction,
                report.responses.len()
            ),
            Err(e) => info!("Transaction {} failed: {}", transaction, e),
        }

        self.events.send(SessionEvent::TransactionFinished {
            transaction,
            finished_at: OffsetDateTime::now_utc(),
            outcome: outcome.clone().into(),
        });

        // Waiters must observe the idle snapshot once their reply lands.
        self.snapshot.send_replace(self.session.snapshot());
        match self.waiter.take() {
            Some((waiting, reply)) if waiting == transaction => {
                let _ = reply.send(outcome);
            }
            other => self.waiter = other,
        }
    }

    async fn shut_down(&mut self) {
        info!("Session runner shutting down");
        for effect in self.session.cancel(TransactionError::Shutdown) {
            match effect {
                Effect::CancelScanTimer { .. } => {
                    if let Some(timer) = self.scan_timer.take() {
                        timer.cancel();
                    }
                }
                Effect::StopScan => self.stop_scan().await,
                Effect::Disconnect { peripheral } => {
                    let disconnect = self.transport.disconnect(&peripheral);
                    if let Err(e) = bounded("disconnect", SHUTDOWN_DISCONNECT_TIMEOUT, disconnect).await {
                        warn!("Disconnect during shutdown failed: {}", e);
                    }
                }
                Effect::Finish {
                    transaction,
                    outcome,
                } => self.finish(transaction, outcome),
                _ => {}
            }
        }
        self.snapshot.send_replace(self.session.snapshot());
    }
}
