//! The discovery-connect-transact-disconnect state machine.
//!
//! [`Session`] is a plain value with no I/O. Every stimulus (a trigger, a
//! radio change, the completion of a transport operation, the scan timer)
//! is fed to [`Session::handle`] as a [`SessionInput`], which updates the
//! state and returns the [`Effect`]s the caller must perform. The
//! [`runner`](crate::runner) executes those effects against a
//! [`Transport`](crate::Transport) and feeds completions back in.
//!
//! ```text
//! Idle -> Scanning -> Connecting -> DiscoveringServices
//!      -> DiscoveringCharacteristics -> Writing -> AwaitingResponses
//!      -> (Disconnecting) -> Idle
//! ```
//!
//! Any failure returns straight to `Idle`. The session is busy exactly when
//! it is not idle, and the peripheral handle lives inside the states that
//! may hold it, so neither can outlive the transaction.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use btcmd_types::{
    CharacteristicRole, CommandPayload, RadioState, ResponsePayload, ServiceDescriptor,
    SessionStateKind,
};

use crate::config::SessionConfig;
use crate::error::TransactionError;
use crate::transport::{CharacteristicHandle, ServiceHandle};

/// Identifies one accepted command transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Raw sequence number (starts at 1).
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One response read back from the peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Characteristic the value was read from.
    pub characteristic: Uuid,
    /// The value.
    pub payload: ResponsePayload,
}

/// Result of a successful transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReport {
    /// The transaction.
    pub transaction: TransactionId,
    /// Label of the peripheral that answered, when the runner knows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peripheral: Option<String>,
    /// Responses in the order they were read.
    pub responses: Vec<Response>,
}

/// Outcome of one transaction.
pub type TransactionOutcome = std::result::Result<TransactionReport, TransactionError>;

/// Stimuli accepted by the session.
///
/// Inputs produced by transport operations carry the transaction they were
/// issued for. Inputs for any other transaction, or arriving in a state that
/// does not expect them, are ignored.
#[derive(Debug, Clone)]
pub enum SessionInput<P> {
    /// The trigger fired.
    SendCommand,
    /// The radio reported a new state.
    RadioStateChanged(RadioState),
    /// The scan could not be started.
    ScanFailed {
        transaction: TransactionId,
        reason: String,
    },
    /// A peripheral advertising the service was seen.
    Discovered {
        transaction: TransactionId,
        peripheral: P,
    },
    /// The scan window elapsed.
    ScanTimerFired { transaction: TransactionId },
    /// Connected to the peripheral.
    Connected { transaction: TransactionId },
    /// Connecting failed.
    ConnectFailed {
        transaction: TransactionId,
        reason: String,
    },
    /// Service discovery completed.
    ServicesDiscovered {
        transaction: TransactionId,
        result: std::result::Result<Vec<ServiceHandle>, String>,
    },
    /// Characteristic discovery for one service completed.
    CharacteristicsDiscovered {
        transaction: TransactionId,
        service: ServiceHandle,
        result: std::result::Result<Vec<CharacteristicHandle>, String>,
    },
    /// The command write completed.
    WriteCompleted {
        transaction: TransactionId,
        result: std::result::Result<(), String>,
    },
    /// A response read completed.
    ReadCompleted {
        transaction: TransactionId,
        characteristic: Uuid,
        result: std::result::Result<ResponsePayload, String>,
    },
}

/// Work the session asks its driver to perform, in order.
#[derive(Debug, Clone)]
pub enum Effect<P> {
    /// Begin scanning for `service`.
    StartScan {
        transaction: TransactionId,
        service: Uuid,
    },
    /// Arm the single-shot scan timer.
    ArmScanTimer {
        transaction: TransactionId,
        timeout: Duration,
    },
    /// Cancel the scan timer of `transaction`.
    CancelScanTimer { transaction: TransactionId },
    /// Stop scanning.
    StopScan,
    /// Connect to the peripheral.
    Connect {
        transaction: TransactionId,
        peripheral: P,
    },
    /// Discover `services` on the peripheral.
    DiscoverServices {
        transaction: TransactionId,
        peripheral: P,
        services: Vec<Uuid>,
    },
    /// Discover the characteristics of `service`.
    DiscoverCharacteristics {
        transaction: TransactionId,
        peripheral: P,
        service: ServiceHandle,
    },
    /// Acknowledged write of the command payload.
    Write {
        transaction: TransactionId,
        peripheral: P,
        characteristic: CharacteristicHandle,
        payload: CommandPayload,
    },
    /// Read one response characteristic.
    Read {
        transaction: TransactionId,
        peripheral: P,
        characteristic: CharacteristicHandle,
    },
    /// Best-effort disconnect.
    Disconnect { peripheral: P },
    /// A response was accepted.
    ResponseReceived {
        transaction: TransactionId,
        response: Response,
    },
    /// A command was refused without starting a transaction.
    Rejected { error: TransactionError },
    /// The transaction ended.
    Finish {
        transaction: TransactionId,
        outcome: TransactionOutcome,
    },
}

/// Internal state; handles live only in the variants that may own them.
#[derive(Debug, Clone)]
enum SessionState<P> {
    Idle,
    Scanning {
        transaction: TransactionId,
    },
    Connecting {
        transaction: TransactionId,
        peripheral: P,
    },
    DiscoveringServices {
        transaction: TransactionId,
        peripheral: P,
    },
    DiscoveringCharacteristics {
        transaction: TransactionId,
        peripheral: P,
        outstanding_services: usize,
        command: Option<CharacteristicHandle>,
        responses: Vec<CharacteristicHandle>,
    },
    Writing {
        transaction: TransactionId,
        peripheral: P,
        command: CharacteristicHandle,
        responses: VecDeque<CharacteristicHandle>,
        pending: usize,
    },
    AwaitingResponses {
        transaction: TransactionId,
        peripheral: P,
        // Front is the read in flight.
        responses: VecDeque<CharacteristicHandle>,
        pending: usize,
        received: Vec<Response>,
    },
}

impl<P> SessionState<P> {
    fn kind(&self) -> SessionStateKind {
        match self {
            SessionState::Idle => SessionStateKind::Idle,
            SessionState::Scanning { .. } => SessionStateKind::Scanning,
            SessionState::Connecting { .. } => SessionStateKind::Connecting,
            SessionState::DiscoveringServices { .. } => SessionStateKind::DiscoveringServices,
            SessionState::DiscoveringCharacteristics { .. } => {
                SessionStateKind::DiscoveringCharacteristics
            }
            SessionState::Writing { .. } => SessionStateKind::Writing,
            SessionState::AwaitingResponses { .. } => SessionStateKind::AwaitingResponses,
        }
    }

    fn transaction(&self) -> Option<TransactionId> {
        match self {
            SessionState::Idle => None,
            SessionState::Scanning { transaction }
            | SessionState::Connecting { transaction, .. }
            | SessionState::DiscoveringServices { transaction, .. }
            | SessionState::DiscoveringCharacteristics { transaction, .. }
            | SessionState::Writing { transaction, .. }
            | SessionState::AwaitingResponses { transaction, .. } => Some(*transaction),
        }
    }

    fn peripheral(&self) -> Option<&P> {
        match self {
            SessionState::Idle | SessionState::Scanning { .. } => None,
            SessionState::Connecting { peripheral, .. }
            | SessionState::DiscoveringServices { peripheral, .. }
            | SessionState::DiscoveringCharacteristics { peripheral, .. }
            | SessionState::Writing { peripheral, .. }
            | SessionState::AwaitingResponses { peripheral, .. } => Some(peripheral),
        }
    }

    fn pending(&self) -> usize {
        match self {
            SessionState::Writing { pending, .. }
            | SessionState::AwaitingResponses { pending, .. } => *pending,
            _ => 0,
        }
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Current phase.
    pub state: SessionStateKind,
    /// Whether a transaction is in flight.
    pub busy: bool,
    /// Whether a peripheral handle is held.
    pub has_peripheral: bool,
    /// Response reads still expected.
    pub pending_responses: usize,
    /// Transaction in flight, if any.
    pub transaction: Option<TransactionId>,
    /// Last reported radio state.
    pub radio: RadioState,
}

/// A single, reusable command session.
#[derive(Debug)]
pub struct Session<P> {
    state: SessionState<P>,
    descriptor: ServiceDescriptor,
    payload: CommandPayload,
    scan_timeout: Duration,
    auto_start_on_ready: bool,
    auto_started: bool,
    radio: RadioState,
    next_transaction: u64,
}

impl<P: Clone + fmt::Debug> Session<P> {
    /// Create an idle session.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            state: SessionState::Idle,
            descriptor: config.descriptor,
            payload: config.payload.clone(),
            scan_timeout: config.scan_timeout,
            auto_start_on_ready: config.auto_start_on_ready,
            auto_started: false,
            radio: RadioState::Unknown,
            next_transaction: 0,
        }
    }

    /// Current phase.
    pub fn state(&self) -> SessionStateKind {
        self.state.kind()
    }

    /// Whether a transaction is in flight.
    pub fn is_busy(&self) -> bool {
        !matches!(self.state, SessionState::Idle)
    }

    /// The peripheral currently owned by the session.
    pub fn peripheral(&self) -> Option<&P> {
        self.state.peripheral()
    }

    /// Response reads still expected before disconnecting.
    pub fn pending_response_count(&self) -> usize {
        self.state.pending()
    }

    /// Transaction in flight, if any.
    pub fn transaction(&self) -> Option<TransactionId> {
        self.state.transaction()
    }

    /// Last reported radio state.
    pub fn radio_state(&self) -> RadioState {
        self.radio
    }

    /// The descriptor this session works against.
    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    /// Point-in-time view.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            busy: self.is_busy(),
            has_peripheral: self.peripheral().is_some(),
            pending_responses: self.pending_response_count(),
            transaction: self.transaction(),
            radio: self.radio,
        }
    }

    /// Apply one input and return the effects to perform.
    pub fn handle(&mut self, input: SessionInput<P>) -> Vec<Effect<P>> {
        let before = self.state.kind();
        let effects = self.dispatch(input);
        let after = self.state.kind();
        if before != after {
            debug!("Session state {} -> {}", before, after);
        }
        effects
    }

    fn dispatch(&mut self, input: SessionInput<P>) -> Vec<Effect<P>> {
        match input {
            SessionInput::SendCommand => self.send_command(),
            SessionInput::RadioStateChanged(state) => self.on_radio_state(state),
            SessionInput::ScanFailed {
                transaction,
                reason,
            } => {
                if !self.expects(transaction, SessionStateKind::Scanning, "scan failure") {
                    return Vec::new();
                }
                self.abandon(TransactionError::ScanFailed { reason })
            }
            SessionInput::Discovered {
                transaction,
                peripheral,
            } => self.on_discovered(transaction, peripheral),
            SessionInput::ScanTimerFired { transaction } => {
                if !self.expects(transaction, SessionStateKind::Scanning, "scan timer") {
                    return Vec::new();
                }
                info!("Scan timed out after {:?}", self.scan_timeout);
                self.abandon(TransactionError::ScanTimeout {
                    timeout: self.scan_timeout,
                })
            }
            SessionInput::Connected { transaction } => self.on_connected(transaction),
            SessionInput::ConnectFailed {
                transaction,
                reason,
            } => {
                if !self.expects(transaction, SessionStateKind::Connecting, "connect failure") {
                    return Vec::new();
                }
                self.abandon(TransactionError::ConnectFailed { reason })
            }
            SessionInput::ServicesDiscovered {
                transaction,
                result,
            } => self.on_services(transaction, result),
            SessionInput::CharacteristicsDiscovered {
                transaction,
                service,
                result,
            } => self.on_characteristics(transaction, service, result),
            SessionInput::WriteCompleted {
                transaction,
                result,
            } => self.on_write(transaction, result),
            SessionInput::ReadCompleted {
                transaction,
                characteristic,
                result,
            } => self.on_read(transaction, characteristic, result),
        }
    }

    fn send_command(&mut self) -> Vec<Effect<P>> {
        info!("sendCommand");
        if self.is_busy() {
            info!("Busy, ignoring request");
            return vec![Effect::Rejected {
                error: TransactionError::Busy,
            }];
        }
        if self.radio.is_unavailable() {
            warn!("Radio is {}, ignoring request", self.radio);
            return vec![Effect::Rejected {
                error: TransactionError::RadioUnavailable { state: self.radio },
            }];
        }

        self.next_transaction += 1;
        let transaction = TransactionId(self.next_transaction);
        let service = self.descriptor.service;
        info!(
            "Transaction {}: scanning for {} {}",
            transaction,
            self.descriptor.name_of(&service),
            service
        );
        self.state = SessionState::Scanning { transaction };
        vec![
            Effect::StartScan {
                transaction,
                service,
            },
            Effect::ArmScanTimer {
                transaction,
                timeout: self.scan_timeout,
            },
        ]
    }

    fn on_radio_state(&mut self, state: RadioState) -> Vec<Effect<P>> {
        info!("Radio state {}", state);
        self.radio = state;

        if state.is_unavailable() && self.is_busy() {
            return self.abandon(TransactionError::RadioUnavailable { state });
        }

        if state.is_powered_on() && self.auto_start_on_ready && !self.auto_started {
            self.auto_started = true;
            info!("Radio ready, sending command automatically");
            return self.send_command();
        }

        Vec::new()
    }

    fn on_discovered(&mut self, transaction: TransactionId, peripheral: P) -> Vec<Effect<P>> {
        if !self.expects(transaction, SessionStateKind::Scanning, "discovery") {
            return Vec::new();
        }
        info!("Transaction {}: discovered {:?}, connecting", transaction, peripheral);
        self.state = SessionState::Connecting {
            transaction,
            peripheral: peripheral.clone(),
        };
        vec![
            Effect::CancelScanTimer { transaction },
            Effect::StopScan,
            Effect::Connect {
                transaction,
                peripheral,
            },
        ]
    }

    fn on_connected(&mut self, transaction: TransactionId) -> Vec<Effect<P>> {
        if !self.expects(transaction, SessionStateKind::Connecting, "connect") {
            return Vec::new();
        }
        let SessionState::Connecting { peripheral, .. } =
            std::mem::replace(&mut self.state, SessionState::Idle)
        else {
            unreachable!("state checked above");
        };
        info!("Transaction {}: connected, discovering services", transaction);
        self.state = SessionState::DiscoveringServices {
            transaction,
            peripheral: peripheral.clone(),
        };
        vec![Effect::DiscoverServices {
            transaction,
            peripheral,
            services: vec![self.descriptor.service],
        }]
    }

    fn on_services(
        &mut self,
        transaction: TransactionId,
        result: std::result::Result<Vec<ServiceHandle>, String>,
    ) -> Vec<Effect<P>> {
        if !self.expects(transaction, SessionStateKind::DiscoveringServices, "services") {
            return Vec::new();
        }
        let services = match result {
            Ok(services) if services.is_empty() => {
                return self.abandon(TransactionError::ServiceDiscoveryFailed {
                    reason: format!("service {} not present", self.descriptor.service),
                });
            }
            Ok(services) => services,
            Err(reason) => {
                return self.abandon(TransactionError::ServiceDiscoveryFailed { reason });
            }
        };

        let SessionState::DiscoveringServices { peripheral, .. } =
            std::mem::replace(&mut self.state, SessionState::Idle)
        else {
            unreachable!("state checked above");
        };

        let mut effects = Vec::with_capacity(services.len());
        for service in services {
            info!(
                "Transaction {}: service {} {}",
                transaction,
                self.descriptor.name_of(&service.uuid),
                service.uuid
            );
            effects.push(Effect::DiscoverCharacteristics {
                transaction,
                peripheral: peripheral.clone(),
                service,
            });
        }
        self.state = SessionState::DiscoveringCharacteristics {
            transaction,
            peripheral,
            outstanding_services: effects.len(),
            command: None,
            responses: Vec::new(),
        };
        effects
    }

    fn on_characteristics(
        &mut self,
        transaction: TransactionId,
        service: ServiceHandle,
        result: std::result::Result<Vec<CharacteristicHandle>, String>,
    ) -> Vec<Effect<P>> {
        if !self.expects(
            transaction,
            SessionStateKind::DiscoveringCharacteristics,
            "characteristics",
        ) {
            return Vec::new();
        }
        let characteristics = match result {
            Ok(characteristics) => characteristics,
            Err(reason) => {
                return self.abandon(TransactionError::CharacteristicDiscoveryFailed { reason });
            }
        };

        let descriptor = self.descriptor;
        let SessionState::DiscoveringCharacteristics {
            outstanding_services,
            command,
            responses,
            ..
        } = &mut self.state
        else {
            unreachable!("state checked above");
        };

        debug!(
            "Transaction {}: {} characteristic(s) on {}",
            transaction,
            characteristics.len(),
            service.uuid
        );
        for characteristic in characteristics {
            let role = descriptor.role_of(&characteristic.uuid);
            info!(
                "Transaction {}: characteristic {} {}",
                transaction, role, characteristic.uuid
            );
            match role {
                CharacteristicRole::CommandCharacteristic if command.is_none() => {
                    *command = Some(characteristic);
                }
                CharacteristicRole::CommandCharacteristic => {
                    warn!("Duplicate command characteristic on {}, ignoring", service.uuid);
                }
                CharacteristicRole::ResponseCharacteristic => responses.push(characteristic),
                _ => {}
            }
        }
        *outstanding_services = outstanding_services.saturating_sub(1);
        if *outstanding_services > 0 {
            return Vec::new();
        }

        let SessionState::DiscoveringCharacteristics {
            peripheral,
            command,
            responses,
            ..
        } = std::mem::replace(&mut self.state, SessionState::Idle)
        else {
            unreachable!("state checked above");
        };
        let Some(command) = command else {
            // Put the peripheral back so abandon() releases it.
            self.state = SessionState::DiscoveringServices {
                transaction,
                peripheral,
            };
            return self.abandon(TransactionError::CharacteristicDiscoveryFailed {
                reason: format!("command characteristic {} not found", descriptor.command),
            });
        };

        let pending = responses.len();
        info!(
            "Transaction {}: writing {} byte(s), expecting {} response(s)",
            transaction,
            self.payload.len(),
            pending
        );
        self.state = SessionState::Writing {
            transaction,
            peripheral: peripheral.clone(),
            command: command.clone(),
            responses: responses.into(),
            pending,
        };
        vec![Effect::Write {
            transaction,
            peripheral,
            characteristic: command,
            payload: self.payload.clone(),
        }]
    }

    fn on_write(
        &mut self,
        transaction: TransactionId,
        result: std::result::Result<(), String>,
    ) -> Vec<Effect<P>> {
        if !self.expects(transaction, SessionStateKind::Writing, "write") {
            return Vec::new();
        }
        if let Err(reason) = result {
            let target = match &self.state {
                SessionState::Writing { command, .. } => command.uuid,
                _ => self.descriptor.command,
            };
            debug!("Transaction {}: write to {} failed: {}", transaction, target, reason);
            let characteristic = self.descriptor.name_of(&target).to_string();
            return self.abandon(TransactionError::WriteFailed {
                characteristic,
                reason,
            });
        }

        let SessionState::Writing {
            peripheral,
            responses,
            pending,
            ..
        } = std::mem::replace(&mut self.state, SessionState::Idle)
        else {
            unreachable!("state checked above");
        };
        info!("Transaction {}: write acknowledged", transaction);

        let Some(first) = responses.front().cloned() else {
            return self.complete(transaction, peripheral, Vec::new());
        };
        self.state = SessionState::AwaitingResponses {
            transaction,
            peripheral: peripheral.clone(),
            responses,
            pending,
            received: Vec::new(),
        };
        vec![Effect::Read {
            transaction,
            peripheral,
            characteristic: first,
        }]
    }

    fn on_read(
        &mut self,
        transaction: TransactionId,
        characteristic: Uuid,
        result: std::result::Result<ResponsePayload, String>,
    ) -> Vec<Effect<P>> {
        if !self.expects(transaction, SessionStateKind::AwaitingResponses, "read") {
            return Vec::new();
        }
        let name = self.descriptor.name_of(&characteristic);
        let payload = match result {
            Ok(payload) => payload,
            Err(reason) => {
                return self.abandon(TransactionError::ReadFailed {
                    characteristic: name.to_string(),
                    reason,
                });
            }
        };

        let SessionState::AwaitingResponses {
            peripheral,
            responses,
            pending,
            received,
            ..
        } = &mut self.state
        else {
            unreachable!("state checked above");
        };

        if responses.front().map(|c| c.uuid) != Some(characteristic) {
            warn!(
                "Transaction {}: unexpected read result from {}, ignoring",
                transaction, characteristic
            );
            return Vec::new();
        }
        let Some(remaining) = pending.checked_sub(1) else {
            warn!("Transaction {}: read with no pending responses, ignoring", transaction);
            return Vec::new();
        };
        responses.pop_front();
        *pending = remaining;

        info!(
            "Transaction {}: {} returned {:?}",
            transaction,
            name,
            payload.to_text_lossy()
        );
        let response = Response {
            characteristic,
            payload,
        };
        received.push(response.clone());
        let mut effects = vec![Effect::ResponseReceived {
            transaction,
            response,
        }];

        if let Some(next) = responses.front().cloned() {
            effects.push(Effect::Read {
                transaction,
                peripheral: peripheral.clone(),
                characteristic: next,
            });
            return effects;
        }

        let SessionState::AwaitingResponses {
            peripheral,
            received,
            ..
        } = std::mem::replace(&mut self.state, SessionState::Idle)
        else {
            unreachable!("state checked above");
        };
        effects.extend(self.complete(transaction, peripheral, received));
        effects
    }

    /// Abandon the transaction in flight, if any, with `error`.
    ///
    /// Used by drivers that stop before the transaction can finish.
    pub fn cancel(&mut self, error: TransactionError) -> Vec<Effect<P>> {
        self.abandon(error)
    }

    /// Check that `transaction` is current and the state is `kind`.
    fn expects(&self, transaction: TransactionId, kind: SessionStateKind, what: &str) -> bool {
        let current = self.state.transaction();
        if current != Some(transaction) || self.state.kind() != kind {
            debug!(
                "Ignoring {} for transaction {} (current {:?}, state {})",
                what,
                transaction,
                current,
                self.state.kind()
            );
            return false;
        }
        true
    }

    fn complete(
        &mut self,
        transaction: TransactionId,
        peripheral: P,
        responses: Vec<Response>,
    ) -> Vec<Effect<P>> {
        info!("Transaction {}: disconnecting", transaction);
        self.state = SessionState::Idle;
        vec![
            Effect::Disconnect { peripheral },
            Effect::Finish {
                transaction,
                outcome: Ok(TransactionReport {
                    transaction,
                    peripheral: None,
                    responses,
                }),
            },
        ]
    }

    /// Abandon the transaction in flight and return to idle.
    fn abandon(&mut self, error: TransactionError) -> Vec<Effect<P>> {
        let previous = std::mem::replace(&mut self.state, SessionState::Idle);
        let Some(transaction) = previous.transaction() else {
            return Vec::new();
        };
        warn!("Transaction {} abandoned: {}", transaction, error);

        let mut effects = Vec::new();
        match previous {
            SessionState::Scanning { .. } => {
                effects.push(Effect::CancelScanTimer { transaction });
                effects.push(Effect::StopScan);
            }
            other => {
                if let Some(peripheral) = other.peripheral() {
                    effects.push(Effect::Disconnect {
                        peripheral: peripheral.clone(),
                    });
                }
            }
        }
        effects.push(Effect::Finish {
            transaction,
            outcome: Err(error),
        });
        effects
    }
}


/// Property-based checks over arbitrary input sequences.
///
/// Run with: `cargo test -p btcmd-core session::proptests`
#[cfg(test)]
mod proptests {
    use super::*;
    use crate::transport::CharacteristicProperties;
    use btcmd_types::uuids::{COMMAND_CHARACTERISTIC, PROVISIONING_SERVICE, RESPONSE_CHARACTERISTIC};
    use proptest::prelude::*;

    fn input_for(code: u8, transaction: TransactionId, ok: bool) -> SessionInput<u8> {
        let err = || "injected".to_string();
        match code % 10 {
            0 => SessionInput::SendCommand,
            1 => SessionInput::Discovered {
                transaction,
                peripheral: code,
            },
            2 => SessionInput::ScanTimerFired { transaction },
            3 if ok => SessionInput::Connected { transaction },
            3 => SessionInput::ConnectFailed {
                transaction,
                reason: err(),
            },
            4 => SessionInput::ServicesDiscovered {
                transaction,
                result: if ok {
                    Ok(vec![ServiceHandle::new(PROVISIONING_SERVICE)])
                } else {
                    Err(err())
                },
            },
            5 => SessionInput::CharacteristicsDiscovered {
                transaction,
                service: ServiceHandle::new(PROVISIONING_SERVICE),
                result: if ok {
                    Ok(vec![
                        CharacteristicHandle::new(
                            COMMAND_CHARACTERISTIC,
                            PROVISIONING_SERVICE,
                            CharacteristicProperties::WRITE,
                        ),
                        CharacteristicHandle::new(
                            RESPONSE_CHARACTERISTIC,
                            PROVISIONING_SERVICE,
                            CharacteristicProperties::READ,
                        ),
                    ])
                } else {
                    Err(err())
                },
            },
            6 => SessionInput::WriteCompleted {
                transaction,
                result: if ok { Ok(()) } else { Err(err()) },
            },
            7 => SessionInput::ReadCompleted {
                transaction,
                characteristic: RESPONSE_CHARACTERISTIC,
                result: if ok {
                    Ok(ResponsePayload::default())
                } else {
                    Err(err())
                },
            },
            8 => SessionInput::RadioStateChanged(if ok {
                RadioState::PoweredOn
            } else {
                RadioState::PoweredOff
            }),
            _ => SessionInput::ScanFailed {
                transaction,
                reason: err(),
            },
        }
    }

    proptest! {
        #[test]
        fn session_invariants_hold(steps in proptest::collection::vec((any::<u8>(), any::<bool>(), any::<bool>()), 0..64)) {
            let mut session: Session<u8> = Session::new(&SessionConfig::default());
            let mut finished = 0usize;
            let mut started = 0usize;

            for (code, ok, stale) in steps {
                let current = session.transaction().unwrap_or(TransactionId(0));
                let transaction = if stale { TransactionId(current.0.wrapping_add(1)) } else { current };
                let effects = session.handle(input_for(code, transaction, ok));

                for effect in &effects {
                    match effect {
                        Effect::StartScan { .. } => started += 1,
                        Effect::Finish { .. } => finished += 1,
                        _ => {}
                    }
                }

                let snapshot = session.snapshot();
                prop_assert_eq!(snapshot.busy, snapshot.state != SessionStateKind::Idle);
                prop_assert_eq!(snapshot.has_peripheral, snapshot.state.holds_peripheral());
                if snapshot.state == SessionStateKind::Idle {
                    prop_assert_eq!(snapshot.pending_responses, 0);
                    prop_assert!(snapshot.transaction.is_none());
                }
                prop_assert!(snapshot.pending_responses <= 1);
            }

            // Every started transaction finishes at most once
            prop_assert!(finished <= started);
            prop_assert!(started - finished <= 1);
        }
    }
}
