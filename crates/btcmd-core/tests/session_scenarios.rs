//! End-to-end session tests against the in-memory transport.
//!
//! These drive a real [`SessionRunner`] with a paused tokio clock, so scan
//! windows and operation timeouts elapse instantly and deterministically.

use std::sync::Arc;
use std::time::Duration;

use btcmd_core::uuids::{COMMAND_CHARACTERISTIC, PROVISIONING_SERVICE, RESPONSE_CHARACTERISTIC};
use btcmd_core::{
    CharacteristicHandle, CharacteristicProperties, EventReceiver, FinishedOutcome, MockOperation,
    MockPeripheral, MockTransport, RadioState, SessionConfig, SessionEvent, SessionHandle,
    SessionRunner, SessionStateKind, TransactionError,
};
use tokio::time::Instant;
use uuid::Uuid;

fn manual_config() -> SessionConfig {
    SessionConfig::default().auto_start_on_ready(false)
}

fn spawn(transport: &Arc<MockTransport>, config: SessionConfig) -> SessionHandle {
    SessionRunner::spawn(Arc::clone(transport), config).unwrap()
}

/// Let spawned disconnects and forwarders run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

async fn next_finished(events: &mut EventReceiver) -> FinishedOutcome {
    loop {
        if let SessionEvent::TransactionFinished { outcome, .. } = events.recv().await.unwrap() {
            return outcome;
        }
    }
}

async fn wait_for_state(events: &mut EventReceiver, state: SessionStateKind) {
    loop {
        if let SessionEvent::StateChanged { to, .. } = events.recv().await.unwrap()
            && to == state
        {
            return;
        }
    }
}

fn assert_released(handle: &SessionHandle, transport: &MockTransport) {
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state, SessionStateKind::Idle);
    assert!(!snapshot.busy);
    assert!(!snapshot.has_peripheral);
    assert_eq!(snapshot.pending_responses, 0);
    assert!(!transport.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_happy_path_on_radio_ready() {
    let transport = Arc::new(MockTransport::builder().response(b"ACK".to_vec()).build());
    let handle = spawn(&transport, SessionConfig::default());
    let mut events = handle.subscribe();

    let outcome = next_finished(&mut events).await;
    let FinishedOutcome::Completed { report } = outcome else {
        panic!("transaction failed: {:?}", outcome);
    };
    assert_eq!(report.responses.len(), 1);
    assert_eq!(report.responses[0].characteristic, RESPONSE_CHARACTERISTIC);
    assert_eq!(report.responses[0].payload.to_text_lossy(), "ACK");
    assert_eq!(report.peripheral.as_deref(), Some("Provisioner (MOCK-0001)"));

    settle().await;
    let written = transport.written().await;
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].as_bytes(), b"Hello, World!");
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(transport.read_count(), 1);
    assert_eq!(transport.disconnect_count(), 1);
    assert_released(&handle, &transport);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_no_peripheral_found() {
    let transport = Arc::new(MockTransport::builder().peripherals(Vec::new()).build());
    let handle = spawn(&transport, manual_config());

    let started = Instant::now();
    let outcome = handle.transact().await;
    assert_eq!(
        outcome,
        Err(TransactionError::ScanTimeout {
            timeout: Duration::from_secs(5)
        })
    );
    assert!(started.elapsed() >= Duration::from_secs(5));

    settle().await;
    assert_eq!(transport.start_scan_count(), 1);
    assert_eq!(transport.stop_scan_count(), 1);
    assert_eq!(transport.connect_count(), 0);
    assert_released(&handle, &transport);
}

#[tokio::test(start_paused = true)]
async fn test_peripheral_with_other_service_is_not_discovered() {
    let transport = Arc::new(
        MockTransport::builder()
            .peripherals(vec![MockPeripheral::new("other").advertising(Uuid::from_u128(42))])
            .build(),
    );
    let handle = spawn(&transport, manual_config());

    assert!(matches!(
        handle.transact().await,
        Err(TransactionError::ScanTimeout { .. })
    ));
    assert_eq!(transport.connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_busy_rejection_leaves_transaction_untouched() {
    let transport = Arc::new(
        MockTransport::builder()
            .latency(Duration::from_secs(1))
            .response(b"ACK".to_vec())
            .build(),
    );
    let handle = spawn(&transport, manual_config());
    let mut events = handle.subscribe();

    handle.send_command().unwrap();
    wait_for_state(&mut events, SessionStateKind::AwaitingResponses).await;
    let before = handle.snapshot();

    assert_eq!(handle.transact().await, Err(TransactionError::Busy));
    assert_eq!(handle.snapshot(), before);

    assert!(next_finished(&mut events).await.is_completed());
    assert_eq!(transport.start_scan_count(), 1);
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(transport.write_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_abandons_without_read() {
    let transport = Arc::new(
        MockTransport::builder()
            .fail(MockOperation::Write, "GATT write rejected")
            .build(),
    );
    let handle = spawn(&transport, manual_config());

    let err = handle.transact().await.unwrap_err();
    assert!(matches!(err, TransactionError::WriteFailed { .. }));
    assert!(err.to_string().contains("GATT write rejected"));

    settle().await;
    assert_eq!(transport.read_count(), 0);
    assert_eq!(transport.disconnect_count(), 1);
    assert_released(&handle, &transport);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_triggers_start_one_transaction() {
    let transport = Arc::new(
        MockTransport::builder()
            .advertise_delay(Duration::from_secs(1))
            .build(),
    );
    let handle = spawn(&transport, manual_config());
    let mut events = handle.subscribe();

    for _ in 0..5 {
        handle.send_command().unwrap();
    }
    assert!(next_finished(&mut events).await.is_completed());
    settle().await;

    assert_eq!(transport.start_scan_count(), 1);
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(transport.write_count(), 1);
    assert!(!handle.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_triggers_are_rejected_as_busy() {
    let transport = Arc::new(MockTransport::new());
    let handle = spawn(&transport, manual_config());
    let mut events = handle.subscribe();

    for _ in 0..5 {
        handle.send_command().unwrap();
    }

    let mut rejected = 0;
    loop {
        match events.recv().await.unwrap() {
            SessionEvent::CommandRejected {
                error: TransactionError::Busy,
            } => rejected += 1,
            SessionEvent::TransactionFinished { outcome, .. } => {
                assert!(outcome.is_completed());
                break;
            }
            _ => {}
        }
    }
    assert_eq!(rejected, 4);
    assert_eq!(transport.start_scan_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_only_first_discovery_is_used() {
    let transport = Arc::new(
        MockTransport::builder()
            .peripherals(vec![
                MockPeripheral::new("AA:AA").with_name("First"),
                MockPeripheral::new("BB:BB").with_name("Second"),
            ])
            .build(),
    );
    let handle = spawn(&transport, manual_config());

    let report = handle.transact().await.unwrap();
    assert_eq!(report.peripheral.as_deref(), Some("First (AA:AA)"));

    settle().await;
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(transport.stop_scan_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_every_response_characteristic_is_read() {
    let unrelated = Uuid::from_u128(0x2A19);
    let transport = Arc::new(
        MockTransport::builder()
            .characteristics(vec![
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
                CharacteristicHandle::new(
                    unrelated,
                    PROVISIONING_SERVICE,
                    CharacteristicProperties::READ,
                ),
                CharacteristicHandle::new(
                    RESPONSE_CHARACTERISTIC,
                    PROVISIONING_SERVICE,
                    CharacteristicProperties::READ,
                ),
            ])
            .response(b"one".to_vec())
            .response(b"two".to_vec())
            .build(),
    );
    let handle = spawn(&transport, manual_config());

    let report = handle.transact().await.unwrap();
    let texts: Vec<String> = report
        .responses
        .iter()
        .map(|r| r.payload.to_text_lossy())
        .collect();
    assert_eq!(texts, vec!["one", "two"]);

    settle().await;
    assert_eq!(transport.read_count(), 2);
    assert_eq!(transport.disconnect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_response_characteristic_completes_after_write() {
    let transport = Arc::new(
        MockTransport::builder()
            .characteristics(vec![CharacteristicHandle::new(
                COMMAND_CHARACTERISTIC,
                PROVISIONING_SERVICE,
                CharacteristicProperties::WRITE,
            )])
            .build(),
    );
    let handle = spawn(&transport, manual_config());

    let report = handle.transact().await.unwrap();
    assert!(report.responses.is_empty());
    settle().await;
    assert_eq!(transport.read_count(), 0);
    assert_released(&handle, &transport);
}

#[tokio::test(start_paused = true)]
async fn test_every_exit_releases_the_peripheral() {
    let cases = vec![
        (
            "connect_failed",
            MockTransport::builder()
                .fail(MockOperation::Connect, "refused")
                .build(),
        ),
        (
            "service_discovery_failed",
            MockTransport::builder()
                .fail(MockOperation::DiscoverServices, "gatt")
                .build(),
        ),
        (
            "service_discovery_failed",
            MockTransport::builder().services(Vec::new()).build(),
        ),
        (
            "characteristic_discovery_failed",
            MockTransport::builder()
                .fail(MockOperation::DiscoverCharacteristics, "gatt")
                .build(),
        ),
        (
            "characteristic_discovery_failed",
            MockTransport::builder()
                .characteristics(vec![CharacteristicHandle::new(
                    RESPONSE_CHARACTERISTIC,
                    PROVISIONING_SERVICE,
                    CharacteristicProperties::READ,
                )])
                .build(),
        ),
        (
            "write_failed",
            MockTransport::builder()
                .fail(MockOperation::Write, "gatt")
                .build(),
        ),
        (
            "read_failed",
            MockTransport::builder()
                .fail(MockOperation::Read, "gatt")
                .build(),
        ),
    ];

    for (expected, transport) in cases {
        let transport = Arc::new(transport);
        let handle = spawn(&transport, manual_config());

        let err = handle.transact().await.unwrap_err();
        assert_eq!(err.kind(), expected, "unexpected error {err:?}");

        settle().await;
        assert_eq!(transport.disconnect_count(), 1, "{expected}: disconnect");
        assert_released(&handle, &transport);
        handle.shutdown().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout() {
    let transport = Arc::new(
        MockTransport::builder()
            .connect_latency(Duration::from_secs(60))
            .build(),
    );
    let config = manual_config().connect_timeout(Duration::from_secs(2));
    let handle = spawn(&transport, config);

    let started = Instant::now();
    let err = handle.transact().await.unwrap_err();
    assert!(matches!(err, TransactionError::ConnectFailed { .. }));
    assert!(err.to_string().contains("timed out"));
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(60));

    settle().await;
    assert_eq!(transport.disconnect_count(), 1);
    assert!(!handle.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_radio_loss_mid_transaction() {
    let transport = Arc::new(
        MockTransport::builder()
            .latency(Duration::from_secs(1))
            .build(),
    );
    let handle = spawn(&transport, manual_config());
    let mut events = handle.subscribe();

    handle.send_command().unwrap();
    wait_for_state(&mut events, SessionStateKind::DiscoveringServices).await;
    transport.set_radio_state(RadioState::PoweredOff);

    let outcome = next_finished(&mut events).await;
    assert_eq!(
        outcome,
        FinishedOutcome::Failed {
            error: TransactionError::RadioUnavailable {
                state: RadioState::PoweredOff
            }
        }
    );
    settle().await;
    assert_eq!(transport.disconnect_count(), 1);
    assert!(!handle.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_auto_start_waits_for_powered_on() {
    let transport = Arc::new(
        MockTransport::builder()
            .radio_state(RadioState::PoweredOff)
            .build(),
    );
    let handle = spawn(&transport, SessionConfig::default());
    let mut events = handle.subscribe();

    settle().await;
    assert_eq!(transport.start_scan_count(), 0);

    transport.set_radio_state(RadioState::PoweredOn);
    assert!(next_finished(&mut events).await.is_completed());

    // A second power cycle does not trigger another transaction
    transport.set_radio_state(RadioState::PoweredOff);
    settle().await;
    transport.set_radio_state(RadioState::PoweredOn);
    settle().await;
    assert_eq!(transport.start_scan_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_session_is_reusable_after_failure() {
    let transport = Arc::new(MockTransport::builder().peripherals(Vec::new()).build());
    let handle = spawn(&transport, manual_config());

    assert!(handle.transact().await.is_err());
    assert!(handle.transact().await.is_err());
    assert_eq!(transport.start_scan_count(), 2);
    assert_eq!(transport.stop_scan_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_custom_payload_is_written() {
    let transport = Arc::new(MockTransport::new());
    let config = manual_config().payload(btcmd_core::CommandPayload::from_text("reboot"));
    let handle = spawn(&transport, config);

    handle.transact().await.unwrap();
    assert_eq!(transport.written().await[0].as_bytes(), b"reboot");
}

#[tokio::test(start_paused = true)]
async fn test_event_sequence_for_success() {
    let transport = Arc::new(MockTransport::builder().response(b"ACK".to_vec()).build());
    let handle = spawn(&transport, manual_config());
    let mut events = handle.subscribe();

    handle.send_command().unwrap();
    let mut states = vec![SessionStateKind::Idle];
    let mut responses = 0;
    loop {
        match events.recv().await.unwrap() {
            SessionEvent::StateChanged { from, to } => {
                assert_eq!(Some(&from), states.last());
                states.push(to);
            }
            SessionEvent::ResponseReceived { .. } => responses += 1,
            SessionEvent::TransactionFinished { .. } => break,
            _ => {}
        }
    }
    assert_eq!(
        states,
        vec![
            SessionStateKind::Idle,
            SessionStateKind::Scanning,
            SessionStateKind::Connecting,
            SessionStateKind::DiscoveringServices,
            SessionStateKind::DiscoveringCharacteristics,
            SessionStateKind::Writing,
            SessionStateKind::AwaitingResponses,
            SessionStateKind::Idle,
        ]
    );
    assert_eq!(responses, 1);
}
