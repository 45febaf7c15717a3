mod common;

use std::time::Duration;

use common::{Call, MockTransport, ADDRESS};
use sensortag::common::characteristics::{BATTERY_LEVEL, LUMINANCE_PERIOD};
use sensortag::session::{CONNECT_GRACE, SETTLE_DELAY, TEMPERATURE_READ_ITERATIONS};
use sensortag::{
    AccelRange, DecodeOptions, DeviceSession, Error, SensorFamily, SensorValue, SessionState,
};
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_secs(3);

fn session(mock: &MockTransport) -> DeviceSession<MockTransport> {
    DeviceSession::new(mock.clone(), ADDRESS, TIMEOUT)
}

#[tokio::test(start_paused = true)]
async fn bring_up_connects_discovers_and_enables() {
    let mock = MockTransport::new();
    let mut session = session(&mock);
    assert_eq!(session.state(), SessionState::Disconnected);

    session.bring_up([SensorFamily::Temperature]).await.unwrap();

    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.is_ready().await);
    assert!(session.is_enabled(SensorFamily::Temperature));

    let calls = mock.calls();
    assert_eq!(calls[0], Call::Connect(ADDRESS.to_string()));
    assert_eq!(
        mock.count(|call| matches!(call, Call::Discover(_))),
        5 * 3 + 1
    );
    assert!(calls.contains(&Call::Discover(BATTERY_LEVEL)));
    assert_eq!(
        mock.writes(),
        vec![(
            mock.configuration_handle(SensorFamily::Temperature),
            vec![0x01]
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn discovery_runs_once_per_connection() {
    let mock = MockTransport::new();
    let mut session = session(&mock);

    session.open().await.unwrap();
    session.discover_handles().await.unwrap();
    let discovered = mock.calls().len();

    session.discover_handles().await.unwrap();
    assert_eq!(mock.calls().len(), discovered);

    let descriptors = session.descriptors();
    assert_eq!(descriptors.len(), SensorFamily::ALL.len());
    assert!(descriptors.iter().all(|d| d.is_resolved()));
}

#[tokio::test(start_paused = true)]
async fn refused_connection_is_a_timeout() {
    let mock = MockTransport::new();
    mock.state().refuse_connect = true;
    let mut session = session(&mock);

    let err = session.open().await.unwrap_err();
    assert_eq!(
        err,
        Error::ConnectionTimeout {
            address: ADDRESS.to_string(),
            timeout: TIMEOUT
        }
    );
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(
        mock.calls(),
        vec![Call::Connect(ADDRESS.to_string()), Call::Disconnect]
    );
}

#[tokio::test(start_paused = true)]
async fn slow_connection_is_cut_at_the_timeout() {
    let mock = MockTransport::new();
    mock.state().connect_delay = Some(Duration::from_secs(10));
    let mut session = session(&mock);

    let started = Instant::now();
    let err = session.open().await.unwrap_err();

    assert!(matches!(err, Error::ConnectionTimeout { .. }));
    let elapsed = started.elapsed();
    assert!(elapsed >= TIMEOUT && elapsed <= TIMEOUT + CONNECT_GRACE);
    assert_eq!(session.state(), SessionState::Disconnected);

    // a connect abandoned mid-way is released
    assert_eq!(mock.calls().last(), Some(&Call::Disconnect));
}

#[tokio::test(start_paused = true)]
async fn missing_characteristic_fails_the_session() {
    let mock = MockTransport::new();
    mock.state().missing.insert(LUMINANCE_PERIOD);
    let mut session = session(&mock);

    session.open().await.unwrap();
    let err = session.discover_handles().await.unwrap_err();

    assert_eq!(err, Error::CharacteristicNotFound(LUMINANCE_PERIOD));
    assert_eq!(session.state(), SessionState::Failed);

    // no partial recovery: reopening needs a close first
    assert!(matches!(
        session.open().await,
        Err(Error::NotConnected(_))
    ));

    mock.state().missing.clear();
    session.close().await.unwrap();
    session.bring_up([]).await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn movement_enable_and_disable_write_once_each() {
    let mock = MockTransport::new();
    let mut session = DeviceSession::new(mock.clone(), ADDRESS, TIMEOUT).with_decode_options(
        DecodeOptions {
            accel_range: AccelRange::G16,
            ..Default::default()
        },
    );
    session.bring_up([]).await.unwrap();
    mock.clear_calls();

    let handle = mock.configuration_handle(SensorFamily::Movement);

    session.enable(SensorFamily::Movement).await.unwrap();
    assert_eq!(mock.writes(), vec![(handle, vec![0x7F, 0x03])]);

    session.disable(SensorFamily::Movement).await.unwrap();
    assert_eq!(
        mock.writes(),
        vec![(handle, vec![0x7F, 0x03]), (handle, vec![0x00, 0x00])]
    );
    assert!(!session.is_enabled(SensorFamily::Movement));
}

#[tokio::test(start_paused = true)]
async fn battery_needs_no_configuration_write() {
    let mock = MockTransport::new();
    let mut session = session(&mock);
    session.bring_up([SensorFamily::Battery]).await.unwrap();

    assert!(mock.writes().is_empty());
    assert!(session.is_enabled(SensorFamily::Battery));

    mock.queue(SensorFamily::Battery, &[77]);
    assert_eq!(
        session.read(SensorFamily::Battery).await.unwrap(),
        SensorValue::Battery { percentage: 77.0 }
    );
}

#[tokio::test(start_paused = true)]
async fn temperature_is_read_repeatedly_with_settle_delay() {
    let mock = MockTransport::new();
    let mut session = session(&mock);
    session.bring_up([SensorFamily::Temperature]).await.unwrap();
    mock.clear_calls();

    mock.queue(SensorFamily::Temperature, &[0x10, 0x00, 0x00, 0x00]);
    mock.queue(SensorFamily::Temperature, &[0x80, 0x0C, 0x80, 0x0C]);

    let started = Instant::now();
    let raw = session.read_raw(SensorFamily::Temperature).await.unwrap();

    assert_eq!(raw, vec![0x80, 0x0C, 0x80, 0x0C]);
    assert_eq!(mock.reads().len(), TEMPERATURE_READ_ITERATIONS);
    let settled = SETTLE_DELAY * (TEMPERATURE_READ_ITERATIONS as u32 - 1);
    let elapsed = started.elapsed();
    assert!(elapsed >= settled && elapsed < settled + Duration::from_millis(10));
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn other_sensors_are_read_once() {
    let mock = MockTransport::new();
    let mut session = session(&mock);
    session.bring_up([SensorFamily::Humidity]).await.unwrap();
    mock.clear_calls();

    mock.queue(SensorFamily::Humidity, &[0x66, 0x66, 0x03, 0x80]);
    let value = session.read(SensorFamily::Humidity).await.unwrap();

    assert_eq!(mock.reads(), vec![mock.data_handle(SensorFamily::Humidity)]);
    match value {
        SensorValue::Humidity { humidity, .. } => assert_eq!(humidity, 50.0),
        other => panic!("unexpected value {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn transport_failure_leaves_the_session_failed() {
    let mock = MockTransport::new();
    let mut session = session(&mock);
    session.bring_up([SensorFamily::Pressure]).await.unwrap();

    mock.state().fail_reads = true;
    let err = session.read(SensorFamily::Pressure).await.unwrap_err();
    assert!(matches!(err, Error::TransportFailure(_)));
    assert_eq!(session.state(), SessionState::Failed);

    mock.clear_calls();
    mock.state().fail_reads = false;
    assert!(matches!(
        session.read(SensorFamily::Pressure).await,
        Err(Error::NotConnected(_))
    ));
    assert!(mock.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn malformed_payload_does_not_fail_the_session() {
    let mock = MockTransport::new();
    let mut session = session(&mock);
    session.bring_up([SensorFamily::Luminance]).await.unwrap();

    mock.queue(SensorFamily::Luminance, &[0x01, 0x02, 0x03]);
    assert_eq!(
        session.read(SensorFamily::Luminance).await,
        Err(Error::MalformedPayload {
            sensor: "luminance",
            expected: 2,
            actual: 3
        })
    );
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn disconnected_session_fails_fast() {
    let mock = MockTransport::new();
    let mut session = session(&mock);

    assert!(matches!(
        session.discover_handles().await,
        Err(Error::NotConnected(_))
    ));
    assert!(matches!(
        session.enable(SensorFamily::Temperature).await,
        Err(Error::NotConnected(_))
    ));
    assert!(matches!(
        session.read_raw(SensorFamily::Temperature).await,
        Err(Error::NotConnected(_))
    ));
    assert!(mock.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn close_disables_enabled_sensors_best_effort() {
    let mock = MockTransport::new();
    let mut session = session(&mock);
    session
        .bring_up([SensorFamily::Temperature, SensorFamily::Movement])
        .await
        .unwrap();
    mock.clear_calls();
    mock.state().fail_writes = true;

    session.close().await.unwrap();

    assert_eq!(
        mock.calls(),
        vec![
            Call::Write(
                mock.configuration_handle(SensorFamily::Temperature),
                vec![0x00]
            ),
            Call::Write(
                mock.configuration_handle(SensorFamily::Movement),
                vec![0x00, 0x00]
            ),
            Call::Disconnect,
        ]
    );
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.enabled().count(), 0);
    assert!(session
        .descriptors()
        .iter()
        .all(|d| d.data_handle.is_none()));
}

#[tokio::test(start_paused = true)]
async fn restart_reconnects_and_reenables() {
    let mock = MockTransport::new();
    let mut session = session(&mock);
    session.bring_up([SensorFamily::Luminance]).await.unwrap();
    mock.clear_calls();

    session.restart([SensorFamily::Luminance]).await.unwrap();

    let calls = mock.calls();
    let handle = mock.configuration_handle(SensorFamily::Luminance);
    assert_eq!(calls[0], Call::Write(handle, vec![0x00]));
    assert_eq!(calls[1], Call::Disconnect);
    assert_eq!(calls[2], Call::Connect(ADDRESS.to_string()));
    assert_eq!(calls.last(), Some(&Call::Write(handle, vec![0x01])));
    assert_eq!(session.state(), SessionState::Ready);
}
