//! End-to-end bridge tests against a scripted adapter and an in-process
//! peripheral.

use async_trait::async_trait;
use ble_gatt::{LocalPeripheral, Uuid16};
use dash_bridge::{BridgeConfig, BridgeError, Supervisor};
use obd_protocol::mock::{Reply, ScriptedTransport};
use obd_protocol::{Connector, ObdError, Pid};
use obd_scheduler::Metric;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const DEVICE: &str = "/dev/ttyUSB1";

/// Answers on one device path with a shared scripted transport
struct ScriptedConnector {
    device: Option<&'static str>,
    transport: ScriptedTransport,
    attempts: AtomicUsize,
}

impl ScriptedConnector {
    fn on(device: &'static str, transport: ScriptedTransport) -> Self {
        Self {
            device: Some(device),
            transport,
            attempts: AtomicUsize::new(0),
        }
    }

    fn absent() -> Self {
        Self {
            device: None,
            transport: ScriptedTransport::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&self, device: &str) -> Result<ScriptedTransport, ObdError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.device == Some(device) {
            Ok(self.transport.clone())
        } else {
            Err(ObdError::AdapterNotResponding)
        }
    }
}

fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.discovery.backoff_ms = 10;
    config
}

fn value_at(peripheral: &LocalPeripheral, uuid: u16) -> Vec<u8> {
    peripheral
        .characteristic(Uuid16(uuid))
        .map(|handle| handle.value())
        .unwrap()
}

fn f32_at(peripheral: &LocalPeripheral, uuid: u16) -> f32 {
    let bytes: [u8; 4] = value_at(peripheral, uuid).try_into().unwrap();
    f32::from_le_bytes(bytes)
}

#[tokio::test(start_paused = true)]
async fn test_rpm_reaches_its_characteristic() {
    let transport = ScriptedTransport::new();
    transport.set_value(Pid::Rpm, 3200.5);
    let connector = ScriptedConnector::on(DEVICE, transport);
    let peripheral = LocalPeripheral::new();

    let supervisor = Supervisor::start(&test_config(), &peripheral, &connector)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(supervisor.device(), DEVICE);
    assert_eq!(value_at(&peripheral, 0x27AF), vec![0x00, 0x08, 0x48, 0x45]);
    assert!(peripheral.is_advertising());
    assert_eq!(peripheral.local_name().as_deref(), Some("Raspberry Pi OBD-II"));
    assert_eq!(peripheral.services(), vec![Uuid16(0x1812)]);
}

#[tokio::test(start_paused = true)]
async fn test_throttle_is_published_as_percentage() {
    let transport = ScriptedTransport::new();
    transport.set_value(Pid::ThrottlePosition, 0.73);
    let connector = ScriptedConnector::on(DEVICE, transport);
    let peripheral = LocalPeripheral::new();

    let _supervisor = Supervisor::start(&test_config(), &peripheral, &connector)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!((f32_at(&peripheral, 0x27AE) - 73.0).abs() < 1e-4);
}

#[tokio::test(start_paused = true)]
async fn test_failed_poll_keeps_previous_value() {
    let transport = ScriptedTransport::new();
    transport.push(Pid::CoolantTemp, Reply::Value(85.0));
    transport.push(Pid::CoolantTemp, Reply::Error(ObdError::NoData));
    transport.set_value(Pid::Rpm, 1000.0);
    let connector = ScriptedConnector::on(DEVICE, transport.clone());
    let peripheral = LocalPeripheral::new();

    let supervisor = Supervisor::start(&test_config(), &peripheral, &connector)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(f32_at(&peripheral, 0x272F), 85.0);
    assert_eq!(f32_at(&peripheral, 0x27AF), 1000.0);

    transport.set_value(Pid::Rpm, 2000.0);
    tokio::time::sleep(Duration::from_millis(2000)).await;

    assert_eq!(f32_at(&peripheral, 0x272F), 85.0);
    assert_eq!(f32_at(&peripheral, 0x27AF), 2000.0);
    assert_eq!(supervisor.poller_count(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_radio_failure_aborts_before_discovery() {
    let connector = ScriptedConnector::on(DEVICE, ScriptedTransport::new());
    let peripheral = LocalPeripheral::without_radio();

    let err = Supervisor::start(&test_config(), &peripheral, &connector)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, BridgeError::Radio(_)));
    assert_eq!(connector.attempts(), 0);
    assert!(peripheral.services().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_adapter_fails_startup() {
    let connector = ScriptedConnector::absent();
    let peripheral = LocalPeripheral::new();
    let config = test_config();

    let err = Supervisor::start(&config, &peripheral, &connector)
        .await
        .err()
        .unwrap();

    assert!(matches!(
        err,
        BridgeError::Discovery(ObdError::NoDevice { rounds: 5, .. })
    ));
    assert_eq!(connector.attempts(), 4 * 5);
    assert!(peripheral.services().is_empty());
    assert!(!peripheral.is_advertising());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_characteristic_fails_registration() {
    let connector = ScriptedConnector::on(DEVICE, ScriptedTransport::new());
    let peripheral = LocalPeripheral::new();
    let mut config = test_config();
    config
        .advertising
        .characteristics
        .insert(Metric::Gear, Uuid16(0x27AF));

    let err = Supervisor::start(&config, &peripheral, &connector)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, BridgeError::Service(_)));
    assert!(!peripheral.is_advertising());
}

#[tokio::test(start_paused = true)]
async fn test_session_loss_stops_the_bridge() {
    let transport = ScriptedTransport::new();
    transport.push(
        Pid::Rpm,
        Reply::Error(ObdError::SessionLost("device unplugged".into())),
    );
    let connector = ScriptedConnector::on(DEVICE, transport.clone());
    let peripheral = LocalPeripheral::new();

    let mut supervisor = Supervisor::start(&test_config(), &peripheral, &connector)
        .await
        .unwrap();
    let result = tokio::time::timeout(Duration::from_secs(60), supervisor.wait())
        .await
        .unwrap();

    assert!(matches!(result, Err(BridgeError::SessionLost(_))));
    assert_eq!(supervisor.poller_count(), 0);

    // Nothing touches the transport once the loss is latched.
    let calls = transport.calls();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_metric_keeps_initial_value() {
    let transport = ScriptedTransport::new();
    transport.push(Pid::ActualGear, Reply::Raw(vec![0x00, 0x00, 0x0B, 0xB8]));
    let connector = ScriptedConnector::on(DEVICE, transport);
    let peripheral = LocalPeripheral::new();

    let supervisor = Supervisor::start(&test_config(), &peripheral, &connector)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(value_at(&peripheral, 0x2C08), vec![0; 4]);
    assert_eq!(value_at(&peripheral, 0x2732), vec![0; 4]);
    assert!(supervisor.characteristic(Metric::Gear).is_some());
    assert_eq!(supervisor.poller_count(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_enabled_gear_forwards_raw_bytes() {
    let transport = ScriptedTransport::new();
    transport.push(Pid::ActualGear, Reply::Raw(vec![0x00, 0x00, 0x0B, 0xB8]));
    let connector = ScriptedConnector::on(DEVICE, transport);
    let peripheral = LocalPeripheral::new();
    let mut config = test_config();
    config.scheduler.settings_mut(Metric::Gear).enabled = true;

    let _supervisor = Supervisor::start(&config, &peripheral, &connector)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(value_at(&peripheral, 0x2C08), vec![0x00, 0x00, 0x0B, 0xB8]);
}

#[tokio::test(start_paused = true)]
async fn test_exchanges_never_overlap() {
    let transport = ScriptedTransport::new().with_latency(Duration::from_millis(5));
    transport.set_value(Pid::Rpm, 800.0);
    transport.set_value(Pid::Speed, 42.0);
    transport.set_value(Pid::ThrottlePosition, 0.1);
    transport.set_voltage(12.6);
    let connector = ScriptedConnector::on(DEVICE, transport.clone());
    let peripheral = LocalPeripheral::new();

    let _supervisor = Supervisor::start(&test_config(), &peripheral, &connector)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(transport.calls() > 50);
    assert_eq!(transport.max_in_flight(), 1);
    assert_eq!(f32_at(&peripheral, 0x27A7), 42.0);
    assert!((f32_at(&peripheral, 0x2B18) - 12.6).abs() < 1e-4);
}

#[tokio::test]
async fn test_characteristics_can_be_subscribed() {
    let transport = ScriptedTransport::new();
    transport.set_value(Pid::Speed, 88.0);
    let connector = ScriptedConnector::on(DEVICE, transport);
    let peripheral = LocalPeripheral::new();

    let supervisor = Supervisor::start(&test_config(), &peripheral, &connector)
        .await
        .unwrap();
    let mut rx = supervisor
        .characteristic(Metric::Speed)
        .unwrap()
        .subscribe()
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while *rx.borrow_and_update() == vec![0; 4] {
            rx.changed().await.unwrap();
        }
    })
    .await
    .unwrap();
    assert_eq!(*rx.borrow(), 88.0f32.to_le_bytes().to_vec());
}
