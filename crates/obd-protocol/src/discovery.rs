//! Adapter discovery over a fixed list of candidate device paths

use crate::client::{ObdClient, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};
use crate::error::ObdError;
use crate::protocol::ObdProtocol;
use crate::transport::DiagnosticTransport;
use async_trait::async_trait;
use std::time::Duration;
use tokio_serial::SerialStream;
use tracing::{info, warn};

/// Opens a transport on one device path
#[async_trait]
pub trait Connector: Send + Sync {
    /// Transport produced by a successful connection
    type Transport: DiagnosticTransport + 'static;

    /// Open and initialize the adapter behind `device`
    async fn connect(&self, device: &str) -> Result<Self::Transport, ObdError>;
}

/// Connects to ELM327 adapters over serial ports
#[derive(Debug, Clone)]
pub struct SerialConnector {
    /// Serial baud rate
    pub baud_rate: u32,
    /// Per-command timeout
    pub timeout: Duration,
    /// Protocol selected during initialization
    pub protocol: ObdProtocol,
}

impl Default for SerialConnector {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            protocol: ObdProtocol::Auto,
        }
    }
}

#[async_trait]
impl Connector for SerialConnector {
    type Transport = ObdClient<SerialStream>;

    async fn connect(&self, device: &str) -> Result<Self::Transport, ObdError> {
        let mut client = ObdClient::open(device, self.baud_rate)?;
        client.set_timeout(self.timeout);
        client.set_protocol(self.protocol).await?;
        client.initialize().await?;
        Ok(client)
    }
}

/// Where and how persistently to look for the adapter
#[derive(Debug, Clone)]
pub struct DiscoveryPolicy {
    /// Device paths, tried in order
    pub candidates: Vec<String>,
    /// Number of full passes over the candidates
    pub rounds: u32,
    /// Pause between two passes
    pub backoff: Duration,
}

impl Default for DiscoveryPolicy {
    fn default() -> Self {
        Self {
            candidates: vec![
                "/dev/ttyUSB0".to_string(),
                "/dev/ttyUSB1".to_string(),
                "/dev/ttyACM0".to_string(),
                "/dev/rfcomm0".to_string(),
            ],
            rounds: 5,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Try every candidate in order, returning the first transport that opens.
///
/// A failed pass is repeated after `policy.backoff` until `policy.rounds`
/// passes have been made.
pub async fn discover<C: Connector>(
    connector: &C,
    policy: &DiscoveryPolicy,
) -> Result<(String, C::Transport), ObdError> {
    let rounds = policy.rounds.max(1);

    for round in 1..=rounds {
        for device in &policy.candidates {
            match connector.connect(device).await {
                Ok(transport) => {
                    info!("OBD adapter found on {} (round {})", device, round);
                    return Ok((device.clone(), transport));
                }
                Err(e) => warn!("No OBD adapter on {}: {}", device, e),
            }
        }

        if round < rounds {
            warn!(
                "No OBD adapter found in round {}/{}, retrying in {:?}",
                round, rounds, policy.backoff
            );
            tokio::time::sleep(policy.backoff).await;
        }
    }

    Err(ObdError::NoDevice {
        tried: policy.candidates.clone(),
        rounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedTransport;
    use std::sync::Mutex;

    /// Succeeds on `working` once `fail_rounds` full passes have failed
    struct FakeConnector {
        working: Option<&'static str>,
        candidates: usize,
        fail_rounds: usize,
        attempts: Mutex<Vec<String>>,
    }

    impl FakeConnector {
        fn new(working: Option<&'static str>, fail_rounds: usize) -> Self {
            Self {
                working,
                candidates: DiscoveryPolicy::default().candidates.len(),
                fail_rounds,
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        type Transport = ScriptedTransport;

        async fn connect(&self, device: &str) -> Result<ScriptedTransport, ObdError> {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(device.to_string());
            let round = (attempts.len() - 1) / self.candidates;
            if round >= self.fail_rounds && Some(device) == self.working {
                Ok(ScriptedTransport::new())
            } else {
                Err(ObdError::SerialError(format!("{device}: No such file or directory")))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_working_candidate_wins() {
        let connector = FakeConnector::new(Some("/dev/ttyACM0"), 0);
        let (device, _) = discover(&connector, &DiscoveryPolicy::default()).await.unwrap();
        assert_eq!(device, "/dev/ttyACM0");
        assert_eq!(
            connector.attempts(),
            vec!["/dev/ttyUSB0", "/dev/ttyUSB1", "/dev/ttyACM0"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_after_backoff() {
        let connector = FakeConnector::new(Some("/dev/ttyUSB0"), 2);
        let start = tokio::time::Instant::now();
        let (device, _) = discover(&connector, &DiscoveryPolicy::default()).await.unwrap();
        assert_eq!(device, "/dev/ttyUSB0");
        assert_eq!(connector.attempts().len(), 9);
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_rounds_fail() {
        let connector = FakeConnector::new(None, 0);
        let policy = DiscoveryPolicy {
            rounds: 3,
            ..Default::default()
        };
        let err = discover(&connector, &policy).await.unwrap_err();
        assert!(matches!(err, ObdError::NoDevice { rounds: 3, .. }));
        assert_eq!(connector.attempts().len(), 12);
    }
}
