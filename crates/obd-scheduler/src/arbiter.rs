//! Channel Arbiter
//!
//! The adapter is a single half-duplex serial link: one command out, one
//! reply back. Every poller goes through the arbiter, which holds one lock
//! for the whole request/response exchange so that replies can never be
//! interleaved.

use crate::metric::{Reading, Request};
use obd_protocol::{DiagnosticTransport, ObdError};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Exclusive owner of the diagnostic session
pub struct ChannelArbiter<T> {
    /// The session; only reachable while the lock is held
    session: Mutex<T>,
    /// Device path the session was opened on
    device: String,
    /// Set once the session reported itself unusable
    lost: AtomicBool,
}

impl<T: DiagnosticTransport> ChannelArbiter<T> {
    /// Take ownership of an open session
    pub fn new(device: impl Into<String>, transport: T) -> Self {
        Self {
            session: Mutex::new(transport),
            device: device.into(),
            lost: AtomicBool::new(false),
        }
    }

    /// Run one exchange on the channel.
    ///
    /// Callers queue on the lock while another exchange is in flight.
    /// Transport errors are returned per call and leave the session usable,
    /// except session loss: from then on every call fails with
    /// [`ObdError::SessionLost`] without touching the transport.
    pub async fn execute(&self, request: Request) -> Result<Reading, ObdError> {
        self.check_session()?;
        let mut session = self.session.lock().await;
        // Someone may have lost the session while we were queued.
        self.check_session()?;

        debug!("Executing {} on {}", request, self.device);
        let result = match request {
            Request::Pid(pid) => session.query_pid(pid).await.map(Reading::from),
            Request::BatteryVoltage => session.read_voltage().await.map(Reading::number),
        };

        if let Err(e) = &result {
            if e.is_session_lost() && !self.lost.swap(true, Ordering::AcqRel) {
                error!("Diagnostic session on {} lost: {}", self.device, e);
            }
        }
        result
    }

    /// Whether the session has been lost
    pub fn is_session_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    fn check_session(&self) -> Result<(), ObdError> {
        if self.is_session_lost() {
            Err(ObdError::SessionLost(format!("{} is no longer usable", self.device)))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_protocol::mock::{Reply, ScriptedTransport};
    use obd_protocol::Pid;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_reading_carries_value_and_bytes() {
        let transport = ScriptedTransport::new();
        transport.push(Pid::Rpm, Reply::Raw(vec![0x1A, 0xF8]));
        let arbiter = ChannelArbiter::new("scripted", transport);

        let reading = arbiter.execute(Request::Pid(Pid::Rpm)).await.unwrap();
        assert!((reading.value - 1726.0).abs() < 0.01);
        assert_eq!(reading.raw_bytes, vec![0x1A, 0xF8]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_exchanges_never_overlap() {
        let transport = ScriptedTransport::new().with_latency(Duration::from_millis(2));
        for pid in [Pid::Rpm, Pid::Speed, Pid::CoolantTemp, Pid::Maf] {
            transport.set_value(pid, 1.0);
        }
        transport.set_voltage(12.6);
        let shared = transport.clone();
        let arbiter = Arc::new(ChannelArbiter::new("scripted", transport));

        let mut tasks = Vec::new();
        for request in [
            Request::Pid(Pid::Rpm),
            Request::Pid(Pid::Speed),
            Request::Pid(Pid::CoolantTemp),
            Request::Pid(Pid::Maf),
            Request::BatteryVoltage,
        ] {
            let arbiter = Arc::clone(&arbiter);
            tasks.push(tokio::spawn(async move {
                for _ in 0..10 {
                    arbiter.execute(request).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(shared.calls(), 50);
        assert_eq!(shared.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_transient_error_keeps_session() {
        let transport = ScriptedTransport::new();
        transport.push(Pid::Speed, Reply::Error(ObdError::Timeout(2000)));
        transport.push(Pid::Speed, Reply::Raw(vec![0x28]));
        let arbiter = ChannelArbiter::new("scripted", transport);

        assert!(matches!(
            arbiter.execute(Request::Pid(Pid::Speed)).await,
            Err(ObdError::Timeout(2000))
        ));
        assert!(!arbiter.is_session_lost());
        assert!(arbiter.execute(Request::Pid(Pid::Speed)).await.is_ok());
    }

    #[tokio::test]
    async fn test_session_loss_is_latched() {
        let transport = ScriptedTransport::new();
        transport.push(Pid::Rpm, Reply::Error(ObdError::SessionLost("unplugged".into())));
        transport.set_value(Pid::Speed, 50.0);
        let shared = transport.clone();
        let arbiter = ChannelArbiter::new("scripted", transport);

        assert!(arbiter.execute(Request::Pid(Pid::Rpm)).await.unwrap_err().is_session_lost());
        assert!(arbiter.is_session_lost());

        let err = arbiter.execute(Request::Pid(Pid::Speed)).await.unwrap_err();
        assert!(err.is_session_lost());
        assert_eq!(shared.calls(), 1);
    }
}
