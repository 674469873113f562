//! Scripted transport for exercising the pipeline without an adapter
//!
//! Replies are queued per PID. The last queued reply for a PID is sticky and
//! is returned for every further request until something else is queued.
//! Unscripted PIDs answer `NO DATA`.

use crate::error::ObdError;
use crate::pid::{Pid, PidResponse};
use crate::transport::DiagnosticTransport;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One scripted answer
#[derive(Debug, Clone)]
pub enum Reply {
    /// An already decoded value; raw bytes are left empty
    Value(f64),
    /// Raw payload bytes, decoded with the PID's formula
    Raw(Vec<u8>),
    /// A failed exchange
    Error(ObdError),
}

#[derive(Default)]
struct Script {
    pids: HashMap<Pid, VecDeque<Reply>>,
    voltage: VecDeque<Reply>,
}

#[derive(Default)]
struct Shared {
    script: Mutex<Script>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

/// Test double transport. Clones share the same script and counters.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    shared: Arc<Shared>,
    latency: Option<Duration>,
}

impl ScriptedTransport {
    /// Create a transport with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every exchange open for `latency`, widening the window in which
    /// overlapping calls would be observed
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Replace the script for `pid` with a single sticky decoded value
    pub fn set_value(&self, pid: Pid, value: f64) {
        self.script().pids.insert(pid, VecDeque::from([Reply::Value(value)]));
    }

    /// Queue a reply for `pid` behind whatever is already scripted
    pub fn push(&self, pid: Pid, reply: Reply) {
        self.script().pids.entry(pid).or_default().push_back(reply);
    }

    /// Replace the voltage script with a single sticky value
    pub fn set_voltage(&self, volts: f64) {
        self.script().voltage = VecDeque::from([Reply::Value(volts)]);
    }

    /// Highest number of exchanges observed running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.shared.max_in_flight.load(Ordering::SeqCst)
    }

    /// Total number of exchanges started
    pub fn calls(&self) -> usize {
        self.shared.calls.load(Ordering::SeqCst)
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        // A panicking test thread must not hide the script from the others.
        self.shared
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_reply(queue: &mut VecDeque<Reply>) -> Option<Reply> {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    async fn exchange<F, R>(&self, pick: F) -> R
    where
        F: FnOnce(&mut Script) -> R,
    {
        self.shared.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let result = {
            let mut script = self.script();
            pick(&mut *script)
        };

        self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("latency", &self.latency)
            .field("calls", &self.calls())
            .field("max_in_flight", &self.max_in_flight())
            .finish()
    }
}

#[async_trait]
impl DiagnosticTransport for ScriptedTransport {
    async fn query_pid(&mut self, pid: Pid) -> Result<PidResponse, ObdError> {
        let reply = self
            .exchange(|script| script.pids.get_mut(&pid).and_then(Self::next_reply))
            .await;
        match reply {
            Some(Reply::Value(value)) => Ok(PidResponse {
                pid,
                value,
                raw_bytes: Vec::new(),
            }),
            Some(Reply::Raw(bytes)) => PidResponse::decode(pid, bytes),
            Some(Reply::Error(e)) => Err(e),
            None => Err(ObdError::NoData),
        }
    }

    async fn read_voltage(&mut self) -> Result<f64, ObdError> {
        let reply = self
            .exchange(|script| Self::next_reply(&mut script.voltage))
            .await;
        match reply {
            Some(Reply::Value(volts)) => Ok(volts),
            Some(Reply::Raw(_)) => Err(ObdError::InvalidResponse("raw voltage reply".into())),
            Some(Reply::Error(e)) => Err(e),
            None => Err(ObdError::NoData),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_reply_is_sticky() {
        let mut transport = ScriptedTransport::new();
        transport.push(Pid::Speed, Reply::Error(ObdError::NoData));
        transport.push(Pid::Speed, Reply::Raw(vec![0x55]));

        assert!(transport.query_pid(Pid::Speed).await.is_err());
        for _ in 0..3 {
            let response = transport.query_pid(Pid::Speed).await.unwrap();
            assert!((response.value - 85.0).abs() < 0.01);
        }
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test]
    async fn test_unscripted_pid_has_no_data() {
        let mut transport = ScriptedTransport::new();
        assert!(matches!(
            transport.query_pid(Pid::Odometer).await.unwrap_err(),
            ObdError::NoData
        ));
        assert!(transport.read_voltage().await.is_err());
    }

    #[tokio::test]
    async fn test_clones_share_script() {
        let transport = ScriptedTransport::new();
        let mut clone = transport.clone();
        transport.set_voltage(13.9);
        assert!((clone.read_voltage().await.unwrap() - 13.9).abs() < 1e-9);
        assert_eq!(transport.max_in_flight(), 1);
    }

    #[test]
    fn test_debug_shows_counters() {
        let transport = ScriptedTransport::new();
        let text = format!("{:?}", transport);
        assert!(text.starts_with("ScriptedTransport"));
        assert!(text.contains("calls: 0"));
    }
}
