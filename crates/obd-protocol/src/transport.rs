//! Transport seam between the acquisition pipeline and the adapter

use crate::error::ObdError;
use crate::pid::{Pid, PidResponse};
use async_trait::async_trait;

/// A request/response session with the diagnostic bus.
///
/// Implementations are not expected to tolerate interleaved calls; callers
/// serialize access (see `obd_scheduler::ChannelArbiter`).
#[async_trait]
pub trait DiagnosticTransport: Send {
    /// Issue a Mode 01 request and decode the reply
    async fn query_pid(&mut self, pid: Pid) -> Result<PidResponse, ObdError>;

    /// Read the adapter's supply voltage (not a standard PID)
    async fn read_voltage(&mut self) -> Result<f64, ObdError>;
}

#[async_trait]
impl<T: DiagnosticTransport + ?Sized> DiagnosticTransport for Box<T> {
    async fn query_pid(&mut self, pid: Pid) -> Result<PidResponse, ObdError> {
        (**self).query_pid(pid).await
    }

    async fn read_voltage(&mut self) -> Result<f64, ObdError> {
        (**self).read_voltage().await
    }
}
