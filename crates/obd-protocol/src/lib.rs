//! OBD-II Protocol Implementation
//!
//! This crate provides async serial communication with ELM327-compatible
//! OBD-II adapters: request framing, reply parsing, PID decoding and
//! discovery of the adapter among a list of candidate serial devices.

mod client;
mod discovery;
pub mod elm;
mod error;
pub mod mock;
mod pid;
mod protocol;
mod transport;

pub use client::{ObdClient, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};
pub use discovery::{discover, Connector, DiscoveryPolicy, SerialConnector};
pub use error::ObdError;
pub use pid::{Pid, PidResponse};
pub use protocol::ObdProtocol;
pub use transport::DiagnosticTransport;

/// OBD-II mode constants
pub mod mode {
    /// Current data
    pub const CURRENT_DATA: u8 = 0x01;
}
