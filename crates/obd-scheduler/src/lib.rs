//! OBD-II Telemetry Acquisition
//!
//! Runs one poller per metric over a single arbitrated diagnostic channel,
//! encodes every answer into a four byte payload and hands it to the
//! metric's publish slot.

mod arbiter;
mod encoder;
mod metric;
mod poller;
mod scheduler;
mod sink;

pub use arbiter::ChannelArbiter;
pub use encoder::{encode, EncodedPayload};
pub use metric::{Metric, MetricDefinition, Reading, Request, Transform};
pub use poller::{MetricPoller, POLLS_METRIC};
pub use scheduler::{MetricSettings, SchedulerConfig};
pub use sink::PublishSink;
