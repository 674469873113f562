//! Metric Poller
//!
//! One timer-driven task per metric: request through the arbiter, encode,
//! publish, wait for the next tick. A failed request skips the publish and
//! leaves the slot's previous payload in place.

use crate::arbiter::ChannelArbiter;
use crate::encoder::{encode, EncodedPayload};
use crate::metric::{MetricDefinition, Reading, Transform};
use crate::sink::PublishSink;
use obd_protocol::{DiagnosticTransport, ObdError};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Counter of poll cycles, labelled by metric and outcome
pub const POLLS_METRIC: &str = "dash_bridge_polls_total";

/// Repeating acquisition task for one metric
pub struct MetricPoller<T> {
    definition: MetricDefinition,
    arbiter: Arc<ChannelArbiter<T>>,
    sink: Arc<dyn PublishSink>,
}

impl<T: DiagnosticTransport> MetricPoller<T> {
    /// Create a poller publishing into `sink`
    pub fn new(
        definition: MetricDefinition,
        arbiter: Arc<ChannelArbiter<T>>,
        sink: Arc<dyn PublishSink>,
    ) -> Self {
        Self {
            definition,
            arbiter,
            sink,
        }
    }

    /// Run one cycle: request, encode and publish.
    ///
    /// On error nothing is published.
    pub async fn poll_once(&self) -> Result<EncodedPayload, ObdError> {
        let metric = self.definition.metric;
        match self.arbiter.execute(self.definition.request).await {
            Ok(reading) => {
                let payload = encode(self.definition.transform, &reading);
                self.sink.publish(payload);
                info!(
                    metric = metric.name(),
                    "The {} is {}{}",
                    metric.description(),
                    self.human_value(&reading, &payload),
                    metric.unit()
                );
                metrics::counter!(POLLS_METRIC, "metric" => metric.name(), "outcome" => "published")
                    .increment(1);
                Ok(payload)
            }
            Err(e) => {
                warn!(metric = metric.name(), "Skipping {} update: {}", metric.description(), e);
                metrics::counter!(POLLS_METRIC, "metric" => metric.name(), "outcome" => "skipped")
                    .increment(1);
                Err(e)
            }
        }
    }

    /// Poll at the metric's cadence until the diagnostic session is lost.
    ///
    /// A disabled metric returns immediately. Transient errors only skip a
    /// cycle; session loss ends the loop and is returned.
    pub async fn run(self) -> Result<(), ObdError> {
        let metric = self.definition.metric;
        if !self.definition.enabled {
            info!(metric = metric.name(), "Poller disabled");
            return Ok(());
        }

        info!(
            metric = metric.name(),
            "Polling {} every {:?}",
            self.definition.request,
            self.definition.interval
        );
        let mut ticker = tokio::time::interval(self.definition.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.poll_once().await {
                if e.is_session_lost() {
                    warn!(metric = metric.name(), "Poller stopping: {}", e);
                    return Err(e);
                }
            }
        }
    }

    fn human_value(&self, reading: &Reading, payload: &EncodedPayload) -> String {
        match self.definition.transform {
            Transform::RawPassthrough => format!("{:.3} ({})", reading.value, payload),
            Transform::Widen => format!("{}", payload.to_f32()),
            Transform::Scale(_) => format!("{:.2}", payload.to_f32()),
        }
    }
}
