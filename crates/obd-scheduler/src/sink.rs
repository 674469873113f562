//! Publish slot seam

use crate::encoder::EncodedPayload;
use std::sync::Arc;

/// Latest-value slot for one metric.
///
/// Each publish replaces the previous payload. Delivery to subscribers is
/// the implementation's business; the pipeline never waits for it and never
/// learns whether it succeeded.
pub trait PublishSink: Send + Sync {
    fn publish(&self, payload: EncodedPayload);
}

impl<S: PublishSink + ?Sized> PublishSink for Arc<S> {
    fn publish(&self, payload: EncodedPayload) {
        (**self).publish(payload)
    }
}
