use std::future::Future;

use crate::Measurement;

/// A failed delivery to a telemetry sink.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    /// The server answered but refused the write.
    #[error("write rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("broker error: {0}")]
    Broker(String),
}

/// Delivers the temperature and humidity measurements of one cycle.
///
/// Takes `&mut self` so calls on one sink are serialized by construction.
pub trait TelemetrySink {
    fn publish(
        &mut self,
        measurements: &[Measurement; 2],
    ) -> impl Future<Output = Result<(), DeliveryError>>;
}
