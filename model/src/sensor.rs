use std::future::Future;

use crate::Reading;

/// Something that can produce one [`Reading`] from the physical sensor.
///
/// Retries are internal: the caller only ever sees the final outcome, and
/// faults come back as an invalid reading instead of an error.
pub trait SensorSource {
    fn acquire(&mut self) -> impl Future<Output = Reading>;
}
