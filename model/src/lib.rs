//! Data model and ports of the tempsense pipeline.
//!
//! The types in here are shared between the sensor/sink implementations in
//! `tempsense-common` and the daemon driving them. Nothing in this crate does
//! any I/O.

mod measurement;
mod reading;
mod sensor;
mod sink;
mod state;

pub use measurement::{Measurement, ENTITY_TAG};
pub use reading::{to_display_units, DhtModel, Reading};
pub use sensor::SensorSource;
pub use sink::{DeliveryError, TelemetrySink};
pub use state::PipelineState;
