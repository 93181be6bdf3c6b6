use tempsense_model::{Measurement, PipelineState, SensorSource, TelemetrySink};

/// Runs one acquire, convert, update, publish cycle.
///
/// `state` is only written when the reading is valid. The measurements are built from `state`
/// afterwards, so an invalid reading republishes the last accepted values. Nothing that goes
/// wrong in here ends the process: acquisition faults arrive as invalid readings and delivery
/// errors are logged.
pub async fn run_cycle<S, K>(sensor: &mut S, sink: &mut K, state: &mut PipelineState, entity_id: &str)
where
    S: SensorSource,
    K: TelemetrySink,
{
    let reading = sensor.acquire().await;
    let (temperature, humidity) = state.accept(&reading);

    if reading.is_valid {
        log::info!("Temp: {:.1}°F, Humidity: {:.1}%", temperature, humidity);
    } else {
        log::warn!(
            "Invalid reading! retry count: {}, timed out: {}, humidity: {}, temperature: {}",
            reading.retry_count,
            reading.timed_out,
            reading.humidity_raw,
            reading.temperature_raw
        );
    }

    if state.is_unset() {
        log::debug!("No valid reading yet, publishing unset values");
    }

    let measurements = Measurement::pair(state, entity_id);
    match sink.publish(&measurements).await {
        Ok(()) => log::debug!("Published {} measurements", measurements.len()),
        Err(e) => log::error!("Failed to publish measurements: {}", e),
    }
}

/// Owns everything a cycle touches: the sensor, the sink and the last accepted values.
pub struct Pipeline<S, K> {
    sensor: S,
    sink: K,
    state: PipelineState,
    entity_id: String,
}

impl<S: SensorSource, K: TelemetrySink> Pipeline<S, K> {
    pub fn new(sensor: S, sink: K, entity_id: impl Into<String>) -> Self {
        Self {
            sensor,
            sink,
            state: PipelineState::UNSET,
            entity_id: entity_id.into(),
        }
    }

    pub async fn cycle(&mut self) {
        run_cycle(&mut self.sensor, &mut self.sink, &mut self.state, &self.entity_id).await
    }

    #[cfg(test)]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Hands the sink back so its connection can be closed on shutdown.
    pub fn into_sink(self) -> K {
        self.sink
    }
}
