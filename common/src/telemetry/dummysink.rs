use tempsense_model::{DeliveryError, Measurement, TelemetrySink};

use crate::Recorder;

/// Sink for dry runs: logs every batch and keeps it around.
#[derive(Clone, Default)]
pub struct DummySink {
    published: Recorder<[Measurement; 2]>,
}

impl DummySink {
    /// Handle to every batch published so far, still usable after the sink moved away.
    pub fn published(&self) -> Recorder<[Measurement; 2]> {
        self.published.clone()
    }
}

impl TelemetrySink for DummySink {
    async fn publish(&mut self, measurements: &[Measurement; 2]) -> Result<(), DeliveryError> {
        match serde_json::to_string(measurements) {
            Ok(json) => log::info!("Publishing {}", json),
            Err(e) => log::warn!("Could not serialize measurements: {}", e),
        }

        self.published.push(measurements.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_dummy_sink_records_batches() {
    let mut sink = DummySink::default();
    let published = sink.published();
    let state = tempsense_model::PipelineState {
        temperature: 70.0,
        humidity: 30.0,
    };

    sink.publish(&Measurement::pair(&state, "Pi-One")).await.unwrap();

    assert_eq!(published.len(), 1);
    assert_eq!(published.last().unwrap()[1].value, 30.0);
}
