use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempsense_model::{Reading, SensorSource};

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct DummyConfig {
    #[serde(default = "default_temperature")]
    pub temperature_celsius: f64,
    #[serde(default = "default_humidity")]
    pub humidity_percent: f64,
}

fn default_temperature() -> f64 {
    21.0
}

fn default_humidity() -> f64 {
    45.0
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            temperature_celsius: default_temperature(),
            humidity_percent: default_humidity(),
        }
    }
}

/// Sensor stand-in for dry runs without hardware.
///
/// Hands out the scripted readings in order and then keeps repeating the last one.
pub struct DummySensor {
    script: VecDeque<Reading>,
    last: Reading,
    acquisitions: Arc<AtomicUsize>,
}

impl DummySensor {
    /// Always reports the same valid reading.
    pub fn new(temperature_celsius: f64, humidity_percent: f64) -> Self {
        Self::scripted([Reading::valid(temperature_celsius, humidity_percent, 0)])
    }

    pub fn scripted(readings: impl IntoIterator<Item = Reading>) -> Self {
        let script: VecDeque<Reading> = readings.into_iter().collect();
        let last = script.back().copied().unwrap_or_default();

        Self {
            script,
            last,
            acquisitions: Arc::default(),
        }
    }

    /// Shared count of `acquire` calls, still readable after the sensor moved away.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.acquisitions.clone()
    }
}

impl SensorSource for DummySensor {
    async fn acquire(&mut self) -> Reading {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);

        match self.script.pop_front() {
            Some(reading) => {
                self.last = reading;
                reading
            }
            None => self.last,
        }
    }
}

#[tokio::test]
async fn test_dummy_sensor_script() {
    let mut sensor = DummySensor::scripted([
        Reading::valid(20.0, 40.0, 0),
        Reading::invalid(0.0, 0.0, 20, true),
    ]);
    let counter = sensor.counter();

    assert!(sensor.acquire().await.is_valid);
    assert!(!sensor.acquire().await.is_valid);
    // The last entry repeats once the script is exhausted.
    assert!(sensor.acquire().await.timed_out);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}
