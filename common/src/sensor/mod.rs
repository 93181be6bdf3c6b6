mod dummysensor;
mod iiodhtsensor;

pub use dummysensor::{DummyConfig, DummySensor};
pub use iiodhtsensor::{IioConfig, IioDhtSensor};

use serde::Deserialize;
use tempsense_model::{Reading, SensorSource};

/// Which sensor to read, chosen once from the configuration file.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorConfig {
    Iio(IioConfig),
    Dummy(DummyConfig),
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig::Iio(IioConfig::default())
    }
}

impl std::fmt::Display for SensorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorConfig::Iio(config) => write!(
                f,
                "{:?} on {} (max {} retries)",
                config.model,
                config.device.display(),
                config.max_retries
            ),
            SensorConfig::Dummy(config) => write!(
                f,
                "dummy sensor ({}°C, {}%)",
                config.temperature_celsius, config.humidity_percent
            ),
        }
    }
}

/// The sensor the daemon reads from.
pub enum Sensor {
    Iio(IioDhtSensor),
    Dummy(DummySensor),
}

impl Sensor {
    pub fn from_config(config: &SensorConfig) -> Self {
        match config {
            SensorConfig::Iio(config) => Sensor::Iio(IioDhtSensor::new(config)),
            SensorConfig::Dummy(config) => {
                Sensor::Dummy(DummySensor::new(config.temperature_celsius, config.humidity_percent))
            }
        }
    }
}

impl SensorSource for Sensor {
    async fn acquire(&mut self) -> Reading {
        match self {
            Sensor::Iio(sensor) => sensor.acquire().await,
            Sensor::Dummy(sensor) => sensor.acquire().await,
        }
    }
}

#[test]
fn test_sensor_config_from_json() {
    let config: SensorConfig = serde_json::from_str(
        r#"{ "kind": "iio", "device": "/sys/bus/iio/devices/iio:device1", "model": "dht22" }"#,
    )
    .unwrap();

    let SensorConfig::Iio(iio) = config else {
        panic!("expected an iio sensor");
    };
    assert_eq!(iio.device, std::path::Path::new("/sys/bus/iio/devices/iio:device1"));
    assert_eq!(iio.model, tempsense_model::DhtModel::Dht22);
    assert_eq!(iio.max_retries, 20);

    let config: SensorConfig = serde_json::from_str(r#"{ "kind": "dummy" }"#).unwrap();
    assert_eq!(config, SensorConfig::Dummy(DummyConfig::default()));
}
