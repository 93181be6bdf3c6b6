use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempsense_model::{DhtModel, Reading, SensorSource};

/// Settings for a DHT sensor exposed through the Linux `dht11` IIO driver.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct IioConfig {
    #[serde(default = "default_device")]
    pub device: PathBuf,
    #[serde(default)]
    pub model: DhtModel,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

fn default_device() -> PathBuf {
    PathBuf::from("/sys/bus/iio/devices/iio:device0")
}

fn default_max_retries() -> u32 {
    20
}

fn default_retry_delay_ms() -> u64 {
    100
}

/// The kernel driver gives up on a silent sensor after one second and reports ETIMEDOUT. Waiting
/// longer than that lets its verdict through instead of abandoning a read that still holds the
/// driver's lock.
fn default_attempt_timeout_ms() -> u64 {
    1500
}

impl Default for IioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            model: DhtModel::default(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum AttemptError {
    #[error("timed out")]
    Timeout,
    #[error("bus error: {0}")]
    Bus(io::Error),
    #[error("unexpected value {0:?}")]
    Parse(String),
    #[error("{temperature}°C / {humidity}% is out of range")]
    OutOfRange { temperature: f64, humidity: f64 },
}

impl From<io::Error> for AttemptError {
    fn from(error: io::Error) -> Self {
        // The driver reports a missing response as ETIMEDOUT and a bad checksum as EIO.
        match error.kind() {
            io::ErrorKind::TimedOut => AttemptError::Timeout,
            _ => AttemptError::Bus(error),
        }
    }
}

/// Reads temperature and humidity from the sysfs attributes of the `dht11` IIO driver, which
/// performs the timing sensitive bit exchange with the sensor in the kernel.
pub struct IioDhtSensor {
    temperature_path: PathBuf,
    humidity_path: PathBuf,
    model: DhtModel,
    max_retries: u32,
    retry_delay: Duration,
    attempt_timeout: Duration,
}

impl IioDhtSensor {
    pub fn new(config: &IioConfig) -> Self {
        Self {
            temperature_path: config.device.join("in_temp_input"),
            humidity_path: config.device.join("in_humidityrelative_input"),
            model: config.model,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
        }
    }

    /// One read of both attributes. Whatever part of the pair decodes lands in `decoded`, even
    /// when the attempt fails as a whole.
    async fn attempt(&self, decoded: &mut (f64, f64)) -> Result<(f64, f64), AttemptError> {
        let read_both = async {
            let temperature = read_milli(&self.temperature_path).await?;
            decoded.0 = temperature;
            let humidity = read_milli(&self.humidity_path).await?;
            decoded.1 = humidity;
            Ok::<_, AttemptError>((temperature, humidity))
        };

        let (temperature, humidity) = tokio::time::timeout(self.attempt_timeout, read_both)
            .await
            .map_err(|_| AttemptError::Timeout)??;

        if !self.model.accepts(temperature, humidity) {
            return Err(AttemptError::OutOfRange {
                temperature,
                humidity,
            });
        }

        Ok((temperature, humidity))
    }
}

/// Reads one attribute in thousandths and scales it to whole units.
async fn read_milli(path: &Path) -> Result<f64, AttemptError> {
    let text = tokio::fs::read_to_string(path).await?;
    let value = text.trim();

    value
        .parse::<i64>()
        .map(|milli| milli as f64 / 1000.0)
        .map_err(|_| AttemptError::Parse(value.to_string()))
}

impl SensorSource for IioDhtSensor {
    async fn acquire(&mut self) -> Reading {
        let mut decoded = (0.0, 0.0);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.attempt(&mut decoded).await {
                Ok((temperature, humidity)) => return Reading::valid(temperature, humidity, attempt),
                Err(e) => log::debug!("DHT attempt {} failed: {}", attempt + 1, e),
            }
        }

        // Running out of retries counts as a timeout, whatever the last failure was.
        Reading::invalid(decoded.0, decoded.1, self.max_retries, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor_in(dir: &Path, model: DhtModel) -> IioDhtSensor {
        IioDhtSensor::new(&IioConfig {
            device: dir.to_path_buf(),
            model,
            max_retries: 3,
            retry_delay_ms: 1,
            attempt_timeout_ms: 500,
        })
    }

    #[tokio::test]
    async fn test_valid_reading() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in_temp_input"), "22500\n").unwrap();
        std::fs::write(dir.path().join("in_humidityrelative_input"), "41000\n").unwrap();

        let reading = sensor_in(dir.path(), DhtModel::Dht11).acquire().await;

        assert_eq!(reading, Reading::valid(22.5, 41.0, 0));
    }

    #[tokio::test]
    async fn test_bus_error_exhausts_retries() {
        let dir = tempfile::tempdir().unwrap();

        let reading = sensor_in(dir.path(), DhtModel::Dht11).acquire().await;

        assert!(!reading.is_valid);
        assert!(reading.timed_out);
        assert_eq!(reading.retry_count, 3);
        assert_eq!((reading.temperature_raw, reading.humidity_raw), (0.0, 0.0));
    }

    #[tokio::test]
    async fn test_partial_read_keeps_decoded_temperature() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in_temp_input"), "22500").unwrap();

        let reading = sensor_in(dir.path(), DhtModel::Dht11).acquire().await;

        assert_eq!(reading, Reading::invalid(22.5, 0.0, 3, true));
    }

    #[test]
    fn test_attempt_outlasts_driver_timeout() {
        // The dht11 driver answers ETIMEDOUT after one second.
        assert!(IioConfig::default().attempt_timeout_ms >= 1500);
    }

    #[tokio::test]
    async fn test_out_of_range_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in_temp_input"), "-12000").unwrap();
        std::fs::write(dir.path().join("in_humidityrelative_input"), "35000").unwrap();

        let reading = sensor_in(dir.path(), DhtModel::Dht11).acquire().await;
        assert!(!reading.is_valid);
        assert_eq!(reading.temperature_raw, -12.0);
        assert_eq!(reading.humidity_raw, 35.0);

        let reading = sensor_in(dir.path(), DhtModel::Dht22).acquire().await;
        assert!(reading.is_valid);
    }

    #[tokio::test]
    async fn test_garbage_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in_temp_input"), "n/a").unwrap();
        std::fs::write(dir.path().join("in_humidityrelative_input"), "35000").unwrap();

        let reading = sensor_in(dir.path(), DhtModel::Dht11).acquire().await;
        assert!(!reading.is_valid);
        assert!(reading.timed_out);
        assert_eq!(reading.retry_count, 3);
    }

    #[test]
    fn test_timeout_errors_are_flagged() {
        let error = AttemptError::from(io::Error::from(io::ErrorKind::TimedOut));
        assert!(matches!(error, AttemptError::Timeout));

        let error = AttemptError::from(io::Error::other("checksum"));
        assert!(matches!(error, AttemptError::Bus(_)));
    }
}
