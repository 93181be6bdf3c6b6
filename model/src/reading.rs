use serde::{Deserialize, Serialize};

/// Outcome of one acquisition from the sensor, valid or not.
///
/// The raw values are in sensor units (°C and %RH). When `is_valid` is false
/// they are whatever the last failed attempt managed to decode and must not be
/// trusted.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Reading {
    pub temperature_raw: f64,
    pub humidity_raw: f64,
    pub is_valid: bool,
    /// Number of retries performed after the first attempt.
    pub retry_count: u32,
    /// The final failed attempt ran into a bus or driver timeout.
    pub timed_out: bool,
}

impl Reading {
    /// A reading that passed checksum and range checks.
    pub fn valid(temperature_raw: f64, humidity_raw: f64, retry_count: u32) -> Self {
        Self {
            temperature_raw,
            humidity_raw,
            is_valid: true,
            retry_count,
            timed_out: false,
        }
    }

    /// A reading that ran out of retries.
    pub fn invalid(temperature_raw: f64, humidity_raw: f64, retry_count: u32, timed_out: bool) -> Self {
        Self {
            temperature_raw,
            humidity_raw,
            is_valid: false,
            retry_count,
            timed_out,
        }
    }
}

/// Converts a reading to the units published downstream: °F and %RH.
///
/// Total over every reading, valid or not. Callers decide whether the result
/// is worth keeping.
pub fn to_display_units(reading: &Reading) -> (f64, f64) {
    let temperature = reading.temperature_raw * 9.0 / 5.0 + 32.0;
    (temperature, reading.humidity_raw)
}

/// The DHT family member wired to the bus, which bounds plausible values.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DhtModel {
    #[default]
    Dht11,
    Dht22,
}

impl DhtModel {
    /// Temperature range in °C the sensor can report.
    pub fn temperature_range(&self) -> std::ops::RangeInclusive<f64> {
        match self {
            DhtModel::Dht11 => 0.0..=50.0,
            DhtModel::Dht22 => -40.0..=80.0,
        }
    }

    /// Relative humidity range in percent.
    pub fn humidity_range(&self) -> std::ops::RangeInclusive<f64> {
        0.0..=100.0
    }

    /// Whether a decoded pair lies inside the sensor's operating range.
    pub fn accepts(&self, temperature: f64, humidity: f64) -> bool {
        self.temperature_range().contains(&temperature) && self.humidity_range().contains(&humidity)
    }
}

#[test]
fn test_celsius_to_fahrenheit() {
    let reading = Reading::valid(22.5, 41.0, 0);
    assert_eq!(to_display_units(&reading), (72.5, 41.0));

    let freezing = Reading::valid(0.0, 10.0, 0);
    assert_eq!(to_display_units(&freezing).0, 32.0);

    let cold = Reading::valid(-40.0, 10.0, 0);
    assert_eq!(to_display_units(&cold).0, -40.0);
}

#[test]
fn test_conversion_ignores_validity() {
    let reading = Reading::invalid(100.0, 55.0, 20, true);
    assert_eq!(to_display_units(&reading), (212.0, 55.0));
}

#[test]
fn test_model_ranges() {
    assert!(DhtModel::Dht11.accepts(21.0, 40.0));
    assert!(!DhtModel::Dht11.accepts(-5.0, 40.0));
    assert!(DhtModel::Dht22.accepts(-5.0, 40.0));
    assert!(!DhtModel::Dht22.accepts(20.0, 101.0));
}
