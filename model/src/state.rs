use crate::{to_display_units, Reading};

/// Last accepted temperature (°F) and humidity (%RH).
///
/// Owned by the pipeline and only ever written from inside a cycle. It starts
/// out as [`PipelineState::UNSET`] and only moves when a valid reading arrives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineState {
    pub temperature: f64,
    pub humidity: f64,
}

impl PipelineState {
    /// Published until the first valid reading arrives.
    pub const UNSET: Self = Self {
        temperature: 0.0,
        humidity: 0.0,
    };

    /// Converts `reading` and stores it when it is valid.
    ///
    /// Returns the converted values either way so callers can log them.
    pub fn accept(&mut self, reading: &Reading) -> (f64, f64) {
        let (temperature, humidity) = to_display_units(reading);
        if reading.is_valid {
            self.temperature = temperature;
            self.humidity = humidity;
        }
        (temperature, humidity)
    }

    pub fn is_unset(&self) -> bool {
        *self == Self::UNSET
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::UNSET
    }
}

#[test]
fn test_invalid_reading_leaves_state() {
    let mut state = PipelineState {
        temperature: 70.0,
        humidity: 30.0,
    };
    let before = state;

    state.accept(&Reading::invalid(40.0, 90.0, 20, true));
    assert_eq!(state, before);
}

#[test]
fn test_valid_reading_overwrites_state() {
    let mut state = PipelineState::default();
    assert!(state.is_unset());

    state.accept(&Reading::valid(22.5, 41.0, 3));
    assert_eq!(
        state,
        PipelineState {
            temperature: 72.5,
            humidity: 41.0
        }
    );
}
