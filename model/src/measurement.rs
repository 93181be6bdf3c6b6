use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::PipelineState;

/// Tag key carrying the fixed entity identifier.
pub const ENTITY_TAG: &str = "entity_id";

/// A single named, tagged numeric fact to be delivered to a sink.
///
/// `name` doubles as the line-protocol field key and, lowercased, as the MQTT
/// sub-topic. `unit` is the line-protocol measurement name.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Measurement {
    pub name: String,
    pub unit: String,
    pub value: f64,
    pub tags: BTreeMap<String, String>,
}

impl Measurement {
    pub fn new(name: &str, unit: &str, value: f64, entity_id: &str) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert(ENTITY_TAG.to_string(), entity_id.to_string());

        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            value,
            tags,
        }
    }

    /// Builds the temperature and humidity measurements from the current state.
    pub fn pair(state: &PipelineState, entity_id: &str) -> [Measurement; 2] {
        [
            Self::new("Temperature", "°F", state.temperature, entity_id),
            Self::new("Humidity", "%", state.humidity, entity_id),
        ]
    }
}

#[test]
fn test_measurement_pair() {
    let state = PipelineState {
        temperature: 72.5,
        humidity: 41.0,
    };
    let [temperature, humidity] = Measurement::pair(&state, "Pi-One");

    assert_eq!(temperature.name, "Temperature");
    assert_eq!(temperature.unit, "°F");
    assert_eq!(temperature.value, 72.5);
    assert_eq!(humidity.name, "Humidity");
    assert_eq!(humidity.unit, "%");
    assert_eq!(humidity.tags.get(ENTITY_TAG).map(String::as_str), Some("Pi-One"));
}
