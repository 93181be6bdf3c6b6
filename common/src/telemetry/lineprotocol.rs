//! Encoding of measurements into InfluxDB line protocol.
//!
//! One point per measurement: the unit is the measurement name, the tags are
//! emitted in key order and the measurement's name is the single field key.
//! Points carry no timestamp, the server assigns the time of the write.

use tempsense_model::Measurement;

use super::format_value;

fn escape(text: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn escape_measurement(text: &str) -> String {
    escape(text, &[',', ' '])
}

fn escape_key(text: &str) -> String {
    escape(text, &[',', '=', ' '])
}

/// Encodes one measurement as a line, without the trailing newline.
pub fn encode_point(measurement: &Measurement) -> String {
    let mut line = escape_measurement(&measurement.unit);

    for (key, value) in &measurement.tags {
        line.push(',');
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&escape_key(value));
    }

    line.push(' ');
    line.push_str(&escape_key(&measurement.name));
    line.push('=');
    line.push_str(&format_value(measurement.value));
    line
}

/// Encodes a batch as one payload with a line per measurement.
pub fn encode_batch(measurements: &[Measurement]) -> String {
    measurements
        .iter()
        .map(encode_point)
        .collect::<Vec<_>>()
        .join("\n")
}
