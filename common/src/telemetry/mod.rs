mod dummysink;
pub mod lineprotocol;
#[cfg(feature = "influx")]
mod lineprotocolsink;
#[cfg(feature = "mqtt")]
mod mqttsink;

pub use dummysink::DummySink;
#[cfg(feature = "influx")]
pub use lineprotocolsink::{EndpointError, LineProtocolConfig, LineProtocolSink};
#[cfg(feature = "mqtt")]
pub use mqttsink::{BrokerAddress, BrokerAddressError, MqttConfig, MqttMessage, MqttSink};

use serde::Deserialize;
use tempsense_model::{DeliveryError, Measurement, TelemetrySink};

/// Where measurements go, chosen once from the configuration file.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    #[cfg(feature = "influx")]
    LineProtocol(LineProtocolConfig),
    #[cfg(feature = "mqtt")]
    Mqtt(MqttConfig),
    Dummy,
}

impl std::fmt::Display for SinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "influx")]
            SinkConfig::LineProtocol(config) => {
                write!(f, "line protocol write to {} (database {})", config.uri, config.database)
            }
            #[cfg(feature = "mqtt")]
            SinkConfig::Mqtt(config) => write!(
                f,
                "MQTT broker {} as {} under {}",
                config.broker, config.client_id, config.topic_root
            ),
            SinkConfig::Dummy => write!(f, "dummy sink"),
        }
    }
}

/// A sink could not be set up at startup.
#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[cfg(feature = "influx")]
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] EndpointError),

    #[cfg(feature = "influx")]
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "mqtt")]
    #[error("invalid broker address: {0}")]
    Address(#[from] BrokerAddressError),

    #[cfg(feature = "mqtt")]
    #[error("broker connection failed: {0}")]
    Broker(#[from] rumqttc::ConnectionError),

    #[error("broker did not acknowledge the connection within {0:?}")]
    Timeout(std::time::Duration),
}

/// The telemetry sink in use for the lifetime of the process.
pub enum Sink {
    #[cfg(feature = "influx")]
    LineProtocol(LineProtocolSink),
    #[cfg(feature = "mqtt")]
    Mqtt(MqttSink),
    Dummy(DummySink),
}

impl Sink {
    /// Sets up the configured sink. MQTT sessions are established here, once.
    pub async fn connect(config: &SinkConfig) -> Result<Self, ConnectError> {
        let sink = match config {
            #[cfg(feature = "influx")]
            SinkConfig::LineProtocol(config) => Sink::LineProtocol(LineProtocolSink::new(config)?),
            #[cfg(feature = "mqtt")]
            SinkConfig::Mqtt(config) => Sink::Mqtt(MqttSink::connect(config).await?),
            SinkConfig::Dummy => Sink::Dummy(DummySink::default()),
        };

        Ok(sink)
    }

    /// Releases the sink's connection, if it holds one.
    pub async fn close(self) {
        match self {
            #[cfg(feature = "mqtt")]
            Sink::Mqtt(sink) => sink.close().await,
            _ => {}
        }
    }
}

impl TelemetrySink for Sink {
    async fn publish(&mut self, measurements: &[Measurement; 2]) -> Result<(), DeliveryError> {
        match self {
            #[cfg(feature = "influx")]
            Sink::LineProtocol(sink) => sink.publish(measurements).await,
            #[cfg(feature = "mqtt")]
            Sink::Mqtt(sink) => sink.publish(measurements).await,
            Sink::Dummy(sink) => sink.publish(measurements).await,
        }
    }
}

/// Formats a value with `.` as decimal separator and no trailing `.0` on whole numbers.
pub fn format_value(value: f64) -> String {
    format!("{value}")
}

#[test]
fn test_format_value() {
    assert_eq!(format_value(72.5), "72.5");
    assert_eq!(format_value(41.0), "41");
    assert_eq!(format_value(-3.25), "-3.25");
    assert_eq!(format_value(0.0), "0");
}

#[cfg(all(feature = "influx", feature = "mqtt"))]
#[test]
fn test_sink_config_from_json() {
    let config: SinkConfig = serde_json::from_str(
        r#"{ "kind": "mqtt", "broker": "localhost:1883", "client_id": "pi-one", "topic_root": "home/pi-one" }"#,
    )
    .unwrap();
    let SinkConfig::Mqtt(mqtt) = config else {
        panic!("expected an MQTT sink");
    };
    assert_eq!(mqtt.keep_alive_secs, 30);
    assert_eq!(mqtt.username, None);

    let config: SinkConfig = serde_json::from_str(
        r#"{ "kind": "line_protocol", "uri": "http://influx:8086", "database": "telemetry" }"#,
    )
    .unwrap();
    assert!(matches!(config, SinkConfig::LineProtocol(_)));

    assert!(serde_json::from_str::<SinkConfig>(r#"{ "kind": "carrier_pigeon" }"#).is_err());
}
