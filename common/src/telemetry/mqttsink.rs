use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use tempsense_model::{DeliveryError, Measurement, TelemetrySink};

use super::{format_value, ConnectError};

/// Settings for publishing to an MQTT broker.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct MqttConfig {
    /// `host:port` of the broker.
    pub broker: String,
    pub client_id: String,
    pub topic_root: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_keep_alive_secs() -> u64 {
    30
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("expected host:port, got {0:?}")]
pub struct BrokerAddressError(pub String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl FromStr for BrokerAddress {
    type Err = BrokerAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || BrokerAddressError(s.to_string());

        let (host, port) = s.rsplit_once(':').ok_or_else(error)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(error());
        }

        Ok(Self {
            host: host.to_string(),
            port: port.parse().map_err(|_| error())?,
        })
    }
}

impl MqttConfig {
    pub fn broker_address(&self) -> Result<BrokerAddress, BrokerAddressError> {
        self.broker.parse()
    }
}

/// One message as it goes onto the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
    pub retain: bool,
}

impl MqttMessage {
    /// Retained, exactly-once message on `<root>/<lowercased name>`.
    pub fn for_measurement(topic_root: &str, measurement: &Measurement) -> Self {
        Self {
            topic: format!(
                "{}/{}",
                topic_root.trim_end_matches('/'),
                measurement.name.to_lowercase()
            ),
            payload: format_value(measurement.value),
            qos: QoS::ExactlyOnce,
            retain: true,
        }
    }
}

/// Publishes every measurement as its own retained message over one persistent session.
///
/// The session is opened once in [`MqttSink::connect`]. A background task keeps polling the
/// client's event loop; that is where the client library reconnects after the broker went away.
/// The task also tracks whether the session is up, and publishing while it is down fails right
/// away instead of queueing messages the broker will never see.
pub struct MqttSink {
    client: AsyncClient,
    topic_root: String,
    connected: Arc<AtomicBool>,
    driver: JoinHandle<()>,
}

impl MqttSink {
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    const RECONNECT_DELAY: Duration = Duration::from_secs(5);
    const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);
    const CHANNEL_CAPACITY: usize = 10;

    pub async fn connect(config: &MqttConfig) -> Result<Self, ConnectError> {
        let address = config.broker_address()?;

        let mut options = MqttOptions::new(&config.client_id, address.host, address.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.clone().unwrap_or_default());
        }

        let (client, mut eventloop) = AsyncClient::new(options, Self::CHANNEL_CAPACITY);

        tokio::time::timeout(Self::CONNECT_TIMEOUT, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| ConnectError::Timeout(Self::CONNECT_TIMEOUT))??;
        log::info!("Connected to MQTT broker {}", config.broker);

        let connected = Arc::new(AtomicBool::new(true));
        let driver = tokio::spawn(drive(eventloop, connected.clone()));

        Ok(Self {
            client,
            topic_root: config.topic_root.clone(),
            connected,
            driver,
        })
    }

    /// Whether the broker currently acknowledges the session.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Disconnects from the broker and stops the event loop.
    ///
    /// Never waits on the broker: with the session down the event loop is stopped outright.
    pub async fn close(mut self) {
        if let Err(e) = self.client.try_disconnect() {
            log::warn!("Failed to disconnect from MQTT broker: {}", e);
        }
        if tokio::time::timeout(Self::CLOSE_TIMEOUT, &mut self.driver)
            .await
            .is_err()
        {
            self.driver.abort();
        }
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), ConnectError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

async fn drive(mut eventloop: EventLoop, connected: Arc<AtomicBool>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                log::info!("Reconnected to MQTT broker");
                connected.store(true, Ordering::SeqCst);
            }
            Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) => {
                log::debug!("MQTT session closed");
                connected.store(false, Ordering::SeqCst);
                break;
            }
            Ok(event) => log::trace!("MQTT event: {:?}", event),
            Err(e) => {
                log::error!("MQTT connection error: {}", e);
                connected.store(false, Ordering::SeqCst);
                tokio::time::sleep(MqttSink::RECONNECT_DELAY).await;
            }
        }
    }
}

impl TelemetrySink for MqttSink {
    async fn publish(&mut self, measurements: &[Measurement; 2]) -> Result<(), DeliveryError> {
        if !self.is_connected() {
            return Err(DeliveryError::Broker("not connected".into()));
        }

        let mut result = Ok(());

        // The messages are independent, a failure on one does not hold back the other.
        // A full request queue means the event loop is stuck, so never wait for room.
        for measurement in measurements {
            let message = MqttMessage::for_measurement(&self.topic_root, measurement);
            log::debug!("-> {} {}", message.topic, message.payload);

            if let Err(e) =
                self.client
                    .try_publish(message.topic, message.qos, message.retain, message.payload)
            {
                if result.is_ok() {
                    result = Err(DeliveryError::Broker(e.to_string()));
                }
            }
        }

        result
    }
}
