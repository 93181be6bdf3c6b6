use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

use tempsense_model::{DeliveryError, Measurement, TelemetrySink};

use super::lineprotocol;

/// Settings for writing to an InfluxDB compatible `/write` endpoint.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct LineProtocolConfig {
    pub uri: String,
    pub database: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{uri:?} is not usable: {reason}")]
pub struct EndpointError {
    pub uri: String,
    pub reason: String,
}

impl LineProtocolConfig {
    /// The full URL write requests are sent to.
    pub fn write_url(&self) -> Result<Url, EndpointError> {
        let error = |reason: &str| EndpointError {
            uri: self.uri.clone(),
            reason: reason.to_string(),
        };

        let base = Url::parse(&self.uri).map_err(|e| error(&e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(error("scheme must be http or https"));
        }

        let write = format!("{}/write", base.as_str().trim_end_matches('/'));
        Url::parse(&write).map_err(|e| error(&e.to_string()))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Writes each batch with a single authenticated HTTP request.
///
/// A failed batch is dropped; the next cycle writes fresh values.
pub struct LineProtocolSink {
    client: reqwest::Client,
    write_url: Url,
    database: String,
    credentials: Option<(String, String)>,
}

impl LineProtocolSink {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(config: &LineProtocolConfig) -> Result<Self, super::ConnectError> {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()?;

        let credentials = match (&config.username, &config.password) {
            (Some(username), Some(password)) => Some((username.clone(), password.clone())),
            (Some(username), None) => Some((username.clone(), String::new())),
            _ => None,
        };

        Ok(Self {
            client,
            write_url: config.write_url()?,
            database: config.database.clone(),
            credentials,
        })
    }

    fn query(&self) -> Vec<(&str, &str)> {
        let mut query = vec![("db", self.database.as_str())];
        if let Some((username, password)) = &self.credentials {
            query.push(("u", username.as_str()));
            query.push(("p", password.as_str()));
        }
        query
    }
}

/// Prefers the `error` field InfluxDB puts into its JSON error bodies.
fn error_message(body: &str, reason: Option<&str>) -> String {
    let body = body.trim();
    if body.is_empty() {
        return reason.unwrap_or("no reason given").to_string();
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.to_string())
}

impl TelemetrySink for LineProtocolSink {
    async fn publish(&mut self, measurements: &[Measurement; 2]) -> Result<(), DeliveryError> {
        let payload = lineprotocol::encode_batch(measurements);

        let response = self
            .client
            .post(self.write_url.clone())
            .query(&self.query())
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            log::debug!("<- {}", status);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            message: error_message(&body, status.canonical_reason()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode, routing::post, Router};
    use std::collections::HashMap;
    use tempsense_model::PipelineState;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    type Captured = (HashMap<String, String>, String);

    /// Serves `/write` on an ephemeral port, answering with `status` and `body`.
    async fn serve(
        status: StatusCode,
        body: &'static str,
    ) -> (String, mpsc::UnboundedReceiver<Captured>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let app = Router::new().route(
            "/write",
            post(move |Query(query): Query<HashMap<String, String>>, payload: String| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send((query, payload));
                    (status, body)
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (format!("http://{addr}/"), rx)
    }

    fn config(uri: String) -> LineProtocolConfig {
        LineProtocolConfig {
            uri,
            database: "telemetry".into(),
            username: Some("pi".into()),
            password: Some("secret".into()),
        }
    }

    fn measurements() -> [Measurement; 2] {
        let state = PipelineState {
            temperature: 72.5,
            humidity: 41.0,
        };
        Measurement::pair(&state, "Pi-One")
    }

    #[tokio::test]
    async fn test_write_batch() {
        let (uri, mut requests) = serve(StatusCode::NO_CONTENT, "").await;
        let mut sink = LineProtocolSink::new(&config(uri)).unwrap();

        sink.publish(&measurements()).await.unwrap();

        let (query, payload) = requests.recv().await.unwrap();
        assert_eq!(query["db"], "telemetry");
        assert_eq!(query["u"], "pi");
        assert_eq!(query["p"], "secret");
        assert_eq!(
            payload,
            "°F,entity_id=Pi-One Temperature=72.5\n%,entity_id=Pi-One Humidity=41"
        );
    }

    #[tokio::test]
    async fn test_rejected_write_carries_server_message() {
        let (uri, _requests) =
            serve(StatusCode::UNAUTHORIZED, r#"{"error":"authorization failed"}"#).await;
        let mut sink = LineProtocolSink::new(&config(uri)).unwrap();

        let error = sink.publish(&measurements()).await.unwrap_err();

        assert_eq!(
            error,
            DeliveryError::Rejected {
                status: 401,
                message: "authorization failed".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let mut sink = LineProtocolSink::new(&config("http://127.0.0.1:1/".into())).unwrap();

        let error = sink.publish(&measurements()).await.unwrap_err();
        assert!(matches!(error, DeliveryError::Transport(_)));
    }

    #[test]
    fn test_write_url() {
        let url = config("http://influx:8086".into()).write_url().unwrap();
        assert_eq!(url.as_str(), "http://influx:8086/write");

        let url = config("https://example.com/influx/".into()).write_url().unwrap();
        assert_eq!(url.as_str(), "https://example.com/influx/write");

        assert!(config("influx:8086".into()).write_url().is_err());
        assert!(config("not a uri".into()).write_url().is_err());
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message("", Some("Not Found")), "Not Found");
        assert_eq!(error_message("database not found", None), "database not found");
        assert_eq!(error_message(r#"{"error":"bad"}"#, None), "bad");
    }
}
