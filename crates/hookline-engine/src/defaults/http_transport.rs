//! reqwest-backed webhook transport.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::DispatchConfig;
use crate::errors::DeliveryError;
use crate::traits::WebhookTransport;

/// Default [`WebhookTransport`]: one shared `reqwest::Client` with a
/// per-request timeout and a fixed `User-Agent`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| DeliveryError::Transport {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    pub fn from_config(config: &DispatchConfig) -> Result<Self, DeliveryError> {
        Self::new(config.delivery_timeout, &config.user_agent)
    }

    /// Wrap an existing client, e.g. one with custom TLS settings.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
    ) -> Result<(), DeliveryError> {
        let started = Instant::now();

        let mut request = self.client.post(url).json(body);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DeliveryError::Timeout {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                }
            } else {
                DeliveryError::Transport {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status {
                status: status.as_u16(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(Duration::from_secs(5), "hookline-test").unwrap()
    }

    #[tokio::test]
    async fn posts_json_with_headers() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(header("user-agent", "hookline-test"))
            .and(header("X-Token", "abc"))
            .and(body_json(json!({"trigger_event": "LEAD_CREATED"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        transport()
            .post_json(
                &format!("{}/hook", server.uri()),
                &[("X-Token".into(), "abc".into())],
                &json!({"trigger_event": "LEAD_CREATED"}),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = transport()
            .post_json(&server.uri(), &[], &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Status { status: 500 }));
    }

    #[tokio::test]
    async fn client_error_status_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = transport()
            .post_json(&server.uri(), &[], &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Status { status: 404 }));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(Duration::from_millis(100), "hookline-test").unwrap();
        let err = transport
            .post_json(&server.uri(), &[], &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Timeout { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let err = transport()
            .post_json("http://127.0.0.1:1/hook", &[], &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Transport { .. }));
    }
}
