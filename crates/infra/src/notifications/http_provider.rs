//! HTTP delivery provider
//!
//! Registers reminders with a remote delivery service:
//! - `POST {endpoint}/deliveries` with the delivery as JSON, answered by
//!   `{"reference": "..."}`
//! - `DELETE {endpoint}/deliveries/{reference}` to cancel; `404` and `410`
//!   mean the delivery is already gone and count as success.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use slotflow_core::workflows::NotificationProvider;
use slotflow_domain::{NotificationConfig, Result, ScheduledDelivery, SlotflowError};
use tracing::{debug, instrument};
use url::Url;

use crate::errors::InfraError;
use crate::http::HttpClient;

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    reference: String,
}

/// Notification provider backed by the delivery service's REST API.
pub struct HttpNotificationProvider {
    client: HttpClient,
    base_url: Url,
}

impl HttpNotificationProvider {
    /// # Errors
    /// Returns `SlotflowError::Config` when `endpoint` is not an absolute
    /// http(s) URL.
    pub fn new(endpoint: &str, client: HttpClient) -> Result<Self> {
        let base_url = Url::parse(endpoint)
            .map_err(|e| SlotflowError::Config(format!("Invalid notifications endpoint: {e}")))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(SlotflowError::Config(format!(
                "Notifications endpoint must be an http(s) URL: {endpoint}"
            )));
        }
        Ok(Self { client, base_url })
    }

    /// Build the provider from configuration. `None` when no endpoint is
    /// configured.
    pub fn from_config(config: &NotificationConfig) -> Result<Option<Self>> {
        let Some(endpoint) = config.endpoint.as_deref() else {
            return Ok(None);
        };

        let mut builder = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .max_attempts(config.max_attempts);
        if let Some(token) = config.api_token.as_deref() {
            builder = builder.bearer_token(token);
        }

        Self::new(endpoint, builder.build()?).map(Some)
    }

    fn deliveries_url(&self, reference: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                SlotflowError::Config("Notifications endpoint cannot be a base URL".into())
            })?;
            segments.pop_if_empty().push("deliveries");
            if let Some(reference) = reference {
                segments.push(reference);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl NotificationProvider for HttpNotificationProvider {
    #[instrument(skip(self, delivery), fields(reminder_id = %delivery.reminder_id, channel = %delivery.channel))]
    async fn schedule(&self, delivery: &ScheduledDelivery) -> Result<String> {
        let url = self.deliveries_url(None)?;
        let response =
            self.client.send(self.client.request(Method::POST, url).json(delivery)).await?;

        let response = ensure_success(response).await?;
        let body: ScheduleResponse =
            response.json().await.map_err(|e| SlotflowError::from(InfraError::from(e)))?;

        debug!(reference = %body.reference, "delivery registered");
        Ok(body.reference)
    }

    #[instrument(skip(self))]
    async fn cancel(&self, provider_reference: &str) -> Result<()> {
        let url = self.deliveries_url(Some(provider_reference))?;
        let response = self.client.send(self.client.request(Method::DELETE, url)).await?;

        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::GONE) {
            debug!("delivery already gone");
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = body.trim();
    Err(SlotflowError::Provider(if detail.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {detail}")
    }))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use slotflow_domain::DeliveryChannel;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn delivery() -> ScheduledDelivery {
        ScheduledDelivery {
            reminder_id: Uuid::nil(),
            channel: DeliveryChannel::Sms,
            recipient: "+15550100".into(),
            sender: "Slotflow".into(),
            subject: None,
            body: "Reminder: Intro".into(),
            fire_at: Utc.with_ymd_and_hms(2030, 1, 2, 9, 0, 0).unwrap(),
            include_calendar_event: false,
        }
    }

    fn provider(server: &MockServer, suffix: &str) -> HttpNotificationProvider {
        let client = HttpClient::builder()
            .max_attempts(2)
            .base_backoff(Duration::from_millis(5))
            .bearer_token("provider-token")
            .build()
            .expect("client");
        HttpNotificationProvider::new(&format!("{}{suffix}", server.uri()), client)
            .expect("provider")
    }

    #[tokio::test]
    async fn schedule_posts_delivery_and_returns_reference() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/deliveries"))
            .and(header("authorization", "Bearer provider-token"))
            .and(body_partial_json(serde_json::json!({
                "channel": "SMS",
                "recipient": "+15550100",
                "fireAt": "2030-01-02T09:00:00Z"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "reference": "dlv_123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reference = provider(&server, "/v1").schedule(&delivery()).await.expect("scheduled");
        assert_eq!(reference, "dlv_123");
    }

    #[tokio::test]
    async fn schedule_rejection_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("recipient not verified"))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider(&server, "").schedule(&delivery()).await.unwrap_err();
        match err {
            SlotflowError::Provider(msg) => assert!(msg.contains("recipient not verified")),
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_deletes_by_reference() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/deliveries/dlv_123"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        provider(&server, "/v1/").cancel("dlv_123").await.expect("cancelled");
    }

    #[tokio::test]
    async fn cancel_treats_missing_delivery_as_done() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        provider(&server, "").cancel("dlv_gone").await.expect("already gone");
    }

    #[tokio::test]
    async fn cancel_server_failure_is_reported_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let err = provider(&server, "").cancel("dlv_123").await.unwrap_err();
        assert!(matches!(err, SlotflowError::Provider(_)), "got {err:?}");
    }

    #[test]
    fn endpoint_must_be_http() {
        let client = HttpClient::builder().build().expect("client");
        let result = HttpNotificationProvider::new("mailto:ops@example.com", client);
        assert!(matches!(result, Err(SlotflowError::Config(_))));
    }

    #[test]
    fn from_config_without_endpoint_is_none() {
        let config = NotificationConfig::default();
        assert!(HttpNotificationProvider::from_config(&config).expect("config").is_none());
    }
}
