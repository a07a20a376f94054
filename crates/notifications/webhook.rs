use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::{AppointmentEvent, notifier::DeliveryProvider};

/// Posts each event as JSON to an outbound webhook (SMS/email relay).
pub struct WebhookProvider {
    webhook_url: Url,
    client: Client,
}

impl WebhookProvider {
    pub fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(3))
            .build()?;

        Ok(Self {
            webhook_url,
            client,
        })
    }
}

#[async_trait]
impl DeliveryProvider for WebhookProvider {
    async fn send(&self, event: &AppointmentEvent) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(event)
            .send()
            .await
            .map_err(sanitize_reqwest_error)?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(anyhow!(
            "notification webhook returned non-success status: {}",
            response.status()
        ))
    }

    fn provider_name(&self) -> &'static str {
        "webhook"
    }
}

/// Webhook URLs may carry tokens; keep them out of error messages.
fn sanitize_reqwest_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("notification webhook request timed out");
    }
    if error.is_connect() {
        return anyhow!("notification webhook connection failed");
    }
    anyhow!("notification webhook request failed")
}
