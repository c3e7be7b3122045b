use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::info;

use billroute_core::config::DownstreamConfig;
use billroute_core::domain::invoice::InvoiceId;
use billroute_core::downstream::{DownstreamApprover, DownstreamError};

#[derive(Debug, Serialize)]
struct ApprovedInvoice<'a> {
    invoice_id: &'a str,
    purchase_order_number: Option<&'a str>,
}

/// Posts fully approved invoices to an HTTP endpoint as JSON.
pub struct WebhookApprover {
    client: Client,
    url: String,
    auth_token: Option<SecretString>,
}

impl WebhookApprover {
    pub fn new(
        url: impl Into<String>,
        auth_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, DownstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| DownstreamError::Transport(error.to_string()))?;
        Ok(Self { client, url: url.into(), auth_token })
    }

    /// `None` when no webhook URL is configured.
    pub fn from_config(config: &DownstreamConfig) -> Result<Option<Self>, DownstreamError> {
        config
            .webhook_url
            .as_deref()
            .map(|url| {
                Self::new(
                    url,
                    config.auth_token.clone(),
                    Duration::from_secs(config.timeout_secs.max(1)),
                )
            })
            .transpose()
    }
}

#[async_trait]
impl DownstreamApprover for WebhookApprover {
    async fn approve_pending_invoice(
        &self,
        invoice_id: &InvoiceId,
        purchase_order_number: Option<&str>,
    ) -> Result<(), DownstreamError> {
        let body = ApprovedInvoice { invoice_id: &invoice_id.0, purchase_order_number };
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| DownstreamError::Transport(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DownstreamError::Rejected { status: status.as_u16(), body });
        }

        info!(
            event_name = "downstream.approve.delivered",
            invoice_id = %invoice_id,
            status = status.as_u16(),
            "approved invoice delivered to webhook"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use billroute_core::config::DownstreamConfig;

    use super::WebhookApprover;

    #[test]
    fn no_url_means_no_webhook() {
        let config = DownstreamConfig { webhook_url: None, auth_token: None, timeout_secs: 5 };
        assert!(WebhookApprover::from_config(&config).expect("build").is_none());

        let config = DownstreamConfig {
            webhook_url: Some("http://127.0.0.1:9/approve".to_string()),
            auth_token: Some("token".to_string().into()),
            timeout_secs: 5,
        };
        let approver = WebhookApprover::from_config(&config).expect("build").expect("configured");
        assert_eq!(approver.url, "http://127.0.0.1:9/approve");
    }
}
