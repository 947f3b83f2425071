use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

/// One outbound message. The delivery API takes one call per recipient;
/// there is no batching.
#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Seam for the email-delivery collaborator, so fan-out tests can record
/// sends instead of talking to the network.
#[async_trait]
pub trait EmailDelivery: Send + Sync {
    async fn send(
        &self,
        message: &EmailMessage,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// HTTP email-delivery client (Resend-style JSON API).
#[derive(Clone)]
pub struct EmailService {
    client: Client,
    api_key: String,
    base_url: String,
}

impl EmailService {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl EmailDelivery for EmailService {
    async fn send(
        &self,
        message: &EmailMessage,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let url = format!("{}/emails", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(message)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("email API returned {status}: {body}").into());
        }

        Ok(())
    }
}
