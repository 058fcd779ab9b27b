
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::config::{Config, REQUEST_TIMEOUT_SECONDS};
use crate::{ChatError, Result, UpstreamStage};

/// Dispatcher for the two transactional emails in the token lifecycle: the
/// redemption link at issuance, and the operator notice on first download.
/// Each send is a single fire-and-forget call to the email service; the
/// caller decides whether a failure is fatal (issuance) or merely logged
/// (first download).
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    api_base: Url,
    api_key: String,
    from_address: String,
    operator_address: String,
    public_base_url: String,
    ttl_hours: i64,
    client: Client,
}

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl NotificationDispatcher {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_base = Url::parse(&config.email.api_base)
            .map_err(|e| ChatError::Config(format!("Invalid email API base: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;

        Ok(Self {
            api_base,
            api_key: config.email.api_key.clone(),
            from_address: config.email.from_address.clone(),
            operator_address: config.email.operator_address.clone(),
            public_base_url: config.server.public_base_url.clone(),
            ttl_hours: config.tokens.ttl_hours,
            client,
        })
    }

    /// Email the requester their redemption link. A failure here must abort
    /// the surrounding request: the caller may not report a token as issued
    /// when no link was delivered.
    #[inline]
    pub async fn send_issued(&self, email: &str, token: &str) -> Result<()> {
        let link = format!("{}/download/cv?token={}", self.public_base_url, token);
        let body = format!(
            "Hi,\n\nYour CV download link is ready:\n\n{}\n\nThe link is valid for {} hours.\n",
            link, self.ttl_hours
        );

        self.send(email, "Your CV download link", &body).await?;
        debug!("Sent issuance email");
        Ok(())
    }

    /// Tell the operator a token was redeemed for the first time.
    #[inline]
    pub async fn send_first_download(
        &self,
        email: &str,
        file_name: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let body = format!(
            "First download of {} by {} at {}.\n",
            file_name,
            email,
            at.to_rfc3339()
        );

        self.send(&self.operator_address, "CV downloaded", &body)
            .await?;
        debug!("Sent first-download notification");
        Ok(())
    }

    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<()> {
        let url = self
            .api_base
            .join("emails")
            .map_err(|e| ChatError::Config(format!("Failed to build email URL: {}", e)))?;

        let request = EmailRequest {
            from: &self.from_address,
            to,
            subject,
            text,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response
                .text()
                .await
                .map_err(|e| ChatError::Network(e.to_string()))?;
            Err(ChatError::Upstream {
                stage: UpstreamStage::Email,
                status: status.as_u16(),
                body,
            })
        }
    }
}
