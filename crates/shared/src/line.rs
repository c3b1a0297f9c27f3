use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::config::LineCredentials;

pub const LINE_API_BASE: &str = "https://api.line.me";

/// LINE Messaging API errors
#[derive(Debug, Error)]
pub enum LineError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// LINE rejected the push
    #[error("LINE API error: {status} - {body}")]
    Api { status: u16, body: String },
}

/// Push-message client for a single recipient
pub struct LineClient {
    client: Client,
    channel_access_token: String,
    user_id: String,
    base_url: String,
}

impl LineClient {
    pub fn new(credentials: LineCredentials) -> Result<Self, LineError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            channel_access_token: credentials.channel_access_token,
            user_id: credentials.user_id,
            base_url: LINE_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Push one text message to the configured user
    pub async fn push_text(&self, text: &str) -> Result<(), LineError> {
        let url = format!("{}/v2/bot/message/push", self.base_url);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.channel_access_token)
            .json(&json!({
                "to": self.user_id,
                "messages": [{"type": "text", "text": text}]
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LineError::Api {
                status: status.as_u16(),
                body,
            });
        }

        info!("LINE push delivered ({} chars)", text.chars().count());
        Ok(())
    }
}
