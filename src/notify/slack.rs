//! Slack incoming-webhook delivery.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, error};
use url::Url;

use crate::app::{Result, SkyhookError};
use crate::domain::OutboundMessage;
use crate::notify::Notifier;

const FOOTER: &str = "Posted";

pub struct SlackWebhook {
    client: Client,
    webhook_url: Url,
}

impl SlackWebhook {
    pub fn new(client: Client, webhook_url: Url) -> Self {
        Self {
            client,
            webhook_url,
        }
    }

    fn payload(message: &OutboundMessage) -> SlackPayload<'_> {
        SlackPayload {
            unfurl_links: true,
            unfurl_media: true,
            attachments: vec![SlackAttachment {
                author_name: &message.author_line,
                author_icon: &message.author_icon,
                author_link: &message.author_link,
                text: &message.body_markup,
                image_url: message.image_url.as_deref(),
                footer: FOOTER,
                ts: message.posted_at_epoch_seconds.to_string(),
            }],
        }
    }
}

#[async_trait]
impl Notifier for SlackWebhook {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let payload = Self::payload(message);

        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            debug!(author = %message.author_line, "Notification sent");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        error!(
            status = status.as_u16(),
            body = %body,
            author = %message.author_line,
            "Slack webhook rejected notification"
        );
        Err(SkyhookError::Webhook {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Debug, Serialize)]
struct SlackPayload<'a> {
    unfurl_links: bool,
    unfurl_media: bool,
    attachments: Vec<SlackAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment<'a> {
    author_name: &'a str,
    author_icon: &'a str,
    author_link: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
    footer: &'a str,
    ts: String,
}
