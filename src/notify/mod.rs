//! Notification formatting and delivery.
//!
//! [`NotificationPipeline`] is the per-post unit of work spawned by the
//! supervisor: fetch the author's profile, render the post, send it.

pub mod format;
pub mod slack;

use std::sync::Arc;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::{OutboundMessage, Post};
use crate::enricher::{ProfileEnricher, SharedSession};

pub use slack::SlackWebhook;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<()>;
}

/// Outcome of processing one matched post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Muted,
}

pub struct NotificationPipeline {
    enricher: ProfileEnricher,
    notifier: Arc<dyn Notifier>,
}

impl NotificationPipeline {
    pub fn new(enricher: ProfileEnricher, notifier: Arc<dyn Notifier>) -> Self {
        Self { enricher, notifier }
    }

    /// Enrich, render and send a single post. No retries.
    pub async fn process(&self, session: &SharedSession, post: &Post) -> Result<Delivery> {
        let Some(profile) = self.enricher.enrich(session, post).await? else {
            return Ok(Delivery::Muted);
        };

        let message = format::render(post, &profile);
        self.notifier.send(&message).await?;
        Ok(Delivery::Sent)
    }
}
