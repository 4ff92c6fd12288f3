use serde::Serialize;

/// A fully rendered notification, built once and sent once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub body_markup: String,
    pub author_line: String,
    pub author_link: String,
    pub author_icon: String,
    pub image_url: Option<String>,
    pub posted_at_epoch_seconds: i64,
}
