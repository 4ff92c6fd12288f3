use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use crate::app::{Result, SkyhookError};
use crate::fetcher::{FeedDialer, FrameStream};

/// Request header Jetstream reads to enable zstd frames.
const SOCKET_ENCODING: &str = "socket-encoding";

/// Dials feeds over the host network with tokio-tungstenite.
#[derive(Debug, Clone, Default)]
pub struct WebSocketDialer;

impl WebSocketDialer {
    pub fn new() -> Self {
        Self
    }
}

pub struct WebSocketFrames {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedDialer for WebSocketDialer {
    async fn dial(&self, url: &Url, compressed: bool) -> Result<Box<dyn FrameStream>> {
        let mut request = url.as_str().into_client_request()?;
        if compressed {
            request
                .headers_mut()
                .insert(SOCKET_ENCODING, HeaderValue::from_static("zstd"));
        }

        let (inner, response) = connect_async(request)
            .await
            .map_err(|e| SkyhookError::Dial {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        debug!(status = %response.status(), "WebSocket handshake complete");

        Ok(Box::new(WebSocketFrames { inner }))
    }
}

#[async_trait]
impl FrameStream for WebSocketFrames {
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(message) = self.inner.next().await {
            match message? {
                Message::Text(text) => return Ok(Some(text.as_bytes().to_vec())),
                Message::Binary(data) => return Ok(Some(data.to_vec())),
                Message::Close(frame) => {
                    debug!(?frame, "Server closed the stream");
                    return Ok(None);
                }
                // Pongs are queued by tungstenite while reading.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
        Ok(None)
    }

    async fn close(&mut self) {
        if let Err(e) = self.inner.close(None).await {
            debug!(error = %e, "Error closing WebSocket");
        }
    }
}
