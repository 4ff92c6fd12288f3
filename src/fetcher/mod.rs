pub mod parallel;
pub mod websocket;

use async_trait::async_trait;
use url::Url;

use crate::app::Result;

/// A connected feed that yields one raw frame per event.
#[async_trait]
pub trait FrameStream: Send {
    /// Next data frame, or `None` once the server has closed the stream.
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>>;

    async fn close(&mut self);
}

/// Opens feed connections. Implementations decide the network transport.
#[async_trait]
pub trait FeedDialer: Send + Sync {
    /// `compressed` asks the server for zstd-encoded frames.
    async fn dial(&self, url: &Url, compressed: bool) -> Result<Box<dyn FrameStream>>;
}
