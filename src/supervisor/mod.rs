//! Feed connection lifecycle.
//!
//! The supervisor dials a Jetstream endpoint, logs in to the PDS, and reads
//! frames until the connection fails. Each frame is decoded in arrival
//! order; matches are handed to the [`Dispatcher`] and the read loop moves
//! on immediately. Any connection error ends the connection, and after a
//! fixed delay the next endpoint in the rotation is dialed. The loop only
//! stops when the cancellation token fires.

pub mod endpoints;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::app::{Result, SkyhookError};
use crate::decoder::{frame_preview, EventDecoder, Verdict};
use crate::enricher::{ProfileApi, SharedSession};
use crate::fetcher::parallel::Dispatcher;
use crate::fetcher::{FeedDialer, FrameStream};

pub use endpoints::{subscribe_url, EndpointRotation, DEFAULT_COLLECTION, PUBLIC_JETSTREAMS};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Fixed wait between a failed connection and the next dial.
    pub reconnect_delay: Duration,
    /// Longest wait for a single frame before the connection is dropped.
    pub read_timeout: Duration,
    pub collection: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            read_timeout: DEFAULT_READ_TIMEOUT,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

/// Account used to log in to the PDS.
#[derive(Clone)]
pub struct Credentials {
    pub handle: String,
    pub app_password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("handle", &self.handle)
            .field("app_password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Dialing,
    Streaming,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Dialing => "dialing",
            ConnectionState::Streaming => "streaming",
        };
        f.write_str(s)
    }
}

/// Counters for one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames: u64,
    pub matched: u64,
    pub ignored: u64,
    pub frame_errors: u64,
    pub dropped: u64,
}

pub struct Supervisor {
    config: SupervisorConfig,
    credentials: Credentials,
    dialer: Arc<dyn FeedDialer>,
    profiles: Arc<dyn ProfileApi>,
    decoder: Arc<EventDecoder>,
    dispatcher: Dispatcher,
}

impl Supervisor {
    pub fn new(
        config: SupervisorConfig,
        credentials: Credentials,
        dialer: Arc<dyn FeedDialer>,
        profiles: Arc<dyn ProfileApi>,
        decoder: Arc<EventDecoder>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            config,
            credentials,
            dialer,
            profiles,
            decoder,
            dispatcher,
        }
    }

    /// Connects, streams and reconnects until `cancel` fires. Returns the
    /// rotation so the caller keeps the endpoint cursor.
    pub async fn run(
        &self,
        mut endpoints: EndpointRotation,
        cancel: &CancellationToken,
    ) -> EndpointRotation {
        while !cancel.is_cancelled() {
            let endpoint = endpoints.next_endpoint();

            match self.connect_and_stream(&endpoint, cancel).await {
                Ok(stats) => {
                    info!(endpoint = %endpoint, ?stats, "Connection finished");
                }
                Err(_) if cancel.is_cancelled() => break,
                Err(e) => {
                    error!(
                        endpoint = %endpoint,
                        error = %e,
                        connection_error = e.is_connection_error(),
                        state = %ConnectionState::Disconnected,
                        "Feed connection failed"
                    );
                }
            }

            info!(delay = ?self.config.reconnect_delay, "Reconnecting");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }

        info!("Supervisor stopped");
        endpoints
    }

    /// One connection attempt: dial, log in, stream until failure.
    ///
    /// Always ends in an error unless cancelled mid-stream, in which case
    /// the counters gathered so far are returned.
    pub async fn connect_and_stream(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
    ) -> Result<StreamStats> {
        let url = subscribe_url(endpoint, &self.config.collection)?;
        info!(url = %url, state = %ConnectionState::Dialing, "Connecting to feed");

        let mut stream = tokio::select! {
            _ = cancel.cancelled() => return Err(SkyhookError::Cancelled),
            dialed = self.dialer.dial(&url, self.decoder.is_compressed()) => dialed?,
        };

        let login = tokio::select! {
            _ = cancel.cancelled() => Err(SkyhookError::Cancelled),
            login = self.profiles.login(&self.credentials.handle, &self.credentials.app_password) => login,
        };
        let session = match login {
            Ok(session) => SharedSession::new(session),
            Err(e) => {
                stream.close().await;
                return Err(e);
            }
        };

        info!(url = %url, state = %ConnectionState::Streaming, "Streaming posts");
        let mut stats = StreamStats::default();
        let result = self
            .stream_frames(stream.as_mut(), &session, &mut stats, cancel)
            .await;
        stream.close().await;

        info!(
            frames = stats.frames,
            matched = stats.matched,
            ignored = stats.ignored,
            frame_errors = stats.frame_errors,
            dropped = stats.dropped,
            "Connection closed"
        );

        match result {
            Err(SkyhookError::Cancelled) => Ok(stats),
            Err(e) => Err(e),
            Ok(()) => Ok(stats),
        }
    }

    async fn stream_frames(
        &self,
        stream: &mut dyn FrameStream,
        session: &SharedSession,
        stats: &mut StreamStats,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let read_timeout = self.config.read_timeout;

        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => return Err(SkyhookError::Cancelled),
                read = tokio::time::timeout(read_timeout, stream.next_frame()) => match read {
                    Err(_) => return Err(SkyhookError::ReadTimeout(read_timeout)),
                    Ok(Err(e)) => return Err(e),
                    Ok(Ok(None)) => return Err(SkyhookError::ConnectionClosed),
                    Ok(Ok(Some(frame))) => frame,
                },
            };

            self.handle_frame(&frame, session, stats);
        }
    }

    /// Decodes a frame and dispatches it on a match. Never fails: frame
    /// errors are logged and counted.
    pub fn handle_frame(&self, frame: &[u8], session: &SharedSession, stats: &mut StreamStats) {
        stats.frames += 1;

        match self.decoder.decode(frame, Utc::now()) {
            Ok(Verdict::Matched(post)) => {
                stats.matched += 1;
                debug!(author = %post.author_did, record_key = %post.record_key, "Matched post");
                if self.dispatcher.dispatch(post, session.clone()).is_none() {
                    stats.dropped += 1;
                }
            }
            Ok(Verdict::Ignored(reason)) => {
                stats.ignored += 1;
                trace!(?reason, "Ignored event");
            }
            Err(e) => {
                stats.frame_errors += 1;
                warn!(error = %e, frame = %frame_preview(frame), "Dropped unreadable frame");
            }
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {},
        _ = sigint.recv() => {},
    }
    Ok(())
}

/// Resolves on Ctrl-C.
#[cfg(not(unix))]
pub async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
