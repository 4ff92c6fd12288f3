//! # Skyhook
//!
//! Relays Bluesky posts that mention a watch-word to a Slack webhook.
//!
//! ## Architecture
//!
//! Skyhook is a single long-running pipeline:
//!
//! ```text
//! Jetstream → Decoder → Dispatcher → Enricher → Formatter → Slack
//! ```
//!
//! - [`fetcher`]: WebSocket feed connections and the bounded dispatch pool
//! - [`decoder`]: Decompresses, parses and filters firehose frames
//! - [`enricher`]: Looks up post authors on the PDS
//! - [`notify`]: Renders posts as Slack attachments and delivers them
//! - [`supervisor`]: Keeps a feed connection alive across failures
//!
//! ## Quick Start
//!
//! ```bash
//! export BSKY_HANDLE=relay.bsky.social
//! export BSKY_APP_PASSWORD=xxxx-xxxx-xxxx-xxxx
//! export SLACK_WEBHOOK_URL=https://hooks.slack.com/services/...
//!
//! skyhook --watch-word tailscale
//! ```
//!
//! ## Modules
//!
//! - [`app`]: Application context and error types
//! - [`cli`]: Command-line interface definitions
//! - [`config`]: Tunables file, settings validation, secret store
//! - [`domain`]: Core domain models (FeedEvent, Post, Profile, OutboundMessage)
//! - [`richtext`]: Facet segmentation and Slack markup

/// Application context and error handling.
///
/// [`AppContext`](app::AppContext) wires together the dialer, profile API,
/// webhook and decoder from validated settings.
pub mod app;

/// Command-line interface using clap.
///
/// Every flag also reads an environment variable.
pub mod cli;

/// Configuration management.
///
/// Loads tunables from `~/.config/skyhook/config.toml` and resolves flags,
/// environment and remote secrets into [`Settings`](config::Settings).
pub mod config;

/// Frame decoding and post filtering.
pub mod decoder;

/// Core domain models.
///
/// - [`FeedEvent`](domain::FeedEvent): One Jetstream message
/// - [`Post`](domain::Post): A create commit that passed the filters
/// - [`Profile`](domain::Profile): Normalized author details
/// - [`OutboundMessage`](domain::OutboundMessage): What gets posted to Slack
pub mod domain;

/// Author profile lookup over XRPC.
pub mod enricher;

/// Feed connections and concurrent delivery.
///
/// - [`FeedDialer`](fetcher::FeedDialer): Async trait for opening feeds
/// - [`WebSocketDialer`](fetcher::websocket::WebSocketDialer): tokio-tungstenite implementation
/// - [`Dispatcher`](fetcher::parallel::Dispatcher): Bounded concurrent delivery with a semaphore
pub mod fetcher;

/// Notification formatting and Slack delivery.
pub mod notify;

/// Rich-text segmentation of post text by facets.
pub mod richtext;

/// Connection supervision: dial, stream, reconnect.
pub mod supervisor;
