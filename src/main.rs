use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use skyhook::app::{build_http_client, AppContext};
use skyhook::cli::Cli;
use skyhook::config::secrets::SetecStore;
use skyhook::config::{format_duration, Config, Inputs, Settings};
use skyhook::fetcher::websocket::WebSocketDialer;
use skyhook::supervisor::shutdown_signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    let config = Config::load(cli.config.as_deref())?;
    let http = build_http_client(&config.notify)?;

    let mut inputs = Inputs::from(&cli);
    if let Some(secrets_url) = cli.secrets_url() {
        let store = SetecStore::new(http.clone(), Url::parse(secrets_url)?);
        inputs.apply_secrets(&store).await?;
        info!(url = %secrets_url, "Fetched client secrets");
    }

    let settings = Settings::resolve(inputs, config)?;
    let ctx = AppContext::with_transport(settings, http, Arc::new(WebSocketDialer::new()))?;

    let stream = &ctx.settings.config.stream;
    info!(
        watch_word = %ctx.settings.watch_word,
        compressed = ctx.decoder.is_compressed(),
        reconnect_delay = %format_duration(stream.reconnect_delay),
        read_timeout = %format_duration(stream.read_timeout),
        "Starting skyhook"
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(()) => {
                info!("Received shutdown signal");
                signal_cancel.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for shutdown signals"),
        }
    });

    let supervisor = ctx.supervisor(cancel.clone());
    supervisor.run(ctx.endpoints(), &cancel).await;

    Ok(())
}
