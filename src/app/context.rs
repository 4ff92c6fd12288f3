use std::sync::Arc;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::app::error::Result;
use crate::config::{NotifyConfig, Settings};
use crate::decoder::EventDecoder;
use crate::enricher::bsky::XrpcClient;
use crate::enricher::{ProfileApi, ProfileEnricher};
use crate::fetcher::parallel::Dispatcher;
use crate::fetcher::websocket::WebSocketDialer;
use crate::fetcher::FeedDialer;
use crate::notify::{NotificationPipeline, Notifier, SlackWebhook};
use crate::supervisor::{EndpointRotation, Supervisor};

const USER_AGENT: &str = concat!("skyhook/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for the PDS, the webhook and the secret store.
pub fn build_http_client(config: &NotifyConfig) -> Result<Client> {
    let client = Client::builder()
        .timeout(config.request_timeout)
        .gzip(true)
        .brotli(true)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Every collaborator the relay needs, built from validated settings.
pub struct AppContext {
    pub settings: Settings,
    pub dialer: Arc<dyn FeedDialer>,
    pub profiles: Arc<dyn ProfileApi>,
    pub notifier: Arc<dyn Notifier>,
    pub decoder: Arc<EventDecoder>,
}

impl AppContext {
    pub fn new(settings: Settings) -> Result<Self> {
        let http = build_http_client(&settings.config.notify)?;
        Self::with_transport(settings, http, Arc::new(WebSocketDialer::new()))
    }

    /// Wire the context over a caller-supplied HTTP client and feed dialer.
    pub fn with_transport(
        settings: Settings,
        http: Client,
        dialer: Arc<dyn FeedDialer>,
    ) -> Result<Self> {
        let mut decoder =
            EventDecoder::new(&settings.watch_word, settings.config.filter.max_post_age);
        if let Some(dictionary) = settings.load_dictionary()? {
            decoder = decoder.with_dictionary(&dictionary);
        }

        let profiles: Arc<dyn ProfileApi> =
            Arc::new(XrpcClient::new(http.clone(), settings.server_url.clone()));
        let notifier: Arc<dyn Notifier> =
            Arc::new(SlackWebhook::new(http, settings.webhook_url.clone()));

        Ok(Self {
            settings,
            dialer,
            profiles,
            notifier,
            decoder: Arc::new(decoder),
        })
    }

    pub fn endpoints(&self) -> EndpointRotation {
        self.settings.endpoints()
    }

    /// A supervisor whose dispatched work stops when `cancel` fires.
    pub fn supervisor(&self, cancel: CancellationToken) -> Supervisor {
        let notify = &self.settings.config.notify;
        let enricher =
            ProfileEnricher::with_default_avatar(self.profiles.clone(), &notify.default_avatar_url);
        let pipeline = NotificationPipeline::new(enricher, self.notifier.clone());
        let dispatcher = Dispatcher::with_limit(Arc::new(pipeline), notify.max_in_flight, cancel);

        Supervisor::new(
            self.settings.config.supervisor(),
            self.settings.credentials.clone(),
            self.dialer.clone(),
            self.profiles.clone(),
            self.decoder.clone(),
            dispatcher,
        )
    }
}
