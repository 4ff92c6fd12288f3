use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{links, Post};
use crate::enricher::SharedSession;
use crate::notify::{Delivery, NotificationPipeline};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Runs matched posts through the notification pipeline concurrently,
/// with at most `max_in_flight` deliveries outstanding.
///
/// Dispatch never waits. A post that arrives while every slot is busy is
/// dropped.
#[derive(Clone)]
pub struct Dispatcher {
    pipeline: Arc<NotificationPipeline>,
    semaphore: Arc<Semaphore>,
    max_in_flight: usize,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(pipeline: Arc<NotificationPipeline>, cancel: CancellationToken) -> Self {
        Self::with_limit(pipeline, DEFAULT_MAX_IN_FLIGHT, cancel)
    }

    pub fn with_limit(
        pipeline: Arc<NotificationPipeline>,
        max_in_flight: usize,
        cancel: CancellationToken,
    ) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            pipeline,
            semaphore: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            cancel,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.semaphore.available_permits()
    }

    /// Spawns delivery of `post`. Returns `None` if the pool is saturated.
    pub fn dispatch(&self, post: Post, session: SharedSession) -> Option<JoinHandle<()>> {
        let permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    author = %post.author_did,
                    record_key = %post.record_key,
                    limit = self.max_in_flight,
                    "Too many notifications in flight, dropping post"
                );
                return None;
            }
        };

        let pipeline = self.pipeline.clone();
        let cancel = self.cancel.clone();

        Some(tokio::spawn(async move {
            let _permit = permit;
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(author = %post.author_did, "Abandoned notification on shutdown");
                }
                result = pipeline.process(&session, &post) => match result {
                    Ok(Delivery::Sent) => {
                        info!(
                            author = %post.author_did,
                            record_key = %post.record_key,
                            "Notification delivered"
                        );
                    }
                    Ok(Delivery::Muted) => {}
                    Err(e) => {
                        error!(
                            author = %post.author_did,
                            post = %links::post_url(&post.author_did, &post.record_key),
                            error = %e,
                            "Failed to deliver notification"
                        );
                    }
                }
            }
        }))
    }
}
