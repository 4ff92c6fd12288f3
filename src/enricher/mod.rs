//! Author profile lookup and normalization.

pub mod bsky;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::app::{Result, SkyhookError};
use crate::domain::{links, Post, Profile, INVALID_HANDLE};

pub use bsky::XrpcClient;

/// Shown when an author has not set an avatar.
pub const DEFAULT_AVATAR_URL: &str = "https://up.erisa.uk/blueskydefaultavatar.png";

/// An authenticated session against the PDS.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_jwt: String,
    #[serde(default)]
    pub refresh_jwt: String,
    pub did: String,
    pub handle: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("did", &self.did)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// `app.bsky.actor.defs#profileViewDetailed`, trimmed to what we use.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorProfile {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub viewer: Option<ViewerState>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewerState {
    #[serde(default)]
    pub muted: bool,
}

#[async_trait]
pub trait ProfileApi: Send + Sync {
    async fn login(&self, handle: &str, password: &str) -> Result<Session>;
    async fn fetch_profile(&self, session: &Session, actor: &str) -> Result<ActorProfile>;

    /// Trade the session's refresh token for a new access token.
    async fn refresh(&self, session: &Session) -> Result<Session> {
        Err(SkyhookError::Login {
            handle: session.handle.clone(),
            reason: "session refresh not supported".into(),
        })
    }
}

/// The session of one feed connection, shared by its delivery tasks.
///
/// Replaced in place when the PDS reports the access token expired, so
/// every task picks up the refreshed token.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<RwLock<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    pub async fn current(&self) -> Session {
        self.inner.read().await.clone()
    }

    /// Refresh the session unless another task already replaced `stale`.
    pub async fn refresh(&self, api: &dyn ProfileApi, stale: &Session) -> Result<Session> {
        let mut session = self.inner.write().await;
        if session.access_jwt != stale.access_jwt {
            return Ok(session.clone());
        }
        let fresh = api.refresh(&session).await?;
        info!(did = %fresh.did, "Refreshed PDS session");
        *session = fresh.clone();
        Ok(fresh)
    }
}

impl fmt::Debug for SharedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSession").finish_non_exhaustive()
    }
}

pub struct ProfileEnricher {
    api: Arc<dyn ProfileApi>,
    default_avatar_url: String,
}

impl ProfileEnricher {
    pub fn new(api: Arc<dyn ProfileApi>) -> Self {
        Self::with_default_avatar(api, DEFAULT_AVATAR_URL)
    }

    pub fn with_default_avatar(api: Arc<dyn ProfileApi>, default_avatar_url: &str) -> Self {
        Self {
            api,
            default_avatar_url: default_avatar_url.to_string(),
        }
    }

    /// Fetch and normalize a profile, refreshing the session once if the
    /// access token has expired.
    pub async fn fetch(&self, session: &SharedSession, author_did: &str) -> Result<Profile> {
        let current = session.current().await;
        let raw = match self.api.fetch_profile(&current, author_did).await {
            Err(SkyhookError::SessionExpired { .. }) => {
                let fresh = session.refresh(self.api.as_ref(), &current).await?;
                self.api.fetch_profile(&fresh, author_did).await?
            }
            result => result?,
        };
        Ok(self.normalize(author_did, raw))
    }

    /// Profile of the post's author, or `None` when the service account
    /// has muted them.
    pub async fn enrich(&self, session: &SharedSession, post: &Post) -> Result<Option<Profile>> {
        let profile = self.fetch(session, &post.author_did).await?;
        if profile.is_muted {
            info!(
                post = %links::post_url(&profile.handle, &post.record_key),
                "Skipped post from muted user"
            );
            return Ok(None);
        }
        Ok(Some(profile))
    }

    pub fn normalize(&self, author_did: &str, raw: ActorProfile) -> Profile {
        let did = if raw.did.is_empty() {
            author_did.to_string()
        } else {
            raw.did
        };

        // Links built from an unverified handle would not resolve.
        let handle = if raw.handle.is_empty() || raw.handle == INVALID_HANDLE {
            did.clone()
        } else {
            raw.handle
        };

        let display_name = raw
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| handle.clone());

        let avatar_url = raw
            .avatar
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.default_avatar_url.clone());

        Profile {
            did,
            display_name,
            handle,
            avatar_url,
            is_muted: raw.viewer.map(|v| v.muted).unwrap_or(false),
        }
    }
}
