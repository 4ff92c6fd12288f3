use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::app::{Result, SkyhookError};
use crate::enricher::{ActorProfile, ProfileApi, Session};

const CREATE_SESSION: &str = "com.atproto.server.createSession";
const REFRESH_SESSION: &str = "com.atproto.server.refreshSession";
const GET_PROFILE: &str = "app.bsky.actor.getProfile";

/// XRPC client for a PDS. Requests go through the caller's `reqwest::Client`
/// so an alternate transport can be swapped in.
#[derive(Clone)]
pub struct XrpcClient {
    client: Client,
    server_url: Url,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

impl XrpcClient {
    pub fn new(client: Client, server_url: Url) -> Self {
        Self { client, server_url }
    }

    fn endpoint(&self, nsid: &str) -> String {
        format!(
            "{}/xrpc/{}",
            self.server_url.as_str().trim_end_matches('/'),
            nsid
        )
    }
}

#[derive(Deserialize)]
struct XrpcErrorBody {
    #[serde(default)]
    error: String,
}

/// `"{status}: {body}"` for a failed XRPC call.
async fn failure_reason(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("{}: {}", status, body.trim())
}

fn is_expired_token(body: &str) -> bool {
    serde_json::from_str::<XrpcErrorBody>(body)
        .map(|b| b.error == "ExpiredToken")
        .unwrap_or(false)
}

#[async_trait]
impl ProfileApi for XrpcClient {
    async fn login(&self, handle: &str, password: &str) -> Result<Session> {
        let login_error = |reason: String| SkyhookError::Login {
            handle: handle.to_string(),
            reason,
        };

        let response = self
            .client
            .post(self.endpoint(CREATE_SESSION))
            .json(&CreateSessionRequest {
                identifier: handle,
                password,
            })
            .send()
            .await
            .map_err(|e| login_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(login_error(failure_reason(response).await));
        }

        let session: Session = response
            .json()
            .await
            .map_err(|e| login_error(e.to_string()))?;
        debug!(did = %session.did, "Logged in to {}", self.server_url);
        Ok(session)
    }

    async fn fetch_profile(&self, session: &Session, actor: &str) -> Result<ActorProfile> {
        let profile_error = |reason: String| SkyhookError::Profile {
            actor: actor.to_string(),
            reason,
        };

        let response = self
            .client
            .get(self.endpoint(GET_PROFILE))
            .query(&[("actor", actor)])
            .bearer_auth(&session.access_jwt)
            .send()
            .await
            .map_err(|e| profile_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_expired_token(&body) {
                return Err(SkyhookError::SessionExpired {
                    actor: actor.to_string(),
                });
            }
            return Err(profile_error(format!("{}: {}", status, body.trim())));
        }

        response
            .json()
            .await
            .map_err(|e| profile_error(e.to_string()))
    }

    async fn refresh(&self, session: &Session) -> Result<Session> {
        let refresh_error = |reason: String| SkyhookError::Login {
            handle: session.handle.clone(),
            reason,
        };

        let response = self
            .client
            .post(self.endpoint(REFRESH_SESSION))
            .bearer_auth(&session.refresh_jwt)
            .send()
            .await
            .map_err(|e| refresh_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(refresh_error(failure_reason(response).await));
        }

        let fresh: Session = response
            .json()
            .await
            .map_err(|e| refresh_error(e.to_string()))?;
        debug!(did = %fresh.did, "Refreshed session on {}", self.server_url);
        Ok(fresh)
    }
}
