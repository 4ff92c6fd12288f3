//! Remote secret store.
//!
//! When `--secrets-url` is set, the webhook URL and app password are read
//! from a setec server instead of flags or environment.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::config::{ConfigError, Inputs};

pub const WEBHOOK_SECRET: &str = "slack-webhook-url";
pub const APP_PASSWORD_SECRET: &str = "bluesky-app-key";

/// Header setec requires on every API call.
const NO_BROWSERS_HEADER: &str = "Sec-X-Tailscale-No-Browsers";

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Latest value of the secret called `name`.
    async fn get(&self, name: &str) -> Result<String, ConfigError>;
}

/// Client for the setec HTTP API.
#[derive(Clone)]
pub struct SetecStore {
    client: Client,
    server: Url,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetRequest<'a> {
    name: &'a str,
    /// Zero asks for the active version.
    version: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SecretValue {
    value: String,
    #[serde(default)]
    version: u64,
}

impl SetecStore {
    pub fn new(client: Client, server: Url) -> Self {
        Self { client, server }
    }
}

#[async_trait]
impl SecretStore for SetecStore {
    async fn get(&self, name: &str) -> Result<String, ConfigError> {
        let secret_error = |reason: String| ConfigError::Secret {
            name: name.to_string(),
            reason,
        };

        let url = format!("{}/api/get", self.server.as_str().trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .header(NO_BROWSERS_HEADER, "setec")
            .json(&GetRequest { name, version: 0 })
            .send()
            .await
            .map_err(|e| secret_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(secret_error(format!("{}: {}", status, body.trim())));
        }

        let secret: SecretValue = response
            .json()
            .await
            .map_err(|e| secret_error(e.to_string()))?;
        let bytes = STANDARD
            .decode(secret.value.as_bytes())
            .map_err(|e| secret_error(e.to_string()))?;
        let value = String::from_utf8(bytes).map_err(|e| secret_error(e.to_string()))?;

        info!(secret = name, version = secret.version, "Fetched secret");
        Ok(value)
    }
}

/// Join a prefix and a secret name with a single slash.
pub fn secret_name(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

impl Inputs {
    /// Replace the webhook URL and app password with values from `store`.
    pub async fn apply_secrets(&mut self, store: &dyn SecretStore) -> Result<(), ConfigError> {
        let prefix = self.secrets_prefix.clone().unwrap_or_default();

        self.slack_webhook_url = Some(store.get(&secret_name(&prefix, WEBHOOK_SECRET)).await?);
        self.bsky_app_password =
            Some(store.get(&secret_name(&prefix, APP_PASSWORD_SECRET)).await?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> SetecStore {
        SetecStore::new(Client::new(), Url::parse(&server.uri()).unwrap())
    }

    async fn mount_secret(server: &MockServer, name: &str, value: &str) {
        Mock::given(method("POST"))
            .and(path("/api/get"))
            .and(header(NO_BROWSERS_HEADER, "setec"))
            .and(body_json(serde_json::json!({"Name": name, "Version": 0})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Value": STANDARD.encode(value),
                "Version": 3
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_secret_name() {
        assert_eq!(secret_name("", "bluesky-app-key"), "bluesky-app-key");
        assert_eq!(secret_name("prod/", "bluesky-app-key"), "prod/bluesky-app-key");
        assert_eq!(secret_name("a/b", "x"), "a/b/x");
    }

    #[tokio::test]
    async fn test_get_decodes_value() {
        let server = MockServer::start().await;
        mount_secret(&server, "prod/slack-webhook-url", "https://hooks.slack.com/x").await;

        let value = store(&server).get("prod/slack-webhook-url").await.unwrap();
        assert_eq!(value, "https://hooks.slack.com/x");
    }

    #[tokio::test]
    async fn test_get_failure_is_config_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("access denied"))
            .mount(&server)
            .await;

        let err = store(&server).get("missing").await.unwrap_err();
        match err {
            ConfigError::Secret { name, reason } => {
                assert_eq!(name, "missing");
                assert!(reason.contains("403"));
                assert!(reason.contains("access denied"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_apply_secrets_overrides_inputs() {
        let server = MockServer::start().await;
        mount_secret(&server, "prod/slack-webhook-url", "https://hooks.example/new").await;
        mount_secret(&server, "prod/bluesky-app-key", "secret-pass").await;

        let mut inputs = Inputs {
            slack_webhook_url: Some("https://hooks.example/old".into()),
            secrets_prefix: Some("prod".into()),
            ..Inputs::default()
        };
        inputs.apply_secrets(&store(&server)).await.unwrap();

        assert_eq!(inputs.slack_webhook_url.as_deref(), Some("https://hooks.example/new"));
        assert_eq!(inputs.bsky_app_password.as_deref(), Some("secret-pass"));
    }
}
