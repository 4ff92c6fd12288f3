use std::path::PathBuf;

use clap::Parser;

use crate::config::{Inputs, DEFAULT_SERVER_URL, DEFAULT_WATCH_WORD};

#[derive(Parser)]
#[command(name = "skyhook")]
#[command(about = "Relay Bluesky posts that mention a watch-word to a Slack webhook", long_about = None)]
pub struct Cli {
    /// Jetstream address to dial instead of rotating through the public hosts
    #[arg(long, env = "JETSTREAM_ADDRESS")]
    pub addr: Option<String>,

    /// Bluesky handle used to look up post authors
    #[arg(long, env = "BSKY_HANDLE")]
    pub bsky_handle: Option<String>,

    /// Bluesky app password for the handle
    #[arg(long, env = "BSKY_APP_PASSWORD", hide_env_values = true)]
    pub bsky_app_password: Option<String>,

    /// Slack incoming-webhook URL notifications are posted to
    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    pub slack_webhook_url: Option<String>,

    /// Bluesky PDS used for login and profile lookups
    #[arg(long, env = "BSKY_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub bsky_server_url: String,

    /// Word to watch for, matched case-insensitively
    #[arg(long, env = "WATCH_WORD", default_value = DEFAULT_WATCH_WORD)]
    pub watch_word: String,

    /// Secrets server to read the webhook URL and app password from
    #[arg(long, env = "SECRETS_URL")]
    pub secrets_url: Option<String>,

    /// Prefix prepended to secret names fetched from --secrets-url
    #[arg(long, env = "SECRETS_PREFIX")]
    pub secrets_prefix: Option<String>,

    /// zstd dictionary for compressed Jetstream frames
    /// (default: ~/.config/skyhook/zstd_dictionary)
    #[arg(long, env = "JETSTREAM_ZSTD_DICTIONARY")]
    pub zstd_dictionary: Option<PathBuf>,

    /// Request uncompressed JSON frames instead of zstd
    #[arg(long, env = "JETSTREAM_PLAIN_FRAMES", conflicts_with = "zstd_dictionary")]
    pub plain_frames: bool,

    /// Tunables file (default: ~/.config/skyhook/config.toml)
    #[arg(short, long, env = "SKYHOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Secret store URL, if one is set and non-empty.
    pub fn secrets_url(&self) -> Option<&str> {
        self.secrets_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl From<&Cli> for Inputs {
    fn from(cli: &Cli) -> Self {
        Self {
            addr: cli.addr.clone(),
            bsky_handle: cli.bsky_handle.clone(),
            bsky_app_password: cli.bsky_app_password.clone(),
            slack_webhook_url: cli.slack_webhook_url.clone(),
            bsky_server_url: Some(cli.bsky_server_url.clone()),
            watch_word: Some(cli.watch_word.clone()),
            secrets_url: cli.secrets_url.clone(),
            secrets_prefix: cli.secrets_prefix.clone(),
            zstd_dictionary: cli.zstd_dictionary.clone(),
            plain_frames: cli.plain_frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_map_to_inputs() {
        let cli = Cli::try_parse_from([
            "skyhook",
            "--addr",
            "localhost:6008",
            "--bsky-handle",
            "relay.bsky.social",
            "--bsky-app-password",
            "app-pass",
            "--slack-webhook-url",
            "https://hooks.slack.com/services/T/B/X",
            "--watch-word",
            "Rust",
            "--secrets-prefix",
            "prod",
            "--log-json",
        ])
        .unwrap();

        assert!(cli.log_json);
        let inputs = Inputs::from(&cli);
        assert_eq!(inputs.addr.as_deref(), Some("localhost:6008"));
        assert_eq!(inputs.bsky_handle.as_deref(), Some("relay.bsky.social"));
        assert_eq!(inputs.watch_word.as_deref(), Some("Rust"));
        assert_eq!(inputs.secrets_prefix.as_deref(), Some("prod"));
        assert!(!inputs.plain_frames);
    }

    #[test]
    fn test_plain_frames_flag() {
        let cli = Cli::try_parse_from(["skyhook", "--plain-frames"]).unwrap();
        assert!(Inputs::from(&cli).plain_frames);

        let both = Cli::try_parse_from([
            "skyhook",
            "--plain-frames",
            "--zstd-dictionary",
            "/etc/skyhook/dict",
        ]);
        assert!(both.is_err());
    }

    #[test]
    fn test_secrets_url_ignores_blank() {
        let cli = Cli::try_parse_from(["skyhook", "--secrets-url", " "]).unwrap();
        assert_eq!(cli.secrets_url(), None);

        let cli = Cli::try_parse_from(["skyhook", "--secrets-url", "https://setec.example"]).unwrap();
        assert_eq!(cli.secrets_url(), Some("https://setec.example"));
    }
}
