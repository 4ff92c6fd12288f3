//! Configuration for the relay.
//!
//! Tunables live in an optional TOML file, `~/.config/skyhook/config.toml`
//! unless `--config` points elsewhere. A missing default file means
//! defaults; missing fields in a present file also fall back to defaults.
//! Credentials and URLs come from the command line or environment (see
//! [`crate::cli`]) and are validated into [`Settings`] before anything
//! connects.

pub mod secrets;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use url::Url;

use crate::decoder::{EventDecoder, DEFAULT_MAX_POST_AGE};
use crate::enricher::DEFAULT_AVATAR_URL;
use crate::fetcher::parallel::DEFAULT_MAX_IN_FLIGHT;
use crate::supervisor::{
    Credentials, EndpointRotation, SupervisorConfig, DEFAULT_COLLECTION, DEFAULT_READ_TIMEOUT,
    DEFAULT_RECONNECT_DELAY, PUBLIC_JETSTREAMS,
};

pub const DEFAULT_SERVER_URL: &str = "https://bsky.social";
pub const DEFAULT_WATCH_WORD: &str = "tailscale";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Name of the dictionary Jetstream publishes for its compressed frames.
pub const DICTIONARY_FILE_NAME: &str = "zstd_dictionary";

/// Tunables file contents.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stream: StreamConfig,
    pub filter: FilterConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Jetstream hosts dialed round-robin when no `--addr` is given.
    pub endpoints: Vec<String>,
    pub collection: String,
    #[serde(deserialize_with = "deserialize_duration")]
    pub reconnect_delay: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub read_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoints: PUBLIC_JETSTREAMS.iter().map(|s| s.to_string()).collect(),
            collection: DEFAULT_COLLECTION.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    #[serde(deserialize_with = "deserialize_duration")]
    pub max_post_age: Duration,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_post_age: DEFAULT_MAX_POST_AGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub default_avatar_url: String,
    pub max_in_flight: usize,
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            default_avatar_url: DEFAULT_AVATAR_URL.to_string(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    /// Load the tunables file.
    ///
    /// An explicit `path` must exist. Without one the default location is
    /// tried and a missing file yields [`Config::default`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default_path = Self::default_config_path()?;
                if !default_path.exists() {
                    return Ok(Self::default());
                }
                default_path
            }
        };

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })
    }

    /// `~/.config/skyhook/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("skyhook").join("config.toml"))
    }

    /// `~/.config/skyhook/zstd_dictionary`, where Jetstream's published
    /// dictionary is expected when `--zstd-dictionary` is not given.
    pub fn default_dictionary_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("skyhook").join(DICTIONARY_FILE_NAME))
    }

    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            reconnect_delay: self.stream.reconnect_delay,
            read_timeout: self.stream.read_timeout,
            collection: self.stream.collection.clone(),
        }
    }
}

/// Parse a duration like "90s", "5m", "1h", "1d", or bare seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim().to_lowercase();

    let (digits, unit) = if let Some(days) = s.strip_suffix('d') {
        (days, 86400)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600)
    } else if let Some(minutes) = s.strip_suffix('m') {
        (minutes, 60)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1)
    } else {
        (s.as_str(), 1)
    };

    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(unit))
        .map(Duration::from_secs)
        .ok_or_else(|| format!("Invalid duration: {}. Use format like '2s', '5m', '1h', '1d'", s))
}

/// Format a duration with the largest whole unit.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 86400 && secs % 86400 == 0 {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

/// Raw values gathered from flags, environment and the secret store.
/// Empty strings count as unset.
#[derive(Clone, Default)]
pub struct Inputs {
    pub addr: Option<String>,
    pub bsky_handle: Option<String>,
    pub bsky_app_password: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub bsky_server_url: Option<String>,
    pub watch_word: Option<String>,
    pub secrets_url: Option<String>,
    pub secrets_prefix: Option<String>,
    pub zstd_dictionary: Option<PathBuf>,
    /// Ask Jetstream for uncompressed JSON frames.
    pub plain_frames: bool,
}

impl fmt::Debug for Inputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Inputs")
            .field("addr", &self.addr)
            .field("bsky_handle", &self.bsky_handle)
            .field("bsky_app_password", &redacted(&self.bsky_app_password))
            .field("slack_webhook_url", &redacted(&self.slack_webhook_url))
            .field("bsky_server_url", &self.bsky_server_url)
            .field("watch_word", &self.watch_word)
            .field("secrets_url", &self.secrets_url)
            .field("secrets_prefix", &self.secrets_prefix)
            .field("zstd_dictionary", &self.zstd_dictionary)
            .field("plain_frames", &self.plain_frames)
            .finish()
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint_override: Option<String>,
    pub credentials: Credentials,
    pub webhook_url: Url,
    pub server_url: Url,
    pub watch_word: String,
    /// `None` only when plain frames were requested.
    pub zstd_dictionary: Option<PathBuf>,
    pub config: Config,
}

impl Settings {
    /// Validate `inputs` against `config`. Secrets must already be applied.
    pub fn resolve(inputs: Inputs, config: Config) -> Result<Self, ConfigError> {
        let webhook_url = present(&inputs.slack_webhook_url).ok_or(ConfigError::Missing {
            name: "Slack webhook URL",
            env: "SLACK_WEBHOOK_URL",
        })?;
        let server_url = present(&inputs.bsky_server_url).ok_or(ConfigError::Missing {
            name: "Bluesky server URL",
            env: "BSKY_SERVER_URL",
        })?;
        let handle = present(&inputs.bsky_handle).ok_or(ConfigError::Missing {
            name: "Bluesky account handle",
            env: "BSKY_HANDLE",
        })?;
        let app_password = present(&inputs.bsky_app_password).ok_or(ConfigError::Missing {
            name: "Bluesky app password",
            env: "BSKY_APP_PASSWORD",
        })?;
        let watch_word = match inputs.watch_word.as_deref() {
            None => DEFAULT_WATCH_WORD,
            Some(w) if w.trim().is_empty() => return Err(ConfigError::EmptyWatchWord),
            Some(w) => w.trim(),
        };

        if present(&inputs.addr).is_none() && config.stream.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }

        let zstd_dictionary = match (inputs.plain_frames, inputs.zstd_dictionary) {
            (true, _) => None,
            (false, Some(path)) => Some(path),
            (false, None) => Some(Config::default_dictionary_path()?),
        };

        Ok(Self {
            endpoint_override: present(&inputs.addr).map(str::to_string),
            credentials: Credentials {
                handle: handle.to_string(),
                app_password: app_password.to_string(),
            },
            webhook_url: parse_url("webhook", webhook_url)?,
            server_url: parse_url("server", server_url)?,
            watch_word: watch_word.to_string(),
            zstd_dictionary,
            config,
        })
    }

    pub fn endpoints(&self) -> EndpointRotation {
        EndpointRotation::new(
            self.endpoint_override.clone(),
            self.config.stream.endpoints.clone(),
        )
    }

    /// Read the zstd dictionary, unless plain frames were requested.
    pub fn load_dictionary(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let Some(path) = &self.zstd_dictionary else {
            return Ok(None);
        };
        EventDecoder::load_dictionary(path)
            .map(Some)
            .map_err(|e| ConfigError::Dictionary {
                path: path.clone(),
                source: e,
            })
    }
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
        source: e,
    })
}

/// Configuration errors. All are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing {name} ({env})")]
    Missing {
        name: &'static str,
        env: &'static str,
    },

    #[error("Invalid {name} URL {value:?}: {source}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        source: url::ParseError,
    },

    #[error("Missing watch-word")]
    EmptyWatchWord,

    #[error("No Jetstream endpoints configured")]
    NoEndpoints,

    #[error(
        "Failed to read zstd dictionary at {path}: {source} \
         (set --zstd-dictionary or pass --plain-frames)"
    )]
    Dictionary {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to fetch secret {name:?}: {reason}")]
    Secret { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn inputs() -> Inputs {
        Inputs {
            bsky_handle: Some("relay.bsky.social".into()),
            bsky_app_password: Some("app-pass".into()),
            slack_webhook_url: Some("https://hooks.slack.com/services/T/B/X".into()),
            bsky_server_url: Some(DEFAULT_SERVER_URL.into()),
            watch_word: Some("tailscale".into()),
            plain_frames: true,
            ..Inputs::default()
        }
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config, Config::default());
        assert_eq!(config.stream.endpoints.len(), 4);
        assert_eq!(config.stream.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.notify.max_in_flight, 64);
    }

    #[test]
    fn test_partial_config() {
        let content = r#"
[stream]
endpoints = ["localhost:6008"]
read_timeout = "30s"

[filter]
max_post_age = "1h"

[notify]
request_timeout = 15
"#;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.stream.endpoints, vec!["localhost:6008"]);
        assert_eq!(config.stream.read_timeout, Duration::from_secs(30));
        assert_eq!(config.stream.reconnect_delay, DEFAULT_RECONNECT_DELAY);
        assert_eq!(config.filter.max_post_age, Duration::from_secs(3600));
        assert_eq!(config.notify.request_timeout, Duration::from_secs(15));
        assert_eq!(config.notify.default_avatar_url, DEFAULT_AVATAR_URL);
    }

    #[test]
    fn test_bad_duration_is_rejected() {
        let err = toml::from_str::<Config>("[stream]\nread_timeout = \"soon\"").unwrap_err();
        assert!(err.to_string().contains("Invalid duration"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[stream]\ncollection = \"app.bsky.feed.like\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.stream.collection, "app.bsky.feed.like");
        assert_eq!(config.supervisor().collection, "app.bsky.feed.like");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[stream\nendpoints = 3").unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1H").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_duration("42").unwrap(), Duration::from_secs(42));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("999999999999999999d").is_err());
        assert_eq!(
            parse_duration("18446744073709551615s").unwrap(),
            Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(2)), "2s");
        assert_eq!(format_duration(Duration::from_secs(300)), "5m");
        assert_eq!(format_duration(Duration::from_secs(86400)), "1d");
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
    }

    #[test]
    fn test_resolve_valid_settings() {
        let settings = Settings::resolve(inputs(), Config::default()).unwrap();

        assert_eq!(settings.credentials.handle, "relay.bsky.social");
        assert_eq!(settings.server_url.as_str(), "https://bsky.social/");
        assert_eq!(settings.watch_word, "tailscale");
        assert_eq!(settings.endpoints(), EndpointRotation::public());
    }

    #[test]
    fn test_resolve_requires_each_value() {
        let cases: [(fn(&mut Inputs), &str); 4] = [
            (|i| i.slack_webhook_url = None, "SLACK_WEBHOOK_URL"),
            (|i| i.bsky_server_url = Some("".into()), "BSKY_SERVER_URL"),
            (|i| i.bsky_handle = Some("  ".into()), "BSKY_HANDLE"),
            (|i| i.bsky_app_password = None, "BSKY_APP_PASSWORD"),
        ];

        for (clear, env_name) in cases {
            let mut i = inputs();
            clear(&mut i);
            let err = Settings::resolve(i, Config::default()).unwrap_err();
            match err {
                ConfigError::Missing { env, .. } => assert_eq!(env, env_name),
                other => panic!("expected Missing for {env_name}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_resolve_rejects_blank_watch_word() {
        let i = Inputs {
            watch_word: Some(" ".into()),
            ..inputs()
        };
        assert!(matches!(
            Settings::resolve(i, Config::default()),
            Err(ConfigError::EmptyWatchWord)
        ));
    }

    #[test]
    fn test_resolve_rejects_bad_url() {
        let i = Inputs {
            slack_webhook_url: Some("not a url".into()),
            ..inputs()
        };
        assert!(matches!(
            Settings::resolve(i, Config::default()),
            Err(ConfigError::InvalidUrl { name: "webhook", .. })
        ));
    }

    #[test]
    fn test_resolve_endpoints() {
        let mut config = Config::default();
        config.stream.endpoints.clear();
        assert!(matches!(
            Settings::resolve(inputs(), config.clone()),
            Err(ConfigError::NoEndpoints)
        ));

        let i = Inputs {
            addr: Some("localhost:6008".into()),
            ..inputs()
        };
        let settings = Settings::resolve(i, config).unwrap();
        assert_eq!(
            settings.endpoints(),
            EndpointRotation::Fixed("localhost:6008".into())
        );
    }

    #[test]
    fn test_load_dictionary() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"\x37\xa4\x30\xec dict").unwrap();

        let mut settings = Settings::resolve(inputs(), Config::default()).unwrap();
        assert_eq!(settings.load_dictionary().unwrap(), None);

        settings.zstd_dictionary = Some(file.path().to_path_buf());
        assert_eq!(settings.load_dictionary().unwrap().unwrap().len(), 9);

        settings.zstd_dictionary = Some(PathBuf::from("/nonexistent/dict"));
        assert!(matches!(
            settings.load_dictionary(),
            Err(ConfigError::Dictionary { .. })
        ));
    }

    #[test]
    fn test_compressed_frames_by_default() {
        let defaults = Inputs {
            plain_frames: false,
            ..inputs()
        };
        match Config::default_dictionary_path() {
            Ok(path) => {
                let settings = Settings::resolve(defaults, Config::default()).unwrap();
                assert!(path.ends_with("skyhook/zstd_dictionary"));
                assert_eq!(settings.zstd_dictionary, Some(path));
            }
            Err(_) => assert!(matches!(
                Settings::resolve(defaults, Config::default()),
                Err(ConfigError::NoConfigDir)
            )),
        }
    }

    #[test]
    fn test_dictionary_flag_overrides_default_path() {
        let explicit = Inputs {
            plain_frames: false,
            zstd_dictionary: Some(PathBuf::from("/etc/skyhook/dict")),
            ..inputs()
        };
        let settings = Settings::resolve(explicit, Config::default()).unwrap();
        assert_eq!(settings.zstd_dictionary, Some(PathBuf::from("/etc/skyhook/dict")));
    }

    #[test]
    fn test_missing_dictionary_error_names_the_fix() {
        let mut settings = Settings::resolve(inputs(), Config::default()).unwrap();
        settings.zstd_dictionary = Some(PathBuf::from("/nonexistent/dict"));
        let message = settings.load_dictionary().unwrap_err().to_string();
        assert!(message.contains("/nonexistent/dict"));
        assert!(message.contains("--plain-frames"));
    }

    #[test]
    fn test_inputs_debug_redacts_secrets() {
        let debug = format!("{:?}", inputs());
        assert!(!debug.contains("app-pass"));
        assert!(!debug.contains("hooks.slack.com"));
        assert!(debug.contains("relay.bsky.social"));
    }
}
