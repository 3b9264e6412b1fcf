//! Load-time configuration.
//!
//! Every flag can also come from the environment (and so from a `.env` file
//! loaded at startup). [`Config`] is built once, validated, and then passed
//! by reference; nothing reads configuration from globals.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use clap::Args;

use crate::decoder::DEFAULT_MAX_MESSAGE_LEN;

#[derive(Debug, Clone, Args)]
pub struct FeedArgs {
    /// Vehicle positions endpoint
    #[arg(long, env = "FEED_URL")]
    pub feed_url: String,

    /// API key. Appended verbatim to the URL unless --api-key-param or
    /// --api-key-header says where it goes
    #[arg(long, env = "FEED_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Send the API key as this query parameter
    #[arg(
        long,
        env = "FEED_API_KEY_PARAM",
        requires = "api_key",
        conflicts_with = "api_key_header"
    )]
    pub api_key_param: Option<String>,

    /// Send the API key in this HTTP header
    #[arg(long, env = "FEED_API_KEY_HEADER", requires = "api_key")]
    pub api_key_header: Option<String>,

    /// Route to track, compared exactly against trip.route_id
    #[arg(long, env = "ROUTE_ID")]
    pub route_id: String,

    /// Delay between fetches in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 15_000)]
    pub poll_interval_ms: u64,

    /// Largest header or entity the decoder will buffer
    #[arg(long, env = "MAX_MESSAGE_BYTES", default_value_t = DEFAULT_MAX_MESSAGE_LEN)]
    pub max_message_bytes: usize,

    /// Whole-request HTTP timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Address used to check for a network route (no packets are sent)
    #[arg(long, env = "NETWORK_PROBE_ADDR", default_value = "8.8.8.8:53")]
    pub probe_addr: SocketAddr,
}

/// Where the API key goes on the request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    None,
    /// Concatenated onto the endpoint URL.
    UrlSuffix(String),
    UrlParam { name: String, key: String },
    Header { name: String, key: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::UrlSuffix(_) => f.write_str("UrlSuffix(<redacted>)"),
            Self::UrlParam { name, .. } => write!(f, "UrlParam({name}=<redacted>)"),
            Self::Header { name, .. } => write!(f, "Header({name}: <redacted>)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub feed_url: String,
    pub credential: Credential,
    pub route_id: String,
    pub poll_interval: Duration,
    pub max_message_len: usize,
    pub http_timeout: Duration,
    pub probe_addr: SocketAddr,
}

impl Config {
    pub fn from_args(args: FeedArgs) -> Result<Self> {
        ensure!(!args.route_id.is_empty(), "route id must not be empty");
        ensure!(args.poll_interval_ms > 0, "poll interval must be positive");
        ensure!(args.max_message_bytes > 0, "max message bytes must be positive");
        ensure!(args.http_timeout_secs > 0, "HTTP timeout must be positive");

        let credential = match (args.api_key, args.api_key_param, args.api_key_header) {
            (None, _, _) => Credential::None,
            (Some(key), Some(name), _) => Credential::UrlParam { name, key },
            (Some(key), None, Some(name)) => Credential::Header { name, key },
            (Some(key), None, None) => Credential::UrlSuffix(key),
        };

        let config = Self {
            feed_url: args.feed_url,
            credential,
            route_id: args.route_id,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            max_message_len: args.max_message_bytes,
            http_timeout: Duration::from_secs(args.http_timeout_secs),
            probe_addr: args.probe_addr,
        };

        reqwest::Url::parse(&config.request_url())
            .with_context(|| format!("Invalid feed URL '{}'", config.feed_url))?;

        Ok(config)
    }

    /// The URL to request, with a suffix-style key applied. May contain the
    /// API key, so never log it.
    pub fn request_url(&self) -> String {
        match &self.credential {
            Credential::UrlSuffix(key) => format!("{}{}", self.feed_url, key),
            _ => self.feed_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> FeedArgs {
        FeedArgs {
            feed_url: "https://gtfs.example.com/v2/gtfsposition?apikey=".to_string(),
            api_key: None,
            api_key_param: None,
            api_key_header: None,
            route_id: "25".to_string(),
            poll_interval_ms: 15_000,
            max_message_bytes: DEFAULT_MAX_MESSAGE_LEN,
            http_timeout_secs: 30,
            probe_addr: "8.8.8.8:53".parse().unwrap(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_args(args()).unwrap();

        assert_eq!(config.credential, Credential::None);
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.request_url(), config.feed_url);
    }

    #[test]
    fn test_key_suffix_is_appended() {
        let config = Config::from_args(FeedArgs {
            api_key: Some("abc123".to_string()),
            ..args()
        })
        .unwrap();

        assert_eq!(
            config.request_url(),
            "https://gtfs.example.com/v2/gtfsposition?apikey=abc123"
        );
    }

    #[test]
    fn test_key_placement() {
        let param = Config::from_args(FeedArgs {
            api_key: Some("k".to_string()),
            api_key_param: Some("key".to_string()),
            ..args()
        })
        .unwrap();
        assert!(matches!(param.credential, Credential::UrlParam { .. }));
        assert_eq!(param.request_url(), param.feed_url);

        let header = Config::from_args(FeedArgs {
            api_key: Some("k".to_string()),
            api_key_header: Some("x-api-key".to_string()),
            ..args()
        })
        .unwrap();
        assert!(matches!(header.credential, Credential::Header { .. }));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = Config::from_args(FeedArgs {
            api_key: Some("topsecret".to_string()),
            ..args()
        })
        .unwrap();

        assert!(!format!("{config:?}").contains("topsecret"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(
            Config::from_args(FeedArgs {
                route_id: String::new(),
                ..args()
            })
            .is_err()
        );
        assert!(
            Config::from_args(FeedArgs {
                poll_interval_ms: 0,
                ..args()
            })
            .is_err()
        );
        assert!(
            Config::from_args(FeedArgs {
                feed_url: "not a url".to_string(),
                ..args()
            })
            .is_err()
        );
    }
}
