mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;

use crate::config::{Config, Credential};
use auth::{ApiKey, UrlParam};

/// Builds the client for `config`, wrapping it with whatever credential
/// placement the feed needs.
pub fn client_for(config: &Config) -> Result<Box<dyn HttpClient>> {
    let basic = BasicClient::new(config.http_timeout)?;
    with_credential(basic, &config.credential)
}

/// Wraps `inner` so requests carry `credential`. A URL suffix key is already
/// part of the request URL, so it needs no wrapper.
pub fn with_credential<C: HttpClient + 'static>(
    inner: C,
    credential: &Credential,
) -> Result<Box<dyn HttpClient>> {
    let client: Box<dyn HttpClient> = match credential {
        Credential::None | Credential::UrlSuffix(_) => Box::new(inner),
        Credential::UrlParam { name, key } => Box::new(UrlParam {
            inner,
            param_name: name.clone(),
            key: key.clone(),
        }),
        Credential::Header { name, key } => Box::new(ApiKey::new(inner, name, key)?),
    };

    Ok(client)
}

/// Issues a GET for `url`. The response body is left unread.
pub async fn get<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<reqwest::Response> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);
    client.execute(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Option<reqwest::Request>>>);

    impl Capture {
        fn take(&self) -> reqwest::Request {
            self.0.lock().unwrap().take().unwrap()
        }
    }

    #[async_trait]
    impl HttpClient for Capture {
        async fn execute(&self, req: reqwest::Request) -> anyhow::Result<reqwest::Response> {
            *self.0.lock().unwrap() = Some(req);
            anyhow::bail!("captured")
        }
    }

    const URL: &str = "https://feeds.example.com/vp?key=abc";

    #[tokio::test]
    async fn test_suffix_credential_leaves_request_alone() {
        let capture = Capture::default();
        let client =
            with_credential(capture.clone(), &Credential::UrlSuffix("abc".to_string())).unwrap();
        let _ = get(&client, URL).await;

        let req = capture.take();
        assert_eq!(req.url().as_str(), URL);
        assert!(req.headers().is_empty());
    }

    #[tokio::test]
    async fn test_param_credential_appends_query_pair() {
        let capture = Capture::default();
        let credential = Credential::UrlParam {
            name: "apikey".to_string(),
            key: "secret".to_string(),
        };
        let client = with_credential(capture.clone(), &credential).unwrap();
        let _ = get(&client, "https://feeds.example.com/vp").await;

        let req = capture.take();
        assert_eq!(req.url().as_str(), "https://feeds.example.com/vp?apikey=secret");
        assert!(req.headers().is_empty());
    }

    #[tokio::test]
    async fn test_header_credential_sets_header() {
        let capture = Capture::default();
        let credential = Credential::Header {
            name: "x-api-key".to_string(),
            key: "secret".to_string(),
        };
        let client = with_credential(capture.clone(), &credential).unwrap();
        let _ = get(&client, "https://feeds.example.com/vp").await;

        let req = capture.take();
        assert_eq!(req.url().as_str(), "https://feeds.example.com/vp");
        assert_eq!(req.headers().get("x-api-key").unwrap(), "secret");
    }

    #[test]
    fn test_invalid_header_credential_rejected() {
        let credential = Credential::Header {
            name: "bad header".to_string(),
            key: "secret".to_string(),
        };
        assert!(with_credential(Capture::default(), &credential).is_err());
    }
}
