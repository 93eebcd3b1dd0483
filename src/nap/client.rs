//! HTTP access to the registry site

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};
use url::Url;

use crate::config::HttpConfig;
use crate::error::{Error, Result};

/// Ordered, single-valued query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Replaces the value of `key` in place, or appends it
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|(name, _)| name == key) {
            Some(pair) => pair.1 = value,
            None => self.0.push((key.to_string(), value)),
        }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (key, value) in iter {
            let key: String = key.into();
            params.set(&key, value);
        }
        params
    }
}

/// A blocking GET returning the response body
pub trait HttpGet {
    fn get_text(&self, url: &Url, params: &QueryParams) -> Result<String>;
}

pub struct BlockingClient {
    client: Client,
}

impl BlockingClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::InvalidHeader(name.clone()))?;
            let value =
                HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader(value.clone()))?;
            headers.insert(name, value);
        }
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpGet for BlockingClient {
    fn get_text(&self, url: &Url, params: &QueryParams) -> Result<String> {
        debug!(%url, params = ?params.pairs(), "GET");
        let body = self
            .client
            .get(url.clone())
            .query(params.pairs())
            .send()?
            .error_for_status()?
            .text()?;
        Ok(body)
    }
}

/// Tries the request up to `max_attempts` times, back to back, returning the last error
///
/// Every failure is retried the same way whatever its cause.
pub fn fetch_with_retry<C: HttpGet + ?Sized>(
    client: &C,
    url: &Url,
    params: &QueryParams,
    max_attempts: u32,
) -> Result<String> {
    let mut last_error = None;
    for attempt in 1..=max_attempts {
        match client.get_text(url, params) {
            Ok(body) => return Ok(body),
            Err(err) => {
                warn!(%url, attempt, max_attempts, error = %err, "Request failed");
                last_error = Some(err);
            }
        }
    }
    // No attempt was made at all when max_attempts is 0
    Err(last_error.unwrap_or(Error::InvalidRetryBound(max_attempts)))
}
