//! Fetching the bulk payload, with the local cache in front of it.

use thiserror::Error;

use crate::cache::{Cache, CacheError};
use crate::models::Payload;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("HTTP request failed: {0}")]
    Http(ureq::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("Malformed payload: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Server error: {0}")]
    Remote(String),
    #[error("No cached data and network disabled")]
    Offline,
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl From<ureq::Error> for LoadError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::StatusCode(code) => Self::Status(code),
            other => Self::Http(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// Where a payload may come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Cached copy if present, otherwise the network.
    CacheFirst,
    /// Always fetch; the cache is only written.
    NetworkOnly,
    /// Never touch the network.
    CacheOnly,
}

/// Where the payload that was loaded came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
}

/// Full URL of the bulk data request.
pub fn data_url(endpoint: &str) -> String {
    let sep = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{sep}action=getAllData")
}

/// GET the raw payload body.
pub fn fetch_raw(endpoint: &str) -> Result<String> {
    let url = data_url(endpoint);
    log::info!("fetching {url}");
    let body = ureq::get(&url).call()?.body_mut().read_to_string()?;
    log::debug!("received {} bytes", body.len());
    Ok(body)
}

/// Parse a payload body. A payload flagged `status: "error"` is a failure
/// carrying the server's message.
pub fn parse_payload(raw: &str) -> Result<Payload> {
    let payload: Payload = serde_json::from_str(raw)?;
    if payload.is_error() {
        let message = payload.message.unwrap_or_else(|| "unknown error".to_string());
        return Err(LoadError::Remote(message));
    }
    Ok(payload)
}

/// Loads payloads through the cache.
pub struct Loader<'a> {
    cache: Option<&'a Cache>,
    key: &'a str,
}

impl<'a> Loader<'a> {
    pub fn new(cache: Option<&'a Cache>, key: &'a str) -> Self {
        Self { cache, key }
    }

    fn cached(&self) -> Option<Payload> {
        let cache = self.cache?;
        match cache.load_payload(self.key) {
            Ok(Some(payload)) => {
                log::info!("loaded {} records from cache", payload.live_records.len());
                Some(payload)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("cache unreadable, falling back to network: {e}");
                None
            }
        }
    }

    /// Load a payload according to `mode`, fetching with `fetch` when the
    /// network is needed. A successfully parsed network payload is cached;
    /// a failed one never overwrites the cache.
    pub fn load_with<F>(&self, mode: LoadMode, fetch: F) -> Result<(Payload, Source)>
    where
        F: FnOnce() -> Result<String>,
    {
        if mode != LoadMode::NetworkOnly {
            if let Some(payload) = self.cached() {
                return Ok((payload, Source::Cache));
            }
        }
        if mode == LoadMode::CacheOnly {
            return Err(LoadError::Offline);
        }

        let raw = fetch()?;
        let payload = parse_payload(&raw)?;
        if let Some(cache) = self.cache {
            cache.save_payload(self.key, &raw);
        }
        Ok((payload, Source::Network))
    }

    pub fn load(&self, mode: LoadMode, endpoint: &str) -> Result<(Payload, Source)> {
        self.load_with(mode, || fetch_raw(endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::queries::DEFAULT_PAYLOAD_KEY;

    const GOOD: &str = r#"{"status":"ok","liveRecords":[{"date":"2024/03/15","tourName":"t","year":2024,"setlist":["A"]}]}"#;

    #[test]
    fn test_data_url() {
        assert_eq!(data_url("https://x/exec"), "https://x/exec?action=getAllData");
        assert_eq!(data_url("https://x/exec?k=1"), "https://x/exec?k=1&action=getAllData");
    }

    #[test]
    fn test_parse_payload_errors() {
        assert!(matches!(parse_payload("nope"), Err(LoadError::Parse(_))));
        match parse_payload(r#"{"status":"error","message":"quota"}"#) {
            Err(LoadError::Remote(m)) => assert_eq!(m, "quota"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(parse_payload(GOOD).unwrap().live_records.len(), 1);
    }

    #[test]
    fn test_network_payload_is_cached() {
        let cache = Cache::open_in_memory().unwrap();
        let loader = Loader::new(Some(&cache), DEFAULT_PAYLOAD_KEY);
        let (_, source) = loader.load_with(LoadMode::CacheFirst, || Ok(GOOD.to_string())).unwrap();
        assert_eq!(source, Source::Network);

        let (payload, source) = loader
            .load_with(LoadMode::CacheFirst, || panic!("should not fetch"))
            .unwrap();
        assert_eq!(source, Source::Cache);
        assert_eq!(payload.live_records[0].date, "2024/03/15");
    }

    #[test]
    fn test_error_payload_keeps_cache() {
        let cache = Cache::open_in_memory().unwrap();
        cache.save_payload(DEFAULT_PAYLOAD_KEY, GOOD);
        let loader = Loader::new(Some(&cache), DEFAULT_PAYLOAD_KEY);

        let err = loader
            .load_with(LoadMode::NetworkOnly, || {
                Ok(r#"{"status":"error","message":"sheet locked"}"#.to_string())
            })
            .unwrap_err();
        assert!(matches!(err, LoadError::Remote(ref m) if m == "sheet locked"));
        assert_eq!(cache.get(DEFAULT_PAYLOAD_KEY).unwrap().as_deref(), Some(GOOD));
    }

    #[test]
    fn test_corrupt_cache_falls_back() {
        let cache = Cache::open_in_memory().unwrap();
        cache.set(DEFAULT_PAYLOAD_KEY, "{broken").unwrap();
        let loader = Loader::new(Some(&cache), DEFAULT_PAYLOAD_KEY);
        let (payload, source) = loader.load_with(LoadMode::CacheFirst, || Ok(GOOD.to_string())).unwrap();
        assert_eq!(source, Source::Network);
        assert_eq!(payload.live_records.len(), 1);
    }

    #[test]
    fn test_offline_without_cache() {
        let loader = Loader::new(None, DEFAULT_PAYLOAD_KEY);
        let err = loader.load_with(LoadMode::CacheOnly, || panic!("no network")).unwrap_err();
        assert!(matches!(err, LoadError::Offline));
    }

    #[test]
    fn test_transport_failure_surfaces() {
        let loader = Loader::new(None, DEFAULT_PAYLOAD_KEY);
        let err = loader.load_with(LoadMode::NetworkOnly, || Err(LoadError::Status(503))).unwrap_err();
        assert!(matches!(err, LoadError::Status(503)));
    }
}
