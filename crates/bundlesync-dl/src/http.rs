use std::{
    fs::File,
    io::{self, Read},
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::debug;
use ureq::http::header::{CACHE_CONTROL, CONTENT_LENGTH, PRAGMA};
use url::Url;

use crate::{
    error::{DownloadError, Result},
    http_client::SHARED_AGENT,
};

/// Query parameter appended to defeat intermediary caches.
pub const CACHE_BUST_PARAM: &str = "t";

static LAST_CACHE_TOKEN: AtomicU64 = AtomicU64::new(0);

/// Returns a token that is unique within the process and strictly greater
/// than every token handed out before it.
///
/// Tokens follow wall-clock microseconds when the clock moves forward.
pub fn next_cache_token() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);

    let mut last = LAST_CACHE_TOKEN.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_CACHE_TOKEN.compare_exchange_weak(
            last,
            next,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// A readable body together with its advertised size.
pub struct Fetched {
    pub reader: Box<dyn Read>,
    /// Size in bytes, 0 when the source did not say.
    pub total: u64,
}

pub struct Http;

impl Http {
    /// Parses `url`, rejecting anything that is not absolute.
    pub fn parse_url(url: &str) -> Result<Url> {
        Url::parse(url.trim()).map_err(|source| {
            DownloadError::InvalidUrl {
                url: url.to_string(),
                source,
            }
        })
    }

    /// Appends a fresh `t=<token>` query parameter to `url`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bundlesync_dl::http::Http;
    ///
    /// let busted = Http::cache_busted("https://cdn.example.com/agent.json?lang=en").unwrap();
    /// assert!(busted.as_str().starts_with("https://cdn.example.com/agent.json?lang=en&t="));
    /// ```
    pub fn cache_busted(url: &str) -> Result<Url> {
        let mut parsed = Self::parse_url(url)?;
        parsed
            .query_pairs_mut()
            .append_pair(CACHE_BUST_PARAM, &next_cache_token().to_string());
        Ok(parsed)
    }

    /// Opens `url` for reading.
    ///
    /// `http` and `https` URLs are requested with `Cache-Control: no-cache`
    /// and `Pragma: no-cache`; `cache_bust` additionally appends a unique
    /// query parameter. `file` URLs are read straight from disk.
    pub fn open(url: &str, cache_bust: bool) -> Result<Fetched> {
        let parsed = Self::parse_url(url)?;

        match parsed.scheme() {
            "file" => Self::open_file(url, &parsed),
            "http" | "https" => {
                let target = if cache_bust {
                    Self::cache_busted(url)?
                } else {
                    parsed
                };

                debug!("GET {}", target);
                let resp = SHARED_AGENT
                    .get(target.as_str())
                    .header(CACHE_CONTROL, "no-cache")
                    .header(PRAGMA, "no-cache")
                    .call()?;

                let status = resp.status();
                if !status.is_success() {
                    return Err(DownloadError::HttpError {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }

                let total = resp
                    .headers()
                    .get(CONTENT_LENGTH)
                    .and_then(|h| h.to_str().ok())
                    .and_then(|len| len.parse::<u64>().ok())
                    .unwrap_or(0);

                Ok(Fetched {
                    reader: Box::new(resp.into_body().into_reader()),
                    total,
                })
            }
            scheme => {
                Err(DownloadError::UnsupportedScheme {
                    scheme: scheme.to_string(),
                    url: url.to_string(),
                })
            }
        }
    }

    fn open_file(url: &str, parsed: &Url) -> Result<Fetched> {
        let unavailable = |source| {
            DownloadError::SourceUnavailable {
                url: url.to_string(),
                source,
            }
        };

        let path = parsed.to_file_path().map_err(|_| {
            unavailable(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a local file path",
            ))
        })?;

        debug!("reading {}", path.display());
        let file = File::open(&path).map_err(unavailable)?;
        let total = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Fetched {
            reader: Box::new(file),
            total,
        })
    }

    /// Fetches `url` and returns the body decoded as UTF-8.
    ///
    /// Invalid sequences are replaced rather than rejected; the caller
    /// decides what the text means.
    pub fn fetch_text(url: &str, cache_bust: bool) -> Result<String> {
        let mut fetched = Self::open(url, cache_bust)?;
        let mut body = Vec::new();
        fetched.reader.read_to_end(&mut body).map_err(|source| {
            DownloadError::Interrupted {
                url: url.to_string(),
                source,
            }
        })?;

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
