use std::{
    sync::{LazyLock, PoisonError, RwLock},
    time::Duration,
};

use ureq::{
    http::{self, HeaderMap, Uri},
    typestate::WithoutBody,
    Agent, Proxy, RequestBuilder,
};

pub const DEFAULT_USER_AGENT: &str = concat!("bundlesync/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub user_agent: Option<String>,
    pub headers: Option<HeaderMap>,
    pub proxy: Option<Proxy>,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    /// Defaults to the `bundlesync/<version>` user agent, no proxy, no extra
    /// headers and no timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use bundlesync_dl::http_client::ClientConfig;
    ///
    /// let cfg = ClientConfig::default();
    /// assert!(cfg.user_agent.unwrap().starts_with("bundlesync/"));
    /// assert!(cfg.timeout.is_none());
    /// ```
    fn default() -> Self {
        Self {
            user_agent: Some(DEFAULT_USER_AGENT.into()),
            proxy: None,
            headers: None,
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Builds an HTTP `Agent` configured from this `ClientConfig`.
    ///
    /// Non-2xx responses are returned as responses rather than errors so that
    /// callers can report the status together with the URL they requested.
    pub fn build(&self) -> Agent {
        let mut config = Agent::config_builder()
            .proxy(self.proxy.clone())
            .timeout_global(self.timeout)
            .http_status_as_error(false);

        if let Some(user_agent) = &self.user_agent {
            config = config.user_agent(user_agent);
        }

        config.build().into()
    }
}

struct SharedClient {
    agent: Agent,
    config: ClientConfig,
}

static SHARED_CLIENT_STATE: LazyLock<RwLock<SharedClient>> = LazyLock::new(|| {
    let config = ClientConfig::default();
    let agent = config.build();

    RwLock::new(SharedClient {
        agent,
        config,
    })
});

/// Handle to the process-wide HTTP agent.
#[derive(Clone, Default)]
pub struct SharedAgent;

impl SharedAgent {
    pub fn new() -> Self {
        Self
    }

    /// Create a GET request builder for the given URI using the shared agent.
    ///
    /// Any global headers configured in the shared client are applied to the request.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bundlesync_dl::http_client::SHARED_AGENT;
    ///
    /// let response = SHARED_AGENT.get("https://example.com/manifest.json").call();
    /// ```
    pub fn get<T>(&self, uri: T) -> RequestBuilder<WithoutBody>
    where
        Uri: TryFrom<T>,
        <Uri as TryFrom<T>>::Error: Into<http::Error>,
    {
        let state = SHARED_CLIENT_STATE
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let req = state.agent.get(uri);
        apply_headers(req, &state.config.headers)
    }
}

fn apply_headers<B>(mut req: RequestBuilder<B>, headers: &Option<HeaderMap>) -> RequestBuilder<B> {
    if let Some(headers) = headers {
        for (key, value) in headers.iter() {
            req = req.header(key, value);
        }
    }
    req
}

pub static SHARED_AGENT: LazyLock<SharedAgent> = LazyLock::new(SharedAgent::new);

/// Updates the shared HTTP client configuration and rebuilds the agent.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use bundlesync_dl::http_client::configure_http_client;
///
/// configure_http_client(|cfg| {
///     cfg.timeout = Some(Duration::from_secs(30));
/// });
/// ```
pub fn configure_http_client<F>(updater: F)
where
    F: FnOnce(&mut ClientConfig),
{
    let mut state = SHARED_CLIENT_STATE
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    let mut new_config = state.config.clone();
    updater(&mut new_config);
    state.agent = new_config.build();
    state.config = new_config;
}

#[cfg(test)]
mod tests {
    use ureq::http::{header::USER_AGENT, HeaderValue};

    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.user_agent.as_deref(), Some(DEFAULT_USER_AGENT));
        assert!(config.proxy.is_none());
        assert!(config.headers.is_none());
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_client_config_with_timeout_builds() {
        let config = ClientConfig {
            user_agent: Some("test-agent".to_string()),
            proxy: None,
            headers: None,
            timeout: Some(Duration::from_secs(30)),
        };
        let agent = config.build();
        let _ = agent.get("https://example.com");
    }

    #[test]
    fn test_configure_http_client() {
        configure_http_client(|cfg| {
            cfg.timeout = Some(Duration::from_secs(10));
        });

        let timeout = SHARED_CLIENT_STATE
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .config
            .timeout;
        assert_eq!(timeout, Some(Duration::from_secs(10)));
        let _ = SHARED_AGENT.get("https://example.com");
    }

    #[test]
    fn test_apply_headers_some() {
        let agent: Agent = Agent::config_builder().build().into();
        let req = agent.get("https://example.com");

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("test-agent"));

        let _ = apply_headers(req, &Some(headers));
    }
}
