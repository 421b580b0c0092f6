//! Where to connect and how to behave once connected

use std::time::Duration;

use crate::{
    backoff::BackoffConfig,
    constants::{DEFAULT_DELIMITER, MAX_LINE_LENGTH},
    tokenizer::LineTokenizer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Method {
    Get,
    #[default]
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// HTTP proxy the connection is made through instead of the target host
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn uri(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Everything a [`StreamSession`][crate::session::StreamSession] needs to know, fixed for the session's lifetime.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use firehose::{backoff::BackoffConfig, config::{Method, StreamConfig}};
///
/// let config = StreamConfig::new("stream.example.com", 443)
///     .with_method(Method::Get)
///     .with_path("/1/statuses/sample.json")
///     .with_param("delimited", "length")
///     .with_header("Accept-Encoding", "gzip")
///     .with_timeout(Duration::from_secs(90))
///     .with_backoff(BackoffConfig::default().with_max_reconnects(5));
///
/// assert_eq!(config.url(), "https://stream.example.com:443/1/statuses/sample.json");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StreamConfig {
    pub host: String,
    pub port: u16,
    pub method: Method,
    pub path: String,
    /// Query parameters for GET, form body for POST
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub user_agent: String,
    pub tls: bool,
    pub proxy: Option<ProxyConfig>,
    pub basic_auth: Option<Credentials>,
    /// Longest the connection may sit without receiving anything, zero waits forever
    pub timeout: Duration,
    pub backoff: BackoffConfig,
    /// Whether an unexpected close is followed by a reconnect at all
    pub auto_reconnect: bool,
    pub delimiter: String,
    pub max_line_length: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 443,
            method: Method::default(),
            path: String::from("/"),
            params: Vec::new(),
            headers: Vec::new(),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            tls: true,
            proxy: None,
            basic_auth: None,
            timeout: Duration::ZERO,
            backoff: BackoffConfig::default(),
            auto_reconnect: true,
            // the default delimiter is ascii
            delimiter: String::from_utf8_lossy(DEFAULT_DELIMITER).into_owned(),
            max_line_length: MAX_LINE_LENGTH,
        }
    }
}

impl StreamConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    #[must_use]
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    #[must_use]
    pub fn with_basic_auth(mut self, credentials: Credentials) -> Self {
        self.basic_auth = Some(credentials);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    #[must_use]
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls { "https" } else { "http" }
    }

    /// Target URL without query parameters
    pub fn url(&self) -> String {
        let separator = if self.path.starts_with('/') { "" } else { "/" };
        format!(
            "{}://{}:{}{}{}",
            self.scheme(),
            self.host,
            self.port,
            separator,
            self.path
        )
    }

    /// Host and port the transport actually dials, the proxy's when one is set
    pub fn connect_target(&self) -> (&str, u16) {
        match &self.proxy {
            Some(proxy) => (&proxy.host, proxy.port),
            None => (&self.host, self.port),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (!self.timeout.is_zero()).then_some(self.timeout)
    }

    /// A fresh tokenizer for one connection's body
    pub fn tokenizer(&self) -> LineTokenizer {
        LineTokenizer::with_delimiter(self.delimiter.clone().into_bytes(), self.max_line_length)
    }
}
