//! Gateway configuration with validation.
//!
//! Loaded from an optional TOML file, then overridden from `PORTAL_*`
//! environment variables, then from command line flags in `main`.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use super::types::DEFAULT_MAX_SIGNATURE_LENGTH;

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// Upstream authority endpoints
    pub upstream: UpstreamConfig,
    /// Request validation limits
    pub limits: LimitsConfig,
    /// Timeout configuration
    pub timeouts: TimeoutConfig,
    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Client IP resolution
    pub security: SecurityConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Read a TOML configuration file. Missing sections keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `PORTAL_*` environment overrides.
    ///
    /// - `PORTAL_HTTP_HOST`, `PORTAL_HTTP_PORT`
    /// - `PORTAL_AUTHORITY_URL`, `PORTAL_STORAGE_URL`
    /// - `PORTAL_LOG_LEVEL`, `PORTAL_LOG_JSON`
    /// - `PORTAL_RATE_LIMIT_ENABLED`
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("PORTAL_HTTP_HOST").and_then(|v| v.parse().ok()) {
            self.http.host = host;
        }
        if let Some(port) = lookup("PORTAL_HTTP_PORT").and_then(|v| v.parse().ok()) {
            self.http.port = port;
        }
        if let Some(url) = lookup("PORTAL_AUTHORITY_URL") {
            self.upstream.authority_url = url;
        }
        if let Some(url) = lookup("PORTAL_STORAGE_URL") {
            self.upstream.storage_url = url;
        }
        if let Some(level) = lookup("PORTAL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("PORTAL_LOG_JSON").and_then(|v| parse_flag(&v)) {
            self.logging.json = json;
        }
        if let Some(enabled) = lookup("PORTAL_RATE_LIMIT_ENABLED").and_then(|v| parse_flag(&v)) {
            self.rate_limit.enabled = enabled;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_base_url("upstream.authority_url", &self.upstream.authority_url)?;
        validate_base_url("upstream.storage_url", &self.upstream.storage_url)?;

        if self.rate_limit.enabled && self.rate_limit.requests_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "requests_per_second cannot be 0".into(),
            ));
        }
        if self.rate_limit.enabled && self.rate_limit.writes_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "writes_per_second cannot be 0".into(),
            ));
        }

        if self.limits.max_request_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_request_size cannot be 0".into(),
            ));
        }
        if self.limits.max_signature_length == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_signature_length cannot be 0".into(),
            ));
        }

        if self.timeouts.request.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "request timeout cannot be 0".into(),
            ));
        }
        if self.upstream.authority_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "authority_timeout cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn validate_base_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(value)
        .map_err(|e| ConfigError::InvalidUpstream(format!("{field}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUpstream(format!(
            "{field}: unsupported scheme {}",
            url.scheme()
        )));
    }
    Ok(())
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
        }
    }
}

/// Upstream authority endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the token/invoice authority, e.g.
    /// `http://dispatch-data/internal/invoice-portal`
    pub authority_url: String,
    /// Base URL of the document storage authority, e.g.
    /// `http://dispatch-invoice/api/invoicefiles`
    pub storage_url: String,
    /// Total timeout for a single authority call
    #[serde(with = "humantime_serde")]
    pub authority_timeout: Duration,
    /// Connect timeout for both authorities. Storage calls have no total
    /// timeout so long documents are not cut off mid-stream.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            authority_url: "http://localhost:5001/internal/invoice-portal".to_string(),
            storage_url: "http://localhost:5002/api/invoicefiles".to_string(),
            authority_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Request limits configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Max request body size in bytes (default: 64KB)
    pub max_request_size: usize,
    /// Max signature path length in characters
    pub max_signature_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: 64 * 1024,
            max_signature_length: DEFAULT_MAX_SIGNATURE_LENGTH,
        }
    }
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound on producing a response (headers). Streaming bodies are
    /// not bounded by this.
    #[serde(with = "humantime_serde")]
    pub request: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(30),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,
    /// Read (GET) requests per second per IP
    pub requests_per_second: u32,
    /// Write (POST) requests per second per IP
    pub writes_per_second: u32,
    /// Burst allowance (token bucket)
    pub burst_size: u32,
    /// IPs exempt from rate limiting
    pub whitelist: Vec<IpAddr>,
    /// Buckets idle longer than this are dropped
    #[serde(with = "humantime_serde")]
    pub idle_bucket_ttl: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 10,
            writes_per_second: 2,
            burst_size: 30,
            whitelist: Vec::new(),
            idle_bucket_ttl: Duration::from_secs(300),
        }
    }
}

/// CORS configuration. The portal is public, so everything is allowed by
/// default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins ("*" for all)
    pub allowed_origins: Vec<String>,
    /// Allowed methods ("*" for all)
    pub allowed_methods: Vec<String>,
    /// Allowed headers ("*" for all)
    pub allowed_headers: Vec<String>,
    /// Headers exposed to browsers
    pub expose_headers: Vec<String>,
    /// Max age for preflight cache, in seconds
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["*".to_string()],
            allowed_headers: vec!["*".to_string()],
            expose_headers: vec![
                "Content-Range".to_string(),
                "Accept-Ranges".to_string(),
                "Content-Length".to_string(),
            ],
            max_age: 86400,
        }
    }
}

/// Client IP resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Proxies allowed to set X-Forwarded-For / X-Real-IP
    pub trusted_proxies: Vec<IpAddr>,
    /// Trust private IPs (10.x, 172.16.x, 192.168.x) as proxies
    pub trust_private_ips: bool,
    /// Number of proxies in chain (for X-Forwarded-For parsing)
    pub proxy_count: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            trusted_proxies: Vec::new(),
            trust_private_ips: false,
            proxy_count: 1,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config: {0}")]
    Io(String),
    /// Config file could not be parsed
    #[error("cannot parse config: {0}")]
    Parse(String),
    /// Upstream base URL is missing or malformed
    #[error("invalid upstream: {0}")]
    InvalidUpstream(String),
    /// Invalid rate limiting configuration
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}

/// Duration (de)serialization as `"30s"`, `"500ms"`, `"2m"` or plain seconds.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() != 0 {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
