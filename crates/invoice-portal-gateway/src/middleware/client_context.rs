//! Client identity for logging and rate limiting.
//!
//! Resolves the caller's IP and user agent once per request and stores them
//! as a [`ClientContext`] request extension. Forwarded headers
//! (`X-Forwarded-For`, then `X-Real-IP`) are honoured only when the direct
//! peer is a trusted proxy, so a caller cannot pick its own rate-limit key.

use crate::domain::config::SecurityConfig;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header::USER_AGENT, HeaderMap, Request},
    response::Response,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{debug, warn};

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";
const UNKNOWN_AGENT: &str = "unknown";

/// Resolved caller identity, available to handlers via `Extension`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub ip: IpAddr,
    pub user_agent: String,
}

impl Default for ClientContext {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            user_agent: UNKNOWN_AGENT.to_string(),
        }
    }
}

/// Client context layer
#[derive(Clone)]
pub struct ClientContextLayer {
    config: Arc<SecurityConfig>,
}

impl ClientContextLayer {
    pub fn new(config: SecurityConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for ClientContextLayer {
    type Service = ClientContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientContextService {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

#[derive(Clone)]
pub struct ClientContextService<S> {
    inner: S,
    config: Arc<SecurityConfig>,
}

impl<S> Service<Request<Body>> for ClientContextService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let direct_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

        let context = ClientContext {
            ip: resolve_client_ip(req.headers(), direct_ip, &self.config),
            user_agent: req
                .headers()
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .unwrap_or(UNKNOWN_AGENT)
                .to_string(),
        };
        req.extensions_mut().insert(context);

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}

/// Determine the real client IP based on trusted proxy configuration
pub fn resolve_client_ip(headers: &HeaderMap, direct_ip: IpAddr, config: &SecurityConfig) -> IpAddr {
    if !is_trusted_proxy(direct_ip, config) {
        if headers.contains_key(FORWARDED_FOR) {
            warn!(direct_ip = %direct_ip, "Ignoring X-Forwarded-For from untrusted source");
        }
        return direct_ip;
    }

    // X-Forwarded-For: client, proxy1, proxy2. Take the Nth from the right.
    if let Some(value) = headers.get(FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        let ips: Vec<&str> = value.split(',').map(str::trim).collect();
        let index = ips.len().saturating_sub(config.proxy_count + 1);
        if let Some(ip) = ips.get(index).and_then(|s| s.parse::<IpAddr>().ok()) {
            debug!(extracted_ip = %ip, "Client IP from X-Forwarded-For");
            return ip;
        }
    }

    if let Some(ip) = headers
        .get(REAL_IP)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    direct_ip
}

fn is_trusted_proxy(ip: IpAddr, config: &SecurityConfig) -> bool {
    config.trusted_proxies.contains(&ip)
        || ip.is_loopback()
        || (config.trust_private_ips && is_private_ip(ip))
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => ipv4.is_private() || ipv4.is_link_local(),
        // Unique local addresses (fc00::/7)
        IpAddr::V6(ipv6) => (ipv6.octets()[0] & 0xfe) == 0xfc,
    }
}
