/// Client identity for rate limiting and security logging
///
/// The client IP is the first `X-Forwarded-For` entry when present (the API
/// runs behind a proxy in production), otherwise the socket peer address
/// from `ConnectInfo`. The request id is the `x-request-id` header assigned
/// by `SetRequestIdLayer`.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::SocketAddr;

use tasklane_shared::logging::sanitize;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const UNKNOWN: &str = "unknown";

/// Who sent a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub request_id: String,
}

impl ClientInfo {
    /// Builds client info from headers and the optional peer address
    pub fn from_parts(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let forwarded = headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let ip = match (forwarded, peer) {
            (Some(ip), _) => sanitize(ip),
            (None, Some(addr)) => addr.ip().to_string(),
            (None, None) => UNKNOWN.to_string(),
        };

        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(sanitize)
            .unwrap_or_else(|| UNKNOWN.to_string());

        Self { ip, request_id }
    }

    pub fn from_request_parts_sync(parts: &Parts) -> Self {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Self::from_parts(&parts.headers, peer)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_request_parts_sync(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-1"));

        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let info = ClientInfo::from_parts(&headers, Some(peer));

        assert_eq!(info.ip, "203.0.113.7");
        assert_eq!(info.request_id, "req-1");
    }

    #[test]
    fn test_peer_address_fallback() {
        let peer: SocketAddr = "192.0.2.1:443".parse().unwrap();
        let info = ClientInfo::from_parts(&HeaderMap::new(), Some(peer));

        assert_eq!(info.ip, "192.0.2.1");
        assert_eq!(info.request_id, "unknown");
    }

    #[test]
    fn test_unknown_without_peer() {
        let info = ClientInfo::from_parts(&HeaderMap::new(), None);
        assert_eq!(info.ip, "unknown");
    }
}
