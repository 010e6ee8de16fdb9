//! Client metadata extraction from HTTP request headers.

use axum::http::{HeaderMap, HeaderName, header};
use std::net::SocketAddr;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// Request metadata attached to a click event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

impl ClientContext {
    /// Collects client IP, user agent and referer from a request.
    ///
    /// Header values that are not valid UTF-8 are treated as absent.
    pub fn from_request(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        Self {
            ip_address: client_ip(headers, peer),
            user_agent: header_str(headers, &header::USER_AGENT),
            referer: header_str(headers, &header::REFERER),
        }
    }
}

/// Resolves the client IP address.
///
/// Priority:
/// 1. First entry of `X-Forwarded-For`
/// 2. `X-Real-IP`
/// 3. Transport peer address
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if let Some(forwarded) = header_str(headers, &X_FORWARDED_FOR)
        && let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty())
    {
        return Some(first.to_string());
    }

    if let Some(real_ip) = header_str(headers, &X_REAL_IP) {
        return Some(real_ip);
    }

    peer.map(|addr| addr.ip().to_string())
}

fn header_str(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.9:51000".parse().unwrap())
    }

    #[test]
    fn test_forwarded_for_first_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            X_FORWARDED_FOR,
            HeaderValue::from_static("203.0.113.7, 70.41.3.18, 150.172.238.178"),
        );
        headers.insert(X_REAL_IP, HeaderValue::from_static("198.51.100.1"));

        assert_eq!(client_ip(&headers, peer()).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_real_ip_used_without_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REAL_IP, HeaderValue::from_static("198.51.100.1"));

        assert_eq!(client_ip(&headers, peer()).as_deref(), Some("198.51.100.1"));
    }

    #[test]
    fn test_blank_headers_fall_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(" , "));
        headers.insert(X_REAL_IP, HeaderValue::from_static(""));

        assert_eq!(client_ip(&headers, peer()).as_deref(), Some("10.0.0.9"));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn test_context_collects_user_agent_and_referer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        headers.insert(header::REFERER, HeaderValue::from_static("https://google.com"));

        let context = ClientContext::from_request(&headers, peer());

        assert_eq!(context.ip_address.as_deref(), Some("10.0.0.9"));
        assert_eq!(context.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(context.referer.as_deref(), Some("https://google.com"));
    }

    #[test]
    fn test_non_utf8_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap(),
        );

        assert!(ClientContext::from_request(&headers, None).user_agent.is_none());
    }
}
