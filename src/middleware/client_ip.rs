//! Client address resolution
//!
//! Behind a proxy chain the first public entry of `X-Forwarded-For` is the
//! real caller. Private IPv4 ranges (10/8, 172.16/12, 192.168/16) are
//! skipped. Without the header the socket peer address is used.

use axum::http::HeaderMap;
use std::net::{Ipv4Addr, SocketAddr};

const FORWARDED_FOR: &str = "x-forwarded-for";
const MAPPED_V4_PREFIX: &str = "::ffff:";

/// Resolve the caller's address from forwarding headers or the peer socket
pub fn extract_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if let Some(forwarded) = headers.get(FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        let entries: Vec<&str> = forwarded
            .split(',')
            .map(|entry| strip_mapped_prefix(entry.trim()))
            .filter(|entry| !entry.is_empty())
            .collect();

        if let Some(public) = entries.iter().find(|entry| !is_private(entry)) {
            return Some(public.to_string());
        }
        if let Some(first) = entries.first() {
            return Some(first.to_string());
        }
    }

    peer.map(|addr| addr.ip().to_canonical().to_string())
}

fn strip_mapped_prefix(entry: &str) -> &str {
    entry.strip_prefix(MAPPED_V4_PREFIX).unwrap_or(entry)
}

fn is_private(entry: &str) -> bool {
    entry
        .parse::<Ipv4Addr>()
        .map(|ip| ip.is_private())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_first_public_forwarded_entry() {
        let headers = forwarded("10.0.0.4, 172.20.1.1, ::ffff:203.0.113.8, 198.51.100.2");
        assert_eq!(extract_client_ip(&headers, None).as_deref(), Some("203.0.113.8"));
    }

    #[test]
    fn test_all_private_falls_back_to_first() {
        let headers = forwarded("192.168.1.10, 10.1.2.3");
        assert_eq!(extract_client_ip(&headers, None).as_deref(), Some("192.168.1.10"));
    }

    #[test]
    fn test_172_outside_private_block_is_public() {
        let headers = forwarded("172.32.0.1");
        assert_eq!(extract_client_ip(&headers, None).as_deref(), Some("172.32.0.1"));
    }

    #[test]
    fn test_peer_address_fallback() {
        let peer: SocketAddr = "[::ffff:198.51.100.77]:51000".parse().unwrap();
        assert_eq!(
            extract_client_ip(&HeaderMap::new(), Some(peer)).as_deref(),
            Some("198.51.100.77")
        );
        assert_eq!(extract_client_ip(&HeaderMap::new(), None), None);
    }
}
