use std::net::SocketAddr;

use axum::http::HeaderMap;
use hex::encode as hex_encode;
use sha2::{Digest, Sha256};

const FALLBACK_IP: &str = "127.0.0.1";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Caller address: CDN header, then proxy real-ip, then the first forwarded-for hop,
/// then the socket peer.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(ip) = header(headers, "cf-connecting-ip").or_else(|| header(headers, "x-real-ip")) {
        return ip.to_string();
    }
    if let Some(first) = header(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| FALLBACK_IP.to_string())
}

/// Salted SHA-256 of the address, hex-encoded. The raw IP is never stored.
pub fn hash_ip(ip: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hasher.update(salt.as_bytes());
    hex_encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.9:51000".parse().unwrap())
    }

    #[test]
    fn header_precedence() {
        let mut h = HeaderMap::new();
        assert_eq!(resolve_client_ip(&h, peer()), "10.0.0.9");
        assert_eq!(resolve_client_ip(&h, None), "127.0.0.1");

        h.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.5 , 10.0.0.1"));
        assert_eq!(resolve_client_ip(&h, peer()), "203.0.113.5");

        h.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));
        assert_eq!(resolve_client_ip(&h, peer()), "198.51.100.7");

        h.insert("cf-connecting-ip", HeaderValue::from_static("192.0.2.1"));
        assert_eq!(resolve_client_ip(&h, peer()), "192.0.2.1");
    }

    #[test]
    fn blank_headers_are_skipped() {
        let mut h = HeaderMap::new();
        h.insert("cf-connecting-ip", HeaderValue::from_static("  "));
        h.insert("x-forwarded-for", HeaderValue::from_static(",10.0.0.1"));
        assert_eq!(resolve_client_ip(&h, peer()), "10.0.0.9");
    }

    #[test]
    fn hash_is_salted_and_stable() {
        let a = hash_ip("192.0.2.1", "pepper");
        assert_eq!(a, hash_ip("192.0.2.1", "pepper"));
        assert_ne!(a, hash_ip("192.0.2.1", "salt"));
        assert_eq!(a.len(), 64);
        assert!(!a.contains("192"));
    }
}
