//! Client address extraction for the HTTP boundary.

use std::net::SocketAddr;

/// Pick the client IP from proxy headers, falling back to the peer address.
///
/// Priority: first `X-Forwarded-For` element, then `X-Real-IP`, then the
/// socket peer. Blank header values are skipped.
pub fn extract_client_ip(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    peer: Option<SocketAddr>,
) -> Option<String> {
    let forwarded = forwarded_for
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real = real_ip.map(str::trim).filter(|v| !v.is_empty());

    forwarded
        .or(real)
        .map(str::to_owned)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some(SocketAddr::from(([10, 0, 0, 7], 54321)))
    }

    #[test]
    fn test_forwarded_for_takes_first_element() {
        let ip = extract_client_ip(Some(" 1.2.3.4 , 5.6.7.8"), Some("9.9.9.9"), peer());
        assert_eq!(ip.as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn test_real_ip_when_no_forwarded_for() {
        let ip = extract_client_ip(None, Some(" 9.9.9.9 "), peer());
        assert_eq!(ip.as_deref(), Some("9.9.9.9"));
    }

    #[test]
    fn test_blank_forwarded_for_falls_through() {
        let ip = extract_client_ip(Some(" , 5.6.7.8"), None, peer());
        assert_eq!(ip.as_deref(), Some("10.0.0.7"));
    }

    #[test]
    fn test_peer_address_drops_port() {
        assert_eq!(extract_client_ip(None, None, peer()).as_deref(), Some("10.0.0.7"));
    }

    #[test]
    fn test_nothing_available() {
        assert!(extract_client_ip(None, Some(""), None).is_none());
    }
}
