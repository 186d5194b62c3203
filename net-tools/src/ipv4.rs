//! Classification of IPv4 addresses that are not reachable on the public internet.

use std::net::Ipv4Addr;

/// Why `ip` is not a public unicast address, or `None` if it is.
pub fn non_public_reason(ip: Ipv4Addr) -> Option<&'static str> {
    let [a, b, c, _] = ip.octets();
    let reason = if ip.is_unspecified() {
        "unspecified address"
    } else if a == 0 {
        "\"this network\" range 0.0.0.0/8"
    } else if ip.is_loopback() {
        "loopback address"
    } else if ip.is_private() {
        "private address"
    } else if ip.is_link_local() {
        "link-local address"
    } else if a == 100 && (b & 0xc0) == 64 {
        "shared address space 100.64.0.0/10"
    } else if a == 198 && (b & 0xfe) == 18 {
        "benchmarking range 198.18.0.0/15"
    } else if (a, b, c) == (192, 0, 2) || (a, b, c) == (198, 51, 100) || (a, b, c) == (203, 0, 113) {
        "documentation range"
    } else if (a, b, c) == (192, 0, 0) {
        "IETF protocol assignment range"
    } else if ip.is_multicast() {
        "multicast address"
    } else if ip.is_broadcast() {
        "broadcast address"
    } else if a >= 240 {
        "reserved address"
    } else {
        return None;
    };
    Some(reason)
}

pub fn is_public(ip: Ipv4Addr) -> bool {
    non_public_reason(ip).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(s: &str) -> Option<&'static str> {
        non_public_reason(s.parse().unwrap())
    }

    #[test]
    fn test_public_addresses() {
        for ip in ["8.8.8.8", "1.1.1.1", "93.184.216.34", "100.128.0.1", "198.20.0.1", "223.255.255.254"] {
            assert_eq!(reason(ip), None, "{ip}");
        }
    }

    #[test]
    fn test_non_public_addresses() {
        assert_eq!(reason("10.0.0.1"), Some("private address"));
        assert_eq!(reason("172.16.5.4"), Some("private address"));
        assert_eq!(reason("192.168.1.1"), Some("private address"));
        assert_eq!(reason("127.0.0.1"), Some("loopback address"));
        assert_eq!(reason("169.254.1.1"), Some("link-local address"));
        assert_eq!(reason("224.0.0.1"), Some("multicast address"));
        assert_eq!(reason("255.255.255.255"), Some("broadcast address"));
        assert_eq!(reason("240.0.0.1"), Some("reserved address"));
        assert_eq!(reason("0.0.0.0"), Some("unspecified address"));
        assert_eq!(reason("0.1.2.3"), Some("\"this network\" range 0.0.0.0/8"));
        assert_eq!(reason("100.64.0.1"), Some("shared address space 100.64.0.0/10"));
        assert_eq!(reason("198.19.255.1"), Some("benchmarking range 198.18.0.0/15"));
        assert_eq!(reason("203.0.113.9"), Some("documentation range"));
        assert_eq!(reason("192.0.0.8"), Some("IETF protocol assignment range"));
    }
}
