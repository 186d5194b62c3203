//! Input grammar for probe targets.
//!
//! - host: public IPv4 address or fully-qualified domain name
//! - PTR: public IPv4 address only
//! - TLS: `host` or `host:port`, port 1-65535, default 443; IPv6 rejected explicitly

use std::net::Ipv4Addr;
use std::sync::LazyLock;

use net_tools::ipv4::non_public_reason;
use regex::Regex;
use thiserror::Error;

pub const DEFAULT_TLS_PORT: u16 = 443;
const MAX_DOMAIN_LEN: usize = 253;

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("valid label regex")
});

/// Why a target was rejected. `Display` is the user-facing reason.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty input")]
    Empty,

    #[error("{0} is not allowed")]
    NonPublicAddress(&'static str),

    #[error("IPv6 is not supported")]
    Ipv6Unsupported,

    #[error("expected a public IPv4 address or a domain name (FQDN)")]
    NotHost,

    #[error("expected a public IPv4 address, e.g. 8.8.8.8")]
    NotIpv4,

    #[error("domain name is longer than 253 characters")]
    TooLong,

    #[error("port must be a number")]
    PortNotNumber,

    #[error("port out of range 1-65535")]
    PortOutOfRange,
}

/// A validated probe target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Ipv4(Ipv4Addr),
    /// Normalized: no trailing dot.
    Domain(String),
}

impl Target {
    pub fn as_query(&self) -> String {
        match self {
            Target::Ipv4(ip) => ip.to_string(),
            Target::Domain(name) => name.clone(),
        }
    }
}

/// Accepts a public IPv4 address; rejects private/reserved ranges with the range as reason.
pub fn validate_public_ipv4(text: &str) -> Result<Ipv4Addr, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::Empty);
    }
    if text.contains(':') {
        return Err(ValidationError::Ipv6Unsupported);
    }
    let ip: Ipv4Addr = text.parse().map_err(|_| ValidationError::NotIpv4)?;
    match non_public_reason(ip) {
        Some(reason) => Err(ValidationError::NonPublicAddress(reason)),
        None => Ok(ip),
    }
}

/// True for a syntactically valid FQDN: at least two labels, non-numeric TLD, trailing dot allowed.
pub fn is_fqdn(text: &str) -> bool {
    let name = text.strip_suffix('.').unwrap_or(text);
    if name.is_empty() || name.len() > MAX_DOMAIN_LEN {
        return false;
    }
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 || !labels.iter().all(|l| LABEL_RE.is_match(l)) {
        return false;
    }
    labels
        .last()
        .is_some_and(|tld| !tld.chars().all(|c| c.is_ascii_digit()))
}

/// Public IPv4 or FQDN.
pub fn validate_host(text: &str) -> Result<Target, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::Empty);
    }
    if text.contains(':') {
        return Err(ValidationError::Ipv6Unsupported);
    }
    if let Ok(ip) = text.parse::<Ipv4Addr>() {
        return match non_public_reason(ip) {
            Some(reason) => Err(ValidationError::NonPublicAddress(reason)),
            None => Ok(Target::Ipv4(ip)),
        };
    }
    if text.strip_suffix('.').unwrap_or(text).len() > MAX_DOMAIN_LEN {
        return Err(ValidationError::TooLong);
    }
    if is_fqdn(text) {
        return Ok(Target::Domain(
            text.trim_end_matches('.').to_ascii_lowercase(),
        ));
    }
    Err(ValidationError::NotHost)
}

/// `host[:port]` for TLS inspection.
pub fn parse_tls_target(text: &str) -> Result<(Target, u16), ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::Empty);
    }
    if text.matches(':').count() >= 2 {
        return Err(ValidationError::Ipv6Unsupported);
    }

    let (host, port) = match text.rsplit_once(':') {
        Some((host, port)) => {
            if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
                return Err(ValidationError::PortNotNumber);
            }
            let port = port
                .parse::<u32>()
                .ok()
                .filter(|p| (1..=65535).contains(p))
                .ok_or(ValidationError::PortOutOfRange)?;
            (host, port as u16)
        }
        None => (text, DEFAULT_TLS_PORT),
    };

    Ok((validate_host(host)?, port))
}
