//! DNS lookups over hickory-resolver.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Record types offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DnsRecordType {
    A,
    Aaaa,
    Cname,
    Mx,
    Txt,
    Ns,
    Ptr,
}

impl DnsRecordType {
    pub const ALL: [DnsRecordType; 7] = [
        DnsRecordType::A,
        DnsRecordType::Aaaa,
        DnsRecordType::Cname,
        DnsRecordType::Mx,
        DnsRecordType::Txt,
        DnsRecordType::Ns,
        DnsRecordType::Ptr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DnsRecordType::A => "A",
            DnsRecordType::Aaaa => "AAAA",
            DnsRecordType::Cname => "CNAME",
            DnsRecordType::Mx => "MX",
            DnsRecordType::Txt => "TXT",
            DnsRecordType::Ns => "NS",
            DnsRecordType::Ptr => "PTR",
        }
    }

    /// Case-insensitive parse; `None` for anything outside the offered set.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
    }

    /// Like [`DnsRecordType::parse`] but unknown names fall back to `A`.
    pub fn parse_or_default(name: &str) -> Self {
        Self::parse(name).unwrap_or(DnsRecordType::A)
    }

    fn wire(&self) -> RecordType {
        match self {
            DnsRecordType::A => RecordType::A,
            DnsRecordType::Aaaa => RecordType::AAAA,
            DnsRecordType::Cname => RecordType::CNAME,
            DnsRecordType::Mx => RecordType::MX,
            DnsRecordType::Txt => RecordType::TXT,
            DnsRecordType::Ns => RecordType::NS,
            DnsRecordType::Ptr => RecordType::PTR,
        }
    }
}

impl fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DnsAnswer {
    pub value: String,
    pub ttl: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DnsResult {
    pub ok: bool,
    pub record_type: DnsRecordType,
    /// Name actually queried (the `in-addr.arpa` name for PTR).
    pub qname: String,
    pub answers: Vec<DnsAnswer>,
    /// Final name when a CNAME chain was followed.
    pub canonical_name: Option<String>,
    pub resolver: Option<String>,
    pub error: Option<String>,
}

impl DnsResult {
    fn failed(record_type: DnsRecordType, qname: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            record_type,
            qname: qname.into(),
            answers: Vec::new(),
            canonical_name: None,
            resolver: None,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait DnsProbe: Send + Sync {
    async fn lookup(&self, name: &str, record_type: DnsRecordType, timeout: Duration) -> DnsResult;
}

/// Resolver over a fixed upstream configuration (system resolv.conf by default).
#[derive(Debug, Clone)]
pub struct HickoryDns {
    config: ResolverConfig,
}

impl HickoryDns {
    /// Uses the system configuration, falling back to the resolver library's public defaults.
    pub fn from_system() -> Self {
        match hickory_resolver::system_conf::read_system_conf() {
            Ok((config, _)) => Self { config },
            Err(e) => {
                warn!(error = %e, "System resolver config unreadable, using defaults");
                Self {
                    config: ResolverConfig::default(),
                }
            }
        }
    }

    /// Queries only the given nameservers (UDP+TCP on port 53).
    pub fn with_nameservers(servers: &[IpAddr]) -> Self {
        let group = NameServerConfigGroup::from_ips_clear(servers, 53, true);
        Self {
            config: ResolverConfig::from_parts(None, Vec::new(), group),
        }
    }

    /// Comma-separated nameserver addresses, deduplicated, in configuration order.
    pub fn nameservers(&self) -> String {
        let mut ips: Vec<String> = Vec::new();
        for ns in self.config.name_servers() {
            let ip = ns.socket_addr.ip().to_string();
            if !ips.contains(&ip) {
                ips.push(ip);
            }
        }
        ips.join(",")
    }

    fn resolver(&self, timeout: Duration) -> TokioAsyncResolver {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        opts.cache_size = 0;
        TokioAsyncResolver::tokio(self.config.clone(), opts)
    }

    /// Raw record data for `qname`, mapped to user-facing error strings.
    pub(crate) async fn query(
        &self,
        qname: &str,
        record_type: RecordType,
        timeout: Duration,
    ) -> Result<Vec<(RData, u32, String)>, String> {
        let resolver = self.resolver(timeout);
        let fqdn = format!("{}.", qname.trim_end_matches('.'));
        // Bounds retries across nameservers, not just a single round trip.
        let overall = timeout.saturating_mul(2);
        let lookup = match tokio::time::timeout(overall, resolver.lookup(fqdn, record_type)).await {
            Ok(Ok(lookup)) => lookup,
            Ok(Err(e)) => return Err(describe_error(&e)),
            Err(_) => return Err("Timeout".to_string()),
        };

        Ok(lookup
            .records()
            .iter()
            .filter_map(|record| {
                record.data().map(|data| {
                    (
                        data.clone(),
                        record.ttl(),
                        trim_dot(&record.name().to_string()),
                    )
                })
            })
            .collect())
    }
}

#[async_trait]
impl DnsProbe for HickoryDns {
    #[instrument(skip(self))]
    async fn lookup(&self, name: &str, record_type: DnsRecordType, timeout: Duration) -> DnsResult {
        let mut qname = trim_dot(name.trim());
        if record_type == DnsRecordType::Ptr {
            match qname.parse::<Ipv4Addr>() {
                Ok(ip) => qname = reverse_name(ip),
                Err(_) => return DnsResult::failed(record_type, name, "invalid IPv4 for PTR"),
            }
        }

        let records = match self.query(&qname, record_type.wire(), timeout).await {
            Ok(records) => records,
            Err(error) => {
                info!(qname = %qname, record_type = %record_type, error = %error, "step: dns lookup failed");
                return DnsResult::failed(record_type, qname, error);
            }
        };

        let wanted = record_type.wire();
        let mut canonical_name = None;
        let mut answers = Vec::new();
        for (data, ttl, owner) in &records {
            if data.record_type() == wanted {
                if owner != &qname && canonical_name.is_none() {
                    canonical_name = Some(owner.clone());
                }
                answers.push(DnsAnswer {
                    value: format_rdata(data),
                    ttl: Some(*ttl),
                });
            }
        }

        if answers.is_empty() {
            return DnsResult::failed(record_type, qname, "No answer");
        }

        info!(qname = %qname, record_type = %record_type, answers = answers.len(), "step: dns lookup finished");
        DnsResult {
            ok: true,
            record_type,
            qname,
            answers,
            canonical_name,
            resolver: Some(self.nameservers()),
            error: None,
        }
    }
}

fn describe_error(e: &ResolveError) -> String {
    match e.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => {
            if *response_code == ResponseCode::NXDomain {
                "NXDOMAIN (name does not exist)".to_string()
            } else {
                "No answer".to_string()
            }
        }
        ResolveErrorKind::Timeout => "Timeout".to_string(),
        _ => format!("DNS error: {}", e),
    }
}

/// `1.2.3.4` becomes `4.3.2.1.in-addr.arpa`.
pub fn reverse_name(ip: Ipv4Addr) -> String {
    let [a, b, c, d] = ip.octets();
    format!("{}.{}.{}.{}.in-addr.arpa", d, c, b, a)
}

pub(crate) fn format_rdata(data: &RData) -> String {
    match data {
        RData::A(a) => a.to_string(),
        RData::AAAA(aaaa) => aaaa.to_string(),
        RData::CNAME(name) => trim_dot(&name.0.to_string()),
        RData::NS(name) => trim_dot(&name.0.to_string()),
        RData::PTR(name) => trim_dot(&name.0.to_string()),
        RData::MX(mx) => format!("{} {}", mx.preference(), trim_dot(&mx.exchange().to_string())),
        RData::TXT(txt) => txt_to_string(txt.txt_data()),
        other => other.to_string(),
    }
}

/// Joins TXT character-strings without the presentation quoting.
pub(crate) fn txt_to_string(parts: &[Box<[u8]>]) -> String {
    parts
        .iter()
        .map(|part| String::from_utf8_lossy(part))
        .collect::<Vec<_>>()
        .concat()
}

fn trim_dot(name: &str) -> String {
    name.trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_resolver::proto::rr::rdata::{A, CNAME, MX, TXT};
    use hickory_resolver::proto::rr::Name;
    use std::str::FromStr;

    #[test]
    fn test_reverse_name() {
        assert_eq!(reverse_name(Ipv4Addr::new(8, 8, 4, 4)), "4.4.8.8.in-addr.arpa");
        assert_eq!(reverse_name(Ipv4Addr::new(1, 2, 3, 4)), "4.3.2.1.in-addr.arpa");
    }

    #[test]
    fn test_record_type_parse() {
        assert_eq!(DnsRecordType::parse("mx"), Some(DnsRecordType::Mx));
        assert_eq!(DnsRecordType::parse(" AAAA "), Some(DnsRecordType::Aaaa));
        assert_eq!(DnsRecordType::parse("SOA"), None);
        assert_eq!(DnsRecordType::parse_or_default("SRV"), DnsRecordType::A);
        assert_eq!(DnsRecordType::Ptr.to_string(), "PTR");
    }

    #[test]
    fn test_format_rdata() {
        assert_eq!(format_rdata(&RData::A(A::new(93, 184, 216, 34))), "93.184.216.34");

        let exchange = Name::from_str("mail.example.com.").unwrap();
        assert_eq!(
            format_rdata(&RData::MX(MX::new(10, exchange))),
            "10 mail.example.com"
        );

        let target = Name::from_str("www.example.net.").unwrap();
        assert_eq!(format_rdata(&RData::CNAME(CNAME(target))), "www.example.net");

        let txt = TXT::new(vec!["v=spf1 ".to_string(), "-all".to_string()]);
        assert_eq!(format_rdata(&RData::TXT(txt)), "v=spf1 -all");
    }

    #[tokio::test]
    async fn test_ptr_rejects_non_ipv4() {
        let dns = HickoryDns::with_nameservers(&[IpAddr::V4(Ipv4Addr::LOCALHOST)]);
        let result = dns
            .lookup("example.com", DnsRecordType::Ptr, Duration::from_secs(1))
            .await;
        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some("invalid IPv4 for PTR"));
    }

    #[test]
    fn test_nameservers_listing() {
        let dns = HickoryDns::with_nameservers(&[
            "208.67.222.222".parse().unwrap(),
            "208.67.220.220".parse().unwrap(),
        ]);
        assert_eq!(dns.nameservers(), "208.67.222.222,208.67.220.220");
    }
}
