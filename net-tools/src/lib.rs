//! # net-tools
//!
//! Network diagnostics used by the bot's probe handlers. Each probe sits behind a trait so
//! handlers can be tested with recording fakes:
//!
//! - [`PingProbe`] / [`SystemPing`]: system `ping`, parsed statistics
//! - [`DnsProbe`] / [`HickoryDns`]: A, AAAA, CNAME, MX, TXT, NS, PTR lookups
//! - [`WhoisProbe`] / [`WhoisClient`]: WHOIS for domains, RDAP for IPv4
//! - [`TlsProbe`] / [`TlsInspector`]: handshake and leaf certificate summary
//! - [`IpDiscovery`] / [`CascadeIpDiscovery`]: the bot's own external IPv4
//!
//! Probe failures are reported inside the result (`ok == false`, `error`), never as `Err`.

mod dns;
mod error;
pub mod ipv4;
mod myip;
mod ping;
mod tls;
mod whois;

pub use dns::{reverse_name, DnsAnswer, DnsProbe, DnsRecordType, DnsResult, HickoryDns};
pub use error::ProbeError;
pub use myip::{
    first_ipv4, CascadeIpDiscovery, IpDiscovery, IpSource, MyIpResult, DEFAULT_ECHO_URL,
    GOOGLE_AUTH_SERVERS, OPENDNS_SERVERS,
};
pub use ping::{parse_ping_output, PingOptions, PingProbe, PingResult, SystemPing};
pub use tls::{days_between, hostname_matches, parse_certificate, CertSummary, TlsInfo, TlsInspector, TlsProbe};
pub use whois::{clean_whois_text, summarize_domain, summarize_rdap, WhoisClient, WhoisKind, WhoisProbe, WhoisResult};
