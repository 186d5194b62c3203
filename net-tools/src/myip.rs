//! External IPv4 discovery: OpenDNS, then Google's TXT echo, then an HTTPS echo service.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::proto::rr::{RData, RecordType};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::dns::{txt_to_string, HickoryDns};
use crate::error::within;

pub const OPENDNS_SERVERS: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::new(208, 67, 222, 222)),
    IpAddr::V4(Ipv4Addr::new(208, 67, 220, 220)),
];

/// ns1..ns4.google.com.
pub const GOOGLE_AUTH_SERVERS: [IpAddr; 4] = [
    IpAddr::V4(Ipv4Addr::new(216, 239, 32, 10)),
    IpAddr::V4(Ipv4Addr::new(216, 239, 34, 10)),
    IpAddr::V4(Ipv4Addr::new(216, 239, 36, 10)),
    IpAddr::V4(Ipv4Addr::new(216, 239, 38, 10)),
];

pub const DEFAULT_ECHO_URL: &str = "https://api.ipify.org";

static IPV4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("valid ipv4 regex"));

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MyIpResult {
    pub ok: bool,
    pub ip: Option<String>,
    pub source: Option<String>,
    pub resolver: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
pub trait IpDiscovery: Send + Sync {
    async fn discover(&self, timeout: Duration) -> MyIpResult;
}

/// One way of learning our own address.
#[derive(Debug, Clone)]
pub enum IpSource {
    /// `myip.opendns.com` A record asked directly of OpenDNS resolvers.
    OpenDns(Vec<IpAddr>),
    /// `o-o.myaddr.l.google.com` TXT asked of Google's authoritative servers.
    GoogleTxt(Vec<IpAddr>),
    /// Plain-text echo over HTTP(S).
    HttpsEcho(String),
}

impl IpSource {
    fn label(&self) -> &'static str {
        match self {
            IpSource::OpenDns(_) => "OpenDNS",
            IpSource::GoogleTxt(_) => "Google",
            IpSource::HttpsEcho(_) => "HTTPS echo",
        }
    }
}

/// Tries each source in order; first success wins.
#[derive(Debug, Clone)]
pub struct CascadeIpDiscovery {
    sources: Vec<IpSource>,
    http: reqwest::Client,
}

impl Default for CascadeIpDiscovery {
    fn default() -> Self {
        Self::with_sources(vec![
            IpSource::OpenDns(OPENDNS_SERVERS.to_vec()),
            IpSource::GoogleTxt(GOOGLE_AUTH_SERVERS.to_vec()),
            IpSource::HttpsEcho(DEFAULT_ECHO_URL.to_string()),
        ])
    }
}

impl CascadeIpDiscovery {
    pub fn with_sources(sources: Vec<IpSource>) -> Self {
        Self {
            sources,
            http: reqwest::Client::new(),
        }
    }

    async fn try_source(&self, source: &IpSource, timeout: Duration) -> Result<MyIpResult, String> {
        match source {
            IpSource::OpenDns(servers) => {
                let dns = HickoryDns::with_nameservers(servers);
                let records = dns.query("myip.opendns.com", RecordType::A, timeout).await?;
                let ip = records
                    .iter()
                    .find_map(|(data, _, _)| match data {
                        RData::A(a) => Some(a.to_string()),
                        _ => None,
                    })
                    .ok_or_else(|| "No answer".to_string())?;
                Ok(found(ip, "OpenDNS", Some(dns.nameservers())))
            }
            IpSource::GoogleTxt(servers) => {
                let dns = HickoryDns::with_nameservers(servers);
                let records = dns
                    .query("o-o.myaddr.l.google.com", RecordType::TXT, timeout)
                    .await?;
                let ip = records
                    .iter()
                    .filter_map(|(data, _, _)| match data {
                        RData::TXT(txt) => Some(txt_to_string(txt.txt_data())),
                        _ => None,
                    })
                    .find_map(|text| first_ipv4(&text))
                    .ok_or_else(|| "TXT has no IP".to_string())?;
                Ok(found(ip, "Google (TXT)", Some(dns.nameservers())))
            }
            IpSource::HttpsEcho(url) => {
                let body = within(timeout, async {
                    self.http.get(url).send().await?.error_for_status()?.text().await
                })
                .await
                .map_err(|e| e.to_string())?;
                let ip = first_ipv4(body.trim()).ok_or_else(|| "unexpected response".to_string())?;
                let host = reqwest::Url::parse(url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
                    .unwrap_or_else(|| url.clone());
                Ok(found(ip, &format!("HTTPS ({})", host), None))
            }
        }
    }
}

#[async_trait]
impl IpDiscovery for CascadeIpDiscovery {
    #[instrument(skip(self))]
    async fn discover(&self, timeout: Duration) -> MyIpResult {
        let mut errors = Vec::new();
        for source in &self.sources {
            match self.try_source(source, timeout).await {
                Ok(result) => {
                    info!(source = ?result.source, ip = ?result.ip, "step: external ip discovered");
                    return result;
                }
                Err(e) => {
                    debug!(source = source.label(), error = %e, "IP source failed");
                    errors.push(format!("{}: {}", source.label(), e));
                }
            }
        }

        info!(errors = errors.len(), "step: external ip discovery failed");
        MyIpResult {
            ok: false,
            error: Some(if errors.is_empty() {
                "no sources configured".to_string()
            } else {
                errors.join("; ")
            }),
            ..MyIpResult::default()
        }
    }
}

fn found(ip: String, source: &str, resolver: Option<String>) -> MyIpResult {
    MyIpResult {
        ok: true,
        ip: Some(ip),
        source: Some(source.to_string()),
        resolver,
        error: None,
    }
}

/// First dotted quad in `text` that is a valid IPv4 address.
pub fn first_ipv4(text: &str) -> Option<String> {
    IPV4_RE
        .find_iter(text)
        .find(|m| m.as_str().parse::<Ipv4Addr>().is_ok())
        .map(|m| m.as_str().to_string())
}
