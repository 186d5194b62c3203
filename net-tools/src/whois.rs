//! WHOIS for domains (port 43, IANA referral) and RDAP for public IPv4 addresses.

use std::net::Ipv4Addr;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

use crate::error::{within, ProbeError};
use crate::ipv4;

const IANA_WHOIS: &str = "whois.iana.org";
const RDAP_BASE: &str = "https://rdap.org";
const MAX_RESPONSE_BYTES: u64 = 256 * 1024;
const NO_SUMMARY: &str = "(no summary available)";

static BLOCK_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:NOTICE:|TERMS OF USE:|By submitting a WHOIS query|For more information on Whois status codes)",
    )
    .expect("valid whois block regex")
});

static NOISE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:>>> Last update of whois database:|The Registry database contains ONLY)")
        .expect("valid whois noise regex")
});

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank run regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WhoisKind {
    Domain,
    Ip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhoisResult {
    pub ok: bool,
    pub kind: WhoisKind,
    pub target: String,
    pub summary_lines: Vec<String>,
    pub raw_text: Option<String>,
    pub error: Option<String>,
}

impl WhoisResult {
    fn failed(kind: WhoisKind, target: &str, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            kind,
            target: target.to_string(),
            summary_lines: Vec::new(),
            raw_text: None,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait WhoisProbe: Send + Sync {
    async fn whois(&self, target: &str, timeout: Duration) -> WhoisResult;
}

/// WHOIS/RDAP client. `iana_server` may carry an explicit `:port`.
#[derive(Debug, Clone)]
pub struct WhoisClient {
    iana_server: String,
    rdap_base: String,
    http: reqwest::Client,
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WhoisClient {
    pub fn new() -> Self {
        Self::with_endpoints(IANA_WHOIS, RDAP_BASE)
    }

    pub fn with_endpoints(iana_server: impl Into<String>, rdap_base: impl Into<String>) -> Self {
        Self {
            iana_server: iana_server.into(),
            rdap_base: rdap_base.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn lookup_domain(&self, domain: &str, timeout: Duration) -> WhoisResult {
        let domain = domain.trim().trim_end_matches('.').to_lowercase();
        match self.domain_text(&domain, timeout).await {
            Ok(text) => {
                let summary = summarize_domain(&text);
                WhoisResult {
                    ok: true,
                    kind: WhoisKind::Domain,
                    target: domain,
                    summary_lines: non_empty_summary(summary),
                    raw_text: Some(clean_whois_text(&text)),
                    error: None,
                }
            }
            Err(e) => WhoisResult::failed(WhoisKind::Domain, &domain, format!("WHOIS error: {}", e)),
        }
    }

    /// IANA referral, then registry, then the registrar server when the registry names one.
    async fn domain_text(&self, domain: &str, timeout: Duration) -> Result<String, ProbeError> {
        let iana = query_server(&self.iana_server, domain, timeout).await?;
        let Some(registry) = find_field(&iana, &["refer", "whois"]) else {
            debug!(domain = %domain, "No registry referral, using IANA answer");
            return Ok(iana);
        };

        debug!(domain = %domain, registry = %registry, "step: whois registry referral");
        let registry_text = query_server(&registry, domain, timeout).await?;

        match find_field(&registry_text, &["Registrar WHOIS Server"]) {
            Some(registrar) if !registrar.eq_ignore_ascii_case(&registry) => {
                match query_server(&registrar, domain, timeout).await {
                    Ok(text) if !text.trim().is_empty() => Ok(text),
                    _ => Ok(registry_text),
                }
            }
            _ => Ok(registry_text),
        }
    }

    async fn lookup_ip(&self, ip: Ipv4Addr, timeout: Duration) -> WhoisResult {
        let target = ip.to_string();
        let url = format!("{}/ip/{}", self.rdap_base, ip);
        let fetched = within(timeout, async {
            let response = self
                .http
                .get(&url)
                .header("Accept", "application/rdap+json, application/json")
                .send()
                .await?
                .error_for_status()?;
            response.json::<Value>().await
        })
        .await;

        match fetched {
            Ok(json) => WhoisResult {
                ok: true,
                kind: WhoisKind::Ip,
                target,
                summary_lines: non_empty_summary(summarize_rdap(&json)),
                raw_text: serde_json::to_string_pretty(&json).ok(),
                error: None,
            },
            Err(e) => WhoisResult::failed(WhoisKind::Ip, &target, format!("RDAP error: {}", e)),
        }
    }
}

#[async_trait]
impl WhoisProbe for WhoisClient {
    #[instrument(skip(self))]
    async fn whois(&self, target: &str, timeout: Duration) -> WhoisResult {
        let target = target.trim();
        let result = if let Ok(ip) = target.parse::<Ipv4Addr>() {
            if ipv4::is_public(ip) {
                self.lookup_ip(ip, timeout).await
            } else {
                WhoisResult::failed(WhoisKind::Ip, target, "Only public IPv4 addresses are supported")
            }
        } else if target.contains(':') {
            WhoisResult::failed(WhoisKind::Ip, target, "Only public IPv4 addresses are supported")
        } else {
            self.lookup_domain(target, timeout).await
        };

        info!(
            target = %target,
            ok = result.ok,
            summary_lines = result.summary_lines.len(),
            "step: whois finished"
        );
        result
    }
}

async fn query_server(server: &str, query: &str, timeout: Duration) -> Result<String, ProbeError> {
    let addr = if server.contains(':') {
        server.to_string()
    } else {
        format!("{}:43", server)
    };

    within(timeout, async {
        let mut stream = TcpStream::connect(&addr).await?;
        stream.write_all(format!("{}\r\n", query).as_bytes()).await?;
        let mut buf = Vec::new();
        stream.take(MAX_RESPONSE_BYTES).read_to_end(&mut buf).await?;
        Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).into_owned())
    })
    .await
}

fn non_empty_summary(lines: Vec<String>) -> Vec<String> {
    if lines.is_empty() {
        vec![NO_SUMMARY.to_string()]
    } else {
        lines
    }
}

/// Value of the first `key: value` line whose key matches one of `keys` (case-insensitive).
fn find_field(text: &str, keys: &[&str]) -> Option<String> {
    field_values(text, keys).into_iter().next()
}

fn field_values(text: &str, keys: &[&str]) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            let value = value.trim();
            (!value.is_empty() && keys.iter().any(|k| k.eq_ignore_ascii_case(key)))
                .then(|| value.to_string())
        })
        .collect()
}

fn date_prefix(value: String) -> String {
    value.chars().take(10).collect()
}

/// Summary lines from a registry or registrar response.
pub fn summarize_domain(text: &str) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(domain) = find_field(text, &["Domain Name", "domain"]) {
        lines.push(format!("Domain: {}", domain.to_lowercase()));
    }
    if let Some(registrar) = find_field(text, &["Registrar"]) {
        lines.push(format!("Registrar: {}", registrar));
    }
    if let Some(created) = find_field(text, &["Creation Date", "created", "Registered on"]) {
        lines.push(format!("Created: {}", date_prefix(created)));
    }
    if let Some(expires) = find_field(
        text,
        &[
            "Registry Expiry Date",
            "Registrar Registration Expiration Date",
            "Expiry Date",
            "Expiration Date",
            "paid-till",
            "expires",
        ],
    ) {
        lines.push(format!("Expires: {}", date_prefix(expires)));
    }

    let mut name_servers: Vec<String> = field_values(text, &["Name Server", "nserver"])
        .into_iter()
        .filter_map(|ns| ns.split_whitespace().next().map(str::to_lowercase))
        .collect();
    name_servers.sort();
    name_servers.dedup();
    if !name_servers.is_empty() {
        lines.push(format!("Name servers: {}", name_servers.join(", ")));
    }

    let mut statuses: Vec<String> = Vec::new();
    for status in field_values(text, &["Domain Status", "status"]) {
        if let Some(code) = status.split_whitespace().next() {
            if !statuses.iter().any(|s| s == code) {
                statuses.push(code.to_string());
            }
        }
    }
    if !statuses.is_empty() {
        lines.push(format!("Status: {}", statuses.join(", ")));
    }

    lines
}

/// Summary lines from an RDAP IP network object.
pub fn summarize_rdap(json: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    let text = |key: &str| json.get(key).and_then(Value::as_str).map(str::to_string);

    if let Some(name) = text("name") {
        lines.push(format!("Net name: {}", name));
    }
    if let Some(handle) = text("handle") {
        lines.push(format!("Handle: {}", handle));
    }
    if let (Some(start), Some(end)) = (text("startAddress"), text("endAddress")) {
        lines.push(format!("Range: {} - {}", start, end));
    }
    let cidrs: Vec<String> = json
        .get("cidr0_cidrs")
        .and_then(Value::as_array)
        .map(|cidrs| {
            cidrs
                .iter()
                .filter_map(|c| {
                    let prefix = c.get("v4prefix").and_then(Value::as_str)?;
                    let length = c.get("length").and_then(Value::as_u64)?;
                    Some(format!("{}/{}", prefix, length))
                })
                .collect()
        })
        .unwrap_or_default();
    if !cidrs.is_empty() {
        lines.push(format!("Route: {}", cidrs.join(", ")));
    }
    if let Some(country) = text("country") {
        lines.push(format!("Country: {}", country));
    }

    lines
}

/// Strips legal notices and database timestamps, collapses blank runs.
pub fn clean_whois_text(text: &str) -> String {
    let mut kept = Vec::new();
    let mut in_block = false;
    for line in text.replace("\r\n", "\n").lines() {
        if in_block {
            if line.trim().is_empty() {
                in_block = false;
                kept.push(String::new());
            }
            continue;
        }
        if BLOCK_START_RE.is_match(line) {
            in_block = true;
            continue;
        }
        if NOISE_LINE_RE.is_match(line) {
            kept.push(String::new());
            continue;
        }
        kept.push(line.to_string());
    }
    BLANK_RUN_RE
        .replace_all(&kept.join("\n"), "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;

    const VERISIGN: &str = "   Domain Name: EXAMPLE.COM\r
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN\r
   Registrar WHOIS Server: whois.iana.org\r
   Updated Date: 2024-08-14T07:01:34Z\r
   Creation Date: 1995-08-14T04:00:00Z\r
   Registry Expiry Date: 2025-08-13T04:00:00Z\r
   Registrar: RESERVED-Internet Assigned Numbers Authority\r
   Domain Status: clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited\r
   Domain Status: clientTransferProhibited https://icann.org/epp#clientTransferProhibited\r
   Name Server: B.IANA-SERVERS.NET\r
   Name Server: A.IANA-SERVERS.NET\r
>>> Last update of whois database: 2024-10-01T12:00:00Z <<<\r
\r
For more information on Whois status codes, please visit https://icann.org/epp\r
\r
NOTICE: The expiration date displayed in this record is the date the\r
registrar's sponsorship of the domain name registration in the registry is\r
currently set to expire.\r
\r
TERMS OF USE: You are not authorized to access or query our Whois\r
database through the use of electronic processes.\r
\r
\r
\r
The Registry database contains ONLY .COM, .NET, .EDU domains and\r
Registrars.\r
";

    #[test]
    fn test_summarize_domain() {
        let lines = summarize_domain(VERISIGN);
        assert_eq!(
            lines,
            vec![
                "Domain: example.com",
                "Registrar: RESERVED-Internet Assigned Numbers Authority",
                "Created: 1995-08-14",
                "Expires: 2025-08-13",
                "Name servers: a.iana-servers.net, b.iana-servers.net",
                "Status: clientDeleteProhibited, clientTransferProhibited",
            ]
        );
    }

    #[test]
    fn test_summarize_ru_style() {
        let text = "domain:        EXAMPLE.RU\nnserver:       ns1.example.ru.\nstate:         REGISTERED\n\
                    registrar:     RU-CENTER-RU\ncreated:       2005-01-01T00:00:00Z\npaid-till:     2026-01-01T00:00:00Z\n";
        let lines = summarize_domain(text);
        assert!(lines.contains(&"Registrar: RU-CENTER-RU".to_string()));
        assert!(lines.contains(&"Expires: 2026-01-01".to_string()));
        assert!(lines.contains(&"Name servers: ns1.example.ru.".to_string()));
    }

    #[test]
    fn test_clean_whois_text() {
        let cleaned = clean_whois_text(VERISIGN);
        assert!(cleaned.starts_with("Domain Name: EXAMPLE.COM"));
        assert!(cleaned.contains("Name Server: A.IANA-SERVERS.NET"));
        assert!(!cleaned.contains("NOTICE"));
        assert!(!cleaned.contains("TERMS OF USE"));
        assert!(!cleaned.contains("Last update of whois database"));
        assert!(!cleaned.contains("Registry database contains ONLY"));
        assert!(!cleaned.contains("\n\n\n"));
    }

    #[test]
    fn test_summarize_rdap() {
        let json = json!({
            "handle": "NET-8-8-8-0-2",
            "name": "GOGL",
            "startAddress": "8.8.8.0",
            "endAddress": "8.8.8.255",
            "country": "US",
            "cidr0_cidrs": [{ "v4prefix": "8.8.8.0", "length": 24 }]
        });
        assert_eq!(
            summarize_rdap(&json),
            vec![
                "Net name: GOGL",
                "Handle: NET-8-8-8-0-2",
                "Range: 8.8.8.0 - 8.8.8.255",
                "Route: 8.8.8.0/24",
                "Country: US",
            ]
        );
        assert!(summarize_rdap(&json!({})).is_empty());
    }

    /// Serves one canned answer per accepted connection, in order.
    async fn fake_whois(answers: Vec<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            for answer in answers {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 256];
                let _ = socket.read(&mut buf).await;
                socket.write_all(answer.as_bytes()).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_domain_lookup_follows_referral() {
        // The IANA answer refers back to the same fake server, which then answers as registry.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let referral = format!("domain: COM\nrefer: {}\n", addr);
        tokio::spawn(async move {
            for answer in [referral.as_str(), "Domain Name: EXAMPLE.COM\nRegistrar: Test Registrar\n"] {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 256];
                let _ = socket.read(&mut buf).await;
                socket.write_all(answer.as_bytes()).await.unwrap();
            }
        });

        let client = WhoisClient::with_endpoints(addr, "http://127.0.0.1:9");
        let result = client.whois("Example.com.", Duration::from_secs(2)).await;
        assert!(result.ok, "{:?}", result.error);
        assert_eq!(result.kind, WhoisKind::Domain);
        assert_eq!(result.target, "example.com");
        assert_eq!(
            result.summary_lines,
            vec!["Domain: example.com", "Registrar: Test Registrar"]
        );
    }

    #[tokio::test]
    async fn test_domain_without_referral_uses_iana_answer() {
        let addr = fake_whois(vec!["% no referral here\n"]).await;
        let client = WhoisClient::with_endpoints(addr, "http://127.0.0.1:9");
        let result = client.whois("example.test", Duration::from_secs(2)).await;
        assert!(result.ok);
        assert_eq!(result.summary_lines, vec![NO_SUMMARY]);
    }

    #[tokio::test]
    async fn test_private_ip_rejected_without_network() {
        let client = WhoisClient::with_endpoints("127.0.0.1:9", "http://127.0.0.1:9");
        let result = client.whois("192.168.1.1", Duration::from_secs(1)).await;
        assert!(!result.ok);
        assert_eq!(result.kind, WhoisKind::Ip);
        assert_eq!(
            result.error.as_deref(),
            Some("Only public IPv4 addresses are supported")
        );
    }
}
