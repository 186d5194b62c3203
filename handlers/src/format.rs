//! HTML rendering of probe results.

use net_tools::{DnsRecordType, DnsResult, MyIpResult, PingResult, TlsInfo, WhoisResult};

use crate::reply::escape_html;

pub const MAX_DNS_ANSWERS: usize = 50;
pub const MAX_SAN_ENTRIES: usize = 10;
pub const MAX_WHOIS_RAW_CHARS: usize = 1800;
const MAX_AIA_URLS: usize = 2;
const MAX_SERIAL_CHARS: usize = 32;

pub(crate) fn code(text: &str) -> String {
    format!("<code>{}</code>", escape_html(text))
}

fn ms(value: Option<f64>) -> String {
    value.map_or_else(|| "?".to_string(), |v| format!("{:.1}", v))
}

/// Cuts `text` to `max` characters on a char boundary. Returns whether anything was dropped.
fn truncate_chars(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

pub fn ping_result(target: &str, count: u32, result: &PingResult) -> String {
    let mut out = format!("📡 <b>Ping</b> {} ({} packets)\n", code(target), count);

    if !result.ok {
        out.push_str(&format!(
            "❌ Host unreachable, loss {:.0}%\n",
            result.loss_pct
        ));
    } else {
        out.push_str(&format!(
            "✅ tx {} / rx {}, loss {:.0}%\n",
            result.transmitted, result.received, result.loss_pct
        ));
        out.push_str(&format!(
            "rtt min/avg/max/σ: {}/{}/{}/{} ms\n",
            ms(result.min_ms),
            ms(result.avg_ms),
            ms(result.max_ms),
            ms(result.stddev_ms)
        ));
    }

    if !result.raw_tail.trim().is_empty() {
        out.push_str(&format!("\n<pre>{}</pre>", escape_html(result.raw_tail.trim())));
    }
    out
}

pub fn dns_result(result: &DnsResult) -> String {
    let mut out = format!(
        "🔎 <b>DNS {}</b> for {}\n",
        result.record_type,
        code(&result.qname)
    );
    if let Some(resolver) = &result.resolver {
        out.push_str(&format!("Resolver: {}\n", code(resolver)));
    }

    if let Some(error) = &result.error {
        out.push_str(&format!("❌ {}", escape_html(error)));
        return out;
    }

    if result.record_type != DnsRecordType::Cname {
        if let Some(cname) = &result.canonical_name {
            out.push_str(&format!("CNAME → {}\n", code(cname)));
        }
    }

    if result.answers.is_empty() {
        out.push_str("No records");
        return out;
    }

    for answer in result.answers.iter().take(MAX_DNS_ANSWERS) {
        match answer.ttl {
            Some(ttl) => out.push_str(&format!("• {} (TTL {})\n", code(&answer.value), ttl)),
            None => out.push_str(&format!("• {}\n", code(&answer.value))),
        }
    }
    if result.answers.len() > MAX_DNS_ANSWERS {
        out.push_str(&format!(
            "…and {} more\n",
            result.answers.len() - MAX_DNS_ANSWERS
        ));
    }
    out.trim_end().to_string()
}

pub fn whois_result(result: &WhoisResult) -> String {
    let mut out = format!("❓ <b>WHOIS</b> {}\n", code(&result.target));

    if let Some(error) = &result.error {
        out.push_str(&format!("❌ {}", escape_html(error)));
        return out;
    }

    for line in &result.summary_lines {
        out.push_str(&escape_html(line));
        out.push('\n');
    }

    if let Some(raw) = result.raw_text.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        let (head, cut) = truncate_chars(raw, MAX_WHOIS_RAW_CHARS);
        let mut body = head.to_string();
        if cut {
            body.push_str("\n…(truncated)");
        }
        out.push_str(&format!("\n<pre>{}</pre>", escape_html(&body)));
    }
    out.trim_end().to_string()
}

pub fn tls_result(info: &TlsInfo) -> String {
    let mut out = format!(
        "🔐 <b>TLS</b> {}\n",
        code(&format!("{}:{}", info.host, info.port))
    );

    if !info.ok {
        out.push_str(&format!(
            "❌ {}",
            escape_html(info.error.as_deref().unwrap_or("handshake failed"))
        ));
        return out;
    }

    let or_dash = |v: &Option<String>| v.as_deref().map_or_else(|| "—".to_string(), escape_html);

    out.push_str(&format!("Protocol: {}\n", or_dash(&info.protocol)));
    out.push_str(&format!("Cipher: {}\n", or_dash(&info.cipher)));

    if let Some(error) = &info.error {
        out.push_str(&format!("⚠️ {}", escape_html(error)));
        return out;
    }

    out.push_str(&format!("Subject CN: {}\n", or_dash(&info.subject_cn)));
    let hostname = match info.hostname_ok {
        Some(true) => "✅ yes",
        Some(false) => "❌ no",
        None => "unknown",
    };
    out.push_str(&format!("Hostname match: {}\n", hostname));

    let issuer = info.issuer_cn.as_ref().or(info.issuer_full.as_ref()).cloned();
    out.push_str(&format!("Issuer: {}\n", or_dash(&issuer)));
    if let Some(serial) = &info.serial {
        let (serial, _) = truncate_chars(serial, MAX_SERIAL_CHARS);
        out.push_str(&format!("Serial: {}\n", code(serial)));
    }

    let validity = format!(
        "{} → {}",
        info.not_before.as_deref().unwrap_or("?"),
        info.not_after.as_deref().unwrap_or("?")
    );
    match info.days_left {
        Some(days) if days < 0 => {
            out.push_str(&format!("Validity: {} (❌ expired {} days ago)\n", validity, -days))
        }
        Some(days) => out.push_str(&format!("Validity: {} ({} days left)\n", validity, days)),
        None => out.push_str(&format!("Validity: {}\n", validity)),
    }

    if !info.san.is_empty() {
        let shown: Vec<String> = info
            .san
            .iter()
            .take(MAX_SAN_ENTRIES)
            .map(|s| escape_html(s))
            .collect();
        let mut line = format!("SAN: {}", shown.join(", "));
        if info.san.len() > MAX_SAN_ENTRIES {
            line.push_str(&format!(" …(+{})", info.san.len() - MAX_SAN_ENTRIES));
        }
        out.push_str(&line);
        out.push('\n');
    }

    let urls = |urls: &[String]| -> String {
        urls.iter()
            .take(MAX_AIA_URLS)
            .map(|u| escape_html(u))
            .collect::<Vec<_>>()
            .join(", ")
    };
    if !info.ocsp_urls.is_empty() {
        out.push_str(&format!("OCSP: {}\n", urls(&info.ocsp_urls)));
    }
    if !info.ca_issuers.is_empty() {
        out.push_str(&format!("CA Issuers: {}\n", urls(&info.ca_issuers)));
    }
    out.trim_end().to_string()
}

pub fn myip_result(result: &MyIpResult) -> String {
    match (&result.ip, result.ok) {
        (Some(ip), true) => {
            let mut out = format!("🧭 External IP of this bot: {}", code(ip));
            if let Some(source) = &result.source {
                out.push_str(&format!("\nSource: {}", escape_html(source)));
            }
            if let Some(resolver) = &result.resolver {
                out.push_str(&format!(" via {}", escape_html(resolver)));
            }
            out
        }
        _ => format!(
            "❌ Could not determine external IP: {}",
            escape_html(result.error.as_deref().unwrap_or("no source answered"))
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use net_tools::{DnsAnswer, WhoisKind};

    fn dns(answers: usize) -> DnsResult {
        DnsResult {
            ok: true,
            record_type: DnsRecordType::A,
            qname: "example.com".to_string(),
            answers: (0..answers)
                .map(|i| DnsAnswer {
                    value: format!("192.0.2.{}", i),
                    ttl: Some(300),
                })
                .collect(),
            canonical_name: Some("edge.example.net".to_string()),
            resolver: None,
            error: None,
        }
    }

    #[test]
    fn test_dns_answers_capped() {
        let text = dns_result(&dns(60));
        assert_eq!(text.matches("(TTL 300)").count(), MAX_DNS_ANSWERS);
        assert!(text.contains("…and 10 more"));
        assert!(text.contains("CNAME → <code>edge.example.net</code>"));
    }

    #[test]
    fn test_dns_error_shown() {
        let mut result = dns(0);
        result.ok = false;
        result.error = Some("NXDOMAIN (name does not exist)".to_string());
        let text = dns_result(&result);
        assert!(text.contains("❌ NXDOMAIN"));
        assert!(!text.contains("CNAME"));
    }

    #[test]
    fn test_whois_raw_truncated_and_escaped() {
        let result = WhoisResult {
            ok: true,
            kind: WhoisKind::Domain,
            target: "example.com".to_string(),
            summary_lines: vec!["Registrar: <Acme>".to_string()],
            raw_text: Some("x".repeat(MAX_WHOIS_RAW_CHARS + 100)),
            error: None,
        };
        let text = whois_result(&result);
        assert!(text.contains("Registrar: &lt;Acme&gt;"));
        assert!(text.contains("…(truncated)"));
        assert_eq!(text.matches('x').count(), MAX_WHOIS_RAW_CHARS);
    }

    #[test]
    fn test_tls_san_capped() {
        let info = TlsInfo {
            ok: true,
            host: "example.com".to_string(),
            port: 443,
            protocol: Some("TLSv1.3".to_string()),
            san: (0..12).map(|i| format!("h{}.example.com", i)).collect(),
            hostname_ok: Some(true),
            days_left: Some(30),
            ..TlsInfo::default()
        };
        let text = tls_result(&info);
        assert!(text.contains("h9.example.com"));
        assert!(!text.contains("h10.example.com"));
        assert!(text.contains("…(+2)"));
        assert!(text.contains("30 days left"));
    }

    #[test]
    fn test_ping_unreachable() {
        let result = PingResult {
            ok: false,
            transmitted: 3,
            received: 0,
            loss_pct: 100.0,
            min_ms: None,
            avg_ms: None,
            max_ms: None,
            stddev_ms: None,
            raw_tail: "3 packets transmitted, 0 received, 100% packet loss".to_string(),
        };
        let text = ping_result("203.0.113.9", 3, &result);
        assert!(text.contains("unreachable, loss 100%"));
        assert!(text.contains("<pre>3 packets transmitted"));
    }
}
