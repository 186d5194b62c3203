//! TLS handshake inspection: negotiated parameters plus a summary of the leaf certificate.
//!
//! Chain and hostname verification are deliberately disabled during the handshake so that
//! self-signed, expired or mismatched certificates can still be reported on. Hostname match is
//! computed afterwards from SAN/CN and reported as a field.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, ProtocolVersion, SignatureScheme};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{info, instrument};
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::{within, ProbeError};

const OID_AIA_OCSP: &str = "1.3.6.1.5.5.7.48.1";
const OID_AIA_CA_ISSUERS: &str = "1.3.6.1.5.5.7.48.2";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TlsInfo {
    pub ok: bool,
    pub host: String,
    pub port: u16,
    pub protocol: Option<String>,
    pub cipher: Option<String>,
    pub subject_cn: Option<String>,
    pub issuer_cn: Option<String>,
    pub issuer_full: Option<String>,
    pub serial: Option<String>,
    pub san: Vec<String>,
    /// `YYYY-MM-DD`, UTC.
    pub not_before: Option<String>,
    pub not_after: Option<String>,
    pub days_left: Option<i64>,
    pub hostname_ok: Option<bool>,
    pub ocsp_urls: Vec<String>,
    pub ca_issuers: Vec<String>,
    pub error: Option<String>,
}

/// Certificate fields extracted from a DER-encoded leaf.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CertSummary {
    pub subject_cn: Option<String>,
    pub issuer_cn: Option<String>,
    pub issuer_full: Option<String>,
    pub serial: Option<String>,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub ocsp_urls: Vec<String>,
    pub ca_issuers: Vec<String>,
}

impl CertSummary {
    /// SAN entries for display: DNS names then IP addresses.
    pub fn san_entries(&self) -> Vec<String> {
        self.dns_names
            .iter()
            .cloned()
            .chain(self.ip_addresses.iter().map(IpAddr::to_string))
            .collect()
    }
}

#[async_trait]
pub trait TlsProbe: Send + Sync {
    async fn inspect(&self, host: &str, port: u16, timeout: Duration) -> TlsInfo;
}

/// rustls client that accepts any certificate but still checks handshake signatures.
#[derive(Clone)]
pub struct TlsInspector {
    connector: TlsConnector,
}

impl TlsInspector {
    pub fn new() -> Result<Self, ProbeError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier = AcceptAnyCertificate {
            algorithms: provider.signature_verification_algorithms,
        };
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
        })
    }

    async fn handshake(&self, host: &str, port: u16) -> Result<TlsInfo, ProbeError> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| ProbeError::Protocol(format!("invalid server name: {}", e)))?;
        let tcp = TcpStream::connect((host, port)).await?;
        let stream = self.connector.connect(server_name, tcp).await?;
        let (_, connection) = stream.get_ref();

        let mut info = TlsInfo {
            ok: true,
            host: host.to_string(),
            port,
            protocol: connection.protocol_version().map(protocol_name),
            cipher: connection
                .negotiated_cipher_suite()
                .map(|suite| format!("{:?}", suite.suite())),
            ..TlsInfo::default()
        };

        let leaf = connection
            .peer_certificates()
            .and_then(|certs| certs.first());
        match leaf.map(|der| parse_certificate(der.as_ref())) {
            Some(Ok(cert)) => {
                let now = Utc::now();
                info.hostname_ok = Some(hostname_matches(host, &cert));
                info.subject_cn = cert.subject_cn.clone();
                info.issuer_cn = cert.issuer_cn.clone();
                info.issuer_full = cert.issuer_full.clone();
                info.serial = cert.serial.clone();
                info.san = cert.san_entries();
                info.not_before = cert.not_before.map(format_date);
                info.not_after = cert.not_after.map(format_date);
                info.days_left = cert.not_after.map(|t| days_between(now, t));
                info.ocsp_urls = cert.ocsp_urls;
                info.ca_issuers = cert.ca_issuers;
            }
            Some(Err(e)) => info.error = Some(format!("Certificate data unavailable: {}", e)),
            None => info.error = Some("Certificate data unavailable: no peer certificate".to_string()),
        }

        Ok(info)
    }
}

#[async_trait]
impl TlsProbe for TlsInspector {
    #[instrument(skip(self))]
    async fn inspect(&self, host: &str, port: u16, timeout: Duration) -> TlsInfo {
        let result = match within(timeout, self.handshake(host, port)).await {
            Ok(info) => info,
            Err(e) => TlsInfo {
                ok: false,
                host: host.to_string(),
                port,
                error: Some(format!("Handshake error: {}", e)),
                ..TlsInfo::default()
            },
        };

        info!(
            host = %host,
            port = port,
            ok = result.ok,
            protocol = ?result.protocol,
            "step: tls inspection finished"
        );
        result
    }
}

#[derive(Debug)]
struct AcceptAnyCertificate {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

fn protocol_name(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        other => format!("{:?}", other),
    }
}

fn format_date(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d").to_string()
}

/// Whole days from `now` to `until`, rounded down (an expired certificate yields a negative count).
pub fn days_between(now: DateTime<Utc>, until: DateTime<Utc>) -> i64 {
    (until - now).num_seconds().div_euclid(86_400)
}

/// Extracts the displayed fields from a DER certificate.
pub fn parse_certificate(der: &[u8]) -> Result<CertSummary, ProbeError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| ProbeError::Protocol(format!("certificate parse error: {}", e)))?;

    let subject_cn = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string);
    let issuer_cn = cert
        .issuer()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string);
    let issuer_full = Some(cert.issuer().to_string()).filter(|s| !s.is_empty());

    let validity = cert.validity();
    let not_before = DateTime::from_timestamp(validity.not_before.timestamp(), 0);
    let not_after = DateTime::from_timestamp(validity.not_after.timestamp(), 0);

    let mut summary = CertSummary {
        subject_cn,
        issuer_cn,
        issuer_full,
        serial: Some(cert.raw_serial_as_string()),
        not_before,
        not_after,
        ..CertSummary::default()
    };

    for extension in cert.extensions() {
        match extension.parsed_extension() {
            ParsedExtension::SubjectAlternativeName(san) => {
                for name in &san.general_names {
                    match name {
                        GeneralName::DNSName(dns) => summary.dns_names.push(dns.to_string()),
                        GeneralName::IPAddress(bytes) => {
                            if let Some(ip) = ip_from_bytes(bytes) {
                                summary.ip_addresses.push(ip);
                            }
                        }
                        _ => {}
                    }
                }
            }
            ParsedExtension::AuthorityInfoAccess(aia) => {
                for desc in &aia.accessdescs {
                    let GeneralName::URI(uri) = &desc.access_location else {
                        continue;
                    };
                    match desc.access_method.to_id_string().as_str() {
                        OID_AIA_OCSP => summary.ocsp_urls.push(uri.to_string()),
                        OID_AIA_CA_ISSUERS => summary.ca_issuers.push(uri.to_string()),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    Ok(summary)
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

/// RFC 6125 style match: IP literals against SAN IPs; names against SAN DNS entries, or the
/// subject CN when the certificate has no DNS SAN. Wildcards cover exactly one leftmost label.
pub fn hostname_matches(host: &str, cert: &CertSummary) -> bool {
    let host = host.trim_end_matches('.');
    if let Ok(ip) = host.parse::<IpAddr>() {
        return cert.ip_addresses.contains(&ip);
    }
    if cert.dns_names.is_empty() {
        return cert
            .subject_cn
            .as_deref()
            .is_some_and(|cn| name_matches(cn, host));
    }
    cert.dns_names.iter().any(|pattern| name_matches(pattern, host))
}

fn name_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let host = host.to_ascii_lowercase();
    match pattern.strip_prefix("*.") {
        Some(suffix) => match host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix,
            None => false,
        },
        None => pattern == host,
    }
}
