//! Integration tests for [`net_tools::TlsInspector`] against a local rustls server.
//!
//! The fixture is a self-signed P-256 certificate for `test.nethelper.local` with SANs
//! `*.nethelper.test` and `127.0.0.1`, serial `1a:2b:3c`, and AIA OCSP / CA-issuer URLs.

use std::sync::Arc;
use std::time::Duration;

use net_tools::{parse_certificate, TlsInspector, TlsProbe};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

const CERT_DER: &[u8] = include_bytes!("fixtures/cert.der");
const KEY_DER: &[u8] = include_bytes!("fixtures/key.pk8.der");

/// Accepts TLS connections on an ephemeral port until the test ends.
async fn tls_server() -> u16 {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(
            vec![CertificateDer::from(CERT_DER.to_vec())],
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(KEY_DER.to_vec())),
        )
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(mut stream) = acceptor.accept(socket).await {
                    let _ = stream.shutdown().await;
                }
            });
        }
    });
    port
}

/// **Test: Leaf certificate fields are extracted from DER.**
///
/// **Setup:** Fixture certificate.
/// **Action:** `parse_certificate`.
/// **Expected:** CN, issuer, serial, SANs and AIA URLs match the fixture.
#[test]
fn test_parse_fixture_certificate() {
    let cert = parse_certificate(CERT_DER).expect("fixture parses");
    assert_eq!(cert.subject_cn.as_deref(), Some("test.nethelper.local"));
    assert_eq!(cert.issuer_cn.as_deref(), Some("test.nethelper.local"));
    let issuer = cert.issuer_full.as_deref().unwrap();
    assert!(issuer.contains("O=Nethelper Test"));
    assert!(issuer.contains("CN=test.nethelper.local"));
    assert_eq!(cert.serial.as_deref(), Some("1a:2b:3c"));
    assert_eq!(
        cert.san_entries(),
        vec!["test.nethelper.local", "*.nethelper.test", "127.0.0.1"]
    );
    assert_eq!(cert.ocsp_urls, vec!["http://ocsp.nethelper.test"]);
    assert_eq!(cert.ca_issuers, vec!["http://ca.nethelper.test/ca.der"]);
    assert!(cert.not_before.is_some());
    assert!(cert.not_after > cert.not_before);
}

/// **Test: A self-signed server is inspected, not rejected.**
///
/// **Setup:** Local rustls server with the fixture certificate.
/// **Action:** `inspect("127.0.0.1", port)`.
/// **Expected:** ok, TLS 1.3, cipher reported, hostname matches the IP SAN, long validity.
#[tokio::test]
async fn test_inspect_self_signed_server() {
    let port = tls_server().await;
    let inspector = TlsInspector::new().unwrap();

    let info = inspector
        .inspect("127.0.0.1", port, Duration::from_secs(5))
        .await;

    assert!(info.ok, "{:?}", info.error);
    assert_eq!(info.port, port);
    assert_eq!(info.protocol.as_deref(), Some("TLSv1.3"));
    assert!(info.cipher.is_some());
    assert_eq!(info.subject_cn.as_deref(), Some("test.nethelper.local"));
    assert_eq!(info.hostname_ok, Some(true));
    assert!(info.days_left.unwrap() > 365);
    assert_eq!(info.ocsp_urls.len(), 1);
    assert!(info.error.is_none());
}

/// **Test: A closed port is a failed result, not an error.**
///
/// **Setup:** Nothing listening on 127.0.0.1:9.
/// **Action:** `inspect`.
/// **Expected:** ok == false with a "Handshake error" message.
#[tokio::test]
async fn test_inspect_connection_refused() {
    let inspector = TlsInspector::new().unwrap();
    let info = inspector
        .inspect("127.0.0.1", 9, Duration::from_secs(2))
        .await;
    assert!(!info.ok);
    assert!(info.error.unwrap().starts_with("Handshake error:"));
}
