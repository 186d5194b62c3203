use std::time::Duration;

use thiserror::Error;

/// Internal failure of a probe step. Probes turn these into the `error` text of their result.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Tls(#[from] rustls::Error),

    #[error("{0}")]
    Protocol(String),
}

/// Runs `fut` under `limit`, mapping expiry to [`ProbeError::Timeout`].
pub(crate) async fn within<T, E, F>(limit: Duration, fut: F) -> Result<T, ProbeError>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: Into<ProbeError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(ProbeError::Timeout(limit)),
    }
}
