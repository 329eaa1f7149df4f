//! HTTP transport.
//!
//! The installer fetches registry documents and tarballs through the
//! [`Transport`] trait so tests can serve bytes from memory.

use super::error::PkgError;
use crate::version::VERSION;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::fmt::Debug;
use std::io::Read;
use std::time::Duration;
use tracing::debug;

/// Maximum payload size (200 MB).
pub const MAX_PAYLOAD_SIZE: u64 = 200 * 1024 * 1024;

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Whole-request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Fetches the bytes at a URL.
pub trait Transport: Send + Sync + Debug {
    /// GET `url` and return the full body.
    ///
    /// # Errors
    /// `PKG_NOT_FOUND` for a 404, otherwise `PKG_DOWNLOAD_FAILED`.
    fn get(&self, url: &str) -> Result<Vec<u8>, PkgError>;
}

/// [`Transport`] backed by a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    max_bytes: u64,
}

impl HttpTransport {
    /// Create a transport with default timeouts and size limit.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, PkgError> {
        Self::with_limits(Duration::from_secs(REQUEST_TIMEOUT_SECS), MAX_PAYLOAD_SIZE)
    }

    /// Create a transport with a custom request timeout and size limit.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_limits(timeout: Duration, max_bytes: u64) -> Result<Self, PkgError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(timeout)
            .user_agent(format!("nestpm/{VERSION}"))
            .build()
            .map_err(|e| PkgError::registry(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { http, max_bytes })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, PkgError> {
        debug!(url, "GET");

        let response = self
            .http
            .get(url)
            .send()
            .map_err(|e| PkgError::download_failed(format!("Failed to download '{url}': {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(PkgError::not_found(url));
        }

        if !response.status().is_success() {
            return Err(PkgError::download_failed(format!(
                "Download failed with status {} for '{url}'",
                response.status()
            )));
        }

        let max_bytes = self.max_bytes;
        if let Some(len) = response.content_length() {
            if len > max_bytes {
                return Err(PkgError::download_failed(format!(
                    "Payload too large: {len} bytes (max: {max_bytes})"
                )));
            }
        }

        let mut body = Vec::new();
        response
            .take(max_bytes + 1)
            .read_to_end(&mut body)
            .map_err(|e| PkgError::download_failed(format!("Failed to read response body: {e}")))?;

        if body.len() as u64 > max_bytes {
            return Err(PkgError::download_failed(format!(
                "Payload too large: more than {max_bytes} bytes"
            )));
        }

        Ok(body)
    }
}
