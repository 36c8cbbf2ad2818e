//! HTTP transport.
//!
//! Everything that goes over the wire passes through a [`Transport`], so the
//! provider, backend and job layers can be exercised without a network.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header, multipart};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{HalError, HalResult};

/// User-Agent sent with requests.
const USER_AGENT: &str = concat!("tergite-rs/", env!("CARGO_PKG_VERSION"));

/// Status and body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw body. Empty for successful downloads, whose body went to disk.
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// A response with a JSON body.
    pub fn json_body(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> HalResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The `detail` field of a JSON error body, or the raw text.
    pub fn error_detail(&self) -> String {
        serde_json::from_slice::<serde_json::Value>(&self.body)
            .ok()
            .and_then(|v| match v.get("detail") {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(other) => Some(other.to_string()),
                None => None,
            })
            .unwrap_or_else(|| self.text())
    }

    /// Turn a non-OK response into [`HalError::Api`].
    pub fn error_for_status(self, context: impl Into<String>) -> HalResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(HalError::Api {
                context: context.into(),
                status: self.status,
                detail: self.error_detail(),
            })
        }
    }
}

/// The four request shapes the service API needs.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// `GET url`.
    async fn get(&self, url: &str) -> HalResult<TransportResponse>;

    /// `POST url` with a JSON body.
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> HalResult<TransportResponse>;

    /// `POST url` with the file at `path` as multipart form field `field`.
    async fn post_file(&self, url: &str, field: &str, path: &Path)
    -> HalResult<TransportResponse>;

    /// `GET url`, streaming a successful body into `dest`.
    ///
    /// On a non-OK status nothing is written and the error body is returned.
    async fn download_to(&self, url: &str, dest: &Path) -> HalResult<TransportResponse>;
}

/// [`Transport`] over reqwest.
pub struct HttpTransport {
    client: Client,
    token: Option<String>,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport. With a token every request carries
    /// `Authorization: Bearer <token>`.
    pub fn new(token: Option<&str>) -> HalResult<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                    HalError::Configuration("token contains invalid header characters".into())
                })?,
            );
        }
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            token: token.map(str::to_string),
        })
    }

    async fn collect(response: reqwest::Response) -> HalResult<TransportResponse> {
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> HalResult<TransportResponse> {
        debug!(url, "GET");
        Self::collect(self.client.get(url).send().await?).await
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> HalResult<TransportResponse> {
        debug!(url, "POST json");
        Self::collect(self.client.post(url).json(body).send().await?).await
    }

    async fn post_file(
        &self,
        url: &str,
        field: &str,
        path: &Path,
    ) -> HalResult<TransportResponse> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "job.json".to_string());
        debug!(url, field, size = bytes.len(), "POST multipart");

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/json")?;
        let form = multipart::Form::new().part(field.to_string(), part);
        Self::collect(self.client.post(url).multipart(form).send().await?).await
    }

    async fn download_to(&self, url: &str, dest: &Path) -> HalResult<TransportResponse> {
        debug!(url, dest = %dest.display(), "GET download");
        let mut response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Self::collect(response).await;
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await? {
            written += chunk.len();
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        debug!(bytes = written, "download complete");

        Ok(TransportResponse {
            status,
            body: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_detail_prefers_json_detail() {
        let resp = TransportResponse::json_body(401, &json!({"detail": "Unauthorized"}));
        assert_eq!(resp.error_detail(), "Unauthorized");
    }

    #[test]
    fn test_error_detail_falls_back_to_text() {
        let resp = TransportResponse {
            status: 502,
            body: b"Bad Gateway".to_vec(),
        };
        assert_eq!(resp.error_detail(), "Bad Gateway");

        let resp = TransportResponse::json_body(500, &json!({"message": "boom"}));
        assert_eq!(resp.error_detail(), r#"{"message":"boom"}"#);
    }

    #[test]
    fn test_error_for_status() {
        let err = TransportResponse::json_body(404, &json!({"detail": "not found"}))
            .error_for_status("error retrieving job data")
            .unwrap_err();
        assert_eq!(err.to_string(), "error retrieving job data: not found");
        assert!(matches!(err, HalError::Api { status: 404, .. }));

        let ok = TransportResponse::json_body(200, &json!({}));
        assert!(ok.error_for_status("ctx").is_ok());
    }

    #[test]
    fn test_debug_redacts_token() {
        let transport = HttpTransport::new(Some("secret-token")).unwrap();
        let debug = format!("{transport:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }
}
