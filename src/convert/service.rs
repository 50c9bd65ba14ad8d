use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::extractors::VideoId;
use crate::ConversionError;

/// Header carrying the service credential
pub const KEY_HEADER: &str = "x-rapidapi-key";

/// Header naming the API host behind the gateway
pub const HOST_HEADER: &str = "x-rapidapi-host";

/// Status payload returned by the conversion service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,

    #[serde(default)]
    pub link: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub msg: Option<String>,
}

impl StatusResponse {
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus::from(self.status.as_str())
    }
}

/// Status values the service is known to report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceStatus {
    Ok,
    Processing,
    InQueue,
    Fail,
    Other(String),
}

impl From<&str> for ServiceStatus {
    fn from(status: &str) -> Self {
        match status {
            "ok" => ServiceStatus::Ok,
            "processing" => ServiceStatus::Processing,
            "in_queue" => ServiceStatus::InQueue,
            "fail" => ServiceStatus::Fail,
            other => ServiceStatus::Other(other.to_string()),
        }
    }
}

/// Trait for asking a conversion back-end about one video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversionService: Send + Sync {
    /// Issue one status request for the video
    async fn check_status(&self, video_id: &VideoId) -> Result<StatusResponse, ConversionError>;
}

/// Client for the RapidAPI hosted YouTube to MP3 endpoint
pub struct RapidApiClient {
    client: Client,
    endpoint: String,
    host: String,
    key: String,
}

impl RapidApiClient {
    /// Create a client from the API settings and the credential
    pub fn new(api: &ApiConfig, key: impl Into<String>) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(api.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/dl", api.base_url.trim_end_matches('/')),
            host: api.host.clone(),
            key: key.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Debug for RapidApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RapidApiClient")
            .field("endpoint", &self.endpoint)
            .field("host", &self.host)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl ConversionService for RapidApiClient {
    async fn check_status(&self, video_id: &VideoId) -> Result<StatusResponse, ConversionError> {
        tracing::debug!("Checking conversion status for: {}", video_id);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("id", video_id.as_str())])
            .header(KEY_HEADER, &self.key)
            .header(HOST_HEADER, &self.host)
            .send()
            .await
            .map_err(ConversionError::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::NOT_FOUND => ConversionError::NotFound,
                StatusCode::TOO_MANY_REQUESTS => ConversionError::RateLimited,
                other => ConversionError::transport(format!("HTTP {}", other)),
            });
        }

        response
            .json::<StatusResponse>()
            .await
            .map_err(ConversionError::transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!(ServiceStatus::from("ok"), ServiceStatus::Ok);
        assert_eq!(ServiceStatus::from("processing"), ServiceStatus::Processing);
        assert_eq!(ServiceStatus::from("in_queue"), ServiceStatus::InQueue);
        assert_eq!(ServiceStatus::from("fail"), ServiceStatus::Fail);
        assert_eq!(
            ServiceStatus::from("OK"),
            ServiceStatus::Other("OK".to_string())
        );
    }

    #[test]
    fn test_response_tolerates_missing_and_extra_fields() {
        let body = r#"{"status":"ok","link":"https://cdn.example/a.mp3","progress":100,"duration":212.5}"#;
        let response: StatusResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.status(), ServiceStatus::Ok);
        assert_eq!(response.title, None);

        let body = r#"{"status":"processing","msg":null}"#;
        let response: StatusResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.msg, None);
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = RapidApiClient::new(&ApiConfig::default(), "super-secret").unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("super-secret"));
        assert_eq!(client.endpoint(), "https://youtube-mp36.p.rapidapi.com/dl");
    }
}
