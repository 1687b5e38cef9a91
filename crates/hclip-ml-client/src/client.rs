//! Analysis service HTTP client.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use hclip_models::VideoFrame;

use crate::analyzer::{EmotionAnalyzer, SceneCaptioner, Transcriber};
use crate::encode::encode_frame_jpeg;
use crate::error::{MlError, MlResult};
use crate::types::{
    CaptionResponse, EmotionResponse, FrameRequest, HealthResponse, TranscribeRequest,
    TranscribeResponse, TranscriptSegment,
};

/// Configuration for the analysis client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of the analysis service
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Max retries on transient failures
    pub max_retries: u32,
    /// Base delay of the exponential backoff
    pub retry_base_delay: Duration,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(250),
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("ML_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("ML_SERVICE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("ML_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_base_delay: defaults.retry_base_delay,
        }
    }
}

/// Client for the analysis service.
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Check if the service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        match self.http.get(self.url("/health")).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("ML service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("ML service health check error: {}", e);
                Ok(false)
            }
        }
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> MlResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .post(&url)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| {
                        if e.is_timeout() {
                            MlError::Timeout(self.config.timeout.as_secs())
                        } else {
                            MlError::Network(e)
                        }
                    })?;
                check_status(response).await
            })
            .await?;

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| MlError::InvalidResponse(e.to_string()))
    }

    fn frame_request(frame: &VideoFrame) -> MlResult<FrameRequest> {
        Ok(FrameRequest {
            image: encode_frame_jpeg(frame)?,
            width: frame.width,
            height: frame.height,
        })
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.retry_base_delay * 2u32.pow(attempt);
                    warn!(
                        "ML request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Map non-success statuses onto [`MlError`].
async fn check_status(response: Response) -> MlResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => MlError::RateLimited,
        s if s.is_server_error() => {
            MlError::ServiceUnavailable(format!("ML service returned {}: {}", s, body))
        }
        s => MlError::RequestFailed(format!("ML service returned {}: {}", s, body)),
    })
}

#[async_trait]
impl EmotionAnalyzer for MlClient {
    async fn analyze(&self, frame: &VideoFrame) -> MlResult<Option<String>> {
        let request = Self::frame_request(frame)?;
        let response: EmotionResponse = self.post_json("/emotion", &request).await?;

        if !response.face_detected {
            return Ok(None);
        }
        Ok(response
            .label
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty()))
    }
}

#[async_trait]
impl SceneCaptioner for MlClient {
    async fn describe(&self, frame: &VideoFrame) -> MlResult<String> {
        let request = Self::frame_request(frame)?;
        let response: CaptionResponse = self.post_json("/caption", &request).await?;

        let description = response.description.trim();
        if description.is_empty() {
            return Err(MlError::InvalidResponse("empty caption".to_string()));
        }
        Ok(description.to_string())
    }
}

#[async_trait]
impl Transcriber for MlClient {
    async fn transcribe(&self, path: &Path) -> MlResult<Vec<TranscriptSegment>> {
        let request = TranscribeRequest {
            path: path.to_string_lossy().to_string(),
        };
        let response: TranscribeResponse = self.post_json("/transcribe", &request).await?;

        Ok(response
            .segments
            .into_iter()
            .filter(|s| !s.text.trim().is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn frame() -> VideoFrame {
        VideoFrame {
            index: 0,
            offset_secs: 0.0,
            width: 8,
            height: 8,
            data: vec![200; 8 * 8 * 3],
        }
    }

    fn client(server: &MockServer) -> MlClient {
        MlClient::new(MlClientConfig {
            base_url: server.uri(),
            retry_base_delay: Duration::from_millis(1),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = MlClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert_eq!(config.max_retries, 2);
    }

    #[tokio::test]
    async fn test_emotion_label_is_normalized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emotion"))
            .and(body_partial_json(json!({"width": 8, "height": 8})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "label": " Happy ",
                "face_detected": true,
                "confidence": 0.91
            })))
            .expect(1)
            .mount(&server)
            .await;

        let label = client(&server).analyze(&frame()).await.unwrap();
        assert_eq!(label.as_deref(), Some("happy"));
    }

    #[tokio::test]
    async fn test_no_face_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emotion"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"face_detected": false})),
            )
            .mount(&server)
            .await;

        assert_eq!(client(&server).analyze(&frame()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/caption"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server).describe(&frame()).await.unwrap_err();
        assert!(matches!(err, MlError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/caption"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).describe(&frame()).await.unwrap_err();
        assert!(matches!(err, MlError::RateLimited));
    }

    #[tokio::test]
    async fn test_transcribe_drops_blank_segments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transcribe"))
            .and(body_partial_json(json!({"path": "/clips/clip_004.mp4"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "segments": [
                    {"start": 0.0, "end": 1.2, "text": "let's go"},
                    {"start": 1.2, "text": "   "},
                    {"start": 2.5, "end": 4.0, "text": "no way"}
                ]
            })))
            .mount(&server)
            .await;

        let segments = client(&server)
            .transcribe(Path::new("/clips/clip_004.mp4"))
            .await
            .unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].text, "no way");
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        assert!(client(&server).health_check().await.unwrap());
    }
}
