/// Dispatch client
///
/// The three remote operations against the streaming service: create a
/// session, patch its generation parameters, clear them back to
/// passthrough. Failures are classified and returned, never swallowed;
/// retrying after a failure is always safe (worst case an orphaned
/// remote session, never a corrupted one).
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Dimensions, StreamConfig};
use crate::error::{ConfigError, ServiceError};
use crate::params::GenerationParameters;
use crate::session::{Session, SessionStatus};

/// Remote operations seam. The controller talks to this trait only;
/// tests substitute a recording mock.
#[async_trait]
pub trait DispatchClient: Send + Sync {
    /// `POST /streams` — instantiate a pipeline, returning the new
    /// session handle.
    async fn create_session(
        &self,
        pipeline_id: &str,
        dimensions: Dimensions,
    ) -> Result<Session, ServiceError>;

    /// `PATCH /streams/{id}` — push a parameter document to the
    /// running session. Success has no payload beyond acknowledgment.
    async fn patch_parameters(
        &self,
        session: &Session,
        params: &GenerationParameters,
    ) -> Result<(), ServiceError>;

    /// `PATCH /streams/{id}` with a null parameter body — return the
    /// stream to passthrough (raw input feed).
    async fn clear_parameters(&self, session: &Session) -> Result<(), ServiceError>;
}

#[derive(Debug, Serialize)]
struct CreateStreamRequest<'a> {
    pipeline_id: &'a str,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct CreateStreamResponse {
    id: String,
    output_playback_id: String,
    whip_url: String,
}

impl From<CreateStreamResponse> for Session {
    fn from(res: CreateStreamResponse) -> Self {
        Session {
            id: res.id,
            output_locator: res.output_playback_id,
            ingest_endpoint: res.whip_url,
            status: SessionStatus::Live,
        }
    }
}

/// HTTP dispatch client with bearer auth and a bounded per-request
/// timeout.
pub struct HttpDispatchClient {
    config: StreamConfig,
    client: reqwest::Client,
}

impl HttpDispatchClient {
    pub fn new(config: StreamConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("stream-control/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn streams_url(&self) -> String {
        format!("{}/streams", self.config.api_base)
    }

    fn stream_url(&self, session: &Session) -> String {
        format!("{}/streams/{}", self.config.api_base, session.id)
    }

    async fn patch_body(
        &self,
        session: &Session,
        body: serde_json::Value,
    ) -> Result<(), ServiceError> {
        let response = self
            .client
            .patch(self.stream_url(session))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

/// Classify a response: 2xx passes through, anything else becomes a
/// [`ServiceError::Status`] carrying the remote body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl DispatchClient for HttpDispatchClient {
    async fn create_session(
        &self,
        pipeline_id: &str,
        dimensions: Dimensions,
    ) -> Result<Session, ServiceError> {
        debug!(pipeline_id, "creating stream session");

        let response = self
            .client
            .post(self.streams_url())
            .bearer_auth(&self.config.api_key)
            .json(&CreateStreamRequest {
                pipeline_id,
                width: dimensions.width,
                height: dimensions.height,
            })
            .send()
            .await?;

        let response = check_status(response).await?;
        let created: CreateStreamResponse = response.json().await?;
        debug!(session_id = %created.id, "stream session created");
        Ok(created.into())
    }

    async fn patch_parameters(
        &self,
        session: &Session,
        params: &GenerationParameters,
    ) -> Result<(), ServiceError> {
        debug!(session_id = %session.id, seed = params.seed, "patching stream parameters");
        self.patch_body(session, serde_json::json!({ "params": params }))
            .await
    }

    async fn clear_parameters(&self, session: &Session) -> Result<(), ServiceError> {
        debug!(session_id = %session.id, "clearing stream parameters");
        self.patch_body(session, serde_json::json!({ "params": null }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_wire_shape() {
        let request = CreateStreamRequest {
            pipeline_id: "pip_SD-turbo",
            width: 1280,
            height: 720,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["pipeline_id"], "pip_SD-turbo");
        assert_eq!(json["width"], 1280);
        assert_eq!(json["height"], 720);
    }

    #[test]
    fn test_create_response_maps_to_session() {
        let response: CreateStreamResponse = serde_json::from_value(serde_json::json!({
            "id": "str_abc",
            "output_playback_id": "pb_xyz",
            "whip_url": "https://ingest.example/whip/str_abc",
        }))
        .unwrap();

        let session: Session = response.into();
        assert_eq!(session.id, "str_abc");
        assert_eq!(session.output_locator, "pb_xyz");
        assert_eq!(session.status, SessionStatus::Live);
    }

    #[test]
    fn test_clear_body_is_null_params() {
        let body = serde_json::json!({ "params": null });
        assert_eq!(body.to_string(), r#"{"params":null}"#);
    }

    #[test]
    fn test_urls_from_config() {
        let config = StreamConfig::new("key").with_api_base("http://localhost:9000/v1");
        let client = HttpDispatchClient::new(config).unwrap();
        assert_eq!(client.streams_url(), "http://localhost:9000/v1/streams");

        let session = Session {
            id: "str_1".to_string(),
            output_locator: String::new(),
            ingest_endpoint: String::new(),
            status: SessionStatus::Live,
        };
        assert_eq!(
            client.stream_url(&session),
            "http://localhost:9000/v1/streams/str_1"
        );
    }

    #[test]
    fn test_client_rejects_missing_credential() {
        let config = StreamConfig::new("");
        assert!(HttpDispatchClient::new(config).is_err());
    }
}
