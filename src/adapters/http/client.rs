//! HTTP client for the generation backend.
//!
//! Implements both `ConversationApi` and `GenerationApi` over the backend's
//! JSON API.
//!
//! # Configuration
//!
//! ```ignore
//! let config = HttpBackendConfig::new("https://api.example.com/v1")
//!     .with_api_key("secret")
//!     .with_timeout(Duration::from_secs(30));
//!
//! let client = HttpBackendClient::new(config)?;
//! ```
//!
//! # Status mapping
//!
//! | Status | Error |
//! |--------|-------|
//! | 404 | `NotFound` |
//! | 401, 403 | `Unauthorized` |
//! | 408, 429, 5xx | `Transient` |
//! | other 4xx | `Rejected` with the backend's message |

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::dto::{
    ArtifactDto, ConversationResponse, CreateConversationBody, CreateConversationResponse,
    JobStatusResponse, SendMessageBody, SendMessageResponse, SubmitJobBody, SubmitJobResponse,
};
use crate::domain::conversation::GenerationSettings;
use crate::domain::foundation::{ConversationId, JobId, OwnerScope};
use crate::domain::generation::{Artifact, ArtifactScope, JobStatusReport};
use crate::ports::{
    BackendError, ConversationApi, ConversationRecord, GenerationApi, MessageReply,
    SubmitJobRequest,
};

/// Connection settings for the backend.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub base_url: String,
    api_key: Option<Secret<String>>,
    pub timeout: Duration,
}

impl HttpBackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(Secret::new(api_key.into()));
        self
    }

    pub fn with_secret_api_key(mut self, api_key: Option<Secret<String>>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(|k| k.expose_secret().as_str())
    }
}

/// reqwest-backed implementation of the backend ports.
pub struct HttpBackendClient {
    config: HttpBackendConfig,
    base: Url,
    client: Client,
}

impl HttpBackendClient {
    /// Builds a client. Fails if the base URL cannot carry path segments.
    pub fn new(config: HttpBackendConfig) -> Result<Self, BackendError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| BackendError::parse(format!("Invalid base URL: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(BackendError::parse("Base URL cannot carry a path"));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::transient(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            base,
            client,
        })
    }

    /// Appends escaped path segments to the base URL.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.config.api_key() {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response, BackendError> {
        let response = self.authorized(builder).send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout {
                    timeout_secs: self.config.timeout.as_secs(),
                }
            } else if e.is_connect() {
                BackendError::transient(format!("Connection failed: {}", e))
            } else {
                BackendError::transient(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = BackendError::from_status(status.as_u16(), error_message(&body));
        tracing::debug!(status = status.as_u16(), error = %err, "Backend returned error status");
        Err(err)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, BackendError> {
        self.execute(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| BackendError::parse(format!("Failed to parse response: {}", e)))
    }
}

/// Pulls a human-readable message out of an error body.
///
/// Accepts `{"error": "..."}`, `{"message": "..."}` and
/// `{"error": {"message": "..."}}`; anything else is returned as-is.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            value.get("error").and_then(|e| e.get("message")),
            value.get("error"),
            value.get("message"),
            value.get("detail"),
        ];
        if let Some(text) = candidates.iter().flatten().find_map(|v| v.as_str()) {
            return text.to_string();
        }
    }
    body.trim().to_string()
}

fn scope_query(scope: &OwnerScope) -> Vec<(&'static str, String)> {
    let mut query = vec![("tenantId", scope.tenant_id.to_string())];
    if let Some(subject) = &scope.subject_id {
        query.push(("subjectId", subject.to_string()));
    }
    query
}

#[async_trait]
impl ConversationApi for HttpBackendClient {
    async fn get_conversation(
        &self,
        scope: &OwnerScope,
        conversation_id: &ConversationId,
    ) -> Result<ConversationRecord, BackendError> {
        let url = self.url(&["conversations", conversation_id.as_str()]);
        let dto: ConversationResponse = self
            .execute_json(self.client.get(url).query(&scope_query(scope)))
            .await?;
        ConversationRecord::try_from(dto)
    }

    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        finish: bool,
    ) -> Result<MessageReply, BackendError> {
        let url = self.url(&["conversations", conversation_id.as_str(), "messages"]);
        let body = SendMessageBody {
            message: text,
            finish,
        };
        let dto: SendMessageResponse = self
            .execute_json(self.client.post(url).json(&body))
            .await?;
        Ok(dto.into())
    }

    async fn create_conversation(
        &self,
        scope: &OwnerScope,
        reference_image_url: &str,
        settings: &GenerationSettings,
    ) -> Result<ConversationId, BackendError> {
        let body = CreateConversationBody {
            tenant_id: scope.tenant_id.as_str(),
            subject_id: scope.subject_id.as_ref().map(|s| s.as_str()),
            reference_image_url,
            settings,
        };
        let dto: CreateConversationResponse = self
            .execute_json(self.client.post(self.url(&["conversations"])).json(&body))
            .await?;
        ConversationId::try_from(dto)
    }

    async fn delete_conversation(
        &self,
        scope: &OwnerScope,
        conversation_id: &ConversationId,
    ) -> Result<(), BackendError> {
        let url = self.url(&["conversations", conversation_id.as_str()]);
        self.execute(self.client.delete(url).query(&scope_query(scope)))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl GenerationApi for HttpBackendClient {
    async fn submit_job(&self, request: &SubmitJobRequest) -> Result<JobId, BackendError> {
        let body = SubmitJobBody::from(request);
        let dto: SubmitJobResponse = self
            .execute_json(self.client.post(self.url(&["generations"])).json(&body))
            .await?;
        JobId::try_from(dto)
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusReport, BackendError> {
        let url = self.url(&["generations", job_id.as_str()]);
        let dto: JobStatusResponse = self.execute_json(self.client.get(url)).await?;
        Ok(dto.into())
    }

    async fn list_artifacts(&self, scope: &ArtifactScope) -> Result<Vec<Artifact>, BackendError> {
        let query: Vec<(&str, String)> = match scope {
            ArtifactScope::Conversation(id) => vec![("conversationId", id.to_string())],
            ArtifactScope::Subject {
                tenant_id,
                subject_id,
            } => vec![
                ("tenantId", tenant_id.to_string()),
                ("subjectId", subject_id.to_string()),
            ],
        };
        let dtos: Vec<ArtifactDto> = self
            .execute_json(self.client.get(self.url(&["artifacts"])).query(&query))
            .await?;
        dtos.into_iter().map(Artifact::try_from).collect()
    }
}
