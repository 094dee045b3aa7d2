//! Wire DTOs for the generation backend's JSON API.
//!
//! Field names are camelCase on the wire. Each response DTO converts into
//! domain types with `BackendError::Parse` for anything the domain refuses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{GenerationSettings, Message, Role, SettingsPatch};
use crate::domain::foundation::{
    ArtifactId, ConversationId, JobId, MessageId, Percentage, Timestamp,
};
use crate::domain::generation::{Artifact, ArtifactKind, JobProgress, JobState, JobStatusReport};
use crate::ports::{BackendError, ConversationRecord, MessageReply, SubmitJobRequest};

// ════════════════════════════════════════════════════════════════════════════
// Requests
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationBody<'a> {
    pub tenant_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<&'a str>,
    pub reference_image_url: &'a str,
    pub settings: &'a GenerationSettings,
}

#[derive(Debug, Serialize)]
pub struct SendMessageBody<'a> {
    pub message: &'a str,
    pub finish: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobBody<'a> {
    pub conversation_id: &'a str,
    pub tenant_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<&'a str>,
    pub brief: &'a str,
    pub reference_image_url: &'a str,
    pub provider: &'static str,
    pub settings: &'a GenerationSettings,
}

impl<'a> From<&'a SubmitJobRequest> for SubmitJobBody<'a> {
    fn from(request: &'a SubmitJobRequest) -> Self {
        Self {
            conversation_id: request.conversation_id.as_str(),
            tenant_id: request.scope.tenant_id.as_str(),
            subject_id: request.scope.subject_id.as_ref().map(|s| s.as_str()),
            brief: &request.brief,
            reference_image_url: &request.reference_image_url,
            provider: request.provider().as_str(),
            settings: &request.settings,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Responses
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    #[serde(default)]
    pub messages: Vec<MessageDto>,
    #[serde(default)]
    pub current_image_url: Option<String>,
    #[serde(default)]
    pub reference_image_url: Option<String>,
    #[serde(default)]
    pub settings: Option<SettingsPatch>,
}

impl TryFrom<ConversationResponse> for ConversationRecord {
    type Error = BackendError;

    fn try_from(dto: ConversationResponse) -> Result<Self, Self::Error> {
        let messages = dto
            .messages
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ConversationRecord {
            messages,
            current_image_url: non_blank(dto.current_image_url),
            reference_image_url: non_blank(dto.reference_image_url),
            settings: dto.settings,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleDto {
    User,
    #[serde(alias = "model")]
    Assistant,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub role: RoleDto,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl TryFrom<MessageDto> for Message {
    type Error = BackendError;

    fn try_from(dto: MessageDto) -> Result<Self, Self::Error> {
        let id = MessageId::server(dto.id).map_err(|e| BackendError::parse(e.to_string()))?;
        let role = match dto.role {
            RoleDto::User => Role::User,
            RoleDto::Assistant => Role::Assistant,
        };
        let timestamp = dto
            .timestamp
            .map(Timestamp::from_datetime)
            .unwrap_or_else(Timestamp::now);
        let message = Message::confirmed(id, role, dto.content, timestamp);
        Ok(match non_blank(dto.image_url) {
            Some(url) => message.with_image_url(url),
            None => message,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    #[serde(default)]
    pub response_text: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl From<SendMessageResponse> for MessageReply {
    fn from(dto: SendMessageResponse) -> Self {
        MessageReply {
            response_text: dto.response_text,
            image_url: non_blank(dto.image_url),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationResponse {
    pub conversation_id: String,
}

impl TryFrom<CreateConversationResponse> for ConversationId {
    type Error = BackendError;

    fn try_from(dto: CreateConversationResponse) -> Result<Self, Self::Error> {
        ConversationId::new(dto.conversation_id).map_err(|e| BackendError::parse(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub job_id: String,
}

impl TryFrom<SubmitJobResponse> for JobId {
    type Error = BackendError;

    fn try_from(dto: SubmitJobResponse) -> Result<Self, Self::Error> {
        JobId::new(dto.job_id).map_err(|e| BackendError::parse(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStateDto {
    #[serde(alias = "pending")]
    Queued,
    #[serde(alias = "running", alias = "in_progress")]
    Processing,
    #[serde(alias = "succeeded")]
    Completed,
    Failed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl From<JobStateDto> for JobState {
    fn from(dto: JobStateDto) -> Self {
        match dto {
            JobStateDto::Queued => JobState::Queued,
            JobStateDto::Processing => JobState::Processing,
            JobStateDto::Completed => JobState::Completed,
            JobStateDto::Failed => JobState::Failed,
            JobStateDto::Cancelled => JobState::Cancelled,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressDto {
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub current_step: String,
    #[serde(default)]
    pub completed_units: u32,
    #[serde(default)]
    pub total_units: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub state: JobStateDto,
    #[serde(default)]
    pub progress: Option<JobProgressDto>,
    #[serde(default)]
    pub error: Option<String>,
}

impl From<JobStatusResponse> for JobStatusReport {
    fn from(dto: JobStatusResponse) -> Self {
        let mut report = JobStatusReport::new(dto.state.into());
        if let Some(p) = dto.progress {
            report = report.with_progress(JobProgress {
                percentage: Percentage::from_reported(p.percentage),
                current_step: p.current_step,
                completed_units: p.completed_units,
                total_units: p.total_units,
            });
        }
        if let Some(error) = non_blank(dto.error) {
            report = report.with_error(error);
        }
        report
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDto {
    pub id: String,
    #[serde(default)]
    pub job_id: Option<String>,
    pub kind: ArtifactKind,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ArtifactDto> for Artifact {
    type Error = BackendError;

    fn try_from(dto: ArtifactDto) -> Result<Self, Self::Error> {
        let id = ArtifactId::new(dto.id).map_err(|e| BackendError::parse(e.to_string()))?;
        let source_job_id = non_blank(dto.job_id)
            .map(JobId::new)
            .transpose()
            .map_err(|e| BackendError::parse(e.to_string()))?;
        Ok(Artifact::new(
            id,
            source_job_id,
            dto.kind,
            dto.url,
            Timestamp::from_datetime(dto.created_at),
        ))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::Platform;
    use serde_json::json;

    #[test]
    fn conversation_response_parses_transcript_and_partial_settings() {
        let dto: ConversationResponse = serde_json::from_value(json!({
            "messages": [
                {"id": "m1", "role": "user", "content": "hi", "timestamp": "2026-01-02T03:04:05Z"},
                {"id": "m2", "role": "assistant", "content": "hello", "imageUrl": "https://x/p.png"}
            ],
            "currentImageUrl": "",
            "settings": {"platform": "snapchat"}
        }))
        .unwrap();

        let record = ConversationRecord::try_from(dto).unwrap();
        assert_eq!(record.messages.len(), 2);
        assert_eq!(record.messages[1].image_url(), Some("https://x/p.png"));
        assert_eq!(record.current_image_url, None);
        let settings = record.settings.unwrap();
        assert_eq!(settings.platform, Some(Platform::Snapchat));
        assert_eq!(settings.provider, None);
    }

    #[test]
    fn blank_message_id_is_a_parse_error() {
        let dto: MessageDto =
            serde_json::from_value(json!({"id": " ", "role": "user", "content": "x"})).unwrap();
        assert!(matches!(Message::try_from(dto), Err(BackendError::Parse(_))));
    }

    #[test]
    fn job_status_accepts_aliases_and_rounds_progress() {
        let dto: JobStatusResponse = serde_json::from_value(json!({
            "state": "running",
            "progress": {"percentage": 39.6, "currentStep": "render"}
        }))
        .unwrap();

        let report = JobStatusReport::from(dto);
        assert_eq!(report.state, JobState::Processing);
        assert_eq!(report.progress.unwrap().percentage.value(), 40);
    }

    #[test]
    fn artifact_parses_optional_job_reference() {
        let dto: ArtifactDto = serde_json::from_value(json!({
            "id": "a1",
            "jobId": "j1",
            "kind": "video",
            "url": "https://cdn/a1.mp4",
            "createdAt": "2026-01-02T03:04:05Z"
        }))
        .unwrap();

        let artifact = Artifact::try_from(dto).unwrap();
        assert_eq!(artifact.source_job_id, Some(JobId::new("j1").unwrap()));
        assert_eq!(artifact.kind, ArtifactKind::Video);
        assert!(!artifact.is_latest);
    }

    #[test]
    fn submit_body_uses_camel_case_and_provider_name() {
        let request = SubmitJobRequest {
            conversation_id: ConversationId::new("c1").unwrap(),
            scope: crate::domain::foundation::OwnerScope::without_subject(
                crate::domain::foundation::TenantId::new("t1").unwrap(),
            ),
            brief: "brief".into(),
            reference_image_url: "https://x/img.png".into(),
            settings: GenerationSettings::default(),
        };

        let value = serde_json::to_value(SubmitJobBody::from(&request)).unwrap();
        assert_eq!(value["conversationId"], "c1");
        assert_eq!(value["provider"], "providerB");
        assert_eq!(value["settings"]["aspectRatio"], "9:16");
        assert!(value.get("subjectId").is_none());
    }
}
