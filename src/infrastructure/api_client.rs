use crate::domain::models::{CalendarEventItem, SessionDraft, SessionRecord, TagStat, TaskItem};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

/// Server response adopted as authoritative after a successful session save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSaved {
    pub today_count: u32,
    pub today_date: String,
    pub available_tags: Vec<String>,
    pub tag_statistics: Vec<TagStat>,
    pub session: SessionRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDeleted {
    pub today_count: u32,
    pub tag_statistics: Vec<TagStat>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagCreated {
    pub tag: String,
    pub is_new: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagListItem {
    pub id: i64,
    pub name: String,
    pub session_count: u32,
}

#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn create_session(
        &self,
        access_token: &str,
        draft: &SessionDraft,
    ) -> Result<SessionSaved, InfraError>;

    async fn delete_session(
        &self,
        access_token: &str,
        session_id: i64,
    ) -> Result<SessionDeleted, InfraError>;

    async fn create_tag(&self, access_token: &str, name: &str) -> Result<TagCreated, InfraError>;

    async fn list_tags(&self, access_token: &str) -> Result<Vec<TagListItem>, InfraError>;

    async fn delete_tag(&self, access_token: &str, tag_id: i64) -> Result<(), InfraError>;

    async fn list_tasks(&self, access_token: &str) -> Result<Vec<TaskItem>, InfraError>;

    async fn complete_task(&self, access_token: &str, task_id: &str) -> Result<(), InfraError>;

    async fn list_calendar_events(
        &self,
        access_token: &str,
    ) -> Result<Vec<CalendarEventItem>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBackendClient {
    client: Client,
    base_url: String,
}

impl ReqwestBackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Api(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|error| InfraError::Api(format!("invalid api base url: {error}")))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| InfraError::Api("api base URL cannot be a base".to_string()))?;
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn read_payload<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        context: &str,
    ) -> Result<(reqwest::StatusCode, T), InfraError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Api(format!("failed reading {context} response: {error}")))?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(InfraError::ReauthRequired);
        }

        let parsed = serde_json::from_str::<T>(&body).map_err(|error| {
            InfraError::Api(format!("invalid {context} payload: {error}; body={body}"))
        })?;
        Ok((status, parsed))
    }

    fn network_error(context: &str, error: reqwest::Error) -> InfraError {
        InfraError::Api(format!("network error while {context}: {error}"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FailureFields {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    errors: Option<Vec<String>>,
    #[serde(default)]
    reauth: Option<bool>,
}

impl FailureFields {
    fn into_error(self, status: reqwest::StatusCode, context: &str) -> InfraError {
        if self.reauth == Some(true) {
            return InfraError::ReauthRequired;
        }
        if let Some(errors) = self.errors.filter(|errors| !errors.is_empty()) {
            return InfraError::Validation(errors.join("; "));
        }
        if let Some(error) = self.error.filter(|error| !error.trim().is_empty()) {
            return InfraError::Api(format!("{context} failed: {error}"));
        }
        InfraError::Api(format!("{context} failed: http {}", status.as_u16()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionSavePayload {
    success: bool,
    today_count: Option<u32>,
    today_date: Option<String>,
    available_tags: Option<Vec<String>>,
    tag_statistics: Option<Vec<TagStat>>,
    session: Option<SessionRecord>,
    #[serde(flatten)]
    failure: FailureFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionDeletePayload {
    success: bool,
    today_count: Option<u32>,
    tag_statistics: Option<Vec<TagStat>>,
    #[serde(flatten)]
    failure: FailureFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagCreatePayload {
    success: bool,
    tag: Option<String>,
    is_new: Option<bool>,
    #[serde(flatten)]
    failure: FailureFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagListPayload {
    success: bool,
    tags: Option<Vec<TagListItemPayload>>,
    #[serde(flatten)]
    failure: FailureFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagListItemPayload {
    id: i64,
    name: String,
    #[serde(default)]
    session_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AckPayload {
    success: bool,
    #[serde(flatten)]
    failure: FailureFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskListPayload {
    success: bool,
    tasks: Option<Vec<TaskItem>>,
    #[serde(flatten)]
    failure: FailureFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarEventListPayload {
    success: bool,
    events: Option<Vec<CalendarEventItem>>,
    #[serde(flatten)]
    failure: FailureFields,
}

#[async_trait]
impl BackendApi for ReqwestBackendClient {
    async fn create_session(
        &self,
        access_token: &str,
        draft: &SessionDraft,
    ) -> Result<SessionSaved, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        draft.validate().map_err(InfraError::Validation)?;

        let endpoint = self.endpoint(&["sessions"])?;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(access_token)
            .json(draft)
            .send()
            .await
            .map_err(|error| Self::network_error("saving session", error))?;

        let (status, parsed) =
            Self::read_payload::<SessionSavePayload>(response, "session save").await?;
        if !status.is_success() || !parsed.success {
            return Err(parsed.failure.into_error(status, "session save"));
        }

        let session = parsed
            .session
            .ok_or_else(|| InfraError::Api("session save response missing session".to_string()))?;
        Ok(SessionSaved {
            today_count: parsed.today_count.unwrap_or_default(),
            today_date: parsed.today_date.unwrap_or_default(),
            available_tags: parsed.available_tags.unwrap_or_default(),
            tag_statistics: parsed.tag_statistics.unwrap_or_default(),
            session,
        })
    }

    async fn delete_session(
        &self,
        access_token: &str,
        session_id: i64,
    ) -> Result<SessionDeleted, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let endpoint = self.endpoint(&["sessions", &session_id.to_string()])?;
        let response = self
            .client
            .delete(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| Self::network_error("deleting session", error))?;

        let (status, parsed) =
            Self::read_payload::<SessionDeletePayload>(response, "session delete").await?;
        if !status.is_success() || !parsed.success {
            return Err(parsed.failure.into_error(status, "session delete"));
        }

        Ok(SessionDeleted {
            today_count: parsed.today_count.unwrap_or_default(),
            tag_statistics: parsed.tag_statistics.unwrap_or_default(),
        })
    }

    async fn create_tag(&self, access_token: &str, name: &str) -> Result<TagCreated, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(name, "tag name")?;

        let endpoint = self.endpoint(&["tags"])?;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "name": name.trim() }))
            .send()
            .await
            .map_err(|error| Self::network_error("creating tag", error))?;

        let (status, parsed) = Self::read_payload::<TagCreatePayload>(response, "tag create").await?;
        if !status.is_success() || !parsed.success {
            return Err(parsed.failure.into_error(status, "tag create"));
        }

        let tag = parsed
            .tag
            .ok_or_else(|| InfraError::Api("tag create response missing tag".to_string()))?;
        Ok(TagCreated {
            tag,
            is_new: parsed.is_new.unwrap_or(true),
        })
    }

    async fn list_tags(&self, access_token: &str) -> Result<Vec<TagListItem>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let endpoint = self.endpoint(&["tags"])?;
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| Self::network_error("listing tags", error))?;

        let (status, parsed) = Self::read_payload::<TagListPayload>(response, "tag list").await?;
        if !status.is_success() || !parsed.success {
            return Err(parsed.failure.into_error(status, "tag list"));
        }

        Ok(parsed
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|tag| TagListItem {
                id: tag.id,
                name: tag.name,
                session_count: tag.session_count,
            })
            .collect())
    }

    async fn delete_tag(&self, access_token: &str, tag_id: i64) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let endpoint = self.endpoint(&["tags", &tag_id.to_string()])?;
        let response = self
            .client
            .delete(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| Self::network_error("deleting tag", error))?;

        let (status, parsed) = Self::read_payload::<AckPayload>(response, "tag delete").await?;
        if !status.is_success() || !parsed.success {
            return Err(parsed.failure.into_error(status, "tag delete"));
        }
        Ok(())
    }

    async fn list_tasks(&self, access_token: &str) -> Result<Vec<TaskItem>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let endpoint = self.endpoint(&["tasks"])?;
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| Self::network_error("listing tasks", error))?;

        let (status, parsed) = Self::read_payload::<TaskListPayload>(response, "task list").await?;
        if !status.is_success() || !parsed.success {
            return Err(parsed.failure.into_error(status, "task list"));
        }
        Ok(parsed.tasks.unwrap_or_default())
    }

    async fn complete_task(&self, access_token: &str, task_id: &str) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(task_id, "task id")?;

        let endpoint = self.endpoint(&["tasks", task_id.trim(), "complete"])?;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| Self::network_error("completing task", error))?;

        let (status, parsed) = Self::read_payload::<AckPayload>(response, "task complete").await?;
        if !status.is_success() || !parsed.success {
            return Err(parsed.failure.into_error(status, "task complete"));
        }
        Ok(())
    }

    async fn list_calendar_events(
        &self,
        access_token: &str,
    ) -> Result<Vec<CalendarEventItem>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let endpoint = self.endpoint(&["calendar_events"])?;
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| Self::network_error("listing calendar events", error))?;

        let (status, parsed) =
            Self::read_payload::<CalendarEventListPayload>(response, "calendar event list").await?;
        if !status.is_success() || !parsed.success {
            return Err(parsed.failure.into_error(status, "calendar event list"));
        }
        Ok(parsed.events.unwrap_or_default())
    }
}
