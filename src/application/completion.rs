use crate::domain::models::SessionDraft;
use crate::infrastructure::api_client::{BackendApi, SessionSaved};
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::session_outbox::SessionOutbox;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Result of persisting a completed focus session. The break starts either
/// way; this only decides whether the server state gets adopted.
#[derive(Debug)]
pub enum PersistOutcome {
    Saved(SessionSaved),
    Fallback { reason: String },
}

/// Single bounded save attempt. Any failure lands the draft in the outbox and
/// resolves to the local fallback; nothing here ever blocks the break.
pub async fn persist_session(
    api: &Arc<dyn BackendApi>,
    credentials: &Arc<dyn CredentialStore>,
    outbox: &Arc<dyn SessionOutbox>,
    draft: &SessionDraft,
    now: DateTime<Utc>,
) -> PersistOutcome {
    let token = match credentials.load_token() {
        Ok(Some(token)) => token,
        Ok(None) => return fallback_with_enqueue(outbox, draft, now, "no api token stored"),
        Err(error) => return fallback_with_enqueue(outbox, draft, now, &error.to_string()),
    };

    match api.create_session(&token, draft).await {
        Ok(saved) => PersistOutcome::Saved(saved),
        Err(error) => fallback_with_enqueue(outbox, draft, now, &error.to_string()),
    }
}

fn fallback_with_enqueue(
    outbox: &Arc<dyn SessionOutbox>,
    draft: &SessionDraft,
    now: DateTime<Utc>,
    reason: &str,
) -> PersistOutcome {
    if let Err(error) = outbox.enqueue(draft, now) {
        warn!(error = %error, "failed to enqueue unsaved session");
    }
    PersistOutcome::Fallback {
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FlushReport {
    pub flushed: u32,
    pub remaining: u32,
}

/// Retries queued session saves in order, stopping at the first failure so a
/// down server is hit at most once per flush.
pub async fn flush_outbox(
    api: &Arc<dyn BackendApi>,
    credentials: &Arc<dyn CredentialStore>,
    outbox: &Arc<dyn SessionOutbox>,
) -> Result<FlushReport, InfraError> {
    let token = credentials
        .load_token()?
        .ok_or_else(|| InfraError::Credential("no api token stored".to_string()))?;

    let entries = outbox.list()?;
    let total = entries.len() as u32;
    let mut flushed = 0u32;
    for entry in entries {
        if let Err(error) = api.create_session(&token, &entry.draft).await {
            warn!(entry_id = entry.id, error = %error, "outbox flush stopped");
            if matches!(error, InfraError::ReauthRequired) {
                return Err(error);
            }
            break;
        }
        outbox.remove(entry.id)?;
        flushed += 1;
    }

    Ok(FlushReport {
        flushed,
        remaining: total - flushed,
    })
}
