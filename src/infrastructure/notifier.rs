use crate::infrastructure::error::InfraError;
use std::sync::Mutex;

/// Desktop notification seam. Phase transitions notify through this trait so
/// the runtime can be exercised in tests without a windowing system.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> Result<(), InfraError>;
}

pub struct TauriNotifier {
    app_handle: tauri::AppHandle,
}

impl TauriNotifier {
    pub fn new(app_handle: tauri::AppHandle) -> Self {
        Self { app_handle }
    }
}

impl Notifier for TauriNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), InfraError> {
        use tauri_plugin_notification::NotificationExt;

        self.app_handle
            .notification()
            .builder()
            .title(title)
            .body(body)
            .show()
            .map_err(|error| InfraError::Api(format!("notification failed: {error}")))
    }
}

/// Swallows notifications. Used when notifications are disabled in settings.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _title: &str, _body: &str) -> Result<(), InfraError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.sent
            .lock()
            .map(|sent| sent.iter().map(|(title, _)| title.clone()).collect())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), InfraError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|error| InfraError::Api(format!("notifier lock poisoned: {error}")))?;
        sent.push((title.to_string(), body.to_string()));
        Ok(())
    }
}
