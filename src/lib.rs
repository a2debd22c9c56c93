mod application;
mod domain;
mod infrastructure;

use application::bootstrap::{prepare_workspace, resolve_workspace_root};
use application::commands::{
    bootstrap_impl, cancel_focus_impl, clear_api_token_impl, complete_task_impl, create_tag_impl,
    delete_session_impl, delete_tag_impl, end_break_early_impl, flush_session_outbox_impl,
    force_complete_focus_impl, force_end_break_impl, get_timer_state_impl,
    list_calendar_events_impl, list_tags_impl, list_tasks_impl, ping_impl,
    set_break_duration_impl, set_session_labels_impl, start_focus_impl, store_api_token_impl,
    AppState, BootstrapReport, TimerStateView,
};
use application::completion::FlushReport;
use application::engine::system_now_provider;
use domain::models::{CalendarEventItem, TaskItem};
use infrastructure::api_client::{BackendApi, ReqwestBackendClient, TagCreated, TagListItem};
use infrastructure::config::load_engine_settings;
use infrastructure::credential_store::{CredentialStore, KeyringCredentialStore};
use infrastructure::notifier::{Notifier, NullNotifier, TauriNotifier};
use infrastructure::session_outbox::{SessionOutbox, SqliteSessionOutbox};
use std::sync::Arc;
use tauri::Manager;
use tracing::warn;

#[tauri::command]
fn ping() -> &'static str {
    ping_impl()
}

#[tauri::command]
fn bootstrap(
    state: tauri::State<'_, Arc<AppState>>,
    root: Option<String>,
) -> Result<BootstrapReport, String> {
    bootstrap_impl(state.inner(), root)
        .map_err(|error| state.command_error("bootstrap", &error))
}

#[tauri::command]
async fn start_focus(state: tauri::State<'_, Arc<AppState>>) -> Result<TimerStateView, String> {
    start_focus_impl(state.inner()).map_err(|error| state.command_error("start_focus", &error))
}

#[tauri::command]
async fn cancel_focus(state: tauri::State<'_, Arc<AppState>>) -> Result<TimerStateView, String> {
    cancel_focus_impl(state.inner()).map_err(|error| state.command_error("cancel_focus", &error))
}

#[tauri::command]
async fn force_complete_focus(
    state: tauri::State<'_, Arc<AppState>>,
) -> Result<TimerStateView, String> {
    force_complete_focus_impl(state.inner())
        .await
        .map_err(|error| state.command_error("force_complete_focus", &error))
}

#[tauri::command]
async fn end_break_early(
    state: tauri::State<'_, Arc<AppState>>,
) -> Result<TimerStateView, String> {
    end_break_early_impl(state.inner())
        .await
        .map_err(|error| state.command_error("end_break_early", &error))
}

#[tauri::command]
async fn force_end_break(
    state: tauri::State<'_, Arc<AppState>>,
) -> Result<TimerStateView, String> {
    force_end_break_impl(state.inner())
        .await
        .map_err(|error| state.command_error("force_end_break", &error))
}

#[tauri::command]
async fn set_break_duration(
    state: tauri::State<'_, Arc<AppState>>,
    minutes: u32,
) -> Result<TimerStateView, String> {
    set_break_duration_impl(state.inner(), minutes)
        .await
        .map_err(|error| state.command_error("set_break_duration", &error))
}

#[tauri::command]
fn set_session_labels(
    state: tauri::State<'_, Arc<AppState>>,
    description: Option<String>,
    tag: Option<String>,
) -> Result<TimerStateView, String> {
    set_session_labels_impl(state.inner(), description, tag)
        .map_err(|error| state.command_error("set_session_labels", &error))
}

#[tauri::command]
fn get_timer_state(state: tauri::State<'_, Arc<AppState>>) -> Result<TimerStateView, String> {
    get_timer_state_impl(state.inner())
        .map_err(|error| state.command_error("get_timer_state", &error))
}

#[tauri::command]
async fn delete_session(
    state: tauri::State<'_, Arc<AppState>>,
    session_id: i64,
) -> Result<TimerStateView, String> {
    delete_session_impl(state.inner(), session_id)
        .await
        .map_err(|error| state.command_error("delete_session", &error))
}

#[tauri::command]
async fn create_tag(
    state: tauri::State<'_, Arc<AppState>>,
    name: String,
) -> Result<TagCreated, String> {
    create_tag_impl(state.inner(), name)
        .await
        .map_err(|error| state.command_error("create_tag", &error))
}

#[tauri::command]
async fn list_tags(state: tauri::State<'_, Arc<AppState>>) -> Result<Vec<TagListItem>, String> {
    list_tags_impl(state.inner())
        .await
        .map_err(|error| state.command_error("list_tags", &error))
}

#[tauri::command]
async fn delete_tag(state: tauri::State<'_, Arc<AppState>>, tag_id: i64) -> Result<(), String> {
    delete_tag_impl(state.inner(), tag_id)
        .await
        .map_err(|error| state.command_error("delete_tag", &error))
}

#[tauri::command]
async fn list_tasks(state: tauri::State<'_, Arc<AppState>>) -> Result<Vec<TaskItem>, String> {
    list_tasks_impl(state.inner())
        .await
        .map_err(|error| state.command_error("list_tasks", &error))
}

#[tauri::command]
async fn complete_task(
    state: tauri::State<'_, Arc<AppState>>,
    task_id: String,
) -> Result<(), String> {
    complete_task_impl(state.inner(), task_id)
        .await
        .map_err(|error| state.command_error("complete_task", &error))
}

#[tauri::command]
async fn list_calendar_events(
    state: tauri::State<'_, Arc<AppState>>,
) -> Result<Vec<CalendarEventItem>, String> {
    list_calendar_events_impl(state.inner())
        .await
        .map_err(|error| state.command_error("list_calendar_events", &error))
}

#[tauri::command]
async fn flush_session_outbox(
    state: tauri::State<'_, Arc<AppState>>,
) -> Result<FlushReport, String> {
    flush_session_outbox_impl(state.inner())
        .await
        .map_err(|error| state.command_error("flush_session_outbox", &error))
}

#[tauri::command]
fn store_api_token(state: tauri::State<'_, Arc<AppState>>, token: String) -> Result<(), String> {
    store_api_token_impl(state.inner(), token)
        .map_err(|error| state.command_error("store_api_token", &error))
}

#[tauri::command]
fn clear_api_token(state: tauri::State<'_, Arc<AppState>>) -> Result<(), String> {
    clear_api_token_impl(state.inner())
        .map_err(|error| state.command_error("clear_api_token", &error))
}

pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tauri::Builder::default()
        .plugin(tauri_plugin_notification::init())
        .setup(|app| {
            let root = resolve_workspace_root()?;
            let workspace = prepare_workspace(&root)?;
            let settings = load_engine_settings(&workspace.config_dir);

            let credentials: Arc<dyn CredentialStore> = Arc::new(KeyringCredentialStore::default());
            if let Ok(token) = std::env::var("TOMATASK_API_TOKEN") {
                if !token.trim().is_empty() {
                    if let Err(error) = credentials.save_token(&token) {
                        warn!(error = %error, "failed to store api token from environment");
                    }
                }
            }

            let notifier: Arc<dyn Notifier> = if settings.notifications_enabled {
                Arc::new(TauriNotifier::new(app.handle().clone()))
            } else {
                Arc::new(NullNotifier)
            };
            let api: Arc<dyn BackendApi> =
                Arc::new(ReqwestBackendClient::new(settings.api_base_url.clone()));
            let outbox: Arc<dyn SessionOutbox> =
                Arc::new(SqliteSessionOutbox::new(&workspace.database_path));

            let state = Arc::new(AppState::with_default_reset_delay(
                api,
                credentials,
                outbox,
                notifier,
                system_now_provider(),
                settings,
                workspace,
            ));
            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            ping,
            bootstrap,
            start_focus,
            cancel_focus,
            force_complete_focus,
            end_break_early,
            force_end_break,
            set_break_duration,
            set_session_labels,
            get_timer_state,
            delete_session,
            create_tag,
            list_tags,
            delete_tag,
            list_tasks,
            complete_task,
            list_calendar_events,
            flush_session_outbox,
            store_api_token,
            clear_api_token
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}
