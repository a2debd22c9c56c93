use crate::application::bootstrap::{prepare_workspace, WorkspacePaths};
use crate::application::completion::{flush_outbox, persist_session, FlushReport, PersistOutcome};
use crate::application::engine::{
    BreakAdjustment, EngineError, NowProvider, TickOutcome, TimerCore, TimerSnapshot,
    BREAK_RESET_DELAY_MS,
};
use crate::domain::models::{CalendarEventItem, TaskItem};
use crate::domain::projection::{
    daily_progress, format_countdown, progress_fraction, tag_distribution, TagSlice,
};
use crate::infrastructure::api_client::{BackendApi, TagCreated, TagListItem};
use crate::infrastructure::config::EngineSettings;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::notifier::Notifier;
use crate::infrastructure::session_outbox::SessionOutbox;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub struct RuntimeState {
    pub core: TimerCore,
    /// Bumped whenever a tick source is installed or cancelled. A tick task
    /// whose epoch no longer matches stops without touching the timer.
    pub tick_epoch: u64,
}

pub struct AppState {
    runtime: Mutex<RuntimeState>,
    tick_handle: Mutex<Option<JoinHandle<()>>>,
    api: Arc<dyn BackendApi>,
    credentials: Arc<dyn CredentialStore>,
    outbox: Arc<dyn SessionOutbox>,
    notifier: Arc<dyn Notifier>,
    now: NowProvider,
    settings: EngineSettings,
    workspace: WorkspacePaths,
    reset_delay_ms: u64,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn BackendApi>,
        credentials: Arc<dyn CredentialStore>,
        outbox: Arc<dyn SessionOutbox>,
        notifier: Arc<dyn Notifier>,
        now: NowProvider,
        settings: EngineSettings,
        workspace: WorkspacePaths,
        reset_delay_ms: u64,
    ) -> Self {
        let core = TimerCore::new(
            Arc::clone(&now),
            settings.timezone,
            settings.default_break_seconds,
        );
        Self {
            runtime: Mutex::new(RuntimeState {
                core,
                tick_epoch: 0,
            }),
            tick_handle: Mutex::new(None),
            api,
            credentials,
            outbox,
            notifier,
            now,
            settings,
            workspace,
            reset_delay_ms,
        }
    }

    pub fn with_default_reset_delay(
        api: Arc<dyn BackendApi>,
        credentials: Arc<dyn CredentialStore>,
        outbox: Arc<dyn SessionOutbox>,
        notifier: Arc<dyn Notifier>,
        now: NowProvider,
        settings: EngineSettings,
        workspace: WorkspacePaths,
    ) -> Self {
        Self::new(
            api,
            credentials,
            outbox,
            notifier,
            now,
            settings,
            workspace,
            BREAK_RESET_DELAY_MS,
        )
    }

    fn lock_runtime(&self) -> Result<MutexGuard<'_, RuntimeState>, InfraError> {
        self.runtime
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("runtime lock poisoned: {error}")))
    }

    fn require_token(&self) -> Result<String, InfraError> {
        self.credentials
            .load_token()?
            .ok_or_else(|| InfraError::Credential("no api token stored".to_string()))
    }

    fn guard_debug_commands(&self) -> Result<(), InfraError> {
        if !self.settings.debug_commands {
            return Err(InfraError::Validation(
                "debug commands are disabled".to_string(),
            ));
        }
        Ok(())
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        error!(command, error = %error, "command failed");
        error.to_string()
    }
}

fn engine_error(error: EngineError) -> InfraError {
    InfraError::Validation(error.to_string())
}

/// Timer snapshot plus the derived values the frontend renders directly.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerStateView {
    #[serde(flatten)]
    pub snapshot: TimerSnapshot,
    pub countdown: String,
    pub progress: f64,
    pub daily_progress: f64,
    pub daily_target: u32,
    pub tag_distribution: Vec<TagSlice>,
}

fn view_of(snapshot: TimerSnapshot, daily_target: u32) -> TimerStateView {
    TimerStateView {
        countdown: format_countdown(snapshot.seconds_remaining),
        progress: progress_fraction(snapshot.seconds_remaining, snapshot.reference_duration),
        daily_progress: daily_progress(snapshot.completed_today_count, daily_target),
        daily_target,
        tag_distribution: tag_distribution(&snapshot.tag_statistics),
        snapshot,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    pub root: String,
    pub config_dir: String,
    pub database_path: String,
}

/// Starts a 1-second interval task driving the countdown. Replaces any
/// previous source: the epoch bump makes stale tasks inert before the abort
/// tears them down.
pub fn install_tick_source(state: &Arc<AppState>) -> Result<(), InfraError> {
    let epoch = {
        let mut runtime = state.lock_runtime()?;
        runtime.tick_epoch += 1;
        runtime.tick_epoch
    };

    let task_state = Arc::clone(state);
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first interval tick fires immediately; skip it so the countdown
        // moves one second after installation, not at it.
        interval.tick().await;
        loop {
            interval.tick().await;
            let outcome = {
                let Ok(mut runtime) = task_state.runtime.lock() else {
                    break;
                };
                if runtime.tick_epoch != epoch {
                    break;
                }
                runtime.core.tick()
            };
            match outcome {
                TickOutcome::FocusElapsed => {
                    let tail_state = Arc::clone(&task_state);
                    tokio::spawn(async move {
                        if let Err(error) = complete_focus(&tail_state).await {
                            error!(error = %error, "focus completion failed");
                        }
                    });
                }
                TickOutcome::BreakElapsed => {
                    let tail_state = Arc::clone(&task_state);
                    tokio::spawn(async move {
                        if let Err(error) = end_break(&tail_state).await {
                            error!(error = %error, "break exit failed");
                        }
                    });
                }
                TickOutcome::Ticked(_) | TickOutcome::Idle => {}
            }
        }
    });

    let mut slot = state
        .tick_handle
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("tick handle lock poisoned: {error}")))?;
    if let Some(previous) = slot.replace(handle) {
        previous.abort();
    }
    Ok(())
}

pub fn cancel_tick_source(state: &Arc<AppState>) -> Result<(), InfraError> {
    {
        let mut runtime = state.lock_runtime()?;
        runtime.tick_epoch += 1;
    }
    let mut slot = state
        .tick_handle
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("tick handle lock poisoned: {error}")))?;
    if let Some(handle) = slot.take() {
        handle.abort();
    }
    Ok(())
}

/// Completion tail shared by the natural tick-to-zero path and the debug
/// force path. The break starts whatever the persistence call did.
pub async fn complete_focus(state: &Arc<AppState>) -> Result<(), InfraError> {
    let draft = state.lock_runtime()?.core.begin_completion();
    let Some(draft) = draft else {
        return Ok(());
    };

    let outcome = persist_session(
        &state.api,
        &state.credentials,
        &state.outbox,
        &draft,
        (state.now)(),
    )
    .await;

    {
        let mut runtime = state.lock_runtime()?;
        match outcome {
            PersistOutcome::Saved(saved) => {
                info!(today_count = saved.today_count, "session saved");
                runtime.core.apply_server_completion(
                    saved.today_count,
                    &saved.today_date,
                    saved.available_tags,
                    saved.tag_statistics,
                );
            }
            PersistOutcome::Fallback { reason } => {
                warn!(reason = %reason, "session save failed, using local count");
                runtime.core.apply_local_fallback();
            }
        }
        runtime.core.enter_break();
    }

    install_tick_source(state)?;
    if let Err(notify_error) = state.notifier.notify("Focus complete", "Time for a break") {
        warn!(error = %notify_error, "notification failed");
    }
    Ok(())
}

/// Break-exit tail shared by the natural countdown, the early-end command and
/// a retarget that lands in the past. Repeated requests collapse into one.
pub async fn end_break(state: &Arc<AppState>) -> Result<(), InfraError> {
    let began = state.lock_runtime()?.core.begin_break_exit();
    if !began {
        return Ok(());
    }

    if let Err(notify_error) = state
        .notifier
        .notify("Break over", "Ready for the next focus")
    {
        warn!(error = %notify_error, "notification failed");
    }

    if state.reset_delay_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(state.reset_delay_ms)).await;
    }

    state.lock_runtime()?.core.finish_break_exit();
    cancel_tick_source(state)
}

pub fn start_focus_impl(state: &Arc<AppState>) -> Result<TimerStateView, InfraError> {
    let snapshot = {
        let mut runtime = state.lock_runtime()?;
        runtime.core.start_focus().map_err(engine_error)?;
        runtime.core.snapshot()
    };
    install_tick_source(state)?;
    info!(phase = snapshot.phase.as_str(), "focus started");
    Ok(view_of(snapshot, state.settings.daily_target))
}

pub fn cancel_focus_impl(state: &Arc<AppState>) -> Result<TimerStateView, InfraError> {
    let snapshot = {
        let mut runtime = state.lock_runtime()?;
        runtime.core.cancel_focus().map_err(engine_error)?;
        runtime.core.snapshot()
    };
    cancel_tick_source(state)?;
    info!("focus cancelled");
    Ok(view_of(snapshot, state.settings.daily_target))
}

pub async fn force_complete_focus_impl(
    state: &Arc<AppState>,
) -> Result<TimerStateView, InfraError> {
    state.guard_debug_commands()?;
    complete_focus(state).await?;
    get_timer_state_impl(state)
}

pub async fn end_break_early_impl(state: &Arc<AppState>) -> Result<TimerStateView, InfraError> {
    end_break(state).await?;
    get_timer_state_impl(state)
}

pub async fn force_end_break_impl(state: &Arc<AppState>) -> Result<TimerStateView, InfraError> {
    state.guard_debug_commands()?;
    end_break(state).await?;
    get_timer_state_impl(state)
}

pub async fn set_break_duration_impl(
    state: &Arc<AppState>,
    minutes: u32,
) -> Result<TimerStateView, InfraError> {
    let adjustment = {
        let mut runtime = state.lock_runtime()?;
        runtime.core.set_break_duration(minutes).map_err(engine_error)?
    };
    if adjustment == BreakAdjustment::BreakElapsed {
        end_break(state).await?;
    }
    get_timer_state_impl(state)
}

pub fn set_session_labels_impl(
    state: &Arc<AppState>,
    description: Option<String>,
    tag: Option<String>,
) -> Result<TimerStateView, InfraError> {
    let snapshot = {
        let mut runtime = state.lock_runtime()?;
        runtime.core.set_session_labels(description, tag);
        runtime.core.snapshot()
    };
    Ok(view_of(snapshot, state.settings.daily_target))
}

pub fn get_timer_state_impl(state: &Arc<AppState>) -> Result<TimerStateView, InfraError> {
    let snapshot = {
        let mut runtime = state.lock_runtime()?;
        runtime.core.rollover_if_stale();
        runtime.core.snapshot()
    };
    Ok(view_of(snapshot, state.settings.daily_target))
}

pub async fn delete_session_impl(
    state: &Arc<AppState>,
    session_id: i64,
) -> Result<TimerStateView, InfraError> {
    let token = state.require_token()?;
    let deleted = state.api.delete_session(&token, session_id).await?;
    let snapshot = {
        let mut runtime = state.lock_runtime()?;
        runtime.core.adopt_daily_count(deleted.today_count);
        runtime.core.adopt_tag_statistics(deleted.tag_statistics);
        runtime.core.snapshot()
    };
    Ok(view_of(snapshot, state.settings.daily_target))
}

pub async fn create_tag_impl(state: &Arc<AppState>, name: String) -> Result<TagCreated, InfraError> {
    let token = state.require_token()?;
    state.api.create_tag(&token, &name).await
}

pub async fn list_tags_impl(state: &Arc<AppState>) -> Result<Vec<TagListItem>, InfraError> {
    let token = state.require_token()?;
    state.api.list_tags(&token).await
}

pub async fn delete_tag_impl(state: &Arc<AppState>, tag_id: i64) -> Result<(), InfraError> {
    let token = state.require_token()?;
    state.api.delete_tag(&token, tag_id).await
}

pub async fn list_tasks_impl(state: &Arc<AppState>) -> Result<Vec<TaskItem>, InfraError> {
    let token = state.require_token()?;
    state.api.list_tasks(&token).await
}

pub async fn complete_task_impl(state: &Arc<AppState>, task_id: String) -> Result<(), InfraError> {
    let token = state.require_token()?;
    state.api.complete_task(&token, &task_id).await
}

pub async fn list_calendar_events_impl(
    state: &Arc<AppState>,
) -> Result<Vec<CalendarEventItem>, InfraError> {
    let token = state.require_token()?;
    state.api.list_calendar_events(&token).await
}

pub async fn flush_session_outbox_impl(state: &Arc<AppState>) -> Result<FlushReport, InfraError> {
    flush_outbox(&state.api, &state.credentials, &state.outbox).await
}

pub fn store_api_token_impl(state: &Arc<AppState>, token: String) -> Result<(), InfraError> {
    state.credentials.save_token(&token)
}

pub fn clear_api_token_impl(state: &Arc<AppState>) -> Result<(), InfraError> {
    state.credentials.delete_token()
}

pub fn bootstrap_impl(
    state: &Arc<AppState>,
    root: Option<String>,
) -> Result<BootstrapReport, InfraError> {
    let root = root
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| state.workspace.root.clone());
    let paths = prepare_workspace(&root)?;
    Ok(BootstrapReport {
        root: paths.root.display().to_string(),
        config_dir: paths.config_dir.display().to_string(),
        database_path: paths.database_path.display().to_string(),
    })
}

pub fn ping_impl() -> &'static str {
    "pong"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Phase, SessionDraft, SessionRecord, TagStat};
    use crate::infrastructure::api_client::{SessionDeleted, SessionSaved};
    use crate::infrastructure::credential_store::InMemoryCredentialStore;
    use crate::infrastructure::notifier::RecordingNotifier;
    use crate::infrastructure::session_outbox::InMemorySessionOutbox;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use chrono_tz::Tz;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeBackendApi {
        create_session_responses: Mutex<VecDeque<Result<SessionSaved, InfraError>>>,
        delete_session_responses: Mutex<VecDeque<Result<SessionDeleted, InfraError>>>,
        list_tasks_responses: Mutex<VecDeque<Result<Vec<TaskItem>, InfraError>>>,
        create_tag_responses: Mutex<VecDeque<Result<TagCreated, InfraError>>>,
        create_session_calls: AtomicUsize,
    }

    impl FakeBackendApi {
        fn push_create_session(&self, response: Result<SessionSaved, InfraError>) {
            self.create_session_responses
                .lock()
                .expect("responses lock")
                .push_back(response);
        }

        fn create_session_calls(&self) -> usize {
            self.create_session_calls.load(Ordering::SeqCst)
        }
    }

    fn pop_scripted<T>(queue: &Mutex<VecDeque<Result<T, InfraError>>>) -> Result<T, InfraError> {
        queue
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(InfraError::Api("no scripted response".to_string())))
    }

    #[async_trait]
    impl BackendApi for FakeBackendApi {
        async fn create_session(
            &self,
            _access_token: &str,
            _draft: &SessionDraft,
        ) -> Result<SessionSaved, InfraError> {
            self.create_session_calls.fetch_add(1, Ordering::SeqCst);
            pop_scripted(&self.create_session_responses)
        }

        async fn delete_session(
            &self,
            _access_token: &str,
            _session_id: i64,
        ) -> Result<SessionDeleted, InfraError> {
            pop_scripted(&self.delete_session_responses)
        }

        async fn create_tag(
            &self,
            _access_token: &str,
            _name: &str,
        ) -> Result<TagCreated, InfraError> {
            pop_scripted(&self.create_tag_responses)
        }

        async fn list_tags(&self, _access_token: &str) -> Result<Vec<TagListItem>, InfraError> {
            Ok(Vec::new())
        }

        async fn delete_tag(&self, _access_token: &str, _tag_id: i64) -> Result<(), InfraError> {
            Ok(())
        }

        async fn list_tasks(&self, _access_token: &str) -> Result<Vec<TaskItem>, InfraError> {
            pop_scripted(&self.list_tasks_responses)
        }

        async fn complete_task(
            &self,
            _access_token: &str,
            _task_id: &str,
        ) -> Result<(), InfraError> {
            Ok(())
        }

        async fn list_calendar_events(
            &self,
            _access_token: &str,
        ) -> Result<Vec<CalendarEventItem>, InfraError> {
            Ok(Vec::new())
        }
    }

    struct TestClock {
        current: Arc<Mutex<DateTime<Utc>>>,
    }

    impl TestClock {
        fn starting_at(value: &str) -> Self {
            let current = DateTime::parse_from_rfc3339(value)
                .expect("valid datetime")
                .with_timezone(&Utc);
            Self {
                current: Arc::new(Mutex::new(current)),
            }
        }

        fn provider(&self) -> NowProvider {
            let current = Arc::clone(&self.current);
            Arc::new(move || *current.lock().expect("clock lock"))
        }

        fn advance_seconds(&self, seconds: i64) {
            let mut current = self.current.lock().expect("clock lock");
            *current += Duration::seconds(seconds);
        }
    }

    struct TestHarness {
        state: Arc<AppState>,
        api: Arc<FakeBackendApi>,
        notifier: Arc<RecordingNotifier>,
        outbox: Arc<InMemorySessionOutbox>,
        clock: TestClock,
    }

    fn test_harness() -> TestHarness {
        let clock = TestClock::starting_at("2026-08-27T09:00:00Z");
        let api = Arc::new(FakeBackendApi::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let outbox = Arc::new(InMemorySessionOutbox::default());
        let settings = EngineSettings {
            timezone: Tz::UTC,
            debug_commands: true,
            ..EngineSettings::default()
        };
        let workspace = WorkspacePaths {
            root: PathBuf::from("/tmp/tomatask-unused"),
            config_dir: PathBuf::from("/tmp/tomatask-unused/config"),
            state_dir: PathBuf::from("/tmp/tomatask-unused/state"),
            database_path: PathBuf::from("/tmp/tomatask-unused/state/tomatask.sqlite"),
        };
        let state = Arc::new(AppState::new(
            Arc::clone(&api) as Arc<dyn BackendApi>,
            Arc::new(InMemoryCredentialStore::with_token("token-abc")),
            Arc::clone(&outbox) as Arc<dyn SessionOutbox>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            clock.provider(),
            settings,
            workspace,
            0,
        ));
        TestHarness {
            state,
            api,
            notifier,
            outbox,
            clock,
        }
    }

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_saved(today_count: u32) -> SessionSaved {
        SessionSaved {
            today_count,
            today_date: "2026-08-27".to_string(),
            available_tags: vec!["work".to_string()],
            tag_statistics: vec![TagStat {
                tag: "work".to_string(),
                count: today_count,
            }],
            session: SessionRecord {
                id: 42,
                description: None,
                started_at: fixed_time("2026-08-27T09:00:00Z"),
            },
        }
    }

    #[tokio::test]
    async fn start_and_state_expose_projections() {
        let harness = test_harness();
        let view = start_focus_impl(&harness.state).expect("start focus");

        assert_eq!(view.snapshot.phase, Phase::Focusing);
        assert_eq!(view.countdown, "25:00");
        assert_eq!(view.progress, 0.0);
        assert_eq!(view.daily_target, 11);

        cancel_tick_source(&harness.state).expect("cancel tick source");
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let harness = test_harness();
        start_focus_impl(&harness.state).expect("start focus");
        let error = start_focus_impl(&harness.state).expect_err("second start");
        assert!(matches!(error, InfraError::Validation(_)));
        cancel_tick_source(&harness.state).expect("cancel tick source");
    }

    #[tokio::test]
    async fn cancel_restores_ready_without_saving() {
        let harness = test_harness();
        start_focus_impl(&harness.state).expect("start focus");
        let view = cancel_focus_impl(&harness.state).expect("cancel focus");

        assert_eq!(view.snapshot.phase, Phase::Ready);
        assert_eq!(view.countdown, "25:00");
        assert_eq!(harness.api.create_session_calls(), 0);
        assert!(harness.outbox.list().expect("outbox").is_empty());
    }

    #[tokio::test]
    async fn forced_completion_adopts_server_state_and_starts_break() {
        let harness = test_harness();
        harness.api.push_create_session(Ok(sample_saved(4)));
        start_focus_impl(&harness.state).expect("start focus");
        harness.clock.advance_seconds(1500);

        let view = force_complete_focus_impl(&harness.state)
            .await
            .expect("force complete");

        assert_eq!(view.snapshot.phase, Phase::OnBreak);
        assert_eq!(view.snapshot.completed_today_count, 4);
        assert_eq!(view.snapshot.seconds_remaining, 300);
        assert_eq!(view.snapshot.available_tags, vec!["work".to_string()]);
        assert_eq!(harness.notifier.titles(), vec!["Focus complete"]);
        assert!(harness.outbox.list().expect("outbox").is_empty());

        cancel_tick_source(&harness.state).expect("cancel tick source");
    }

    #[tokio::test]
    async fn failed_save_falls_back_and_still_breaks() {
        let harness = test_harness();
        harness
            .api
            .push_create_session(Err(InfraError::Api("server down".to_string())));
        start_focus_impl(&harness.state).expect("start focus");
        harness.clock.advance_seconds(1500);

        let view = force_complete_focus_impl(&harness.state)
            .await
            .expect("force complete");

        assert_eq!(view.snapshot.phase, Phase::OnBreak);
        assert_eq!(view.snapshot.completed_today_count, 1);
        assert_eq!(harness.outbox.list().expect("outbox").len(), 1);

        cancel_tick_source(&harness.state).expect("cancel tick source");
    }

    #[tokio::test]
    async fn forced_completion_twice_saves_once() {
        let harness = test_harness();
        harness.api.push_create_session(Ok(sample_saved(1)));
        start_focus_impl(&harness.state).expect("start focus");

        force_complete_focus_impl(&harness.state)
            .await
            .expect("first force");
        force_complete_focus_impl(&harness.state)
            .await
            .expect("second force");

        assert_eq!(harness.api.create_session_calls(), 1);
        cancel_tick_source(&harness.state).expect("cancel tick source");
    }

    #[tokio::test]
    async fn end_break_early_is_idempotent() {
        let harness = test_harness();
        harness.api.push_create_session(Ok(sample_saved(1)));
        start_focus_impl(&harness.state).expect("start focus");
        force_complete_focus_impl(&harness.state)
            .await
            .expect("force complete");

        let first = end_break_early_impl(&harness.state).await.expect("end break");
        let second = end_break_early_impl(&harness.state)
            .await
            .expect("end break again");

        assert_eq!(first.snapshot.phase, Phase::Ready);
        assert_eq!(second.snapshot.phase, Phase::Ready);
        assert_eq!(first.countdown, "25:00");
        assert_eq!(
            harness.notifier.titles(),
            vec!["Focus complete", "Break over"]
        );
    }

    #[tokio::test]
    async fn retarget_to_past_ends_break() {
        let harness = test_harness();
        harness.api.push_create_session(Ok(sample_saved(1)));
        start_focus_impl(&harness.state).expect("start focus");
        force_complete_focus_impl(&harness.state)
            .await
            .expect("force complete");

        harness.clock.advance_seconds(120);
        let view = set_break_duration_impl(&harness.state, 1)
            .await
            .expect("retarget");

        assert_eq!(view.snapshot.phase, Phase::Ready);
    }

    #[tokio::test]
    async fn retarget_extends_remaining_break() {
        let harness = test_harness();
        harness.api.push_create_session(Ok(sample_saved(1)));
        start_focus_impl(&harness.state).expect("start focus");
        force_complete_focus_impl(&harness.state)
            .await
            .expect("force complete");

        harness.clock.advance_seconds(120);
        let view = set_break_duration_impl(&harness.state, 30)
            .await
            .expect("retarget");

        assert_eq!(view.snapshot.phase, Phase::OnBreak);
        assert_eq!(view.snapshot.seconds_remaining, 1680);
        assert_eq!(view.snapshot.reference_duration, 1800);

        cancel_tick_source(&harness.state).expect("cancel tick source");
    }

    #[tokio::test]
    async fn debug_commands_require_opt_in() {
        let clock = TestClock::starting_at("2026-08-27T09:00:00Z");
        let workspace = WorkspacePaths {
            root: PathBuf::from("/tmp/tomatask-unused"),
            config_dir: PathBuf::from("/tmp/tomatask-unused/config"),
            state_dir: PathBuf::from("/tmp/tomatask-unused/state"),
            database_path: PathBuf::from("/tmp/tomatask-unused/state/tomatask.sqlite"),
        };
        let state = Arc::new(AppState::new(
            Arc::new(FakeBackendApi::default()) as Arc<dyn BackendApi>,
            Arc::new(InMemoryCredentialStore::with_token("token-abc")),
            Arc::new(InMemorySessionOutbox::default()),
            Arc::new(RecordingNotifier::default()),
            clock.provider(),
            EngineSettings::default(),
            workspace,
            0,
        ));

        let error = force_complete_focus_impl(&state).await.expect_err("gated");
        assert!(matches!(error, InfraError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_session_adopts_refreshed_counts() {
        let harness = test_harness();
        harness
            .api
            .delete_session_responses
            .lock()
            .expect("responses lock")
            .push_back(Ok(SessionDeleted {
                today_count: 2,
                tag_statistics: vec![TagStat {
                    tag: "work".to_string(),
                    count: 2,
                }],
            }));

        let view = delete_session_impl(&harness.state, 42)
            .await
            .expect("delete session");

        assert_eq!(view.snapshot.completed_today_count, 2);
        assert_eq!(view.tag_distribution.len(), 1);
        assert_eq!(view.tag_distribution[0].tag, "work");
    }

    #[tokio::test]
    async fn reauth_surfaces_the_distinct_error_string() {
        let harness = test_harness();
        harness
            .api
            .list_tasks_responses
            .lock()
            .expect("responses lock")
            .push_back(Err(InfraError::ReauthRequired));

        let error = list_tasks_impl(&harness.state).await.expect_err("reauth");
        assert_eq!(
            harness.state.command_error("list_tasks", &error),
            "reauthentication required"
        );
    }

    #[tokio::test]
    async fn sidebar_calls_require_a_token() {
        let harness = test_harness();
        clear_api_token_impl(&harness.state).expect("clear token");

        let error = list_tasks_impl(&harness.state).await.expect_err("no token");
        assert!(matches!(error, InfraError::Credential(_)));

        store_api_token_impl(&harness.state, "token-new".to_string()).expect("store token");
        harness
            .api
            .list_tasks_responses
            .lock()
            .expect("responses lock")
            .push_back(Ok(Vec::new()));
        assert!(list_tasks_impl(&harness.state).await.is_ok());
    }

    #[tokio::test]
    async fn flush_command_reports_progress() {
        let harness = test_harness();
        let draft = SessionDraft {
            description: None,
            tag: None,
            started_at: fixed_time("2026-08-27T08:00:00Z"),
            completed_at: fixed_time("2026-08-27T08:25:00Z"),
            duration_minutes: 25,
        };
        harness
            .outbox
            .enqueue(&draft, fixed_time("2026-08-27T08:25:01Z"))
            .expect("enqueue");
        harness.api.push_create_session(Ok(sample_saved(1)));

        let report = flush_session_outbox_impl(&harness.state)
            .await
            .expect("flush");
        assert_eq!(report.flushed, 1);
        assert_eq!(report.remaining, 0);
    }

    #[tokio::test]
    async fn labels_flow_into_the_next_draft() {
        let harness = test_harness();
        harness.api.push_create_session(Ok(sample_saved(1)));
        set_session_labels_impl(
            &harness.state,
            Some("report".to_string()),
            Some("work".to_string()),
        )
        .expect("set labels");

        start_focus_impl(&harness.state).expect("start focus");
        let view = get_timer_state_impl(&harness.state).expect("state");
        assert_eq!(view.snapshot.description.as_deref(), Some("report"));
        assert_eq!(view.snapshot.selected_tag.as_deref(), Some("work"));

        cancel_tick_source(&harness.state).expect("cancel tick source");
    }

    #[tokio::test]
    async fn create_tag_passes_the_server_result_through() {
        let harness = test_harness();
        harness
            .api
            .create_tag_responses
            .lock()
            .expect("responses lock")
            .push_back(Ok(TagCreated {
                tag: "deep".to_string(),
                is_new: true,
            }));

        let created = create_tag_impl(&harness.state, "deep".to_string())
            .await
            .expect("create tag");
        assert_eq!(created.tag, "deep");
        assert!(created.is_new);
    }

    #[tokio::test]
    async fn bootstrap_prepares_an_explicit_root() {
        let harness = test_harness();
        let root = std::env::temp_dir().join(format!(
            "tomatask-commands-bootstrap-{}",
            std::process::id()
        ));

        let report = bootstrap_impl(&harness.state, Some(root.display().to_string()))
            .expect("bootstrap");
        assert!(std::path::Path::new(&report.database_path).exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn ping_answers() {
        assert_eq!(ping_impl(), "pong");
    }
}
