use crate::domain::models::{validate_date, Phase, SessionDraft, TagStat, SESSION_DURATION_MINUTES};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

pub const FOCUS_DURATION_SECONDS: u32 = 1500;
pub const SHORT_BREAK_SECONDS: u32 = 300;
pub const BREAK_RESET_DELAY_MS: u64 = 1500;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_now_provider() -> NowProvider {
    Arc::new(Utc::now)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("timer is finishing a transition")]
    TransitionInProgress,
    #[error("operation requires the {0} phase")]
    WrongPhase(&'static str),
    #[error("{0}")]
    Invalid(String),
}

/// Result of applying one 1-second tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to count down, or a transition is in flight.
    Idle,
    Ticked(u32),
    /// The focus countdown just reached zero. Fired exactly once.
    FocusElapsed,
    /// The break countdown just reached zero. Fired exactly once.
    BreakElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakAdjustment {
    /// Not on break; only the default duration changed.
    DefaultUpdated,
    Retargeted(u32),
    /// The new target is already in the past; the break must end now.
    BreakElapsed,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub phase: Phase,
    pub seconds_remaining: u32,
    pub reference_duration: u32,
    pub in_transition: bool,
    pub completed_today_count: u32,
    pub current_date: String,
    pub break_duration_seconds: u32,
    pub description: Option<String>,
    pub selected_tag: Option<String>,
    pub available_tags: Vec<String>,
    pub tag_statistics: Vec<TagStat>,
}

/// Pure timer state machine. All wall-clock reads go through the injected
/// provider; the async tick source and persistence live in the command layer.
pub struct TimerCore {
    now: NowProvider,
    timezone: Tz,
    phase: Phase,
    in_transition: bool,
    seconds_remaining: u32,
    focus_started_at: Option<DateTime<Utc>>,
    break_started_at: Option<DateTime<Utc>>,
    current_break_duration_seconds: u32,
    default_break_seconds: u32,
    completed_today_count: u32,
    current_date: NaiveDate,
    description: Option<String>,
    selected_tag: Option<String>,
    available_tags: Vec<String>,
    tag_statistics: Vec<TagStat>,
}

impl TimerCore {
    pub fn new(now: NowProvider, timezone: Tz, default_break_seconds: u32) -> Self {
        let current_date = now().with_timezone(&timezone).date_naive();
        Self {
            now,
            timezone,
            phase: Phase::Ready,
            in_transition: false,
            seconds_remaining: FOCUS_DURATION_SECONDS,
            focus_started_at: None,
            break_started_at: None,
            current_break_duration_seconds: default_break_seconds,
            default_break_seconds,
            completed_today_count: 0,
            current_date,
            description: None,
            selected_tag: None,
            available_tags: Vec::new(),
            tag_statistics: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn in_transition(&self) -> bool {
        self.in_transition
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    pub fn completed_today_count(&self) -> u32 {
        self.completed_today_count
    }

    pub fn reference_duration(&self) -> u32 {
        match self.phase {
            Phase::OnBreak => self.current_break_duration_seconds,
            Phase::Ready | Phase::Focusing => FOCUS_DURATION_SECONDS,
        }
    }

    fn local_date(&self) -> NaiveDate {
        (self.now)().with_timezone(&self.timezone).date_naive()
    }

    fn guard_not_transitioning(&self) -> Result<(), EngineError> {
        if self.in_transition {
            return Err(EngineError::TransitionInProgress);
        }
        Ok(())
    }

    /// Resets the daily counter when the local calendar day has moved on.
    pub fn rollover_if_stale(&mut self) -> bool {
        let today = self.local_date();
        if today == self.current_date {
            return false;
        }
        self.current_date = today;
        self.completed_today_count = 0;
        true
    }

    pub fn start_focus(&mut self) -> Result<(), EngineError> {
        self.guard_not_transitioning()?;
        if self.phase != Phase::Ready {
            return Err(EngineError::WrongPhase("ready"));
        }
        self.rollover_if_stale();
        self.phase = Phase::Focusing;
        self.seconds_remaining = FOCUS_DURATION_SECONDS;
        self.focus_started_at = Some((self.now)());
        Ok(())
    }

    /// Abandons the running focus phase. Nothing is persisted and the daily
    /// counter is untouched.
    pub fn cancel_focus(&mut self) -> Result<(), EngineError> {
        self.guard_not_transitioning()?;
        if self.phase != Phase::Focusing {
            return Err(EngineError::WrongPhase("focusing"));
        }
        self.phase = Phase::Ready;
        self.seconds_remaining = FOCUS_DURATION_SECONDS;
        self.focus_started_at = None;
        Ok(())
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.in_transition || self.phase == Phase::Ready || self.seconds_remaining == 0 {
            return TickOutcome::Idle;
        }
        self.seconds_remaining -= 1;
        if self.seconds_remaining > 0 {
            return TickOutcome::Ticked(self.seconds_remaining);
        }
        match self.phase {
            Phase::Focusing => TickOutcome::FocusElapsed,
            Phase::OnBreak => TickOutcome::BreakElapsed,
            Phase::Ready => TickOutcome::Idle,
        }
    }

    /// Starts the completion transition and produces the session payload to
    /// persist. Returns `None` when not focusing or a completion is already
    /// in flight, which makes duplicate completion impossible whichever path
    /// requested it.
    pub fn begin_completion(&mut self) -> Option<SessionDraft> {
        if self.phase != Phase::Focusing || self.in_transition {
            return None;
        }
        self.in_transition = true;
        self.rollover_if_stale();

        let completed_at = (self.now)();
        let started_at = self
            .focus_started_at
            .unwrap_or_else(|| completed_at - Duration::minutes(i64::from(SESSION_DURATION_MINUTES)));
        Some(SessionDraft {
            description: self.description.clone(),
            tag: self.selected_tag.clone(),
            started_at,
            completed_at,
            duration_minutes: SESSION_DURATION_MINUTES,
        })
    }

    /// Adopts the server's authoritative state after a successful save. An
    /// unparseable server date keeps the local one.
    pub fn apply_server_completion(
        &mut self,
        today_count: u32,
        today_date: &str,
        available_tags: Vec<String>,
        tag_statistics: Vec<TagStat>,
    ) {
        self.completed_today_count = today_count;
        if let Ok(date) = validate_date(today_date, "todayDate") {
            self.current_date = date;
        }
        self.available_tags = available_tags;
        self.tag_statistics = tag_statistics;
    }

    /// Local increment used when the save failed. The rollover check already
    /// ran in `begin_completion`, so the count is against today.
    pub fn apply_local_fallback(&mut self) {
        self.completed_today_count += 1;
    }

    /// Finishes the completion transition by entering the break phase.
    pub fn enter_break(&mut self) {
        self.phase = Phase::OnBreak;
        self.current_break_duration_seconds = self.default_break_seconds;
        self.seconds_remaining = self.default_break_seconds;
        self.break_started_at = Some((self.now)());
        self.focus_started_at = None;
        self.in_transition = false;
    }

    /// Opens the break-exit transition window. Returns false when there is no
    /// break to end or an exit is already pending, so repeated requests
    /// collapse into one.
    pub fn begin_break_exit(&mut self) -> bool {
        if self.phase != Phase::OnBreak || self.in_transition {
            return false;
        }
        self.in_transition = true;
        true
    }

    pub fn finish_break_exit(&mut self) {
        self.phase = Phase::Ready;
        self.seconds_remaining = FOCUS_DURATION_SECONDS;
        self.break_started_at = None;
        self.in_transition = false;
    }

    /// Sets the break duration to `minutes`. On break the remaining time is
    /// retargeted against the original break start, so extending and then
    /// shrinking never manufactures extra time.
    pub fn set_break_duration(&mut self, minutes: u32) -> Result<BreakAdjustment, EngineError> {
        self.guard_not_transitioning()?;
        if minutes == 0 || minutes > 120 {
            return Err(EngineError::Invalid(
                "break duration must be between 1 and 120 minutes".to_string(),
            ));
        }
        let target_seconds = minutes * 60;
        self.default_break_seconds = target_seconds;
        if self.phase != Phase::OnBreak {
            return Ok(BreakAdjustment::DefaultUpdated);
        }

        let elapsed = self
            .break_started_at
            .map(|started| ((self.now)() - started).num_seconds().max(0) as u32)
            .unwrap_or(0);
        self.current_break_duration_seconds = target_seconds;
        self.seconds_remaining = target_seconds.saturating_sub(elapsed);
        if self.seconds_remaining == 0 {
            return Ok(BreakAdjustment::BreakElapsed);
        }
        Ok(BreakAdjustment::Retargeted(self.seconds_remaining))
    }

    /// Labels applied to the next completed session. Allowed in any phase.
    pub fn set_session_labels(&mut self, description: Option<String>, tag: Option<String>) {
        self.description = normalize_label(description);
        self.selected_tag = normalize_label(tag);
    }

    pub fn adopt_tag_statistics(&mut self, tag_statistics: Vec<TagStat>) {
        self.tag_statistics = tag_statistics;
    }

    pub fn adopt_daily_count(&mut self, today_count: u32) {
        self.completed_today_count = today_count;
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase,
            seconds_remaining: self.seconds_remaining,
            reference_duration: self.reference_duration(),
            in_transition: self.in_transition,
            completed_today_count: self.completed_today_count,
            current_date: self.current_date.format("%Y-%m-%d").to_string(),
            break_duration_seconds: self.current_break_duration_seconds,
            description: self.description.clone(),
            selected_tag: self.selected_tag.clone(),
            available_tags: self.available_tags.clone(),
            tag_statistics: self.tag_statistics.clone(),
        }
    }
}

fn normalize_label(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}
