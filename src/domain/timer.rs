use serde::Serialize;

const SECONDS_PER_MINUTE: u32 = 60;
const SECONDS_PER_HOUR: u32 = 3_600;
const ALERT_REPEAT_TICKS: u32 = 2;

/// Countdown duration being typed in, one 2-digit field per unit. Input is
/// filtered rather than rejected: non-digits are dropped and each field is
/// truncated to two characters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DurationDraft {
    hours: String,
    minutes: String,
    seconds: String,
}

impl DurationDraft {
    pub fn set_hours(&mut self, raw: &str) {
        self.hours = sanitize_field(raw);
    }

    pub fn set_minutes(&mut self, raw: &str) {
        self.minutes = sanitize_field(raw);
    }

    pub fn set_seconds(&mut self, raw: &str) {
        self.seconds = sanitize_field(raw);
    }

    pub fn hours(&self) -> &str {
        &self.hours
    }

    pub fn minutes(&self) -> &str {
        &self.minutes
    }

    pub fn seconds(&self) -> &str {
        &self.seconds
    }

    pub fn total_seconds(&self) -> u32 {
        parse_field(&self.hours) * SECONDS_PER_HOUR
            + parse_field(&self.minutes) * SECONDS_PER_MINUTE
            + parse_field(&self.seconds)
    }
}

fn sanitize_field(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_digit)
        .take(2)
        .collect()
}

fn parse_field(value: &str) -> u32 {
    value.parse().unwrap_or(0)
}

/// Audible cue the shell should play after a tick or a transition.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertCue {
    None,
    AlertBeep,
    CompletionChime,
}

/// Time credited to a task when its countdown is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerCompletion {
    pub task_id: String,
    pub seconds_spent: u32,
}

/// Countdown lifecycle bound to at most one task. Every transition is total:
/// a request that does not apply in the current phase leaves the session
/// unchanged instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TimerSession {
    #[default]
    Idle,
    Configuring {
        task_id: String,
        draft: DurationDraft,
    },
    Running {
        task_id: String,
        initial_seconds: u32,
        remaining_seconds: u32,
    },
    Paused {
        task_id: String,
        initial_seconds: u32,
        remaining_seconds: u32,
    },
    Completed {
        task_id: String,
        initial_seconds: u32,
        alert_ticks: u32,
    },
}

impl TimerSession {
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Configuring { .. } => "configuring",
            Self::Running { .. } => "running",
            Self::Paused { .. } => "paused",
            Self::Completed { .. } => "completed",
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Configuring { task_id, .. }
            | Self::Running { task_id, .. }
            | Self::Paused { task_id, .. }
            | Self::Completed { task_id, .. } => Some(task_id),
        }
    }

    pub fn remaining_seconds(&self) -> u32 {
        match self {
            Self::Running { remaining_seconds, .. } | Self::Paused { remaining_seconds, .. } => {
                *remaining_seconds
            }
            _ => 0,
        }
    }

    pub fn initial_seconds(&self) -> u32 {
        match self {
            Self::Running { initial_seconds, .. }
            | Self::Paused { initial_seconds, .. }
            | Self::Completed { initial_seconds, .. } => *initial_seconds,
            _ => 0,
        }
    }

    /// Fraction of the countdown still remaining, 1.0 at start down to 0.0.
    pub fn progress(&self) -> f64 {
        let initial = self.initial_seconds();
        if initial == 0 {
            return 0.0;
        }
        self.remaining_seconds() as f64 / initial as f64
    }

    pub fn alert_active(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Open the duration editor for a task. Only applies while no countdown
    /// is underway; re-targeting replaces the previous draft.
    pub fn begin_configuring(&mut self, task_id: &str) -> bool {
        match self {
            Self::Idle | Self::Configuring { .. } => {
                *self = Self::Configuring {
                    task_id: task_id.to_string(),
                    draft: DurationDraft::default(),
                };
                true
            }
            _ => false,
        }
    }

    pub fn edit_draft<F>(&mut self, apply: F) -> bool
    where
        F: FnOnce(&mut DurationDraft),
    {
        match self {
            Self::Configuring { draft, .. } => {
                apply(draft);
                true
            }
            _ => false,
        }
    }

    pub fn cancel_configuring(&mut self) -> bool {
        match self {
            Self::Configuring { .. } => {
                *self = Self::Idle;
                true
            }
            _ => false,
        }
    }

    /// Arm the countdown from the current draft. A zero total keeps the
    /// session in `Configuring` without any feedback.
    pub fn start(&mut self) -> bool {
        let Self::Configuring { task_id, draft } = self else {
            return false;
        };
        let total = draft.total_seconds();
        if total == 0 {
            return false;
        }
        *self = Self::Running {
            task_id: task_id.clone(),
            initial_seconds: total,
            remaining_seconds: total,
        };
        true
    }

    /// Advance the session by one second. In `Completed` the alert beeps on
    /// entry and then on every second tick until acknowledged.
    pub fn tick(&mut self) -> AlertCue {
        match self {
            Self::Running {
                task_id,
                initial_seconds,
                remaining_seconds,
            } => {
                *remaining_seconds = remaining_seconds.saturating_sub(1);
                if *remaining_seconds == 0 {
                    *self = Self::Completed {
                        task_id: task_id.clone(),
                        initial_seconds: *initial_seconds,
                        alert_ticks: 0,
                    };
                    return AlertCue::AlertBeep;
                }
                AlertCue::None
            }
            Self::Completed { alert_ticks, .. } => {
                *alert_ticks += 1;
                if *alert_ticks % ALERT_REPEAT_TICKS == 0 {
                    AlertCue::AlertBeep
                } else {
                    AlertCue::None
                }
            }
            _ => AlertCue::None,
        }
    }

    pub fn pause(&mut self) -> bool {
        match self {
            Self::Running {
                task_id,
                initial_seconds,
                remaining_seconds,
            } => {
                *self = Self::Paused {
                    task_id: task_id.clone(),
                    initial_seconds: *initial_seconds,
                    remaining_seconds: *remaining_seconds,
                };
                true
            }
            _ => false,
        }
    }

    pub fn resume(&mut self) -> bool {
        match self {
            Self::Paused {
                task_id,
                initial_seconds,
                remaining_seconds,
            } if *remaining_seconds > 0 => {
                *self = Self::Running {
                    task_id: task_id.clone(),
                    initial_seconds: *initial_seconds,
                    remaining_seconds: *remaining_seconds,
                };
                true
            }
            _ => false,
        }
    }

    /// Acknowledge the countdown and return the elapsed time to credit. The
    /// session returns to `Idle`.
    pub fn complete(&mut self) -> Option<TimerCompletion> {
        let completion = match self {
            Self::Running {
                task_id,
                initial_seconds,
                remaining_seconds,
            }
            | Self::Paused {
                task_id,
                initial_seconds,
                remaining_seconds,
            } => Some(TimerCompletion {
                task_id: task_id.clone(),
                seconds_spent: initial_seconds.saturating_sub(*remaining_seconds),
            }),
            Self::Completed {
                task_id,
                initial_seconds,
                ..
            } => Some(TimerCompletion {
                task_id: task_id.clone(),
                seconds_spent: *initial_seconds,
            }),
            _ => None,
        };
        if completion.is_some() {
            *self = Self::Idle;
        }
        completion
    }

    /// Restart the finished countdown with its original duration.
    pub fn repeat(&mut self) -> bool {
        match self {
            Self::Completed {
                task_id,
                initial_seconds,
                ..
            } => {
                *self = Self::Running {
                    task_id: task_id.clone(),
                    initial_seconds: *initial_seconds,
                    remaining_seconds: *initial_seconds,
                };
                true
            }
            _ => false,
        }
    }

    /// Drop the session if it is bound to the given task, e.g. when the task
    /// is deleted out from under it.
    pub fn clear_for_task(&mut self, task_id: &str) -> bool {
        if self.task_id() == Some(task_id) {
            *self = Self::Idle;
            true
        } else {
            false
        }
    }
}

/// Render seconds as `H:MM:SS`, or `MM:SS` when under an hour.
pub fn format_clock(total_seconds: u32) -> String {
    let hours = total_seconds / SECONDS_PER_HOUR;
    let minutes = (total_seconds % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
    let seconds = total_seconds % SECONDS_PER_MINUTE;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn running_session(total: u32) -> TimerSession {
        let mut session = TimerSession::default();
        assert!(session.begin_configuring("tsk-1"));
        assert!(session.edit_draft(|draft| {
            draft.set_hours(&format!("{:02}", total / 3_600));
            draft.set_minutes(&format!("{:02}", (total % 3_600) / 60));
            draft.set_seconds(&format!("{:02}", total % 60));
        }));
        assert!(session.start());
        session
    }

    #[test]
    fn draft_filters_non_digits_and_truncates() {
        let mut draft = DurationDraft::default();
        draft.set_hours("1a2b3");
        draft.set_minutes("-45");
        draft.set_seconds("007");
        assert_eq!(draft.hours(), "12");
        assert_eq!(draft.minutes(), "45");
        assert_eq!(draft.seconds(), "00");
    }

    #[test]
    fn draft_total_treats_blank_fields_as_zero() {
        let mut draft = DurationDraft::default();
        assert_eq!(draft.total_seconds(), 0);
        draft.set_minutes("25");
        assert_eq!(draft.total_seconds(), 25 * 60);
        draft.set_hours("1");
        draft.set_seconds("30");
        assert_eq!(draft.total_seconds(), 3_600 + 25 * 60 + 30);
    }

    #[test]
    fn start_requires_positive_total_and_stays_configuring() {
        let mut session = TimerSession::default();
        assert!(session.begin_configuring("tsk-1"));
        assert!(!session.start());
        assert_eq!(session.phase(), "configuring");

        assert!(session.edit_draft(|draft| draft.set_seconds("10")));
        assert!(session.start());
        assert_eq!(session.phase(), "running");
        assert_eq!(session.remaining_seconds(), 10);
        assert_eq!(session.initial_seconds(), 10);
    }

    #[test]
    fn begin_configuring_is_refused_while_counting_down() {
        let mut session = running_session(60);
        assert!(!session.begin_configuring("tsk-2"));
        assert_eq!(session.task_id(), Some("tsk-1"));
    }

    #[test]
    fn cancel_returns_to_idle_without_touching_other_phases() {
        let mut session = TimerSession::default();
        session.begin_configuring("tsk-1");
        assert!(session.cancel_configuring());
        assert_eq!(session, TimerSession::Idle);

        let mut running = running_session(10);
        assert!(!running.cancel_configuring());
        assert_eq!(running.phase(), "running");
    }

    #[test]
    fn ticks_count_down_to_completed_with_entry_beep() {
        let mut session = running_session(3);
        assert_eq!(session.tick(), AlertCue::None);
        assert_eq!(session.remaining_seconds(), 2);
        assert_eq!(session.tick(), AlertCue::None);
        assert_eq!(session.tick(), AlertCue::AlertBeep);
        assert_eq!(session.phase(), "completed");
        assert!(session.alert_active());
    }

    #[test]
    fn completed_alert_repeats_every_other_tick() {
        let mut session = running_session(1);
        assert_eq!(session.tick(), AlertCue::AlertBeep);

        // 1 Hz ticks after completion: beep every two seconds.
        assert_eq!(session.tick(), AlertCue::None);
        assert_eq!(session.tick(), AlertCue::AlertBeep);
        assert_eq!(session.tick(), AlertCue::None);
        assert_eq!(session.tick(), AlertCue::AlertBeep);
    }

    #[test]
    fn pause_freezes_remaining_and_resume_continues() {
        let mut session = running_session(10);
        session.tick();
        session.tick();
        assert!(session.pause());
        assert_eq!(session.phase(), "paused");
        assert_eq!(session.tick(), AlertCue::None);
        assert_eq!(session.remaining_seconds(), 8);

        assert!(session.resume());
        assert_eq!(session.phase(), "running");
        session.tick();
        assert_eq!(session.remaining_seconds(), 7);
    }

    #[test]
    fn complete_credits_elapsed_time_from_running() {
        let mut session = running_session(600);
        for _ in 0..45 {
            session.tick();
        }
        let completion = session.complete().expect("completion");
        assert_eq!(completion.task_id, "tsk-1");
        assert_eq!(completion.seconds_spent, 45);
        assert_eq!(session, TimerSession::Idle);
    }

    #[test]
    fn complete_from_alert_credits_full_duration() {
        let mut session = running_session(5);
        for _ in 0..9 {
            session.tick();
        }
        let completion = session.complete().expect("completion");
        assert_eq!(completion.seconds_spent, 5);
    }

    #[test]
    fn complete_outside_a_countdown_returns_none() {
        let mut idle = TimerSession::default();
        assert!(idle.complete().is_none());

        let mut configuring = TimerSession::default();
        configuring.begin_configuring("tsk-1");
        assert!(configuring.complete().is_none());
        assert_eq!(configuring.phase(), "configuring");
    }

    #[test]
    fn repeat_restarts_with_original_duration() {
        let mut session = running_session(4);
        for _ in 0..4 {
            session.tick();
        }
        assert_eq!(session.phase(), "completed");
        assert!(session.repeat());
        assert_eq!(session.phase(), "running");
        assert_eq!(session.remaining_seconds(), 4);
        assert_eq!(session.initial_seconds(), 4);
    }

    #[test]
    fn clear_for_task_only_drops_the_bound_task() {
        let mut session = running_session(10);
        assert!(!session.clear_for_task("tsk-other"));
        assert_eq!(session.phase(), "running");
        assert!(session.clear_for_task("tsk-1"));
        assert_eq!(session, TimerSession::Idle);
    }

    #[test]
    fn progress_runs_from_one_to_zero() {
        let mut session = running_session(4);
        assert!((session.progress() - 1.0).abs() < f64::EPSILON);
        session.tick();
        assert!((session.progress() - 0.75).abs() < f64::EPSILON);
        for _ in 0..3 {
            session.tick();
        }
        assert_eq!(session.progress(), 0.0);
        assert_eq!(TimerSession::Idle.progress(), 0.0);
    }

    #[test]
    fn format_clock_switches_layout_at_one_hour() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(59), "00:59");
        assert_eq!(format_clock(60), "01:00");
        assert_eq!(format_clock(25 * 60), "25:00");
        assert_eq!(format_clock(3_600), "1:00:00");
        assert_eq!(format_clock(3_600 + 5 * 60 + 7), "1:05:07");
        assert_eq!(format_clock(10 * 3_600), "10:00:00");
    }

    // Property: n ticks of a countdown of t seconds leave t - n remaining
    proptest! {
        #[test]
        fn tick_arithmetic_is_exact(total in 2u32..7_200, ticks in 1u32..7_200) {
            let ticks = ticks.min(total - 1);
            let mut session = running_session(total);
            for _ in 0..ticks {
                session.tick();
            }
            prop_assert_eq!(session.remaining_seconds(), total - ticks);
            prop_assert_eq!(session.phase(), "running");
        }
    }

    // Property: credited time never exceeds the configured duration
    proptest! {
        #[test]
        fn credited_time_is_bounded_by_initial(total in 1u32..3_600, ticks in 0u32..4_000) {
            let mut session = running_session(total);
            for _ in 0..ticks {
                session.tick();
            }
            let completion = session.complete().expect("completion");
            prop_assert!(completion.seconds_spent <= total);
            prop_assert_eq!(completion.seconds_spent, ticks.min(total));
        }
    }

    // Property: draft sanitization only ever keeps at most two digits
    proptest! {
        #[test]
        fn draft_fields_stay_two_digit(raw in ".{0,12}") {
            let mut draft = DurationDraft::default();
            draft.set_minutes(&raw);
            prop_assert!(draft.minutes().len() <= 2);
            prop_assert!(draft.minutes().chars().all(|c| c.is_ascii_digit()));
        }
    }
}
