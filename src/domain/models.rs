use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const TRASH_RETENTION_DAYS: i64 = 30;
pub const DURATION_STEP_MINUTES: u32 = 15;

/// Which list a non-trashed task belongs to, derived from its flags and date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Today,
    OtherDay,
    Backlog,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub time_spent_seconds: u32,
    pub is_backlog: bool,
    pub date: DateTime<Utc>,
    pub order_position: Option<i64>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub scheduled_duration_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        validate_non_empty(&self.text, "task.text")?;
        if self.scheduled_duration_minutes.is_some() && self.scheduled_time.is_none() {
            return Err(
                "task.scheduled_duration_minutes requires task.scheduled_time".to_string(),
            );
        }
        if let Some(duration) = self.scheduled_duration_minutes {
            if duration < DURATION_STEP_MINUTES {
                return Err(format!(
                    "task.scheduled_duration_minutes must be >= {DURATION_STEP_MINUTES}"
                ));
            }
            if duration % DURATION_STEP_MINUTES != 0 {
                return Err(format!(
                    "task.scheduled_duration_minutes must be a multiple of {DURATION_STEP_MINUTES}"
                ));
            }
        }
        Ok(())
    }

    pub fn bucket_on(&self, today: NaiveDate) -> Bucket {
        if self.is_backlog {
            Bucket::Backlog
        } else if self.date.date_naive() == today {
            Bucket::Today
        } else {
            Bucket::OtherDay
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Favorite {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Favorite {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "favorite.id")?;
        validate_non_empty(&self.text, "favorite.text")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrashedTask {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub time_spent_seconds: u32,
    pub is_backlog: bool,
    pub date: DateTime<Utc>,
    pub trashed_at: DateTime<Utc>,
}

impl TrashedTask {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "trashed.id")?;
        validate_non_empty(&self.text, "trashed.text")?;
        Ok(())
    }

    /// A trashed task stays recoverable while it is strictly younger than the
    /// retention window.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now - self.trashed_at >= Duration::days(TRASH_RETENTION_DAYS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "note.id")?;
        Ok(())
    }

    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&query)
            || self.content.to_lowercase().contains(&query)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub user_id: String,
    pub email: Option<String>,
}

impl Session {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
            && !self.user_id.trim().is_empty()
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_task() -> Task {
        Task {
            id: "tsk-1".to_string(),
            text: "Write report".to_string(),
            completed: false,
            time_spent_seconds: 600,
            is_backlog: false,
            date: fixed_time("2026-02-16T08:00:00Z"),
            order_position: Some(0),
            scheduled_time: Some(fixed_time("2026-02-16T14:00:00Z")),
            scheduled_duration_minutes: Some(60),
            created_at: fixed_time("2026-02-16T08:00:00Z"),
        }
    }

    fn sample_trashed() -> TrashedTask {
        TrashedTask {
            id: "tsk-9".to_string(),
            text: "Old task".to_string(),
            completed: true,
            time_spent_seconds: 1500,
            is_backlog: false,
            date: fixed_time("2026-01-10T08:00:00Z"),
            trashed_at: fixed_time("2026-02-01T12:00:00Z"),
        }
    }

    fn sample_note() -> Note {
        Note {
            id: "note-1".to_string(),
            title: "Meeting".to_string(),
            content: "Discuss roadmap".to_string(),
            updated_at: fixed_time("2026-02-16T10:00:00Z"),
        }
    }

    #[test]
    fn task_validate_accepts_valid_task() {
        assert!(sample_task().validate().is_ok());
    }

    #[test]
    fn task_validate_rejects_empty_text() {
        let mut task = sample_task();
        task.text = "   ".to_string();
        assert!(task.validate().is_err());
    }

    #[test]
    fn task_validate_rejects_duration_without_slot() {
        let mut task = sample_task();
        task.scheduled_time = None;
        assert!(task.validate().is_err());
    }

    #[test]
    fn task_validate_rejects_unaligned_duration() {
        let mut task = sample_task();
        task.scheduled_duration_minutes = Some(40);
        assert!(task.validate().is_err());
        task.scheduled_duration_minutes = Some(10);
        assert!(task.validate().is_err());
    }

    #[test]
    fn bucket_derivation_follows_flags_and_date() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date");
        let mut task = sample_task();
        assert_eq!(task.bucket_on(today), Bucket::Today);

        task.date = fixed_time("2026-02-14T08:00:00Z");
        assert_eq!(task.bucket_on(today), Bucket::OtherDay);

        task.is_backlog = true;
        assert_eq!(task.bucket_on(today), Bucket::Backlog);
    }

    #[test]
    fn trashed_task_expires_after_retention_window() {
        let trashed = sample_trashed();
        let just_before = trashed.trashed_at + Duration::days(TRASH_RETENTION_DAYS)
            - Duration::seconds(1);
        let boundary = trashed.trashed_at + Duration::days(TRASH_RETENTION_DAYS);

        assert!(!trashed.is_expired_at(just_before));
        assert!(trashed.is_expired_at(boundary));
    }

    #[test]
    fn note_query_matching_is_case_insensitive_and_empty_matches_all() {
        let note = sample_note();
        assert!(note.matches_query(""));
        assert!(note.matches_query("   "));
        assert!(note.matches_query("ROADMAP"));
        assert!(note.matches_query("meet"));
        assert!(!note.matches_query("unrelated"));
    }

    #[test]
    fn session_validity_includes_leeway() {
        let session = Session {
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: fixed_time("2026-02-16T10:00:00Z"),
            user_id: "user-1".to_string(),
            email: Some("a@example.com".to_string()),
        };
        assert!(session.is_valid_at(fixed_time("2026-02-16T09:00:00Z"), 60));
        assert!(!session.is_valid_at(fixed_time("2026-02-16T09:59:30Z"), 60));
        assert!(!session.is_valid_at(fixed_time("2026-02-16T11:00:00Z"), 60));
    }

    // Property: retention is monotone in the age of the trashed entry
    proptest! {
        #[test]
        fn retention_window_is_exactly_thirty_days(age_seconds in 0i64..86_400 * 90) {
            let trashed = sample_trashed();
            let now = trashed.trashed_at + Duration::seconds(age_seconds);
            let expired = trashed.is_expired_at(now);
            prop_assert_eq!(expired, age_seconds >= TRASH_RETENTION_DAYS * 86_400);
        }
    }

    #[test]
    fn domain_models_support_serde_roundtrip() {
        let task = sample_task();
        let trashed = sample_trashed();
        let note = sample_note();
        let favorite = Favorite {
            id: "fav-1".to_string(),
            text: "Daily review".to_string(),
            created_at: fixed_time("2026-02-01T08:00:00Z"),
        };

        let task_roundtrip: Task =
            serde_json::from_str(&serde_json::to_string(&task).expect("serialize task"))
                .expect("deserialize task");
        let trashed_roundtrip: TrashedTask =
            serde_json::from_str(&serde_json::to_string(&trashed).expect("serialize trashed"))
                .expect("deserialize trashed");
        let note_roundtrip: Note =
            serde_json::from_str(&serde_json::to_string(&note).expect("serialize note"))
                .expect("deserialize note");
        let favorite_roundtrip: Favorite =
            serde_json::from_str(&serde_json::to_string(&favorite).expect("serialize favorite"))
                .expect("deserialize favorite");

        assert_eq!(task_roundtrip, task);
        assert_eq!(trashed_roundtrip, trashed);
        assert_eq!(note_roundtrip, note);
        assert_eq!(favorite_roundtrip, favorite);
    }
}
