use crate::domain::models::{Favorite, Note, Task, TrashedTask};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};

/// Row encoding for the remote store: snake_case columns, RFC3339
/// timestamps. Encoded rows omit `id` so the server assigns one; decoded
/// rows must carry it.
pub fn encode_task_row(task: &Task, owner_id: &str) -> serde_json::Value {
    serde_json::json!({
        "owner_id": owner_id,
        "text": task.text,
        "completed": task.completed,
        "time_spent": task.time_spent_seconds,
        "is_backlog": task.is_backlog,
        "date": task.date.to_rfc3339(),
        "order_position": task.order_position,
        "scheduled_time": task.scheduled_time.map(|value| value.to_rfc3339()),
        "scheduled_duration": task.scheduled_duration_minutes,
        "created_at": task.created_at.to_rfc3339(),
    })
}

pub fn decode_task_row(row: &serde_json::Value) -> Result<Task, InfraError> {
    Ok(Task {
        id: required_string(row, "id")?,
        text: required_string(row, "text")?,
        completed: row.get("completed").and_then(serde_json::Value::as_bool).unwrap_or(false),
        time_spent_seconds: optional_u32(row, "time_spent").unwrap_or(0),
        is_backlog: row.get("is_backlog").and_then(serde_json::Value::as_bool).unwrap_or(false),
        date: required_timestamp(row, "date")?,
        order_position: row.get("order_position").and_then(serde_json::Value::as_i64),
        scheduled_time: optional_timestamp(row, "scheduled_time")?,
        scheduled_duration_minutes: optional_u32(row, "scheduled_duration"),
        created_at: optional_timestamp(row, "created_at")?
            .unwrap_or_else(Utc::now),
    })
}

pub fn encode_trashed_row(trashed: &TrashedTask, owner_id: &str) -> serde_json::Value {
    serde_json::json!({
        "owner_id": owner_id,
        "text": trashed.text,
        "completed": trashed.completed,
        "time_spent": trashed.time_spent_seconds,
        "is_backlog": trashed.is_backlog,
        "date": trashed.date.to_rfc3339(),
        "trashed_at": trashed.trashed_at.to_rfc3339(),
    })
}

pub fn decode_trashed_row(row: &serde_json::Value) -> Result<TrashedTask, InfraError> {
    Ok(TrashedTask {
        id: required_string(row, "id")?,
        text: required_string(row, "text")?,
        completed: row.get("completed").and_then(serde_json::Value::as_bool).unwrap_or(false),
        time_spent_seconds: optional_u32(row, "time_spent").unwrap_or(0),
        is_backlog: row.get("is_backlog").and_then(serde_json::Value::as_bool).unwrap_or(false),
        date: required_timestamp(row, "date")?,
        trashed_at: required_timestamp(row, "trashed_at")?,
    })
}

pub fn encode_favorite_row(favorite: &Favorite, owner_id: &str) -> serde_json::Value {
    serde_json::json!({
        "owner_id": owner_id,
        "text": favorite.text,
        "created_at": favorite.created_at.to_rfc3339(),
    })
}

pub fn decode_favorite_row(row: &serde_json::Value) -> Result<Favorite, InfraError> {
    Ok(Favorite {
        id: required_string(row, "id")?,
        text: required_string(row, "text")?,
        created_at: optional_timestamp(row, "created_at")?.unwrap_or_else(Utc::now),
    })
}

pub fn encode_note_row(note: &Note, owner_id: &str) -> serde_json::Value {
    serde_json::json!({
        "owner_id": owner_id,
        "title": note.title,
        "content": note.content,
        "updated_at": note.updated_at.to_rfc3339(),
    })
}

pub fn decode_note_row(row: &serde_json::Value) -> Result<Note, InfraError> {
    Ok(Note {
        id: required_string(row, "id")?,
        title: optional_string(row, "title").unwrap_or_default(),
        content: optional_string(row, "content").unwrap_or_default(),
        updated_at: required_timestamp(row, "updated_at")?,
    })
}

fn required_string(row: &serde_json::Value, column: &str) -> Result<String, InfraError> {
    row.get(column)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .ok_or_else(|| InfraError::Store(format!("row is missing column '{column}'")))
}

fn optional_string(row: &serde_json::Value, column: &str) -> Option<String> {
    row.get(column)
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
}

fn optional_u32(row: &serde_json::Value, column: &str) -> Option<u32> {
    row.get(column)
        .and_then(serde_json::Value::as_u64)
        .map(|value| value.min(u32::MAX as u64) as u32)
}

fn required_timestamp(row: &serde_json::Value, column: &str) -> Result<DateTime<Utc>, InfraError> {
    optional_timestamp(row, column)?
        .ok_or_else(|| InfraError::Store(format!("row is missing column '{column}'")))
}

fn optional_timestamp(
    row: &serde_json::Value,
    column: &str,
) -> Result<Option<DateTime<Utc>>, InfraError> {
    let Some(raw) = row.get(column).and_then(serde_json::Value::as_str) else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(raw)
        .map(|value| Some(value.with_timezone(&Utc)))
        .map_err(|error| InfraError::Store(format!("invalid {column} '{raw}': {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;

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
            time_spent_seconds: 900,
            is_backlog: false,
            date: fixed_time("2026-02-16T00:00:00Z"),
            order_position: Some(2),
            scheduled_time: Some(fixed_time("2026-02-16T14:00:00Z")),
            scheduled_duration_minutes: Some(90),
            created_at: fixed_time("2026-02-15T18:30:00Z"),
        }
    }

    #[test]
    fn task_row_roundtrip_preserves_fields_and_adds_server_id() {
        let task = sample_task();
        let mut row = encode_task_row(&task, "user-1");
        assert!(row.get("id").is_none());
        assert_eq!(row["owner_id"], "user-1");

        row["id"] = serde_json::Value::String("srv-42".to_string());
        let decoded = decode_task_row(&row).expect("decode");
        assert_eq!(decoded.id, "srv-42");
        assert_eq!(decoded.text, task.text);
        assert_eq!(decoded.time_spent_seconds, task.time_spent_seconds);
        assert_eq!(decoded.order_position, task.order_position);
        assert_eq!(decoded.scheduled_time, task.scheduled_time);
        assert_eq!(decoded.scheduled_duration_minutes, task.scheduled_duration_minutes);
        assert_eq!(decoded.date, task.date);
        assert_eq!(decoded.created_at, task.created_at);
    }

    #[test]
    fn decode_task_tolerates_absent_optional_columns() {
        let row = serde_json::json!({
            "id": "srv-1",
            "text": "Bare task",
            "date": "2026-02-16T00:00:00Z",
        });
        let decoded = decode_task_row(&row).expect("decode");
        assert!(!decoded.completed);
        assert_eq!(decoded.time_spent_seconds, 0);
        assert!(decoded.order_position.is_none());
        assert!(decoded.scheduled_time.is_none());
    }

    #[test]
    fn decode_task_rejects_missing_text() {
        let row = serde_json::json!({
            "id": "srv-1",
            "date": "2026-02-16T00:00:00Z",
        });
        assert!(decode_task_row(&row).is_err());
    }

    #[test]
    fn decode_rejects_malformed_timestamp() {
        let row = serde_json::json!({
            "id": "srv-1",
            "text": "Task",
            "date": "yesterday",
        });
        assert!(decode_task_row(&row).is_err());
    }

    #[test]
    fn trashed_row_roundtrip_keeps_trashed_at() {
        let trashed = TrashedTask {
            id: "tsk-9".to_string(),
            text: "Old".to_string(),
            completed: true,
            time_spent_seconds: 60,
            is_backlog: true,
            date: fixed_time("2026-01-01T00:00:00Z"),
            trashed_at: fixed_time("2026-02-01T00:00:00Z"),
        };
        let mut row = encode_trashed_row(&trashed, "user-1");
        row["id"] = serde_json::Value::String("srv-9".to_string());
        let decoded = decode_trashed_row(&row).expect("decode");
        assert_eq!(decoded.trashed_at, trashed.trashed_at);
        assert!(decoded.is_backlog);
    }

    #[test]
    fn note_row_allows_empty_title_and_content() {
        let row = serde_json::json!({
            "id": "note-1",
            "updated_at": "2026-02-16T10:00:00Z",
        });
        let decoded = decode_note_row(&row).expect("decode");
        assert_eq!(decoded.title, "");
        assert_eq!(decoded.content, "");
    }

    #[test]
    fn favorite_row_roundtrip() {
        let favorite = Favorite {
            id: "fav-1".to_string(),
            text: "Daily review".to_string(),
            created_at: fixed_time("2026-02-01T08:00:00Z"),
        };
        let mut row = encode_favorite_row(&favorite, "user-1");
        row["id"] = serde_json::Value::String("srv-f1".to_string());
        let decoded = decode_favorite_row(&row).expect("decode");
        assert_eq!(decoded.text, favorite.text);
        assert_eq!(decoded.created_at, favorite.created_at);
    }
}
