use crate::application::auth::{AuthConfig, AuthManager, AuthOutcome, EnsureSessionResult};
use crate::application::bootstrap::bootstrap_workspace;
use crate::domain::models::{Favorite, Note, Session, Task, TrashedTask};
use crate::domain::schedule::{
    all_day_slot_start, reorder_by_drop, slot_start, DragSession, ResizeSession,
    DEFAULT_DURATION_MINUTES,
};
use crate::domain::timer::{format_clock, AlertCue, TimerSession};
use crate::infrastructure::auth_client::ReqwestAuthClient;
use crate::infrastructure::config::read_store_config;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::preferences::{PreferencesRepository, SqlitePreferencesRepository};
use crate::infrastructure::record_mapper::{
    decode_favorite_row, decode_note_row, decode_task_row, decode_trashed_row, encode_favorite_row,
    encode_note_row, encode_task_row, encode_trashed_row,
};
use crate::infrastructure::row_store_client::{ReqwestRowStoreClient, RowStoreClient, StoreTable};
use crate::infrastructure::session_store::KeyringSessionStore;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const SESSION_LEEWAY_SECONDS: i64 = 60;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    store: Option<Arc<dyn RowStoreClient>>,
    runtime: Mutex<RuntimeState>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config_dir = workspace_root.join("config");
        let logs_dir = workspace_root.join("logs");

        let store = read_store_config(&config_dir)?.map(|config| {
            Arc::new(ReqwestRowStoreClient::new(
                config.rest_endpoint(),
                config.anon_key.clone(),
            )) as Arc<dyn RowStoreClient>
        });

        Ok(Self {
            config_dir,
            database_path: bootstrap.database_path,
            logs_dir,
            store,
            runtime: Mutex::new(RuntimeState::default()),
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Default)]
struct RuntimeState {
    tasks: Vec<Task>,
    favorites: Vec<Favorite>,
    trashed: Vec<TrashedTask>,
    notes: Vec<Note>,
    timer: TimerSession,
    drag: Option<DragSession>,
    resize: Option<ResizeSession>,
    session: Option<Session>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimerStateResponse {
    pub task_id: Option<String>,
    pub phase: String,
    pub remaining_seconds: u32,
    pub initial_seconds: u32,
    pub display: String,
    pub progress: f64,
    pub alert_active: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimerTickResponse {
    pub state: TimerStateResponse,
    pub cue: AlertCue,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DurationDraftResponse {
    pub hours: String,
    pub minutes: String,
    pub seconds: String,
    pub total_seconds: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceSnapshotResponse {
    pub tasks: Vec<Task>,
    pub favorites: Vec<Favorite>,
    pub trashed: Vec<TrashedTask>,
    pub notes: Vec<Note>,
    pub signed_in: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResizePreviewResponse {
    pub task_id: String,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryDayResponse {
    pub date: String,
    pub completed_count: usize,
    pub total_seconds: u64,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DayCountResponse {
    pub date: String,
    pub completed_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductivitySummaryResponse {
    pub total_completed: usize,
    pub total_hours: f64,
    pub average_task_minutes: f64,
    pub last_seven_days: Vec<DayCountResponse>,
    pub most_productive_weekday: Option<String>,
    pub completed_this_week: usize,
    pub completed_last_week: usize,
    pub streak_days: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfoResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub expires_at: String,
}

// ---------------------------------------------------------------------------
// Workspace snapshot

pub async fn load_workspace_impl(state: &AppState) -> Result<WorkspaceSnapshotResponse, InfraError> {
    let remote = remote_context(state).await;
    if let Some((store, session)) = remote.as_ref() {
        let owner_id = session.user_id.clone();
        let token = session.access_token.clone();

        let task_rows = store.list(&token, StoreTable::Tasks, &owner_id).await;
        let favorite_rows = store.list(&token, StoreTable::Favorites, &owner_id).await;
        let trashed_rows = store.list(&token, StoreTable::Trashed, &owner_id).await;
        let note_rows = store.list(&token, StoreTable::Notes, &owner_id).await;

        let mut tasks = Vec::new();
        let mut favorites = Vec::new();
        let mut trashed = Vec::new();
        let mut notes = Vec::new();
        decode_rows(state, "load_workspace", task_rows, decode_task_row, &mut tasks);
        decode_rows(
            state,
            "load_workspace",
            favorite_rows,
            decode_favorite_row,
            &mut favorites,
        );
        decode_rows(
            state,
            "load_workspace",
            trashed_rows,
            decode_trashed_row,
            &mut trashed,
        );
        decode_rows(state, "load_workspace", note_rows, decode_note_row, &mut notes);

        let mut runtime = lock_runtime(state)?;
        runtime.tasks = tasks;
        runtime.favorites = favorites;
        runtime.trashed = trashed;
        runtime.notes = notes;
    }

    let snapshot = {
        let mut runtime = lock_runtime(state)?;
        sweep_trash(&mut runtime, Utc::now());
        runtime.notes.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
        WorkspaceSnapshotResponse {
            tasks: runtime.tasks.clone(),
            favorites: runtime.favorites.clone(),
            trashed: runtime.trashed.clone(),
            notes: runtime.notes.clone(),
            signed_in: remote.is_some(),
        }
    };

    state.log_info(
        "load_workspace",
        &format!(
            "loaded {} tasks, {} favorites, {} trashed, {} notes (signed_in={})",
            snapshot.tasks.len(),
            snapshot.favorites.len(),
            snapshot.trashed.len(),
            snapshot.notes.len(),
            snapshot.signed_in
        ),
    );
    Ok(snapshot)
}

fn decode_rows<T>(
    state: &AppState,
    command: &str,
    rows: Result<Vec<serde_json::Value>, InfraError>,
    decode: fn(&serde_json::Value) -> Result<T, InfraError>,
    target: &mut Vec<T>,
) {
    match rows {
        Ok(rows) => {
            for row in rows {
                match decode(&row) {
                    Ok(decoded) => target.push(decoded),
                    Err(error) => state.log_error(command, &format!("skipped row: {error}")),
                }
            }
        }
        Err(error) => state.log_error(command, &format!("remote list failed: {error}")),
    }
}

// ---------------------------------------------------------------------------
// Tasks

pub async fn create_task_impl(
    state: &AppState,
    text: String,
    backlog: bool,
) -> Result<Option<Task>, InfraError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let now = Utc::now();
    let mut task = Task {
        id: String::new(),
        text: text.to_string(),
        completed: false,
        time_spent_seconds: 0,
        is_backlog: backlog,
        date: now,
        order_position: None,
        scheduled_time: None,
        scheduled_duration_minutes: None,
        created_at: now,
    };

    task.id = persist_insert(state, "create_task", StoreTable::Tasks, |owner_id| {
        encode_task_row(&task, owner_id)
    })
    .await
    .unwrap_or_else(|| next_id("tsk"));

    {
        let mut runtime = lock_runtime(state)?;
        runtime.tasks.push(task.clone());
    }

    state.log_info(
        "create_task",
        &format!("created task_id={} backlog={backlog}", task.id),
    );
    Ok(Some(task))
}

pub async fn create_scheduled_task_impl(
    state: &AppState,
    text: String,
    date: String,
    hour: u32,
) -> Result<Option<Task>, InfraError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let day = parse_date_input(&date, "date")?;
    let slot = slot_start(day, hour)
        .ok_or_else(|| InfraError::InvalidConfig(format!("hour must be 0-23, got {hour}")))?;

    let next_position = {
        let runtime = lock_runtime(state)?;
        runtime
            .tasks
            .iter()
            .filter(|task| !task.is_backlog && task.date.date_naive() == day)
            .filter_map(|task| task.order_position)
            .max()
            .map(|position| position + 1)
            .unwrap_or(0)
    };

    let mut task = Task {
        id: String::new(),
        text: text.to_string(),
        completed: false,
        time_spent_seconds: 0,
        is_backlog: false,
        date: slot,
        order_position: Some(next_position),
        scheduled_time: Some(slot),
        scheduled_duration_minutes: Some(DEFAULT_DURATION_MINUTES),
        created_at: Utc::now(),
    };

    task.id = persist_insert(state, "create_scheduled_task", StoreTable::Tasks, |owner_id| {
        encode_task_row(&task, owner_id)
    })
    .await
    .unwrap_or_else(|| next_id("tsk"));

    {
        let mut runtime = lock_runtime(state)?;
        runtime.tasks.push(task.clone());
    }

    state.log_info(
        "create_scheduled_task",
        &format!("created task_id={} at {} position={next_position}", task.id, slot),
    );
    Ok(Some(task))
}

pub fn list_tasks_impl(state: &AppState, date: Option<String>) -> Result<Vec<Task>, InfraError> {
    let day = match date {
        Some(raw) => parse_date_input(&raw, "date")?,
        None => Utc::now().date_naive(),
    };
    let runtime = lock_runtime(state)?;
    Ok(day_tasks_sorted(&runtime, day))
}

pub fn list_backlog_impl(state: &AppState) -> Result<Vec<Task>, InfraError> {
    let runtime = lock_runtime(state)?;
    let mut tasks = runtime
        .tasks
        .iter()
        .filter(|task| task.is_backlog)
        .cloned()
        .collect::<Vec<_>>();
    tasks.sort_by(|left, right| right.created_at.cmp(&left.created_at));
    Ok(tasks)
}

pub fn list_scheduled_impl(state: &AppState, date: String) -> Result<Vec<Task>, InfraError> {
    let day = parse_date_input(&date, "date")?;
    let runtime = lock_runtime(state)?;
    let mut tasks = runtime
        .tasks
        .iter()
        .filter(|task| {
            task.scheduled_time
                .map(|slot| slot.date_naive() == day)
                .unwrap_or(false)
        })
        .cloned()
        .collect::<Vec<_>>();
    tasks.sort_by(|left, right| left.scheduled_time.cmp(&right.scheduled_time));
    Ok(tasks)
}

pub async fn edit_task_impl(
    state: &AppState,
    task_id: String,
    text: String,
) -> Result<Option<Task>, InfraError> {
    let task_id = required_id(&task_id, "task_id")?;
    let text = text.trim().to_string();
    if text.is_empty() {
        return Ok(None);
    }

    let updated = {
        let mut runtime = lock_runtime(state)?;
        let task = find_task_mut(&mut runtime, &task_id)?;
        task.text = text;
        task.clone()
    };

    persist_update(
        state,
        "edit_task",
        StoreTable::Tasks,
        &updated.id,
        serde_json::json!({ "text": updated.text }),
    )
    .await;

    state.log_info("edit_task", &format!("edited task_id={task_id}"));
    Ok(Some(updated))
}

pub async fn toggle_task_completed_impl(
    state: &AppState,
    task_id: String,
) -> Result<Task, InfraError> {
    let task_id = required_id(&task_id, "task_id")?;

    let updated = {
        let mut runtime = lock_runtime(state)?;
        let task = find_task_mut(&mut runtime, &task_id)?;
        task.completed = !task.completed;
        task.clone()
    };

    persist_update(
        state,
        "toggle_task_completed",
        StoreTable::Tasks,
        &updated.id,
        serde_json::json!({ "completed": updated.completed }),
    )
    .await;

    state.log_info(
        "toggle_task_completed",
        &format!("task_id={task_id} completed={}", updated.completed),
    );
    Ok(updated)
}

pub async fn delete_task_impl(state: &AppState, task_id: String) -> Result<bool, InfraError> {
    let task_id = required_id(&task_id, "task_id")?;

    let entry = {
        let mut runtime = lock_runtime(state)?;
        let Some(index) = runtime.tasks.iter().position(|task| task.id == task_id) else {
            return Ok(false);
        };
        let task = runtime.tasks.remove(index);
        runtime.timer.clear_for_task(&task.id);
        let entry = TrashedTask {
            id: task.id,
            text: task.text,
            completed: task.completed,
            time_spent_seconds: task.time_spent_seconds,
            is_backlog: task.is_backlog,
            date: task.date,
            trashed_at: Utc::now(),
        };
        runtime.trashed.push(entry.clone());
        sweep_trash(&mut runtime, Utc::now());
        entry
    };

    persist_delete(state, "delete_task", StoreTable::Tasks, &entry.id).await;
    let server_id = persist_insert(state, "delete_task", StoreTable::Trashed, |owner_id| {
        encode_trashed_row(&entry, owner_id)
    })
    .await;
    if let Some(server_id) = server_id {
        let mut runtime = lock_runtime(state)?;
        if let Some(stored) = runtime.trashed.iter_mut().find(|item| item.id == entry.id) {
            stored.id = server_id;
        }
    }

    state.log_info("delete_task", &format!("moved task_id={task_id} to trash"));
    Ok(true)
}

pub fn sweep_trash_impl(state: &AppState) -> Result<usize, InfraError> {
    let swept = {
        let mut runtime = lock_runtime(state)?;
        sweep_trash(&mut runtime, Utc::now())
    };
    if swept > 0 {
        state.log_info("sweep_trash", &format!("expired {swept} trashed tasks"));
    }
    Ok(swept)
}

pub fn list_trash_impl(state: &AppState) -> Result<Vec<TrashedTask>, InfraError> {
    let mut runtime = lock_runtime(state)?;
    sweep_trash(&mut runtime, Utc::now());
    let mut entries = runtime.trashed.clone();
    entries.sort_by(|left, right| right.trashed_at.cmp(&left.trashed_at));
    Ok(entries)
}

pub async fn restore_task_impl(
    state: &AppState,
    trashed_id: String,
) -> Result<Option<Task>, InfraError> {
    let trashed_id = required_id(&trashed_id, "trashed_id")?;

    let entry = {
        let mut runtime = lock_runtime(state)?;
        sweep_trash(&mut runtime, Utc::now());
        let Some(index) = runtime.trashed.iter().position(|item| item.id == trashed_id) else {
            return Ok(None);
        };
        runtime.trashed.remove(index)
    };

    // Restored tasks get a fresh identity; everything else carries over.
    let mut task = Task {
        id: String::new(),
        text: entry.text.clone(),
        completed: entry.completed,
        time_spent_seconds: entry.time_spent_seconds,
        is_backlog: entry.is_backlog,
        date: entry.date,
        order_position: None,
        scheduled_time: None,
        scheduled_duration_minutes: None,
        created_at: Utc::now(),
    };
    task.id = persist_insert(state, "restore_task", StoreTable::Tasks, |owner_id| {
        encode_task_row(&task, owner_id)
    })
    .await
    .unwrap_or_else(|| next_id("tsk"));

    {
        let mut runtime = lock_runtime(state)?;
        runtime.tasks.push(task.clone());
    }
    persist_delete(state, "restore_task", StoreTable::Trashed, &trashed_id).await;

    state.log_info(
        "restore_task",
        &format!("restored trashed_id={trashed_id} as task_id={}", task.id),
    );
    Ok(Some(task))
}

pub async fn delete_task_forever_impl(
    state: &AppState,
    trashed_id: String,
) -> Result<bool, InfraError> {
    let trashed_id = required_id(&trashed_id, "trashed_id")?;

    let removed = {
        let mut runtime = lock_runtime(state)?;
        let before = runtime.trashed.len();
        runtime.trashed.retain(|item| item.id != trashed_id);
        before != runtime.trashed.len()
    };
    if !removed {
        return Ok(false);
    }

    persist_delete(state, "delete_task_forever", StoreTable::Trashed, &trashed_id).await;
    state.log_info(
        "delete_task_forever",
        &format!("permanently deleted trashed_id={trashed_id}"),
    );
    Ok(true)
}

pub async fn clear_trash_impl(state: &AppState) -> Result<usize, InfraError> {
    let cleared = {
        let mut runtime = lock_runtime(state)?;
        let count = runtime.trashed.len();
        runtime.trashed.clear();
        count
    };

    persist_delete_all(state, "clear_trash", StoreTable::Trashed).await;
    state.log_info("clear_trash", &format!("cleared {cleared} trashed tasks"));
    Ok(cleared)
}

pub async fn promote_task_impl(state: &AppState, task_id: String) -> Result<Task, InfraError> {
    let task_id = required_id(&task_id, "task_id")?;
    let now = Utc::now();

    let updated = {
        let mut runtime = lock_runtime(state)?;
        let task = find_task_mut(&mut runtime, &task_id)?;
        task.is_backlog = false;
        task.date = now;
        task.clone()
    };

    persist_update(
        state,
        "promote_task",
        StoreTable::Tasks,
        &updated.id,
        serde_json::json!({ "is_backlog": false, "date": updated.date.to_rfc3339() }),
    )
    .await;

    state.log_info("promote_task", &format!("promoted task_id={task_id} to today"));
    Ok(updated)
}

pub async fn move_task_to_backlog_impl(
    state: &AppState,
    task_id: String,
) -> Result<Task, InfraError> {
    let task_id = required_id(&task_id, "task_id")?;

    let updated = {
        let mut runtime = lock_runtime(state)?;
        let task = find_task_mut(&mut runtime, &task_id)?;
        task.is_backlog = true;
        task.scheduled_time = None;
        task.scheduled_duration_minutes = None;
        task.order_position = None;
        task.clone()
    };

    persist_update(
        state,
        "move_task_to_backlog",
        StoreTable::Tasks,
        &updated.id,
        serde_json::json!({
            "is_backlog": true,
            "scheduled_time": serde_json::Value::Null,
            "scheduled_duration": serde_json::Value::Null,
            "order_position": serde_json::Value::Null,
        }),
    )
    .await;

    state.log_info(
        "move_task_to_backlog",
        &format!("moved task_id={task_id} to backlog"),
    );
    Ok(updated)
}

pub fn list_yesterday_impl(state: &AppState) -> Result<Vec<Task>, InfraError> {
    let yesterday = Utc::now().date_naive() - Duration::days(1);
    let runtime = lock_runtime(state)?;
    Ok(runtime
        .tasks
        .iter()
        .filter(|task| {
            !task.is_backlog && !task.completed && task.date.date_naive() == yesterday
        })
        .cloned()
        .collect())
}

pub async fn carry_over_yesterday_impl(state: &AppState) -> Result<Vec<Task>, InfraError> {
    let yesterday = Utc::now().date_naive() - Duration::days(1);
    let now = Utc::now();

    let carried = {
        let mut runtime = lock_runtime(state)?;
        let mut carried = Vec::new();
        for task in runtime.tasks.iter_mut() {
            if task.is_backlog || task.completed || task.date.date_naive() != yesterday {
                continue;
            }
            task.date = now;
            carried.push(task.clone());
        }
        carried
    };

    for task in &carried {
        persist_update(
            state,
            "carry_over_yesterday",
            StoreTable::Tasks,
            &task.id,
            serde_json::json!({ "date": task.date.to_rfc3339() }),
        )
        .await;
    }

    state.log_info(
        "carry_over_yesterday",
        &format!("carried {} tasks to today", carried.len()),
    );
    Ok(carried)
}

pub async fn dismiss_yesterday_impl(state: &AppState) -> Result<usize, InfraError> {
    let today = Utc::now().date_naive();

    let dismissed = {
        let mut runtime = lock_runtime(state)?;
        let mut dismissed = Vec::new();
        for task in runtime.tasks.iter_mut() {
            if task.is_backlog || task.completed || task.date.date_naive() >= today {
                continue;
            }
            task.is_backlog = true;
            task.scheduled_time = None;
            task.scheduled_duration_minutes = None;
            task.order_position = None;
            dismissed.push(task.id.clone());
        }
        dismissed
    };

    for task_id in &dismissed {
        persist_update(
            state,
            "dismiss_yesterday",
            StoreTable::Tasks,
            task_id,
            serde_json::json!({
                "is_backlog": true,
                "scheduled_time": serde_json::Value::Null,
                "scheduled_duration": serde_json::Value::Null,
                "order_position": serde_json::Value::Null,
            }),
        )
        .await;
    }

    state.log_info(
        "dismiss_yesterday",
        &format!("dismissed {} stale tasks to backlog", dismissed.len()),
    );
    Ok(dismissed.len())
}

// ---------------------------------------------------------------------------
// Favorites

pub async fn toggle_favorite_impl(
    state: &AppState,
    text: String,
) -> Result<Vec<Favorite>, InfraError> {
    let text = text.trim().to_string();
    if text.is_empty() {
        let runtime = lock_runtime(state)?;
        return Ok(runtime.favorites.clone());
    }

    let existing_id = {
        let runtime = lock_runtime(state)?;
        runtime
            .favorites
            .iter()
            .find(|favorite| favorite.text == text)
            .map(|favorite| favorite.id.clone())
    };

    if let Some(favorite_id) = existing_id {
        {
            let mut runtime = lock_runtime(state)?;
            runtime.favorites.retain(|favorite| favorite.id != favorite_id);
        }
        persist_delete(state, "toggle_favorite", StoreTable::Favorites, &favorite_id).await;
        state.log_info("toggle_favorite", &format!("removed favorite_id={favorite_id}"));
    } else {
        let mut favorite = Favorite {
            id: String::new(),
            text,
            created_at: Utc::now(),
        };
        favorite.id = persist_insert(state, "toggle_favorite", StoreTable::Favorites, |owner_id| {
            encode_favorite_row(&favorite, owner_id)
        })
        .await
        .unwrap_or_else(|| next_id("fav"));

        {
            let mut runtime = lock_runtime(state)?;
            runtime.favorites.push(favorite.clone());
        }
        state.log_info("toggle_favorite", &format!("added favorite_id={}", favorite.id));
    }

    let runtime = lock_runtime(state)?;
    let mut favorites = runtime.favorites.clone();
    favorites.sort_by(|left, right| left.created_at.cmp(&right.created_at));
    Ok(favorites)
}

pub fn list_favorites_impl(state: &AppState) -> Result<Vec<Favorite>, InfraError> {
    let runtime = lock_runtime(state)?;
    let mut favorites = runtime.favorites.clone();
    favorites.sort_by(|left, right| left.created_at.cmp(&right.created_at));
    Ok(favorites)
}

pub async fn add_favorite_to_today_impl(
    state: &AppState,
    favorite_id: String,
) -> Result<Option<Task>, InfraError> {
    let favorite_id = required_id(&favorite_id, "favorite_id")?;
    let text = {
        let runtime = lock_runtime(state)?;
        runtime
            .favorites
            .iter()
            .find(|favorite| favorite.id == favorite_id)
            .map(|favorite| favorite.text.clone())
    };
    let Some(text) = text else {
        return Ok(None);
    };
    create_task_impl(state, text, false).await
}

pub async fn add_all_favorites_impl(state: &AppState) -> Result<Vec<Task>, InfraError> {
    let texts = {
        let runtime = lock_runtime(state)?;
        let mut favorites = runtime.favorites.clone();
        favorites.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        favorites
            .into_iter()
            .map(|favorite| favorite.text)
            .collect::<Vec<_>>()
    };

    let mut created = Vec::new();
    for text in texts {
        if let Some(task) = create_task_impl(state, text, false).await? {
            created.push(task);
        }
    }
    state.log_info(
        "add_all_favorites",
        &format!("added {} favorite tasks to today", created.len()),
    );
    Ok(created)
}

pub async fn delete_favorite_impl(
    state: &AppState,
    favorite_id: String,
) -> Result<bool, InfraError> {
    let favorite_id = required_id(&favorite_id, "favorite_id")?;
    let removed = {
        let mut runtime = lock_runtime(state)?;
        let before = runtime.favorites.len();
        runtime.favorites.retain(|favorite| favorite.id != favorite_id);
        before != runtime.favorites.len()
    };
    if !removed {
        return Ok(false);
    }
    persist_delete(state, "delete_favorite", StoreTable::Favorites, &favorite_id).await;
    state.log_info("delete_favorite", &format!("deleted favorite_id={favorite_id}"));
    Ok(true)
}

// ---------------------------------------------------------------------------
// Timer

pub fn begin_timer_setup_impl(
    state: &AppState,
    task_id: String,
) -> Result<TimerStateResponse, InfraError> {
    let task_id = required_id(&task_id, "task_id")?;

    let mut runtime = lock_runtime(state)?;
    let exists = runtime
        .tasks
        .iter()
        .any(|task| task.id == task_id && !task.completed);
    if !exists {
        return Err(InfraError::InvalidConfig(format!(
            "task not found or already completed: {task_id}"
        )));
    }

    runtime.timer.begin_configuring(&task_id);
    Ok(to_timer_state_response(&runtime.timer))
}

pub fn set_timer_draft_impl(
    state: &AppState,
    hours: Option<String>,
    minutes: Option<String>,
    seconds: Option<String>,
) -> Result<DurationDraftResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let applied = runtime.timer.edit_draft(|draft| {
        if let Some(hours) = hours.as_deref() {
            draft.set_hours(hours);
        }
        if let Some(minutes) = minutes.as_deref() {
            draft.set_minutes(minutes);
        }
        if let Some(seconds) = seconds.as_deref() {
            draft.set_seconds(seconds);
        }
    });
    if !applied {
        return Err(InfraError::InvalidConfig(
            "timer is not being configured".to_string(),
        ));
    }

    let TimerSession::Configuring { draft, .. } = &runtime.timer else {
        return Err(InfraError::InvalidConfig(
            "timer is not being configured".to_string(),
        ));
    };
    Ok(DurationDraftResponse {
        hours: draft.hours().to_string(),
        minutes: draft.minutes().to_string(),
        seconds: draft.seconds().to_string(),
        total_seconds: draft.total_seconds(),
    })
}

pub fn cancel_timer_setup_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.timer.cancel_configuring();
    Ok(to_timer_state_response(&runtime.timer))
}

pub fn start_timer_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    if runtime.timer.start() {
        drop(runtime);
        state.log_info("start_timer", "countdown started");
        let runtime = lock_runtime(state)?;
        return Ok(to_timer_state_response(&runtime.timer));
    }
    Ok(to_timer_state_response(&runtime.timer))
}

pub fn tick_timer_impl(state: &AppState) -> Result<TimerTickResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let cue = runtime.timer.tick();
    Ok(TimerTickResponse {
        state: to_timer_state_response(&runtime.timer),
        cue,
    })
}

pub fn pause_timer_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.timer.pause();
    Ok(to_timer_state_response(&runtime.timer))
}

pub fn resume_timer_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.timer.resume();
    Ok(to_timer_state_response(&runtime.timer))
}

pub async fn complete_timer_impl(state: &AppState) -> Result<TimerTickResponse, InfraError> {
    let completion = {
        let mut runtime = lock_runtime(state)?;
        runtime.timer.complete()
    };

    let Some(completion) = completion else {
        let runtime = lock_runtime(state)?;
        return Ok(TimerTickResponse {
            state: to_timer_state_response(&runtime.timer),
            cue: AlertCue::None,
        });
    };

    let updated = {
        let mut runtime = lock_runtime(state)?;
        match find_task_mut(&mut runtime, &completion.task_id) {
            Ok(task) => {
                task.completed = true;
                task.time_spent_seconds =
                    task.time_spent_seconds.saturating_add(completion.seconds_spent);
                Some(task.clone())
            }
            // The task can vanish mid-session (deleted from another view).
            Err(_) => None,
        }
    };

    if let Some(task) = updated.as_ref() {
        persist_update(
            state,
            "complete_timer",
            StoreTable::Tasks,
            &task.id,
            serde_json::json!({
                "completed": true,
                "time_spent": task.time_spent_seconds,
            }),
        )
        .await;
    }

    state.log_info(
        "complete_timer",
        &format!(
            "credited {}s to task_id={}",
            completion.seconds_spent, completion.task_id
        ),
    );

    let runtime = lock_runtime(state)?;
    Ok(TimerTickResponse {
        state: to_timer_state_response(&runtime.timer),
        cue: AlertCue::CompletionChime,
    })
}

pub fn repeat_timer_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.timer.repeat();
    Ok(to_timer_state_response(&runtime.timer))
}

pub fn get_timer_state_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(to_timer_state_response(&runtime.timer))
}

// ---------------------------------------------------------------------------
// Reorder and calendar scheduling

pub fn begin_task_drag_impl(state: &AppState, task_id: String) -> Result<bool, InfraError> {
    let task_id = required_id(&task_id, "task_id")?;
    let mut runtime = lock_runtime(state)?;

    if !runtime.tasks.iter().any(|task| task.id == task_id) {
        return Err(InfraError::InvalidConfig(format!("task not found: {task_id}")));
    }
    // A task being resized cannot also be dragged.
    if runtime
        .resize
        .as_ref()
        .map(|resize| resize.task_id() == task_id)
        .unwrap_or(false)
    {
        return Ok(false);
    }

    runtime.drag = Some(DragSession::begin(task_id));
    Ok(true)
}

pub fn hover_task_drag_impl(
    state: &AppState,
    target_id: String,
) -> Result<Option<String>, InfraError> {
    let target_id = required_id(&target_id, "target_id")?;
    let mut runtime = lock_runtime(state)?;
    let Some(drag) = runtime.drag.as_mut() else {
        return Ok(None);
    };
    drag.hover(&target_id);
    Ok(drag.hover_target_id().map(ToOwned::to_owned))
}

pub fn cancel_task_drag_impl(state: &AppState) -> Result<(), InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.drag = None;
    Ok(())
}

pub async fn drop_task_drag_impl(state: &AppState) -> Result<Vec<Task>, InfraError> {
    let assignments = {
        let mut runtime = lock_runtime(state)?;
        let Some(drag) = runtime.drag.take() else {
            return Ok(Vec::new());
        };
        let Some((source_id, target_id)) = drag.drop_on_target() else {
            return Ok(Vec::new());
        };

        let Some(source) = runtime.tasks.iter().find(|task| task.id == source_id) else {
            return Ok(Vec::new());
        };
        let day = source.date.date_naive();
        if source.is_backlog {
            return Ok(Vec::new());
        }

        let ordered_ids = day_tasks_sorted(&runtime, day)
            .into_iter()
            .map(|task| task.id)
            .collect::<Vec<_>>();
        let Some(assignments) = reorder_by_drop(&ordered_ids, &source_id, &target_id) else {
            return Ok(Vec::new());
        };

        for (task_id, position) in &assignments {
            if let Some(task) = runtime.tasks.iter_mut().find(|task| &task.id == task_id) {
                task.order_position = Some(*position);
            }
        }
        assignments
    };

    for (task_id, position) in &assignments {
        persist_update(
            state,
            "drop_task_drag",
            StoreTable::Tasks,
            task_id,
            serde_json::json!({ "order_position": position }),
        )
        .await;
    }

    state.log_info(
        "drop_task_drag",
        &format!("reordered {} tasks", assignments.len()),
    );

    let runtime = lock_runtime(state)?;
    let day = assignments
        .first()
        .and_then(|(task_id, _)| runtime.tasks.iter().find(|task| &task.id == task_id))
        .map(|task| task.date.date_naive())
        .unwrap_or_else(|| Utc::now().date_naive());
    Ok(day_tasks_sorted(&runtime, day))
}

pub async fn schedule_task_at_hour_impl(
    state: &AppState,
    task_id: String,
    date: String,
    hour: u32,
) -> Result<Task, InfraError> {
    let day = parse_date_input(&date, "date")?;
    let slot = slot_start(day, hour)
        .ok_or_else(|| InfraError::InvalidConfig(format!("hour must be 0-23, got {hour}")))?;
    schedule_task_at_slot(state, "schedule_task_at_hour", task_id, slot).await
}

pub async fn schedule_task_all_day_impl(
    state: &AppState,
    task_id: String,
    date: String,
) -> Result<Task, InfraError> {
    let day = parse_date_input(&date, "date")?;
    let slot = all_day_slot_start(day)
        .ok_or_else(|| InfraError::InvalidConfig("invalid all-day slot".to_string()))?;
    schedule_task_at_slot(state, "schedule_task_all_day", task_id, slot).await
}

async fn schedule_task_at_slot(
    state: &AppState,
    command: &str,
    task_id: String,
    slot: DateTime<Utc>,
) -> Result<Task, InfraError> {
    let task_id = required_id(&task_id, "task_id")?;

    let updated = {
        let mut runtime = lock_runtime(state)?;
        let task = find_task_mut(&mut runtime, &task_id)?;
        task.scheduled_time = Some(slot);
        task.scheduled_duration_minutes = task
            .scheduled_duration_minutes
            .or(Some(DEFAULT_DURATION_MINUTES));
        task.date = slot;
        task.is_backlog = false;
        task.clone()
    };

    persist_update(
        state,
        command,
        StoreTable::Tasks,
        &updated.id,
        serde_json::json!({
            "scheduled_time": slot.to_rfc3339(),
            "scheduled_duration": updated.scheduled_duration_minutes,
            "date": updated.date.to_rfc3339(),
            "is_backlog": false,
        }),
    )
    .await;

    state.log_info(command, &format!("scheduled task_id={task_id} at {slot}"));
    Ok(updated)
}

pub async fn clear_task_schedule_impl(
    state: &AppState,
    task_id: String,
) -> Result<Task, InfraError> {
    let task_id = required_id(&task_id, "task_id")?;

    let updated = {
        let mut runtime = lock_runtime(state)?;
        let task = find_task_mut(&mut runtime, &task_id)?;
        task.scheduled_time = None;
        task.scheduled_duration_minutes = None;
        task.clone()
    };

    persist_update(
        state,
        "clear_task_schedule",
        StoreTable::Tasks,
        &updated.id,
        serde_json::json!({
            "scheduled_time": serde_json::Value::Null,
            "scheduled_duration": serde_json::Value::Null,
        }),
    )
    .await;

    state.log_info("clear_task_schedule", &format!("unscheduled task_id={task_id}"));
    Ok(updated)
}

pub fn begin_task_resize_impl(
    state: &AppState,
    task_id: String,
    pointer_y: f64,
) -> Result<ResizePreviewResponse, InfraError> {
    let task_id = required_id(&task_id, "task_id")?;
    let mut runtime = lock_runtime(state)?;

    let original = {
        let task = runtime
            .tasks
            .iter()
            .find(|task| task.id == task_id)
            .ok_or_else(|| InfraError::InvalidConfig(format!("task not found: {task_id}")))?;
        if task.scheduled_time.is_none() {
            return Err(InfraError::InvalidConfig(format!(
                "task is not scheduled: {task_id}"
            )));
        }
        task.scheduled_duration_minutes
            .unwrap_or(DEFAULT_DURATION_MINUTES)
    };

    // Resizing supersedes any drag of the same task.
    if runtime
        .drag
        .as_ref()
        .map(|drag| drag.source_id() == task_id)
        .unwrap_or(false)
    {
        runtime.drag = None;
    }

    let session = ResizeSession::begin(task_id.clone(), pointer_y, original);
    let duration = session.preview(pointer_y);
    runtime.resize = Some(session);
    Ok(ResizePreviewResponse {
        task_id,
        duration_minutes: duration,
    })
}

pub fn preview_task_resize_impl(
    state: &AppState,
    pointer_y: f64,
) -> Result<ResizePreviewResponse, InfraError> {
    let runtime = lock_runtime(state)?;
    let resize = runtime
        .resize
        .as_ref()
        .ok_or_else(|| InfraError::InvalidConfig("no resize in progress".to_string()))?;
    Ok(ResizePreviewResponse {
        task_id: resize.task_id().to_string(),
        duration_minutes: resize.preview(pointer_y),
    })
}

pub async fn commit_task_resize_impl(
    state: &AppState,
    pointer_y: f64,
) -> Result<Option<Task>, InfraError> {
    let updated = {
        let mut runtime = lock_runtime(state)?;
        let Some(resize) = runtime.resize.take() else {
            return Ok(None);
        };
        let duration = resize.preview(pointer_y);
        let task_id = resize.task_id().to_string();
        let task = find_task_mut(&mut runtime, &task_id)?;
        task.scheduled_duration_minutes = Some(duration);
        task.clone()
    };

    persist_update(
        state,
        "commit_task_resize",
        StoreTable::Tasks,
        &updated.id,
        serde_json::json!({ "scheduled_duration": updated.scheduled_duration_minutes }),
    )
    .await;

    state.log_info(
        "commit_task_resize",
        &format!(
            "resized task_id={} to {}min",
            updated.id,
            updated.scheduled_duration_minutes.unwrap_or(0)
        ),
    );
    Ok(Some(updated))
}

pub fn cancel_task_resize_impl(state: &AppState) -> Result<(), InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.resize = None;
    Ok(())
}

// ---------------------------------------------------------------------------
// Notes

pub fn list_notes_impl(state: &AppState, query: Option<String>) -> Result<Vec<Note>, InfraError> {
    let query = query.unwrap_or_default();
    let runtime = lock_runtime(state)?;
    let mut notes = runtime
        .notes
        .iter()
        .filter(|note| note.matches_query(&query))
        .cloned()
        .collect::<Vec<_>>();
    notes.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
    Ok(notes)
}

pub async fn create_note_impl(
    state: &AppState,
    title: String,
    content: String,
) -> Result<Note, InfraError> {
    let mut note = Note {
        id: String::new(),
        title: title.trim().to_string(),
        content,
        updated_at: Utc::now(),
    };
    note.id = persist_insert(state, "create_note", StoreTable::Notes, |owner_id| {
        encode_note_row(&note, owner_id)
    })
    .await
    .unwrap_or_else(|| next_id("note"));

    {
        let mut runtime = lock_runtime(state)?;
        runtime.notes.push(note.clone());
    }

    state.log_info("create_note", &format!("created note_id={}", note.id));
    Ok(note)
}

pub async fn update_note_impl(
    state: &AppState,
    note_id: String,
    title: Option<String>,
    content: Option<String>,
) -> Result<Note, InfraError> {
    let note_id = required_id(&note_id, "note_id")?;
    let now = Utc::now();

    let updated = {
        let mut runtime = lock_runtime(state)?;
        let note = runtime
            .notes
            .iter_mut()
            .find(|note| note.id == note_id)
            .ok_or_else(|| InfraError::InvalidConfig(format!("note not found: {note_id}")))?;
        if let Some(title) = title {
            note.title = title;
        }
        if let Some(content) = content {
            note.content = content;
        }
        note.updated_at = now;
        note.clone()
    };

    persist_update(
        state,
        "update_note",
        StoreTable::Notes,
        &updated.id,
        serde_json::json!({
            "title": updated.title,
            "content": updated.content,
            "updated_at": updated.updated_at.to_rfc3339(),
        }),
    )
    .await;

    Ok(updated)
}

pub async fn delete_note_impl(state: &AppState, note_id: String) -> Result<bool, InfraError> {
    let note_id = required_id(&note_id, "note_id")?;
    let removed = {
        let mut runtime = lock_runtime(state)?;
        let before = runtime.notes.len();
        runtime.notes.retain(|note| note.id != note_id);
        before != runtime.notes.len()
    };
    if !removed {
        return Ok(false);
    }
    persist_delete(state, "delete_note", StoreTable::Notes, &note_id).await;
    state.log_info("delete_note", &format!("deleted note_id={note_id}"));
    Ok(true)
}

// ---------------------------------------------------------------------------
// History and productivity

pub fn get_history_impl(state: &AppState) -> Result<Vec<HistoryDayResponse>, InfraError> {
    let runtime = lock_runtime(state)?;
    let mut by_day: HashMap<NaiveDate, Vec<Task>> = HashMap::new();
    for task in runtime.tasks.iter().filter(|task| task.completed) {
        by_day.entry(task.date.date_naive()).or_default().push(task.clone());
    }

    let mut days = by_day.into_iter().collect::<Vec<_>>();
    days.sort_by(|left, right| right.0.cmp(&left.0));

    Ok(days
        .into_iter()
        .map(|(date, mut tasks)| {
            tasks.sort_by(|left, right| right.created_at.cmp(&left.created_at));
            HistoryDayResponse {
                date: date.to_string(),
                completed_count: tasks.len(),
                total_seconds: tasks
                    .iter()
                    .map(|task| task.time_spent_seconds as u64)
                    .sum(),
                tasks,
            }
        })
        .collect())
}

pub fn get_productivity_summary_impl(
    state: &AppState,
) -> Result<ProductivitySummaryResponse, InfraError> {
    let today = Utc::now().date_naive();
    let runtime = lock_runtime(state)?;
    let completed = runtime
        .tasks
        .iter()
        .filter(|task| task.completed)
        .collect::<Vec<_>>();

    let total_completed = completed.len();
    let total_seconds: u64 = completed
        .iter()
        .map(|task| task.time_spent_seconds as u64)
        .sum();
    let total_hours = total_seconds as f64 / 3_600.0;
    let average_task_minutes = if total_completed == 0 {
        0.0
    } else {
        total_seconds as f64 / 60.0 / total_completed as f64
    };

    let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
    for task in &completed {
        *per_day.entry(task.date.date_naive()).or_default() += 1;
    }

    let last_seven_days = (0..7)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            DayCountResponse {
                date: date.to_string(),
                completed_count: per_day.get(&date).copied().unwrap_or(0),
            }
        })
        .collect();

    let mut per_weekday: HashMap<chrono::Weekday, usize> = HashMap::new();
    for task in &completed {
        *per_weekday.entry(task.date.weekday()).or_default() += 1;
    }
    let most_productive_weekday = per_weekday
        .into_iter()
        .max_by_key(|(weekday, count)| (*count, std::cmp::Reverse(weekday.num_days_from_monday())))
        .map(|(weekday, _)| weekday_name(weekday).to_string());

    let week_start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    let last_week_start = week_start - Duration::days(7);
    let completed_this_week = completed
        .iter()
        .filter(|task| task.date.date_naive() >= week_start)
        .count();
    let completed_last_week = completed
        .iter()
        .filter(|task| {
            let date = task.date.date_naive();
            date >= last_week_start && date < week_start
        })
        .count();

    // Streak counts back from today, or from yesterday when today is still
    // open.
    let mut streak_days = 0u32;
    let mut cursor = if per_day.contains_key(&today) {
        today
    } else {
        today - Duration::days(1)
    };
    while per_day.contains_key(&cursor) {
        streak_days += 1;
        cursor = cursor - Duration::days(1);
    }

    Ok(ProductivitySummaryResponse {
        total_completed,
        total_hours,
        average_task_minutes,
        last_seven_days,
        most_productive_weekday,
        completed_this_week,
        completed_last_week,
        streak_days,
    })
}

fn weekday_name(weekday: chrono::Weekday) -> &'static str {
    match weekday {
        chrono::Weekday::Mon => "Monday",
        chrono::Weekday::Tue => "Tuesday",
        chrono::Weekday::Wed => "Wednesday",
        chrono::Weekday::Thu => "Thursday",
        chrono::Weekday::Fri => "Friday",
        chrono::Weekday::Sat => "Saturday",
        chrono::Weekday::Sun => "Sunday",
    }
}

// ---------------------------------------------------------------------------
// Preferences

pub fn get_dark_mode_impl(state: &AppState) -> Result<Option<bool>, InfraError> {
    SqlitePreferencesRepository::new(state.database_path()).load_dark_mode()
}

pub fn set_dark_mode_impl(state: &AppState, enabled: bool) -> Result<(), InfraError> {
    SqlitePreferencesRepository::new(state.database_path()).save_dark_mode(enabled)?;
    state.log_info("set_dark_mode", &format!("dark_mode={enabled}"));
    Ok(())
}

// ---------------------------------------------------------------------------
// Auth

pub async fn sign_in_impl(
    state: &AppState,
    email: String,
    password: String,
) -> Result<AuthOutcome, InfraError> {
    let manager = required_auth_manager(state)?;
    let outcome = manager.sign_in_with_password(&email, &password).await?;
    if matches!(outcome, AuthOutcome::SignedIn { .. }) {
        cache_stored_session(state, &manager)?;
    }
    state.log_info("sign_in", &format!("outcome={}", outcome_name(&outcome)));
    Ok(outcome)
}

pub async fn sign_up_impl(
    state: &AppState,
    email: String,
    password: String,
) -> Result<AuthOutcome, InfraError> {
    let manager = required_auth_manager(state)?;
    let outcome = manager.sign_up(&email, &password).await?;
    if matches!(outcome, AuthOutcome::SignedIn { .. }) {
        cache_stored_session(state, &manager)?;
    }
    state.log_info("sign_up", &format!("outcome={}", outcome_name(&outcome)));
    Ok(outcome)
}

pub async fn send_magic_link_impl(
    state: &AppState,
    email: String,
) -> Result<AuthOutcome, InfraError> {
    let manager = required_auth_manager(state)?;
    let outcome = manager.send_magic_link(&email).await?;
    state.log_info(
        "send_magic_link",
        &format!("outcome={}", outcome_name(&outcome)),
    );
    Ok(outcome)
}

pub async fn sign_out_impl(state: &AppState) -> Result<(), InfraError> {
    if let Some(manager) = auth_manager(state)? {
        manager.sign_out().await?;
    }
    {
        let mut runtime = lock_runtime(state)?;
        runtime.session = None;
    }
    state.log_info("sign_out", "cleared session");
    Ok(())
}

pub async fn get_session_impl(
    state: &AppState,
) -> Result<Option<SessionInfoResponse>, InfraError> {
    Ok(active_session(state).await.map(|session| SessionInfoResponse {
        user_id: session.user_id,
        email: session.email,
        expires_at: session.expires_at.to_rfc3339(),
    }))
}

fn outcome_name(outcome: &AuthOutcome) -> &'static str {
    match outcome {
        AuthOutcome::SignedIn { .. } => "signed_in",
        AuthOutcome::AccountCreated => "account_created",
        AuthOutcome::MagicLinkSent => "magic_link_sent",
        AuthOutcome::Failed { .. } => "failed",
    }
}

fn auth_manager(
    state: &AppState,
) -> Result<Option<AuthManager<KeyringSessionStore, ReqwestAuthClient>>, InfraError> {
    let Some(config) = read_store_config(state.config_dir())? else {
        return Ok(None);
    };
    Ok(Some(AuthManager::new(
        AuthConfig::from_store_config(&config),
        Arc::new(KeyringSessionStore::default()),
        Arc::new(ReqwestAuthClient::new()),
    )))
}

fn required_auth_manager(
    state: &AppState,
) -> Result<AuthManager<KeyringSessionStore, ReqwestAuthClient>, InfraError> {
    auth_manager(state)?.ok_or_else(|| {
        InfraError::InvalidConfig("remote store is not configured in store.json".to_string())
    })
}

fn cache_stored_session(
    state: &AppState,
    manager: &AuthManager<KeyringSessionStore, ReqwestAuthClient>,
) -> Result<(), InfraError> {
    let session = manager.stored_session()?;
    let mut runtime = lock_runtime(state)?;
    runtime.session = session;
    Ok(())
}

async fn active_session(state: &AppState) -> Option<Session> {
    if let Ok(runtime) = state.runtime.lock() {
        if let Some(session) = runtime.session.as_ref() {
            if session.is_valid_at(Utc::now(), SESSION_LEEWAY_SECONDS) {
                return Some(session.clone());
            }
        }
    }

    let manager = auth_manager(state).ok().flatten()?;
    match manager.ensure_session().await {
        Ok(EnsureSessionResult::Existing(session))
        | Ok(EnsureSessionResult::Refreshed(session)) => {
            if let Ok(mut runtime) = state.runtime.lock() {
                runtime.session = Some(session.clone());
            }
            Some(session)
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Remote persistence (optimistic, no rollback)

async fn remote_context(state: &AppState) -> Option<(Arc<dyn RowStoreClient>, Session)> {
    let store = state.store.clone()?;
    let session = active_session(state).await?;
    Some((store, session))
}

async fn persist_insert<F>(
    state: &AppState,
    command: &str,
    table: StoreTable,
    encode: F,
) -> Option<String>
where
    F: FnOnce(&str) -> serde_json::Value,
{
    let (store, session) = remote_context(state).await?;
    let row = encode(&session.user_id);
    match store.insert(&session.access_token, table, &row).await {
        Ok(stored) => stored
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned),
        Err(error) => {
            state.log_error(command, &format!("remote insert failed: {error}"));
            None
        }
    }
}

async fn persist_update(
    state: &AppState,
    command: &str,
    table: StoreTable,
    id: &str,
    patch: serde_json::Value,
) {
    let Some((store, session)) = remote_context(state).await else {
        return;
    };
    if let Err(error) = store.update(&session.access_token, table, id, &patch).await {
        state.log_error(command, &format!("remote update failed for {id}: {error}"));
    }
}

async fn persist_delete(state: &AppState, command: &str, table: StoreTable, id: &str) {
    let Some((store, session)) = remote_context(state).await else {
        return;
    };
    if let Err(error) = store.delete(&session.access_token, table, id).await {
        state.log_error(command, &format!("remote delete failed for {id}: {error}"));
    }
}

async fn persist_delete_all(state: &AppState, command: &str, table: StoreTable) {
    let Some((store, session)) = remote_context(state).await else {
        return;
    };
    if let Err(error) = store
        .delete_all(&session.access_token, table, &session.user_id)
        .await
    {
        state.log_error(command, &format!("remote clear failed: {error}"));
    }
}

// ---------------------------------------------------------------------------
// Shared helpers

fn lock_runtime(state: &AppState) -> Result<MutexGuard<'_, RuntimeState>, InfraError> {
    state
        .runtime
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("runtime lock poisoned: {error}")))
}

fn sweep_trash(runtime: &mut RuntimeState, now: DateTime<Utc>) -> usize {
    let before = runtime.trashed.len();
    runtime.trashed.retain(|entry| !entry.is_expired_at(now));
    before - runtime.trashed.len()
}

fn required_id(value: &str, field_name: &str) -> Result<String, InfraError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(InfraError::InvalidConfig(format!(
            "{field_name} must not be empty"
        )));
    }
    Ok(value.to_string())
}

fn find_task_mut<'a>(
    runtime: &'a mut RuntimeState,
    task_id: &str,
) -> Result<&'a mut Task, InfraError> {
    runtime
        .tasks
        .iter_mut()
        .find(|task| task.id == task_id)
        .ok_or_else(|| InfraError::InvalidConfig(format!("task not found: {task_id}")))
}

/// One day's list order: explicit positions first, then newest-first for
/// tasks that were never reordered.
fn day_tasks_sorted(runtime: &RuntimeState, day: NaiveDate) -> Vec<Task> {
    let mut tasks = runtime
        .tasks
        .iter()
        .filter(|task| !task.is_backlog && task.date.date_naive() == day)
        .cloned()
        .collect::<Vec<_>>();
    tasks.sort_by(|left, right| match (left.order_position, right.order_position) {
        (Some(left_position), Some(right_position)) => left_position.cmp(&right_position),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => right.created_at.cmp(&left.created_at),
    });
    tasks
}

fn parse_date_input(value: &str, field_name: &str) -> Result<NaiveDate, InfraError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|error| InfraError::InvalidConfig(format!("{field_name} must be YYYY-MM-DD: {error}")))
}

fn to_timer_state_response(timer: &TimerSession) -> TimerStateResponse {
    TimerStateResponse {
        task_id: timer.task_id().map(ToOwned::to_owned),
        phase: timer.phase().to_string(),
        remaining_seconds: timer.remaining_seconds(),
        initial_seconds: timer.initial_seconds(),
        display: format_clock(timer.remaining_seconds()),
        progress: timer.progress(),
        alert_active: timer.alert_active(),
    }
}
