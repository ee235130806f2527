mod application;
mod domain;
mod infrastructure;

use application::auth::AuthOutcome;
use application::bootstrap::bootstrap_workspace;
use application::commands::{
    add_all_favorites_impl, add_favorite_to_today_impl, begin_task_drag_impl,
    begin_task_resize_impl, begin_timer_setup_impl, cancel_task_drag_impl,
    cancel_task_resize_impl, cancel_timer_setup_impl, carry_over_yesterday_impl, clear_task_schedule_impl,
    clear_trash_impl, commit_task_resize_impl, complete_timer_impl, create_note_impl,
    create_scheduled_task_impl, create_task_impl, delete_favorite_impl, delete_note_impl,
    delete_task_forever_impl, delete_task_impl, dismiss_yesterday_impl, drop_task_drag_impl,
    edit_task_impl, get_dark_mode_impl, get_history_impl, get_productivity_summary_impl,
    get_session_impl, get_timer_state_impl, hover_task_drag_impl, list_backlog_impl,
    list_favorites_impl, list_notes_impl, list_scheduled_impl, list_tasks_impl, list_trash_impl,
    list_yesterday_impl, load_workspace_impl, move_task_to_backlog_impl, pause_timer_impl,
    preview_task_resize_impl, promote_task_impl, repeat_timer_impl, restore_task_impl,
    resume_timer_impl, schedule_task_all_day_impl, schedule_task_at_hour_impl,
    send_magic_link_impl, set_dark_mode_impl, set_timer_draft_impl, sign_in_impl, sign_out_impl,
    sign_up_impl, start_timer_impl, sweep_trash_impl, tick_timer_impl, toggle_favorite_impl,
    toggle_task_completed_impl, update_note_impl, AppState, DurationDraftResponse,
    HistoryDayResponse, ProductivitySummaryResponse, ResizePreviewResponse, SessionInfoResponse,
    TimerStateResponse, TimerTickResponse, WorkspaceSnapshotResponse,
};
use domain::models::{Favorite, Note, Task, TrashedTask};
use serde::Serialize;
use std::path::PathBuf;
use tauri::{Emitter, Manager};

#[derive(Debug, Serialize)]
struct BootstrapResponse {
    workspace_root: String,
    database_path: String,
}

#[tauri::command]
fn bootstrap(root: Option<String>) -> Result<BootstrapResponse, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        database_path: result.database_path.display().to_string(),
    })
}

#[tauri::command]
fn ping() -> &'static str {
    "pong"
}

#[tauri::command]
async fn load_workspace(
    state: tauri::State<'_, AppState>,
) -> Result<WorkspaceSnapshotResponse, String> {
    load_workspace_impl(state.inner())
        .await
        .map_err(|error| state.command_error("load_workspace", &error))
}

#[tauri::command]
async fn create_task(
    state: tauri::State<'_, AppState>,
    text: String,
    backlog: Option<bool>,
) -> Result<Option<Task>, String> {
    create_task_impl(state.inner(), text, backlog.unwrap_or(false))
        .await
        .map_err(|error| state.command_error("create_task", &error))
}

#[tauri::command]
async fn create_scheduled_task(
    state: tauri::State<'_, AppState>,
    text: String,
    date: String,
    hour: u32,
) -> Result<Option<Task>, String> {
    create_scheduled_task_impl(state.inner(), text, date, hour)
        .await
        .map_err(|error| state.command_error("create_scheduled_task", &error))
}

#[tauri::command]
fn list_tasks(
    state: tauri::State<'_, AppState>,
    date: Option<String>,
) -> Result<Vec<Task>, String> {
    list_tasks_impl(state.inner(), date).map_err(|error| state.command_error("list_tasks", &error))
}

#[tauri::command]
fn list_backlog(state: tauri::State<'_, AppState>) -> Result<Vec<Task>, String> {
    list_backlog_impl(state.inner()).map_err(|error| state.command_error("list_backlog", &error))
}

#[tauri::command]
fn list_scheduled(state: tauri::State<'_, AppState>, date: String) -> Result<Vec<Task>, String> {
    list_scheduled_impl(state.inner(), date)
        .map_err(|error| state.command_error("list_scheduled", &error))
}

#[tauri::command]
async fn edit_task(
    state: tauri::State<'_, AppState>,
    task_id: String,
    text: String,
) -> Result<Option<Task>, String> {
    edit_task_impl(state.inner(), task_id, text)
        .await
        .map_err(|error| state.command_error("edit_task", &error))
}

#[tauri::command]
async fn toggle_task_completed(
    state: tauri::State<'_, AppState>,
    task_id: String,
) -> Result<Task, String> {
    toggle_task_completed_impl(state.inner(), task_id)
        .await
        .map_err(|error| state.command_error("toggle_task_completed", &error))
}

#[tauri::command]
async fn delete_task(state: tauri::State<'_, AppState>, task_id: String) -> Result<bool, String> {
    delete_task_impl(state.inner(), task_id)
        .await
        .map_err(|error| state.command_error("delete_task", &error))
}

#[tauri::command]
fn list_trash(state: tauri::State<'_, AppState>) -> Result<Vec<TrashedTask>, String> {
    list_trash_impl(state.inner()).map_err(|error| state.command_error("list_trash", &error))
}

#[tauri::command]
async fn restore_task(
    state: tauri::State<'_, AppState>,
    trashed_id: String,
) -> Result<Option<Task>, String> {
    restore_task_impl(state.inner(), trashed_id)
        .await
        .map_err(|error| state.command_error("restore_task", &error))
}

#[tauri::command]
async fn delete_task_forever(
    state: tauri::State<'_, AppState>,
    trashed_id: String,
) -> Result<bool, String> {
    delete_task_forever_impl(state.inner(), trashed_id)
        .await
        .map_err(|error| state.command_error("delete_task_forever", &error))
}

#[tauri::command]
async fn clear_trash(state: tauri::State<'_, AppState>) -> Result<usize, String> {
    clear_trash_impl(state.inner())
        .await
        .map_err(|error| state.command_error("clear_trash", &error))
}

#[tauri::command]
async fn promote_task(state: tauri::State<'_, AppState>, task_id: String) -> Result<Task, String> {
    promote_task_impl(state.inner(), task_id)
        .await
        .map_err(|error| state.command_error("promote_task", &error))
}

#[tauri::command]
async fn move_task_to_backlog(
    state: tauri::State<'_, AppState>,
    task_id: String,
) -> Result<Task, String> {
    move_task_to_backlog_impl(state.inner(), task_id)
        .await
        .map_err(|error| state.command_error("move_task_to_backlog", &error))
}

#[tauri::command]
fn list_yesterday(state: tauri::State<'_, AppState>) -> Result<Vec<Task>, String> {
    list_yesterday_impl(state.inner())
        .map_err(|error| state.command_error("list_yesterday", &error))
}

#[tauri::command]
async fn carry_over_yesterday(state: tauri::State<'_, AppState>) -> Result<Vec<Task>, String> {
    carry_over_yesterday_impl(state.inner())
        .await
        .map_err(|error| state.command_error("carry_over_yesterday", &error))
}

#[tauri::command]
async fn dismiss_yesterday(state: tauri::State<'_, AppState>) -> Result<usize, String> {
    dismiss_yesterday_impl(state.inner())
        .await
        .map_err(|error| state.command_error("dismiss_yesterday", &error))
}

#[tauri::command]
async fn toggle_favorite(
    state: tauri::State<'_, AppState>,
    text: String,
) -> Result<Vec<Favorite>, String> {
    toggle_favorite_impl(state.inner(), text)
        .await
        .map_err(|error| state.command_error("toggle_favorite", &error))
}

#[tauri::command]
fn list_favorites(state: tauri::State<'_, AppState>) -> Result<Vec<Favorite>, String> {
    list_favorites_impl(state.inner())
        .map_err(|error| state.command_error("list_favorites", &error))
}

#[tauri::command]
async fn add_favorite_to_today(
    state: tauri::State<'_, AppState>,
    favorite_id: String,
) -> Result<Option<Task>, String> {
    add_favorite_to_today_impl(state.inner(), favorite_id)
        .await
        .map_err(|error| state.command_error("add_favorite_to_today", &error))
}

#[tauri::command]
async fn add_all_favorites(state: tauri::State<'_, AppState>) -> Result<Vec<Task>, String> {
    add_all_favorites_impl(state.inner())
        .await
        .map_err(|error| state.command_error("add_all_favorites", &error))
}

#[tauri::command]
async fn delete_favorite(
    state: tauri::State<'_, AppState>,
    favorite_id: String,
) -> Result<bool, String> {
    delete_favorite_impl(state.inner(), favorite_id)
        .await
        .map_err(|error| state.command_error("delete_favorite", &error))
}

#[tauri::command]
fn begin_timer_setup(
    state: tauri::State<'_, AppState>,
    task_id: String,
) -> Result<TimerStateResponse, String> {
    begin_timer_setup_impl(state.inner(), task_id)
        .map_err(|error| state.command_error("begin_timer_setup", &error))
}

#[tauri::command]
fn set_timer_draft(
    state: tauri::State<'_, AppState>,
    hours: Option<String>,
    minutes: Option<String>,
    seconds: Option<String>,
) -> Result<DurationDraftResponse, String> {
    set_timer_draft_impl(state.inner(), hours, minutes, seconds)
        .map_err(|error| state.command_error("set_timer_draft", &error))
}

#[tauri::command]
fn cancel_timer_setup(state: tauri::State<'_, AppState>) -> Result<TimerStateResponse, String> {
    cancel_timer_setup_impl(state.inner())
        .map_err(|error| state.command_error("cancel_timer_setup", &error))
}

#[tauri::command]
fn start_timer(state: tauri::State<'_, AppState>) -> Result<TimerStateResponse, String> {
    start_timer_impl(state.inner()).map_err(|error| state.command_error("start_timer", &error))
}

#[tauri::command]
fn tick_timer(state: tauri::State<'_, AppState>) -> Result<TimerTickResponse, String> {
    tick_timer_impl(state.inner()).map_err(|error| state.command_error("tick_timer", &error))
}

#[tauri::command]
fn pause_timer(state: tauri::State<'_, AppState>) -> Result<TimerStateResponse, String> {
    pause_timer_impl(state.inner()).map_err(|error| state.command_error("pause_timer", &error))
}

#[tauri::command]
fn resume_timer(state: tauri::State<'_, AppState>) -> Result<TimerStateResponse, String> {
    resume_timer_impl(state.inner()).map_err(|error| state.command_error("resume_timer", &error))
}

#[tauri::command]
async fn complete_timer(state: tauri::State<'_, AppState>) -> Result<TimerTickResponse, String> {
    complete_timer_impl(state.inner())
        .await
        .map_err(|error| state.command_error("complete_timer", &error))
}

#[tauri::command]
fn repeat_timer(state: tauri::State<'_, AppState>) -> Result<TimerStateResponse, String> {
    repeat_timer_impl(state.inner()).map_err(|error| state.command_error("repeat_timer", &error))
}

#[tauri::command]
fn get_timer_state(state: tauri::State<'_, AppState>) -> Result<TimerStateResponse, String> {
    get_timer_state_impl(state.inner())
        .map_err(|error| state.command_error("get_timer_state", &error))
}

#[tauri::command]
fn begin_task_drag(state: tauri::State<'_, AppState>, task_id: String) -> Result<bool, String> {
    begin_task_drag_impl(state.inner(), task_id)
        .map_err(|error| state.command_error("begin_task_drag", &error))
}

#[tauri::command]
fn hover_task_drag(
    state: tauri::State<'_, AppState>,
    target_id: String,
) -> Result<Option<String>, String> {
    hover_task_drag_impl(state.inner(), target_id)
        .map_err(|error| state.command_error("hover_task_drag", &error))
}

#[tauri::command]
fn cancel_task_drag(state: tauri::State<'_, AppState>) -> Result<(), String> {
    cancel_task_drag_impl(state.inner())
        .map_err(|error| state.command_error("cancel_task_drag", &error))
}

#[tauri::command]
async fn drop_task_drag(state: tauri::State<'_, AppState>) -> Result<Vec<Task>, String> {
    drop_task_drag_impl(state.inner())
        .await
        .map_err(|error| state.command_error("drop_task_drag", &error))
}

#[tauri::command]
async fn schedule_task_at_hour(
    state: tauri::State<'_, AppState>,
    task_id: String,
    date: String,
    hour: u32,
) -> Result<Task, String> {
    schedule_task_at_hour_impl(state.inner(), task_id, date, hour)
        .await
        .map_err(|error| state.command_error("schedule_task_at_hour", &error))
}

#[tauri::command]
async fn schedule_task_all_day(
    state: tauri::State<'_, AppState>,
    task_id: String,
    date: String,
) -> Result<Task, String> {
    schedule_task_all_day_impl(state.inner(), task_id, date)
        .await
        .map_err(|error| state.command_error("schedule_task_all_day", &error))
}

#[tauri::command]
async fn clear_task_schedule(
    state: tauri::State<'_, AppState>,
    task_id: String,
) -> Result<Task, String> {
    clear_task_schedule_impl(state.inner(), task_id)
        .await
        .map_err(|error| state.command_error("clear_task_schedule", &error))
}

#[tauri::command]
fn begin_task_resize(
    state: tauri::State<'_, AppState>,
    task_id: String,
    pointer_y: f64,
) -> Result<ResizePreviewResponse, String> {
    begin_task_resize_impl(state.inner(), task_id, pointer_y)
        .map_err(|error| state.command_error("begin_task_resize", &error))
}

#[tauri::command]
fn preview_task_resize(
    state: tauri::State<'_, AppState>,
    pointer_y: f64,
) -> Result<ResizePreviewResponse, String> {
    preview_task_resize_impl(state.inner(), pointer_y)
        .map_err(|error| state.command_error("preview_task_resize", &error))
}

#[tauri::command]
async fn commit_task_resize(
    state: tauri::State<'_, AppState>,
    pointer_y: f64,
) -> Result<Option<Task>, String> {
    commit_task_resize_impl(state.inner(), pointer_y)
        .await
        .map_err(|error| state.command_error("commit_task_resize", &error))
}

#[tauri::command]
fn cancel_task_resize(state: tauri::State<'_, AppState>) -> Result<(), String> {
    cancel_task_resize_impl(state.inner())
        .map_err(|error| state.command_error("cancel_task_resize", &error))
}

#[tauri::command]
fn list_notes(
    state: tauri::State<'_, AppState>,
    query: Option<String>,
) -> Result<Vec<Note>, String> {
    list_notes_impl(state.inner(), query).map_err(|error| state.command_error("list_notes", &error))
}

#[tauri::command]
async fn create_note(
    state: tauri::State<'_, AppState>,
    title: String,
    content: String,
) -> Result<Note, String> {
    create_note_impl(state.inner(), title, content)
        .await
        .map_err(|error| state.command_error("create_note", &error))
}

#[tauri::command]
async fn update_note(
    state: tauri::State<'_, AppState>,
    note_id: String,
    title: Option<String>,
    content: Option<String>,
) -> Result<Note, String> {
    update_note_impl(state.inner(), note_id, title, content)
        .await
        .map_err(|error| state.command_error("update_note", &error))
}

#[tauri::command]
async fn delete_note(state: tauri::State<'_, AppState>, note_id: String) -> Result<bool, String> {
    delete_note_impl(state.inner(), note_id)
        .await
        .map_err(|error| state.command_error("delete_note", &error))
}

#[tauri::command]
fn get_history(state: tauri::State<'_, AppState>) -> Result<Vec<HistoryDayResponse>, String> {
    get_history_impl(state.inner()).map_err(|error| state.command_error("get_history", &error))
}

#[tauri::command]
fn get_productivity_summary(
    state: tauri::State<'_, AppState>,
) -> Result<ProductivitySummaryResponse, String> {
    get_productivity_summary_impl(state.inner())
        .map_err(|error| state.command_error("get_productivity_summary", &error))
}

#[tauri::command]
fn get_dark_mode(state: tauri::State<'_, AppState>) -> Result<Option<bool>, String> {
    get_dark_mode_impl(state.inner()).map_err(|error| state.command_error("get_dark_mode", &error))
}

#[tauri::command]
fn set_dark_mode(state: tauri::State<'_, AppState>, enabled: bool) -> Result<(), String> {
    set_dark_mode_impl(state.inner(), enabled)
        .map_err(|error| state.command_error("set_dark_mode", &error))
}

#[tauri::command]
async fn sign_in(
    state: tauri::State<'_, AppState>,
    email: String,
    password: String,
) -> Result<AuthOutcome, String> {
    sign_in_impl(state.inner(), email, password)
        .await
        .map_err(|error| state.command_error("sign_in", &error))
}

#[tauri::command]
async fn sign_up(
    state: tauri::State<'_, AppState>,
    email: String,
    password: String,
) -> Result<AuthOutcome, String> {
    sign_up_impl(state.inner(), email, password)
        .await
        .map_err(|error| state.command_error("sign_up", &error))
}

#[tauri::command]
async fn send_magic_link(
    state: tauri::State<'_, AppState>,
    email: String,
) -> Result<AuthOutcome, String> {
    send_magic_link_impl(state.inner(), email)
        .await
        .map_err(|error| state.command_error("send_magic_link", &error))
}

#[tauri::command]
async fn sign_out(state: tauri::State<'_, AppState>) -> Result<(), String> {
    sign_out_impl(state.inner())
        .await
        .map_err(|error| state.command_error("sign_out", &error))
}

#[tauri::command]
async fn get_session(
    state: tauri::State<'_, AppState>,
) -> Result<Option<SessionInfoResponse>, String> {
    get_session_impl(state.inner())
        .await
        .map_err(|error| state.command_error("get_session", &error))
}

/// Drives the countdown at 1 Hz and pushes each transition to the webview.
/// Idle sessions stay silent so the event stream carries signal only.
fn spawn_timer_loop(handle: tauri::AppHandle) {
    const SWEEP_EVERY_TICKS: u64 = 3_600;

    tauri::async_runtime::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut ticks: u64 = 0;
        loop {
            interval.tick().await;
            let state = handle.state::<AppState>();
            match tick_timer_impl(state.inner()) {
                Ok(response) => {
                    if response.state.phase == "running" || response.state.alert_active {
                        let _ = handle.emit("timer://tick", &response);
                    }
                }
                Err(error) => state.log_error("tick_timer", &error.to_string()),
            }

            ticks += 1;
            if ticks % SWEEP_EVERY_TICKS == 0 {
                if let Err(error) = sweep_trash_impl(state.inner()) {
                    state.log_error("sweep_trash", &error.to_string());
                }
            }
        }
    });
}

pub fn run() {
    let workspace_root = std::env::current_dir().expect("failed to resolve current directory");
    let app_state = AppState::new(workspace_root).expect("failed to initialize app state");

    tauri::Builder::default()
        .manage(app_state)
        .setup(|app| {
            spawn_timer_loop(app.handle().clone());
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            ping,
            bootstrap,
            load_workspace,
            create_task,
            create_scheduled_task,
            list_tasks,
            list_backlog,
            list_scheduled,
            edit_task,
            toggle_task_completed,
            delete_task,
            list_trash,
            restore_task,
            delete_task_forever,
            clear_trash,
            promote_task,
            move_task_to_backlog,
            list_yesterday,
            carry_over_yesterday,
            dismiss_yesterday,
            toggle_favorite,
            list_favorites,
            add_favorite_to_today,
            add_all_favorites,
            delete_favorite,
            begin_timer_setup,
            set_timer_draft,
            cancel_timer_setup,
            start_timer,
            tick_timer,
            pause_timer,
            resume_timer,
            complete_timer,
            repeat_timer,
            get_timer_state,
            begin_task_drag,
            hover_task_drag,
            cancel_task_drag,
            drop_task_drag,
            schedule_task_at_hour,
            schedule_task_all_day,
            clear_task_schedule,
            begin_task_resize,
            preview_task_resize,
            commit_task_resize,
            cancel_task_resize,
            list_notes,
            create_note,
            update_note,
            delete_note,
            get_history,
            get_productivity_summary,
            get_dark_mode,
            set_dark_mode,
            sign_in,
            sign_up,
            send_magic_link,
            sign_out,
            get_session
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}
