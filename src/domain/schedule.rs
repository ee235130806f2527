use chrono::{DateTime, NaiveDate, TimeZone, Utc};

pub const PIXELS_PER_HOUR: f64 = 64.0;
pub const MIN_DURATION_MINUTES: u32 = 15;
pub const DEFAULT_DURATION_MINUTES: u32 = 60;
pub const ALL_DAY_DEFAULT_HOUR: u32 = 9;

/// Snap a raw minute count to the nearest quarter hour, never below the
/// minimum slot height.
pub fn quantize_duration(raw_minutes: f64) -> u32 {
    let steps = (raw_minutes / MIN_DURATION_MINUTES as f64).round();
    let snapped = steps * MIN_DURATION_MINUTES as f64;
    if snapped < MIN_DURATION_MINUTES as f64 {
        MIN_DURATION_MINUTES
    } else {
        snapped as u32
    }
}

/// UTC instant for an hour cell on the calendar grid.
pub fn slot_start(day: NaiveDate, hour: u32) -> Option<DateTime<Utc>> {
    day.and_hms_opt(hour, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn all_day_slot_start(day: NaiveDate) -> Option<DateTime<Utc>> {
    slot_start(day, ALL_DAY_DEFAULT_HOUR)
}

/// In-flight list drag. Lives from pointer-down on a task until drop or
/// cancel; the hover target is re-pointed as the pointer crosses rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    source_id: String,
    hover_target_id: Option<String>,
}

impl DragSession {
    pub fn begin(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            hover_target_id: None,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn hover_target_id(&self) -> Option<&str> {
        self.hover_target_id.as_deref()
    }

    pub fn hover(&mut self, target_id: &str) {
        if target_id == self.source_id {
            self.hover_target_id = None;
        } else {
            self.hover_target_id = Some(target_id.to_string());
        }
    }

    pub fn leave(&mut self) {
        self.hover_target_id = None;
    }

    /// Consume the session, yielding the (source, target) pair when the drop
    /// lands on a different task.
    pub fn drop_on_target(self) -> Option<(String, String)> {
        let target = self.hover_target_id?;
        Some((self.source_id, target))
    }
}

/// Splice `source_id` to `target_id`'s slot and return the full contiguous
/// 0-based position assignment for the day. `None` when nothing moves.
pub fn reorder_by_drop(
    ordered_ids: &[String],
    source_id: &str,
    target_id: &str,
) -> Option<Vec<(String, i64)>> {
    if source_id == target_id {
        return None;
    }
    let source_index = ordered_ids.iter().position(|id| id == source_id)?;
    let target_index = ordered_ids.iter().position(|id| id == target_id)?;

    let mut spliced: Vec<&String> = ordered_ids.iter().collect();
    let moved = spliced.remove(source_index);
    spliced.insert(target_index.min(spliced.len()), moved);

    Some(
        spliced
            .into_iter()
            .enumerate()
            .map(|(position, id)| (id.clone(), position as i64))
            .collect(),
    )
}

/// In-flight duration resize of a scheduled task. The preview recomputes from
/// the pointer's total vertical travel, so intermediate moves do not
/// accumulate rounding error.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeSession {
    task_id: String,
    start_y: f64,
    original_duration_minutes: u32,
}

impl ResizeSession {
    pub fn begin(task_id: impl Into<String>, start_y: f64, original_duration_minutes: u32) -> Self {
        Self {
            task_id: task_id.into(),
            start_y,
            original_duration_minutes,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn preview(&self, current_y: f64) -> u32 {
        let delta_minutes =
            (current_y - self.start_y) / PIXELS_PER_HOUR * 60.0;
        quantize_duration(self.original_duration_minutes as f64 + delta_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn quantize_rounds_half_up_at_step_boundaries() {
        assert_eq!(quantize_duration(22.0), 15);
        assert_eq!(quantize_duration(23.0), 30);
        assert_eq!(quantize_duration(7.5), 15);
        assert_eq!(quantize_duration(0.0), 15);
        assert_eq!(quantize_duration(-40.0), 15);
        assert_eq!(quantize_duration(60.0), 60);
        assert_eq!(quantize_duration(52.5), 60);
    }

    #[test]
    fn resize_preview_maps_pixels_to_quarter_hours() {
        let session = ResizeSession::begin("tsk-1", 100.0, 60);
        // 64 px per hour: +32 px is +30 minutes.
        assert_eq!(session.preview(132.0), 90);
        assert_eq!(session.preview(100.0), 60);
        assert_eq!(session.preview(68.0), 30);
        // Dragging far above the origin clamps at the minimum.
        assert_eq!(session.preview(-500.0), MIN_DURATION_MINUTES);
    }

    #[test]
    fn resize_preview_recomputes_from_origin_each_time() {
        let session = ResizeSession::begin("tsk-1", 0.0, 60);
        assert_eq!(session.preview(5.0), 60);
        assert_eq!(session.preview(10.0), 75);
        assert_eq!(session.preview(5.0), 60);
    }

    #[test]
    fn drag_session_tracks_hover_and_ignores_self() {
        let mut drag = DragSession::begin("a");
        drag.hover("b");
        assert_eq!(drag.hover_target_id(), Some("b"));
        drag.hover("a");
        assert_eq!(drag.hover_target_id(), None);
        drag.hover("c");
        drag.leave();
        assert_eq!(drag.hover_target_id(), None);
    }

    #[test]
    fn drop_without_target_cancels() {
        let drag = DragSession::begin("a");
        assert!(drag.drop_on_target().is_none());
    }

    #[test]
    fn reorder_moves_source_to_target_slot() {
        let list = ids(&["a", "b", "c"]);
        let assigned = reorder_by_drop(&list, "a", "c").expect("reorder");
        assert_eq!(
            assigned,
            vec![
                ("b".to_string(), 0),
                ("c".to_string(), 1),
                ("a".to_string(), 2)
            ]
        );

        let assigned = reorder_by_drop(&list, "c", "a").expect("reorder");
        assert_eq!(
            assigned,
            vec![
                ("c".to_string(), 0),
                ("a".to_string(), 1),
                ("b".to_string(), 2)
            ]
        );
    }

    #[test]
    fn reorder_on_self_or_unknown_id_is_noop() {
        let list = ids(&["a", "b", "c"]);
        assert!(reorder_by_drop(&list, "a", "a").is_none());
        assert!(reorder_by_drop(&list, "a", "missing").is_none());
        assert!(reorder_by_drop(&list, "missing", "b").is_none());
    }

    #[test]
    fn slot_start_builds_utc_hour_cells() {
        let day = NaiveDate::from_ymd_opt(2026, 2, 17).expect("valid date");
        let slot = slot_start(day, 14).expect("valid slot");
        assert_eq!(slot.to_rfc3339(), "2026-02-17T14:00:00+00:00");
        assert!(slot_start(day, 24).is_none());

        let all_day = all_day_slot_start(day).expect("valid slot");
        assert_eq!(all_day.to_rfc3339(), "2026-02-17T09:00:00+00:00");
    }

    // Property: quantized durations are aligned, bounded below, and within
    // one step of the raw value
    proptest! {
        #[test]
        fn quantization_bounds(raw in -600.0f64..600.0f64) {
            let quantized = quantize_duration(raw);
            prop_assert!(quantized >= MIN_DURATION_MINUTES);
            prop_assert_eq!(quantized % MIN_DURATION_MINUTES, 0);
            if raw >= MIN_DURATION_MINUTES as f64 {
                prop_assert!((quantized as f64 - raw).abs() <= MIN_DURATION_MINUTES as f64 / 2.0);
            }
        }
    }

    // Property: reordering permutes the list and keeps positions contiguous
    proptest! {
        #[test]
        fn reorder_preserves_membership_and_contiguity(
            size in 2usize..12,
            source in 0usize..12,
            target in 0usize..12
        ) {
            let source = source % size;
            let target = target % size;
            prop_assume!(source != target);

            let list: Vec<String> = (0..size).map(|index| format!("tsk-{index}")).collect();
            let assigned = reorder_by_drop(&list, &list[source], &list[target])
                .expect("valid reorder");

            prop_assert_eq!(assigned.len(), size);
            for (position, (_, assigned_position)) in assigned.iter().enumerate() {
                prop_assert_eq!(*assigned_position, position as i64);
            }
            let mut names: Vec<&str> = assigned.iter().map(|(id, _)| id.as_str()).collect();
            names.sort_unstable();
            let mut expected: Vec<&str> = list.iter().map(String::as_str).collect();
            expected.sort_unstable();
            prop_assert_eq!(names, expected);
            prop_assert_eq!(
                assigned[target].0.as_str(),
                list[source].as_str()
            );
        }
    }
}
