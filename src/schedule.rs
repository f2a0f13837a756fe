use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveTime};
use chrono_tz::Tz;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// One scheduled time window. `start` and `end` stay exactly as written in
/// the file; they are parsed as `%H:%M` times when matched and printed
/// verbatim by the formatter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClassSlot {
    pub start: String,
    pub end: String,
    pub course: String,
}

/// A week of slots keyed by weekday name ("Monday" … "Sunday"). Read fresh
/// from disk on every query, never cached.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ScheduleSnapshot {
    days: HashMap<String, Vec<ClassSlot>>,
}

impl ScheduleSnapshot {
    /// Slots for a weekday, in file order. An absent day is an empty
    /// sequence, not an error.
    pub fn slots_for(&self, day: &str) -> &[ClassSlot] {
        self.days.get(day).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Why a schedule query could not be answered. The chat layer words a
/// user-visible reply per variant; none of these are fatal to the process.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("schedule file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("schedule file is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("failed to read schedule file: {0}")]
    Io(#[from] std::io::Error),
}

pub fn load(path: &Path) -> Result<ScheduleSnapshot, ScheduleError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ScheduleError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(ScheduleError::Io(e)),
    };
    Ok(serde_json::from_str(&raw)?)
}

const SLOT_TIME_FORMAT: &str = "%H:%M";

/// Return the slot covering `now`, if any. Scans the weekday's slots in
/// file order and takes the first whose inclusive [start, end] range
/// contains the time of day; overlaps resolve to the earlier entry. Slots
/// with unparseable times are logged and skipped, never fatal.
pub fn current_session<'a>(
    snapshot: &'a ScheduleSnapshot,
    now: DateTime<Tz>,
) -> Option<&'a ClassSlot> {
    let day = now.format("%A").to_string();
    let time = now.time();

    for slot in snapshot.slots_for(&day) {
        let start = match NaiveTime::parse_from_str(&slot.start, SLOT_TIME_FORMAT) {
            Ok(t) => t,
            Err(e) => {
                warn!(course = %slot.course, start = %slot.start, "Skipping slot with bad start time: {}", e);
                continue;
            }
        };
        let end = match NaiveTime::parse_from_str(&slot.end, SLOT_TIME_FORMAT) {
            Ok(t) => t,
            Err(e) => {
                warn!(course = %slot.course, end = %slot.end, "Skipping slot with bad end time: {}", e);
                continue;
            }
        };
        if start <= time && time <= end {
            return Some(slot);
        }
    }
    None
}

/// Render the day's agenda: a weekday/time-zone header plus one line per
/// slot in file order, or a single "no lessons" sentence for an empty day.
pub fn format_day(snapshot: &ScheduleSnapshot, now: DateTime<Tz>) -> String {
    let day = now.format("%A").to_string();
    let tz_name = now.format("%Z").to_string();
    let slots = snapshot.slots_for(&day);

    if slots.is_empty() {
        return format!("no lessons for **{}**", day);
    }

    let mut lines = vec![format!("**lessons for {} (Time Zone: {}):**", day, tz_name)];
    for slot in slots {
        lines.push(format!("• **{} - {}**: {}", slot.start, slot.end, slot.course));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::London;
    use std::io::Write;

    fn slot(start: &str, end: &str, course: &str) -> ClassSlot {
        ClassSlot {
            start: start.to_string(),
            end: end.to_string(),
            course: course.to_string(),
        }
    }

    fn snapshot_for(day: &str, slots: Vec<ClassSlot>) -> ScheduleSnapshot {
        let mut days = HashMap::new();
        days.insert(day.to_string(), slots);
        ScheduleSnapshot { days }
    }

    // 2024-01-08 is a Monday; January keeps London on GMT.
    fn monday_at(hour: u32, min: u32, sec: u32) -> DateTime<Tz> {
        London.with_ymd_and_hms(2024, 1, 8, hour, min, sec).unwrap()
    }

    #[test]
    fn matches_a_time_inside_a_slot() {
        let snapshot = snapshot_for("Monday", vec![slot("09:00", "10:30", "Maths")]);
        let found = current_session(&snapshot, monday_at(9, 45, 0))
            .expect("09:45 falls inside 09:00-10:30");
        assert_eq!(found.course, "Maths");
    }

    #[test]
    fn slot_boundaries_are_inclusive() {
        let snapshot = snapshot_for("Monday", vec![slot("09:00", "10:30", "Maths")]);
        assert!(
            current_session(&snapshot, monday_at(9, 0, 0)).is_some(),
            "start boundary counts as in session"
        );
        assert!(
            current_session(&snapshot, monday_at(10, 30, 0)).is_some(),
            "end boundary counts as in session"
        );
        assert!(
            current_session(&snapshot, monday_at(10, 31, 0)).is_none(),
            "one minute past the end is out of session"
        );
    }

    #[test]
    fn no_match_outside_every_slot() {
        let snapshot = snapshot_for(
            "Monday",
            vec![slot("09:00", "10:30", "Maths"), slot("13:15", "14:45", "Physics")],
        );
        assert!(current_session(&snapshot, monday_at(11, 0, 0)).is_none());
        assert!(current_session(&snapshot, monday_at(8, 59, 59)).is_none());
    }

    #[test]
    fn absent_weekday_is_an_empty_day() {
        let snapshot = snapshot_for("Tuesday", vec![slot("09:00", "10:30", "Maths")]);
        assert!(current_session(&snapshot, monday_at(9, 30, 0)).is_none());
        assert!(snapshot.slots_for("Monday").is_empty());
    }

    #[test]
    fn malformed_slot_is_skipped_not_fatal() {
        let snapshot = snapshot_for(
            "Monday",
            vec![slot("late", "early", "Broken"), slot("09:00", "10:30", "Maths")],
        );
        let found = current_session(&snapshot, monday_at(9, 30, 0))
            .expect("scan should continue past the malformed slot");
        assert_eq!(found.course, "Maths");
    }

    #[test]
    fn overlapping_slots_resolve_to_the_first_in_file_order() {
        let snapshot = snapshot_for(
            "Monday",
            vec![slot("09:00", "12:00", "Maths"), slot("09:30", "10:00", "Physics")],
        );
        let found = current_session(&snapshot, monday_at(9, 45, 0))
            .expect("09:45 is inside both slots");
        assert_eq!(found.course, "Maths", "first match in insertion order wins");
    }

    #[test]
    fn empty_day_formats_as_the_no_lessons_sentence() {
        let snapshot = ScheduleSnapshot::default();
        assert_eq!(
            format_day(&snapshot, monday_at(9, 0, 0)),
            "no lessons for **Monday**"
        );
    }

    #[test]
    fn format_day_lists_slots_in_file_order() {
        let snapshot = snapshot_for(
            "Monday",
            vec![slot("13:15", "14:45", "Physics"), slot("09:00", "10:30", "Maths")],
        );
        assert_eq!(
            format_day(&snapshot, monday_at(9, 0, 0)),
            "**lessons for Monday (Time Zone: GMT):**\n\
             • **13:15 - 14:45**: Physics\n\
             • **09:00 - 10:30**: Maths"
        );
    }

    #[test]
    fn load_reports_a_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load(&dir.path().join("sched.json")).expect_err("missing file should fail");
        assert!(matches!(err, ScheduleError::NotFound(_)), "got {:?}", err);
    }

    #[test]
    fn load_reports_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{ definitely not json").expect("write");
        let err = load(file.path()).expect_err("malformed JSON should fail");
        assert!(matches!(err, ScheduleError::Malformed(_)), "got {:?}", err);
    }

    #[test]
    fn load_parses_the_schedule_shape() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"Monday": [{{"start": "09:00", "end": "10:30", "course": "Maths"}}]}}"#
        )
        .expect("write");
        let snapshot = load(file.path()).expect("valid schedule should load");
        assert_eq!(snapshot.slots_for("Monday"), &[slot("09:00", "10:30", "Maths")]);
        assert!(snapshot.slots_for("Tuesday").is_empty());
    }

    mod proptest_matcher {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn matcher_never_panics_on_arbitrary_slot_text(
                start in "\\PC{0,8}",
                end in "\\PC{0,8}",
                course in "[a-zA-Z ]{1,16}",
            ) {
                let snapshot = snapshot_for("Monday", vec![ClassSlot { start, end, course }]);
                let _ = current_session(&snapshot, monday_at(9, 0, 0));
                let _ = format_day(&snapshot, monday_at(9, 0, 0));
            }

            #[test]
            fn degenerate_single_minute_slots_match_their_own_boundary(
                hour in 0u32..24,
                minute in 0u32..60,
            ) {
                let at = format!("{:02}:{:02}", hour, minute);
                let snapshot = snapshot_for(
                    "Monday",
                    vec![ClassSlot { start: at.clone(), end: at, course: "x".to_string() }],
                );
                prop_assert!(current_session(&snapshot, monday_at(hour, minute, 0)).is_some());
            }
        }
    }
}
