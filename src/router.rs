use std::path::Path;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::channels::Channel;
use crate::schedule::{self, ScheduleError, ScheduleSnapshot};

/// Route one inbound chat message. Non-command text is ignored. Schedule
/// queries re-read the file on every request, so edits apply without a
/// restart and a broken file only costs the requests made while it is
/// broken.
pub async fn dispatch(text: &str, reply: &dyn Channel, schedule_path: &Path, tz: Tz) {
    if text.starts_with("$hello") {
        send(reply, "Hello!").await;
        return;
    }

    if text.starts_with("!status") || text.starts_with("!lessons") {
        let snapshot = match schedule::load(schedule_path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %schedule_path.display(), "Schedule lookup failed: {}", e);
                send(reply, &schedule_error_reply(&e, schedule_path)).await;
                return;
            }
        };

        let now = Utc::now().with_timezone(&tz);
        if text.starts_with("!status") {
            send(reply, &status_reply(&snapshot, now)).await;
        } else {
            send(reply, &schedule::format_day(&snapshot, now)).await;
        }
    }
}

/// The in-or-out-of-class summary for `!status`.
fn status_reply(snapshot: &ScheduleSnapshot, now: DateTime<Tz>) -> String {
    match schedule::current_session(snapshot, now) {
        Some(slot) => format!(" **in college** doing **{}**.", slot.course),
        None => format!(
            " **not at college** (Checked at {} {})",
            now.format("%A at %H:%M"),
            now.format("%Z"),
        ),
    }
}

/// Requester-facing wording per failure class. None of these stop the
/// process; the next request simply tries the file again.
fn schedule_error_reply(err: &ScheduleError, path: &Path) -> String {
    match err {
        ScheduleError::NotFound(_) => format!(
            " err: The schedule file (`{}`) was not found. Please contact the bot owner.",
            path.display()
        ),
        ScheduleError::Malformed(_) => {
            "err: Could not read the schedule. Check if the JSON file is correctly formatted."
                .to_string()
        }
        ScheduleError::Io(e) => format!("err An unexpected error occurred: {}", e),
    }
}

async fn send(reply: &dyn Channel, text: &str) {
    if let Err(e) = reply.send_text(text).await {
        warn!("Failed to send reply: {}", e);
    }
}
