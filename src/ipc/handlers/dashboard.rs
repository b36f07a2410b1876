use crate::dashboard::{aggregate, derive_todays_classes, Announcement, Enrollment, Weekday};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::Datelike;
use rusqlite::OptionalExtension;
use serde_json::json;

use super::{announcements, enrollments};

const RECENT_ANNOUNCEMENT_LIMIT: usize = 2;

fn handle_dashboard_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };

    // Tests and the frontend's "preview another day" view pass an
    // explicit day; the normal dashboard render omits it.
    let today: Weekday = match req.params.get("dayOfWeek").and_then(|v| v.as_str()) {
        Some(raw) => match Weekday::parse(raw) {
            Some(d) => d,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("dayOfWeek must be a canonical weekday name, got {:?}", raw),
                    None,
                )
            }
        },
        None => chrono::Local::now().weekday().into(),
    };

    // Three independent reads; none depends on another's result.
    let profile: Option<(String, String)> = match conn
        .query_row(
            "SELECT name, email FROM users WHERE id = ?",
            [&student_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some((name, email)) = profile else {
        return err(&req.id, "not_found", "student not found", None);
    };

    let records = match enrollments::load_for_student(conn, &student_id) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let announcement_rows = match announcements::load_for_student(conn, &student_id) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let enrollment_list: Vec<Enrollment> =
        records.into_iter().map(|r| r.enrollment).collect();
    let announcement_list: Vec<Announcement> = announcement_rows
        .iter()
        .map(|r| r.announcement.clone())
        .collect();

    let derived = derive_todays_classes(&enrollment_list, today);
    // The counter reflects every fetched announcement; only the display
    // list below is truncated.
    let summary = aggregate(&enrollment_list, &announcement_list, &derived.meetings);

    let recent = announcement_rows
        .iter()
        .take(RECENT_ANNOUNCEMENT_LIMIT)
        .map(announcements::row_json)
        .collect::<Vec<_>>();

    ok(
        &req.id,
        json!({
            "user": { "userId": student_id, "name": name, "email": email },
            "dayOfWeek": today.as_str(),
            "summary": summary,
            "todaysClasses": derived.meetings,
            "recentAnnouncements": recent,
            "skippedSchedules": derived.skipped,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.open" => Some(handle_dashboard_open(state, req)),
        _ => None,
    }
}
