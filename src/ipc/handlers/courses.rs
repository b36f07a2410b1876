use crate::dashboard::Weekday;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn is_hhmmss(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 8
        && b[0].is_ascii_digit()
        && b[1].is_ascii_digit()
        && b[2] == b':'
        && b[3].is_ascii_digit()
        && b[4].is_ascii_digit()
        && b[5] == b':'
        && b[6].is_ascii_digit()
        && b[7].is_ascii_digit()
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let code = match req.params.get("code").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing code", None),
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if code.is_empty() || name.is_empty() {
        return err(&req.id, "bad_params", "code and name must not be empty", None);
    }
    let credits = match req.params.get("credits").and_then(|v| v.as_i64()) {
        Some(v) if v >= 0 => v,
        Some(_) => return err(&req.id, "bad_params", "credits must not be negative", None),
        None => return err(&req.id, "bad_params", "missing credits", None),
    };

    let existing: Option<String> = match conn
        .query_row("SELECT id FROM courses WHERE code = ?", [&code], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if existing.is_some() {
        return err(&req.id, "conflict", "course code already exists", None);
    }

    let course_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO courses(id, code, name, credits) VALUES(?, ?, ?, ?)",
        (&course_id, &code, &name, credits),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "courses" })),
        );
    }

    ok(
        &req.id,
        json!({ "courseId": course_id, "code": code, "name": name, "credits": credits }),
    )
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "courses": [] }));
    };

    // Offering counts via correlated subquery to avoid join fan-out.
    let mut stmt = match conn.prepare(
        "SELECT
           c.id,
           c.code,
           c.name,
           c.credits,
           (SELECT COUNT(*) FROM course_offerings o WHERE o.course_id = c.id) AS offering_count
         FROM courses c
         ORDER BY c.code",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let code: String = row.get(1)?;
            let name: String = row.get(2)?;
            let credits: i64 = row.get(3)?;
            let offering_count: i64 = row.get(4)?;
            Ok(json!({
                "courseId": id,
                "code": code,
                "name": name,
                "credits": credits,
                "offeringCount": offering_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(courses) => ok(&req.id, json!({ "courses": courses })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_offerings_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let course_id = match req.params.get("courseId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing courseId", None),
    };
    let term = match req.params.get("term").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing term", None),
    };
    if term.is_empty() {
        return err(&req.id, "bad_params", "term must not be empty", None);
    }
    let professor_name = req
        .params
        .get("professorName")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let location = req
        .params
        .get("location")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM courses WHERE id = ?", [&course_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "course not found", None);
    }

    let offering_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO course_offerings(id, course_id, term, professor_name, location)
         VALUES(?, ?, ?, ?, ?)",
        (&offering_id, &course_id, &term, &professor_name, &location),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "course_offerings" })),
        );
    }

    ok(
        &req.id,
        json!({ "offeringId": offering_id, "courseId": course_id, "term": term }),
    )
}

fn handle_offerings_add_schedule(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let offering_id = match req.params.get("offeringId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing offeringId", None),
    };
    let day_of_week = match req.params.get("dayOfWeek").and_then(|v| v.as_str()) {
        Some(v) => match Weekday::parse(v) {
            Some(d) => d,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("dayOfWeek must be a canonical weekday name, got {:?}", v),
                    None,
                )
            }
        },
        None => return err(&req.id, "bad_params", "missing dayOfWeek", None),
    };
    let start_time = match req.params.get("startTime").and_then(|v| v.as_str()) {
        Some(v) if is_hhmmss(v) => v.to_string(),
        Some(v) => {
            return err(
                &req.id,
                "bad_params",
                format!("startTime must be HH:MM:SS, got {:?}", v),
                None,
            )
        }
        None => return err(&req.id, "bad_params", "missing startTime", None),
    };
    let end_time = match req.params.get("endTime").and_then(|v| v.as_str()) {
        Some(v) if is_hhmmss(v) => v.to_string(),
        Some(v) => {
            return err(
                &req.id,
                "bad_params",
                format!("endTime must be HH:MM:SS, got {:?}", v),
                None,
            )
        }
        None => return err(&req.id, "bad_params", "missing endTime", None),
    };
    let room_number = req
        .params
        .get("roomNumber")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let exists: Option<i64> = match conn
        .query_row(
            "SELECT 1 FROM course_offerings WHERE id = ?",
            [&offering_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "offering not found", None);
    }

    let next_sort: i64 = match conn.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM offering_schedules WHERE offering_id = ?",
        [&offering_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let schedule_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO offering_schedules(
             id, offering_id, day_of_week, start_time, end_time, room_number, sort_order)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &schedule_id,
            &offering_id,
            day_of_week.as_str(),
            &start_time,
            &end_time,
            &room_number,
            next_sort,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "offering_schedules" })),
        );
    }

    ok(
        &req.id,
        json!({
            "scheduleId": schedule_id,
            "offeringId": offering_id,
            "dayOfWeek": day_of_week.as_str(),
            "sortOrder": next_sort
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.create" => Some(handle_courses_create(state, req)),
        "courses.list" => Some(handle_courses_list(state, req)),
        "offerings.create" => Some(handle_offerings_create(state, req)),
        "offerings.addSchedule" => Some(handle_offerings_add_schedule(state, req)),
        _ => None,
    }
}
