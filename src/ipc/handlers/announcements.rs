use crate::dashboard::Announcement;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    fn db(e: impl std::fmt::Display) -> Self {
        HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        }
    }
}

pub struct AnnouncementRow {
    pub course_name: String,
    pub announcement: Announcement,
}

fn user_exists(conn: &Connection, user_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM users WHERE id = ?", [user_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(HandlerErr::db)
}

/// Announcements for the student's enrolled offerings, newest first.
pub fn load_for_student(
    conn: &Connection,
    student_id: &str,
) -> Result<Vec<AnnouncementRow>, HandlerErr> {
    if !user_exists(conn, student_id)? {
        return Err(HandlerErr {
            code: "not_found",
            message: "student not found".to_string(),
            details: None,
        });
    }

    let mut stmt = conn
        .prepare(
            "SELECT a.id, a.title, a.body, a.created_at, c.name
             FROM announcements a
             JOIN enrollments e ON e.offering_id = a.offering_id
             JOIN course_offerings o ON o.id = a.offering_id
             JOIN courses c ON c.id = o.course_id
             WHERE e.student_id = ? AND e.status = 'enrolled'
             ORDER BY a.created_at DESC, a.rowid DESC",
        )
        .map_err(HandlerErr::db)?;

    stmt.query_map([student_id], |r| {
        Ok(AnnouncementRow {
            course_name: r.get(4)?,
            announcement: Announcement {
                id: r.get(0)?,
                title: r.get(1)?,
                body: r.get(2)?,
                posted_at: r.get(3)?,
            },
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(HandlerErr::db)
}

pub fn row_json(row: &AnnouncementRow) -> serde_json::Value {
    json!({
        "announcementId": row.announcement.id,
        "title": row.announcement.title,
        "body": row.announcement.body,
        "postedAt": row.announcement.posted_at,
        "courseName": row.course_name,
    })
}

fn handle_announcements_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let offering_id = match req.params.get("offeringId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing offeringId", None),
    };
    let title = match req.params.get("title").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing title", None),
    };
    if title.is_empty() {
        return err(&req.id, "bad_params", "title must not be empty", None);
    }
    let body = match req.params.get("body").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing body", None),
    };

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

    let announcement_id = Uuid::new_v4().to_string();
    let created_at = chrono::Utc::now().to_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO announcements(id, offering_id, title, body, created_at)
         VALUES(?, ?, ?, ?, ?)",
        (&announcement_id, &offering_id, &title, &body, &created_at),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "announcements" })),
        );
    }

    ok(
        &req.id,
        json!({
            "announcementId": announcement_id,
            "offeringId": offering_id,
            "postedAt": created_at
        }),
    )
}

fn handle_announcements_list_for_student(
    state: &mut AppState,
    req: &Request,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };

    let rows = match load_for_student(conn, &student_id) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    ok(
        &req.id,
        json!({
            "announcements": rows.iter().map(row_json).collect::<Vec<_>>()
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "announcements.create" => Some(handle_announcements_create(state, req)),
        "announcements.listForStudent" => Some(handle_announcements_list_for_student(state, req)),
        _ => None,
    }
}
