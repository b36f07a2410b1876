use crate::dashboard::{CourseOffering, Enrollment, EnrollmentStatus, MeetingSchedule, Weekday};
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

pub struct EnrollmentRecord {
    pub enrollment_id: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub enrollment: Enrollment,
}

fn user_exists(conn: &Connection, user_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM users WHERE id = ?", [user_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(HandlerErr::db)
}

fn offering_exists(conn: &Connection, offering_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row(
        "SELECT 1 FROM course_offerings WHERE id = ?",
        [offering_id],
        |r| r.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.is_some())
    .map_err(HandlerErr::db)
}

fn load_schedules(conn: &Connection, offering_id: &str) -> Result<Vec<MeetingSchedule>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT day_of_week, start_time, end_time, room_number
             FROM offering_schedules
             WHERE offering_id = ?
             ORDER BY sort_order",
        )
        .map_err(HandlerErr::db)?;
    let raw = stmt
        .query_map([offering_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, Option<String>>(3)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db)?;

    let mut out = Vec::with_capacity(raw.len());
    for (day, start, end, room) in raw {
        let Some(day_of_week) = Weekday::parse(&day) else {
            // Insert validates the name; a miss here means hand-edited data.
            return Err(HandlerErr {
                code: "bad_row",
                message: format!("stored day_of_week is not a weekday name: {:?}", day),
                details: Some(json!({ "offeringId": offering_id })),
            });
        };
        out.push(MeetingSchedule {
            day_of_week,
            start_time: start,
            end_time: end,
            room_number: room,
        });
    }
    Ok(out)
}

/// Loads a student's enrollment records with nested offering and
/// ordered schedules. Record order is enrollment insertion order.
pub fn load_for_student(
    conn: &Connection,
    student_id: &str,
) -> Result<Vec<EnrollmentRecord>, HandlerErr> {
    if !user_exists(conn, student_id)? {
        return Err(HandlerErr {
            code: "not_found",
            message: "student not found".to_string(),
            details: None,
        });
    }

    let mut stmt = conn
        .prepare(
            "SELECT e.id, e.status, e.created_at, e.updated_at,
                    o.id, c.id, c.name, c.credits, o.professor_name, o.location
             FROM enrollments e
             JOIN course_offerings o ON o.id = e.offering_id
             JOIN courses c ON c.id = o.course_id
             WHERE e.student_id = ?
             ORDER BY e.rowid",
        )
        .map_err(HandlerErr::db)?;

    type Row = (
        String,
        String,
        String,
        Option<String>,
        String,
        String,
        String,
        i64,
        Option<String>,
        Option<String>,
    );
    let raw: Vec<Row> = stmt
        .query_map([student_id], |r| {
            Ok((
                r.get(0)?,
                r.get(1)?,
                r.get(2)?,
                r.get(3)?,
                r.get(4)?,
                r.get(5)?,
                r.get(6)?,
                r.get(7)?,
                r.get(8)?,
                r.get(9)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db)?;

    let mut records = Vec::with_capacity(raw.len());
    for (
        enrollment_id,
        status_raw,
        created_at,
        updated_at,
        offering_id,
        course_id,
        course_name,
        credits,
        professor_name,
        location,
    ) in raw
    {
        let Some(status) = EnrollmentStatus::parse(&status_raw) else {
            return Err(HandlerErr {
                code: "bad_row",
                message: format!("stored status is not an enrollment status: {:?}", status_raw),
                details: Some(json!({ "enrollmentId": enrollment_id })),
            });
        };
        let schedules = load_schedules(conn, &offering_id)?;
        records.push(EnrollmentRecord {
            enrollment_id,
            created_at,
            updated_at,
            enrollment: Enrollment {
                student_id: student_id.to_string(),
                course_name,
                credits,
                status,
                offering: Some(CourseOffering {
                    course_id,
                    professor_name,
                    location,
                    schedules,
                }),
            },
        });
    }
    Ok(records)
}

pub fn record_json(rec: &EnrollmentRecord) -> serde_json::Value {
    json!({
        "enrollmentId": rec.enrollment_id,
        "studentId": rec.enrollment.student_id,
        "courseName": rec.enrollment.course_name,
        "credits": rec.enrollment.credits,
        "status": rec.enrollment.status.as_str(),
        "createdAt": rec.created_at,
        "updatedAt": rec.updated_at,
        "offering": rec.enrollment.offering.as_ref().map(|o| json!({
            "courseId": o.course_id,
            "professorName": o.professor_name,
            "location": o.location,
            "schedules": o.schedules.iter().map(|s| json!({
                "dayOfWeek": s.day_of_week.as_str(),
                "startTime": s.start_time,
                "endTime": s.end_time,
                "roomNumber": s.room_number,
            })).collect::<Vec<_>>(),
        })),
    })
}

fn handle_enrollments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };
    let offering_id = match req.params.get("offeringId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing offeringId", None),
    };

    match user_exists(conn, &student_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => return e.response(&req.id),
    }
    match offering_exists(conn, &offering_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "offering not found", None),
        Err(e) => return e.response(&req.id),
    }

    let existing: Option<String> = match conn
        .query_row(
            "SELECT id FROM enrollments WHERE student_id = ? AND offering_id = ?",
            [&student_id, &offering_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if existing.is_some() {
        return err(&req.id, "conflict", "student already enrolled in offering", None);
    }

    let enrollment_id = Uuid::new_v4().to_string();
    let created_at = chrono::Utc::now().to_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO enrollments(id, student_id, offering_id, status, created_at)
         VALUES(?, ?, ?, 'enrolled', ?)",
        (&enrollment_id, &student_id, &offering_id, &created_at),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "enrollments" })),
        );
    }

    ok(
        &req.id,
        json!({
            "enrollmentId": enrollment_id,
            "studentId": student_id,
            "offeringId": offering_id,
            "status": "enrolled"
        }),
    )
}

fn handle_enrollments_set_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let enrollment_id = match req.params.get("enrollmentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing enrollmentId", None),
    };
    let status = match req.params.get("status").and_then(|v| v.as_str()) {
        Some(v) => match EnrollmentStatus::parse(v) {
            Some(s) => s,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("status must be enrolled|dropped|waitlisted|completed, got {:?}", v),
                    None,
                )
            }
        },
        None => return err(&req.id, "bad_params", "missing status", None),
    };

    let updated_at = chrono::Utc::now().to_rfc3339();
    let changed = match conn.execute(
        "UPDATE enrollments SET status = ?, updated_at = ? WHERE id = ?",
        (status.as_str(), &updated_at, &enrollment_id),
    ) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if changed == 0 {
        return err(&req.id, "not_found", "enrollment not found", None);
    }

    ok(
        &req.id,
        json!({ "enrollmentId": enrollment_id, "status": status.as_str() }),
    )
}

fn handle_enrollments_list_for_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };

    let records = match load_for_student(conn, &student_id) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    ok(
        &req.id,
        json!({
            "enrollments": records.iter().map(record_json).collect::<Vec<_>>()
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollments.create" => Some(handle_enrollments_create(state, req)),
        "enrollments.setStatus" => Some(handle_enrollments_set_status(state, req)),
        "enrollments.listForStudent" => Some(handle_enrollments_list_for_student(state, req)),
        _ => None,
    }
}
