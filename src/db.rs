use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("campus.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_salt TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            credits INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_offerings(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            term TEXT NOT NULL,
            professor_name TEXT,
            location TEXT,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_offerings_course ON course_offerings(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS offering_schedules(
            id TEXT PRIMARY KEY,
            offering_id TEXT NOT NULL,
            day_of_week TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            room_number TEXT,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(offering_id) REFERENCES course_offerings(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedules_offering_sort
             ON offering_schedules(offering_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            offering_id TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES users(id),
            FOREIGN KEY(offering_id) REFERENCES course_offerings(id),
            UNIQUE(student_id, offering_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_offering ON enrollments(offering_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS announcements(
            id TEXT PRIMARY KEY,
            offering_id TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(offering_id) REFERENCES course_offerings(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_announcements_offering ON announcements(offering_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_announcements_created ON announcements(created_at)",
        [],
    )?;

    // Workspaces created before these columns existed need them added.
    ensure_users_google_sub(&conn)?;
    ensure_enrollments_updated_at(&conn)?;

    Ok(conn)
}

// Google-linked accounts landed after the initial users schema.
fn ensure_users_google_sub(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "users", "google_sub")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE users ADD COLUMN google_sub TEXT", [])?;
    Ok(())
}

fn ensure_enrollments_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "enrollments", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE enrollments ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
