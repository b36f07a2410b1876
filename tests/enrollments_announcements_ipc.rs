use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_campusd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn campusd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

#[test]
fn listing_nests_offering_and_keeps_insertion_order() {
    let workspace = temp_dir("campusd-enrollments-list");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let registered = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "users.register",
        json!({ "name": "Dana", "email": "dana@example.edu", "password": "pw" }),
    );
    let student_id = registered
        .get("userId")
        .and_then(|v| v.as_str())
        .expect("userId")
        .to_string();

    let mut offering_ids = Vec::new();
    for (i, (code, name)) in [("CS101", "Database Systems"), ("CS102", "Web Development")]
        .iter()
        .enumerate()
    {
        let course = request_ok(
            &mut stdin,
            &mut reader,
            &format!("3-{}", i),
            "courses.create",
            json!({ "code": code, "name": name, "credits": 3 }),
        );
        let course_id = course.get("courseId").and_then(|v| v.as_str()).expect("courseId");
        let offering = request_ok(
            &mut stdin,
            &mut reader,
            &format!("4-{}", i),
            "offerings.create",
            json!({
                "courseId": course_id,
                "term": "2025F",
                "professorName": "Dr. Chen",
                "location": "Science 2"
            }),
        );
        offering_ids.push(
            offering
                .get("offeringId")
                .and_then(|v| v.as_str())
                .expect("offeringId")
                .to_string(),
        );
    }

    // Two schedule rows on the first offering; listing must keep their
    // insertion order via sort_order.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "offerings.addSchedule",
        json!({
            "offeringId": offering_ids[0],
            "dayOfWeek": "Tuesday",
            "startTime": "13:00:00",
            "endTime": "14:00:00",
            "roomNumber": "C7"
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "offerings.addSchedule",
        json!({
            "offeringId": offering_ids[0],
            "dayOfWeek": "Monday",
            "startTime": "09:00:00",
            "endTime": "10:30:00"
        }),
    );

    for (i, offering_id) in offering_ids.iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("7-{}", i),
            "enrollments.create",
            json!({ "studentId": student_id, "offeringId": offering_id }),
        );
    }

    let listing = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "enrollments.listForStudent",
        json!({ "studentId": student_id }),
    );
    let enrollments = listing
        .get("enrollments")
        .and_then(|v| v.as_array())
        .expect("enrollments");
    assert_eq!(enrollments.len(), 2);
    assert_eq!(
        enrollments[0].get("courseName").and_then(|v| v.as_str()),
        Some("Database Systems")
    );
    assert_eq!(
        enrollments[0].get("status").and_then(|v| v.as_str()),
        Some("enrolled")
    );
    assert_eq!(
        enrollments[0].get("credits").and_then(|v| v.as_i64()),
        Some(3)
    );

    let offering = enrollments[0].get("offering").expect("offering");
    assert_eq!(
        offering.get("professorName").and_then(|v| v.as_str()),
        Some("Dr. Chen")
    );
    let schedules = offering
        .get("schedules")
        .and_then(|v| v.as_array())
        .expect("schedules");
    assert_eq!(schedules.len(), 2);
    // Tuesday row was added first and stays first.
    assert_eq!(
        schedules[0].get("dayOfWeek").and_then(|v| v.as_str()),
        Some("Tuesday")
    );
    assert_eq!(
        schedules[0].get("roomNumber").and_then(|v| v.as_str()),
        Some("C7")
    );
    assert_eq!(
        schedules[1].get("dayOfWeek").and_then(|v| v.as_str()),
        Some("Monday")
    );
    assert!(schedules[1].get("roomNumber").map(|v| v.is_null()).unwrap_or(false));

    // Duplicate enrollment refused.
    let duplicate = request(
        &mut stdin,
        &mut reader,
        "9",
        "enrollments.create",
        json!({ "studentId": student_id, "offeringId": offering_ids[0] }),
    );
    assert_eq!(error_code(&duplicate), Some("conflict"));

    let unknown = request(
        &mut stdin,
        &mut reader,
        "10",
        "enrollments.listForStudent",
        json!({ "studentId": "nobody" }),
    );
    assert_eq!(error_code(&unknown), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn announcements_are_newest_first_and_follow_enrollment_status() {
    let workspace = temp_dir("campusd-announcements");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let registered = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "users.register",
        json!({ "name": "Dana", "email": "dana@example.edu", "password": "pw" }),
    );
    let student_id = registered
        .get("userId")
        .and_then(|v| v.as_str())
        .expect("userId")
        .to_string();

    let course = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "courses.create",
        json!({ "code": "CS101", "name": "Database Systems", "credits": 3 }),
    );
    let course_id = course.get("courseId").and_then(|v| v.as_str()).expect("courseId");
    let offering = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "offerings.create",
        json!({ "courseId": course_id, "term": "2025F" }),
    );
    let offering_id = offering
        .get("offeringId")
        .and_then(|v| v.as_str())
        .expect("offeringId")
        .to_string();

    let enrolled = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "enrollments.create",
        json!({ "studentId": student_id, "offeringId": offering_id }),
    );
    let enrollment_id = enrolled
        .get("enrollmentId")
        .and_then(|v| v.as_str())
        .expect("enrollmentId")
        .to_string();

    for (n, title) in [("6", "First"), ("7", "Second"), ("8", "Third")] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            n,
            "announcements.create",
            json!({ "offeringId": offering_id, "title": title, "body": "b" }),
        );
    }

    let listing = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "announcements.listForStudent",
        json!({ "studentId": student_id }),
    );
    let titles: Vec<&str> = listing
        .get("announcements")
        .and_then(|v| v.as_array())
        .expect("announcements")
        .iter()
        .filter_map(|a| a.get("title").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(titles, vec!["Third", "Second", "First"]);

    // Dropping the enrollment removes the course's announcements from
    // the student's feed.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "enrollments.setStatus",
        json!({ "enrollmentId": enrollment_id, "status": "dropped" }),
    );
    let after_drop = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "announcements.listForStudent",
        json!({ "studentId": student_id }),
    );
    assert_eq!(
        after_drop
            .get("announcements")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(0)
    );

    let missing_offering = request(
        &mut stdin,
        &mut reader,
        "12",
        "announcements.create",
        json!({ "offeringId": "nope", "title": "t", "body": "b" }),
    );
    assert_eq!(error_code(&missing_offering), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
