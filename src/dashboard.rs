use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Sunday => "Sunday",
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Sunday" => Some(Weekday::Sunday),
            "Monday" => Some(Weekday::Monday),
            "Tuesday" => Some(Weekday::Tuesday),
            "Wednesday" => Some(Weekday::Wednesday),
            "Thursday" => Some(Weekday::Thursday),
            "Friday" => Some(Weekday::Friday),
            "Saturday" => Some(Weekday::Saturday),
            _ => None,
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(d: chrono::Weekday) -> Self {
        match d {
            chrono::Weekday::Sun => Weekday::Sunday,
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Enrolled,
    Dropped,
    Waitlisted,
    Completed,
}

impl EnrollmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Enrolled => "enrolled",
            EnrollmentStatus::Dropped => "dropped",
            EnrollmentStatus::Waitlisted => "waitlisted",
            EnrollmentStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "enrolled" => Some(EnrollmentStatus::Enrolled),
            "dropped" => Some(EnrollmentStatus::Dropped),
            "waitlisted" => Some(EnrollmentStatus::Waitlisted),
            "completed" => Some(EnrollmentStatus::Completed),
            _ => None,
        }
    }
}

/// One weekly recurring meeting time for an offering.
/// start_time/end_time are "HH:MM:SS" strings as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSchedule {
    pub day_of_week: Weekday,
    pub start_time: String,
    pub end_time: String,
    pub room_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseOffering {
    pub course_id: String,
    pub professor_name: Option<String>,
    pub location: Option<String>,
    pub schedules: Vec<MeetingSchedule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub student_id: String,
    pub course_name: String,
    pub credits: i64,
    pub status: EnrollmentStatus,
    pub offering: Option<CourseOffering>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub body: String,
    pub posted_at: String,
}

/// Display-ready "this offering meets today" row. Built fresh per
/// derivation, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassMeeting {
    pub course_id: String,
    pub name: String,
    pub time_range: String,
    pub location: String,
    pub instructor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub enrolled_course_count: usize,
    pub upcoming_assignment_count: i64,
    pub announcement_count: usize,
    pub next_class_label: String,
}

// Stand-in until an assignment store exists. The dashboard shows this
// fixed value; it is not derived from anything.
pub const UPCOMING_ASSIGNMENTS_STUB: i64 = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl FormatError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedClasses {
    pub meetings: Vec<ClassMeeting>,
    pub skipped: Vec<FormatError>,
}

fn hhmm_prefix(raw: &str) -> Result<&str, FormatError> {
    let bytes = raw.as_bytes();
    let shape_ok = bytes.len() >= 5
        && bytes[0].is_ascii_digit()
        && bytes[1].is_ascii_digit()
        && bytes[2] == b':'
        && bytes[3].is_ascii_digit()
        && bytes[4].is_ascii_digit();
    if !shape_ok {
        return Err(FormatError::new(
            "bad_time",
            format!("expected HH:MM:SS, got {:?}", raw),
        ));
    }
    Ok(&raw[..5])
}

fn format_time_range(start: &str, end: &str) -> Result<String, FormatError> {
    Ok(format!("{}-{}", hhmm_prefix(start)?, hhmm_prefix(end)?))
}

/// Derives the list of class meetings for `today` from enrollment
/// records. Only enrollments with status enrolled contribute; output
/// order is enrollment order then schedule order within an offering,
/// never re-sorted by time. A schedule entry with a malformed time
/// string is skipped and reported instead of producing a garbled label.
pub fn derive_todays_classes(enrollments: &[Enrollment], today: Weekday) -> DerivedClasses {
    let mut out = DerivedClasses::default();

    for enrollment in enrollments {
        if enrollment.status != EnrollmentStatus::Enrolled {
            continue;
        }
        let Some(offering) = enrollment.offering.as_ref() else {
            continue;
        };
        for schedule in &offering.schedules {
            if schedule.day_of_week != today {
                continue;
            }
            match format_time_range(&schedule.start_time, &schedule.end_time) {
                Ok(time_range) => out.meetings.push(ClassMeeting {
                    course_id: offering.course_id.clone(),
                    name: enrollment.course_name.clone(),
                    time_range,
                    location: schedule
                        .room_number
                        .clone()
                        .or_else(|| offering.location.clone())
                        .unwrap_or_else(|| "TBA".to_string()),
                    instructor: offering
                        .professor_name
                        .clone()
                        .unwrap_or_else(|| "TBA".to_string()),
                }),
                Err(e) => out.skipped.push(e.with_details(serde_json::json!({
                    "courseId": offering.course_id,
                    "dayOfWeek": schedule.day_of_week.as_str(),
                }))),
            }
        }
    }

    out
}

/// Total over any well-formed input, including empty slices.
/// announcement_count reflects exactly the slice passed in; the caller
/// decides whether that is the full set or a display truncation.
pub fn aggregate(
    enrollments: &[Enrollment],
    announcements: &[Announcement],
    meetings: &[ClassMeeting],
) -> DashboardSummary {
    let enrolled_course_count = enrollments
        .iter()
        .filter(|e| e.status == EnrollmentStatus::Enrolled)
        .count();

    let next_class_label = meetings
        .first()
        .map(|m| m.name.clone())
        .unwrap_or_else(|| "No upcoming class".to_string());

    DashboardSummary {
        enrolled_course_count,
        upcoming_assignment_count: UPCOMING_ASSIGNMENTS_STUB,
        announcement_count: announcements.len(),
        next_class_label,
    }
}
