pub mod announcements;
pub mod core;
pub mod courses;
pub mod dashboard;
pub mod enrollments;
pub mod users;
