use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AssignmentId, CourseId, MaterialId, NotificationId, PostId, Role, Session, SubmissionId,
    UserId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user: Session,
}

/// Generic acknowledgement; the server attaches extra ids we do not need.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub duration: String,
    pub teacher: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<UserId>,
}

impl Course {
    /// A course belongs to a teacher when the id matches, or, for rows
    /// without a `teacher_id`, when the display name does.
    pub fn taught_by(&self, session: &Session) -> bool {
        self.teacher_id == Some(session.id) || self.teacher == session.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: String,
    pub duration: String,
    pub teacher_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollRequest {
    pub student_id: UserId,
    pub course_id: CourseId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompletionStatus {
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub course_id: CourseId,
    pub title: String,
    pub description: String,
    pub due_date: String,
    #[serde(default)]
    pub submitted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<SubmissionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAssignmentRequest {
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub course_id: CourseId,
    pub teacher_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub student_id: UserId,
    pub assignment_id: AssignmentId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub student_id: UserId,
    pub student_name: String,
    #[serde(default)]
    pub content: Option<String>,
    pub submitted_at: String,
    #[serde(default)]
    pub grade: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl Submission {
    /// Uploaded files are stored as a server-relative path.
    pub fn is_file_reference(&self) -> bool {
        self.content
            .as_deref()
            .map(|content| content.starts_with('/'))
            .unwrap_or(false)
    }
}

/// `grade` is always serialized: `null` clears a grade, which is different
/// from leaving it untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRequest {
    pub teacher_id: UserId,
    pub grade: Option<f64>,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeResponse {
    pub submission_id: SubmissionId,
    #[serde(default)]
    pub grade: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedSubmission {
    pub submission_id: SubmissionId,
    pub assignment_id: AssignmentId,
    pub assignment_title: String,
    pub submitted_at: String,
    #[serde(default)]
    pub grade: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseGrades {
    pub course_id: CourseId,
    pub course_title: String,
    #[serde(default)]
    pub average: Option<f64>,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub submissions: Vec<GradedSubmission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub student_id: UserId,
    pub present: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkAttendanceRequest {
    pub teacher_id: UserId,
    pub course_id: CourseId,
    pub date: NaiveDate,
    pub records: Vec<AttendanceEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceMark {
    pub student_id: UserId,
    #[serde(default)]
    pub student_name: String,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseAttendance {
    pub course_id: CourseId,
    pub date: NaiveDate,
    #[serde(default)]
    pub records: Vec<AttendanceMark>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub course_id: CourseId,
    pub course_title: String,
    pub present: u32,
    pub total: u32,
    #[serde(default)]
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub uploaded_at: String,
    pub uploader_id: UserId,
    pub uploader_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionPost {
    pub id: PostId,
    pub user_id: UserId,
    pub user_name: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionPostRequest {
    pub user_id: UserId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadRequest {
    pub ids: Vec<NotificationId>,
}

/// Partial profile update; absent fields are left unchanged server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_request_keeps_explicit_null() {
        let body = serde_json::to_value(GradeRequest {
            teacher_id: UserId(2),
            grade: None,
            feedback: String::new(),
        })
        .expect("serialize");
        assert!(body.as_object().expect("object").contains_key("grade"));
        assert!(body["grade"].is_null());
    }

    #[test]
    fn profile_update_omits_unchanged_fields() {
        let body = serde_json::to_value(ProfileUpdate {
            name: Some("Sam Lee".into()),
            ..ProfileUpdate::default()
        })
        .expect("serialize");
        assert_eq!(body, serde_json::json!({ "name": "Sam Lee" }));
    }

    #[test]
    fn enrolled_course_rows_parse_without_teacher_id() {
        let course: Course = serde_json::from_value(serde_json::json!({
            "id": 4,
            "title": "Python Basics",
            "description": "Variables and loops",
            "duration": "6 weeks",
            "teacher": "Demo Teacher"
        }))
        .expect("parse");
        assert_eq!(course.teacher_id, None);

        let owner = Session {
            id: UserId(9),
            name: "Demo Teacher".into(),
            email: "teacher@example.com".into(),
            role: Role::Teacher,
        };
        assert!(course.taught_by(&owner));
    }

    #[test]
    fn attendance_dates_use_iso_calendar_format() {
        let body = serde_json::to_value(MarkAttendanceRequest {
            teacher_id: UserId(1),
            course_id: CourseId(3),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).expect("date"),
            records: vec![AttendanceEntry {
                student_id: UserId(7),
                present: true,
            }],
        })
        .expect("serialize");
        assert_eq!(body["date"], "2024-05-01");
        assert_eq!(body["records"][0]["student_id"], 7);
    }
}
