//! Turns fetched records into view-models plus the actions wired to them.
//!
//! Every function here is pure: the coordinator decides where a fragment is
//! committed, the render layer only decides what it contains.

use chrono::{NaiveDate, NaiveDateTime};
use shared::{
    domain::{AssignmentId, CourseId, Role, Session, SubmissionId, UserId},
    protocol::{
        Assignment, AttendanceSummary, CompletionStatus, Course, CourseGrades, DiscussionPost,
        Material, Notification, StudentRecord, Submission,
    },
};

use crate::{router::Container, session::avatar_initials};

const COURSE_SUMMARY_CHARS: usize = 100;
const ASSIGNMENT_SUMMARY_CHARS: usize = 120;
const SUBMISSION_SUMMARY_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundAction {
    ViewCourse(CourseId),
    Enroll(CourseId),
    MarkComplete(CourseId),
    ViewStudents(CourseId),
    CreateAssignment(CourseId),
    UploadMaterial(CourseId),
    PostDiscussion(CourseId),
    SubmitText(AssignmentId),
    SubmitFile(AssignmentId),
    ViewSubmissions(AssignmentId),
    SaveGrade {
        submission_id: SubmissionId,
        assignment_id: AssignmentId,
    },
    TogglePresent(UserId),
    SaveAttendance(CourseId),
    MarkAllRead,
}

impl BoundAction {
    pub fn name(&self) -> &'static str {
        match self {
            BoundAction::ViewCourse(_) => "view-course",
            BoundAction::Enroll(_) => "enroll",
            BoundAction::MarkComplete(_) => "mark-complete",
            BoundAction::ViewStudents(_) => "view-students",
            BoundAction::CreateAssignment(_) => "create-assignment",
            BoundAction::UploadMaterial(_) => "upload-material",
            BoundAction::PostDiscussion(_) => "post-discussion",
            BoundAction::SubmitText(_) => "submit-text",
            BoundAction::SubmitFile(_) => "submit-file",
            BoundAction::ViewSubmissions(_) => "view-submissions",
            BoundAction::SaveGrade { .. } => "save-grade",
            BoundAction::TogglePresent(_) => "toggle-present",
            BoundAction::SaveAttendance(_) => "save-attendance",
            BoundAction::MarkAllRead => "mark-all-read",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub label: String,
    pub action: BoundAction,
}

impl Binding {
    pub fn new(label: impl Into<String>, action: BoundAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Unread,
    Present,
    Absent,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewItem {
    pub title: String,
    pub lines: Vec<String>,
    pub marker: Option<Marker>,
    pub bindings: Vec<Binding>,
}

impl ViewItem {
    fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    fn bind(mut self, label: &str, action: BoundAction) -> Self {
        self.bindings.push(Binding::new(label, action));
        self
    }

    fn marked(mut self, marker: Marker) -> Self {
        self.marker = Some(marker);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentBody {
    Items(Vec<ViewItem>),
    /// Explicit "no data" text, used for empty results and degraded fetches.
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub container: Container,
    pub body: FragmentBody,
    /// Container-level actions, e.g. a save button under a list.
    pub actions: Vec<Binding>,
}

impl Fragment {
    pub fn items(container: Container, items: Vec<ViewItem>) -> Self {
        Self {
            container,
            body: FragmentBody::Items(items),
            actions: Vec::new(),
        }
    }

    pub fn placeholder(container: Container, text: impl Into<String>) -> Self {
        Self {
            container,
            body: FragmentBody::Placeholder(text.into()),
            actions: Vec::new(),
        }
    }

    fn or_placeholder(container: Container, items: Vec<ViewItem>, empty: &str) -> Self {
        if items.is_empty() {
            Self::placeholder(container, empty)
        } else {
            Self::items(container, items)
        }
    }

    fn with_action(mut self, label: &str, action: BoundAction) -> Self {
        self.actions.push(Binding::new(label, action));
        self
    }

    pub fn item_count(&self) -> usize {
        match &self.body {
            FragmentBody::Items(items) => items.len(),
            FragmentBody::Placeholder(_) => 0,
        }
    }

    pub fn view_items(&self) -> &[ViewItem] {
        match &self.body {
            FragmentBody::Items(items) => items,
            FragmentBody::Placeholder(_) => &[],
        }
    }

    pub fn placeholder_text(&self) -> Option<&str> {
        match &self.body {
            FragmentBody::Placeholder(text) => Some(text),
            FragmentBody::Items(_) => None,
        }
    }

    /// Every action reachable from this fragment, item bindings first.
    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.view_items()
            .iter()
            .flat_map(|item| item.bindings.iter())
            .chain(self.actions.iter())
    }
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Formats server timestamps for display; unknown shapes pass through.
pub fn display_timestamp(raw: &str) -> String {
    const FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
    for format in FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return parsed.format("%Y-%m-%d %H:%M").to_string();
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

fn course_meta(course: &Course) -> String {
    format!("{} | {}", course.duration, course.teacher)
}

pub fn course_grid(courses: &[Course]) -> Fragment {
    let items = courses
        .iter()
        .map(|course| {
            ViewItem::titled(&course.title)
                .line(truncate(&course.description, COURSE_SUMMARY_CHARS))
                .line(course_meta(course))
                .bind("View Course", BoundAction::ViewCourse(course.id))
        })
        .collect();
    Fragment::or_placeholder(Container::CourseGrid, items, "No courses available.")
}

/// Case-insensitive match on title or description, like the catalog search box.
pub fn matches_search(course: &Course, term: &str) -> bool {
    let term = term.to_lowercase();
    course.title.to_lowercase().contains(&term)
        || truncate(&course.description, COURSE_SUMMARY_CHARS)
            .to_lowercase()
            .contains(&term)
}

pub fn course_header(course: &Course, session: Option<&Session>) -> Fragment {
    let mut item = ViewItem::titled(&course.title)
        .line(course_meta(course))
        .line(&course.description);
    match session.map(|session| session.role) {
        Some(Role::Student) => {
            item = item
                .bind("Enroll Now", BoundAction::Enroll(course.id))
                .bind("Mark as Completed", BoundAction::MarkComplete(course.id));
        }
        Some(Role::Teacher) => {
            item = item.bind("Upload Material", BoundAction::UploadMaterial(course.id));
        }
        None => {}
    }
    if session.is_some() {
        item = item.bind("Post", BoundAction::PostDiscussion(course.id));
    }
    Fragment::items(Container::CourseHeader, vec![item])
}

pub fn materials(items: &[Material]) -> Fragment {
    let items = items
        .iter()
        .map(|material| {
            ViewItem::titled(&material.filename)
                .line(&material.url)
                .line(format!("by {}", material.uploader_name))
        })
        .collect();
    Fragment::or_placeholder(Container::Materials, items, "No materials yet.")
}

pub fn discussion(posts: &[DiscussionPost]) -> Fragment {
    let items = posts
        .iter()
        .map(|post| {
            ViewItem::titled(&post.user_name)
                .line(display_timestamp(&post.created_at))
                .line(&post.content)
        })
        .collect();
    Fragment::or_placeholder(
        Container::Discussion,
        items,
        "No discussion yet. Be the first to post!",
    )
}

pub fn completion(course_id: CourseId, status: CompletionStatus) -> Fragment {
    let item = if status.completed {
        ViewItem::titled("Completed").marked(Marker::Completed)
    } else {
        ViewItem::titled("Not completed")
            .bind("Mark as Completed", BoundAction::MarkComplete(course_id))
    };
    Fragment::items(Container::Completion, vec![item])
}

pub fn enrolled_courses(courses: &[Course]) -> Fragment {
    let items = courses
        .iter()
        .map(|course| {
            ViewItem::titled(&course.title)
                .line(truncate(&course.description, COURSE_SUMMARY_CHARS))
                .line(course_meta(course))
                .bind("View Course", BoundAction::ViewCourse(course.id))
        })
        .collect();
    Fragment::or_placeholder(
        Container::EnrolledCourses,
        items,
        "You are not enrolled in any courses yet.",
    )
}

pub fn student_assignments(assignments: &[Assignment]) -> Fragment {
    let items = assignments
        .iter()
        .map(|assignment| {
            let item = ViewItem::titled(&assignment.title)
                .line(truncate(&assignment.description, ASSIGNMENT_SUMMARY_CHARS))
                .line(format!("Due: {}", display_timestamp(&assignment.due_date)));
            if assignment.submitted {
                item.line("Submitted").marked(Marker::Completed)
            } else {
                item.bind("Submit", BoundAction::SubmitText(assignment.id))
                    .bind("Upload", BoundAction::SubmitFile(assignment.id))
            }
        })
        .collect();
    Fragment::or_placeholder(Container::StudentAssignments, items, "No assignments yet.")
}

pub fn format_percent(percent: Option<f64>) -> String {
    match percent {
        Some(percent) => format!("{percent:.0}%"),
        None => "N/A".to_string(),
    }
}

pub fn student_attendance(summaries: &[AttendanceSummary]) -> Fragment {
    let items = summaries
        .iter()
        .map(|summary| {
            ViewItem::titled(&summary.course_title)
                .line(format!("Present: {} / {}", summary.present, summary.total))
                .line(format_percent(summary.percent))
        })
        .collect();
    Fragment::or_placeholder(
        Container::StudentAttendance,
        items,
        "No attendance records yet.",
    )
}

pub fn format_grade(grade: Option<f64>) -> String {
    match grade {
        Some(grade) => format!("{grade}"),
        None => "N/A".to_string(),
    }
}

pub fn student_grades(grades: &[CourseGrades]) -> Fragment {
    let items = grades
        .iter()
        .map(|course| {
            let average = course
                .average
                .map(|average| format!("{average:.1}"))
                .unwrap_or_else(|| "N/A".to_string());
            let mut item = ViewItem::titled(&course.course_title)
                .line(format!("Average: {average} ({} graded)", course.count));
            for submission in &course.submissions {
                item = item.line(format!(
                    "{}: {}",
                    submission.assignment_title,
                    format_grade(submission.grade)
                ));
            }
            item
        })
        .collect();
    Fragment::or_placeholder(Container::StudentGrades, items, "No grades yet.")
}

pub fn teacher_courses(courses: &[Course]) -> Fragment {
    let items = courses
        .iter()
        .map(|course| {
            ViewItem::titled(&course.title)
                .line(truncate(&course.description, COURSE_SUMMARY_CHARS))
                .line(&course.duration)
                .bind("View Course", BoundAction::ViewCourse(course.id))
                .bind("View Students", BoundAction::ViewStudents(course.id))
                .bind("Create Assignment", BoundAction::CreateAssignment(course.id))
        })
        .collect();
    Fragment::or_placeholder(
        Container::TeacherCourses,
        items,
        "You have not created any courses yet.",
    )
}

pub fn teacher_assignments(per_course: &[(Course, Vec<Assignment>)]) -> Fragment {
    if per_course.is_empty() {
        return Fragment::placeholder(
            Container::TeacherAssignments,
            "You have not created any courses yet.",
        );
    }
    let items = per_course
        .iter()
        .flat_map(|(course, assignments)| {
            assignments.iter().map(move |assignment| {
                ViewItem::titled(format!("{} ({})", assignment.title, course.title))
                    .line(truncate(&assignment.description, ASSIGNMENT_SUMMARY_CHARS))
                    .line(format!("Due: {}", display_timestamp(&assignment.due_date)))
                    .bind(
                        "View Submissions",
                        BoundAction::ViewSubmissions(assignment.id),
                    )
            })
        })
        .collect();
    Fragment::or_placeholder(
        Container::TeacherAssignments,
        items,
        "No assignments created yet.",
    )
}

pub fn submissions(assignment_id: AssignmentId, submissions: &[Submission]) -> Fragment {
    let items = submissions
        .iter()
        .map(|submission| {
            let content = match submission.content.as_deref() {
                Some(path) if submission.is_file_reference() => {
                    format!("View uploaded file: {path}")
                }
                Some(text) => truncate(text, SUBMISSION_SUMMARY_CHARS),
                None => String::new(),
            };
            let mut item = ViewItem::titled(&submission.student_name)
                .line(content)
                .line(display_timestamp(&submission.submitted_at));
            if let Some(grade) = submission.grade {
                item = item.line(format!("Grade: {grade}"));
            }
            if let Some(feedback) = submission.feedback.as_deref().filter(|f| !f.is_empty()) {
                item = item.line(format!("Feedback: {feedback}"));
            }
            item.bind(
                "Save",
                BoundAction::SaveGrade {
                    submission_id: submission.id,
                    assignment_id,
                },
            )
        })
        .collect();
    Fragment::or_placeholder(Container::StudentSubmissions, items, "No submissions yet.")
}

pub fn course_students(students: &[StudentRecord]) -> Fragment {
    let items = students
        .iter()
        .map(|student| ViewItem::titled(format!("{} ({})", student.name, student.email)))
        .collect();
    Fragment::or_placeholder(
        Container::CourseStudents,
        items,
        "No students enrolled in this course yet.",
    )
}

/// One displayed attendance row; `present` mirrors the checkbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRow {
    pub student: StudentRecord,
    pub present: bool,
}

pub fn attendance_list(course_id: CourseId, rows: &[AttendanceRow]) -> Fragment {
    if rows.is_empty() {
        return Fragment::placeholder(Container::AttendanceList, "No enrolled students.");
    }
    let items = rows
        .iter()
        .map(|row| {
            ViewItem::titled(format!("{} ({})", row.student.name, row.student.email))
                .marked(if row.present {
                    Marker::Present
                } else {
                    Marker::Absent
                })
                .bind("Present", BoundAction::TogglePresent(row.student.id))
        })
        .collect();
    Fragment::items(Container::AttendanceList, items)
        .with_action("Save Attendance", BoundAction::SaveAttendance(course_id))
}

pub fn notification_list(items: &[Notification]) -> Fragment {
    let rendered: Vec<ViewItem> = items
        .iter()
        .map(|notification| {
            let item = ViewItem::titled(&notification.title).line(&notification.message);
            if notification.read {
                item
            } else {
                item.marked(Marker::Unread)
            }
        })
        .collect();
    if rendered.is_empty() {
        return Fragment::placeholder(Container::NotificationList, "No notifications");
    }
    Fragment::items(Container::NotificationList, rendered)
        .with_action("Mark all read", BoundAction::MarkAllRead)
}

/// Counters on the profile page. `None` renders as a dash.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileStats {
    pub enrolled: Option<usize>,
    pub submissions: Option<usize>,
    pub average_grade: Option<f64>,
}

impl ProfileStats {
    pub fn for_student(enrolled: usize, grades: &[CourseGrades]) -> Self {
        let submissions = grades.iter().map(|course| course.submissions.len()).sum();
        let averages: Vec<f64> = grades.iter().filter_map(|course| course.average).collect();
        let average_grade =
            (!averages.is_empty()).then(|| averages.iter().sum::<f64>() / averages.len() as f64);
        Self {
            enrolled: Some(enrolled),
            submissions: Some(submissions),
            average_grade,
        }
    }

    pub fn for_teacher(submissions: usize) -> Self {
        Self {
            enrolled: None,
            submissions: Some(submissions),
            average_grade: None,
        }
    }
}

fn count_or_dash(value: Option<usize>) -> String {
    value
        .map(|count| count.to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn profile(session: &Session, stats: &ProfileStats) -> Fragment {
    let average = match (session.role, stats.average_grade) {
        (Role::Teacher, _) => "-".to_string(),
        (Role::Student, Some(average)) => format!("{average:.1}"),
        (Role::Student, None) => "N/A".to_string(),
    };
    let item = ViewItem::titled(format!("{} [{}]", session.name, avatar_initials(&session.name)))
        .line(format!("Email: {}", session.email))
        .line(format!("Role: {}", session.role))
        .line(format!("Enrolled courses: {}", count_or_dash(stats.enrolled)))
        .line(format!("Submissions: {}", count_or_dash(stats.submissions)))
        .line(format!("Average grade: {average}"));
    Fragment::items(Container::ProfileStats, vec![item])
}

#[cfg(test)]
mod tests {
    use shared::{domain::NotificationId, protocol::GradedSubmission};

    use super::*;

    fn course(id: i64, title: &str, description: &str) -> Course {
        Course {
            id: CourseId(id),
            title: title.into(),
            description: description.into(),
            duration: "6 weeks".into(),
            teacher: "Demo Teacher".into(),
            teacher_id: Some(UserId(1)),
        }
    }

    #[test]
    fn long_descriptions_are_truncated_with_ellipsis() {
        let long = "x".repeat(150);
        let fragment = course_grid(&[course(1, "Python", &long)]);
        let line = &fragment.view_items()[0].lines[0];
        assert_eq!(line.chars().count(), 103);
        assert!(line.ends_with("..."));
        assert_eq!(truncate("short", 100), "short");
    }

    #[test]
    fn empty_lists_render_placeholders() {
        assert_eq!(
            course_grid(&[]).placeholder_text(),
            Some("No courses available.")
        );
        assert_eq!(
            materials(&[]).placeholder_text(),
            Some("No materials yet.")
        );
        assert_eq!(
            notification_list(&[]).placeholder_text(),
            Some("No notifications")
        );
        assert_eq!(
            teacher_assignments(&[(course(1, "A", "d"), Vec::new())]).placeholder_text(),
            Some("No assignments created yet.")
        );
    }

    #[test]
    fn course_header_bindings_follow_role() {
        let c = course(3, "Web", "intro");
        let student = Session {
            id: UserId(5),
            name: "Sam".into(),
            email: "sam@x.com".into(),
            role: Role::Student,
        };
        let names: Vec<_> = course_header(&c, Some(&student))
            .bindings()
            .map(|binding| binding.action.name())
            .collect();
        assert_eq!(names, vec!["enroll", "mark-complete", "post-discussion"]);

        let anonymous = course_header(&c, None);
        assert_eq!(anonymous.bindings().count(), 0);
    }

    #[test]
    fn submitted_assignments_offer_no_submit_action() {
        let assignment = Assignment {
            id: AssignmentId(8),
            course_id: CourseId(3),
            title: "Essay".into(),
            description: "Write".into(),
            due_date: "2024-05-01T23:59:00".into(),
            submitted: true,
            submission_id: None,
        };
        let fragment = student_assignments(&[assignment]);
        let item = &fragment.view_items()[0];
        assert!(item.bindings.is_empty());
        assert!(item.lines.contains(&"Due: 2024-05-01 23:59".to_string()));
    }

    #[test]
    fn file_submissions_link_instead_of_quoting() {
        let submission = Submission {
            id: SubmissionId(2),
            student_id: UserId(5),
            student_name: "Sam".into(),
            content: Some("/uploads/essay.pdf".into()),
            submitted_at: "2024-05-01T10:00:00".into(),
            grade: Some(85.5),
            feedback: None,
        };
        let fragment = submissions(AssignmentId(8), &[submission]);
        let item = &fragment.view_items()[0];
        assert_eq!(item.lines[0], "View uploaded file: /uploads/essay.pdf");
        assert!(item.lines.contains(&"Grade: 85.5".to_string()));
    }

    #[test]
    fn student_profile_averages_course_averages() {
        let grades = vec![
            CourseGrades {
                course_id: CourseId(1),
                course_title: "A".into(),
                average: Some(80.0),
                count: 1,
                submissions: vec![GradedSubmission {
                    submission_id: SubmissionId(1),
                    assignment_id: AssignmentId(1),
                    assignment_title: "One".into(),
                    submitted_at: String::new(),
                    grade: Some(80.0),
                    feedback: None,
                    content: None,
                }],
            },
            CourseGrades {
                course_id: CourseId(2),
                course_title: "B".into(),
                average: Some(91.0),
                count: 0,
                submissions: Vec::new(),
            },
            CourseGrades {
                course_id: CourseId(3),
                course_title: "C".into(),
                average: None,
                count: 0,
                submissions: Vec::new(),
            },
        ];
        let stats = ProfileStats::for_student(3, &grades);
        assert_eq!(stats.submissions, Some(1));
        assert_eq!(stats.average_grade, Some(85.5));
        assert_eq!(format_percent(Some(66.666)), "67%");
        assert_eq!(format_percent(None), "N/A");
    }

    #[test]
    fn unread_notifications_are_marked() {
        let items = vec![
            Notification {
                id: NotificationId(1),
                title: "Graded".into(),
                message: "Your essay".into(),
                created_at: None,
                read: false,
            },
            Notification {
                id: NotificationId(2),
                title: "Welcome".into(),
                message: "Hi".into(),
                created_at: None,
                read: true,
            },
        ];
        let fragment = notification_list(&items);
        assert_eq!(fragment.view_items()[0].marker, Some(Marker::Unread));
        assert_eq!(fragment.view_items()[1].marker, None);
        assert_eq!(fragment.actions[0].action, BoundAction::MarkAllRead);
    }
}
