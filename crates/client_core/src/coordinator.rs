//! Event coordinator: owns the session, the section router and the rendered
//! fragments, and turns user actions into guarded API calls.
//!
//! Handlers take `&self` and only hold the state lock between awaits, so two
//! handlers may interleave. Every fragment is checked against the live layout
//! right before it is committed; responses for a view the user already left
//! are dropped.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use chrono::{Local, NaiveDate};
use futures::future::join_all;
use shared::{
    domain::{AssignmentId, CourseId, Role, Session, SubmissionId, UserId},
    protocol::{
        Assignment, AttendanceEntry, Course, CreateAssignmentRequest, CreateCourseRequest,
        DiscussionPostRequest, EnrollRequest, GradeRequest, LoginRequest, MarkAttendanceRequest,
        MarkReadRequest, Notification, ProfileUpdate, RegisterRequest, SubmitRequest,
    },
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    api::{CourseApi, FileUpload},
    error::{ClientError, Notice},
    notifications::{unread_ids, NotificationBadge},
    render::{self, AttendanceRow, Fragment, ProfileStats},
    router::{Container, DataRequirement, Section, SectionRouter},
    session::{SessionState, SessionStore},
};

pub type HandlerResult<T = ()> = Result<T, ClientError>;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    SessionChanged(Option<Session>),
    SectionChanged(Section),
    Rendered(Container),
    Message(Notice),
    BadgeChanged(Option<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub duration: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewAssignment {
    pub title: String,
    pub description: String,
    pub due_date: String,
}

/// Raw profile form values. Blank or unchanged fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileEdit {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl ProfileEdit {
    pub fn diff(&self, session: &Session) -> ProfileUpdate {
        let changed = |value: &Option<String>, current: &str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty() && *value != current)
                .map(str::to_string)
        };
        ProfileUpdate {
            name: changed(&self.name, &session.name),
            email: changed(&self.email, &session.email),
            password: self
                .password
                .clone()
                .filter(|password| !password.is_empty()),
        }
    }
}

/// The teacher's attendance form: selected course and date plus the rows
/// as currently displayed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceSheet {
    pub courses: Vec<Course>,
    pub course_id: Option<CourseId>,
    pub date: Option<NaiveDate>,
    pub rows: Vec<AttendanceRow>,
}

/// Read-only view of everything an embedder needs to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub section: Section,
    pub session: Option<Session>,
    pub message: Option<Notice>,
    pub badge: Option<String>,
    pub notifications_open: bool,
    pub detail_course: Option<CourseId>,
    pub attendance: AttendanceSheet,
    /// Fragments of the live layout, in container order.
    pub fragments: Vec<Fragment>,
}

impl ViewSnapshot {
    pub fn fragment(&self, container: Container) -> Option<&Fragment> {
        self.fragments
            .iter()
            .find(|fragment| fragment.container == container)
    }
}

/// Parses the grade text box. Blank clears the grade.
pub fn parse_grade_input(input: &str) -> HandlerResult<Option<f64>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(grade) if (0.0..=100.0).contains(&grade) => Ok(Some(grade)),
        _ => Err(ClientError::guard(
            "Grade must be a number between 0 and 100",
        )),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// What an optional container shows when its fetch failed.
fn unavailable(requirement: DataRequirement, session: Option<&Session>) -> Option<Fragment> {
    let text = match requirement {
        DataRequirement::ProfileStats => {
            return session.map(|session| render::profile(session, &ProfileStats::default()));
        }
        DataRequirement::CourseMaterials => "Materials are unavailable.",
        DataRequirement::CourseDiscussion => "Discussion is unavailable.",
        _ => "Status unavailable.",
    };
    Some(Fragment::placeholder(requirement.container(), text))
}

#[derive(Default)]
struct CoordinatorState {
    session: SessionState,
    router: SectionRouter,
    fragments: BTreeMap<Container, Fragment>,
    message: Option<Notice>,
    badge: NotificationBadge,
    notifications_open: bool,
    catalog: Vec<Course>,
    search_term: String,
    detail_course: Option<CourseId>,
    attendance: AttendanceSheet,
    /// Bumped by every roster load; only the newest one may commit.
    roster_generation: u64,
}

impl CoordinatorState {
    fn is_live(&self, container: Container, course: Option<CourseId>) -> bool {
        self.router.is_present(container, self.session.role())
            && (!container.is_course_scoped() || self.detail_course == course)
    }
}

/// User actions routed through [`Coordinator::dispatch`].
#[derive(Debug, Clone)]
pub enum UiAction {
    Navigate(Section),
    Login {
        email: String,
        password: String,
    },
    Register {
        name: String,
        email: String,
        password: String,
        role: Role,
    },
    Logout {
        confirmed: bool,
    },
    SearchCourses(String),
    ViewCourse(CourseId),
    CreateCourse(NewCourse),
    Enroll(CourseId),
    MarkComplete(CourseId),
    ViewStudents(CourseId),
    CreateAssignment {
        course_id: CourseId,
        assignment: NewAssignment,
    },
    SubmitText {
        assignment_id: AssignmentId,
        content: String,
    },
    SubmitFile {
        assignment_id: AssignmentId,
        file: FileUpload,
    },
    ViewSubmissions(AssignmentId),
    SaveGrade {
        submission_id: SubmissionId,
        assignment_id: AssignmentId,
        grade: String,
        feedback: String,
    },
    SelectAttendance {
        course_id: Option<CourseId>,
        date: Option<NaiveDate>,
    },
    SetPresent {
        student_id: UserId,
        present: bool,
    },
    SaveAttendance,
    UploadMaterial {
        course_id: CourseId,
        file: FileUpload,
    },
    PostDiscussion {
        course_id: CourseId,
        content: String,
    },
    ToggleNotifications,
    MarkAllRead,
    UpdateProfile(ProfileEdit),
    DismissMessage,
}

impl UiAction {
    pub fn name(&self) -> &'static str {
        match self {
            UiAction::Navigate(_) => "navigate",
            UiAction::Login { .. } => "login",
            UiAction::Register { .. } => "register",
            UiAction::Logout { .. } => "logout",
            UiAction::SearchCourses(_) => "search_courses",
            UiAction::ViewCourse(_) => "view_course",
            UiAction::CreateCourse(_) => "create_course",
            UiAction::Enroll(_) => "enroll",
            UiAction::MarkComplete(_) => "mark_complete",
            UiAction::ViewStudents(_) => "view_students",
            UiAction::CreateAssignment { .. } => "create_assignment",
            UiAction::SubmitText { .. } => "submit_text",
            UiAction::SubmitFile { .. } => "submit_file",
            UiAction::ViewSubmissions(_) => "view_submissions",
            UiAction::SaveGrade { .. } => "save_grade",
            UiAction::SelectAttendance { .. } => "select_attendance",
            UiAction::SetPresent { .. } => "set_present",
            UiAction::SaveAttendance => "save_attendance",
            UiAction::UploadMaterial { .. } => "upload_material",
            UiAction::PostDiscussion { .. } => "post_discussion",
            UiAction::ToggleNotifications => "toggle_notifications",
            UiAction::MarkAllRead => "mark_all_read",
            UiAction::UpdateProfile(_) => "update_profile",
            UiAction::DismissMessage => "dismiss_message",
        }
    }
}

pub struct Coordinator {
    api: Arc<dyn CourseApi>,
    store: Arc<dyn SessionStore>,
    inner: Mutex<CoordinatorState>,
    events: broadcast::Sender<CoordinatorEvent>,
}

impl Coordinator {
    pub fn new(api: Arc<dyn CourseApi>, store: Arc<dyn SessionStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api,
            store,
            inner: Mutex::new(CoordinatorState::default()),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    pub async fn session(&self) -> Option<Session> {
        self.inner.lock().await.session.current().cloned()
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        let state = self.inner.lock().await;
        let fragments = state
            .fragments
            .values()
            .filter(|fragment| state.is_live(fragment.container, state.detail_course))
            .cloned()
            .collect();
        ViewSnapshot {
            section: state.router.active(),
            session: state.session.current().cloned(),
            message: state.message.clone(),
            badge: state.badge.label(),
            notifications_open: state.notifications_open,
            detail_course: state.detail_course,
            attendance: state.attendance.clone(),
            fragments,
        }
    }

    pub async fn dispatch(&self, action: UiAction) -> HandlerResult {
        debug!(command = action.name(), "coordinator: dispatch");
        match action {
            UiAction::Navigate(section) => self.navigate(section).await,
            UiAction::Login { email, password } => self.login(&email, &password).await,
            UiAction::Register {
                name,
                email,
                password,
                role,
            } => self.register(&name, &email, &password, role).await,
            UiAction::Logout { confirmed } => self.logout(confirmed).await,
            UiAction::SearchCourses(term) => self.search_courses(&term).await,
            UiAction::ViewCourse(course_id) => self.view_course(course_id).await,
            UiAction::CreateCourse(course) => self.create_course(course).await,
            UiAction::Enroll(course_id) => self.enroll(course_id).await,
            UiAction::MarkComplete(course_id) => self.mark_complete(course_id).await,
            UiAction::ViewStudents(course_id) => self.view_students(course_id).await,
            UiAction::CreateAssignment {
                course_id,
                assignment,
            } => self.create_assignment(course_id, assignment).await,
            UiAction::SubmitText {
                assignment_id,
                content,
            } => self.submit_text(assignment_id, &content).await,
            UiAction::SubmitFile {
                assignment_id,
                file,
            } => self.submit_file(assignment_id, file).await,
            UiAction::ViewSubmissions(assignment_id) => {
                self.view_submissions(assignment_id).await
            }
            UiAction::SaveGrade {
                submission_id,
                assignment_id,
                grade,
                feedback,
            } => {
                self.save_grade(submission_id, assignment_id, &grade, &feedback)
                    .await
            }
            UiAction::SelectAttendance { course_id, date } => {
                self.select_attendance(course_id, date).await
            }
            UiAction::SetPresent {
                student_id,
                present,
            } => self.set_present(student_id, present).await,
            UiAction::SaveAttendance => self.save_attendance().await,
            UiAction::UploadMaterial { course_id, file } => {
                self.upload_material(course_id, file).await
            }
            UiAction::PostDiscussion { course_id, content } => {
                self.post_discussion(course_id, &content).await
            }
            UiAction::ToggleNotifications => self.toggle_notifications().await,
            UiAction::MarkAllRead => self.mark_all_read().await,
            UiAction::UpdateProfile(edit) => self.update_profile(edit).await,
            UiAction::DismissMessage => {
                self.dismiss_message().await;
                Ok(())
            }
        }
    }

    pub async fn dismiss_message(&self) {
        self.inner.lock().await.message = None;
    }

    // ---- session -------------------------------------------------------

    /// Adopts a persisted session, if any. Never fails.
    pub async fn restore(&self) -> Option<Session> {
        let session = self.store.load()?;
        self.inner.lock().await.session.set(session.clone());
        self.emit(CoordinatorEvent::SessionChanged(Some(session.clone())));
        self.sync_notifications(&session).await;
        Some(session)
    }

    pub async fn login(&self, email: &str, password: &str) -> HandlerResult {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let result = self.api.login(&request).await;
        let response = self.finish(Some("Login failed"), result).await?;
        let session = response.user;

        self.inner.lock().await.session.set(session.clone());
        if let Err(err) = self.store.save(&session) {
            warn!(%err, "session: unable to persist session");
        }
        self.emit(CoordinatorEvent::SessionChanged(Some(session.clone())));
        self.post_notice(Notice::info("Login successful!")).await;
        self.sync_notifications(&session).await;
        self.navigate(Section::Dashboard).await
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> HandlerResult {
        let request = RegisterRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
            role,
        };
        let result = self.api.register(&request).await;
        self.finish(Some("Registration failed"), result).await?;
        info!(email = %request.email, role = %role, "session: registered");
        self.show(Section::Login).await;
        self.post_notice(Notice::info("Registration successful! Please log in."))
            .await;
        Ok(())
    }

    pub async fn logout(&self, confirmed: bool) -> HandlerResult {
        if !confirmed {
            return Ok(());
        }
        {
            let mut state = self.inner.lock().await;
            state.session.clear();
            state.fragments.clear();
            state.notifications_open = false;
            state.badge = NotificationBadge::default();
            state.detail_course = None;
            state.attendance = AttendanceSheet::default();
        }
        if let Err(err) = self.store.clear() {
            warn!(%err, "session: unable to clear persisted session");
        }
        self.emit(CoordinatorEvent::SessionChanged(None));
        self.emit(CoordinatorEvent::BadgeChanged(None));
        self.show(Section::Home).await;
        self.post_notice(Notice::info("Logged out successfully"))
            .await;
        Ok(())
    }

    pub async fn update_profile(&self, edit: ProfileEdit) -> HandlerResult {
        let session = self
            .guarded(self.require_session("Please log in to edit your profile").await)
            .await?;
        let update = edit.diff(&session);
        if update.is_empty() {
            self.post_notice(Notice::info("No changes to save")).await;
            return Ok(());
        }
        let result = self.api.update_profile(session.id, &update).await;
        let profile = self.finish(Some("Profile update failed"), result).await?;

        let updated = {
            let mut state = self.inner.lock().await;
            state
                .session
                .apply_profile(Some(profile.name), Some(profile.email));
            state.session.current().cloned()
        };
        if let Some(updated) = updated {
            if let Err(err) = self.store.save(&updated) {
                warn!(%err, "session: unable to persist session");
            }
            self.emit(CoordinatorEvent::SessionChanged(Some(updated.clone())));
            self.refresh(DataRequirement::ProfileStats).await?;
        }
        self.post_notice(Notice::info("Profile updated")).await;
        Ok(())
    }

    // ---- navigation ----------------------------------------------------

    /// Shows `section` and loads what it needs for the current role. A
    /// failed load leaves its container untouched and surfaces one message.
    pub async fn navigate(&self, section: Section) -> HandlerResult {
        if section.requires_teacher() {
            self.guarded(
                self.require_role(Role::Teacher, "Only teachers can create courses")
                    .await,
            )
            .await?;
        }
        if section == Section::CourseDetail {
            let detail = self.inner.lock().await.detail_course;
            return match detail {
                Some(course_id) => self.view_course(course_id).await,
                None => {
                    self.guarded(Err(ClientError::guard("Select a course first")))
                        .await
                }
            };
        }
        self.show(section).await;
        self.load_section(section).await
    }

    pub async fn view_course(&self, course_id: CourseId) -> HandlerResult {
        let opened = self.open_course(course_id).await;
        self.finish(Some("Error loading course details"), opened)
            .await?;
        self.load_section(Section::CourseDetail).await
    }

    /// Filters the last fetched catalog without a request.
    pub async fn search_courses(&self, term: &str) -> HandlerResult {
        let fragment = {
            let mut state = self.inner.lock().await;
            state.search_term = term.trim().to_string();
            let matching: Vec<Course> = state
                .catalog
                .iter()
                .filter(|course| render::matches_search(course, &state.search_term))
                .cloned()
                .collect();
            render::course_grid(&matching)
        };
        self.commit(fragment, None).await;
        Ok(())
    }

    // ---- courses -------------------------------------------------------

    pub async fn create_course(&self, course: NewCourse) -> HandlerResult {
        let session = self
            .guarded(
                self.require_role(Role::Teacher, "Only teachers can create courses")
                    .await,
            )
            .await?;
        if [&course.title, &course.description, &course.duration]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return self
                .guarded(Err(ClientError::guard(
                    "Title, description and duration are required",
                )))
                .await;
        }
        let request = CreateCourseRequest {
            title: course.title.trim().to_string(),
            description: course.description.trim().to_string(),
            duration: course.duration.trim().to_string(),
            teacher_id: session.id,
        };
        let result = self.api.create_course(&request).await;
        self.finish(Some("Failed to create course"), result).await?;
        info!(title = %request.title, "courses: created");

        self.post_notice(Notice::info("Course created successfully!"))
            .await;
        self.show(Section::Dashboard).await;
        self.refresh(DataRequirement::TeacherCourses).await
    }

    pub async fn enroll(&self, course_id: CourseId) -> HandlerResult {
        let session = match self.session().await {
            None => {
                self.show(Section::Login).await;
                return self
                    .guarded(Err(ClientError::guard("Please log in to enroll in courses")))
                    .await;
            }
            Some(session) if !session.is_student() => {
                return self
                    .guarded(Err(ClientError::guard("Only students can enroll in courses")))
                    .await;
            }
            Some(session) => session,
        };
        let request = EnrollRequest {
            student_id: session.id,
            course_id,
        };
        let result = self.api.enroll(&request).await;
        self.finish(Some("Enrollment failed"), result).await?;
        info!(course_id = course_id.0, "courses: enrolled");

        self.post_notice(Notice::info("Enrolled successfully!")).await;
        self.refresh(DataRequirement::EnrolledCourses).await?;
        self.view_course(course_id).await
    }

    pub async fn mark_complete(&self, course_id: CourseId) -> HandlerResult {
        let session = self
            .guarded(
                self.require_role(Role::Student, "Only students can complete courses")
                    .await,
            )
            .await?;
        let request = EnrollRequest {
            student_id: session.id,
            course_id,
        };
        let result = self.api.complete_course(&request).await;
        self.finish(Some("Failed to mark course as completed"), result)
            .await?;

        self.post_notice(Notice::info("Course marked as completed"))
            .await;
        self.load_for(DataRequirement::CourseCompletion, Some(course_id))
            .await?;
        self.refresh(DataRequirement::StudentGrades).await
    }

    pub async fn view_students(&self, course_id: CourseId) -> HandlerResult {
        self.guarded(
            self.require_role(Role::Teacher, "Only teachers can view enrolled students")
                .await,
        )
        .await?;
        let result = self.api.course_students(course_id).await;
        let students = self.finish(Some("Error loading students"), result).await?;
        self.commit(render::course_students(&students), None).await;
        Ok(())
    }

    // ---- assignments and grading ----------------------------------------

    pub async fn create_assignment(
        &self,
        course_id: CourseId,
        assignment: NewAssignment,
    ) -> HandlerResult {
        let session = self
            .guarded(
                self.require_role(Role::Teacher, "Only teachers can create assignments")
                    .await,
            )
            .await?;
        if [&assignment.title, &assignment.description, &assignment.due_date]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return self
                .guarded(Err(ClientError::guard(
                    "Title, description and due date are required",
                )))
                .await;
        }
        let request = CreateAssignmentRequest {
            title: assignment.title.trim().to_string(),
            description: assignment.description.trim().to_string(),
            due_date: assignment.due_date.trim().to_string(),
            course_id,
            teacher_id: session.id,
        };
        let result = self.api.create_assignment(&request).await;
        self.finish(Some("Failed to create assignment"), result)
            .await?;
        info!(course_id = course_id.0, title = %request.title, "assignments: created");

        self.post_notice(Notice::info("Assignment created")).await;
        self.refresh(DataRequirement::TeacherAssignments).await
    }

    pub async fn submit_text(&self, assignment_id: AssignmentId, content: &str) -> HandlerResult {
        let session = self
            .guarded(
                self.require_role(Role::Student, "Only students can submit assignments")
                    .await,
            )
            .await?;
        let content = content.trim();
        if content.is_empty() {
            return self
                .guarded(Err(ClientError::guard("Please enter your submission")))
                .await;
        }
        let request = SubmitRequest {
            student_id: session.id,
            assignment_id,
            content: content.to_string(),
        };
        let result = self.api.submit(&request).await;
        self.finish(Some("Submission failed"), result).await?;

        self.post_notice(Notice::info("Assignment submitted")).await;
        self.refresh(DataRequirement::StudentAssignments).await
    }

    pub async fn submit_file(&self, assignment_id: AssignmentId, file: FileUpload) -> HandlerResult {
        let session = self
            .guarded(
                self.require_role(Role::Student, "Only students can submit assignments")
                    .await,
            )
            .await?;
        let filename = file.filename.clone();
        let result = self.api.submit_file(session.id, assignment_id, file).await;
        self.finish(Some("Upload failed"), result).await?;
        info!(assignment_id = assignment_id.0, %filename, "assignments: file submitted");

        self.post_notice(Notice::info("File uploaded successfully"))
            .await;
        self.refresh(DataRequirement::StudentAssignments).await
    }

    pub async fn view_submissions(&self, assignment_id: AssignmentId) -> HandlerResult {
        let session = self
            .guarded(
                self.require_role(Role::Teacher, "Only teachers can view submissions")
                    .await,
            )
            .await?;
        let result = self.api.submissions(assignment_id, session.id).await;
        let submissions = self
            .finish(Some("Error loading submissions"), result)
            .await?;
        self.commit(render::submissions(assignment_id, &submissions), None)
            .await;
        Ok(())
    }

    pub async fn save_grade(
        &self,
        submission_id: SubmissionId,
        assignment_id: AssignmentId,
        grade: &str,
        feedback: &str,
    ) -> HandlerResult {
        let session = self
            .guarded(
                self.require_role(Role::Teacher, "Only teachers can grade submissions")
                    .await,
            )
            .await?;
        let grade = self.guarded(parse_grade_input(grade)).await?;
        let request = GradeRequest {
            teacher_id: session.id,
            grade,
            feedback: feedback.trim().to_string(),
        };
        let result = self.api.grade(submission_id, &request).await;
        let saved = self.finish(Some("Failed to save grade"), result).await?;
        info!(submission_id = saved.submission_id.0, grade = ?saved.grade, "grading: saved");

        self.post_notice(Notice::info("Saved grade")).await;
        self.view_submissions(assignment_id).await
    }

    // ---- attendance ----------------------------------------------------

    /// Changes the selected course and/or date, then reloads the roster.
    pub async fn select_attendance(
        &self,
        course_id: Option<CourseId>,
        date: Option<NaiveDate>,
    ) -> HandlerResult {
        self.guarded(
            self.require_role(Role::Teacher, "Only teachers can take attendance")
                .await,
        )
        .await?;
        let (course_id, date) = {
            let state = self.inner.lock().await;
            let sheet = &state.attendance;
            (
                course_id.or(sheet.course_id),
                date.or(sheet.date).unwrap_or_else(today),
            )
        };
        let result = self.load_attendance_roster(course_id, date).await;
        self.finish(Some("Error loading attendance list"), result)
            .await
    }

    /// Flips one displayed checkbox. No request is sent until save.
    pub async fn set_present(&self, student_id: UserId, present: bool) -> HandlerResult {
        let result = self.try_set_present(student_id, present).await;
        self.finish(None, result).await
    }

    pub async fn save_attendance(&self) -> HandlerResult {
        let result = self.try_save_attendance().await;
        self.finish(Some("Error saving attendance"), result).await?;
        self.post_notice(Notice::info("Attendance saved")).await;
        Ok(())
    }

    // ---- course detail -------------------------------------------------

    pub async fn upload_material(&self, course_id: CourseId, file: FileUpload) -> HandlerResult {
        let session = self
            .guarded(
                self.require_role(Role::Teacher, "Only teachers can upload materials")
                    .await,
            )
            .await?;
        let filename = file.filename.clone();
        let result = self.api.upload_material(course_id, session.id, file).await;
        self.finish(Some("Upload failed"), result).await?;
        info!(course_id = course_id.0, %filename, "materials: uploaded");

        self.post_notice(Notice::info("Material uploaded")).await;
        self.load_for(DataRequirement::CourseMaterials, Some(course_id))
            .await
    }

    pub async fn post_discussion(&self, course_id: CourseId, content: &str) -> HandlerResult {
        let session = self
            .guarded(self.require_session("Please log in to post").await)
            .await?;
        let content = content.trim();
        if content.is_empty() {
            return self
                .guarded(Err(ClientError::guard("Please enter a message")))
                .await;
        }
        let request = DiscussionPostRequest {
            user_id: session.id,
            content: content.to_string(),
        };
        let result = self.api.post_discussion(course_id, &request).await;
        self.finish(Some("Failed to post message"), result).await?;
        self.load_for(DataRequirement::CourseDiscussion, Some(course_id))
            .await
    }

    // ---- notifications -------------------------------------------------

    /// Opening fetches and renders the list; closing sends nothing.
    pub async fn toggle_notifications(&self) -> HandlerResult {
        let session = self
            .guarded(
                self.require_session("Please log in to see notifications")
                    .await,
            )
            .await?;
        let was_open = {
            let mut state = self.inner.lock().await;
            let was_open = state.notifications_open;
            state.notifications_open = !was_open;
            was_open
        };
        if !was_open {
            self.sync_notifications(&session).await;
        }
        Ok(())
    }

    pub async fn mark_all_read(&self) -> HandlerResult {
        let session = self
            .guarded(
                self.require_session("Please log in to see notifications")
                    .await,
            )
            .await?;
        let items = self.fetch_notifications(&session).await;
        let ids = unread_ids(&items);
        if ids.is_empty() {
            return Ok(());
        }
        let count = ids.len();
        let result = self.api.mark_read(&MarkReadRequest { ids }).await;
        self.finish(Some("Error marking notifications"), result)
            .await?;
        info!(count, "notifications: marked read");
        self.sync_notifications(&session).await;
        Ok(())
    }

    // ---- internals -----------------------------------------------------

    fn emit(&self, event: CoordinatorEvent) {
        let _ = self.events.send(event);
    }

    async fn show(&self, section: Section) {
        let changed = {
            let mut state = self.inner.lock().await;
            let changed = state.router.active() != section;
            state.router.show(section);
            changed
        };
        if changed {
            self.emit(CoordinatorEvent::SectionChanged(section));
        }
    }

    /// Writes `fragment` if its container is live; returns whether it was.
    async fn commit(&self, fragment: Fragment, course: Option<CourseId>) -> bool {
        let container = fragment.container;
        let committed = {
            let mut state = self.inner.lock().await;
            let live = state.is_live(container, course);
            if live {
                state.fragments.insert(container, fragment);
            }
            live
        };
        if committed {
            self.emit(CoordinatorEvent::Rendered(container));
        } else {
            debug!(container = container.name(), "render: dropped stale fragment");
        }
        committed
    }

    async fn post_notice(&self, notice: Notice) {
        self.inner.lock().await.message = Some(notice.clone());
        self.emit(CoordinatorEvent::Message(notice));
    }

    async fn report(&self, context: Option<&str>, err: &ClientError) {
        if err.is_guard() {
            info!(%err, "coordinator: action rejected by guard");
        } else {
            warn!(%err, "coordinator: action failed");
        }
        self.post_notice(Notice::from_error(context, err)).await;
    }

    /// Surfaces a failed `result` as the current message and passes it on.
    async fn finish<T>(&self, context: Option<&str>, result: HandlerResult<T>) -> HandlerResult<T> {
        if let Err(err) = &result {
            self.report(context, err).await;
        }
        result
    }

    async fn guarded<T>(&self, result: HandlerResult<T>) -> HandlerResult<T> {
        self.finish(None, result).await
    }

    async fn require_session(&self, message: &str) -> HandlerResult<Session> {
        self.session()
            .await
            .ok_or_else(|| ClientError::guard(message))
    }

    async fn require_role(&self, role: Role, message: &str) -> HandlerResult<Session> {
        match self.session().await {
            Some(session) if session.role == role => Ok(session),
            _ => Err(ClientError::guard(message)),
        }
    }

    async fn open_course(&self, course_id: CourseId) -> HandlerResult {
        let courses = self.api.list_courses().await?;
        let course = courses
            .into_iter()
            .find(|course| course.id == course_id)
            .ok_or_else(|| ClientError::NotFound("Course not found".to_string()))?;
        let session = {
            let mut state = self.inner.lock().await;
            state.detail_course = Some(course_id);
            state.session.current().cloned()
        };
        self.show(Section::CourseDetail).await;
        self.commit(render::course_header(&course, session.as_ref()), Some(course_id))
            .await;
        Ok(())
    }

    /// Loads every requirement of `section` concurrently and reports the
    /// first failure.
    async fn load_section(&self, section: Section) -> HandlerResult {
        let role = self.inner.lock().await.session.role();
        let loads = section
            .required_data(role)
            .iter()
            .map(|requirement| async move { (*requirement, self.load(*requirement).await) });
        let mut first_failure = None;
        for (requirement, result) in join_all(loads).await {
            if let Err(err) = result {
                warn!(?requirement, %err, "coordinator: load failed");
                first_failure.get_or_insert((requirement, err));
            }
        }
        match first_failure {
            Some((requirement, err)) => {
                self.post_notice(Notice::from_error(Some(requirement.error_context()), &err))
                    .await;
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Re-fetches one requirement after a mutation, reporting failure.
    async fn refresh(&self, requirement: DataRequirement) -> HandlerResult {
        let result = self.load(requirement).await;
        self.finish(Some(requirement.error_context()), result).await
    }

    async fn load(&self, requirement: DataRequirement) -> HandlerResult {
        let detail = self.inner.lock().await.detail_course;
        self.load_for(requirement, detail).await
    }

    /// Fetches and renders one requirement. `course` scopes the course-detail
    /// containers. Optional data that fails degrades in place.
    async fn load_for(
        &self,
        requirement: DataRequirement,
        course: Option<CourseId>,
    ) -> HandlerResult {
        let session = self.session().await;
        match self.fetch(requirement, session.as_ref(), course).await {
            Err(err) if requirement.is_optional() => {
                warn!(?requirement, %err, "coordinator: optional data unavailable");
                if let Some(fragment) = unavailable(requirement, session.as_ref()) {
                    self.commit(fragment, course).await;
                }
                Ok(())
            }
            result => result,
        }
    }

    async fn fetch(
        &self,
        requirement: DataRequirement,
        session: Option<&Session>,
        course: Option<CourseId>,
    ) -> HandlerResult {
        match (requirement, session, course) {
            (DataRequirement::AllCourses, _, _) => self.load_catalog().await,
            (DataRequirement::CourseMaterials, _, Some(course_id)) => {
                let items = self.api.materials(course_id).await?;
                self.commit(render::materials(&items), Some(course_id)).await;
                Ok(())
            }
            (DataRequirement::CourseDiscussion, _, Some(course_id)) => {
                let posts = self.api.discussion(course_id).await?;
                self.commit(render::discussion(&posts), Some(course_id))
                    .await;
                Ok(())
            }
            (DataRequirement::CourseCompletion, Some(session), Some(course_id)) => {
                let status = self.api.completion(course_id, session.id).await?;
                self.commit(render::completion(course_id, status), Some(course_id))
                    .await;
                Ok(())
            }
            (
                DataRequirement::CourseMaterials
                | DataRequirement::CourseDiscussion
                | DataRequirement::CourseCompletion,
                _,
                _,
            ) => Ok(()),
            (DataRequirement::EnrolledCourses, Some(session), _) => {
                let courses = self.api.my_courses(session.id).await?;
                self.commit(render::enrolled_courses(&courses), None).await;
                Ok(())
            }
            (DataRequirement::StudentAssignments, Some(session), _) => {
                let assignments = self.api.student_assignments(session.id).await?;
                self.commit(render::student_assignments(&assignments), None)
                    .await;
                Ok(())
            }
            (DataRequirement::StudentAttendance, Some(session), _) => {
                let summaries = self.api.student_attendance(session.id).await?;
                self.commit(render::student_attendance(&summaries), None)
                    .await;
                Ok(())
            }
            (DataRequirement::StudentGrades, Some(session), _) => {
                let grades = self.api.student_grades(session.id).await?;
                self.commit(render::student_grades(&grades), None).await;
                Ok(())
            }
            (DataRequirement::TeacherCourses, Some(session), _) => {
                let courses = self.teacher_courses(session).await?;
                self.commit(render::teacher_courses(&courses), None).await;
                Ok(())
            }
            (DataRequirement::TeacherAssignments, Some(session), _) => {
                self.load_teacher_assignments(session).await
            }
            (DataRequirement::AttendanceRoster, Some(session), _) => {
                self.init_attendance(session).await
            }
            (DataRequirement::ProfileStats, Some(session), _) => {
                let stats = self.profile_stats(session).await?;
                self.commit(render::profile(session, &stats), None).await;
                Ok(())
            }
            (_, None, _) => Ok(()),
        }
    }

    async fn load_catalog(&self) -> HandlerResult {
        let courses = self.api.list_courses().await?;
        let fragment = {
            let mut state = self.inner.lock().await;
            let matching: Vec<Course> = courses
                .iter()
                .filter(|course| render::matches_search(course, &state.search_term))
                .cloned()
                .collect();
            state.catalog = courses;
            render::course_grid(&matching)
        };
        self.commit(fragment, None).await;
        Ok(())
    }

    async fn teacher_courses(&self, session: &Session) -> HandlerResult<Vec<Course>> {
        let courses = self.api.list_courses().await?;
        Ok(courses
            .into_iter()
            .filter(|course| course.taught_by(session))
            .collect())
    }

    async fn teacher_assignment_lists(
        &self,
        session: &Session,
    ) -> HandlerResult<Vec<(Course, Vec<Assignment>)>> {
        let courses = self.teacher_courses(session).await?;
        let lists = join_all(
            courses
                .iter()
                .map(|course| self.api.course_assignments(course.id)),
        )
        .await;
        Ok(courses
            .into_iter()
            .zip(lists)
            .map(|(course, list)| {
                let assignments = list.unwrap_or_else(|err| {
                    warn!(course_id = course.id.0, %err, "coordinator: course assignments unavailable");
                    Vec::new()
                });
                (course, assignments)
            })
            .collect())
    }

    async fn load_teacher_assignments(&self, session: &Session) -> HandlerResult {
        let per_course = self.teacher_assignment_lists(session).await?;
        self.commit(render::teacher_assignments(&per_course), None)
            .await;
        Ok(())
    }

    /// Picks the course and date for the teacher's attendance form and loads
    /// its roster. The previous selection is kept while it is still taught.
    async fn init_attendance(&self, session: &Session) -> HandlerResult {
        let courses = self.teacher_courses(session).await?;
        let (course_id, date) = {
            let mut state = self.inner.lock().await;
            let sheet = &mut state.attendance;
            let course_id = match sheet.course_id {
                Some(selected) if courses.iter().any(|course| course.id == selected) => {
                    Some(selected)
                }
                _ => courses.first().map(|course| course.id),
            };
            let date = sheet.date.unwrap_or_else(today);
            sheet.courses = courses;
            (course_id, date)
        };
        self.load_attendance_roster(course_id, date).await
    }

    /// Joins the enrolled students with the marks already stored for
    /// (course, date). The sheet's selection and rows change together, and
    /// only once both fetches succeed.
    async fn load_attendance_roster(
        &self,
        course_id: Option<CourseId>,
        date: NaiveDate,
    ) -> HandlerResult {
        let session = self
            .require_role(Role::Teacher, "Only teachers can take attendance")
            .await?;
        let generation = {
            let mut state = self.inner.lock().await;
            state.roster_generation += 1;
            state.roster_generation
        };

        let (rows, fragment) = match course_id {
            None => {
                let placeholder = if self.inner.lock().await.attendance.courses.is_empty() {
                    "No courses available."
                } else {
                    "Select a course."
                };
                (
                    Vec::new(),
                    Fragment::placeholder(Container::AttendanceList, placeholder),
                )
            }
            Some(course_id) => {
                let (students, marks) = tokio::try_join!(
                    self.api.course_students(course_id),
                    self.api.course_attendance(course_id, date, session.id),
                )?;
                let present: HashMap<UserId, bool> = marks
                    .records
                    .iter()
                    .map(|mark| (mark.student_id, mark.present))
                    .collect();
                let rows: Vec<AttendanceRow> = students
                    .into_iter()
                    .map(|student| AttendanceRow {
                        present: present.get(&student.id).copied().unwrap_or(false),
                        student,
                    })
                    .collect();
                let fragment = render::attendance_list(course_id, &rows);
                (rows, fragment)
            }
        };

        let committed = {
            let mut state = self.inner.lock().await;
            let live = state.roster_generation == generation
                && state.is_live(Container::AttendanceList, None);
            if live {
                let sheet = &mut state.attendance;
                sheet.course_id = course_id;
                sheet.date = Some(date);
                sheet.rows = rows;
                state.fragments.insert(Container::AttendanceList, fragment);
            }
            live
        };
        if committed {
            self.emit(CoordinatorEvent::Rendered(Container::AttendanceList));
        } else {
            debug!(course_id = ?course_id, %date, "render: dropped stale attendance roster");
        }
        Ok(())
    }

    async fn try_set_present(&self, student_id: UserId, present: bool) -> HandlerResult {
        self.require_role(Role::Teacher, "Only teachers can take attendance")
            .await?;
        let fragment = {
            let mut state = self.inner.lock().await;
            let sheet = &mut state.attendance;
            let course_id = sheet
                .course_id
                .ok_or_else(|| ClientError::guard("Select a course first"))?;
            let row = sheet
                .rows
                .iter_mut()
                .find(|row| row.student.id == student_id)
                .ok_or_else(|| {
                    ClientError::NotFound(format!("Student {student_id} is not on the list"))
                })?;
            row.present = present;
            render::attendance_list(course_id, &sheet.rows)
        };
        self.commit(fragment, None).await;
        Ok(())
    }

    async fn try_save_attendance(&self) -> HandlerResult {
        let session = self
            .require_role(Role::Teacher, "Only teachers can take attendance")
            .await?;
        let request = {
            let state = self.inner.lock().await;
            let sheet = &state.attendance;
            let course_id = sheet
                .course_id
                .ok_or_else(|| ClientError::guard("Select a course first"))?;
            MarkAttendanceRequest {
                teacher_id: session.id,
                course_id,
                date: sheet.date.unwrap_or_else(today),
                records: sheet
                    .rows
                    .iter()
                    .map(|row| AttendanceEntry {
                        student_id: row.student.id,
                        present: row.present,
                    })
                    .collect(),
            }
        };
        self.api.mark_attendance(&request).await?;
        info!(
            course_id = request.course_id.0,
            date = %request.date,
            present = request.records.iter().filter(|entry| entry.present).count(),
            total = request.records.len(),
            "attendance: saved"
        );
        Ok(())
    }

    async fn count_teacher_submissions(&self, session: &Session) -> HandlerResult<usize> {
        let per_course = self.teacher_assignment_lists(session).await?;
        let lists = join_all(
            per_course
                .iter()
                .flat_map(|(_, assignments)| assignments)
                .map(|assignment| self.api.submissions(assignment.id, session.id)),
        )
        .await;
        Ok(lists
            .into_iter()
            .map(|list| list.map(|submissions| submissions.len()).unwrap_or(0))
            .sum())
    }

    async fn profile_stats(&self, session: &Session) -> HandlerResult<ProfileStats> {
        match session.role {
            Role::Student => {
                let (courses, grades) = tokio::try_join!(
                    self.api.my_courses(session.id),
                    self.api.student_grades(session.id),
                )?;
                Ok(ProfileStats::for_student(courses.len(), &grades))
            }
            Role::Teacher => Ok(ProfileStats::for_teacher(
                self.count_teacher_submissions(session).await?,
            )),
        }
    }

    async fn fetch_notifications(&self, session: &Session) -> Vec<Notification> {
        match self.api.notifications(session.id).await {
            Ok(items) => items,
            Err(err) => {
                warn!(%err, "notifications: fetch failed, showing none");
                Vec::new()
            }
        }
    }

    async fn sync_notifications(&self, session: &Session) {
        let items = self.fetch_notifications(session).await;
        let badge = NotificationBadge::from_items(&items);
        self.inner.lock().await.badge = badge;
        self.emit(CoordinatorEvent::BadgeChanged(badge.label()));
        self.commit(render::notification_list(&items), None).await;
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
