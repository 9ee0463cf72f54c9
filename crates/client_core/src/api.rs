//! The remote course API seam and its reqwest binding.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{AssignmentId, CourseId, SubmissionId, UserId},
    error::ApiError,
    protocol::{
        Ack, Assignment, AttendanceSummary, CompletionStatus, Course, CourseAttendance,
        CourseGrades, CreateAssignmentRequest, CreateCourseRequest, DiscussionPost,
        DiscussionPostRequest, EnrollRequest, GradeRequest, GradeResponse, LoginRequest,
        LoginResponse, MarkAttendanceRequest, MarkReadRequest, Material, Notification,
        ProfileUpdate, RegisterRequest, StudentRecord, Submission, SubmitRequest, UserProfile,
    },
};
use tracing::debug;

use crate::error::ClientError;

pub type ApiResult<T> = std::result::Result<T, ClientError>;

/// A file picked by the user for a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let mime_type = mime_guess::from_path(&filename)
            .first()
            .map(|mime| mime.essence_str().to_string());
        Self {
            filename,
            mime_type,
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        Ok(Self::new(filename, bytes))
    }

    fn into_part(self) -> ApiResult<Part> {
        let part = Part::bytes(self.bytes).file_name(self.filename);
        match self.mime_type {
            Some(mime) => Ok(part.mime_str(&mime)?),
            None => Ok(part),
        }
    }
}

#[async_trait]
pub trait CourseApi: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> ApiResult<Ack>;
    async fn login(&self, request: &LoginRequest) -> ApiResult<LoginResponse>;

    async fn list_courses(&self) -> ApiResult<Vec<Course>>;
    async fn create_course(&self, request: &CreateCourseRequest) -> ApiResult<Ack>;
    async fn my_courses(&self, student_id: UserId) -> ApiResult<Vec<Course>>;
    async fn course_students(&self, course_id: CourseId) -> ApiResult<Vec<StudentRecord>>;

    async fn enroll(&self, request: &EnrollRequest) -> ApiResult<Ack>;
    async fn complete_course(&self, request: &EnrollRequest) -> ApiResult<Ack>;
    async fn completion(
        &self,
        course_id: CourseId,
        student_id: UserId,
    ) -> ApiResult<CompletionStatus>;

    async fn create_assignment(&self, request: &CreateAssignmentRequest) -> ApiResult<Ack>;
    async fn student_assignments(&self, student_id: UserId) -> ApiResult<Vec<Assignment>>;
    async fn course_assignments(&self, course_id: CourseId) -> ApiResult<Vec<Assignment>>;
    async fn submit(&self, request: &SubmitRequest) -> ApiResult<Ack>;
    async fn submit_file(
        &self,
        student_id: UserId,
        assignment_id: AssignmentId,
        file: FileUpload,
    ) -> ApiResult<Ack>;
    async fn submissions(
        &self,
        assignment_id: AssignmentId,
        teacher_id: UserId,
    ) -> ApiResult<Vec<Submission>>;
    async fn grade(
        &self,
        submission_id: SubmissionId,
        request: &GradeRequest,
    ) -> ApiResult<GradeResponse>;
    async fn student_grades(&self, student_id: UserId) -> ApiResult<Vec<CourseGrades>>;

    async fn student_attendance(&self, student_id: UserId) -> ApiResult<Vec<AttendanceSummary>>;
    async fn course_attendance(
        &self,
        course_id: CourseId,
        date: NaiveDate,
        teacher_id: UserId,
    ) -> ApiResult<CourseAttendance>;
    async fn mark_attendance(&self, request: &MarkAttendanceRequest) -> ApiResult<Ack>;

    async fn materials(&self, course_id: CourseId) -> ApiResult<Vec<Material>>;
    async fn upload_material(
        &self,
        course_id: CourseId,
        uploader_id: UserId,
        file: FileUpload,
    ) -> ApiResult<Ack>;

    async fn discussion(&self, course_id: CourseId) -> ApiResult<Vec<DiscussionPost>>;
    async fn post_discussion(
        &self,
        course_id: CourseId,
        request: &DiscussionPostRequest,
    ) -> ApiResult<Ack>;

    async fn notifications(&self, user_id: UserId) -> ApiResult<Vec<Notification>>;
    async fn mark_read(&self, request: &MarkReadRequest) -> ApiResult<Ack>;

    async fn update_profile(
        &self,
        user_id: UserId,
        request: &ProfileUpdate,
    ) -> ApiResult<UserProfile>;
}

/// `CourseApi` over HTTP. `base_url` is the API root, e.g.
/// `http://localhost:5000/api`.
#[derive(Debug, Clone)]
pub struct HttpCourseApi {
    http: Client,
    base_url: String,
}

impl HttpCourseApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> ApiResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "api: response");
        if !status.is_success() {
            let fallback = status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string();
            let message = match response.json::<ApiError>().await {
                Ok(body) if !body.error.is_empty() => body.error,
                _ => fallback,
            };
            return Err(ClientError::rejected(status.as_u16(), message));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl CourseApi for HttpCourseApi {
    async fn register(&self, request: &RegisterRequest) -> ApiResult<Ack> {
        self.send(self.http.post(self.url("/register")).json(request))
            .await
    }

    async fn login(&self, request: &LoginRequest) -> ApiResult<LoginResponse> {
        self.send(self.http.post(self.url("/login")).json(request))
            .await
    }

    async fn list_courses(&self) -> ApiResult<Vec<Course>> {
        self.send(self.http.get(self.url("/courses"))).await
    }

    async fn create_course(&self, request: &CreateCourseRequest) -> ApiResult<Ack> {
        self.send(self.http.post(self.url("/courses")).json(request))
            .await
    }

    async fn my_courses(&self, student_id: UserId) -> ApiResult<Vec<Course>> {
        self.send(self.http.get(self.url(&format!("/my-courses/{student_id}"))))
            .await
    }

    async fn course_students(&self, course_id: CourseId) -> ApiResult<Vec<StudentRecord>> {
        self.send(
            self.http
                .get(self.url(&format!("/course-students/{course_id}"))),
        )
        .await
    }

    async fn enroll(&self, request: &EnrollRequest) -> ApiResult<Ack> {
        self.send(self.http.post(self.url("/enroll")).json(request))
            .await
    }

    async fn complete_course(&self, request: &EnrollRequest) -> ApiResult<Ack> {
        self.send(self.http.post(self.url("/course/complete")).json(request))
            .await
    }

    async fn completion(
        &self,
        course_id: CourseId,
        student_id: UserId,
    ) -> ApiResult<CompletionStatus> {
        self.send(
            self.http
                .get(self.url(&format!("/course/{course_id}/completion")))
                .query(&[("student_id", student_id.0)]),
        )
        .await
    }

    async fn create_assignment(&self, request: &CreateAssignmentRequest) -> ApiResult<Ack> {
        self.send(self.http.post(self.url("/assignments")).json(request))
            .await
    }

    async fn student_assignments(&self, student_id: UserId) -> ApiResult<Vec<Assignment>> {
        self.send(
            self.http
                .get(self.url(&format!("/student/{student_id}/assignments"))),
        )
        .await
    }

    async fn course_assignments(&self, course_id: CourseId) -> ApiResult<Vec<Assignment>> {
        self.send(
            self.http
                .get(self.url(&format!("/course/{course_id}/assignments"))),
        )
        .await
    }

    async fn submit(&self, request: &SubmitRequest) -> ApiResult<Ack> {
        self.send(self.http.post(self.url("/submit")).json(request))
            .await
    }

    async fn submit_file(
        &self,
        student_id: UserId,
        assignment_id: AssignmentId,
        file: FileUpload,
    ) -> ApiResult<Ack> {
        let form = Form::new()
            .text("student_id", student_id.to_string())
            .text("assignment_id", assignment_id.to_string())
            .part("file", file.into_part()?);
        self.send(self.http.post(self.url("/submit-file")).multipart(form))
            .await
    }

    async fn submissions(
        &self,
        assignment_id: AssignmentId,
        teacher_id: UserId,
    ) -> ApiResult<Vec<Submission>> {
        self.send(
            self.http
                .get(self.url(&format!("/assignment/{assignment_id}/submissions")))
                .query(&[("teacher_id", teacher_id.0)]),
        )
        .await
    }

    async fn grade(
        &self,
        submission_id: SubmissionId,
        request: &GradeRequest,
    ) -> ApiResult<GradeResponse> {
        self.send(
            self.http
                .post(self.url(&format!("/submission/{submission_id}/grade")))
                .json(request),
        )
        .await
    }

    async fn student_grades(&self, student_id: UserId) -> ApiResult<Vec<CourseGrades>> {
        self.send(
            self.http
                .get(self.url(&format!("/grades/student/{student_id}"))),
        )
        .await
    }

    async fn student_attendance(&self, student_id: UserId) -> ApiResult<Vec<AttendanceSummary>> {
        self.send(
            self.http
                .get(self.url(&format!("/attendance/student/{student_id}"))),
        )
        .await
    }

    async fn course_attendance(
        &self,
        course_id: CourseId,
        date: NaiveDate,
        teacher_id: UserId,
    ) -> ApiResult<CourseAttendance> {
        self.send(
            self.http
                .get(self.url(&format!("/attendance/course/{course_id}")))
                .query(&[
                    ("date", date.format("%Y-%m-%d").to_string()),
                    ("teacher_id", teacher_id.to_string()),
                ]),
        )
        .await
    }

    async fn mark_attendance(&self, request: &MarkAttendanceRequest) -> ApiResult<Ack> {
        self.send(self.http.post(self.url("/attendance/mark")).json(request))
            .await
    }

    async fn materials(&self, course_id: CourseId) -> ApiResult<Vec<Material>> {
        self.send(
            self.http
                .get(self.url(&format!("/course/{course_id}/materials"))),
        )
        .await
    }

    async fn upload_material(
        &self,
        course_id: CourseId,
        uploader_id: UserId,
        file: FileUpload,
    ) -> ApiResult<Ack> {
        let form = Form::new()
            .text("uploader_id", uploader_id.to_string())
            .part("file", file.into_part()?);
        self.send(
            self.http
                .post(self.url(&format!("/course/{course_id}/materials")))
                .multipart(form),
        )
        .await
    }

    async fn discussion(&self, course_id: CourseId) -> ApiResult<Vec<DiscussionPost>> {
        self.send(
            self.http
                .get(self.url(&format!("/course/{course_id}/discussion"))),
        )
        .await
    }

    async fn post_discussion(
        &self,
        course_id: CourseId,
        request: &DiscussionPostRequest,
    ) -> ApiResult<Ack> {
        self.send(
            self.http
                .post(self.url(&format!("/course/{course_id}/discussion")))
                .json(request),
        )
        .await
    }

    async fn notifications(&self, user_id: UserId) -> ApiResult<Vec<Notification>> {
        self.send(self.http.get(self.url(&format!("/notifications/{user_id}"))))
            .await
    }

    async fn mark_read(&self, request: &MarkReadRequest) -> ApiResult<Ack> {
        self.send(
            self.http
                .post(self.url("/notifications/mark-read"))
                .json(request),
        )
        .await
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        request: &ProfileUpdate,
    ) -> ApiResult<UserProfile> {
        self.send(self.http.put(self.url(&format!("/user/{user_id}"))).json(request))
            .await
    }
}
