//! Client core for the campus learning platform: session ownership, section
//! routing, remote API calls and the render contract consumed by front ends.

pub mod api;
pub mod coordinator;
pub mod error;
pub mod notifications;
pub mod render;
pub mod router;
pub mod session;

pub use api::{ApiResult, CourseApi, FileUpload, HttpCourseApi};
pub use coordinator::{
    parse_grade_input, AttendanceSheet, Coordinator, CoordinatorEvent, HandlerResult,
    NewAssignment, NewCourse, ProfileEdit, UiAction, ViewSnapshot,
};
pub use error::{ClientError, Notice, Severity};
pub use notifications::NotificationBadge;
pub use render::{Binding, BoundAction, Fragment, FragmentBody, Marker, ViewItem};
pub use router::{Container, DataRequirement, Section, SectionRouter};
pub use session::{FileSessionStore, MemorySessionStore, SessionState, SessionStore};
