//! Mutually exclusive page sections and the data each one needs.

use std::fmt;

use shared::domain::Role;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Section {
    #[default]
    Home,
    Courses,
    CourseDetail,
    Dashboard,
    Login,
    Register,
    CreateCourse,
    Profile,
}

impl Section {
    pub const ALL: [Section; 8] = [
        Section::Home,
        Section::Courses,
        Section::CourseDetail,
        Section::Dashboard,
        Section::Login,
        Section::Register,
        Section::CreateCourse,
        Section::Profile,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Section::Home => "home",
            Section::Courses => "course-catalog",
            Section::CourseDetail => "course-detail",
            Section::Dashboard => "dashboard",
            Section::Login => "login",
            Section::Register => "register",
            Section::CreateCourse => "create-course",
            Section::Profile => "profile",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.name() == name)
    }

    /// Fetches a transition into this section triggers for the given role.
    pub fn required_data(self, role: Option<Role>) -> &'static [DataRequirement] {
        use DataRequirement::*;
        match (self, role) {
            (Section::Courses, _) => &[AllCourses],
            (Section::Dashboard, Some(Role::Student)) => &[
                EnrolledCourses,
                StudentAssignments,
                StudentAttendance,
                StudentGrades,
            ],
            (Section::Dashboard, Some(Role::Teacher)) => {
                &[TeacherCourses, TeacherAssignments, AttendanceRoster]
            }
            (Section::CourseDetail, Some(Role::Student)) => {
                &[CourseMaterials, CourseDiscussion, CourseCompletion]
            }
            (Section::CourseDetail, _) => &[CourseMaterials, CourseDiscussion],
            (Section::Profile, Some(_)) => &[ProfileStats],
            _ => &[],
        }
    }

    /// Sections only a teacher may open.
    pub fn requires_teacher(self) -> bool {
        matches!(self, Section::CreateCourse)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataRequirement {
    AllCourses,
    EnrolledCourses,
    StudentAssignments,
    StudentAttendance,
    StudentGrades,
    TeacherCourses,
    TeacherAssignments,
    AttendanceRoster,
    CourseMaterials,
    CourseDiscussion,
    CourseCompletion,
    ProfileStats,
}

impl DataRequirement {
    pub fn container(self) -> Container {
        match self {
            DataRequirement::AllCourses => Container::CourseGrid,
            DataRequirement::EnrolledCourses => Container::EnrolledCourses,
            DataRequirement::StudentAssignments => Container::StudentAssignments,
            DataRequirement::StudentAttendance => Container::StudentAttendance,
            DataRequirement::StudentGrades => Container::StudentGrades,
            DataRequirement::TeacherCourses => Container::TeacherCourses,
            DataRequirement::TeacherAssignments => Container::TeacherAssignments,
            DataRequirement::AttendanceRoster => Container::AttendanceList,
            DataRequirement::CourseMaterials => Container::Materials,
            DataRequirement::CourseDiscussion => Container::Discussion,
            DataRequirement::CourseCompletion => Container::Completion,
            DataRequirement::ProfileStats => Container::ProfileStats,
        }
    }

    /// Prefix of the message shown when this fetch fails.
    pub fn error_context(self) -> &'static str {
        match self {
            DataRequirement::AllCourses => "Error loading courses",
            DataRequirement::EnrolledCourses => "Error loading enrolled courses",
            DataRequirement::StudentAssignments | DataRequirement::TeacherAssignments => {
                "Error loading assignments"
            }
            DataRequirement::StudentAttendance => "Error loading attendance",
            DataRequirement::StudentGrades => "Error loading grades",
            DataRequirement::TeacherCourses => "Error loading courses",
            DataRequirement::AttendanceRoster => "Error loading attendance list",
            DataRequirement::CourseMaterials => "Error loading materials",
            DataRequirement::CourseDiscussion => "Error loading discussion",
            DataRequirement::CourseCompletion => "Error loading completion status",
            DataRequirement::ProfileStats => "Error loading profile",
        }
    }

    /// Course-detail extras and profile counters degrade to placeholders
    /// instead of failing the transition.
    pub fn is_optional(self) -> bool {
        matches!(
            self,
            DataRequirement::CourseMaterials
                | DataRequirement::CourseDiscussion
                | DataRequirement::CourseCompletion
                | DataRequirement::ProfileStats
        )
    }
}

/// A render target. Each lives inside one section, except the notification
/// list which sits in the always-visible header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Container {
    CourseGrid,
    CourseHeader,
    Materials,
    Discussion,
    Completion,
    EnrolledCourses,
    StudentAssignments,
    StudentAttendance,
    StudentGrades,
    TeacherCourses,
    TeacherAssignments,
    StudentSubmissions,
    CourseStudents,
    AttendanceList,
    ProfileStats,
    NotificationList,
}

impl Container {
    pub fn section(self) -> Option<Section> {
        match self {
            Container::CourseGrid => Some(Section::Courses),
            Container::CourseHeader
            | Container::Materials
            | Container::Discussion
            | Container::Completion => Some(Section::CourseDetail),
            Container::EnrolledCourses
            | Container::StudentAssignments
            | Container::StudentAttendance
            | Container::StudentGrades
            | Container::TeacherCourses
            | Container::TeacherAssignments
            | Container::StudentSubmissions
            | Container::CourseStudents
            | Container::AttendanceList => Some(Section::Dashboard),
            Container::ProfileStats => Some(Section::Profile),
            Container::NotificationList => None,
        }
    }

    /// Role whose layout contains this container, if it is role-specific.
    pub fn role(self) -> Option<Role> {
        match self {
            Container::EnrolledCourses
            | Container::StudentAssignments
            | Container::StudentAttendance
            | Container::StudentGrades
            | Container::Completion => Some(Role::Student),
            Container::TeacherCourses
            | Container::TeacherAssignments
            | Container::StudentSubmissions
            | Container::CourseStudents
            | Container::AttendanceList => Some(Role::Teacher),
            _ => None,
        }
    }

    pub fn is_course_scoped(self) -> bool {
        self.section() == Some(Section::CourseDetail)
    }

    pub fn name(self) -> &'static str {
        match self {
            Container::CourseGrid => "courseGrid",
            Container::CourseHeader => "courseDetail",
            Container::Materials => "materialsList",
            Container::Discussion => "discussionList",
            Container::Completion => "completeCourse",
            Container::EnrolledCourses => "enrolledCourses",
            Container::StudentAssignments => "studentAssignments",
            Container::StudentAttendance => "studentAttendance",
            Container::StudentGrades => "studentGrades",
            Container::TeacherCourses => "teacherCourses",
            Container::TeacherAssignments => "teacherAssignments",
            Container::StudentSubmissions => "studentSubmissions",
            Container::CourseStudents => "courseStudents",
            Container::AttendanceList => "attendanceList",
            Container::ProfileStats => "profileStats",
            Container::NotificationList => "notifList",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SectionRouter {
    active: Section,
}

impl SectionRouter {
    pub fn active(&self) -> Section {
        self.active
    }

    /// Makes `section` the only visible one. Loads nothing by itself.
    pub fn show(&mut self, section: Section) {
        if self.active != section {
            info!(from = %self.active, to = %section, "router: section changed");
        }
        self.active = section;
    }

    pub fn is_visible(&self, section: Section) -> bool {
        self.active == section
    }

    /// Whether `container` exists in the current layout for `role`.
    pub fn is_present(&self, container: Container, role: Option<Role>) -> bool {
        let in_section = match container.section() {
            Some(section) => self.is_visible(section),
            None => role.is_some(),
        };
        let role_matches = match container.role() {
            Some(required) => role == Some(required),
            None => true,
        };
        in_section && role_matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_section_is_visible() {
        let mut router = SectionRouter::default();
        router.show(Section::Dashboard);
        let visible: Vec<_> = Section::ALL
            .into_iter()
            .filter(|section| router.is_visible(*section))
            .collect();
        assert_eq!(visible, vec![Section::Dashboard]);
    }

    #[test]
    fn dashboard_requirements_follow_role() {
        assert!(Section::Dashboard.required_data(None).is_empty());
        assert!(Section::Dashboard
            .required_data(Some(Role::Student))
            .contains(&DataRequirement::StudentGrades));
        assert!(!Section::Dashboard
            .required_data(Some(Role::Teacher))
            .contains(&DataRequirement::StudentGrades));
        assert_eq!(
            Section::Courses.required_data(Some(Role::Teacher)),
            &[DataRequirement::AllCourses]
        );
        assert!(Section::Login.required_data(Some(Role::Student)).is_empty());
    }

    #[test]
    fn role_specific_containers_are_hidden_from_other_roles() {
        let mut router = SectionRouter::default();
        router.show(Section::Dashboard);
        assert!(router.is_present(Container::AttendanceList, Some(Role::Teacher)));
        assert!(!router.is_present(Container::AttendanceList, Some(Role::Student)));
        assert!(!router.is_present(Container::CourseGrid, Some(Role::Teacher)));
        assert!(router.is_present(Container::NotificationList, Some(Role::Student)));
        assert!(!router.is_present(Container::NotificationList, None));
    }

    #[test]
    fn section_names_round_trip() {
        for section in Section::ALL {
            assert_eq!(Section::from_name(section.name()), Some(section));
        }
    }
}
