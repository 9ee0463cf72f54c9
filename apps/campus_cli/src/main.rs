use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    Coordinator, FileSessionStore, FileUpload, HandlerResult, HttpCourseApi, NewAssignment,
    NewCourse, ProfileEdit, Section, UiAction,
};
use shared::domain::{AssignmentId, CourseId, Role, SubmissionId};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;
mod output;

use config::{load_settings, normalize_api_url, prepare_data_dir, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(name = "campus", about = "Command-line client for the campus learning platform")]
struct Args {
    /// API root, e.g. http://localhost:5000/api
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Directory holding the persisted session
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Student,
    Teacher,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Student => Role::Student,
            RoleArg::Teacher => Role::Teacher,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        name: String,
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, value_enum, default_value = "student")]
        role: RoleArg,
    },
    Logout {
        /// Confirm the logout
        #[arg(long)]
        yes: bool,
    },
    Courses {
        #[arg(long)]
        search: Option<String>,
    },
    Course {
        id: i64,
    },
    Enroll {
        id: i64,
    },
    Complete {
        id: i64,
    },
    Dashboard,
    Submit {
        assignment: i64,
        text: String,
    },
    SubmitFile {
        assignment: i64,
        path: PathBuf,
    },
    Submissions {
        assignment: i64,
    },
    Grade {
        submission: i64,
        assignment: i64,
        /// Leave empty to clear the grade
        #[arg(long, default_value = "")]
        grade: String,
        #[arg(long, default_value = "")]
        feedback: String,
    },
    Attendance {
        course: i64,
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Students marked present; everyone else on the roster is absent
        #[arg(long, num_args = 1..)]
        present: Vec<i64>,
        #[arg(long)]
        save: bool,
    },
    CreateCourse {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        duration: String,
    },
    CreateAssignment {
        course: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        due_date: String,
    },
    Discuss {
        course: i64,
        text: String,
    },
    UploadMaterial {
        course: i64,
        path: PathBuf,
    },
    Notifications,
    MarkRead,
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
}

async fn read_upload(path: &Path) -> Result<FileUpload> {
    FileUpload::from_path(path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))
}

/// Actions a command replays, in order. Most start by opening the section
/// whose containers the final action renders into.
async fn actions_for(command: Command) -> Result<Vec<UiAction>> {
    let actions = match command {
        Command::Login { email, password } => vec![UiAction::Login { email, password }],
        Command::Register {
            name,
            email,
            password,
            role,
        } => vec![UiAction::Register {
            name,
            email,
            password,
            role: role.into(),
        }],
        Command::Logout { yes } => vec![UiAction::Logout { confirmed: yes }],
        Command::Courses { search } => {
            let mut actions = vec![UiAction::Navigate(Section::Courses)];
            if let Some(term) = search {
                actions.push(UiAction::SearchCourses(term));
            }
            actions
        }
        Command::Course { id } => vec![UiAction::ViewCourse(CourseId(id))],
        Command::Enroll { id } => vec![UiAction::Enroll(CourseId(id))],
        Command::Complete { id } => vec![
            UiAction::ViewCourse(CourseId(id)),
            UiAction::MarkComplete(CourseId(id)),
        ],
        Command::Dashboard => vec![UiAction::Navigate(Section::Dashboard)],
        Command::Submit { assignment, text } => vec![
            UiAction::Navigate(Section::Dashboard),
            UiAction::SubmitText {
                assignment_id: AssignmentId(assignment),
                content: text,
            },
        ],
        Command::SubmitFile { assignment, path } => vec![
            UiAction::Navigate(Section::Dashboard),
            UiAction::SubmitFile {
                assignment_id: AssignmentId(assignment),
                file: read_upload(&path).await?,
            },
        ],
        Command::Submissions { assignment } => vec![
            UiAction::Navigate(Section::Dashboard),
            UiAction::ViewSubmissions(AssignmentId(assignment)),
        ],
        Command::Grade {
            submission,
            assignment,
            grade,
            feedback,
        } => vec![
            UiAction::Navigate(Section::Dashboard),
            UiAction::SaveGrade {
                submission_id: SubmissionId(submission),
                assignment_id: AssignmentId(assignment),
                grade,
                feedback,
            },
        ],
        Command::Attendance { course, date, .. } => vec![
            UiAction::Navigate(Section::Dashboard),
            UiAction::SelectAttendance {
                course_id: Some(CourseId(course)),
                date,
            },
        ],
        Command::CreateCourse {
            title,
            description,
            duration,
        } => vec![
            UiAction::Navigate(Section::CreateCourse),
            UiAction::CreateCourse(NewCourse {
                title,
                description,
                duration,
            }),
        ],
        Command::CreateAssignment {
            course,
            title,
            description,
            due_date,
        } => vec![
            UiAction::Navigate(Section::Dashboard),
            UiAction::CreateAssignment {
                course_id: CourseId(course),
                assignment: NewAssignment {
                    title,
                    description,
                    due_date,
                },
            },
        ],
        Command::Discuss { course, text } => vec![
            UiAction::ViewCourse(CourseId(course)),
            UiAction::PostDiscussion {
                course_id: CourseId(course),
                content: text,
            },
        ],
        Command::UploadMaterial { course, path } => vec![
            UiAction::ViewCourse(CourseId(course)),
            UiAction::UploadMaterial {
                course_id: CourseId(course),
                file: read_upload(&path).await?,
            },
        ],
        Command::Notifications => vec![UiAction::ToggleNotifications],
        Command::MarkRead => vec![UiAction::MarkAllRead],
        Command::Profile {
            name,
            email,
            password,
        } => {
            let mut actions = vec![UiAction::Navigate(Section::Profile)];
            if name.is_some() || email.is_some() || password.is_some() {
                actions.push(UiAction::UpdateProfile(ProfileEdit {
                    name,
                    email,
                    password,
                }));
            }
            actions
        }
    };
    Ok(actions)
}

async fn replay(coordinator: &Coordinator, actions: Vec<UiAction>) -> HandlerResult {
    for action in actions {
        coordinator.dispatch(action).await?;
    }
    Ok(())
}

/// Applies `--present` to the loaded roster and optionally saves it.
async fn mark_roster(coordinator: &Coordinator, present: &[i64], save: bool) -> HandlerResult {
    if !present.is_empty() {
        let rows = coordinator.snapshot().await.attendance.rows;
        for row in rows {
            let is_present = present.contains(&row.student.id.0);
            coordinator
                .dispatch(UiAction::SetPresent {
                    student_id: row.student.id,
                    present: is_present,
                })
                .await?;
        }
    }
    if save {
        coordinator.dispatch(UiAction::SaveAttendance).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config);
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
    }
    if let Some(data_dir) = args.data_dir {
        settings.data_dir = data_dir;
    }
    let api_url = normalize_api_url(&settings.api_url)?;
    let data_dir = prepare_data_dir(&settings.data_dir)?;
    info!(%api_url, data_dir = %data_dir.display(), "campus client starting");

    let api = HttpCourseApi::with_timeout(api_url, settings.request_timeout())?;
    let coordinator = Coordinator::new(
        Arc::new(api),
        Arc::new(FileSessionStore::new(&data_dir)),
    );
    coordinator.restore().await;

    let roster_marks = match &args.command {
        Command::Attendance { present, save, .. } => Some((present.clone(), *save)),
        _ => None,
    };
    let actions = actions_for(args.command).await?;
    let mut outcome = replay(&coordinator, actions).await;
    if let Some((present, save)) = roster_marks.filter(|_| outcome.is_ok()) {
        outcome = mark_roster(&coordinator, &present, save).await;
    }

    print!("{}", output::render_snapshot(&coordinator.snapshot().await));
    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            debug!(%err, "command failed");
            Ok(ExitCode::FAILURE)
        }
    }
}
