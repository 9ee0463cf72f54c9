use std::fmt::Write as _;

use client_core::{Fragment, FragmentBody, Marker, Severity, ViewSnapshot};

fn marker_label(marker: Marker) -> &'static str {
    match marker {
        Marker::Unread => "[new] ",
        Marker::Present => "[x] ",
        Marker::Absent => "[ ] ",
        Marker::Completed => "[done] ",
    }
}

fn write_fragment(out: &mut String, fragment: &Fragment) {
    let _ = writeln!(out, "== {} ==", fragment.container.name());
    match &fragment.body {
        FragmentBody::Placeholder(text) => {
            let _ = writeln!(out, "  {text}");
        }
        FragmentBody::Items(items) => {
            for item in items {
                let marker = item.marker.map(marker_label).unwrap_or_default();
                let _ = writeln!(out, "- {marker}{}", item.title);
                for line in item.lines.iter().filter(|line| !line.is_empty()) {
                    let _ = writeln!(out, "    {line}");
                }
                if !item.bindings.is_empty() {
                    let actions: Vec<String> = item
                        .bindings
                        .iter()
                        .map(|binding| format!("{} ({})", binding.label, binding.action.name()))
                        .collect();
                    let _ = writeln!(out, "    > {}", actions.join(", "));
                }
            }
        }
    }
    for action in &fragment.actions {
        let _ = writeln!(out, "  > {}", action.label);
    }
}

/// Plain-text rendering of the live view.
pub fn render_snapshot(snapshot: &ViewSnapshot) -> String {
    let mut out = String::new();
    let who = match &snapshot.session {
        Some(session) => format!("{} <{}> ({})", session.name, session.email, session.role),
        None => "not logged in".to_string(),
    };
    let _ = writeln!(out, "[{}] {who}", snapshot.section.name());
    if let Some(badge) = &snapshot.badge {
        let _ = writeln!(out, "notifications: {badge} unread");
    }
    if let Some(message) = &snapshot.message {
        let prefix = match message.severity {
            Severity::Info => "",
            Severity::Error => "error: ",
        };
        let _ = writeln!(out, "{prefix}{}", message.text);
    }
    if let (Some(course_id), Some(date)) = (snapshot.attendance.course_id, snapshot.attendance.date)
    {
        if !snapshot.attendance.rows.is_empty() {
            let _ = writeln!(out, "attendance: course {course_id} on {date}");
        }
    }
    for fragment in &snapshot.fragments {
        write_fragment(&mut out, fragment);
    }
    out
}

#[cfg(test)]
mod tests {
    use client_core::{Container, Notice, Section};

    use super::*;

    #[test]
    fn anonymous_snapshot_with_error_message() {
        let snapshot = ViewSnapshot {
            section: Section::Courses,
            session: None,
            message: Some(Notice::error("Error loading courses: Database unavailable")),
            badge: None,
            notifications_open: false,
            detail_course: None,
            attendance: Default::default(),
            fragments: vec![Fragment::placeholder(
                Container::CourseGrid,
                "No courses available.",
            )],
        };
        let text = render_snapshot(&snapshot);
        assert_eq!(
            text,
            "[course-catalog] not logged in\n\
             error: Error loading courses: Database unavailable\n\
             == courseGrid ==\n  No courses available.\n"
        );
    }
}
