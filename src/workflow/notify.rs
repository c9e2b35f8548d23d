use chrono::{DateTime, Utc};
use tracing_futures::Instrument;
use uuid::Uuid;

use crate::data::class::Class;
use crate::data::notification::db::NotificationDb;
use crate::data::notification::{Notification, NotificationKind, NotificationMetadata};
use crate::data::resource::ResourceRequest;
use crate::data::schedule::ClassSchedule;
use crate::data::user::User;
use crate::data::Backend;
use crate::error::WorkflowError;

use super::{display_date, Progress};

/// Stores notifications one by one, after the operation's entity writes.
pub(crate) async fn deliver(
    db: &dyn Backend,
    notifications: Vec<Notification>,
    progress: &mut Progress,
) -> Result<(), WorkflowError> {
    let span = tracing::info_span!(
        "deliver",
        operation = progress.operation,
        count = notifications.len()
    );

    async move {
        for notification in notifications {
            let recipient = notification.user_id;
            let kind = notification.kind;
            db.insert_notification(notification)
                .await
                .map_err(|e| progress.failed(e))?;
            progress.done("notification");
            tracing::debug!(%recipient, ?kind, "notification stored");
        }
        Ok(())
    }
    .instrument(span)
    .await
}

fn about(row: &ClassSchedule, notification: Notification) -> Notification {
    notification.with_metadata(NotificationMetadata::from(row))
}

pub(crate) fn class_scheduled_for_student(row: &ClassSchedule) -> Notification {
    let with = match row.teacher_name.as_str() {
        "" => String::new(),
        name => format!(" with {}", name),
    };

    about(
        row,
        Notification::new(
            row.user_id,
            NotificationKind::ClassScheduled,
            "New Class Scheduled",
            format!(
                "Your {} class{} has been scheduled for {}.",
                row.course_type,
                with,
                display_date(row.scheduled_date)
            ),
        ),
    )
}

pub(crate) fn class_scheduled_for_teacher(row: &ClassSchedule, teacher: &User, student: &User) -> Notification {
    about(
        row,
        Notification::new(
            teacher.id,
            NotificationKind::ClassScheduled,
            "New Class Scheduled",
            format!(
                "A {} class with {} has been scheduled for {}.",
                row.course_type,
                student.name,
                display_date(row.scheduled_date)
            ),
        ),
    )
}

/// `recipient` is the student or the teacher on record.
pub(crate) fn class_rescheduled(
    row: &ClassSchedule,
    recipient: Uuid,
    previous: DateTime<Utc>,
) -> Notification {
    about(
        row,
        Notification::new(
            recipient,
            NotificationKind::ClassScheduled,
            "Class Rescheduled",
            format!(
                "Your {} class has been rescheduled from {} to {}.",
                row.course_type,
                display_date(previous),
                display_date(row.scheduled_date)
            ),
        ),
    )
}

pub(crate) fn class_cancelled(
    row: &ClassSchedule,
    recipient: Uuid,
    reason: Option<&str>,
) -> Notification {
    let mut message = format!(
        "Your {} class scheduled for {} has been cancelled.",
        row.course_type,
        display_date(row.scheduled_date)
    );
    if let Some(reason) = reason.map(str::trim).filter(|it| !it.is_empty()) {
        message.push_str(&format!(" Reason: {}", reason));
    }

    about(
        row,
        Notification::new(recipient, NotificationKind::ClassCancelled, "Class Cancelled", message),
    )
}

pub(crate) fn enrolled_student(row: &ClassSchedule, class: &Class) -> Notification {
    about(
        row,
        Notification::new(
            row.user_id,
            NotificationKind::ClassScheduled,
            "Enrolled in Class",
            format!(
                "You are enrolled in \"{}\" on {}.",
                class.title,
                display_date(class.scheduled_time)
            ),
        ),
    )
}

pub(crate) fn enrolled_teacher(row: &ClassSchedule, class: &Class, student: &User) -> Notification {
    about(
        row,
        Notification::new(
            class.teacher,
            NotificationKind::ClassScheduled,
            "New Student Enrolled",
            format!(
                "{} enrolled in \"{}\" ({}/{} seats taken).",
                student.name,
                class.title,
                class.enrolled_students.len(),
                class.max_students
            ),
        ),
    )
}

pub(crate) fn teacher_assigned_student(student: &User, teacher: &User) -> Notification {
    Notification::new(
        student.id,
        NotificationKind::TeacherAssigned,
        "Teacher Assigned",
        format!("{} is now your teacher.", teacher.name),
    )
}

pub(crate) fn teacher_assigned_teacher(student: &User, teacher: &User) -> Notification {
    Notification::new(
        teacher.id,
        NotificationKind::TeacherAssigned,
        "New Student Assigned",
        format!("{} has been assigned to you.", student.name),
    )
}

pub(crate) fn resource_reviewed(request: &ResourceRequest, approved: bool) -> Notification {
    let (kind, title, mut message) = if approved {
        (
            NotificationKind::ResourceApproved,
            "Resource Access Approved",
            String::from("Your request for resource access has been approved."),
        )
    } else {
        (
            NotificationKind::ResourceRejected,
            "Resource Access Rejected",
            String::from("Your request for resource access has been rejected."),
        )
    };
    if let Some(note) = request.admin_note.as_deref().filter(|it| !it.trim().is_empty()) {
        message.push_str(&format!(" Note: {}", note.trim()));
    }

    Notification::new(request.user_id, kind, title, message)
}
