use chrono::Utc;
use uuid::Uuid;

use crate::data::activity::db::ActivityDb;
use crate::data::activity::{ActivityKind, ActivityLog};
use crate::data::schedule::db::{
    CancelData, RescheduleData, ScheduleClassData, ScheduleDb, StatusData,
};
use crate::data::schedule::{ClassSchedule, ScheduleStatus};
use crate::data::user::db::UserDb;
use crate::error::WorkflowError;
use crate::role::Role;
use crate::util::new_room_id;

use super::{assignment, notify, parse_course_type, parse_date, require, Actor, Progress, Scheduler};

impl Scheduler<'_> {
    async fn schedule_row(&self, id: Uuid) -> Result<ClassSchedule, WorkflowError> {
        self.db
            .get_schedule(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Class not found"))
    }

    /// Admins manage every row, teachers only the rows they teach.
    fn ensure_manages(&self, actor: Actor, row: &ClassSchedule) -> Result<(), WorkflowError> {
        match actor.role {
            Role::Admin => Ok(()),
            Role::Teacher if row.is_taught_by(actor.id) => Ok(()),
            Role::Teacher => Err(WorkflowError::forbidden("This class belongs to another teacher")),
            Role::Student => Err(WorkflowError::forbidden("Only teachers and admins can manage classes")),
        }
    }

    /// Schedules one class occurrence for a student.
    ///
    /// Admins name the teacher and link the pair in the assignment graph. Teachers
    /// always teach the class themselves and may only schedule students already on
    /// their roster.
    #[tracing::instrument(skip(self))]
    pub async fn create_class(
        &self,
        actor: Actor,
        data: ScheduleClassData,
    ) -> Result<ClassSchedule, WorkflowError> {
        let teacher_id = match actor.role {
            Role::Admin => require(data.teacher_id, "teacherId")?,
            Role::Teacher => actor.id,
            Role::Student => {
                return Err(WorkflowError::forbidden("Students can't schedule classes"))
            }
        };
        let student_id = require(data.student_id, "studentId")?;
        let course_type = parse_course_type(data.course_type)?;
        let scheduled_date = parse_date(data.scheduled_date, "scheduledDate")?;
        let duration = self.duration_or_default(data.duration)?;

        let student = self.user_with_role(student_id, Role::Student, "Student").await?;
        let teacher = self.user_with_role(teacher_id, Role::Teacher, "Teacher").await?;

        if !actor.is_admin() && !teacher.assigned_students.contains(&student.id) {
            return Err(WorkflowError::forbidden(
                "You can only schedule classes for students assigned to you",
            ));
        }

        let mut row = ClassSchedule::new(
            student.id,
            Some(teacher.id),
            &teacher.name,
            course_type,
            scheduled_date,
            duration,
            new_room_id(),
        );
        row.notes = data.notes.map(|it| it.trim().to_string()).unwrap_or_default();

        let mut progress = Progress::new("create_class");
        let row = self
            .db
            .insert_schedule(row)
            .await
            .map_err(|e| progress.failed(e))?;
        progress.done("class_schedules");
        tracing::info!(schedule = %row.id, room = %row.room_id, "class scheduled");

        if !assignment::is_linked(&student, &teacher) {
            assignment::link(self.db, student.id, teacher.id, &mut progress).await?;
        }

        let mut notifications = vec![notify::class_scheduled_for_student(&row)];
        if actor.is_admin() {
            notifications.push(notify::class_scheduled_for_teacher(&row, &teacher, &student));
        }
        notify::deliver(self.db, notifications, &mut progress).await?;

        Ok(row)
    }

    /// Moves a class to a new date. The row becomes `scheduled` again whatever its
    /// previous status.
    #[tracing::instrument(skip(self))]
    pub async fn reschedule(
        &self,
        actor: Actor,
        id: Uuid,
        data: RescheduleData,
    ) -> Result<ClassSchedule, WorkflowError> {
        let scheduled_date = parse_date(data.scheduled_date, "scheduledDate")?;
        if data.duration == Some(0) {
            return Err(WorkflowError::validation("Duration must be at least one minute"));
        }

        let mut row = self.schedule_row(id).await?;
        self.ensure_manages(actor, &row)?;

        let previous = row.scheduled_date;
        row.scheduled_date = scheduled_date;
        if let Some(duration) = data.duration {
            row.duration = duration;
        }
        row.status = ScheduleStatus::Scheduled;
        row.updated_at = Utc::now();

        let mut progress = Progress::new("reschedule");
        let row = self
            .db
            .save_schedule(row)
            .await
            .map_err(|e| progress.failed(e))?;
        progress.done("class_schedules");
        tracing::info!(schedule = %row.id, from = %previous, to = %row.scheduled_date, "class rescheduled");

        let mut notifications = vec![notify::class_rescheduled(&row, row.user_id, previous)];
        if let Some(teacher) = row.teacher_id.filter(|_| actor.is_admin()) {
            notifications.push(notify::class_rescheduled(&row, teacher, previous));
        }
        notify::deliver(self.db, notifications, &mut progress).await?;

        Ok(row)
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        actor: Actor,
        id: Uuid,
        data: CancelData,
    ) -> Result<ClassSchedule, WorkflowError> {
        let mut row = self.schedule_row(id).await?;
        self.ensure_manages(actor, &row)?;

        if row.status == ScheduleStatus::Cancelled {
            return Err(WorkflowError::conflict("Class already cancelled"));
        }

        let reason = data.reason.as_deref();
        row.status = ScheduleStatus::Cancelled;
        row.append_cancellation(reason);
        row.updated_at = Utc::now();

        let mut progress = Progress::new("cancel");
        let row = self
            .db
            .save_schedule(row)
            .await
            .map_err(|e| progress.failed(e))?;
        progress.done("class_schedules");
        tracing::info!(schedule = %row.id, "class cancelled");

        let mut notifications = vec![notify::class_cancelled(&row, row.user_id, reason)];
        if let Some(teacher) = row.teacher_id.filter(|_| actor.is_admin()) {
            notifications.push(notify::class_cancelled(&row, teacher, reason));
        }
        notify::deliver(self.db, notifications, &mut progress).await?;

        Ok(row)
    }

    /// Records attendance. Sends no notification.
    ///
    /// Moving into `completed` counts the class toward the student's total and logs
    /// a `class_attended` activity; marking an already completed row again doesn't.
    #[tracing::instrument(skip(self))]
    pub async fn mark_status(
        &self,
        actor: Actor,
        id: Uuid,
        data: StatusData,
    ) -> Result<ClassSchedule, WorkflowError> {
        let status = match data.status.as_deref().map(str::trim) {
            Some("completed") => ScheduleStatus::Completed,
            Some("missed") => ScheduleStatus::Missed,
            Some(_) => {
                return Err(WorkflowError::validation(
                    "Status must be 'completed' or 'missed'",
                ))
            }
            None => return Err(WorkflowError::validation("status is required")),
        };

        let mut row = self.schedule_row(id).await?;
        let allowed = actor.is_admin() || row.is_taught_by(actor.id) || row.user_id == actor.id;
        if !allowed {
            return Err(WorkflowError::forbidden("You can't update this class"));
        }

        let previous = row.status;
        row.status = status;
        row.updated_at = Utc::now();

        let mut progress = Progress::new("mark_status");
        let row = self
            .db
            .save_schedule(row)
            .await
            .map_err(|e| progress.failed(e))?;
        progress.done("class_schedules");
        tracing::info!(schedule = %row.id, ?previous, status = ?row.status, "class status updated");

        if status == ScheduleStatus::Completed && previous != ScheduleStatus::Completed {
            self.db
                .increment_classes_taken(row.user_id)
                .await
                .map_err(|e| progress.failed(e))?;
            progress.done("student.total_classes_taken");

            let mut entry = ActivityLog::new(
                row.user_id,
                ActivityKind::ClassAttended,
                format!("Attended {} class", row.course_type),
            );
            entry.class_id = Some(row.id);
            self.db
                .insert_activity(entry)
                .await
                .map_err(|e| progress.failed(e))?;
            progress.done("activity_logs");
        }

        Ok(row)
    }
}
