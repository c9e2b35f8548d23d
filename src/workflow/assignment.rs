//! Student ↔ teacher links.
//!
//! `student.assigned_teacher == T` implies `T.assigned_students` holds the student.
//! Linking is an idempotent upsert; only an explicit reassignment removes a student
//! from a roster.

use uuid::Uuid;

use crate::data::user::db::UserDb;
use crate::data::user::User;
use crate::data::Backend;
use crate::error::WorkflowError;
use crate::role::Role;

use super::{notify, Actor, Progress, Scheduler};

pub(crate) fn is_linked(student: &User, teacher: &User) -> bool {
    student.assigned_teacher == Some(teacher.id) && teacher.assigned_students.contains(&student.id)
}

/// Points the student at the teacher and puts the student on the teacher's roster.
///
/// Returns the teacher the student pointed at before.
pub(crate) async fn link(
    db: &dyn Backend,
    student: Uuid,
    teacher: Uuid,
    progress: &mut Progress,
) -> Result<Option<Uuid>, WorkflowError> {
    let previous = db
        .set_assigned_teacher(student, teacher)
        .await
        .map_err(|e| progress.failed(e))?;
    progress.done("student.assigned_teacher");

    db.add_assigned_student(teacher, student)
        .await
        .map_err(|e| progress.failed(e))?;
    progress.done("teacher.assigned_students");

    tracing::debug!(%student, %teacher, "assignment linked");
    Ok(previous)
}

impl Scheduler<'_> {
    /// Admin reassignment of a student's teacher.
    ///
    /// The student is dropped from the previous teacher's roster, and both the student
    /// and the new teacher are notified when the assignment actually changes.
    #[tracing::instrument(skip(self))]
    pub async fn assign_teacher(
        &self,
        actor: Actor,
        student: Uuid,
        teacher: Option<Uuid>,
    ) -> Result<User, WorkflowError> {
        if !actor.is_admin() {
            return Err(WorkflowError::forbidden("Only admins can assign teachers"));
        }
        let teacher = super::require(teacher, "teacherId")?;

        let student = self.user_with_role(student, Role::Student, "Student").await?;
        let teacher = self.user_with_role(teacher, Role::Teacher, "Teacher").await?;

        if is_linked(&student, &teacher) {
            tracing::debug!("student already assigned to teacher");
            return Ok(student);
        }

        let mut progress = Progress::new("assign_teacher");
        let previous = link(self.db, student.id, teacher.id, &mut progress).await?;

        if let Some(previous) = previous.filter(|it| *it != teacher.id) {
            self.db
                .remove_assigned_student(previous, student.id)
                .await
                .map_err(|e| progress.failed(e))?;
            progress.done("previous_teacher.assigned_students");
            tracing::info!(%previous, "student removed from previous teacher's roster");
        }

        notify::deliver(
            self.db,
            vec![
                notify::teacher_assigned_student(&student, &teacher),
                notify::teacher_assigned_teacher(&student, &teacher),
            ],
            &mut progress,
        )
        .await?;

        Ok(self
            .db
            .get_user(student.id)
            .await?
            .unwrap_or(student))
    }
}

#[cfg(test)]
mod tests {
    use crate::data::notification::NotificationKind;
    use crate::workflow::tests::School;

    use super::*;

    #[rocket::async_test]
    async fn reassigning_moves_student_between_rosters() {
        let school = School::new().await;
        let other = school.add_user("yusuf@school.org", Role::Teacher).await;
        let admin = Actor::from(&school.admin);
        let scheduler = school.scheduler();

        scheduler
            .assign_teacher(admin, school.student.id, Some(school.teacher.id))
            .await
            .expect("first assignment");
        let student = scheduler
            .assign_teacher(admin, school.student.id, Some(other.id))
            .await
            .expect("reassignment");

        assert_eq!(student.assigned_teacher, Some(other.id));
        assert!(school.reload(&other).await.assigned_students.contains(&student.id));
        assert!(!school
            .reload(&school.teacher)
            .await
            .assigned_students
            .contains(&student.id));

        let notifications = school.db.all_notifications().await;
        assert_eq!(notifications.len(), 4);
        assert!(notifications
            .iter()
            .all(|it| it.kind == NotificationKind::TeacherAssigned));
    }

    #[rocket::async_test]
    async fn repeating_an_assignment_changes_nothing() {
        let school = School::new().await;
        let admin = Actor::from(&school.admin);
        let scheduler = school.scheduler();

        for _ in 0..2 {
            scheduler
                .assign_teacher(admin, school.student.id, Some(school.teacher.id))
                .await
                .expect("assignment");
        }

        assert_eq!(school.notification_count().await, 2);
        assert_eq!(school.reload(&school.teacher).await.assigned_students, vec![school.student.id]);
    }

    #[rocket::async_test]
    async fn assignment_checks_roles() {
        let school = School::new().await;
        let admin = Actor::from(&school.admin);
        let scheduler = school.scheduler();

        let swapped = scheduler
            .assign_teacher(admin, school.teacher.id, Some(school.student.id))
            .await;
        assert!(matches!(swapped, Err(WorkflowError::InvalidRole(_))));

        let by_teacher = scheduler
            .assign_teacher(Actor::from(&school.teacher), school.student.id, Some(school.teacher.id))
            .await;
        assert!(matches!(by_teacher, Err(WorkflowError::Forbidden(_))));
    }
}
