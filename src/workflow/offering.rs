//! Group offerings and enrollment.
//!
//! Every student admitted to an offering gets a `ClassSchedule` row sharing the
//! offering's room. Cancelling an offering leaves those rows untouched.

use chrono::Utc;
use uuid::Uuid;

use crate::data::class::db::{ClassCreateData, ClassDb, ClassQuery, EnrollOutcome};
use crate::data::class::{Class, ClassStatus, DEFAULT_MAX_STUDENTS};
use crate::data::schedule::db::ScheduleDb;
use crate::data::schedule::ClassSchedule;
use crate::data::user::db::UserDb;
use crate::data::user::User;
use crate::error::WorkflowError;
use crate::role::Role;
use crate::util::new_room_id;

use super::{
    assignment, notify, parse_course_type, parse_date, require, require_text, Actor, Progress,
    Scheduler,
};

impl Scheduler<'_> {
    async fn offering(&self, id: Uuid) -> Result<Class, WorkflowError> {
        self.db
            .get_class(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Class not found"))
    }

    fn ensure_owns(&self, actor: Actor, class: &Class) -> Result<(), WorkflowError> {
        match actor.role {
            Role::Admin => Ok(()),
            Role::Teacher if class.teacher == actor.id => Ok(()),
            _ => Err(WorkflowError::forbidden("Only the class teacher or an admin can do this")),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_offering(
        &self,
        actor: Actor,
        data: ClassCreateData,
    ) -> Result<Class, WorkflowError> {
        let teacher_id = match actor.role {
            Role::Admin => require(data.teacher_id, "teacherId")?,
            Role::Teacher => actor.id,
            Role::Student => return Err(WorkflowError::forbidden("Students can't create classes")),
        };
        let title = require_text(data.title, "title")?;
        let course_type = parse_course_type(data.course_type)?;
        let scheduled_time = parse_date(data.scheduled_time, "scheduledTime")?;
        let duration = self.duration_or_default(data.duration)?;
        let max_students = match data.max_students {
            Some(0) => return Err(WorkflowError::validation("maxStudents must be at least 1")),
            Some(it) => it,
            None => DEFAULT_MAX_STUDENTS,
        };

        let teacher = self.user_with_role(teacher_id, Role::Teacher, "Teacher").await?;

        let class = Class {
            id: Uuid::new_v4(),
            title,
            description: data.description.unwrap_or_default(),
            course_type,
            teacher: teacher.id,
            teacher_name: teacher.name,
            scheduled_time,
            duration,
            room_id: new_room_id(),
            max_students,
            enrolled_students: vec![],
            status: ClassStatus::Scheduled,
            created_at: Utc::now(),
        };

        let class = self.db.insert_class(class).await?;
        tracing::info!(class = %class.id, room = %class.room_id, "class offering created");
        Ok(class)
    }

    /// Teachers see their own offerings, admins all of them, students the open ones.
    pub async fn list_offerings(&self, actor: Actor) -> Result<Vec<Class>, WorkflowError> {
        let query = match actor.role {
            Role::Admin => ClassQuery::default(),
            Role::Teacher => ClassQuery {
                teacher: Some(actor.id),
                open_only: false,
            },
            Role::Student => ClassQuery {
                teacher: None,
                open_only: true,
            },
        };

        Ok(self.db.list_classes(&query).await?)
    }

    /// Student self-enrollment, or an admin enrolling a named student.
    #[tracing::instrument(skip(self))]
    pub async fn enroll(
        &self,
        actor: Actor,
        class: Uuid,
        student: Option<Uuid>,
    ) -> Result<(Class, ClassSchedule), WorkflowError> {
        let student = match actor.role {
            Role::Student => actor.id,
            Role::Admin => require(student, "studentId")?,
            Role::Teacher => {
                return Err(WorkflowError::forbidden(
                    "Teachers add students through the class roster",
                ))
            }
        };
        let student = self.user_with_role(student, Role::Student, "Student").await?;

        self.admit(class, &student).await
    }

    /// Staff adding a student to an offering; same effects as [`Scheduler::enroll`].
    #[tracing::instrument(skip(self))]
    pub async fn assign_student_to_offering(
        &self,
        actor: Actor,
        class: Uuid,
        student: Option<Uuid>,
    ) -> Result<(Class, ClassSchedule), WorkflowError> {
        let student = require(student, "studentId")?;
        let offering = self.offering(class).await?;
        self.ensure_owns(actor, &offering)?;

        let student = self.user_with_role(student, Role::Student, "Student").await?;
        self.admit(offering.id, &student).await
    }

    async fn admit(
        &self,
        class: Uuid,
        student: &User,
    ) -> Result<(Class, ClassSchedule), WorkflowError> {
        let mut progress = Progress::new("enroll");

        let class = match self
            .db
            .enroll_student(class, student.id)
            .await
            .map_err(|e| progress.failed(e))?
        {
            EnrollOutcome::Enrolled(it) => it,
            EnrollOutcome::NotFound => return Err(WorkflowError::not_found("Class not found")),
            EnrollOutcome::NotOpen(it) => {
                return Err(WorkflowError::conflict(format!(
                    "Class is {} and no longer accepts students",
                    it.status.as_str()
                )))
            }
            EnrollOutcome::AlreadyEnrolled(_) => {
                return Err(WorkflowError::conflict("Already enrolled in this class"))
            }
            EnrollOutcome::Full(_) => return Err(WorkflowError::conflict("Class is full")),
        };
        progress.done("classes.enrolled_students");

        let mut row = ClassSchedule::new(
            student.id,
            Some(class.teacher),
            &class.teacher_name,
            class.course_type,
            class.scheduled_time,
            class.duration,
            &class.room_id,
        );
        row.class_id = Some(class.id);
        let row = self
            .db
            .insert_schedule(row)
            .await
            .map_err(|e| progress.failed(e))?;
        progress.done("class_schedules");
        tracing::info!(class = %class.id, student = %student.id, seats = class.enrolled_students.len(), "student enrolled");

        if student.assigned_teacher != Some(class.teacher) {
            assignment::link(self.db, student.id, class.teacher, &mut progress).await?;
        } else {
            // Roster side may still be missing; adding is a no-op when present.
            self.db
                .add_assigned_student(class.teacher, student.id)
                .await
                .map_err(|e| progress.failed(e))?;
            progress.done("teacher.assigned_students");
        }

        notify::deliver(
            self.db,
            vec![
                notify::enrolled_student(&row, &class),
                notify::enrolled_teacher(&row, &class, student),
            ],
            &mut progress,
        )
        .await?;

        Ok((class, row))
    }

    /// Flips the offering to cancelled. Enrolled students' class rows are kept as they are.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_offering(&self, actor: Actor, id: Uuid) -> Result<Class, WorkflowError> {
        let mut class = self.offering(id).await?;
        self.ensure_owns(actor, &class)?;

        match class.status {
            ClassStatus::Cancelled => return Err(WorkflowError::conflict("Class already cancelled")),
            ClassStatus::Completed => return Err(WorkflowError::conflict("Class already completed")),
            _ => {}
        }

        class.status = ClassStatus::Cancelled;
        let class = self.db.save_class(class).await?;
        tracing::info!(class = %class.id, enrolled = class.enrolled_students.len(), "class offering cancelled");
        Ok(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::notification::NotificationKind;
    use crate::data::schedule::ScheduleStatus;
    use crate::workflow::tests::School;

    fn offering_data(seats: Option<u32>) -> ClassCreateData {
        ClassCreateData {
            title: Some("Evening Tajweed".to_string()),
            description: Some("Rules of noon sakinah".to_string()),
            course_type: Some("tajweed".to_string()),
            scheduled_time: Some("2030-03-04T18:00:00Z".to_string()),
            duration: Some(60),
            max_students: seats,
            teacher_id: None,
        }
    }

    async fn offering_by_teacher(school: &School, seats: u32) -> Class {
        school
            .scheduler()
            .create_offering(Actor::from(&school.teacher), offering_data(Some(seats)))
            .await
            .expect("create offering")
    }

    #[rocket::async_test]
    async fn enrollment_spawns_row_links_and_notifies() {
        let school = School::new().await;
        let class = offering_by_teacher(&school, 3).await;

        let (class, row) = school
            .scheduler()
            .enroll(Actor::from(&school.student), class.id, None)
            .await
            .expect("enroll");

        assert_eq!(class.enrolled_students, vec![school.student.id]);
        assert_eq!(row.room_id, class.room_id);
        assert_eq!(row.class_id, Some(class.id));
        assert_eq!(row.teacher_id, Some(school.teacher.id));
        assert_eq!(row.status, ScheduleStatus::Scheduled);
        assert_eq!(row.duration, 60);

        let student = school.reload(&school.student).await;
        let teacher = school.reload(&school.teacher).await;
        assert_eq!(student.assigned_teacher, Some(teacher.id));
        assert!(teacher.assigned_students.contains(&student.id));

        let notifications = school.db.all_notifications().await;
        assert_eq!(notifications.len(), 2);
        assert!(notifications.iter().any(|it| it.user_id == student.id));
        assert!(notifications
            .iter()
            .any(|it| it.user_id == teacher.id && it.title == "New Student Enrolled"));
        assert!(notifications
            .iter()
            .all(|it| it.kind == NotificationKind::ClassScheduled));
    }

    #[rocket::async_test]
    async fn enrolling_with_another_teacher_keeps_the_old_roster() {
        let school = School::new().await;
        let other = school.add_user("yusuf@school.org", Role::Teacher).await;
        school
            .scheduler()
            .assign_teacher(Actor::from(&school.admin), school.student.id, Some(other.id))
            .await
            .expect("assign");
        let class = offering_by_teacher(&school, 3).await;

        school
            .scheduler()
            .enroll(Actor::from(&school.student), class.id, None)
            .await
            .expect("enroll");

        assert_eq!(
            school.reload(&school.student).await.assigned_teacher,
            Some(school.teacher.id)
        );
        assert!(school.reload(&other).await.assigned_students.contains(&school.student.id));
    }

    #[rocket::async_test]
    async fn full_offering_refuses_without_creating_a_row() {
        let school = School::new().await;
        let class = offering_by_teacher(&school, 1).await;
        let late = school.add_user("zaid@school.org", Role::Student).await;

        school
            .scheduler()
            .enroll(Actor::from(&school.student), class.id, None)
            .await
            .expect("first seat");
        let rows_before = school.db.all_schedules().await.len();
        let notifications_before = school.notification_count().await;

        match school.scheduler().enroll(Actor::from(&late), class.id, None).await {
            Err(WorkflowError::Conflict(message)) => assert_eq!(message, "Class is full"),
            other => panic!("expected conflict, got {:?}", other),
        }
        assert_eq!(school.db.all_schedules().await.len(), rows_before);
        assert_eq!(school.notification_count().await, notifications_before);
    }

    #[rocket::async_test]
    async fn enrolling_twice_conflicts() {
        let school = School::new().await;
        let class = offering_by_teacher(&school, 5).await;
        let student = Actor::from(&school.student);

        school
            .scheduler()
            .enroll(student, class.id, None)
            .await
            .expect("enroll");

        match school.scheduler().enroll(student, class.id, None).await {
            Err(WorkflowError::Conflict(message)) => {
                assert_eq!(message, "Already enrolled in this class")
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[rocket::async_test]
    async fn cancelled_offering_conflicts_and_keeps_rows() {
        let school = School::new().await;
        let class = offering_by_teacher(&school, 5).await;
        school
            .scheduler()
            .enroll(Actor::from(&school.student), class.id, None)
            .await
            .expect("enroll");

        let cancelled = school
            .scheduler()
            .cancel_offering(Actor::from(&school.teacher), class.id)
            .await
            .expect("cancel offering");
        assert_eq!(cancelled.status, ClassStatus::Cancelled);

        let rows = school.db.all_schedules().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, ScheduleStatus::Scheduled);

        let late = school.add_user("zaid@school.org", Role::Student).await;
        assert!(matches!(
            school.scheduler().enroll(Actor::from(&late), class.id, None).await,
            Err(WorkflowError::Conflict(_))
        ));
        assert!(matches!(
            school.scheduler().cancel_offering(Actor::from(&school.admin), class.id).await,
            Err(WorkflowError::Conflict(_))
        ));
    }

    #[rocket::async_test]
    async fn only_owner_or_admin_assigns_students() {
        let school = School::new().await;
        let class = offering_by_teacher(&school, 5).await;
        let stranger = school.add_user("yusuf@school.org", Role::Teacher).await;

        assert!(matches!(
            school
                .scheduler()
                .assign_student_to_offering(Actor::from(&stranger), class.id, Some(school.student.id))
                .await,
            Err(WorkflowError::Forbidden(_))
        ));

        let (class, _) = school
            .scheduler()
            .assign_student_to_offering(Actor::from(&school.teacher), class.id, Some(school.student.id))
            .await
            .expect("owner assigns");
        assert!(class.is_enrolled(school.student.id));
        assert_eq!(school.notification_count().await, 2);
    }

    #[rocket::async_test]
    async fn offering_creation_validates_input() {
        let school = School::new().await;
        let admin = Actor::from(&school.admin);

        assert!(matches!(
            school.scheduler().create_offering(admin, offering_data(Some(3))).await,
            Err(WorkflowError::Validation(_))
        ));

        let mut for_student = offering_data(Some(3));
        for_student.teacher_id = Some(school.student.id);
        assert!(matches!(
            school.scheduler().create_offering(admin, for_student).await,
            Err(WorkflowError::InvalidRole(_))
        ));

        let mut untitled = offering_data(None);
        untitled.title = Some("   ".into());
        assert!(matches!(
            school
                .scheduler()
                .create_offering(Actor::from(&school.teacher), untitled)
                .await,
            Err(WorkflowError::Validation(_))
        ));

        let defaulted = school
            .scheduler()
            .create_offering(Actor::from(&school.teacher), offering_data(None))
            .await
            .expect("defaults");
        assert_eq!(defaulted.max_students, DEFAULT_MAX_STUDENTS);
    }

    #[rocket::async_test]
    async fn students_only_list_open_offerings() {
        let school = School::new().await;
        let open = offering_by_teacher(&school, 5).await;
        let closed = offering_by_teacher(&school, 5).await;
        school
            .scheduler()
            .cancel_offering(Actor::from(&school.teacher), closed.id)
            .await
            .expect("cancel");

        let for_student = school
            .scheduler()
            .list_offerings(Actor::from(&school.student))
            .await
            .expect("list");
        assert_eq!(for_student.len(), 1);
        assert_eq!(for_student[0].id, open.id);

        let for_teacher = school
            .scheduler()
            .list_offerings(Actor::from(&school.teacher))
            .await
            .expect("list");
        assert_eq!(for_teacher.len(), 2);
    }
}
