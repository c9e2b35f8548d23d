//! Scheduling workflow engine.
//!
//! Every operation is a fixed sequence of independent store writes. Entity writes
//! (class rows, offerings, the assignment graph) always come before notification
//! writes. Nothing is rolled back: when a later write fails, the earlier ones stay
//! committed and the failing step's error is returned to the caller after
//! [`Progress`] logs what was already written.

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::data::schedule::CourseType;
use crate::data::user::db::UserDb;
use crate::data::user::User;
use crate::data::Backend;
use crate::error::{StoreError, WorkflowError};
use crate::role::Role;

pub mod account;
pub mod assignment;
pub mod notify;
pub mod offering;
pub mod resource;
pub mod schedule;

/// Authenticated user an operation runs on behalf of.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor {
            id: user.id,
            role: user.role,
        }
    }
}

/// Entry point to the workflow operations, borrowed per request.
pub struct Scheduler<'a> {
    db: &'a dyn Backend,
    default_duration: u32,
}

impl<'a> Scheduler<'a> {
    pub fn new(db: &'a dyn Backend, config: &Config) -> Scheduler<'a> {
        Scheduler::with_default_duration(db, config.default_class_duration)
    }

    pub fn with_default_duration(db: &'a dyn Backend, default_duration: u32) -> Scheduler<'a> {
        Scheduler {
            db,
            default_duration,
        }
    }

    async fn user_with_role(
        &self,
        id: Uuid,
        role: Role,
        what: &str,
    ) -> Result<User, WorkflowError> {
        let user = self
            .db
            .get_user(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("{} not found", what)))?;

        if user.role != role {
            return Err(WorkflowError::invalid_role(format!(
                "Referenced {} has role '{}'",
                what.to_lowercase(),
                user.role
            )));
        }

        Ok(user)
    }

    fn duration_or_default(&self, duration: Option<u32>) -> Result<u32, WorkflowError> {
        match duration {
            Some(0) => Err(WorkflowError::validation("Duration must be at least one minute")),
            Some(it) => Ok(it),
            None => Ok(self.default_duration),
        }
    }
}

/// Store writes an operation has already committed.
///
/// Used to log partial progress when a later step of the same operation fails.
#[derive(Debug)]
pub(crate) struct Progress {
    operation: &'static str,
    committed: Vec<&'static str>,
}

impl Progress {
    pub(crate) fn new(operation: &'static str) -> Progress {
        Progress {
            operation,
            committed: vec![],
        }
    }

    pub(crate) fn done(&mut self, step: &'static str) {
        tracing::debug!(operation = self.operation, step, "write committed");
        self.committed.push(step);
    }

    pub(crate) fn failed(&self, e: StoreError) -> WorkflowError {
        if self.committed.is_empty() {
            tracing::warn!(operation = self.operation, "first write failed: {}", e);
        } else {
            tracing::error!(
                operation = self.operation,
                committed = ?self.committed,
                "write failed after partial commit, earlier writes are kept: {}",
                e
            );
        }
        e.into()
    }
}

pub(crate) fn require<T>(value: Option<T>, field: &str) -> Result<T, WorkflowError> {
    value.ok_or_else(|| WorkflowError::validation(format!("{} is required", field)))
}

pub(crate) fn require_text(value: Option<String>, field: &str) -> Result<String, WorkflowError> {
    match value.as_deref().map(str::trim) {
        Some(it) if !it.is_empty() => Ok(it.to_string()),
        _ => Err(WorkflowError::validation(format!("{} is required", field))),
    }
}

pub(crate) fn parse_course_type(value: Option<String>) -> Result<CourseType, WorkflowError> {
    require_text(value, "courseType")?
        .parse()
        .map_err(WorkflowError::validation)
}

/// Accepts RFC 3339, or a date-time without offset which is read as UTC.
pub(crate) fn parse_date(value: Option<String>, field: &str) -> Result<DateTime<Utc>, WorkflowError> {
    let raw = require_text(value, field)?;

    if let Ok(it) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(it.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&raw, format).ok())
        .map(|it| it.and_utc())
        .ok_or_else(|| WorkflowError::validation(format!("{} is not a valid date: '{}'", field, raw)))
}

/// Human readable form used in notification messages.
pub(crate) fn display_date(date: DateTime<Utc>) -> String {
    date.format("%A, %B %-d, %Y at %-I:%M %p UTC").to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::data::memory::MemoryBackend;
    use crate::data::user::tests::user;
    use crate::data::user::AdminAllowList;

    pub const ADMIN_EMAIL: &str = "head@school.org";

    /// Backend seeded with one admin, one teacher and one student.
    pub struct School {
        pub db: MemoryBackend,
        pub admin: User,
        pub teacher: User,
        pub student: User,
    }

    impl School {
        pub async fn new() -> School {
            let db = MemoryBackend::new(AdminAllowList::new([ADMIN_EMAIL]));
            let admin = db
                .insert_user(user(ADMIN_EMAIL, Role::Student))
                .await
                .expect("insert admin");
            let teacher = db
                .insert_user(user("bilal@school.org", Role::Teacher))
                .await
                .expect("insert teacher");
            let student = db
                .insert_user(user("amina@school.org", Role::Student))
                .await
                .expect("insert student");

            School {
                db,
                admin,
                teacher,
                student,
            }
        }

        pub async fn add_user(&self, email: &str, role: Role) -> User {
            self.db.insert_user(user(email, role)).await.expect("insert user")
        }

        pub fn scheduler(&self) -> Scheduler<'_> {
            Scheduler::with_default_duration(&self.db, 30)
        }

        pub async fn reload(&self, user: &User) -> User {
            self.db
                .get_user(user.id)
                .await
                .expect("get user")
                .expect("user exists")
        }

        pub async fn notification_count(&self) -> usize {
            self.db.all_notifications().await.len()
        }
    }

    #[test]
    fn dates_parse_with_and_without_offset() {
        let expected = Utc.with_ymd_and_hms(2030, 3, 4, 15, 30, 0).unwrap();

        assert_eq!(
            parse_date(Some("2030-03-04T15:30:00Z".into()), "scheduledDate").unwrap(),
            expected
        );
        assert_eq!(
            parse_date(Some("2030-03-04T17:30:00+02:00".into()), "scheduledDate").unwrap(),
            expected
        );
        assert_eq!(
            parse_date(Some("2030-03-04T15:30".into()), "scheduledDate").unwrap(),
            expected
        );
    }

    #[test]
    fn missing_or_malformed_dates_are_validation_errors() {
        assert!(matches!(
            parse_date(None, "scheduledDate"),
            Err(WorkflowError::Validation(_))
        ));
        assert!(matches!(
            parse_date(Some("next tuesday".into()), "scheduledDate"),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn display_date_is_human_readable() {
        let date = Utc.with_ymd_and_hms(2030, 3, 4, 15, 5, 0).unwrap();
        assert_eq!(display_date(date), "Monday, March 4, 2030 at 3:05 PM UTC");
    }
}
