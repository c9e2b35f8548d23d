use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::FindOptions;
use mongodb::Collection;
use rocket::futures::TryStreamExt;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::filter;
use crate::data::mongo::MongoBackend;
use crate::error::StoreError;

use super::{ClassSchedule, ScheduleStatus, SCHEDULE_COLLECTION_NAME};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleClassData {
    pub student_id: Option<Uuid>,
    /// Ignored on the teacher route, which always schedules for the caller.
    pub teacher_id: Option<Uuid>,
    pub course_type: Option<String>,
    /// ISO 8601 start time.
    pub scheduled_date: Option<String>,
    pub duration: Option<u32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleData {
    pub scheduled_date: Option<String>,
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CancelData {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StatusData {
    /// `completed` or `missed`.
    pub status: Option<String>,
}

/// Selects class rows, ordered by scheduled date.
#[derive(Debug, Clone, Default)]
pub struct ScheduleQuery {
    pub student: Option<Uuid>,
    pub teacher: Option<Uuid>,
    pub status: Option<ScheduleStatus>,
    /// Only rows scheduled at or after this instant.
    pub from: Option<DateTime<Utc>>,
    pub skip: u64,
    pub limit: Option<u32>,
}

impl ScheduleQuery {
    pub fn for_student(student: Uuid) -> Self {
        ScheduleQuery {
            student: Some(student),
            ..Default::default()
        }
    }

    pub fn for_teacher(teacher: Uuid) -> Self {
        ScheduleQuery {
            teacher: Some(teacher),
            ..Default::default()
        }
    }

    pub fn matches(&self, row: &ClassSchedule) -> bool {
        self.student.map_or(true, |it| row.user_id == it)
            && self.teacher.map_or(true, |it| row.teacher_id == Some(it))
            && self.status.map_or(true, |it| row.status == it)
            && self.from.map_or(true, |it| row.scheduled_date >= it)
    }

    fn to_document(&self) -> Document {
        let mut query = Document::new();
        if let Some(student) = self.student {
            query.insert("user_id", filter::uuid(student));
        }
        if let Some(teacher) = self.teacher {
            query.insert("teacher_id", filter::uuid(teacher));
        }
        if let Some(status) = self.status {
            query.insert("status", status.as_str());
        }
        if let Some(from) = self.from {
            query.insert(
                "scheduled_date",
                doc! { "$gte": bson::DateTime::from_chrono(from) },
            );
        }
        query
    }
}

#[rocket::async_trait]
pub trait ScheduleDb {
    async fn insert_schedule(&self, schedule: ClassSchedule) -> Result<ClassSchedule, StoreError>;
    async fn get_schedule(&self, id: Uuid) -> Result<Option<ClassSchedule>, StoreError>;
    /// Overwrites the stored row. Concurrent writers: the last one wins.
    async fn save_schedule(&self, schedule: ClassSchedule) -> Result<ClassSchedule, StoreError>;
    async fn list_schedules(&self, query: &ScheduleQuery) -> Result<Vec<ClassSchedule>, StoreError>;
}

impl MongoBackend {
    fn schedules(&self) -> Collection<ClassSchedule> {
        self.database().collection(SCHEDULE_COLLECTION_NAME)
    }
}

#[rocket::async_trait]
impl ScheduleDb for MongoBackend {
    async fn insert_schedule(&self, schedule: ClassSchedule) -> Result<ClassSchedule, StoreError> {
        self.schedules().insert_one(&schedule, None).await?;
        Ok(schedule)
    }

    async fn get_schedule(&self, id: Uuid) -> Result<Option<ClassSchedule>, StoreError> {
        Ok(self.schedules().find_one(filter::by_id(id), None).await?)
    }

    async fn save_schedule(&self, schedule: ClassSchedule) -> Result<ClassSchedule, StoreError> {
        self.schedules()
            .replace_one(filter::by_id(schedule.id), &schedule, None)
            .await?;
        Ok(schedule)
    }

    async fn list_schedules(&self, query: &ScheduleQuery) -> Result<Vec<ClassSchedule>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "scheduled_date": 1 })
            .skip(query.skip)
            .limit(query.limit.map(i64::from))
            .build();

        let cursor = self.schedules().find(query.to_document(), options).await?;
        Ok(cursor.try_collect().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schedule::CourseType;
    use chrono::Duration;

    #[test]
    fn query_document_only_has_requested_filters() {
        let student = Uuid::new_v4();
        let query = ScheduleQuery {
            status: Some(ScheduleStatus::Scheduled),
            ..ScheduleQuery::for_student(student)
        };

        let document = query.to_document();
        assert_eq!(document.get("user_id"), Some(&filter::uuid(student)));
        assert_eq!(document.get_str("status").ok(), Some("scheduled"));
        assert!(!document.contains_key("teacher_id"));
        assert!(!document.contains_key("scheduled_date"));
    }

    #[test]
    fn query_matches_upcoming_rows() {
        let student = Uuid::new_v4();
        let now = Utc::now();
        let row = ClassSchedule::new(
            student,
            None,
            "",
            CourseType::Hifz,
            now + Duration::hours(2),
            45,
            "room-x",
        );

        let upcoming = ScheduleQuery {
            from: Some(now),
            ..ScheduleQuery::for_student(student)
        };
        let later = ScheduleQuery {
            from: Some(now + Duration::days(1)),
            ..ScheduleQuery::for_student(student)
        };

        assert!(upcoming.matches(&row));
        assert!(!later.matches(&row));
        assert!(!ScheduleQuery::for_teacher(Uuid::new_v4()).matches(&row));
    }
}
