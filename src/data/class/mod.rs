use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::schedule::CourseType;
use crate::data::serde_helpers::{
    chrono_datetime_as_bson_datetime, uuid_1_as_binary, uuid_vec_as_binary,
};

pub mod db;

pub static CLASS_COLLECTION_NAME: &str = "classes";

/// Seats in an offering when the author doesn't say.
pub const DEFAULT_MAX_STUDENTS: u32 = 10;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClassStatus {
    Scheduled,
    Ongoing,
    Completed,
    Cancelled,
}

impl ClassStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassStatus::Scheduled => "scheduled",
            ClassStatus::Ongoing => "ongoing",
            ClassStatus::Completed => "completed",
            ClassStatus::Cancelled => "cancelled",
        }
    }

    /// Whether students can still join.
    pub fn is_open(self) -> bool {
        matches!(self, ClassStatus::Scheduled | ClassStatus::Ongoing)
    }
}

/// A group session students enroll into.
///
/// Every enrolled student also gets a `ClassSchedule` row sharing `room_id`; the
/// offering itself is never consulted by dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    #[serde(rename = "_id", with = "uuid_1_as_binary")]
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub course_type: CourseType,

    #[serde(with = "uuid_1_as_binary")]
    pub teacher: Uuid,
    #[serde(default)]
    pub teacher_name: String,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub scheduled_time: DateTime<Utc>,
    pub duration: u32,
    pub room_id: String,
    pub max_students: u32,
    #[serde(default, with = "uuid_vec_as_binary")]
    pub enrolled_students: Vec<Uuid>,
    pub status: ClassStatus,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Class {
    pub fn is_enrolled(&self, student: Uuid) -> bool {
        self.enrolled_students.contains(&student)
    }

    pub fn is_full(&self) -> bool {
        self.enrolled_students.len() >= self.max_students as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub course_type: CourseType,
    pub teacher: Uuid,
    pub teacher_name: String,
    pub scheduled_time: DateTime<Utc>,
    pub duration: u32,
    pub room_id: String,
    pub max_students: u32,
    pub enrolled_students: Vec<Uuid>,
    pub status: ClassStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Class> for ClassResponse {
    fn from(value: Class) -> Self {
        Self {
            id: value.id,
            title: value.title,
            description: value.description,
            course_type: value.course_type,
            teacher: value.teacher,
            teacher_name: value.teacher_name,
            scheduled_time: value.scheduled_time,
            duration: value.duration,
            room_id: value.room_id,
            max_students: value.max_students,
            enrolled_students: value.enrolled_students,
            status: value.status,
            created_at: value.created_at,
        }
    }
}
