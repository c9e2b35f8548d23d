use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::serde_helpers::{
    chrono_datetime_as_bson_datetime, uuid_1_as_binary, uuid_option_as_binary,
};

pub mod db;

pub static SCHEDULE_COLLECTION_NAME: &str = "class_schedules";

pub const CANCELLED_NOTE_PREFIX: &str = "Cancelled: ";
pub const CANCELLED_NOTE_SEPARATOR: &str = " | Cancelled: ";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CourseType {
    QuranReading,
    Tajweed,
    Hifz,
    Arabic,
    IslamicStudies,
}

impl CourseType {
    pub fn as_str(self) -> &'static str {
        match self {
            CourseType::QuranReading => "quran_reading",
            CourseType::Tajweed => "tajweed",
            CourseType::Hifz => "hifz",
            CourseType::Arabic => "arabic",
            CourseType::IslamicStudies => "islamic_studies",
        }
    }
}

impl std::fmt::Display for CourseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CourseType::QuranReading => write!(f, "Quran Reading"),
            CourseType::Tajweed => write!(f, "Tajweed"),
            CourseType::Hifz => write!(f, "Hifz"),
            CourseType::Arabic => write!(f, "Arabic"),
            CourseType::IslamicStudies => write!(f, "Islamic Studies"),
        }
    }
}

impl std::str::FromStr for CourseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "quran_reading" | "quran" => Ok(CourseType::QuranReading),
            "tajweed" => Ok(CourseType::Tajweed),
            "hifz" => Ok(CourseType::Hifz),
            "arabic" => Ok(CourseType::Arabic),
            "islamic_studies" => Ok(CourseType::IslamicStudies),
            other => Err(format!("unknown course type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Scheduled,
    Completed,
    Missed,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Missed => "missed",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }
}

/// One class occurrence for one student.
///
/// Group sessions are several of these sharing a `room_id`. `teacher_name` is copied
/// when the row is created and is not refreshed if the teacher is later renamed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSchedule {
    #[serde(rename = "_id", with = "uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "uuid_1_as_binary")]
    pub user_id: Uuid,
    #[serde(default, with = "uuid_option_as_binary")]
    pub teacher_id: Option<Uuid>,
    /// Offering this row was spawned from, for enrollment rows.
    #[serde(default, with = "uuid_option_as_binary")]
    pub class_id: Option<Uuid>,

    pub course_type: CourseType,
    #[serde(default)]
    pub teacher_name: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub scheduled_date: DateTime<Utc>,
    pub duration: u32,
    pub status: ScheduleStatus,
    pub room_id: String,
    #[serde(default)]
    pub notes: String,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl ClassSchedule {
    pub fn new(
        student: Uuid,
        teacher: Option<Uuid>,
        teacher_name: impl ToString,
        course_type: CourseType,
        scheduled_date: DateTime<Utc>,
        duration: u32,
        room_id: impl ToString,
    ) -> ClassSchedule {
        let now = Utc::now();
        ClassSchedule {
            id: Uuid::new_v4(),
            user_id: student,
            teacher_id: teacher,
            class_id: None,
            course_type,
            teacher_name: teacher_name.to_string(),
            scheduled_date,
            duration,
            status: ScheduleStatus::Scheduled,
            room_id: room_id.to_string(),
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_taught_by(&self, teacher: Uuid) -> bool {
        self.teacher_id == Some(teacher)
    }

    /// Records a cancellation reason in the notes. Without a reason the notes are kept.
    pub fn append_cancellation(&mut self, reason: Option<&str>) {
        let reason = match reason.map(str::trim).filter(|it| !it.is_empty()) {
            Some(it) => it,
            None => return,
        };

        if self.notes.is_empty() {
            self.notes = format!("{}{}", CANCELLED_NOTE_PREFIX, reason);
        } else {
            self.notes = format!("{}{}{}", self.notes, CANCELLED_NOTE_SEPARATOR, reason);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassScheduleResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub teacher_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub course_type: CourseType,
    pub teacher_name: String,
    pub scheduled_date: DateTime<Utc>,
    pub duration: u32,
    pub status: ScheduleStatus,
    pub room_id: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClassSchedule> for ClassScheduleResponse {
    fn from(value: ClassSchedule) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            teacher_id: value.teacher_id,
            class_id: value.class_id,
            course_type: value.course_type,
            teacher_name: value.teacher_name,
            scheduled_date: value.scheduled_date,
            duration: value.duration,
            status: value.status,
            room_id: value.room_id,
            notes: value.notes,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
