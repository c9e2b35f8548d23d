use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::schedule::{ClassSchedule, CourseType};
use crate::data::serde_helpers::{
    chrono_datetime_as_bson_datetime, chrono_option_as_bson_datetime, uuid_1_as_binary,
    uuid_option_as_binary,
};

pub mod db;

pub static NOTIFICATION_COLLECTION_NAME: &str = "notifications";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ClassScheduled,
    ClassCancelled,
    ClassReminder,
    ClassCompleted,
    TeacherAssigned,
    ResourceApproved,
    ResourceRejected,
    General,
}

/// Back-reference to whatever the notification talks about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationMetadata {
    #[serde(default, with = "uuid_option_as_binary")]
    pub class_id: Option<Uuid>,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default, with = "chrono_option_as_bson_datetime")]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub teacher_name: Option<String>,
    #[serde(default)]
    pub course_type: Option<CourseType>,
}

impl From<&ClassSchedule> for NotificationMetadata {
    fn from(row: &ClassSchedule) -> Self {
        NotificationMetadata {
            class_id: Some(row.id),
            room_id: Some(row.room_id.clone()),
            scheduled_date: Some(row.scheduled_date),
            teacher_name: Some(row.teacher_name.clone()).filter(|it| !it.is_empty()),
            course_type: Some(row.course_type),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id", with = "uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "uuid_1_as_binary")]
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub metadata: Option<NotificationMetadata>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user: Uuid,
        kind: NotificationKind,
        title: impl ToString,
        message: impl ToString,
    ) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: user,
            kind,
            title: title.to_string(),
            message: message.to_string(),
            read: false,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: NotificationMetadata) -> Notification {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub metadata: Option<NotificationMetadataResponse>,
    pub created_at: DateTime<Utc>,
}

/// JSON shape of [`NotificationMetadata`] (plain ids and timestamps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMetadataResponse {
    pub class_id: Option<Uuid>,
    pub room_id: Option<String>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub teacher_name: Option<String>,
    pub course_type: Option<CourseType>,
}

impl From<NotificationMetadata> for NotificationMetadataResponse {
    fn from(value: NotificationMetadata) -> Self {
        Self {
            class_id: value.class_id,
            room_id: value.room_id,
            scheduled_date: value.scheduled_date,
            teacher_name: value.teacher_name,
            course_type: value.course_type,
        }
    }
}

impl From<Notification> for NotificationResponse {
    fn from(value: Notification) -> Self {
        Self {
            id: value.id,
            kind: value.kind,
            title: value.title,
            message: value.message,
            read: value.read,
            metadata: value.metadata.map(Into::into),
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationResponse>,
    pub unread_count: u64,
}
