use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::serde_helpers::{
    chrono_datetime_as_bson_datetime, uuid_1_as_binary, uuid_option_as_binary,
};

pub mod db;

pub static ACTIVITY_COLLECTION_NAME: &str = "activity_logs";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    ClassAttended,
    Login,
    ResourceRequested,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    #[serde(rename = "_id", with = "uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "uuid_1_as_binary")]
    pub user_id: Uuid,
    pub kind: ActivityKind,
    pub description: String,
    #[serde(default, with = "uuid_option_as_binary")]
    pub class_id: Option<Uuid>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ActivityLog {
    pub fn new(user: Uuid, kind: ActivityKind, description: impl ToString) -> ActivityLog {
        ActivityLog {
            id: Uuid::new_v4(),
            user_id: user,
            kind,
            description: description.to_string(),
            class_id: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub description: String,
    pub class_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<ActivityLog> for ActivityResponse {
    fn from(value: ActivityLog) -> Self {
        Self {
            id: value.id,
            kind: value.kind,
            description: value.description,
            class_id: value.class_id,
            created_at: value.created_at,
        }
    }
}
