use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::serde_helpers::{
    chrono_datetime_as_bson_datetime, chrono_option_as_bson_datetime, uuid_1_as_binary,
};

pub mod db;

pub static RESOURCE_REQUEST_COLLECTION_NAME: &str = "resource_requests";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

/// A student asking for premium resource access. One pending request per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRequest {
    #[serde(rename = "_id", with = "uuid_1_as_binary")]
    pub id: Uuid,
    #[serde(with = "uuid_1_as_binary")]
    pub user_id: Uuid,
    #[serde(default)]
    pub message: String,
    pub status: RequestStatus,
    #[serde(default)]
    pub admin_note: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "chrono_option_as_bson_datetime")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl ResourceRequest {
    pub fn new(user: Uuid, message: impl ToString) -> ResourceRequest {
        ResourceRequest {
            id: Uuid::new_v4(),
            user_id: user,
            message: message.to_string(),
            status: RequestStatus::Pending,
            admin_note: None,
            created_at: Utc::now(),
            reviewed_at: None,
        }
    }

    pub fn review(&mut self, status: RequestStatus, note: Option<String>) {
        self.status = status;
        self.admin_note = note;
        self.reviewed_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequestResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub status: RequestStatus,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl From<ResourceRequest> for ResourceRequestResponse {
    fn from(value: ResourceRequest) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            message: value.message,
            status: value.status,
            admin_note: value.admin_note,
            created_at: value.created_at,
            reviewed_at: value.reviewed_at,
        }
    }
}
