use mongodb::options::FindOptions;
use mongodb::Collection;
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use crate::data::filter;
use crate::data::mongo::MongoBackend;
use crate::error::StoreError;

use super::{ActivityLog, ACTIVITY_COLLECTION_NAME};

#[rocket::async_trait]
pub trait ActivityDb {
    async fn insert_activity(&self, entry: ActivityLog) -> Result<ActivityLog, StoreError>;
    /// Most recent first.
    async fn list_activity(&self, user: Uuid, limit: u32) -> Result<Vec<ActivityLog>, StoreError>;
}

impl MongoBackend {
    fn activity(&self) -> Collection<ActivityLog> {
        self.database().collection(ACTIVITY_COLLECTION_NAME)
    }
}

#[rocket::async_trait]
impl ActivityDb for MongoBackend {
    async fn insert_activity(&self, entry: ActivityLog) -> Result<ActivityLog, StoreError> {
        self.activity().insert_one(&entry, None).await?;
        Ok(entry)
    }

    async fn list_activity(&self, user: Uuid, limit: u32) -> Result<Vec<ActivityLog>, StoreError> {
        let options = FindOptions::builder()
            .sort(filter::newest_first())
            .limit(i64::from(limit))
            .build();

        let cursor = self.activity().find(filter::by_owner(user), options).await?;
        Ok(cursor.try_collect().await?)
    }
}
