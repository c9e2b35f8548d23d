use bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Collection;
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use crate::data::filter;
use crate::data::mongo::MongoBackend;
use crate::error::StoreError;

use super::{Notification, NOTIFICATION_COLLECTION_NAME};

/// Per-user outbox. Every read and mutation is scoped to the owning user.
#[rocket::async_trait]
pub trait NotificationDb {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification, StoreError>;

    /// Most recent first.
    async fn list_notifications(&self, user: Uuid, limit: u32) -> Result<Vec<Notification>, StoreError>;
    async fn count_unread(&self, user: Uuid) -> Result<u64, StoreError>;

    /// Marks one of the user's notifications read. `None` when the user owns no such notification.
    async fn mark_read(&self, user: Uuid, id: Uuid) -> Result<Option<Notification>, StoreError>;
    async fn mark_all_read(&self, user: Uuid) -> Result<u64, StoreError>;
    /// Deletes the user's read notifications.
    async fn clear_read(&self, user: Uuid) -> Result<u64, StoreError>;
}

impl MongoBackend {
    fn notifications(&self) -> Collection<Notification> {
        self.database().collection(NOTIFICATION_COLLECTION_NAME)
    }
}

#[rocket::async_trait]
impl NotificationDb for MongoBackend {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification, StoreError> {
        self.notifications().insert_one(&notification, None).await?;
        Ok(notification)
    }

    async fn list_notifications(&self, user: Uuid, limit: u32) -> Result<Vec<Notification>, StoreError> {
        let options = FindOptions::builder()
            .sort(filter::newest_first())
            .limit(i64::from(limit))
            .build();

        let cursor = self
            .notifications()
            .find(filter::by_owner(user), options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count_unread(&self, user: Uuid) -> Result<u64, StoreError> {
        let mut query = filter::by_owner(user);
        query.insert("read", false);

        Ok(self.notifications().count_documents(query, None).await?)
    }

    async fn mark_read(&self, user: Uuid, id: Uuid) -> Result<Option<Notification>, StoreError> {
        let mut query = filter::by_id(id);
        query.insert("user_id", filter::uuid(user));
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .notifications()
            .find_one_and_update(query, doc! { "$set": { "read": true } }, options)
            .await?)
    }

    async fn mark_all_read(&self, user: Uuid) -> Result<u64, StoreError> {
        let mut query = filter::by_owner(user);
        query.insert("read", false);

        let result = self
            .notifications()
            .update_many(query, doc! { "$set": { "read": true } }, None)
            .await?;
        Ok(result.modified_count)
    }

    async fn clear_read(&self, user: Uuid) -> Result<u64, StoreError> {
        let mut query = filter::by_owner(user);
        query.insert("read", true);

        let result = self.notifications().delete_many(query, None).await?;
        Ok(result.deleted_count)
    }
}
