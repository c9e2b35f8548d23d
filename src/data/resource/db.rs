use bson::{doc, Document};
use mongodb::options::FindOptions;
use mongodb::Collection;
use rocket::futures::TryStreamExt;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::filter;
use crate::data::mongo::{duplicate_or, MongoBackend};
use crate::error::StoreError;

use super::{RequestStatus, ResourceRequest, RESOURCE_REQUEST_COLLECTION_NAME};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ResourceRequestData {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReviewData {
    pub note: Option<String>,
}

#[rocket::async_trait]
pub trait ResourceRequestDb {
    /// Fails with [`StoreError::Duplicate`] when the user already has a pending request.
    async fn insert_resource_request(&self, request: ResourceRequest) -> Result<ResourceRequest, StoreError>;
    async fn get_resource_request(&self, id: Uuid) -> Result<Option<ResourceRequest>, StoreError>;
    async fn find_pending_request(&self, user: Uuid) -> Result<Option<ResourceRequest>, StoreError>;
    async fn save_resource_request(&self, request: ResourceRequest) -> Result<ResourceRequest, StoreError>;
    /// Oldest first.
    async fn list_resource_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ResourceRequest>, StoreError>;
}

impl MongoBackend {
    fn resource_requests(&self) -> Collection<ResourceRequest> {
        self.database().collection(RESOURCE_REQUEST_COLLECTION_NAME)
    }
}

#[rocket::async_trait]
impl ResourceRequestDb for MongoBackend {
    async fn insert_resource_request(&self, request: ResourceRequest) -> Result<ResourceRequest, StoreError> {
        self.resource_requests()
            .insert_one(&request, None)
            .await
            .map_err(duplicate_or("pending resource request"))?;
        Ok(request)
    }

    async fn get_resource_request(&self, id: Uuid) -> Result<Option<ResourceRequest>, StoreError> {
        Ok(self
            .resource_requests()
            .find_one(filter::by_id(id), None)
            .await?)
    }

    async fn find_pending_request(&self, user: Uuid) -> Result<Option<ResourceRequest>, StoreError> {
        let mut query = filter::by_owner(user);
        query.insert("status", RequestStatus::Pending.as_str());

        Ok(self.resource_requests().find_one(query, None).await?)
    }

    async fn save_resource_request(&self, request: ResourceRequest) -> Result<ResourceRequest, StoreError> {
        self.resource_requests()
            .replace_one(filter::by_id(request.id), &request, None)
            .await?;
        Ok(request)
    }

    async fn list_resource_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ResourceRequest>, StoreError> {
        let query = match status {
            Some(status) => doc! { "status": status.as_str() },
            None => Document::new(),
        };
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1 })
            .build();

        let cursor = self.resource_requests().find(query, options).await?;
        Ok(cursor.try_collect().await?)
    }
}
