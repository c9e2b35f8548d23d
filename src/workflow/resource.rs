//! Requests for premium resource access.

use uuid::Uuid;

use crate::data::activity::db::ActivityDb;
use crate::data::activity::{ActivityKind, ActivityLog};
use crate::data::resource::db::{ResourceRequestData, ResourceRequestDb, ReviewData};
use crate::data::resource::{RequestStatus, ResourceRequest};
use crate::data::user::db::UserDb;
use crate::error::{StoreError, WorkflowError};
use crate::role::Role;

use super::{notify, Actor, Progress, Scheduler};

const PENDING_CONFLICT: &str = "You already have a pending resource request";

impl Scheduler<'_> {
    #[tracing::instrument(skip(self))]
    pub async fn request_resources(
        &self,
        actor: Actor,
        data: ResourceRequestData,
    ) -> Result<ResourceRequest, WorkflowError> {
        if actor.role != Role::Student {
            return Err(WorkflowError::forbidden("Only students request resource access"));
        }

        let user = self
            .db
            .get_user(actor.id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("User not found"))?;
        if user.resource_access {
            return Err(WorkflowError::conflict("You already have resource access"));
        }
        if self.db.find_pending_request(user.id).await?.is_some() {
            return Err(WorkflowError::conflict(PENDING_CONFLICT));
        }

        let mut progress = Progress::new("request_resources");
        let message = data.message.map(|it| it.trim().to_string()).unwrap_or_default();
        let request = match self
            .db
            .insert_resource_request(ResourceRequest::new(user.id, message))
            .await
        {
            Ok(it) => it,
            Err(StoreError::Duplicate(_)) => return Err(WorkflowError::conflict(PENDING_CONFLICT)),
            Err(e) => return Err(progress.failed(e)),
        };
        progress.done("resource_requests");

        self.db
            .insert_activity(ActivityLog::new(
                user.id,
                ActivityKind::ResourceRequested,
                "Requested access to learning resources",
            ))
            .await
            .map_err(|e| progress.failed(e))?;
        progress.done("activity_logs");

        tracing::info!(request = %request.id, "resource access requested");
        Ok(request)
    }

    pub async fn list_resource_requests(
        &self,
        actor: Actor,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ResourceRequest>, WorkflowError> {
        if !actor.is_admin() {
            return Err(WorkflowError::forbidden("Only admins review resource requests"));
        }
        Ok(self.db.list_resource_requests(status).await?)
    }

    /// Approving grants `resource_access` to the requester. Either outcome notifies them.
    #[tracing::instrument(skip(self))]
    pub async fn review_resource_request(
        &self,
        actor: Actor,
        id: Uuid,
        approve: bool,
        data: ReviewData,
    ) -> Result<ResourceRequest, WorkflowError> {
        if !actor.is_admin() {
            return Err(WorkflowError::forbidden("Only admins review resource requests"));
        }

        let mut request = self
            .db
            .get_resource_request(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Resource request not found"))?;
        if request.status != RequestStatus::Pending {
            return Err(WorkflowError::conflict(format!(
                "Request already {}",
                request.status.as_str()
            )));
        }

        let status = if approve {
            RequestStatus::Approved
        } else {
            RequestStatus::Rejected
        };
        let note = data.note.map(|it| it.trim().to_string()).filter(|it| !it.is_empty());
        request.review(status, note);

        let mut progress = Progress::new("review_resource_request");
        let request = self
            .db
            .save_resource_request(request)
            .await
            .map_err(|e| progress.failed(e))?;
        progress.done("resource_requests");

        if approve {
            match self
                .db
                .set_resource_access(request.user_id, true)
                .await
                .map_err(|e| progress.failed(e))?
            {
                Some(_) => progress.done("user.resource_access"),
                None => tracing::warn!(user = %request.user_id, "requester no longer exists"),
            }
        }

        notify::deliver(
            self.db,
            vec![notify::resource_reviewed(&request, approve)],
            &mut progress,
        )
        .await?;

        tracing::info!(request = %request.id, status = request.status.as_str(), "resource request reviewed");
        Ok(request)
    }
}
