//! Admin account management.
//!
//! Each write sets a single field in storage. Allow-listed admins keep their status and
//! resource access whatever is requested here.

use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::user::db::UserDb;
use crate::data::user::{AccountStatus, User};
use crate::error::WorkflowError;
use crate::role::Role;

use super::{require, Actor, Scheduler};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignTeacherData {
    pub teacher_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatusData {
    pub account_status: Option<AccountStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAccessData {
    pub resource_access: Option<bool>,
}

impl Scheduler<'_> {
    fn managing(&self, actor: Actor) -> Result<(), WorkflowError> {
        if !actor.is_admin() {
            return Err(WorkflowError::forbidden("Only admins can manage accounts"));
        }
        Ok(())
    }

    pub async fn list_users(
        &self,
        actor: Actor,
        role: Option<Role>,
    ) -> Result<Vec<User>, WorkflowError> {
        if !actor.is_admin() {
            return Err(WorkflowError::forbidden("Only admins can list accounts"));
        }
        Ok(self.db.list_users(role).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_account_status(
        &self,
        actor: Actor,
        id: Uuid,
        status: Option<AccountStatus>,
    ) -> Result<User, WorkflowError> {
        let status = require(status, "accountStatus")?;
        self.managing(actor)?;

        let user = self
            .db
            .set_account_status(id, status)
            .await?
            .ok_or_else(|| WorkflowError::not_found("User not found"))?;
        if user.account_status != status {
            tracing::warn!(user = %user.id, "allow-listed account keeps its status");
        } else {
            tracing::info!(user = %user.id, status = status.as_str(), "account status changed");
        }
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_resource_access(
        &self,
        actor: Actor,
        id: Uuid,
        access: Option<bool>,
    ) -> Result<User, WorkflowError> {
        let access = require(access, "resourceAccess")?;
        self.managing(actor)?;

        let user = self
            .db
            .set_resource_access(id, access)
            .await?
            .ok_or_else(|| WorkflowError::not_found("User not found"))?;
        tracing::info!(user = %user.id, access = user.resource_access, "resource access changed");
        Ok(user)
    }
}
