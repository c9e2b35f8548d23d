use rocket::http::Status;
use rocket::outcome::{try_outcome, Outcome};
use rocket::request::{self, FromRequest, Request};

use crate::data::user::db::problem as user_problem;
use crate::data::user::db::UserDb;
use crate::data::user::User;
use crate::data::Db;
use crate::error::WorkflowError;
use crate::resp::jwt::{auth_problem, guard_failure, UserRoleToken};
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::workflow::Actor;

/// Authenticated, non-blocked account behind the request's identity token.
///
/// Loaded from the store on every request so role changes and blocks apply
/// immediately, whatever the token claims.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: User,
}

impl Caller {
    pub fn actor(&self) -> Actor {
        Actor::from(&self.user)
    }

    /// Actor for routes reserved to the given roles.
    pub fn with_role(&self, roles: &[Role]) -> Result<Actor, Problem> {
        if roles.contains(&self.user.role) {
            Ok(self.actor())
        } else {
            let allowed: Vec<String> = roles.iter().map(ToString::to_string).collect();
            Err(WorkflowError::forbidden(format!(
                "This action requires role: {}",
                allowed.join(" or ")
            ))
            .into())
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Caller {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = try_outcome!(req.guard::<UserRoleToken>().await);

        let db = match req.rocket().state::<Db>() {
            Some(it) => it,
            None => {
                return guard_failure(
                    req,
                    Problem::new_untyped(Status::InternalServerError, "Storage isn't configured."),
                )
            }
        };

        match db.get_user(token.user).await {
            Ok(Some(user)) if user.is_blocked() => {
                tracing::info!(user = %user.id, "refused blocked account");
                guard_failure(req, user_problem::blocked())
            }
            Ok(Some(user)) => {
                if user.role != token.role {
                    tracing::debug!(user = %user.id, claimed = %token.role, actual = %user.role, "token role is stale");
                }
                Outcome::Success(Caller { user })
            }
            Ok(None) => guard_failure(req, auth_problem("Account no longer exists.")),
            Err(e) => {
                tracing::error!("unable to load caller: {}", e);
                guard_failure(req, Problem::from(e))
            }
        }
    }
}
