use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;

use crate::config::Config;
use crate::data::resource::db::ResourceRequestData;
use crate::data::Db;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::route::guard::Caller;
use crate::route::{scheduler, ResourceRequestMessageResponse};

/// Ask an admin for access to premium resources
#[utoipa::path(
    request_body = ResourceRequestData,
    responses(
        (status = 201, description = "Request filed", body = ResourceRequestMessageResponse),
        (status = 403, description = "Caller isn't a student", body = Problem),
        (status = 409, description = "Already has access or a pending request", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/resource-requests", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn request_resources(
    data: Json<ResourceRequestData>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<(Status, Json<ResourceRequestMessageResponse>), Problem> {
    let actor = caller.with_role(&[Role::Student])?;
    let request = scheduler(db, config)
        .request_resources(actor, data.into_inner())
        .await?;

    Ok((
        Status::Created,
        Json(ResourceRequestMessageResponse::new("Resource request submitted", request)),
    ))
}
