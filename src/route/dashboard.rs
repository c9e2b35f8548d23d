use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::config::Config;
use crate::data::activity::db::ActivityDb;
use crate::data::activity::ActivityResponse;
use crate::data::schedule::db::{ScheduleDb, ScheduleQuery, StatusData};
use crate::data::schedule::ClassScheduleResponse;
use crate::data::Db;
use crate::middleware::paging::PageState;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::route::guard::Caller;
use crate::route::{scheduler, ClassMessageResponse};

const ACTIVITY_LIMIT: u32 = 20;

/// Class rows on the caller's dashboard, ordered by date
///
/// Students see their own classes, teachers the classes they teach, admins every row.
#[utoipa::path(
    params(
        ("upcoming" = Option<bool>, Query, description = "only classes that haven't started"),
        ("page" = Option<u32>, Query, description = "page number, from 0"),
        ("len" = Option<u32>, Query, description = "page length"),
    ),
    responses((status = 200, description = "Class rows", body = Vec<ClassScheduleResponse>)),
    security(("jwt" = []))
)]
#[get("/dashboard/classes?<upcoming>")]
#[tracing::instrument(skip(db))]
pub async fn dashboard_classes(
    upcoming: Option<bool>,
    page: PageState,
    caller: Caller,
    db: &State<Db>,
) -> Result<Json<Vec<ClassScheduleResponse>>, Problem> {
    let mut query = match caller.user.role {
        Role::Student => ScheduleQuery::for_student(caller.user.id),
        Role::Teacher => ScheduleQuery::for_teacher(caller.user.id),
        Role::Admin => ScheduleQuery::default(),
    };
    if upcoming.unwrap_or(false) {
        query.from = Some(chrono::Utc::now());
    }

    let rows = db.list_schedules(&page.apply(query)).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// The caller's recent activity, newest first
#[utoipa::path(
    responses((status = 200, description = "Activity entries", body = Vec<ActivityResponse>)),
    security(("jwt" = []))
)]
#[get("/dashboard/activity")]
#[tracing::instrument(skip(db))]
pub async fn dashboard_activity(
    caller: Caller,
    db: &State<Db>,
) -> Result<Json<Vec<ActivityResponse>>, Problem> {
    let entries = db.list_activity(caller.user.id, ACTIVITY_LIMIT).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// Record attendance on one of the caller's own classes
#[utoipa::path(
    request_body = StatusData,
    params(("id", description = "class schedule ID")),
    responses(
        (status = 200, description = "Status recorded", body = ClassMessageResponse),
        (status = 400, description = "Status isn't completed or missed", body = Problem),
        (status = 403, description = "Class belongs to someone else", body = Problem),
        (status = 404, description = "Class doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/dashboard/classes/<id>/status", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn dashboard_class_status(
    id: Uuid,
    data: Json<StatusData>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<ClassMessageResponse>, Problem> {
    let actor = caller.with_role(&[Role::Student, Role::Admin])?;
    let row = scheduler(db, config)
        .mark_status(actor, id, data.into_inner())
        .await?;

    Ok(Json(ClassMessageResponse::new("Class status updated", row)))
}
