use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::config::Config;
use crate::data::schedule::db::{
    CancelData, RescheduleData, ScheduleClassData, ScheduleDb, ScheduleQuery, StatusData,
};
use crate::data::schedule::ClassScheduleResponse;
use crate::data::user::db::UserDb;
use crate::data::user::UserResponse;
use crate::data::Db;
use crate::middleware::paging::PageState;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::route::guard::Caller;
use crate::route::{scheduler, ClassMessageResponse};

/// Schedule a class with one of the caller's students
#[utoipa::path(
    request_body = ScheduleClassData,
    responses(
        (status = 201, description = "Class scheduled", body = ClassMessageResponse),
        (status = 400, description = "Missing field or malformed date", body = Problem),
        (status = 403, description = "Student isn't assigned to the caller", body = Problem),
        (status = 404, description = "Student doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/teacher/schedule-class", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn teacher_schedule_class(
    data: Json<ScheduleClassData>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<(Status, Json<ClassMessageResponse>), Problem> {
    let actor = caller.with_role(&[Role::Teacher])?;
    let row = scheduler(db, config)
        .create_class(actor, data.into_inner())
        .await?;

    Ok((
        Status::Created,
        Json(ClassMessageResponse::new("Class scheduled successfully", row)),
    ))
}

/// Class rows taught by the caller, ordered by date
#[utoipa::path(
    params(
        ("upcoming" = Option<bool>, Query, description = "only classes that haven't started"),
        ("page" = Option<u32>, Query, description = "page number, from 0"),
        ("len" = Option<u32>, Query, description = "page length"),
    ),
    responses((status = 200, description = "Class rows", body = Vec<ClassScheduleResponse>)),
    security(("jwt" = []))
)]
#[get("/teacher/classes?<upcoming>")]
#[tracing::instrument(skip(db))]
pub async fn teacher_classes(
    upcoming: Option<bool>,
    page: PageState,
    caller: Caller,
    db: &State<Db>,
) -> Result<Json<Vec<ClassScheduleResponse>>, Problem> {
    let actor = caller.with_role(&[Role::Teacher])?;

    let mut query = ScheduleQuery::for_teacher(actor.id);
    if upcoming.unwrap_or(false) {
        query.from = Some(chrono::Utc::now());
    }
    let rows = db.list_schedules(&page.apply(query)).await?;

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Students on the caller's roster
#[utoipa::path(
    responses((status = 200, description = "Assigned students", body = Vec<UserResponse>)),
    security(("jwt" = []))
)]
#[get("/teacher/students")]
#[tracing::instrument(skip(db))]
pub async fn teacher_students(
    caller: Caller,
    db: &State<Db>,
) -> Result<Json<Vec<UserResponse>>, Problem> {
    caller.with_role(&[Role::Teacher])?;

    let mut students = Vec::with_capacity(caller.user.assigned_students.len());
    for id in &caller.user.assigned_students {
        match db.get_user(*id).await? {
            Some(student) => students.push(student.into()),
            None => tracing::warn!(student = %id, "roster references a missing account"),
        }
    }

    Ok(Json(students))
}

/// Cancel one of the caller's classes
#[utoipa::path(
    request_body = CancelData,
    params(("id", description = "class schedule ID")),
    responses(
        (status = 200, description = "Class cancelled", body = ClassMessageResponse),
        (status = 403, description = "Class belongs to another teacher", body = Problem),
        (status = 404, description = "Class doesn't exist", body = Problem),
        (status = 409, description = "Class already cancelled", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/teacher/classes/<id>/cancel", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn teacher_cancel_class(
    id: Uuid,
    data: Option<Json<CancelData>>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<ClassMessageResponse>, Problem> {
    let actor = caller.with_role(&[Role::Teacher])?;
    let row = scheduler(db, config)
        .cancel(actor, id, data.map(Json::into_inner).unwrap_or_default())
        .await?;

    Ok(Json(ClassMessageResponse::new("Class cancelled successfully", row)))
}

/// Move one of the caller's classes
#[utoipa::path(
    request_body = RescheduleData,
    params(("id", description = "class schedule ID")),
    responses(
        (status = 200, description = "Class rescheduled", body = ClassMessageResponse),
        (status = 400, description = "Missing or malformed date", body = Problem),
        (status = 403, description = "Class belongs to another teacher", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/teacher/classes/<id>/reschedule", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn teacher_reschedule_class(
    id: Uuid,
    data: Json<RescheduleData>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<ClassMessageResponse>, Problem> {
    let actor = caller.with_role(&[Role::Teacher])?;
    let row = scheduler(db, config)
        .reschedule(actor, id, data.into_inner())
        .await?;

    Ok(Json(ClassMessageResponse::new("Class rescheduled successfully", row)))
}

/// Record attendance for one of the caller's classes
#[utoipa::path(
    request_body = StatusData,
    params(("id", description = "class schedule ID")),
    responses(
        (status = 200, description = "Status recorded", body = ClassMessageResponse),
        (status = 400, description = "Status isn't completed or missed", body = Problem),
        (status = 403, description = "Class belongs to another teacher", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/teacher/classes/<id>/status", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn teacher_class_status(
    id: Uuid,
    data: Json<StatusData>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<ClassMessageResponse>, Problem> {
    let actor = caller.with_role(&[Role::Teacher])?;
    let row = scheduler(db, config)
        .mark_status(actor, id, data.into_inner())
        .await?;

    Ok(Json(ClassMessageResponse::new("Class status updated", row)))
}
