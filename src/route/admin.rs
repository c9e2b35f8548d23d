use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::config::Config;
use crate::data::resource::db::ReviewData;
use crate::data::resource::{RequestStatus, ResourceRequestResponse};
use crate::data::schedule::db::{CancelData, RescheduleData, ScheduleClassData, ScheduleDb, ScheduleQuery};
use crate::data::schedule::ClassScheduleResponse;
use crate::data::user::UserResponse;
use crate::data::Db;
use crate::error::WorkflowError;
use crate::middleware::paging::PageState;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::route::guard::Caller;
use crate::route::{scheduler, ClassMessageResponse, ResourceRequestMessageResponse, UserMessageResponse};
use crate::workflow::account::{AccountStatusData, AssignTeacherData, ResourceAccessData};

/// Schedule a class for any student with any teacher
#[utoipa::path(
    request_body = ScheduleClassData,
    responses(
        (status = 201, description = "Class scheduled", body = ClassMessageResponse),
        (status = 400, description = "Missing field, malformed date or wrong role", body = Problem),
        (status = 403, description = "Caller isn't an admin", body = Problem),
        (status = 404, description = "Student or teacher doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/admin/schedule-class", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn admin_schedule_class(
    data: Json<ScheduleClassData>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<(Status, Json<ClassMessageResponse>), Problem> {
    let actor = caller.with_role(&[Role::Admin])?;
    let row = scheduler(db, config)
        .create_class(actor, data.into_inner())
        .await?;

    Ok((
        Status::Created,
        Json(ClassMessageResponse::new("Class scheduled successfully", row)),
    ))
}

/// Cancel any class
#[utoipa::path(
    request_body = CancelData,
    params(("id", description = "class schedule ID")),
    responses(
        (status = 200, description = "Class cancelled", body = ClassMessageResponse),
        (status = 404, description = "Class doesn't exist", body = Problem),
        (status = 409, description = "Class already cancelled", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/admin/classes/<id>/cancel", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn admin_cancel_class(
    id: Uuid,
    data: Option<Json<CancelData>>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<ClassMessageResponse>, Problem> {
    let actor = caller.with_role(&[Role::Admin])?;
    let row = scheduler(db, config)
        .cancel(actor, id, data.map(Json::into_inner).unwrap_or_default())
        .await?;

    Ok(Json(ClassMessageResponse::new("Class cancelled successfully", row)))
}

/// Move any class to a new date
#[utoipa::path(
    request_body = RescheduleData,
    params(("id", description = "class schedule ID")),
    responses(
        (status = 200, description = "Class rescheduled", body = ClassMessageResponse),
        (status = 400, description = "Missing or malformed date", body = Problem),
        (status = 404, description = "Class doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/admin/classes/<id>/reschedule", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn admin_reschedule_class(
    id: Uuid,
    data: Json<RescheduleData>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<ClassMessageResponse>, Problem> {
    let actor = caller.with_role(&[Role::Admin])?;
    let row = scheduler(db, config)
        .reschedule(actor, id, data.into_inner())
        .await?;

    Ok(Json(ClassMessageResponse::new("Class rescheduled successfully", row)))
}

/// All class rows, ordered by date
#[utoipa::path(
    params(
        ("upcoming" = Option<bool>, Query, description = "only classes that haven't started"),
        ("page" = Option<u32>, Query, description = "page number, from 0"),
        ("len" = Option<u32>, Query, description = "page length"),
    ),
    responses((status = 200, description = "Class rows", body = Vec<ClassScheduleResponse>)),
    security(("jwt" = []))
)]
#[get("/admin/classes?<upcoming>")]
#[tracing::instrument(skip(db))]
pub async fn admin_classes(
    upcoming: Option<bool>,
    page: PageState,
    caller: Caller,
    db: &State<Db>,
) -> Result<Json<Vec<ClassScheduleResponse>>, Problem> {
    caller.with_role(&[Role::Admin])?;

    let query = page.apply(ScheduleQuery {
        from: upcoming.filter(|it| *it).map(|_| chrono::Utc::now()),
        ..Default::default()
    });
    let rows = db.list_schedules(&query).await?;

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Accounts, newest first
#[utoipa::path(
    params(("role" = Option<String>, Query, description = "student, teacher or admin")),
    responses(
        (status = 200, description = "Accounts", body = Vec<UserResponse>),
        (status = 400, description = "Unknown role", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/admin/users?<role>")]
#[tracing::instrument(skip(db, config))]
pub async fn admin_users(
    role: Option<&str>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<Vec<UserResponse>>, Problem> {
    let role = role
        .map(str::parse::<Role>)
        .transpose()
        .map_err(WorkflowError::validation)?;

    let users = scheduler(db, config)
        .list_users(caller.actor(), role)
        .await?;

    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// Reassign a student's teacher
#[utoipa::path(
    request_body = AssignTeacherData,
    params(("id", description = "student ID")),
    responses(
        (status = 200, description = "Teacher assigned", body = UserMessageResponse),
        (status = 400, description = "Referenced user has the wrong role", body = Problem),
        (status = 404, description = "Student or teacher doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/admin/users/<id>/assign-teacher", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn admin_assign_teacher(
    id: Uuid,
    data: Json<AssignTeacherData>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<UserMessageResponse>, Problem> {
    let student = scheduler(db, config)
        .assign_teacher(caller.actor(), id, data.teacher_id)
        .await?;

    Ok(Json(UserMessageResponse::new("Teacher assigned successfully", student)))
}

/// Approve, block or reset an account
#[utoipa::path(
    request_body = AccountStatusData,
    params(("id", description = "user ID")),
    responses(
        (status = 200, description = "Status updated", body = UserMessageResponse),
        (status = 404, description = "User doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/admin/users/<id>/status", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn admin_user_status(
    id: Uuid,
    data: Json<AccountStatusData>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<UserMessageResponse>, Problem> {
    let user = scheduler(db, config)
        .set_account_status(caller.actor(), id, data.account_status)
        .await?;

    Ok(Json(UserMessageResponse::new("Account status updated", user)))
}

/// Grant or revoke resource access
#[utoipa::path(
    request_body = ResourceAccessData,
    params(("id", description = "user ID")),
    responses(
        (status = 200, description = "Access updated", body = UserMessageResponse),
        (status = 404, description = "User doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/admin/users/<id>/resource-access", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn admin_resource_access(
    id: Uuid,
    data: Json<ResourceAccessData>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<UserMessageResponse>, Problem> {
    let user = scheduler(db, config)
        .set_resource_access(caller.actor(), id, data.resource_access)
        .await?;

    Ok(Json(UserMessageResponse::new("Resource access updated", user)))
}

/// Resource requests, oldest first
#[utoipa::path(
    params(("status" = Option<String>, Query, description = "pending, approved or rejected")),
    responses((status = 200, description = "Requests", body = Vec<ResourceRequestResponse>)),
    security(("jwt" = []))
)]
#[get("/admin/resource-requests?<status>")]
#[tracing::instrument(skip(db, config))]
pub async fn admin_resource_requests(
    status: Option<&str>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<Vec<ResourceRequestResponse>>, Problem> {
    let status = match status {
        None => None,
        Some("pending") => Some(RequestStatus::Pending),
        Some("approved") => Some(RequestStatus::Approved),
        Some("rejected") => Some(RequestStatus::Rejected),
        Some(other) => {
            return Err(WorkflowError::validation(format!("unknown request status '{}'", other)).into())
        }
    };

    let requests = scheduler(db, config)
        .list_resource_requests(caller.actor(), status)
        .await?;

    Ok(Json(requests.into_iter().map(Into::into).collect()))
}

async fn review(
    id: Uuid,
    approve: bool,
    data: Option<Json<ReviewData>>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<ResourceRequestMessageResponse>, Problem> {
    let request = scheduler(db, config)
        .review_resource_request(
            caller.actor(),
            id,
            approve,
            data.map(Json::into_inner).unwrap_or_default(),
        )
        .await?;

    let message = if approve {
        "Resource request approved"
    } else {
        "Resource request rejected"
    };
    Ok(Json(ResourceRequestMessageResponse::new(message, request)))
}

/// Approve a pending request and grant resource access
#[utoipa::path(
    request_body = ReviewData,
    params(("id", description = "resource request ID")),
    responses(
        (status = 200, description = "Approved", body = ResourceRequestMessageResponse),
        (status = 404, description = "Request doesn't exist", body = Problem),
        (status = 409, description = "Request already reviewed", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/admin/resource-requests/<id>/approve", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn admin_approve_request(
    id: Uuid,
    data: Option<Json<ReviewData>>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<ResourceRequestMessageResponse>, Problem> {
    review(id, true, data, caller, db, config).await
}

/// Reject a pending request
#[utoipa::path(
    request_body = ReviewData,
    params(("id", description = "resource request ID")),
    responses(
        (status = 200, description = "Rejected", body = ResourceRequestMessageResponse),
        (status = 404, description = "Request doesn't exist", body = Problem),
        (status = 409, description = "Request already reviewed", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/admin/resource-requests/<id>/reject", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn admin_reject_request(
    id: Uuid,
    data: Option<Json<ReviewData>>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<ResourceRequestMessageResponse>, Problem> {
    review(id, false, data, caller, db, config).await
}

#[cfg(test)]
mod admin_endpoints {
    use rocket::http::{ContentType, Status};
    use serde_json::{json, Value};

    use crate::data::notification::NotificationKind;
    use crate::data::schedule::ScheduleStatus;
    use crate::data::user::db::UserDb;
    use crate::role::Role;
    use crate::route::tests::{bearer, TestApp};

    use super::*;

    #[rocket::async_test]
    async fn v1_admin_schedule_then_cancel() {
        let app = TestApp::new().await;
        let admin = app.admin().await;
        let teacher = app.user("bilal@example.com", Role::Teacher).await;
        let student = app.user("amina@example.com", Role::Student).await;

        let response = app
            .client
            .post("/api/v1/admin/schedule-class")
            .header(ContentType::JSON)
            .header(bearer(&app.token(&admin)))
            .body(
                json!({
                    "studentId": student.id,
                    "teacherId": teacher.id,
                    "courseType": "hifz",
                    "scheduledDate": "2030-03-04T09:00:00Z",
                    "notes": "Surah Al-Mulk",
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Created);
        let created: ClassMessageResponse = response.into_json().await.expect("created json");
        assert_eq!(created.message, "Class scheduled successfully");
        assert_eq!(created.class.duration, 30);
        assert_eq!(created.class.teacher_id, Some(teacher.id));

        let response = app
            .client
            .patch(format!("/api/v1/admin/classes/{}/cancel", created.class.id))
            .header(ContentType::JSON)
            .header(bearer(&app.token(&admin)))
            .body(json!({ "reason": "sick" }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let cancelled: ClassMessageResponse = response.into_json().await.expect("cancel json");
        assert_eq!(cancelled.class.status, ScheduleStatus::Cancelled);
        assert_eq!(cancelled.class.notes, "Surah Al-Mulk | Cancelled: sick");

        let notifications = app.db.all_notifications().await;
        assert_eq!(notifications.len(), 4);
        assert_eq!(
            notifications
                .iter()
                .filter(|it| it.kind == NotificationKind::ClassCancelled)
                .count(),
            2
        );
    }

    #[rocket::async_test]
    async fn v1_admin_schedule_reports_missing_fields() {
        let app = TestApp::new().await;
        let admin = app.admin().await;

        let response = app
            .client
            .post("/api/v1/admin/schedule-class")
            .header(ContentType::JSON)
            .header(bearer(&app.token(&admin)))
            .body(json!({ "courseType": "hifz" }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().await.expect("problem json");
        assert_eq!(body["message"], "teacherId is required");
    }

    #[rocket::async_test]
    async fn v1_admin_routes_refuse_teachers() {
        let app = TestApp::new().await;
        let teacher = app.user("bilal@example.com", Role::Teacher).await;

        let response = app
            .client
            .get("/api/v1/admin/users")
            .header(bearer(&app.token(&teacher)))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Forbidden);
        let body: Value = response.into_json().await.expect("problem json");
        assert!(body["message"].is_string());
    }

    #[rocket::async_test]
    async fn v1_admin_lists_users_by_role() {
        let app = TestApp::new().await;
        let admin = app.admin().await;
        app.user("bilal@example.com", Role::Teacher).await;
        app.user("amina@example.com", Role::Student).await;

        let response = app
            .client
            .get("/api/v1/admin/users?role=teacher")
            .header(bearer(&app.token(&admin)))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let users: Vec<UserResponse> = response.into_json().await.expect("users json");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Teacher);

        let response = app
            .client
            .get("/api/v1/admin/users?role=janitor")
            .header(bearer(&app.token(&admin)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn v1_admin_assign_teacher_updates_both_sides() {
        let app = TestApp::new().await;
        let admin = app.admin().await;
        let teacher = app.user("bilal@example.com", Role::Teacher).await;
        let student = app.user("amina@example.com", Role::Student).await;

        let response = app
            .client
            .patch(format!("/api/v1/admin/users/{}/assign-teacher", student.id))
            .header(ContentType::JSON)
            .header(bearer(&app.token(&admin)))
            .body(json!({ "teacherId": teacher.id }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let body: UserMessageResponse = response.into_json().await.expect("user json");
        assert_eq!(body.user.assigned_teacher, Some(teacher.id));

        let teacher = app.db.get_user(teacher.id).await.expect("get").expect("exists");
        assert_eq!(teacher.assigned_students, vec![student.id]);
    }

    #[rocket::async_test]
    async fn v1_admin_reviews_resource_requests() {
        let app = TestApp::new().await;
        let admin = app.admin().await;
        let student = app.user("amina@example.com", Role::Student).await;

        let response = app
            .client
            .post("/api/v1/resource-requests")
            .header(ContentType::JSON)
            .header(bearer(&app.token(&student)))
            .body(json!({ "message": "I'd like the tajweed charts" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let created: ResourceRequestMessageResponse =
            response.into_json().await.expect("request json");

        let pending = app
            .client
            .get("/api/v1/admin/resource-requests?status=pending")
            .header(bearer(&app.token(&admin)))
            .dispatch()
            .await;
        let pending: Vec<ResourceRequestResponse> = pending.into_json().await.expect("list json");
        assert_eq!(pending.len(), 1);

        let response = app
            .client
            .patch(format!("/api/v1/admin/resource-requests/{}/approve", created.request.id))
            .header(bearer(&app.token(&admin)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let student = app.db.get_user(student.id).await.expect("get").expect("exists");
        assert!(student.resource_access);
    }
}
