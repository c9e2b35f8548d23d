use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::config::Config;
use crate::data::class::db::{AddStudentData, ClassCreateData};
use crate::data::class::ClassResponse;
use crate::data::Db;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::route::guard::Caller;
use crate::route::{scheduler, EnrollmentResponse, OfferingMessageResponse};

/// Group offerings visible to the caller
///
/// Students see offerings still open for enrollment, teachers their own, admins all.
#[utoipa::path(
    responses((status = 200, description = "Offerings", body = Vec<ClassResponse>)),
    security(("jwt" = []))
)]
#[get("/classes")]
#[tracing::instrument(skip(db, config))]
pub async fn list_classes(
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<Vec<ClassResponse>>, Problem> {
    let classes = scheduler(db, config)
        .list_offerings(caller.actor())
        .await?;

    Ok(Json(classes.into_iter().map(Into::into).collect()))
}

/// Create a group offering
#[utoipa::path(
    request_body = ClassCreateData,
    responses(
        (status = 201, description = "Offering created", body = OfferingMessageResponse),
        (status = 400, description = "Missing field or malformed date", body = Problem),
        (status = 403, description = "Caller can't teach", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/classes", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(db, config))]
pub async fn create_class_offering(
    data: Json<ClassCreateData>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<(Status, Json<OfferingMessageResponse>), Problem> {
    let actor = caller.with_role(&[Role::Teacher, Role::Admin])?;
    let class = scheduler(db, config)
        .create_offering(actor, data.into_inner())
        .await?;

    Ok((
        Status::Created,
        Json(OfferingMessageResponse::new("Class created successfully", class)),
    ))
}

/// Add a student to an offering's roster
#[utoipa::path(
    request_body = AddStudentData,
    params(("id", description = "offering ID")),
    responses(
        (status = 201, description = "Student added", body = EnrollmentResponse),
        (status = 403, description = "Caller doesn't teach this offering", body = Problem),
        (status = 409, description = "Offering full, closed, or student already enrolled", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/classes/<id>/students", format = "application/json", data = "<data>", rank = 2)]
#[tracing::instrument(skip(db, config))]
pub async fn add_class_student(
    id: Uuid,
    data: Json<AddStudentData>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<(Status, Json<EnrollmentResponse>), Problem> {
    let actor = caller.with_role(&[Role::Teacher, Role::Admin])?;
    let (class, row) = scheduler(db, config)
        .assign_student_to_offering(actor, id, data.into_inner().student_id)
        .await?;

    Ok((
        Status::Created,
        Json(EnrollmentResponse::new("Student added to class", class, row)),
    ))
}

/// Cancel an offering
///
/// Class rows already spawned for enrolled students are left as they are.
#[utoipa::path(
    params(("id", description = "offering ID")),
    responses(
        (status = 200, description = "Offering cancelled", body = OfferingMessageResponse),
        (status = 403, description = "Caller doesn't teach this offering", body = Problem),
        (status = 409, description = "Offering already cancelled or completed", body = Problem),
    ),
    security(("jwt" = []))
)]
#[patch("/classes/<id>/cancel")]
#[tracing::instrument(skip(db, config))]
pub async fn cancel_class_offering(
    id: Uuid,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<Json<OfferingMessageResponse>, Problem> {
    let actor = caller.with_role(&[Role::Teacher, Role::Admin])?;
    let class = scheduler(db, config).cancel_offering(actor, id).await?;

    Ok(Json(OfferingMessageResponse::new("Class cancelled successfully", class)))
}

/// Enroll in an offering
///
/// Students enroll themselves; admins name the student in the body.
#[utoipa::path(
    request_body = AddStudentData,
    params(("id", description = "offering ID")),
    responses(
        (status = 201, description = "Enrolled", body = EnrollmentResponse),
        (status = 404, description = "Offering doesn't exist", body = Problem),
        (status = 409, description = "Offering full, closed, or already enrolled", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/classes/enroll/<id>", data = "<data>", rank = 1)]
#[tracing::instrument(skip(db, config))]
pub async fn enroll_class(
    id: Uuid,
    data: Option<Json<AddStudentData>>,
    caller: Caller,
    db: &State<Db>,
    config: &State<Config>,
) -> Result<(Status, Json<EnrollmentResponse>), Problem> {
    let student = data.and_then(|it| it.into_inner().student_id);
    let (class, row) = scheduler(db, config)
        .enroll(caller.actor(), id, student)
        .await?;

    Ok((
        Status::Created,
        Json(EnrollmentResponse::new("Enrolled successfully", class, row)),
    ))
}

#[cfg(test)]
mod class_endpoints {
    use rocket::http::{ContentType, Status};
    use serde_json::{json, Value};

    use crate::data::notification::NotificationKind;
    use crate::data::schedule::db::{ScheduleDb, ScheduleQuery};
    use crate::role::Role;
    use crate::route::tests::{bearer, TestApp};

    use super::*;

    async fn offering(app: &TestApp, token: &str, seats: u32) -> ClassResponse {
        let response = app
            .client
            .post("/api/v1/classes")
            .header(ContentType::JSON)
            .header(bearer(token))
            .body(
                json!({
                    "title": "Evening Tajweed",
                    "courseType": "tajweed",
                    "scheduledTime": "2030-03-04T18:00:00Z",
                    "maxStudents": seats,
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let body: OfferingMessageResponse = response.into_json().await.expect("offering json");
        body.class
    }

    #[rocket::async_test]
    async fn v1_enroll_until_full() {
        let app = TestApp::new().await;
        let teacher = app.user("bilal@example.com", Role::Teacher).await;
        let first = app.user("amina@example.com", Role::Student).await;
        let second = app.user("omar@example.com", Role::Student).await;
        let class = offering(&app, &app.token(&teacher), 1).await;
        assert_eq!(class.duration, 30);

        let response = app
            .client
            .post(format!("/api/v1/classes/enroll/{}", class.id))
            .header(bearer(&app.token(&first)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let enrolled: EnrollmentResponse = response.into_json().await.expect("enroll json");
        assert_eq!(enrolled.class.enrolled_students, vec![first.id]);
        assert_eq!(enrolled.schedule.room_id, class.room_id);
        assert_eq!(enrolled.schedule.class_id, Some(class.id));

        let response = app
            .client
            .post(format!("/api/v1/classes/enroll/{}", class.id))
            .header(bearer(&app.token(&second)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
        let body: Value = response.into_json().await.expect("problem json");
        assert_eq!(body["message"], "Class is full");

        let rows = app
            .db
            .list_schedules(&ScheduleQuery::for_student(second.id))
            .await
            .expect("rows");
        assert!(rows.is_empty());

        let kinds: Vec<_> = app
            .db
            .all_notifications()
            .await
            .into_iter()
            .map(|it| it.kind)
            .collect();
        assert_eq!(kinds, vec![NotificationKind::ClassScheduled; 2]);
    }

    #[rocket::async_test]
    async fn v1_teacher_adds_student_to_own_offering() {
        let app = TestApp::new().await;
        let teacher = app.user("bilal@example.com", Role::Teacher).await;
        let other = app.user("yusuf@example.com", Role::Teacher).await;
        let student = app.user("amina@example.com", Role::Student).await;
        let class = offering(&app, &app.token(&teacher), 5).await;

        let body = json!({ "studentId": student.id }).to_string();
        let response = app
            .client
            .post(format!("/api/v1/classes/{}/students", class.id))
            .header(ContentType::JSON)
            .header(bearer(&app.token(&other)))
            .body(body.clone())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = app
            .client
            .post(format!("/api/v1/classes/{}/students", class.id))
            .header(ContentType::JSON)
            .header(bearer(&app.token(&teacher)))
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
    }

    #[rocket::async_test]
    async fn v1_students_see_open_offerings_only() {
        let app = TestApp::new().await;
        let teacher = app.user("bilal@example.com", Role::Teacher).await;
        let student = app.user("amina@example.com", Role::Student).await;
        let open = offering(&app, &app.token(&teacher), 5).await;
        let closed = offering(&app, &app.token(&teacher), 5).await;

        let response = app
            .client
            .patch(format!("/api/v1/classes/{}/cancel", closed.id))
            .header(bearer(&app.token(&teacher)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = app
            .client
            .get("/api/v1/classes")
            .header(bearer(&app.token(&student)))
            .dispatch()
            .await;
        let listed: Vec<ClassResponse> = response.into_json().await.expect("list json");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, open.id);

        let response = app
            .client
            .post("/api/v1/classes")
            .header(ContentType::JSON)
            .header(bearer(&app.token(&student)))
            .body(json!({ "title": "Mine" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }
}
