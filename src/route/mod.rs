use std::collections::BTreeMap;

use rocket::http::Status;
use rocket::{Build, Catcher, Request, Rocket, Route, State};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod admin;
pub mod classes;
pub mod dashboard;
pub mod guard;
pub mod notifications;
pub mod resources;
pub mod teacher;
pub mod users;

use admin::*;
use classes::*;
use dashboard::*;
use notifications::*;
use resources::*;
use teacher::*;
use users::*;

use crate::config::Config;
use crate::data::activity::{ActivityKind, ActivityResponse};
use crate::data::class::db::{AddStudentData, ClassCreateData};
use crate::data::class::{Class, ClassResponse, ClassStatus};
use crate::data::notification::{
    NotificationKind, NotificationListResponse, NotificationMetadataResponse, NotificationResponse,
};
use crate::data::resource::db::{ResourceRequestData, ReviewData};
use crate::data::resource::{RequestStatus, ResourceRequest, ResourceRequestResponse};
use crate::data::schedule::db::{CancelData, RescheduleData, ScheduleClassData, StatusData};
use crate::data::schedule::{ClassSchedule, ClassScheduleResponse, CourseType, ScheduleStatus};
use crate::data::user::db::{UserLoginData, UserSignupData};
use crate::data::user::{AccountStatus, User, UserResponse};
use crate::data::Db;
use crate::resp::jwt::{doc::JWTAuth, GuardProblem};
use crate::resp::problem::{problems, Problem};
use crate::role::Role;
use crate::workflow::account::{AccountStatusData, AssignTeacherData, ResourceAccessData};
use crate::workflow::Scheduler;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClassMessageResponse {
    pub message: String,
    pub class: ClassScheduleResponse,
}

impl ClassMessageResponse {
    pub fn new(message: impl ToString, row: ClassSchedule) -> Self {
        ClassMessageResponse {
            message: message.to_string(),
            class: row.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OfferingMessageResponse {
    pub message: String,
    pub class: ClassResponse,
}

impl OfferingMessageResponse {
    pub fn new(message: impl ToString, class: Class) -> Self {
        OfferingMessageResponse {
            message: message.to_string(),
            class: class.into(),
        }
    }
}

/// Offering after enrollment along with the student's new class row.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentResponse {
    pub message: String,
    pub class: ClassResponse,
    pub schedule: ClassScheduleResponse,
}

impl EnrollmentResponse {
    pub fn new(message: impl ToString, class: Class, row: ClassSchedule) -> Self {
        EnrollmentResponse {
            message: message.to_string(),
            class: class.into(),
            schedule: row.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserMessageResponse {
    pub message: String,
    pub user: UserResponse,
}

impl UserMessageResponse {
    pub fn new(message: impl ToString, user: User) -> Self {
        UserMessageResponse {
            message: message.to_string(),
            user: user.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResourceRequestMessageResponse {
    pub message: String,
    pub request: ResourceRequestResponse,
}

impl ResourceRequestMessageResponse {
    pub fn new(message: impl ToString, request: ResourceRequest) -> Self {
        ResourceRequestMessageResponse {
            message: message.to_string(),
            request: request.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CountMessageResponse {
    pub message: String,
    pub count: u64,
}

impl CountMessageResponse {
    pub fn new(message: impl ToString, count: u64) -> Self {
        CountMessageResponse {
            message: message.to_string(),
            count,
        }
    }
}

pub(crate) fn scheduler<'a>(db: &'a State<Db>, config: &Config) -> Scheduler<'a> {
    Scheduler::new(db.inner().as_ref(), config)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        signup,
        login,
        logout,
        me,
        admin_schedule_class,
        admin_cancel_class,
        admin_reschedule_class,
        admin_classes,
        admin_users,
        admin_assign_teacher,
        admin_user_status,
        admin_resource_access,
        admin_resource_requests,
        admin_approve_request,
        admin_reject_request,
        teacher_schedule_class,
        teacher_classes,
        teacher_students,
        teacher_cancel_class,
        teacher_reschedule_class,
        teacher_class_status,
        list_classes,
        create_class_offering,
        add_class_student,
        cancel_class_offering,
        enroll_class,
        dashboard_classes,
        dashboard_activity,
        dashboard_class_status,
        list_notifications,
        read_notification,
        read_all_notifications,
        clear_notifications,
        request_resources,
    ),
    components(schemas(
        Role,
        AccountStatus,
        CourseType,
        ScheduleStatus,
        ClassStatus,
        NotificationKind,
        ActivityKind,
        RequestStatus,
        UserResponse,
        UserLoginData,
        UserSignupData,
        AuthResponse,
        ScheduleClassData,
        RescheduleData,
        CancelData,
        StatusData,
        ClassScheduleResponse,
        ClassCreateData,
        AddStudentData,
        ClassResponse,
        NotificationResponse,
        NotificationMetadataResponse,
        NotificationListResponse,
        ActivityResponse,
        ResourceRequestData,
        ReviewData,
        ResourceRequestResponse,
        AssignTeacherData,
        AccountStatusData,
        ResourceAccessData,
        ClassMessageResponse,
        OfferingMessageResponse,
        EnrollmentResponse,
        UserMessageResponse,
        ResourceRequestMessageResponse,
        CountMessageResponse,
        Problem
    )),
    modifiers(&JWTAuth, &V1_PREFIX)
)]
pub struct ApiDocV1;

pub struct PathPrefix(pub &'static str);
static V1_PREFIX: PathPrefix = PathPrefix("/api/v1");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            new_paths.insert(self.0.to_string() + path.as_ref(), item);
        }

        openapi.paths.paths = new_paths;
    }
}

pub fn api_v1() -> Vec<Route> {
    routes![
        signup,
        login,
        logout,
        me,
        admin_schedule_class,
        admin_cancel_class,
        admin_reschedule_class,
        admin_classes,
        admin_users,
        admin_assign_teacher,
        admin_user_status,
        admin_resource_access,
        admin_resource_requests,
        admin_approve_request,
        admin_reject_request,
        teacher_schedule_class,
        teacher_classes,
        teacher_students,
        teacher_cancel_class,
        teacher_reschedule_class,
        teacher_class_status,
        list_classes,
        create_class_offering,
        add_class_student,
        cancel_class_offering,
        enroll_class,
        dashboard_classes,
        dashboard_activity,
        dashboard_class_status,
        list_notifications,
        read_notification,
        read_all_notifications,
        clear_notifications,
        request_resources,
    ]
}

/// Renders the problem a request guard left behind, or a bare one for the status.
fn caught(status: Status, req: &Request<'_>) -> Problem {
    match &req.local_cache(|| GuardProblem(None)).0 {
        Some(problem) => problem.clone(),
        None => Problem::new_untyped(status, status.reason_lossy()),
    }
}

#[catch(422)]
fn unprocessable(req: &Request<'_>) -> Problem {
    problems::parse_problem()
        .detail(format!("Request body for {} isn't valid", req.uri().path()))
        .clone()
}

#[catch(default)]
fn default_catcher(status: Status, req: &Request<'_>) -> Problem {
    caught(status, req)
}

pub fn catchers() -> Vec<Catcher> {
    catchers![unprocessable, default_catcher]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api/v1", api_v1())
        .mount(
            "/",
            SwaggerUi::new("/swagger/<_..>").url("/api/v1/openapi.json", ApiDocV1::openapi()),
        )
        .register("/", catchers())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use rocket::http::{ContentType, Header, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::Value;

    use crate::config::{Config, StorageKind};
    use crate::data::memory::MemoryBackend;
    use crate::data::user::db::UserDb;
    use crate::data::user::tests::{user, TEST_COST};
    use crate::data::user::{AdminAllowList, User};
    use crate::resp::jwt::UserRoleToken;
    use crate::role::Role;
    use crate::security::Security;

    pub const ADMIN_EMAIL: &str = "head@example.com";

    pub fn bearer(token: &str) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {}", token))
    }

    /// Rocket instance over an in-memory backend the test can inspect directly.
    pub struct TestApp {
        pub client: Client,
        pub db: Arc<MemoryBackend>,
        pub security: Security,
    }

    impl TestApp {
        pub async fn new() -> TestApp {
            let mut config = Config::default();
            config.storage = StorageKind::Memory;
            config.admin_emails = vec![ADMIN_EMAIL.to_string()];
            config.password_cost = TEST_COST;
            config.default_class_duration = 30;
            config.notification_limit = 50;

            let security = Security::fixture();
            let db = Arc::new(MemoryBackend::new(AdminAllowList::new(&config.admin_emails)));
            let rocket = crate::build(config, security.clone(), db.clone()).expect("valid rocket");
            let client = Client::tracked(rocket).await.expect("rocket client");

            TestApp {
                client,
                db,
                security,
            }
        }

        /// Stored account whose password is "correct horse battery".
        pub async fn user(&self, email: &str, role: Role) -> User {
            self.db.insert_user(user(email, role)).await.expect("insert user")
        }

        pub async fn admin(&self) -> User {
            self.user(ADMIN_EMAIL, Role::Admin).await
        }

        pub fn token(&self, user: &User) -> String {
            UserRoleToken::new(user)
                .encode_jwt(&self.security.jwt_keys.private)
                .expect("encode token")
        }

        pub async fn link(&self, student: &User, teacher: &User) {
            self.db
                .set_assigned_teacher(student.id, teacher.id)
                .await
                .expect("set teacher");
            self.db
                .add_assigned_student(teacher.id, student.id)
                .await
                .expect("add student");
        }
    }

    #[rocket::async_test]
    async fn v1_openapi_lists_routes_under_prefix() {
        let app = TestApp::new().await;

        let response = app.client.get("/api/v1/openapi.json").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let doc: Value = response.into_json().await.expect("openapi json");
        assert!(doc["paths"]["/api/v1/admin/schedule-class"].is_object());
        assert!(doc["paths"]["/api/v1/notifications"].is_object());
    }

    #[rocket::async_test]
    async fn v1_unknown_routes_are_problems() {
        let app = TestApp::new().await;

        let response = app.client.get("/api/v1/nowhere").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        assert_eq!(
            response.content_type(),
            Some(ContentType::new("application", "problem+json"))
        );
        let body: Value = response.into_json().await.expect("problem json");
        assert_eq!(body["message"], "Not Found");
    }

    #[rocket::async_test]
    async fn v1_malformed_body_is_bad_request() {
        let app = TestApp::new().await;
        let admin = app.admin().await;

        let response = app
            .client
            .post("/api/v1/admin/schedule-class")
            .header(ContentType::JSON)
            .header(bearer(&app.token(&admin)))
            .body("{\"studentId\": 12")
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().await.expect("problem json");
        assert!(body["message"].is_string());
    }
}
