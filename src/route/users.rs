use rocket::http::{Cookie, CookieJar, Status};
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::Config;
use crate::data::activity::db::ActivityDb;
use crate::data::activity::{ActivityKind, ActivityLog};
use crate::data::user::db::problem as user_problem;
use crate::data::user::db::{UserDb, UserLoginData, UserSignupData};
use crate::data::user::{User, UserResponse};
use crate::data::Db;
use crate::error::StoreError;
use crate::resp::jwt::{UserRoleToken, AUTH_COOKIE_NAME};
use crate::resp::problem::Problem;
use crate::route::guard::Caller;
use crate::security::Security;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    /// Bearer token; also set as the `jwt_auth` cookie.
    pub token: String,
    pub user: UserResponse,
}

fn issue(
    user: User,
    message: &str,
    cookies: &CookieJar<'_>,
    security: &Security,
) -> Result<AuthResponse, Problem> {
    let urt = UserRoleToken::new(&user);
    let token = urt.encode_jwt(&security.jwt_keys.private)?;
    cookies.add(urt.cookie(&security.jwt_keys.private)?);

    Ok(AuthResponse {
        message: message.to_string(),
        token,
        user: user.into(),
    })
}

/// Register a student or teacher account
#[utoipa::path(
    request_body = UserSignupData,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Missing or invalid fields", body = Problem),
        (status = 409, description = "Email already registered", body = Problem),
    )
)]
#[post("/auth/signup", format = "application/json", data = "<signup>")]
#[tracing::instrument(skip(cookies, db, config, security))]
pub async fn signup(
    signup: Json<UserSignupData>,
    cookies: &CookieJar<'_>,
    db: &State<Db>,
    config: &State<Config>,
    security: &State<Security>,
) -> Result<(Status, Json<AuthResponse>), Problem> {
    signup.validate()?;
    let email = signup.email.clone().unwrap_or_default();

    let user = signup
        .into_inner()
        .into_user(&security.salt, config.password_cost);
    let user = match db.insert_user(user).await {
        Ok(it) => it,
        Err(StoreError::Duplicate(_)) => return Err(user_problem::email_taken(email)),
        Err(e) => return Err(e.into()),
    };
    tracing::info!(user = %user.id, role = %user.role, "account registered");

    let response = issue(user, "Account created", cookies, security)?;
    Ok((Status::Created, Json(response)))
}

/// Log in with email and password
#[utoipa::path(
    request_body = UserLoginData,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Bad email or password", body = Problem),
        (status = 403, description = "Account blocked", body = Problem),
    )
)]
#[post("/auth/login", format = "application/json", data = "<login>")]
#[tracing::instrument(skip(cookies, db, config, security))]
pub async fn login(
    login: Json<UserLoginData>,
    cookies: &CookieJar<'_>,
    db: &State<Db>,
    config: &State<Config>,
    security: &State<Security>,
) -> Result<Json<AuthResponse>, Problem> {
    login.validate()?;

    // VULN: No throttling of repeated login attempts
    let user = db
        .find_user_by_email(&login.email)
        .await?
        .ok_or_else(user_problem::bad_login)?;

    if !user
        .pw_hash
        .verify(&login.password, &security.salt, config.password_cost)
    {
        return Err(user_problem::bad_login());
    }
    if user.is_blocked() {
        return Err(user_problem::blocked());
    }

    if let Err(e) = db
        .insert_activity(ActivityLog::new(user.id, ActivityKind::Login, "Logged in"))
        .await
    {
        tracing::warn!(user = %user.id, "unable to record login activity: {}", e);
    }

    Ok(Json(issue(user, "Logged in", cookies, security)?))
}

/// Drop the authentication cookie
#[utoipa::path(responses((status = 204, description = "Cookie removed")))]
#[post("/auth/logout")]
pub async fn logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(Cookie::build(AUTH_COOKIE_NAME).path("/"));
    Status::NoContent
}

/// Account of the authenticated user
#[utoipa::path(
    responses(
        (status = 200, description = "Current account", body = UserResponse),
        (status = 401, description = "Missing or expired token", body = Problem),
        (status = 403, description = "Account blocked", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/auth/me")]
#[tracing::instrument]
pub async fn me(caller: Caller) -> Json<UserResponse> {
    Json(caller.user.into())
}
