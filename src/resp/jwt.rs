use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::{Cookie, CookieJar, Status};
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use rocket::time::OffsetDateTime;
use serde::{Deserialize, Serialize};

use super::util::date_time_as_unix_seconds;
use crate::data::user::User;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::security::Security;
use uuid::Uuid;

pub static AUTH_COOKIE_NAME: &'static str = "jwt_auth";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRoleToken {
    #[serde(with = "date_time_as_unix_seconds")]
    iat: DateTime<Utc>,
    #[serde(with = "date_time_as_unix_seconds")]
    exp: DateTime<Utc>,
    pub user: Uuid,
    pub role: Role,
}

impl UserRoleToken {
    pub fn new(user: &User) -> UserRoleToken {
        UserRoleToken::for_identity(user.id, user.role)
    }

    pub fn for_identity(user: Uuid, role: Role) -> UserRoleToken {
        let now = Utc::now();
        UserRoleToken {
            iat: now,
            exp: now + Duration::weeks(1),
            user,
            role,
        }
    }

    pub fn encode_jwt(
        &self,
        private_key: impl AsRef<[u8]>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let header = Header::new(Algorithm::PS256);
        let key = EncodingKey::from_rsa_pem(private_key.as_ref())?;

        Ok(encode(&header, &self, &key)?)
    }

    pub fn cookie(
        &self,
        private_key: impl AsRef<[u8]>,
    ) -> Result<Cookie<'static>, jsonwebtoken::errors::Error> {
        Ok(
            Cookie::build((AUTH_COOKIE_NAME, self.encode_jwt(private_key)?))
                .secure(true)
                .expires(OffsetDateTime::from_unix_timestamp(self.exp.timestamp()).ok())
                .path("/")
                .http_only(true)
                .build(),
        )
    }
}

pub fn auth_problem(detail: impl ToString) -> Problem {
    Problem::new_untyped(Status::Unauthorized, "Unable to authorize user.")
        .detail(detail)
        .clone()
}

/// Problem raised by a request guard, kept in the request cache so catchers can
/// render it instead of a generic body.
#[derive(Debug, Default)]
pub struct GuardProblem(pub Option<Problem>);

pub fn guard_failure<T>(req: &Request<'_>, problem: Problem) -> request::Outcome<T, Problem> {
    let status = problem.status;
    req.local_cache(|| GuardProblem(Some(problem.clone())));
    Outcome::Error((status, problem))
}

pub fn decode_token(
    token: impl AsRef<str>,
    public_key: impl AsRef<[u8]>,
) -> Result<UserRoleToken, Problem> {
    let key = DecodingKey::from_rsa_pem(public_key.as_ref()).map_err(|e| {
        tracing::error!("user_auth public key isn't valid: {}", e);
        auth_problem("Server is unable to verify tokens.")
    })?;

    match decode::<UserRoleToken>(token.as_ref(), &key, &Validation::new(Algorithm::PS256))
        .map(|data| data.claims)
    {
        Ok(it) => {
            tracing::debug!("decoded user roles token for user: {}", it.user);
            Ok(it)
        }
        Err(e) => Err(Problem::from(e)
            .detail("Identity token was malformed or expired.")
            .clone()),
    }
}

pub fn extract_claims(
    cookies: &CookieJar,
    public_key: impl AsRef<[u8]>,
) -> Result<UserRoleToken, Problem> {
    let auth_cookie = cookies.get(AUTH_COOKIE_NAME);
    let token = match auth_cookie {
        Some(jwt) => jwt.value().to_owned(),
        None => {
            return Err(auth_problem("No JWT auth cookie."));
        }
    };
    tracing::debug!("extracted jwt auth from cookie");

    decode_token(token, public_key)
}

fn bearer_token<'a>(req: &'a Request<'_>) -> Option<&'a str> {
    req.headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserRoleToken {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let security = match req.rocket().state::<Security>() {
            Some(it) => it,
            None => {
                return guard_failure(
                    req,
                    Problem::new_untyped(
                        Status::InternalServerError,
                        "Security information isn't loaded.",
                    ),
                )
            }
        };

        let claims = match bearer_token(req) {
            Some(token) => {
                tracing::trace!("extracting user roles token from authorization header");
                decode_token(token, &security.jwt_keys.public)
            }
            None => {
                tracing::trace!("extracting user roles token from request cookies");
                extract_claims(req.cookies(), &security.jwt_keys.public)
            }
        };

        match claims {
            Ok(it) => Outcome::Success(it),
            Err(e) => {
                tracing::debug!("unable to extract claims: {}", e.message());
                guard_failure(req, e)
            }
        }
    }
}

pub mod doc {
    use utoipa::openapi::security::*;

    #[derive(Clone, Copy)]
    pub struct JWTAuth;

    impl Into<SecurityScheme> for JWTAuth {
        fn into(self) -> SecurityScheme {
            let mut http = Http::new(HttpAuthScheme::Bearer);
            http.bearer_format = Some("JWT".to_string());
            SecurityScheme::Http(http)
        }
    }

    impl utoipa::Modify for JWTAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            if let Some(c) = openapi.components.as_mut() {
                c.add_security_scheme("jwt", *self)
            }
        }
    }
}

pub trait HasAuthCookie {
    fn get_auth_cookie(&self, public_key: impl AsRef<[u8]>) -> Option<UserRoleToken>;
}

#[cfg(test)]
impl HasAuthCookie for rocket::local::asynchronous::LocalResponse<'_> {
    fn get_auth_cookie(&self, public_key: impl AsRef<[u8]>) -> Option<UserRoleToken> {
        tracing::trace!("extracting user roles token from response cookies");
        extract_claims(self.cookies(), public_key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::SubsecRound;

    #[test]
    fn jwt_configured_properly() {
        let mut now = Utc::now();
        now = now.round_subsecs(0);

        let user = Uuid::new_v4();

        let urt = UserRoleToken {
            iat: now,
            exp: now + Duration::weeks(1),
            user,
            role: Role::Admin,
        };

        let security = Security::fixture();

        let token = urt
            .encode_jwt(&security.jwt_keys.private)
            .expect("encoding should work for example");

        let decoded = decode_token(&token, &security.jwt_keys.public)
            .expect("unable to decode encoded token");

        assert_eq!(now, decoded.iat);
        assert_eq!(now + Duration::weeks(1), decoded.exp);
        assert_eq!(user, decoded.user);
        assert_eq!(decoded.role, Role::Admin);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let security = Security::fixture();
        let token = UserRoleToken::for_identity(Uuid::new_v4(), Role::Student)
            .encode_jwt(&security.jwt_keys.private)
            .expect("encoding should work");

        let mut tampered = token.clone();
        tampered.push('x');

        let problem = decode_token(tampered, &security.jwt_keys.public)
            .expect_err("tampered token must not decode");
        assert_eq!(problem.status, Status::Unauthorized);
    }
}
