use std::io::Cursor;

use rocket::http::hyper::header::CONTENT_LANGUAGE;
use rocket::http::ContentType;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use utoipa::ToSchema;

use crate::error::{StoreError, WorkflowError};

/// Implements [RFC7807](https://tools.ietf.org/html/rfc7807).
///
/// Every response also carries a `message` member (the detail, or the title when there
/// is none) which clients display as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Problem {
    #[serde(skip)]
    pub status: Status,
    pub type_uri: String,
    pub title: String,

    pub detail: Option<String>,
    pub instance_uri: Option<String>,

    #[schema(value_type = Object)]
    pub body: Map<String, Value>,
}

impl Default for Problem {
    fn default() -> Self {
        Problem {
            status: Status::InternalServerError,
            type_uri: "about:blank".to_string(),
            title: "Problem".to_string(),
            detail: None,
            instance_uri: None,
            body: Map::new(),
        }
    }
}

impl Problem {
    pub fn new(status: Status, type_uri: impl ToString, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: type_uri.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn new_untyped(status: Status, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: "about:blank".to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn detail(&mut self, value: impl ToString) -> &mut Problem {
        self.detail = Some(value.to_string());
        self
    }

    pub fn instance_uri(&mut self, value: String) -> &mut Problem {
        self.instance_uri = Some(value);
        self
    }

    pub fn insert<V: Serialize>(&mut self, key: impl ToString, value: V) -> &mut Problem {
        self.body.insert(
            key.to_string(),
            serde_json::to_value(value).expect("data must be JSON serializable"),
        );
        self
    }

    pub fn insert_str(&mut self, key: impl ToString, value: impl ToString) -> &mut Problem {
        self.body
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    /// Human readable text shown to the user.
    pub fn message(&self) -> &str {
        self.detail.as_deref().unwrap_or(self.title.as_str())
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.title)
    }
}

impl std::error::Error for Problem {}

impl<'r> Responder<'r, 'static> for Problem {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let mut body = self.body.clone();
        body.insert(String::from("message"), Value::from(self.message()));

        // Following are required by rfc7807
        body.insert(String::from("type"), Value::from(self.type_uri));
        body.insert(String::from("title"), Value::from(self.title));

        // Optional parameters as specified by rfc7807
        if let Some(detail) = self.detail {
            body.insert(String::from("detail"), Value::from(detail));
        }
        body.insert(String::from("status"), Value::from(self.status.code));
        if let Some(instance) = self.instance_uri {
            body.insert(String::from("instance"), Value::from(instance));
        }

        let body_string = serde_json::to_string(&body)
            .expect("JSON map keys and values must be JSON serializable");

        Response::build()
            .status(self.status)
            .header(ContentType::new("application", "problem+json"))
            .raw_header(CONTENT_LANGUAGE.as_str(), "en")
            .sized_body(body_string.len(), Cursor::new(body_string))
            .ok()
    }
}

pub mod problems {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    #[inline]
    pub fn parse_problem() -> Problem {
        Problem::new_untyped(
            Status::BadRequest,
            "There was a problem parsing part of the request.",
        )
    }

    #[inline]
    pub fn missing_fields(fields: &[&str]) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Missing required fields.")
            .detail(format!("{} are required", fields.join(", ")))
            .insert("fields", fields)
            .clone()
    }
}

impl From<WorkflowError> for Problem {
    fn from(e: WorkflowError) -> Self {
        let (status, title) = match e {
            WorkflowError::Store(store) => return Problem::from(store),
            WorkflowError::Forbidden(_) => (Status::Forbidden, "Access denied."),
            WorkflowError::NotFound(_) => (Status::NotFound, "Resource doesn't exist."),
            WorkflowError::InvalidRole(_) => (Status::BadRequest, "User has the wrong role."),
            WorkflowError::Conflict(_) => (Status::Conflict, "Request conflicts with current state."),
            WorkflowError::Validation(_) => (Status::BadRequest, "Invalid request."),
        };

        Problem::new_untyped(status, title).detail(e).clone()
    }
}

impl From<StoreError> for Problem {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(e) => Problem::from(e),
            StoreError::Bson(_) => Problem::new_untyped(
                Status::InternalServerError,
                "An error occurred while processing BSON data.",
            ),
            StoreError::Duplicate(field) => {
                Problem::new_untyped(Status::Conflict, "Request conflicts with current state.")
                    .detail(format!("{} already in use", field))
                    .clone()
            }
        }
    }
}

impl From<mongodb::error::Error> for Problem {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        fn mongodb_problem() -> Problem {
            Problem::new_untyped(
                Status::InternalServerError,
                "MongoDB failed while processing request.",
            )
        }

        fn access_problem() -> Problem {
            Problem::new_untyped(
                Status::InternalServerError,
                "Server was unable to access MongoDB.",
            )
        }

        fn bad_db_request() -> Problem {
            Problem::new_untyped(
                Status::InternalServerError,
                "MongoDB was unable to process bad server request.",
            )
        }

        fn bson_problem() -> Problem {
            Problem::new_untyped(
                Status::InternalServerError,
                "There was a problem with handling MongoDB bson.",
            )
        }

        tracing::error!("mongodb error: {}", e);

        match e.kind.as_ref() {
            ErrorKind::InvalidArgument { .. } => bad_db_request(),
            ErrorKind::Authentication { .. } => access_problem(),
            ErrorKind::BsonDeserialization(_) => bson_problem(),
            ErrorKind::BsonSerialization(_) => bson_problem(),
            ErrorKind::BulkWrite(_) => bad_db_request(),
            ErrorKind::Command(_) => bad_db_request(),
            ErrorKind::DnsResolve { .. } => access_problem(),
            ErrorKind::Internal { .. } => mongodb_problem(),
            ErrorKind::Io(_) => mongodb_problem()
                .detail("An IO error occurred. Submitted data might not be properly stored.")
                .clone(),
            ErrorKind::ConnectionPoolCleared { .. } => mongodb_problem(),
            ErrorKind::InvalidResponse { .. } => mongodb_problem(),
            ErrorKind::ServerSelection { .. } => access_problem(),
            ErrorKind::SessionsNotSupported => mongodb_problem(),
            ErrorKind::InvalidTlsConfig { .. } => access_problem(),
            ErrorKind::Write(_) => mongodb_problem()
                .detail("A write error occurred. Submitted data might not be properly stored.")
                .clone(),
            ErrorKind::Transaction { .. } => mongodb_problem(),
            ErrorKind::IncompatibleServer { .. } => access_problem(),
            _ => mongodb_problem(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Problem {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.into_kind() {
            ErrorKind::ExpiredSignature => {
                Problem::new_untyped(Status::Unauthorized, "Expired JWT signature.")
            }
            _ => Problem::new_untyped(Status::Unauthorized, "Error while handling JWT."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_errors_map_to_statuses() {
        let cases = [
            (WorkflowError::forbidden("no"), Status::Forbidden),
            (WorkflowError::not_found("gone"), Status::NotFound),
            (WorkflowError::invalid_role("wrong"), Status::BadRequest),
            (WorkflowError::conflict("Class is full"), Status::Conflict),
            (WorkflowError::validation("bad date"), Status::BadRequest),
            (WorkflowError::Unauthorized("who".into()), Status::Unauthorized),
        ];

        for (error, status) in cases {
            let problem = Problem::from(error);
            assert_eq!(problem.status, status);
        }
    }

    #[test]
    fn message_prefers_detail() {
        let problem = Problem::from(WorkflowError::conflict("Class already cancelled"));
        assert_eq!(problem.message(), "Class already cancelled");

        let bare = Problem::new_untyped(Status::NotFound, "Not found.");
        assert_eq!(bare.message(), "Not found.");
    }

    #[test]
    fn duplicate_store_error_is_conflict() {
        let problem = Problem::from(StoreError::Duplicate("email"));
        assert_eq!(problem.status, Status::Conflict);
        assert_eq!(problem.message(), "email already in use");
    }
}
