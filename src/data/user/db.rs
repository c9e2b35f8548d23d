use bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Collection;
use rocket::futures::TryStreamExt;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::filter;
use crate::data::mongo::{duplicate_or, MongoBackend};
use crate::error::StoreError;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::security::Salt;

use super::{AccountStatus, PasswordHash, User, USER_COLLECTION_NAME};

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    #[inline]
    pub fn bad_email(email: impl ToString, detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad email.")
            .insert_str("email", email)
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn bad_name(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad name.")
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn bad_password(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad password.")
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn email_taken(email: impl ToString) -> Problem {
        Problem::new_untyped(Status::Conflict, "Bad email.")
            .insert_str("email", email)
            .detail("Email already registered.")
            .to_owned()
    }

    #[inline]
    pub fn bad_login() -> Problem {
        Problem::new_untyped(Status::Unauthorized, "Bad email or password.")
    }

    #[inline]
    pub fn blocked() -> Problem {
        Problem::new_untyped(Status::Forbidden, "Account blocked.")
            .detail("Your account has been blocked. Please contact an administrator.")
            .clone()
    }
}

#[derive(Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSignupData {
    #[schema(format = "email")]
    pub email: Option<String>,
    pub name: Option<String>,
    #[schema(format = "password")]
    pub password: Option<String>,
    /// `student` or `teacher`; admin accounts come only from the configured allow-list.
    pub role: Option<Role>,
}

impl std::fmt::Debug for UserSignupData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserSignupData:{}", self.email.as_deref().unwrap_or(""))
    }
}

#[cfg(feature = "validation-regex")]
fn email_is_valid(email: &str) -> bool {
    use std::sync::OnceLock;

    static EMAIL: OnceLock<regex::Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| {
            regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
        })
        .is_match(email)
}

#[cfg(not(feature = "validation-regex"))]
fn email_is_valid(email: &str) -> bool {
    matches!(email.split_once('@'), Some((local, domain)) if !local.is_empty() && domain.contains('.'))
}

impl UserSignupData {
    pub fn validate(&self) -> Result<(), Problem> {
        let email = self.email.as_deref().unwrap_or("").trim();
        let name = self.name.as_deref().unwrap_or("").trim();
        let password = self.password.as_deref().unwrap_or("");

        if email.is_empty() || name.is_empty() || password.is_empty() {
            return Err(crate::resp::problem::problems::missing_fields(&[
                "name", "email", "password",
            ]));
        }

        if !email_is_valid(email) {
            return Err(problem::bad_email(email, "Not a valid e-mail address."));
        }

        if name.len() < 2 || name.len() > 64 {
            return Err(problem::bad_name(
                "Name must be between 2 and 64 characters (bytes) long.",
            ));
        }

        if password.len() < 8 {
            return Err(problem::bad_password(
                "Password must be at least 8 characters (bytes) long.",
            ));
        }

        if password.len() > 1024 {
            return Err(problem::bad_password(
                "Passwords longer than 1024 characters aren't supported.",
            ));
        }

        Ok(())
    }

    /// Builds the user to store. Requests for the admin role are downgraded here; the
    /// admin allow-list is applied by the storage backend.
    pub fn into_user(self, salt: &Salt, cost: u32) -> User {
        let role = match self.role.unwrap_or_default() {
            Role::Admin => Role::Student,
            other => other,
        };

        User::new(
            self.email.unwrap_or_default(),
            self.name.unwrap_or_default().trim(),
            PasswordHash::new(self.password.unwrap_or_default(), salt, cost),
            role,
        )
    }
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct UserLoginData {
    pub email: String,
    #[schema(format = "password")]
    pub password: String,
}

impl std::fmt::Debug for UserLoginData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserLoginData:{}", self.email)
    }
}

impl UserLoginData {
    pub fn validate(&self) -> Result<(), Problem> {
        if !self.email.contains('@') || self.password.len() < 8 || self.password.len() > 1024 {
            return Err(problem::bad_login());
        }

        Ok(())
    }
}

#[rocket::async_trait]
pub trait UserDb {
    /// Stores a new account. The admin allow-list is applied before writing.
    async fn insert_user(&self, user: User) -> Result<User, StoreError>;

    /// Sets only the account status and returns the stored account. Allow-listed
    /// accounts are left untouched.
    async fn set_account_status(
        &self,
        id: Uuid,
        status: AccountStatus,
    ) -> Result<Option<User>, StoreError>;
    /// Sets only the resource access flag; allow-listed accounts are left untouched.
    async fn set_resource_access(&self, id: Uuid, access: bool)
        -> Result<Option<User>, StoreError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, StoreError>;

    /// Points the student at `teacher`, returning the teacher it pointed at before.
    async fn set_assigned_teacher(
        &self,
        student: Uuid,
        teacher: Uuid,
    ) -> Result<Option<Uuid>, StoreError>;
    /// Adds `student` to the teacher's roster; already present is a no-op.
    async fn add_assigned_student(&self, teacher: Uuid, student: Uuid) -> Result<(), StoreError>;
    async fn remove_assigned_student(&self, teacher: Uuid, student: Uuid)
        -> Result<(), StoreError>;

    async fn increment_classes_taken(&self, student: Uuid) -> Result<(), StoreError>;
}

impl MongoBackend {
    fn users(&self) -> Collection<User> {
        self.database().collection(USER_COLLECTION_NAME)
    }

    async fn update_user(&self, id: Uuid, update: Document) -> Result<(), StoreError> {
        self.users()
            .update_one(filter::by_id(id), update, None)
            .await?;
        Ok(())
    }

    /// Applies `update` unless the account is allow-listed, then returns what is stored.
    async fn update_unlisted_user(
        &self,
        id: Uuid,
        update: Document,
    ) -> Result<Option<User>, StoreError> {
        let mut query = filter::by_id(id);
        query.insert("email", doc! { "$nin": self.admins().emails().to_vec() });
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        match self.users().find_one_and_update(query, update, options).await? {
            Some(user) => Ok(Some(user)),
            None => self.get_user(id).await,
        }
    }
}

#[rocket::async_trait]
impl UserDb for MongoBackend {
    async fn insert_user(&self, mut user: User) -> Result<User, StoreError> {
        self.admins().enforce(&mut user);

        self.users()
            .insert_one(&user, None)
            .await
            .map_err(duplicate_or("email"))?;

        Ok(user)
    }

    async fn set_account_status(
        &self,
        id: Uuid,
        status: AccountStatus,
    ) -> Result<Option<User>, StoreError> {
        let status = bson::to_bson(&status)?;
        self.update_unlisted_user(id, doc! { "$set": { "account_status": status } })
            .await
    }

    async fn set_resource_access(
        &self,
        id: Uuid,
        access: bool,
    ) -> Result<Option<User>, StoreError> {
        self.update_unlisted_user(id, doc! { "$set": { "resource_access": access } })
            .await
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users().find_one(filter::by_id(id), None).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users().find_one(filter::by_email(email), None).await?)
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, StoreError> {
        let query = match role {
            Some(role) => doc! { "role": role.to_string() },
            None => doc! {},
        };
        let options = FindOptions::builder()
            .sort(filter::newest_first())
            .build();

        let cursor = self.users().find(query, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_assigned_teacher(
        &self,
        student: Uuid,
        teacher: Uuid,
    ) -> Result<Option<Uuid>, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();

        let before = self
            .users()
            .find_one_and_update(
                filter::by_id(student),
                doc! { "$set": { "assigned_teacher": filter::uuid(teacher) } },
                options,
            )
            .await?;

        Ok(before.and_then(|it| it.assigned_teacher))
    }

    async fn add_assigned_student(&self, teacher: Uuid, student: Uuid) -> Result<(), StoreError> {
        self.update_user(
            teacher,
            doc! { "$addToSet": { "assigned_students": filter::uuid(student) } },
        )
        .await
    }

    async fn remove_assigned_student(
        &self,
        teacher: Uuid,
        student: Uuid,
    ) -> Result<(), StoreError> {
        self.update_user(
            teacher,
            doc! { "$pull": { "assigned_students": filter::uuid(student) } },
        )
        .await
    }

    async fn increment_classes_taken(&self, student: Uuid) -> Result<(), StoreError> {
        self.update_user(student, doc! { "$inc": { "total_classes_taken": 1 } })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::user::tests::{TEST_COST, TEST_SALT};

    fn signup(email: &str, name: &str, password: &str, role: Option<Role>) -> UserSignupData {
        UserSignupData {
            email: Some(email.to_string()),
            name: Some(name.to_string()),
            password: Some(password.to_string()),
            role,
        }
    }

    #[test]
    fn signup_requires_all_fields() {
        let mut data = signup("a@b.co", "Amina", "longenough", None);
        data.name = None;
        let problem = data.validate().expect_err("missing name must fail");
        assert_eq!(problem.status, rocket::http::Status::BadRequest);
    }

    #[test]
    fn signup_rejects_bad_email_and_short_password() {
        assert!(signup("not-an-email", "Amina", "longenough", None)
            .validate()
            .is_err());
        assert!(signup("a@b.co", "Amina", "short", None).validate().is_err());
        assert!(signup("a@b.co", "Amina", "longenough", None)
            .validate()
            .is_ok());
    }

    #[test]
    fn status_update_matches_stored_field() {
        let update = bson::to_bson(&AccountStatus::Blocked).expect("status serializes");
        let stored = bson::to_document(&crate::data::user::tests::user("a@b.co", Role::Student))
            .expect("user serializes");

        assert_eq!(update, bson::Bson::String("blocked".into()));
        assert_eq!(stored.get("account_status"), Some(&bson::Bson::String("pending".into())));
    }

    #[test]
    fn requested_admin_role_is_downgraded() {
        let user = signup("a@b.co", "Amina", "longenough", Some(Role::Admin))
            .into_user(&TEST_SALT, TEST_COST);
        assert_eq!(user.role, Role::Student);

        let teacher = signup("t@b.co", "Yusuf", "longenough", Some(Role::Teacher))
            .into_user(&TEST_SALT, TEST_COST);
        assert_eq!(teacher.role, Role::Teacher);
    }
}
