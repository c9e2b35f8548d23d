use chrono::{DateTime, Utc};
use crypto::bcrypt::bcrypt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::serde_helpers::{
    chrono_datetime_as_bson_datetime, uuid_1_as_binary, uuid_option_as_binary,
    uuid_vec_as_binary,
};
use crate::role::Role;
use crate::security::Salt;

pub mod db;

pub static USER_COLLECTION_NAME: &str = "users";

#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PasswordHash([u8; 24]);

impl PasswordHash {
    pub fn new(password: impl AsRef<str>, salt: &Salt, cost: u32) -> PasswordHash {
        let mut pw_hash: [u8; 24] = [0; 24];

        let mut sha = Sha256::new();
        sha2::Digest::update(&mut sha, password.as_ref().as_bytes());

        bcrypt(cost, salt, sha.finalize().as_slice(), &mut pw_hash);

        PasswordHash(pw_hash)
    }

    pub fn verify(&self, password: impl AsRef<str>, salt: &Salt, cost: u32) -> bool {
        *self == PasswordHash::new(password, salt, cost)
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PasswordHash(..)")
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Approved,
    Blocked,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Approved => "approved",
            AccountStatus::Blocked => "blocked",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", with = "uuid_1_as_binary")]
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub pw_hash: PasswordHash,
    pub role: Role,
    pub account_status: AccountStatus,
    #[serde(default)]
    pub resource_access: bool,

    #[serde(default, with = "uuid_option_as_binary")]
    pub assigned_teacher: Option<Uuid>,
    #[serde(default, with = "uuid_vec_as_binary")]
    pub assigned_students: Vec<Uuid>,

    #[serde(default)]
    pub total_classes_taken: u32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl AsRef<str>, name: impl ToString, pw_hash: PasswordHash, role: Role) -> User {
        let id = Uuid::new_v4();
        tracing::info!("Creating a new user with UUID: {}", id);

        User {
            id,
            email: email.as_ref().trim().to_lowercase(),
            name: name.to_string(),
            pw_hash,
            role,
            account_status: AccountStatus::Pending,
            resource_access: false,
            assigned_teacher: None,
            assigned_students: vec![],
            total_classes_taken: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.account_status == AccountStatus::Blocked
    }
}

/// Emails whose accounts are always persisted as approved admins with resource access.
///
/// Applied by every storage backend on every user write, so no request path can store
/// an allow-listed account with a lesser role.
#[derive(Debug, Clone, Default)]
pub struct AdminAllowList(Vec<String>);

impl AdminAllowList {
    pub fn new<S: AsRef<str>>(emails: impl IntoIterator<Item = S>) -> AdminAllowList {
        AdminAllowList(
            emails
                .into_iter()
                .map(|it| it.as_ref().trim().to_lowercase())
                .filter(|it| !it.is_empty())
                .collect(),
        )
    }

    pub fn emails(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, email: impl AsRef<str>) -> bool {
        let email = email.as_ref().trim().to_lowercase();
        self.0.iter().any(|it| *it == email)
    }

    pub fn enforce(&self, user: &mut User) {
        if self.contains(&user.email) {
            if user.role != Role::Admin {
                tracing::info!("promoting allow-listed account {} to admin", user.email);
            }
            user.role = Role::Admin;
            user.account_status = AccountStatus::Approved;
            user.resource_access = true;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub account_status: AccountStatus,
    pub resource_access: bool,
    pub assigned_teacher: Option<Uuid>,
    pub assigned_students: Vec<Uuid>,
    pub total_classes_taken: u32,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            account_status: user.account_status,
            resource_access: user.resource_access,
            assigned_teacher: user.assigned_teacher,
            assigned_students: user.assigned_students,
            total_classes_taken: user.total_classes_taken,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const TEST_SALT: Salt = [7u8; 16];
    pub const TEST_COST: u32 = 4;

    pub fn user(email: &str, role: Role) -> User {
        User::new(
            email,
            email.split('@').next().unwrap_or(email),
            PasswordHash::new("correct horse battery", &TEST_SALT, TEST_COST),
            role,
        )
    }

    #[test]
    fn password_hash_verifies_only_same_password() {
        let hash = PasswordHash::new("s3cret-pass", &TEST_SALT, TEST_COST);
        assert!(hash.verify("s3cret-pass", &TEST_SALT, TEST_COST));
        assert!(!hash.verify("s3cret-pasS", &TEST_SALT, TEST_COST));
    }

    #[test]
    fn allow_list_promotes_regardless_of_requested_role() {
        let admins = AdminAllowList::new(["Head@School.org"]);
        let mut requested_student = user("head@school.org", Role::Student);

        admins.enforce(&mut requested_student);

        assert_eq!(requested_student.role, Role::Admin);
        assert_eq!(requested_student.account_status, AccountStatus::Approved);
        assert!(requested_student.resource_access);
    }

    #[test]
    fn allow_list_leaves_others_alone() {
        let admins = AdminAllowList::new(["head@school.org"]);
        let mut teacher = user("someone@school.org", Role::Teacher);

        admins.enforce(&mut teacher);

        assert_eq!(teacher.role, Role::Teacher);
        assert_eq!(teacher.account_status, AccountStatus::Pending);
        assert!(!teacher.resource_access);
    }

    #[test]
    fn emails_are_normalized() {
        let u = user("  Student@Example.COM ", Role::Student);
        assert_eq!(u.email, "student@example.com");
    }
}
