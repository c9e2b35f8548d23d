use std::sync::Arc;

pub mod activity;
pub mod class;
pub mod memory;
pub mod mongo;
pub mod notification;
pub mod resource;
pub mod schedule;
pub mod serde_helpers;
pub mod user;

use activity::db::ActivityDb;
use class::db::ClassDb;
use notification::db::NotificationDb;
use resource::db::ResourceRequestDb;
use schedule::db::ScheduleDb;
use user::db::UserDb;

/// Every collection the application reads or writes.
///
/// Implemented by [`mongo::MongoBackend`] for deployments and by
/// [`memory::MemoryBackend`] for tests and throwaway instances.
pub trait Backend:
    UserDb + ScheduleDb + ClassDb + NotificationDb + ActivityDb + ResourceRequestDb + Send + Sync
{
}

impl<T> Backend for T where
    T: UserDb
        + ScheduleDb
        + ClassDb
        + NotificationDb
        + ActivityDb
        + ResourceRequestDb
        + Send
        + Sync
{
}

/// Shared handle managed by rocket.
pub type Db = Arc<dyn Backend>;

pub mod filter {
    use bson::spec::BinarySubtype;
    use bson::{doc, Binary, Bson, Document};
    use uuid::Uuid;

    #[inline]
    pub fn uuid(id: Uuid) -> Bson {
        Bson::Binary(Binary {
            subtype: BinarySubtype::Uuid,
            bytes: id.as_bytes().to_vec(),
        })
    }

    #[inline]
    pub fn by_id(id: Uuid) -> Document {
        doc! { "_id": uuid(id) }
    }

    #[inline]
    pub fn by_owner(user: Uuid) -> Document {
        doc! { "user_id": uuid(user) }
    }

    #[inline]
    pub fn by_email(email: impl AsRef<str>) -> Document {
        doc! { "email": email.as_ref().to_lowercase() }
    }

    /// Newest first. Documents written in the same millisecond fall back to `_id`, so
    /// repeated reads return one order.
    #[inline]
    pub fn newest_first() -> Document {
        doc! { "created_at": -1, "_id": -1 }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn newest_first_breaks_ties_on_id() {
            let order = newest_first();
            let keys: Vec<&str> = order.keys().map(String::as_str).collect();
            assert_eq!(keys, ["created_at", "_id"]);
            assert!(newest_first().values().all(|it| *it == Bson::Int32(-1)));
        }
    }
}
