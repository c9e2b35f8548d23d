use bson::doc;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Database, IndexModel};

use crate::config::Config;
use crate::data::class::CLASS_COLLECTION_NAME;
use crate::data::resource::RESOURCE_REQUEST_COLLECTION_NAME;
use crate::data::user::{AdminAllowList, USER_COLLECTION_NAME};
use crate::error::{BackendError, StoreError};

const DUPLICATE_KEY: i32 = 11000;

/// MongoDB storage: one collection per aggregate.
#[derive(Debug, Clone)]
pub struct MongoBackend {
    db: Database,
    admins: AdminAllowList,
}

impl MongoBackend {
    pub fn new(db: Database, admins: AdminAllowList) -> MongoBackend {
        MongoBackend { db, admins }
    }

    pub async fn connect(c: &Config) -> Result<MongoBackend, BackendError> {
        tracing::info!("Connecting to MongoDB: {}", c.mongodb_uri);
        let client = Client::with_uri_str(c.mongodb_uri.as_str()).await?;

        tracing::info!("Using MongoDB database: {}", c.mongodb_db);
        let db = client.database(c.mongodb_db.as_str());

        if let Err(e) = db.list_collection_names(None).await {
            tracing::error!("Unable to connect to MongoDB.");
            return Err(e.into());
        }

        let backend = MongoBackend::new(db, AdminAllowList::new(&c.admin_emails));
        backend.ensure_indexes().await?;

        Ok(backend)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub(crate) fn admins(&self) -> &AdminAllowList {
        &self.admins
    }

    /// Creates the indexes uniqueness constraints rely on.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        tracing::info!("Ensuring MongoDB indexes...");

        let unique = || IndexOptions::builder().unique(true).build();

        self.db
            .collection::<bson::Document>(USER_COLLECTION_NAME)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;

        self.db
            .collection::<bson::Document>(CLASS_COLLECTION_NAME)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "room_id": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;

        // At most one pending request per user.
        self.db
            .collection::<bson::Document>(RESOURCE_REQUEST_COLLECTION_NAME)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .partial_filter_expression(doc! { "status": "pending" })
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        Ok(())
    }
}

pub(crate) fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(w)) => w.code == DUPLICATE_KEY,
        ErrorKind::Command(c) => c.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Maps unique index violations on `field` to [`StoreError::Duplicate`].
pub(crate) fn duplicate_or(field: &'static str) -> impl Fn(mongodb::error::Error) -> StoreError {
    move |e| {
        if is_duplicate_key(&e) {
            StoreError::Duplicate(field)
        } else {
            StoreError::Database(e)
        }
    }
}
