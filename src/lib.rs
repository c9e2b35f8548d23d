extern crate tracing_futures;

#[macro_use]
extern crate rocket;
#[macro_use]
extern crate serde;

use std::sync::Arc;

use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::{Config, StorageKind};
use crate::data::memory::MemoryBackend;
use crate::data::mongo::MongoBackend;
use crate::data::user::AdminAllowList;
use crate::data::Db;
use crate::error::{BackendError, ConfigurationError};
use crate::route::mount_api;
use crate::security::Security;

pub mod config;
pub mod data;
pub mod error;
pub mod middleware;
pub mod resp;
pub mod role;
pub mod route;
pub mod security;
pub mod util;
pub mod workflow;

fn load_config() -> Result<Config, BackendError> {
    tracing::info!("Loading configuration...");
    match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            Ok(c)
        }
        Err(ConfigurationError::NotFound(dir)) => {
            tracing::info!("No configuration in '{}', using defaults.", dir.display());
            let c = Config::default();
            if let Err(e) = c.save() {
                tracing::warn!("Unable to save generated configuration: {}", e);
            }
            Ok(c)
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            Err(other.into())
        }
    }
}

/// Sets up logging, reads configuration and connects storage.
pub async fn create(log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(l) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
        if let Err(err) = tracing_log::LogTracer::init() {
            eprintln!("Unable to forward log records: {}", err);
        }
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    let config = load_config()?;

    tracing::info!("Initializing security information...");
    let security = Security::load();

    let db: Db = match config.storage {
        StorageKind::MongoDb => Arc::new(MongoBackend::connect(&config).await?),
        StorageKind::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on shutdown.");
            Arc::new(MemoryBackend::new(AdminAllowList::new(&config.admin_emails)))
        }
    };

    build(config, security, db)
}

/// Assembles the HTTP server around already loaded state.
pub fn build(config: Config, security: Security, db: Db) -> Result<Rocket<Build>, BackendError> {
    tracing::info!("Starting HTTP server...");
    let mut r = rocket::build().manage(config).manage(security).manage(db);

    tracing::info!("Setting up CORS...");
    let cors = rocket_cors::CorsOptions {
        allowed_origins: AllowedOrigins::All,
        allowed_methods: vec![
            Method::Get,
            Method::Put,
            Method::Post,
            Method::Patch,
            Method::Delete,
        ]
        .into_iter()
        .map(From::from)
        .collect(),
        allowed_headers: AllowedHeaders::All,
        allow_credentials: true,
        ..Default::default()
    }
    .to_cors()?;

    r = r.attach(cors);
    r = mount_api(r);

    Ok(r)
}
