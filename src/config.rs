use crate::error::ConfigurationError;
use crate::util;
use std::env;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|it| it.parse().ok())
        .unwrap_or(fallback)
}

fn default_mongodb_uri() -> String {
    env::var("MONGODB_URI").unwrap_or("mongodb://localhost:27017".to_string())
}

fn default_mongodb_db() -> String {
    env::var("MONGODB_DB_NAME").unwrap_or("classroom".to_string())
}

fn default_storage() -> StorageKind {
    match env::var("STORAGE").as_deref() {
        Ok("memory") => StorageKind::Memory,
        _ => StorageKind::MongoDb,
    }
}

#[cfg(debug_assertions)]
fn default_admin_emails() -> Vec<String> {
    env::var("ADMIN_EMAILS")
        .map(util::split_list)
        .unwrap_or(vec![String::from("admin@example.com")])
}
#[cfg(not(debug_assertions))]
fn default_admin_emails() -> Vec<String> {
    env::var("ADMIN_EMAILS")
        .map(util::split_list)
        .unwrap_or_default()
}

fn default_class_duration() -> u32 {
    env_or("DEFAULT_CLASS_DURATION", 30)
}

fn default_notification_limit() -> u32 {
    env_or("NOTIFICATION_LIMIT", 50)
}

/// bcrypt accepts cost factors up to 31.
const PASSWORD_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

fn default_password_cost() -> u32 {
    checked_password_cost(env_or("PASSWORD_COST", 12))
}

fn checked_password_cost(cost: u32) -> u32 {
    let clamped = cost.clamp(*PASSWORD_COST_RANGE.start(), *PASSWORD_COST_RANGE.end());
    if clamped != cost {
        tracing::warn!("password cost {} is out of range, using {}", cost, clamped);
    }
    clamped
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    MongoDb,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    #[serde(default = "default_storage")]
    pub storage: StorageKind,
    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,

    /// Accounts with these emails are always stored as approved admins.
    #[serde(default = "default_admin_emails")]
    pub admin_emails: Vec<String>,

    /// Class length in minutes used when a request omits it.
    #[serde(default = "default_class_duration")]
    pub default_class_duration: u32,
    #[serde(default = "default_notification_limit")]
    pub notification_limit: u32,
    /// bcrypt cost factor.
    #[serde(default = "default_password_cost")]
    pub password_cost: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join("settings.yml"),
            storage: default_storage(),
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            admin_emails: default_admin_emails(),
            default_class_duration: default_class_duration(),
            notification_limit: default_notification_limit(),
            password_cost: default_password_cost(),
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or("./config".to_string()))
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        let config_file = util::find_first_subpath(
            config_dir(),
            &["settings.yml", "settings.yaml"],
            Path::exists,
        )
        .ok_or_else(|| ConfigurationError::NotFound(config_dir()))?;

        let file = File::open(&config_file)?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.file_path = config_file;
        config.password_cost = checked_password_cost(config.password_cost);

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.file_path)?;
        let mut out = BufWriter::new(file);
        serde_yaml::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }
}
