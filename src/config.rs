use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::infrastructure::mailer::DEFAULT_SENDER;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Memory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub public_base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureSettings {
    pub account: String,
    pub container: String,
    /// Falls back to the `AZURE_*` credentials `object_store` reads itself.
    pub access_key: Option<String>,
    pub public_base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobConfig {
    Local { upload_dir: PathBuf },
    S3(S3Settings),
    Azure(AzureSettings),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub starttls: bool,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreConfig,
    pub blob: BlobConfig,
    /// `None` means confirmations are logged rather than sent.
    pub smtp: Option<SmtpSettings>,
    pub store_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Empty values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL");
        let store = match get("ORDER_STORE").as_deref() {
            Some("memory") => StoreConfig::Memory,
            Some("postgres") => StoreConfig::Postgres {
                database_url: database_url.ok_or(ConfigError::Missing("DATABASE_URL"))?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "ORDER_STORE",
                    value: other.to_string(),
                })
            }
            None => match database_url {
                Some(database_url) => StoreConfig::Postgres { database_url },
                None => StoreConfig::Memory,
            },
        };

        let blob = match get("BLOB_BACKEND").as_deref() {
            None | Some("local") => BlobConfig::Local {
                upload_dir: PathBuf::from(get("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string())),
            },
            Some("s3") => {
                let bucket = get("S3_BUCKET").ok_or(ConfigError::Missing("S3_BUCKET"))?;
                let region = get("S3_REGION").unwrap_or_else(|| "us-east-1".to_string());
                let public_base_url = get("S3_PUBLIC_BASE_URL")
                    .unwrap_or_else(|| format!("https://{}.s3.{}.amazonaws.com", bucket, region));
                BlobConfig::S3(S3Settings {
                    bucket,
                    region,
                    endpoint: get("S3_ENDPOINT"),
                    access_key_id: get("S3_ACCESS_KEY_ID"),
                    secret_access_key: get("S3_SECRET_ACCESS_KEY"),
                    public_base_url,
                })
            }
            Some("azure") => {
                let account =
                    get("AZURE_STORAGE_ACCOUNT").ok_or(ConfigError::Missing("AZURE_STORAGE_ACCOUNT"))?;
                let container = get("AZURE_CONTAINER").ok_or(ConfigError::Missing("AZURE_CONTAINER"))?;
                let public_base_url = get("AZURE_PUBLIC_BASE_URL").unwrap_or_else(|| {
                    format!("https://{}.blob.core.windows.net/{}", account, container)
                });
                BlobConfig::Azure(AzureSettings {
                    account,
                    container,
                    access_key: get("AZURE_STORAGE_ACCESS_KEY"),
                    public_base_url,
                })
            }
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "BLOB_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let smtp = match get("SMTP_HOST") {
            Some(host) => Some(SmtpSettings {
                host,
                port: parse_or(&get, "SMTP_PORT", 587)?,
                username: get("SMTP_USERNAME"),
                password: get("SMTP_PASSWORD"),
                starttls: parse_or(&get, "SMTP_STARTTLS", true)?,
                from: get("MAIL_FROM").unwrap_or_else(|| DEFAULT_SENDER.to_string()),
            }),
            None => None,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "PORT", 3000)?,
            store,
            blob,
            smtp,
            store_timeout: Duration::from_secs(parse_or(&get, "STORE_TIMEOUT_SECS", 10)?),
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
