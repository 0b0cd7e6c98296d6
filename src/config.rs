use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Clone, Debug)]
pub struct S3Settings {
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
    pub bucket: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_expiry_minutes: i64,
    pub cors_allowed_origin: Option<String>,
    pub storage_backend: StorageBackend,
    pub upload_dir: PathBuf,
    pub s3: Option<S3Settings>,
    pub public_document_access: bool,
    pub reclaim_replaced_files: bool,
    pub max_upload_bytes: usize,
    pub extraction_service_url: Option<String>,
    pub summary_api_url: Option<String>,
    pub summary_api_key: Option<String>,
    pub summary_model: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_pool_size = env::var("DATABASE_MAX_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "ppg-docs".to_string());
        let jwt_audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "ppg-docs-clients".to_string());
        let jwt_expiry_minutes = env::var("JWT_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .context("JWT_EXPIRY_MINUTES must be an integer")?;
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();

        let storage_backend = parse_storage_backend(
            &env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".to_string()),
        )?;
        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));
        let s3 = match env::var("S3_BUCKET").ok() {
            Some(bucket) => Some(S3Settings {
                endpoint_url: env::var("AWS_ENDPOINT_URL").ok(),
                access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
                secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
                region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                bucket,
            }),
            None if storage_backend == StorageBackend::S3 => {
                bail!("S3_BUCKET must be set when STORAGE_BACKEND=s3")
            }
            None => None,
        };

        let public_document_access = env_flag("PUBLIC_DOCUMENT_ACCESS");
        let reclaim_replaced_files = env_flag("RECLAIM_REPLACED_FILES");
        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .map(|value| value.parse())
            .transpose()
            .context("MAX_UPLOAD_BYTES must be a byte count")?
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let extraction_service_url = non_empty_var("EXTRACTION_SERVICE_URL");
        let summary_api_url = non_empty_var("SUMMARY_API_URL");
        let summary_api_key = non_empty_var("SUMMARY_API_KEY");
        let summary_model = env::var("SUMMARY_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        Ok(Self {
            database_url,
            database_max_pool_size,
            server_host,
            server_port,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            jwt_expiry_minutes,
            cors_allowed_origin,
            storage_backend,
            upload_dir,
            s3,
            public_document_access,
            reclaim_replaced_files,
            max_upload_bytes,
            extraction_service_url,
            summary_api_url,
            summary_api_key,
            summary_model,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_storage_backend(raw: &str) -> Result<StorageBackend> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "local" | "" => Ok(StorageBackend::Local),
        "s3" => Ok(StorageBackend::S3),
        other => bail!("STORAGE_BACKEND must be 'local' or 's3', got '{other}'"),
    }
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            let _ = parsed.set_password(Some("*****"));
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
