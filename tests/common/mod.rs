use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::PgConnection;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use ppg_docs::config::{AppConfig, StorageBackend, DEFAULT_MAX_UPLOAD_BYTES};
use ppg_docs::db::{self, PgPool};
use ppg_docs::domain::{ProgramInput, Role};
use ppg_docs::repository::memory::InMemoryRepository;
use ppg_docs::repository::postgres::PgRepository;
use ppg_docs::repository::{DocumentRepository, ProgramRepository};
use ppg_docs::routes;
use ppg_docs::services::users::Registration;
use ppg_docs::state::{AppState, Repositories};
use ppg_docs::storage::LocalStorage;
use ppg_docs::summaries::{Summarizer, SummaryPipeline, TextExtractor};
use serde::Serialize;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "s3cret-pass";

#[allow(dead_code)]
static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Echoes the filename so tests can tell the extractor ran.
pub struct FakeExtractor;

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(
        &self,
        filename: &str,
        _content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<String> {
        Ok(format!("{filename}: {}", String::from_utf8_lossy(&bytes)))
    }
}

pub struct FakeSummarizer;

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, text: &str, program_name: &str) -> Result<String> {
        Ok(format!("[{program_name}] {text}"))
    }
}

#[derive(Clone, Copy)]
pub struct TestOptions {
    pub public_document_access: bool,
    pub reclaim_replaced_files: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            public_document_access: true,
            reclaim_replaced_files: false,
        }
    }
}

pub struct FilePart<'a> {
    pub filename: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    repositories: Repositories,
    pool: Option<PgPool>,
    uploads: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_options(TestOptions::default()).await
    }

    pub async fn with_options(options: TestOptions) -> Result<Self> {
        let repositories = Repositories::shared(Arc::new(InMemoryRepository::new()));
        Self::build(options, repositories, None, "postgres://unused").await
    }

    /// Same wiring over a real database. `Ok(None)` when `TEST_DATABASE_URL`
    /// is unset so the caller can skip. Hold [`acquire_db_lock`] while the
    /// app is alive; every instance starts from empty tables.
    #[allow(dead_code)]
    pub async fn postgres() -> Result<Option<Self>> {
        let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping database test");
            return Ok(None);
        };

        let pool = db::init_pool_with_size(&database_url, db::DEFAULT_MAX_POOL_SIZE)?;
        prepare_database(&pool).await?;

        let repositories = Repositories::shared(Arc::new(PgRepository::new(pool.clone())));
        let app = Self::build(TestOptions::default(), repositories, Some(pool), &database_url).await?;
        Ok(Some(app))
    }

    async fn build(
        options: TestOptions,
        repositories: Repositories,
        pool: Option<PgPool>,
        database_url: &str,
    ) -> Result<Self> {
        let uploads = tempfile::tempdir().context("failed to create upload dir")?;

        let config = AppConfig {
            database_url: database_url.to_string(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            cors_allowed_origin: None,
            storage_backend: StorageBackend::Local,
            upload_dir: uploads.path().to_path_buf(),
            s3: None,
            public_document_access: options.public_document_access,
            reclaim_replaced_files: options.reclaim_replaced_files,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            extraction_service_url: None,
            summary_api_url: None,
            summary_api_key: None,
            summary_model: "test-model".to_string(),
        };

        let storage = Arc::new(LocalStorage::new(uploads.path()).await?);
        let summaries = SummaryPipeline::new(Arc::new(FakeExtractor), Arc::new(FakeSummarizer));
        let state = AppState::new(config, repositories.clone(), storage, summaries)?;
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            repositories,
            pool,
            uploads,
        })
    }

    #[allow(dead_code)]
    pub fn repositories(&self) -> &Repositories {
        &self.repositories
    }

    /// Runs `f` on a pooled connection of the database-backed app.
    #[allow(dead_code)]
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self
            .pool
            .clone()
            .context("app is not backed by a database")?;
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }

    pub fn seed_user(&self, email: &str, role: Role, active: bool) -> Result<Uuid> {
        let user = self.state.users.register(
            Registration {
                name: format!("{role} user"),
                email: email.to_string(),
                password: PASSWORD.to_string(),
                role,
            },
            active,
        )?;
        Ok(user.id)
    }

    pub fn seed_program(&self, name: &str, code: &str) -> Result<Uuid> {
        let program = self.repositories.programs.insert_program(
            Uuid::new_v4(),
            ProgramInput {
                name: name.to_string(),
                code: code.to_string(),
                description: None,
            },
        )?;
        Ok(program.id)
    }

    /// Seeds an active account and returns its bearer token.
    pub async fn token_for(&self, email: &str, role: Role) -> Result<String> {
        self.seed_user(email, role, true)?;
        self.login_token(email, PASSWORD).await
    }

    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            email: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json("/api/auth/login", &LoginPayload { email, password }, None)
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = json_body(response).await?;
        body["access_token"]
            .as_str()
            .map(str::to_string)
            .context("login response without access_token")
    }

    /// Where the local backend keeps the file of `document_id`.
    pub fn stored_file_path(&self, document_id: Uuid) -> Result<PathBuf> {
        let entry = self
            .repositories
            .documents
            .find_document(document_id)?
            .context("document not found")?;
        Ok(self.uploads.path().join(entry.document.storage_name))
    }

    pub fn stored_file_count(&self) -> Result<usize> {
        Ok(std::fs::read_dir(self.uploads.path())?.count())
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn patch(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send_empty(Method::PATCH, path, token).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send_empty(Method::GET, path, token).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send_empty(Method::DELETE, path, token).await
    }

    /// Uploads a document with the usual form fields filled in.
    #[allow(dead_code)]
    pub async fn upload_document(
        &self,
        token: &str,
        title: &str,
        program_id: Uuid,
        filename: &str,
        data: &[u8],
    ) -> Result<hyper::Response<Body>> {
        let fields = document_fields(title, program_id);
        self.send_document_form(
            Method::POST,
            "/api/documents",
            &fields,
            Some(FilePart {
                filename,
                content_type: "application/pdf",
                data,
            }),
            Some(token),
        )
        .await
    }

    pub async fn send_document_form(
        &self,
        method: Method,
        path: &str,
        fields: &[(&str, String)],
        file: Option<FilePart<'_>>,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();

        for (name, value) in fields {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            body.extend(value.as_bytes());
            body.extend(b"\r\n");
        }

        if let Some(file) = file {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!(
                    "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                    file.filename
                )
                .as_bytes(),
            );
            body.extend(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
            body.extend(file.data);
            body.extend(b"\r\n");
        }

        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let mut builder = Request::builder().method(method).uri(path).header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        );
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }

        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn send_empty(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

#[allow(dead_code)]
pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

#[allow(dead_code)]
async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        db::run_migrations(&pool)?;
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.batch_execute(
            "TRUNCATE TABLE document_summaries, approval_flows, documents, programs, users CASCADE;",
        )
        .context("failed to truncate tables")?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

pub fn document_fields(title: &str, program_id: Uuid) -> Vec<(&'static str, String)> {
    vec![
        ("title", title.to_string()),
        ("description", "Chamada para ingresso".to_string()),
        ("type", "EDITAIS".to_string()),
        ("publication_date", "2024-03-01".to_string()),
        ("program_id", program_id.to_string()),
    ]
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body.collect().await?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn json_body(response: hyper::Response<Body>) -> Result<Value> {
    let bytes = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&bytes).context("response body is not JSON")
}
