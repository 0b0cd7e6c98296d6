use std::sync::Arc;

use anyhow::Result;

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    policy::AccessPolicy,
    repository::{DocumentRepository, ProgramRepository, UserRepository},
    services::{ApprovalWorkflow, DocumentStore, ProgramCatalog, UserDirectory},
    storage::ObjectStorage,
    summaries::SummaryPipeline,
};

/// Repository ports the services are wired against.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub programs: Arc<dyn ProgramRepository>,
    pub documents: Arc<dyn DocumentRepository>,
}

impl Repositories {
    /// One backend serving every port.
    pub fn shared<R>(repository: Arc<R>) -> Self
    where
        R: UserRepository + ProgramRepository + DocumentRepository + 'static,
    {
        Self {
            users: repository.clone(),
            programs: repository.clone(),
            documents: repository,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
    pub users: UserDirectory,
    pub programs: ProgramCatalog,
    pub documents: DocumentStore,
    pub approvals: ApprovalWorkflow,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        repositories: Repositories,
        storage: Arc<dyn ObjectStorage>,
        summaries: SummaryPipeline,
    ) -> Result<Self> {
        let jwt = JwtService::from_config(&config)?;
        let policy = AccessPolicy::new(config.public_document_access);

        let documents = DocumentStore::new(
            repositories.documents.clone(),
            repositories.programs.clone(),
            storage,
            summaries,
            policy,
        )
        .with_reclaim_replaced_files(config.reclaim_replaced_files);

        Ok(Self {
            jwt,
            users: UserDirectory::new(repositories.users, policy),
            programs: ProgramCatalog::new(repositories.programs, policy),
            approvals: ApprovalWorkflow::new(repositories.documents, policy),
            documents,
            config: Arc::new(config),
        })
    }
}
