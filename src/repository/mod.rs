//! Persistence ports. The services only see these traits; `postgres` backs
//! them with diesel and `memory` keeps everything in process for tests.

use uuid::Uuid;

use crate::domain::{
    ApprovalFlow, ApprovalState, Document, DocumentChanges, DocumentEntry, DocumentSummary,
    NewApprovalFlow, NewDocument, NewUser, Program, ProgramInput, ReviewItem, User, UserChanges,
};

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod postgres;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A uniqueness rule would be violated.
    #[error("{0}")]
    Conflict(String),
    /// A referential rule would be violated.
    #[error("{0}")]
    Constraint(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

pub trait UserRepository: Send + Sync {
    fn insert_user(&self, user: NewUser) -> RepositoryResult<User>;
    fn find_user(&self, id: Uuid) -> RepositoryResult<Option<User>>;
    /// Case-insensitive lookup.
    fn find_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    fn list_users(&self) -> RepositoryResult<Vec<User>>;
    fn update_user(&self, id: Uuid, changes: UserChanges) -> RepositoryResult<Option<User>>;
    fn set_user_active(&self, id: Uuid, active: bool) -> RepositoryResult<Option<User>>;
    /// Returns false when no such user existed.
    fn delete_user(&self, id: Uuid) -> RepositoryResult<bool>;
}

pub trait ProgramRepository: Send + Sync {
    fn list_programs(&self) -> RepositoryResult<Vec<Program>>;
    fn find_program(&self, id: Uuid) -> RepositoryResult<Option<Program>>;
    fn insert_program(&self, id: Uuid, input: ProgramInput) -> RepositoryResult<Program>;
    fn update_program(&self, id: Uuid, input: ProgramInput) -> RepositoryResult<Option<Program>>;
    fn delete_program(&self, id: Uuid) -> RepositoryResult<bool>;
}

pub trait DocumentRepository: Send + Sync {
    /// Inserts the document and its approval flow as one unit of work.
    fn insert_document(
        &self,
        document: NewDocument,
        flow: NewApprovalFlow,
    ) -> RepositoryResult<DocumentEntry>;
    fn find_document(&self, id: Uuid) -> RepositoryResult<Option<DocumentEntry>>;
    fn list_documents_by_state(&self, state: ApprovalState) -> RepositoryResult<Vec<DocumentEntry>>;
    fn update_document(
        &self,
        id: Uuid,
        changes: DocumentChanges,
    ) -> RepositoryResult<Option<DocumentEntry>>;
    /// Removes the document together with its flow and summary and returns
    /// the removed record.
    fn delete_document(&self, id: Uuid) -> RepositoryResult<Option<Document>>;
    fn all_storage_names(&self) -> RepositoryResult<Vec<String>>;

    fn find_flow(&self, id: Uuid) -> RepositoryResult<Option<ApprovalFlow>>;
    fn record_decision(
        &self,
        id: Uuid,
        state: ApprovalState,
        reviewer_id: Uuid,
        comment: Option<String>,
    ) -> RepositoryResult<Option<ApprovalFlow>>;
    /// Flows in the given state, oldest first.
    fn list_reviews(&self, state: ApprovalState) -> RepositoryResult<Vec<ReviewItem>>;

    fn save_summary(&self, document_id: Uuid, content: String)
        -> RepositoryResult<DocumentSummary>;
}
