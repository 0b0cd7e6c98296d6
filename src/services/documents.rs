use std::sync::Arc;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    Actor, ApprovalState, DocumentChanges, DocumentEntry, DocumentSummary, DocumentType,
    NewDocument, StoredFile,
};
use crate::error::{DomainError, DomainResult};
use crate::policy::{AccessPolicy, Operation};
use crate::repository::{DocumentRepository, ProgramRepository, RepositoryError};
use crate::storage::{self, ObjectStorage};
use crate::summaries::SummaryPipeline;

use super::approvals::initial_flow;
use super::{ensure_max_chars, non_blank};

const MAX_TITLE_CHARS: usize = 255;
const MAX_CONTENT_TYPE_CHARS: usize = 100;

/// Caller-supplied metadata. Required fields are optional here so a missing
/// one surfaces as a validation error rather than a parse failure.
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    pub title: String,
    pub description: Option<String>,
    pub doc_type: Option<DocumentType>,
    pub publication_date: Option<NaiveDate>,
    pub program_id: Option<Uuid>,
}

struct ValidMetadata {
    title: String,
    description: Option<String>,
    doc_type: DocumentType,
    publication_date: NaiveDate,
    program_id: Uuid,
}

impl DocumentMetadata {
    fn validate(self) -> DomainResult<ValidMetadata> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(DomainError::validation("title must not be blank"));
        }
        ensure_max_chars("title", &title, MAX_TITLE_CHARS)?;
        let doc_type = self
            .doc_type
            .ok_or_else(|| DomainError::validation("type is required"))?;
        let publication_date = self
            .publication_date
            .ok_or_else(|| DomainError::validation("publication_date is required"))?;
        let program_id = self
            .program_id
            .ok_or_else(|| DomainError::validation("program_id is required"))?;

        Ok(ValidMetadata {
            title,
            description: non_blank(self.description),
            doc_type,
            publication_date,
            program_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Download {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct DocumentStore {
    documents: Arc<dyn DocumentRepository>,
    programs: Arc<dyn ProgramRepository>,
    storage: Arc<dyn ObjectStorage>,
    summaries: SummaryPipeline,
    policy: AccessPolicy,
    reclaim_replaced_files: bool,
}

impl DocumentStore {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        programs: Arc<dyn ProgramRepository>,
        storage: Arc<dyn ObjectStorage>,
        summaries: SummaryPipeline,
        policy: AccessPolicy,
    ) -> Self {
        Self {
            documents,
            programs,
            storage,
            summaries,
            policy,
            reclaim_replaced_files: false,
        }
    }

    /// Delete the previous file after a successful replacement instead of
    /// leaving it for `prune-orphans`.
    pub fn with_reclaim_replaced_files(mut self, reclaim: bool) -> Self {
        self.reclaim_replaced_files = reclaim;
        self
    }

    pub async fn upload(
        &self,
        actor: &Actor,
        metadata: DocumentMetadata,
        file: Option<FileUpload>,
    ) -> DomainResult<DocumentEntry> {
        self.policy.require(actor, Operation::UploadDocument)?;
        let metadata = metadata.validate()?;
        let file = file
            .filter(|file| !file.bytes.is_empty())
            .ok_or_else(|| DomainError::business_rule("a non-empty file is required"))?;
        self.ensure_program(metadata.program_id)?;

        let stored = self.store_file(file).await?;
        let storage_name = stored.storage_name.clone();
        let flow = initial_flow(actor);

        let result = self.documents.insert_document(
            NewDocument {
                id: Uuid::new_v4(),
                title: metadata.title,
                description: metadata.description,
                doc_type: metadata.doc_type,
                publication_date: metadata.publication_date,
                file: stored,
                program_id: metadata.program_id,
                author_id: Some(actor.user_id),
            },
            flow,
        );

        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                warn!(storage_name = %storage_name, error = %err, "metadata write failed; stored file is orphaned");
                return Err(err.into());
            }
        };

        info!(
            document_id = %entry.document.id,
            author = %actor.user_id,
            state = %entry.approval.state,
            "document uploaded"
        );
        Ok(entry)
    }

    /// Anonymous callers only ever see approved documents.
    pub fn get(&self, actor: Option<&Actor>, id: Uuid) -> DomainResult<DocumentEntry> {
        self.policy.authorize(actor, Operation::ReadDocument)?;
        let entry = self
            .documents
            .find_document(id)?
            .ok_or_else(|| DomainError::not_found("document not found"))?;

        if actor.is_none() && entry.approval.state != ApprovalState::Approved {
            return Err(DomainError::not_found("document not found"));
        }
        Ok(entry)
    }

    /// Approved documents, newest publication first.
    pub fn list_approved(&self, actor: Option<&Actor>) -> DomainResult<Vec<DocumentEntry>> {
        self.policy.authorize(actor, Operation::ReadDocument)?;
        Ok(self
            .documents
            .list_documents_by_state(ApprovalState::Approved)?)
    }

    pub async fn download(&self, actor: Option<&Actor>, id: Uuid) -> DomainResult<Download> {
        let entry = self.get(actor, id)?;
        let document = entry.document;

        let bytes = self
            .storage
            .get_object(&document.storage_name)
            .await?
            .ok_or_else(|| {
                warn!(document_id = %id, storage_name = %document.storage_name, "stored file is missing");
                DomainError::not_found("document file not found")
            })?;

        let content_type = document.content_type.unwrap_or_else(|| {
            mime_guess::from_path(&document.original_filename)
                .first_or_octet_stream()
                .to_string()
        });

        Ok(Download {
            filename: document.original_filename,
            content_type,
            bytes,
        })
    }

    /// Replaces metadata and, when non-empty bytes are given, the file.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        metadata: DocumentMetadata,
        file: Option<FileUpload>,
    ) -> DomainResult<DocumentEntry> {
        self.policy.require(actor, Operation::ModifyDocument)?;
        let existing = self
            .documents
            .find_document(id)?
            .ok_or_else(|| DomainError::not_found("document not found"))?;
        let metadata = metadata.validate()?;
        if existing.document.program_id != metadata.program_id {
            self.ensure_program(metadata.program_id)?;
        }

        let replacement = match file.filter(|file| !file.bytes.is_empty()) {
            Some(file) => Some(self.store_file(file).await?),
            None => None,
        };
        let new_storage_name = replacement.as_ref().map(|file| file.storage_name.clone());

        let result = self.documents.update_document(
            id,
            DocumentChanges {
                title: metadata.title,
                description: metadata.description,
                doc_type: metadata.doc_type,
                publication_date: metadata.publication_date,
                program_id: metadata.program_id,
                file: replacement,
            },
        );

        let entry = match result {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                if let Some(name) = &new_storage_name {
                    warn!(storage_name = %name, "document vanished during update; stored file is orphaned");
                }
                return Err(DomainError::not_found("document not found"));
            }
            Err(err) => {
                if let Some(name) = &new_storage_name {
                    warn!(storage_name = %name, error = %err, "metadata write failed; stored file is orphaned");
                }
                // Only the program reference can break here; it went away
                // after the lookup above.
                return Err(match err {
                    RepositoryError::Constraint(_) => DomainError::not_found("program not found"),
                    other => other.into(),
                });
            }
        };

        if new_storage_name.is_some() {
            let previous = existing.document.storage_name;
            if self.reclaim_replaced_files {
                self.remove_file_best_effort(id, &previous).await;
            } else {
                debug!(document_id = %id, storage_name = %previous, "replaced file left in storage");
            }
        }

        info!(document_id = %id, by = %actor.user_id, "document updated");
        Ok(entry)
    }

    /// Removes the record first; the file is reclaimed afterwards and a
    /// failure there is only logged.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> DomainResult<()> {
        self.policy.require(actor, Operation::ModifyDocument)?;
        let document = self
            .documents
            .delete_document(id)?
            .ok_or_else(|| DomainError::not_found("document not found"))?;

        self.remove_file_best_effort(id, &document.storage_name).await;
        info!(document_id = %id, by = %actor.user_id, "document deleted");
        Ok(())
    }

    pub async fn summarize(&self, actor: &Actor, id: Uuid) -> DomainResult<DocumentSummary> {
        self.policy.require(actor, Operation::ModifyDocument)?;
        let entry = self
            .documents
            .find_document(id)?
            .ok_or_else(|| DomainError::not_found("document not found"))?;
        let document = entry.document;

        let bytes = self
            .storage
            .get_object(&document.storage_name)
            .await?
            .ok_or_else(|| DomainError::not_found("document file not found"))?;

        let content = self
            .summaries
            .run(
                &document.original_filename,
                document.content_type.as_deref(),
                bytes,
                &entry.program_name,
            )
            .await;

        let summary = self.documents.save_summary(id, content)?;
        info!(document_id = %id, "summary stored");
        Ok(summary)
    }

    fn ensure_program(&self, program_id: Uuid) -> DomainResult<()> {
        match self.programs.find_program(program_id)? {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found("program not found")),
        }
    }

    async fn store_file(&self, file: FileUpload) -> DomainResult<StoredFile> {
        let original_filename = match storage::original_basename(&file.filename) {
            name if name.is_empty() => "document".to_string(),
            name => storage::truncate_filename(&name, storage::MAX_ORIGINAL_FILENAME_CHARS),
        };
        let storage_name = storage::storage_name_for(&original_filename);
        let content_type = non_blank(file.content_type)
            .filter(|value| value.chars().count() <= MAX_CONTENT_TYPE_CHARS)
            .or_else(|| {
                mime_guess::from_path(&original_filename)
                    .first()
                    .map(|mime| mime.to_string())
            });
        let size_bytes = file.bytes.len() as i64;
        let checksum = hex::encode(Sha256::digest(&file.bytes));

        self.storage
            .put_object(
                &storage_name,
                file.bytes,
                content_type.clone(),
                storage::attachment_content_disposition(&original_filename),
            )
            .await?;
        debug!(storage_name = %storage_name, size_bytes, "file stored");

        Ok(StoredFile {
            storage_name,
            original_filename,
            content_type,
            size_bytes,
            checksum,
        })
    }

    async fn remove_file_best_effort(&self, id: Uuid, storage_name: &str) {
        if let Err(err) = self.storage.delete_object(storage_name).await {
            warn!(document_id = %id, storage_name, error = %err, "failed to delete stored file");
        }
    }
}
