//! Process-local repository used by the test suites. Mirrors the relational
//! rules of the migrations: unique emails and program codes, restricted
//! program deletes, cascading document deletes, nulling user references.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    ApprovalFlow, ApprovalState, Document, DocumentChanges, DocumentEntry, DocumentSummary,
    NewApprovalFlow, NewDocument, NewUser, Program, ProgramInput, ReviewItem, User, UserChanges,
};

use super::{
    DocumentRepository, ProgramRepository, RepositoryError, RepositoryResult, UserRepository,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    programs: HashMap<Uuid, Program>,
    documents: HashMap<Uuid, Document>,
    /// Insertion order doubles as creation order.
    flows: Vec<ApprovalFlow>,
    summaries: HashMap<Uuid, DocumentSummary>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|user| Some(user.id) != except && user.email.eq_ignore_ascii_case(email))
    }

    fn code_taken(&self, code: &str, except: Option<Uuid>) -> bool {
        self.programs
            .values()
            .any(|program| Some(program.id) != except && program.code.eq_ignore_ascii_case(code))
    }

    fn entry(&self, document: &Document) -> RepositoryResult<DocumentEntry> {
        let approval = self
            .flows
            .iter()
            .find(|flow| flow.document_id == document.id)
            .cloned()
            .ok_or_else(|| {
                RepositoryError::Unavailable(format!(
                    "document {} has no approval flow",
                    document.id
                ))
            })?;

        Ok(DocumentEntry {
            document: document.clone(),
            program_name: self
                .programs
                .get(&document.program_id)
                .map(|program| program.name.clone())
                .unwrap_or_default(),
            author_name: self.user_name(document.author_id),
            approval,
            summary: self
                .summaries
                .get(&document.id)
                .map(|summary| summary.content.clone()),
        })
    }

    fn user_name(&self, id: Option<Uuid>) -> Option<String> {
        id.and_then(|id| self.users.get(&id))
            .map(|user| user.name.clone())
    }
}

#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepositoryResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| RepositoryError::Unavailable("repository lock poisoned".into()))
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| RepositoryError::Unavailable("repository lock poisoned".into()))
    }
}

impl UserRepository for InMemoryRepository {
    fn insert_user(&self, user: NewUser) -> RepositoryResult<User> {
        let mut tables = self.write()?;
        if tables.email_taken(&user.email, None) {
            return Err(RepositoryError::Conflict("email already registered".into()));
        }

        let now = Utc::now().naive_utc();
        let user = User {
            id: user.id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            active: user.active,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn find_user(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let email = email.trim();
        Ok(self
            .read()?
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn list_users(&self) -> RepositoryResult<Vec<User>> {
        let mut users: Vec<User> = self.read()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.email.cmp(&b.email)));
        Ok(users)
    }

    fn update_user(&self, id: Uuid, changes: UserChanges) -> RepositoryResult<Option<User>> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&id) {
            return Ok(None);
        }
        if tables.email_taken(&changes.email, Some(id)) {
            return Err(RepositoryError::Conflict("email already registered".into()));
        }

        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        user.name = changes.name;
        user.email = changes.email;
        user.role = changes.role;
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        user.updated_at = Utc::now().naive_utc();
        Ok(Some(user.clone()))
    }

    fn set_user_active(&self, id: Uuid, active: bool) -> RepositoryResult<Option<User>> {
        let mut tables = self.write()?;
        Ok(tables.users.get_mut(&id).map(|user| {
            user.active = active;
            user.updated_at = Utc::now().naive_utc();
            user.clone()
        }))
    }

    fn delete_user(&self, id: Uuid) -> RepositoryResult<bool> {
        let mut tables = self.write()?;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }

        for document in tables.documents.values_mut() {
            if document.author_id == Some(id) {
                document.author_id = None;
            }
        }
        for flow in tables.flows.iter_mut() {
            if flow.reviewer_id == Some(id) {
                flow.reviewer_id = None;
            }
        }
        Ok(true)
    }
}

impl ProgramRepository for InMemoryRepository {
    fn list_programs(&self) -> RepositoryResult<Vec<Program>> {
        let mut programs: Vec<Program> = self.read()?.programs.values().cloned().collect();
        programs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.code.cmp(&b.code)));
        Ok(programs)
    }

    fn find_program(&self, id: Uuid) -> RepositoryResult<Option<Program>> {
        Ok(self.read()?.programs.get(&id).cloned())
    }

    fn insert_program(&self, id: Uuid, input: ProgramInput) -> RepositoryResult<Program> {
        let mut tables = self.write()?;
        if tables.code_taken(&input.code, None) {
            return Err(RepositoryError::Conflict("program code already in use".into()));
        }

        let now = Utc::now().naive_utc();
        let program = Program {
            id,
            name: input.name,
            code: input.code,
            description: input.description,
            created_at: now,
            updated_at: now,
        };
        tables.programs.insert(id, program.clone());
        Ok(program)
    }

    fn update_program(&self, id: Uuid, input: ProgramInput) -> RepositoryResult<Option<Program>> {
        let mut tables = self.write()?;
        if tables.code_taken(&input.code, Some(id)) {
            return Err(RepositoryError::Conflict("program code already in use".into()));
        }

        Ok(tables.programs.get_mut(&id).map(|program| {
            program.name = input.name;
            program.code = input.code;
            program.description = input.description;
            program.updated_at = Utc::now().naive_utc();
            program.clone()
        }))
    }

    fn delete_program(&self, id: Uuid) -> RepositoryResult<bool> {
        let mut tables = self.write()?;
        if tables
            .documents
            .values()
            .any(|document| document.program_id == id)
        {
            return Err(RepositoryError::Constraint(
                "program still owns documents or does not exist".into(),
            ));
        }
        Ok(tables.programs.remove(&id).is_some())
    }
}

impl DocumentRepository for InMemoryRepository {
    fn insert_document(
        &self,
        document: NewDocument,
        flow: NewApprovalFlow,
    ) -> RepositoryResult<DocumentEntry> {
        let mut tables = self.write()?;
        if !tables.programs.contains_key(&document.program_id) {
            return Err(RepositoryError::Constraint(
                "program still owns documents or does not exist".into(),
            ));
        }
        if let Some(author_id) = document.author_id {
            if !tables.users.contains_key(&author_id) {
                return Err(RepositoryError::Constraint("author does not exist".into()));
            }
        }
        if tables
            .documents
            .values()
            .any(|existing| existing.storage_name == document.file.storage_name)
        {
            return Err(RepositoryError::Conflict("record already exists".into()));
        }

        let now = Utc::now().naive_utc();
        let stored = Document {
            id: document.id,
            title: document.title,
            description: document.description,
            doc_type: document.doc_type,
            publication_date: document.publication_date,
            storage_name: document.file.storage_name,
            original_filename: document.file.original_filename,
            content_type: document.file.content_type,
            size_bytes: document.file.size_bytes,
            checksum: document.file.checksum,
            program_id: document.program_id,
            author_id: document.author_id,
            created_at: now,
            updated_at: now,
        };
        let flow = ApprovalFlow {
            id: flow.id,
            document_id: stored.id,
            state: flow.state,
            reviewer_id: flow.reviewer_id,
            comment: flow.comment,
            created_at: now,
            updated_at: now,
        };

        tables.documents.insert(stored.id, stored.clone());
        tables.flows.push(flow);
        tables.entry(&stored)
    }

    fn find_document(&self, id: Uuid) -> RepositoryResult<Option<DocumentEntry>> {
        let tables = self.read()?;
        tables
            .documents
            .get(&id)
            .map(|document| tables.entry(document))
            .transpose()
    }

    fn list_documents_by_state(&self, state: ApprovalState) -> RepositoryResult<Vec<DocumentEntry>> {
        let tables = self.read()?;
        let mut documents: Vec<&Document> = tables
            .flows
            .iter()
            .filter(|flow| flow.state == state)
            .filter_map(|flow| tables.documents.get(&flow.document_id))
            .collect();
        documents.sort_by(|a, b| {
            b.publication_date
                .cmp(&a.publication_date)
                .then_with(|| a.id.cmp(&b.id))
        });

        documents
            .into_iter()
            .map(|document| tables.entry(document))
            .collect()
    }

    fn update_document(
        &self,
        id: Uuid,
        changes: DocumentChanges,
    ) -> RepositoryResult<Option<DocumentEntry>> {
        let mut tables = self.write()?;
        if !tables.documents.contains_key(&id) {
            return Ok(None);
        }
        if !tables.programs.contains_key(&changes.program_id) {
            return Err(RepositoryError::Constraint(
                "program still owns documents or does not exist".into(),
            ));
        }

        let Some(document) = tables.documents.get_mut(&id) else {
            return Ok(None);
        };
        document.title = changes.title;
        document.description = changes.description;
        document.doc_type = changes.doc_type;
        document.publication_date = changes.publication_date;
        document.program_id = changes.program_id;
        if let Some(file) = changes.file {
            document.storage_name = file.storage_name;
            document.original_filename = file.original_filename;
            document.content_type = file.content_type;
            document.size_bytes = file.size_bytes;
            document.checksum = file.checksum;
        }
        document.updated_at = Utc::now().naive_utc();

        let document = document.clone();
        tables.entry(&document).map(Some)
    }

    fn delete_document(&self, id: Uuid) -> RepositoryResult<Option<Document>> {
        let mut tables = self.write()?;
        let removed = tables.documents.remove(&id);
        if removed.is_some() {
            tables.flows.retain(|flow| flow.document_id != id);
            tables.summaries.remove(&id);
        }
        Ok(removed)
    }

    fn all_storage_names(&self) -> RepositoryResult<Vec<String>> {
        Ok(self
            .read()?
            .documents
            .values()
            .map(|document| document.storage_name.clone())
            .collect())
    }

    fn find_flow(&self, id: Uuid) -> RepositoryResult<Option<ApprovalFlow>> {
        Ok(self.read()?.flows.iter().find(|flow| flow.id == id).cloned())
    }

    fn record_decision(
        &self,
        id: Uuid,
        state: ApprovalState,
        reviewer_id: Uuid,
        comment: Option<String>,
    ) -> RepositoryResult<Option<ApprovalFlow>> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&reviewer_id) {
            return Err(RepositoryError::Constraint("reviewer does not exist".into()));
        }

        Ok(tables.flows.iter_mut().find(|flow| flow.id == id).map(|flow| {
            flow.state = state;
            flow.reviewer_id = Some(reviewer_id);
            flow.comment = comment;
            flow.updated_at = Utc::now().naive_utc();
            flow.clone()
        }))
    }

    fn list_reviews(&self, state: ApprovalState) -> RepositoryResult<Vec<ReviewItem>> {
        let tables = self.read()?;
        let mut flows: Vec<&ApprovalFlow> =
            tables.flows.iter().filter(|flow| flow.state == state).collect();
        flows.sort_by_key(|flow| flow.created_at);

        Ok(flows
            .into_iter()
            .filter_map(|flow| {
                let document = tables.documents.get(&flow.document_id)?;
                Some(ReviewItem {
                    flow: flow.clone(),
                    document_title: document.title.clone(),
                    program_name: tables
                        .programs
                        .get(&document.program_id)
                        .map(|program| program.name.clone())
                        .unwrap_or_default(),
                    author_name: tables.user_name(document.author_id),
                })
            })
            .collect())
    }

    fn save_summary(
        &self,
        document_id: Uuid,
        content: String,
    ) -> RepositoryResult<DocumentSummary> {
        let mut tables = self.write()?;
        if !tables.documents.contains_key(&document_id) {
            return Err(RepositoryError::Constraint(
                "referenced record is missing or still in use".into(),
            ));
        }

        let now = Utc::now().naive_utc();
        let summary = tables
            .summaries
            .entry(document_id)
            .and_modify(|summary| {
                summary.content = content.clone();
                summary.updated_at = now;
            })
            .or_insert_with(|| DocumentSummary {
                document_id,
                content: content.clone(),
                created_at: now,
                updated_at: now,
            });
        Ok(summary.clone())
    }
}
