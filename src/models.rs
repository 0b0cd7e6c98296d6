use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain;
use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub active: bool,
}

/// `None` for the hash leaves the stored credential untouched.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserChangeset {
    pub name: String,
    pub email: String,
    pub role: String,
    pub password_hash: Option<String>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = programs)]
pub struct Program {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = programs)]
pub struct NewProgram {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = documents)]
#[diesel(belongs_to(Program, foreign_key = program_id))]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub doc_type: String,
    pub publication_date: NaiveDate,
    pub storage_name: String,
    pub original_filename: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub checksum: String,
    pub program_id: Uuid,
    pub author_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub doc_type: String,
    pub publication_date: NaiveDate,
    pub storage_name: String,
    pub original_filename: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub checksum: String,
    pub program_id: Uuid,
    pub author_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = approval_flows)]
#[diesel(belongs_to(Document))]
pub struct ApprovalFlow {
    pub id: Uuid,
    pub document_id: Uuid,
    pub state: String,
    pub reviewer_id: Option<Uuid>,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = approval_flows)]
pub struct NewApprovalFlow {
    pub id: Uuid,
    pub document_id: Uuid,
    pub state: String,
    pub reviewer_id: Option<Uuid>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = document_summaries)]
#[diesel(primary_key(document_id))]
#[diesel(belongs_to(Document))]
pub struct DocumentSummary {
    pub document_id: Uuid,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_summaries)]
pub struct NewDocumentSummary {
    pub document_id: Uuid,
    pub content: String,
}

/// Stored labels are written by this crate only, so an unknown value means
/// the row was edited by hand.
fn parse_label<T>(column: &str, value: &str) -> Result<T, String>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|err| format!("invalid {column} in database: {err}"))
}

impl TryFrom<User> for domain::User {
    type Error = String;

    fn try_from(row: User) -> Result<Self, Self::Error> {
        Ok(Self {
            role: parse_label("users.role", &row.role)?,
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<domain::NewUser> for NewUser {
    fn from(user: domain::NewUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role.as_str().to_string(),
            active: user.active,
        }
    }
}

impl UserChangeset {
    pub fn new(changes: domain::UserChanges, updated_at: NaiveDateTime) -> Self {
        Self {
            name: changes.name,
            email: changes.email,
            role: changes.role.as_str().to_string(),
            password_hash: changes.password_hash,
            updated_at,
        }
    }
}

impl From<Program> for domain::Program {
    fn from(row: Program) -> Self {
        Self {
            id: row.id,
            name: row.name,
            code: row.code,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl TryFrom<Document> for domain::Document {
    type Error = String;

    fn try_from(row: Document) -> Result<Self, Self::Error> {
        Ok(Self {
            doc_type: parse_label("documents.doc_type", &row.doc_type)?,
            id: row.id,
            title: row.title,
            description: row.description,
            publication_date: row.publication_date,
            storage_name: row.storage_name,
            original_filename: row.original_filename,
            content_type: row.content_type,
            size_bytes: row.size_bytes,
            checksum: row.checksum,
            program_id: row.program_id,
            author_id: row.author_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<domain::NewDocument> for NewDocument {
    fn from(document: domain::NewDocument) -> Self {
        Self {
            id: document.id,
            title: document.title,
            description: document.description,
            doc_type: document.doc_type.as_str().to_string(),
            publication_date: document.publication_date,
            storage_name: document.file.storage_name,
            original_filename: document.file.original_filename,
            content_type: document.file.content_type,
            size_bytes: document.file.size_bytes,
            checksum: document.file.checksum,
            program_id: document.program_id,
            author_id: document.author_id,
        }
    }
}

impl TryFrom<ApprovalFlow> for domain::ApprovalFlow {
    type Error = String;

    fn try_from(row: ApprovalFlow) -> Result<Self, Self::Error> {
        Ok(Self {
            state: parse_label("approval_flows.state", &row.state)?,
            id: row.id,
            document_id: row.document_id,
            reviewer_id: row.reviewer_id,
            comment: row.comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl NewApprovalFlow {
    pub fn for_document(document_id: Uuid, flow: domain::NewApprovalFlow) -> Self {
        Self {
            id: flow.id,
            document_id,
            state: flow.state.as_str().to_string(),
            reviewer_id: flow.reviewer_id,
            comment: flow.comment,
        }
    }
}

impl From<DocumentSummary> for domain::DocumentSummary {
    fn from(row: DocumentSummary) -> Self {
        Self {
            document_id: row.document_id,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
