//! Core records shared by the repositories, services and HTTP layer.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role. The declaration order is the privilege order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Intern,
    Staff,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Intern => "INTERN",
            Role::Staff => "STAFF",
            Role::Manager => "MANAGER",
            Role::Admin => "ADMIN",
        }
    }

    /// Managers and admins form the single reviewing tier.
    pub fn is_reviewer(self) -> bool {
        self >= Role::Manager
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INTERN" => Ok(Role::Intern),
            "STAFF" => Ok(Role::Staff),
            "MANAGER" => Ok(Role::Manager),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalState {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalState::Pending => "PENDING",
            ApprovalState::Approved => "APPROVED",
            ApprovalState::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ApprovalState::Pending)
    }
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ApprovalState::Pending),
            "APPROVED" => Ok(ApprovalState::Approved),
            "REJECTED" => Ok(ApprovalState::Rejected),
            other => Err(format!("unknown approval state '{other}'")),
        }
    }
}

/// Document category as offered by the upload form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Editais,
    Resultados,
    Formularios,
    Documentacoes,
    Resolucoes,
    Outros,
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Editais => "EDITAIS",
            DocumentType::Resultados => "RESULTADOS",
            DocumentType::Formularios => "FORMULARIOS",
            DocumentType::Documentacoes => "DOCUMENTACOES",
            DocumentType::Resolucoes => "RESOLUCOES",
            DocumentType::Outros => "OUTROS",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "EDITAIS" => Ok(DocumentType::Editais),
            "RESULTADOS" => Ok(DocumentType::Resultados),
            "FORMULARIOS" => Ok(DocumentType::Formularios),
            "DOCUMENTACOES" => Ok(DocumentType::Documentacoes),
            "RESOLUCOES" => Ok(DocumentType::Resolucoes),
            "OUTROS" => Ok(DocumentType::Outros),
            other => Err(format!("unknown document type '{other}'")),
        }
    }
}

/// Authenticated caller handed to every core operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
}

/// Replacement values for an existing account. `password_hash` is only
/// touched when a new password was supplied.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct ProgramInput {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub doc_type: DocumentType,
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

/// Stored file attributes, written together with the metadata.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub storage_name: String,
    pub original_filename: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub checksum: String,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub doc_type: DocumentType,
    pub publication_date: NaiveDate,
    pub file: StoredFile,
    pub program_id: Uuid,
    pub author_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct DocumentChanges {
    pub title: String,
    pub description: Option<String>,
    pub doc_type: DocumentType,
    pub publication_date: NaiveDate,
    pub program_id: Uuid,
    pub file: Option<StoredFile>,
}

#[derive(Debug, Clone)]
pub struct ApprovalFlow {
    pub id: Uuid,
    pub document_id: Uuid,
    pub state: ApprovalState,
    pub reviewer_id: Option<Uuid>,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewApprovalFlow {
    pub id: Uuid,
    pub state: ApprovalState,
    pub reviewer_id: Option<Uuid>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentSummary {
    pub document_id: Uuid,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A document together with the names and flow needed to present it.
#[derive(Debug, Clone)]
pub struct DocumentEntry {
    pub document: Document,
    pub program_name: String,
    pub author_name: Option<String>,
    pub approval: ApprovalFlow,
    pub summary: Option<String>,
}

/// Pending review queue item.
#[derive(Debug, Clone)]
pub struct ReviewItem {
    pub flow: ApprovalFlow,
    pub document_title: String,
    pub program_name: String,
    pub author_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_follow_privilege_order() {
        assert!(Role::Intern < Role::Staff);
        assert!(Role::Staff < Role::Manager);
        assert!(Role::Manager < Role::Admin);
        assert!(!Role::Staff.is_reviewer());
        assert!(Role::Manager.is_reviewer());
    }

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!(" editais ".parse::<DocumentType>().unwrap(), DocumentType::Editais);
        assert_eq!("Rejected".parse::<ApprovalState>().unwrap(), ApprovalState::Rejected);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!ApprovalState::Pending.is_terminal());
        assert!(ApprovalState::Approved.is_terminal());
        assert!(ApprovalState::Rejected.is_terminal());
    }

    #[test]
    fn serializes_roles_in_upper_case() {
        let json = serde_json::to_string(&Role::Staff).unwrap();
        assert_eq!(json, "\"STAFF\"");
    }
}
