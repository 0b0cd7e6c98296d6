use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::{
    auth::OptionalActor,
    domain::{Actor, ApprovalState, DocumentEntry, DocumentSummary, DocumentType},
    error::{AppError, AppResult, DomainError},
    routes::format_timestamp,
    services::documents::{DocumentMetadata, FileUpload},
    state::AppState,
    storage,
};

pub(crate) const UNKNOWN_AUTHOR: &str = "unknown";

const FORM_FIELDS: [&str; 5] = ["title", "description", "type", "publication_date", "program_id"];

#[derive(Serialize)]
pub struct ApprovalResponse {
    pub id: Uuid,
    pub state: ApprovalState,
    pub reviewer_id: Option<Uuid>,
    pub comment: Option<String>,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub publication_date: String,
    pub original_filename: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub checksum: String,
    pub program_id: Uuid,
    pub program_name: String,
    pub author_id: Option<Uuid>,
    pub author_name: String,
    pub approval: ApprovalResponse,
    pub summary: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<DocumentEntry> for DocumentResponse {
    fn from(entry: DocumentEntry) -> Self {
        let document = entry.document;
        let approval = entry.approval;
        Self {
            id: document.id,
            title: document.title,
            description: document.description,
            doc_type: document.doc_type,
            publication_date: document.publication_date.format("%Y-%m-%d").to_string(),
            original_filename: document.original_filename,
            content_type: document.content_type,
            size_bytes: document.size_bytes,
            checksum: document.checksum,
            program_id: document.program_id,
            program_name: entry.program_name,
            author_id: document.author_id,
            author_name: entry
                .author_name
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            approval: ApprovalResponse {
                id: approval.id,
                state: approval.state,
                reviewer_id: approval.reviewer_id,
                comment: approval.comment,
                updated_at: format_timestamp(approval.updated_at),
            },
            summary: entry.summary,
            created_at: format_timestamp(document.created_at),
            updated_at: format_timestamp(document.updated_at),
        }
    }
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub document_id: Uuid,
    pub summary: String,
    pub updated_at: String,
}

impl From<DocumentSummary> for SummaryResponse {
    fn from(summary: DocumentSummary) -> Self {
        Self {
            document_id: summary.document_id,
            summary: summary.content,
            updated_at: format_timestamp(summary.updated_at),
        }
    }
}

pub async fn upload_document(
    State(state): State<AppState>,
    actor: Actor,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    let (metadata, file) = read_document_form(multipart).await?;
    let entry = state.documents.upload(&actor, metadata, file).await?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

pub async fn list_documents(
    State(state): State<AppState>,
    OptionalActor(actor): OptionalActor,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let entries = state.documents.list_approved(actor.as_ref())?;
    Ok(Json(entries.into_iter().map(DocumentResponse::from).collect()))
}

pub async fn get_document(
    State(state): State<AppState>,
    OptionalActor(actor): OptionalActor,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<DocumentResponse>> {
    let entry = state.documents.get(actor.as_ref(), document_id)?;
    Ok(Json(entry.into()))
}

pub async fn update_document(
    State(state): State<AppState>,
    actor: Actor,
    Path(document_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<DocumentResponse>> {
    let (metadata, file) = read_document_form(multipart).await?;
    let entry = state
        .documents
        .update(&actor, document_id, metadata, file)
        .await?;
    Ok(Json(entry.into()))
}

pub async fn delete_document(
    State(state): State<AppState>,
    actor: Actor,
    Path(document_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.documents.delete(&actor, document_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_document(
    State(state): State<AppState>,
    OptionalActor(actor): OptionalActor,
    Path(document_id): Path<Uuid>,
) -> AppResult<Response> {
    let download = state.documents.download(actor.as_ref(), document_id).await?;

    let content_type = HeaderValue::from_str(&download.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = storage::attachment_content_disposition(&download.filename)
        .and_then(|value| HeaderValue::from_str(&value).ok())
        .unwrap_or_else(|| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(download.bytes),
    )
        .into_response())
}

pub async fn summarize_document(
    State(state): State<AppState>,
    actor: Actor,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<SummaryResponse>> {
    let summary = state.documents.summarize(&actor, document_id).await?;
    Ok(Json(summary.into()))
}

/// Collects the upload form. Unknown fields are skipped; blank text fields
/// count as absent.
async fn read_document_form(
    mut multipart: Multipart,
) -> AppResult<(DocumentMetadata, Option<FileUpload>)> {
    let mut metadata = DocumentMetadata::default();
    let mut file: Option<FileUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        let msg = format!("invalid multipart data: {err}");
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(msg)
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().map(|n| n.to_string()).unwrap_or_default();
                let content_type = field.content_type().map(|mime| mime.to_string());
                let data = field.bytes().await.map_err(|err| {
                    let msg = format!("failed to read file bytes: {err}");
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(msg)
                })?;
                file = Some(FileUpload {
                    filename,
                    content_type,
                    bytes: data.to_vec(),
                });
            }
            Some(field_name) if FORM_FIELDS.contains(&field_name) => {
                let field_name = field_name.to_string();
                let value = field.text().await.map_err(|err| {
                    let msg = format!("invalid {field_name} field: {err}");
                    error!(error = %err, field = %field_name, "failed to read form field");
                    AppError::bad_request(msg)
                })?;
                apply_text_field(&mut metadata, &field_name, value)?;
            }
            _ => {}
        }
    }

    Ok((metadata, file))
}

fn apply_text_field(
    metadata: &mut DocumentMetadata,
    field_name: &str,
    value: String,
) -> Result<(), DomainError> {
    match field_name {
        "title" => {
            metadata.title = value;
            return Ok(());
        }
        "description" => {
            metadata.description = Some(value);
            return Ok(());
        }
        _ => {}
    }

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    match field_name {
        "type" => {
            let doc_type = trimmed
                .parse::<DocumentType>()
                .map_err(DomainError::validation)?;
            metadata.doc_type = Some(doc_type);
        }
        "publication_date" => {
            let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
                DomainError::validation("publication_date must use the YYYY-MM-DD format")
            })?;
            metadata.publication_date = Some(date);
        }
        "program_id" => {
            let program_id = Uuid::parse_str(trimmed)
                .map_err(|_| DomainError::validation("program_id must be a valid UUID"))?;
            metadata.program_id = Some(program_id);
        }
        _ => {}
    }
    Ok(())
}
