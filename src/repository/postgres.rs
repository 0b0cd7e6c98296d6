use std::collections::{HashMap, HashSet};

use chrono::Utc;
use diesel::{
    pg::PgConnection,
    prelude::*,
    r2d2::{ConnectionManager, PooledConnection},
    result::{DatabaseErrorKind, Error as DieselError},
    upsert::excluded,
};
use uuid::Uuid;

use crate::{
    db::PgPool,
    domain::{
        ApprovalFlow, ApprovalState, Document, DocumentChanges, DocumentEntry, DocumentSummary,
        NewApprovalFlow, NewDocument, NewUser, Program, ProgramInput, ReviewItem, User,
        UserChanges,
    },
    models,
    schema::{approval_flows, document_summaries, documents, programs, users},
};

use super::{
    DocumentRepository, ProgramRepository, RepositoryError, RepositoryResult, UserRepository,
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

impl From<DieselError> for RepositoryError {
    fn from(value: DieselError) -> Self {
        match value {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                RepositoryError::Conflict(unique_message(info.constraint_name()).to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                RepositoryError::Constraint(foreign_key_message(info.constraint_name()).to_string())
            }
            other => RepositoryError::Unavailable(other.to_string()),
        }
    }
}

fn unique_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_email_lower_idx") => "email already registered",
        Some("programs_code_lower_idx") => "program code already in use",
        Some("approval_flows_document_id_key") => "document already has an approval flow",
        _ => "record already exists",
    }
}

fn foreign_key_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("documents_program_id_fkey") => "program still owns documents or does not exist",
        Some("documents_author_id_fkey") => "author does not exist",
        Some("approval_flows_reviewer_id_fkey") => "reviewer does not exist",
        _ => "referenced record is missing or still in use",
    }
}

fn corrupt(message: String) -> RepositoryError {
    RepositoryError::Unavailable(message)
}

/// Diesel-backed implementation of every repository port.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> RepositoryResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| RepositoryError::Unavailable(format!("database pool error: {err}")))
    }
}

impl UserRepository for PgRepository {
    fn insert_user(&self, user: NewUser) -> RepositoryResult<User> {
        let mut conn = self.conn()?;
        let row: models::User = diesel::insert_into(users::table)
            .values(&models::NewUser::from(user))
            .get_result(&mut conn)?;
        User::try_from(row).map_err(corrupt)
    }

    fn find_user(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        let mut conn = self.conn()?;
        users::table
            .find(id)
            .first::<models::User>(&mut conn)
            .optional()?
            .map(User::try_from)
            .transpose()
            .map_err(corrupt)
    }

    fn find_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let mut conn = self.conn()?;
        users::table
            .filter(users::email.eq(email.trim().to_lowercase()))
            .first::<models::User>(&mut conn)
            .optional()?
            .map(User::try_from)
            .transpose()
            .map_err(corrupt)
    }

    fn list_users(&self) -> RepositoryResult<Vec<User>> {
        let mut conn = self.conn()?;
        users::table
            .order((users::name.asc(), users::email.asc()))
            .load::<models::User>(&mut conn)?
            .into_iter()
            .map(|row| User::try_from(row).map_err(corrupt))
            .collect()
    }

    fn update_user(&self, id: Uuid, changes: UserChanges) -> RepositoryResult<Option<User>> {
        let mut conn = self.conn()?;
        let changeset = models::UserChangeset::new(changes, Utc::now().naive_utc());
        diesel::update(users::table.find(id))
            .set(&changeset)
            .get_result::<models::User>(&mut conn)
            .optional()?
            .map(User::try_from)
            .transpose()
            .map_err(corrupt)
    }

    fn set_user_active(&self, id: Uuid, active: bool) -> RepositoryResult<Option<User>> {
        let mut conn = self.conn()?;
        diesel::update(users::table.find(id))
            .set((
                users::active.eq(active),
                users::updated_at.eq(Utc::now().naive_utc()),
            ))
            .get_result::<models::User>(&mut conn)
            .optional()?
            .map(User::try_from)
            .transpose()
            .map_err(corrupt)
    }

    fn delete_user(&self, id: Uuid) -> RepositoryResult<bool> {
        let mut conn = self.conn()?;
        let removed = diesel::delete(users::table.find(id)).execute(&mut conn)?;
        Ok(removed > 0)
    }
}

impl ProgramRepository for PgRepository {
    fn list_programs(&self) -> RepositoryResult<Vec<Program>> {
        let mut conn = self.conn()?;
        let rows = programs::table
            .order((programs::name.asc(), programs::code.asc()))
            .load::<models::Program>(&mut conn)?;
        Ok(rows.into_iter().map(Program::from).collect())
    }

    fn find_program(&self, id: Uuid) -> RepositoryResult<Option<Program>> {
        let mut conn = self.conn()?;
        let row = programs::table
            .find(id)
            .first::<models::Program>(&mut conn)
            .optional()?;
        Ok(row.map(Program::from))
    }

    fn insert_program(&self, id: Uuid, input: ProgramInput) -> RepositoryResult<Program> {
        let mut conn = self.conn()?;
        let row: models::Program = diesel::insert_into(programs::table)
            .values(&models::NewProgram {
                id,
                name: input.name,
                code: input.code,
                description: input.description,
            })
            .get_result(&mut conn)?;
        Ok(row.into())
    }

    fn update_program(&self, id: Uuid, input: ProgramInput) -> RepositoryResult<Option<Program>> {
        let mut conn = self.conn()?;
        let row = diesel::update(programs::table.find(id))
            .set((
                programs::name.eq(input.name),
                programs::code.eq(input.code),
                programs::description.eq(input.description),
                programs::updated_at.eq(Utc::now().naive_utc()),
            ))
            .get_result::<models::Program>(&mut conn)
            .optional()?;
        Ok(row.map(Program::from))
    }

    fn delete_program(&self, id: Uuid) -> RepositoryResult<bool> {
        let mut conn = self.conn()?;
        let removed = diesel::delete(programs::table.find(id)).execute(&mut conn)?;
        Ok(removed > 0)
    }
}

impl DocumentRepository for PgRepository {
    fn insert_document(
        &self,
        document: NewDocument,
        flow: NewApprovalFlow,
    ) -> RepositoryResult<DocumentEntry> {
        let mut conn = self.conn()?;
        conn.transaction::<DocumentEntry, RepositoryError, _>(|conn| {
            let row: models::Document = diesel::insert_into(documents::table)
                .values(&models::NewDocument::from(document))
                .get_result(conn)?;

            diesel::insert_into(approval_flows::table)
                .values(&models::NewApprovalFlow::for_document(row.id, flow))
                .execute(conn)?;

            single_entry(conn, row)
        })
    }

    fn find_document(&self, id: Uuid) -> RepositoryResult<Option<DocumentEntry>> {
        let mut conn = self.conn()?;
        let row = documents::table
            .find(id)
            .first::<models::Document>(&mut conn)
            .optional()?;
        row.map(|row| single_entry(&mut conn, row)).transpose()
    }

    fn list_documents_by_state(&self, state: ApprovalState) -> RepositoryResult<Vec<DocumentEntry>> {
        let mut conn = self.conn()?;
        let rows: Vec<models::Document> = documents::table
            .inner_join(approval_flows::table)
            .filter(approval_flows::state.eq(state.as_str()))
            .order((documents::publication_date.desc(), documents::id.asc()))
            .select(documents::all_columns)
            .load(&mut conn)?;
        load_entries(&mut conn, rows)
    }

    fn update_document(
        &self,
        id: Uuid,
        changes: DocumentChanges,
    ) -> RepositoryResult<Option<DocumentEntry>> {
        let mut conn = self.conn()?;
        conn.transaction::<Option<DocumentEntry>, RepositoryError, _>(|conn| {
            let now = Utc::now().naive_utc();

            let updated = diesel::update(documents::table.find(id))
                .set((
                    documents::title.eq(changes.title),
                    documents::description.eq(changes.description),
                    documents::doc_type.eq(changes.doc_type.as_str()),
                    documents::publication_date.eq(changes.publication_date),
                    documents::program_id.eq(changes.program_id),
                    documents::updated_at.eq(now),
                ))
                .execute(conn)?;
            if updated == 0 {
                return Ok(None);
            }

            if let Some(file) = changes.file {
                diesel::update(documents::table.find(id))
                    .set((
                        documents::storage_name.eq(file.storage_name),
                        documents::original_filename.eq(file.original_filename),
                        documents::content_type.eq(file.content_type),
                        documents::size_bytes.eq(file.size_bytes),
                        documents::checksum.eq(file.checksum),
                    ))
                    .execute(conn)?;
            }

            let row: models::Document = documents::table.find(id).first(conn)?;
            single_entry(conn, row).map(Some)
        })
    }

    fn delete_document(&self, id: Uuid) -> RepositoryResult<Option<Document>> {
        let mut conn = self.conn()?;
        conn.transaction::<Option<Document>, RepositoryError, _>(|conn| {
            let Some(row) = documents::table
                .find(id)
                .first::<models::Document>(conn)
                .optional()?
            else {
                return Ok(None);
            };

            // Flow and summary go with the row through ON DELETE CASCADE.
            diesel::delete(documents::table.find(id)).execute(conn)?;
            Document::try_from(row).map(Some).map_err(corrupt)
        })
    }

    fn all_storage_names(&self) -> RepositoryResult<Vec<String>> {
        let mut conn = self.conn()?;
        Ok(documents::table
            .select(documents::storage_name)
            .load(&mut conn)?)
    }

    fn find_flow(&self, id: Uuid) -> RepositoryResult<Option<ApprovalFlow>> {
        let mut conn = self.conn()?;
        approval_flows::table
            .find(id)
            .first::<models::ApprovalFlow>(&mut conn)
            .optional()?
            .map(ApprovalFlow::try_from)
            .transpose()
            .map_err(corrupt)
    }

    fn record_decision(
        &self,
        id: Uuid,
        state: ApprovalState,
        reviewer_id: Uuid,
        comment: Option<String>,
    ) -> RepositoryResult<Option<ApprovalFlow>> {
        let mut conn = self.conn()?;
        diesel::update(approval_flows::table.find(id))
            .set((
                approval_flows::state.eq(state.as_str()),
                approval_flows::reviewer_id.eq(Some(reviewer_id)),
                approval_flows::comment.eq(comment),
                approval_flows::updated_at.eq(Utc::now().naive_utc()),
            ))
            .get_result::<models::ApprovalFlow>(&mut conn)
            .optional()?
            .map(ApprovalFlow::try_from)
            .transpose()
            .map_err(corrupt)
    }

    fn list_reviews(&self, state: ApprovalState) -> RepositoryResult<Vec<ReviewItem>> {
        let mut conn = self.conn()?;
        let rows: Vec<(models::ApprovalFlow, models::Document)> = approval_flows::table
            .inner_join(documents::table)
            .filter(approval_flows::state.eq(state.as_str()))
            .order((approval_flows::created_at.asc(), approval_flows::id.asc()))
            .select((approval_flows::all_columns, documents::all_columns))
            .load(&mut conn)?;

        let program_ids: Vec<Uuid> = rows.iter().map(|(_, doc)| doc.program_id).collect();
        let author_ids: Vec<Uuid> = rows.iter().filter_map(|(_, doc)| doc.author_id).collect();
        let program_names = load_program_names(&mut conn, &program_ids)?;
        let author_names = load_user_names(&mut conn, &author_ids)?;

        rows.into_iter()
            .map(|(flow, doc)| {
                Ok(ReviewItem {
                    flow: ApprovalFlow::try_from(flow).map_err(corrupt)?,
                    program_name: program_names
                        .get(&doc.program_id)
                        .cloned()
                        .unwrap_or_default(),
                    author_name: doc.author_id.and_then(|id| author_names.get(&id).cloned()),
                    document_title: doc.title,
                })
            })
            .collect()
    }

    fn save_summary(
        &self,
        document_id: Uuid,
        content: String,
    ) -> RepositoryResult<DocumentSummary> {
        let mut conn = self.conn()?;
        let row: models::DocumentSummary = diesel::insert_into(document_summaries::table)
            .values(&models::NewDocumentSummary {
                document_id,
                content,
            })
            .on_conflict(document_summaries::document_id)
            .do_update()
            .set((
                document_summaries::content.eq(excluded(document_summaries::content)),
                document_summaries::updated_at.eq(Utc::now().naive_utc()),
            ))
            .get_result(&mut conn)?;
        Ok(row.into())
    }
}

fn single_entry(conn: &mut PgConnection, row: models::Document) -> RepositoryResult<DocumentEntry> {
    let id = row.id;
    load_entries(conn, vec![row])?
        .pop()
        .ok_or_else(|| corrupt(format!("document {id} could not be assembled")))
}

/// Assembles entries for the given rows with one query per related table,
/// keeping the input order.
fn load_entries(
    conn: &mut PgConnection,
    rows: Vec<models::Document>,
) -> RepositoryResult<Vec<DocumentEntry>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let document_ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let program_ids: Vec<Uuid> = rows.iter().map(|row| row.program_id).collect();
    let author_ids: Vec<Uuid> = rows.iter().filter_map(|row| row.author_id).collect();

    let program_names = load_program_names(conn, &program_ids)?;
    let author_names = load_user_names(conn, &author_ids)?;

    let mut flows: HashMap<Uuid, models::ApprovalFlow> = approval_flows::table
        .filter(approval_flows::document_id.eq_any(&document_ids))
        .load::<models::ApprovalFlow>(conn)?
        .into_iter()
        .map(|flow| (flow.document_id, flow))
        .collect();

    let mut summaries: HashMap<Uuid, String> = document_summaries::table
        .filter(document_summaries::document_id.eq_any(&document_ids))
        .select((document_summaries::document_id, document_summaries::content))
        .load::<(Uuid, String)>(conn)?
        .into_iter()
        .collect();

    rows.into_iter()
        .map(|row| {
            let flow = flows
                .remove(&row.id)
                .ok_or_else(|| corrupt(format!("document {} has no approval flow", row.id)))?;
            let program_name = program_names
                .get(&row.program_id)
                .cloned()
                .unwrap_or_default();
            let author_name = row.author_id.and_then(|id| author_names.get(&id).cloned());
            let summary = summaries.remove(&row.id);

            Ok(DocumentEntry {
                document: Document::try_from(row).map_err(corrupt)?,
                program_name,
                author_name,
                approval: ApprovalFlow::try_from(flow).map_err(corrupt)?,
                summary,
            })
        })
        .collect()
}

fn load_program_names(
    conn: &mut PgConnection,
    program_ids: &[Uuid],
) -> RepositoryResult<HashMap<Uuid, String>> {
    let unique: Vec<Uuid> = program_ids
        .iter()
        .copied()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    if unique.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, String)> = programs::table
        .filter(programs::id.eq_any(unique))
        .select((programs::id, programs::name))
        .load(conn)?;
    Ok(rows.into_iter().collect())
}

fn load_user_names(
    conn: &mut PgConnection,
    user_ids: &[Uuid],
) -> RepositoryResult<HashMap<Uuid, String>> {
    let unique: Vec<Uuid> = user_ids
        .iter()
        .copied()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    if unique.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, String)> = users::table
        .filter(users::id.eq_any(unique))
        .select((users::id, users::name))
        .load(conn)?;
    Ok(rows.into_iter().collect())
}
