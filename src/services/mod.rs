//! Core operations. Each takes the calling [`Actor`](crate::domain::Actor)
//! explicitly and consults the [`AccessPolicy`](crate::policy::AccessPolicy)
//! before touching a repository.

pub mod approvals;
pub mod documents;
pub mod programs;
pub mod users;

pub use approvals::ApprovalWorkflow;
pub use documents::DocumentStore;
pub use programs::ProgramCatalog;
pub use users::UserDirectory;

use crate::error::{DomainError, DomainResult};

/// Rejects values wider than their column.
pub(crate) fn ensure_max_chars(field: &str, value: &str, max_chars: usize) -> DomainResult<()> {
    if value.chars().count() > max_chars {
        return Err(DomainError::validation(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }
    Ok(())
}

/// Trims and turns blank strings into `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
