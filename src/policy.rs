//! Central role table gating every privileged core call.

use crate::domain::{Actor, Role};
use crate::error::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RegisterSelf,
    UploadDocument,
    ReadDocument,
    ModifyDocument,
    ReviewApprovals,
    ManageUsers,
    ManagePrograms,
}

impl Operation {
    pub fn label(self) -> &'static str {
        match self {
            Operation::RegisterSelf => "register",
            Operation::UploadDocument => "upload documents",
            Operation::ReadDocument => "read documents",
            Operation::ModifyDocument => "modify documents",
            Operation::ReviewApprovals => "review approvals",
            Operation::ManageUsers => "manage users",
            Operation::ManagePrograms => "manage programs",
        }
    }

    /// Roles admitted for this operation; `None` means no role is required.
    fn allowed_roles(self) -> Option<&'static [Role]> {
        const ALL: &[Role] = &[Role::Intern, Role::Staff, Role::Manager, Role::Admin];
        const EDITORS: &[Role] = &[Role::Staff, Role::Manager, Role::Admin];
        const REVIEWERS: &[Role] = &[Role::Manager, Role::Admin];

        match self {
            Operation::RegisterSelf => None,
            Operation::UploadDocument | Operation::ReadDocument => Some(ALL),
            Operation::ModifyDocument => Some(EDITORS),
            Operation::ReviewApprovals | Operation::ManageUsers | Operation::ManagePrograms => {
                Some(REVIEWERS)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy {
    /// Lets unauthenticated callers read approved documents and programs.
    pub public_read: bool,
}

impl AccessPolicy {
    pub fn new(public_read: bool) -> Self {
        Self { public_read }
    }

    pub fn decision(&self, role: Option<Role>, operation: Operation) -> Decision {
        let allowed = match (operation.allowed_roles(), role) {
            (None, _) => true,
            (Some(_), None) => self.public_read && operation == Operation::ReadDocument,
            (Some(roles), Some(role)) => roles.contains(&role),
        };

        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }

    pub fn authorize(&self, actor: Option<&Actor>, operation: Operation) -> DomainResult<()> {
        let role = actor.map(|actor| actor.role);
        match self.decision(role, operation) {
            Decision::Allow => Ok(()),
            Decision::Deny if role.is_none() => Err(DomainError::Unauthenticated),
            Decision::Deny => {
                tracing::debug!(role = ?role, operation = operation.label(), "access denied");
                Err(DomainError::AccessDenied(format!(
                    "role is not allowed to {}",
                    operation.label()
                )))
            }
        }
    }

    /// Shorthand for operations that always require an authenticated actor.
    pub fn require(&self, actor: &Actor, operation: Operation) -> DomainResult<()> {
        self.authorize(Some(actor), operation)
    }
}
