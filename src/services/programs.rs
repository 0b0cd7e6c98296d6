use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::{Actor, Program, ProgramInput};
use crate::error::{DomainError, DomainResult};
use crate::policy::{AccessPolicy, Operation};
use crate::repository::{ProgramRepository, RepositoryError};

use super::{ensure_max_chars, non_blank};

const MAX_NAME_CHARS: usize = 255;
const MAX_CODE_CHARS: usize = 32;

#[derive(Clone)]
pub struct ProgramCatalog {
    programs: Arc<dyn ProgramRepository>,
    policy: AccessPolicy,
}

fn validate(input: ProgramInput) -> DomainResult<ProgramInput> {
    let name = input.name.trim().to_string();
    let code = input.code.trim().to_string();
    if name.is_empty() {
        return Err(DomainError::validation("name must not be blank"));
    }
    if code.is_empty() {
        return Err(DomainError::validation("code must not be blank"));
    }
    ensure_max_chars("name", &name, MAX_NAME_CHARS)?;
    ensure_max_chars("code", &code, MAX_CODE_CHARS)?;
    Ok(ProgramInput {
        name,
        code,
        description: non_blank(input.description),
    })
}

impl ProgramCatalog {
    pub fn new(programs: Arc<dyn ProgramRepository>, policy: AccessPolicy) -> Self {
        Self { programs, policy }
    }

    pub fn list(&self, actor: Option<&Actor>) -> DomainResult<Vec<Program>> {
        self.policy.authorize(actor, Operation::ReadDocument)?;
        Ok(self.programs.list_programs()?)
    }

    pub fn get(&self, actor: Option<&Actor>, id: Uuid) -> DomainResult<Program> {
        self.policy.authorize(actor, Operation::ReadDocument)?;
        self.programs
            .find_program(id)?
            .ok_or_else(|| DomainError::not_found("program not found"))
    }

    pub fn create(&self, actor: &Actor, input: ProgramInput) -> DomainResult<Program> {
        self.policy.require(actor, Operation::ManagePrograms)?;
        let program = self.programs.insert_program(Uuid::new_v4(), validate(input)?)?;
        info!(program_id = %program.id, code = %program.code, "program created");
        Ok(program)
    }

    pub fn update(&self, actor: &Actor, id: Uuid, input: ProgramInput) -> DomainResult<Program> {
        self.policy.require(actor, Operation::ManagePrograms)?;
        if self.programs.find_program(id)?.is_none() {
            return Err(DomainError::not_found("program not found"));
        }
        self.programs
            .update_program(id, validate(input)?)?
            .ok_or_else(|| DomainError::not_found("program not found"))
    }

    pub fn delete(&self, actor: &Actor, id: Uuid) -> DomainResult<()> {
        self.policy.require(actor, Operation::ManagePrograms)?;
        match self.programs.delete_program(id) {
            Ok(true) => {
                info!(program_id = %id, "program deleted");
                Ok(())
            }
            Ok(false) => Err(DomainError::not_found("program not found")),
            Err(RepositoryError::Constraint(_)) => {
                Err(DomainError::business_rule("program still owns documents"))
            }
            Err(err) => Err(err.into()),
        }
    }
}
