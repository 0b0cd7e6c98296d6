use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password;
use crate::domain::{Actor, NewUser, Role, User, UserChanges};
use crate::error::{DomainError, DomainResult};
use crate::policy::{AccessPolicy, Operation};
use crate::repository::UserRepository;

use super::ensure_max_chars;

const MAX_NAME_CHARS: usize = 150;
const MAX_EMAIL_CHARS: usize = 255;

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password: Option<String>,
}

#[derive(Clone)]
pub struct UserDirectory {
    users: Arc<dyn UserRepository>,
    policy: AccessPolicy,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_identity(name: &str, email: &str) -> DomainResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name must not be blank"));
    }
    ensure_max_chars("name", name, MAX_NAME_CHARS)?;
    let email = email.trim();
    if email.is_empty() {
        return Err(DomainError::validation("email must not be blank"));
    }
    if !email.contains('@') {
        return Err(DomainError::validation("email must contain '@'"));
    }
    ensure_max_chars("email", email, MAX_EMAIL_CHARS)
}

fn validate_password(password: &str) -> DomainResult<()> {
    if password.trim().is_empty() {
        return Err(DomainError::validation("password must not be blank"));
    }
    Ok(())
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UserRepository>, policy: AccessPolicy) -> Self {
        Self { users, policy }
    }

    /// Creates an account. `pre_approved` decides the initial active flag.
    pub fn register(&self, registration: Registration, pre_approved: bool) -> DomainResult<User> {
        validate_identity(&registration.name, &registration.email)?;
        validate_password(&registration.password)?;

        let email = normalize_email(&registration.email);
        if self.users.find_user_by_email(&email)?.is_some() {
            return Err(DomainError::business_rule("email already registered"));
        }

        let password_hash = password::hash_password(&registration.password)?;
        let user = self.users.insert_user(NewUser {
            id: Uuid::new_v4(),
            name: registration.name.trim().to_string(),
            email,
            password_hash,
            role: registration.role,
            active: pre_approved,
        })?;

        info!(user_id = %user.id, role = %user.role, active = user.active, "user registered");
        Ok(user)
    }

    /// Public sign-up; the account waits for activation.
    pub fn register_self(&self, registration: Registration) -> DomainResult<User> {
        self.policy.authorize(None, Operation::RegisterSelf)?;
        self.register(registration, false)
    }

    /// Account created by a manager, active immediately.
    pub fn create(&self, actor: &Actor, registration: Registration) -> DomainResult<User> {
        self.policy.require(actor, Operation::ManageUsers)?;
        self.register(registration, true)
    }

    pub fn activate(&self, actor: &Actor, id: Uuid) -> DomainResult<User> {
        self.set_active(actor, id, true)
    }

    pub fn deactivate(&self, actor: &Actor, id: Uuid) -> DomainResult<User> {
        self.set_active(actor, id, false)
    }

    fn set_active(&self, actor: &Actor, id: Uuid, active: bool) -> DomainResult<User> {
        self.policy.require(actor, Operation::ManageUsers)?;
        let user = self
            .users
            .set_user_active(id, active)?
            .ok_or_else(|| DomainError::not_found("user not found"))?;
        info!(user_id = %id, active, by = %actor.user_id, "user activation changed");
        Ok(user)
    }

    pub fn update(&self, actor: &Actor, id: Uuid, update: UserUpdate) -> DomainResult<User> {
        self.policy.require(actor, Operation::ManageUsers)?;
        if self.users.find_user(id)?.is_none() {
            return Err(DomainError::not_found("user not found"));
        }
        validate_identity(&update.name, &update.email)?;

        let email = normalize_email(&update.email);
        if let Some(existing) = self.users.find_user_by_email(&email)? {
            if existing.id != id {
                return Err(DomainError::business_rule("email already registered"));
            }
        }

        let password_hash = match update.password {
            Some(new_password) => {
                validate_password(&new_password)?;
                Some(password::hash_password(&new_password)?)
            }
            None => None,
        };

        self.users
            .update_user(
                id,
                UserChanges {
                    name: update.name.trim().to_string(),
                    email,
                    role: update.role,
                    password_hash,
                },
            )?
            .ok_or_else(|| DomainError::not_found("user not found"))
    }

    pub fn delete(&self, actor: &Actor, id: Uuid) -> DomainResult<()> {
        self.policy.require(actor, Operation::ManageUsers)?;
        if !self.users.delete_user(id)? {
            return Err(DomainError::not_found("user not found"));
        }
        info!(user_id = %id, by = %actor.user_id, "user deleted");
        Ok(())
    }

    pub fn list(&self, actor: &Actor) -> DomainResult<Vec<User>> {
        self.policy.require(actor, Operation::ManageUsers)?;
        Ok(self.users.list_users()?)
    }

    /// The caller's own record.
    pub fn profile(&self, actor: &Actor) -> DomainResult<User> {
        self.users
            .find_user(actor.user_id)?
            .ok_or_else(|| DomainError::not_found("user not found"))
    }

    /// Credential check for the login boundary. Unknown email, wrong
    /// password and inactive account are indistinguishable to the caller.
    pub fn authenticate(&self, email: &str, password: &str) -> DomainResult<User> {
        let Some(user) = self.users.find_user_by_email(&normalize_email(email))? else {
            return Err(DomainError::Unauthenticated);
        };

        let valid = password::verify_password(password, &user.password_hash).unwrap_or_else(|err| {
            warn!(user_id = %user.id, error = %err, "stored password hash is unreadable");
            false
        });
        if !valid || !user.active {
            return Err(DomainError::Unauthenticated);
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryRepository;

    fn directory() -> UserDirectory {
        UserDirectory::new(Arc::new(InMemoryRepository::new()), AccessPolicy::default())
    }

    fn registration(email: &str, role: Role) -> Registration {
        Registration {
            name: "Ana Souza".into(),
            email: email.into(),
            password: "s3cret".into(),
            role,
        }
    }

    fn manager() -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            email: "boss@example.org".into(),
            role: Role::Manager,
        }
    }

    #[test]
    fn duplicate_email_differing_by_case_is_a_business_rule() {
        let directory = directory();
        directory
            .register(registration("ana@example.org", Role::Staff), false)
            .unwrap();

        let err = directory
            .register(registration("ANA@Example.org", Role::Intern), false)
            .unwrap_err();
        assert!(matches!(err, DomainError::BusinessRule(_)));
    }

    #[test]
    fn self_registration_starts_inactive() {
        let directory = directory();
        let user = directory
            .register_self(registration("ana@example.org", Role::Staff))
            .unwrap();
        assert!(!user.active);
        assert_ne!(user.password_hash, "s3cret");
    }

    #[test]
    fn activation_is_idempotent() {
        let directory = directory();
        let user = directory
            .register_self(registration("ana@example.org", Role::Staff))
            .unwrap();

        let first = directory.activate(&manager(), user.id).unwrap();
        let second = directory.activate(&manager(), user.id).unwrap();
        assert!(first.active && second.active);

        let err = directory.activate(&manager(), Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn inactive_accounts_cannot_authenticate() {
        let directory = directory();
        let user = directory
            .register_self(registration("ana@example.org", Role::Staff))
            .unwrap();

        let err = directory.authenticate("ana@example.org", "s3cret").unwrap_err();
        assert!(matches!(err, DomainError::Unauthenticated));

        directory.activate(&manager(), user.id).unwrap();
        let authenticated = directory.authenticate(" ANA@example.org ", "s3cret").unwrap();
        assert_eq!(authenticated.id, user.id);

        let err = directory.authenticate("ana@example.org", "wrong").unwrap_err();
        assert!(matches!(err, DomainError::Unauthenticated));
    }

    #[test]
    fn rejects_malformed_input() {
        let directory = directory();
        let err = directory
            .register(registration("not-an-email", Role::Staff), true)
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn update_rechecks_email_uniqueness() {
        let directory = directory();
        directory
            .register(registration("ana@example.org", Role::Staff), true)
            .unwrap();
        let other = directory
            .register(registration("bia@example.org", Role::Staff), true)
            .unwrap();

        let err = directory
            .update(
                &manager(),
                other.id,
                UserUpdate {
                    name: "Bia".into(),
                    email: "Ana@example.org".into(),
                    role: Role::Manager,
                    password: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::BusinessRule(_)));
    }

    #[test]
    fn overlong_identity_fields_are_validation_errors() {
        let directory = directory();
        let mut long_name = registration("ana@example.org", Role::Staff);
        long_name.name = "n".repeat(151);
        assert!(matches!(
            directory.register(long_name, true).unwrap_err(),
            DomainError::Validation(_)
        ));

        let long_email = registration(&format!("{}@example.org", "e".repeat(250)), Role::Staff);
        assert!(matches!(
            directory.register(long_email, true).unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn updating_unknown_user_is_not_found_even_with_bad_payload() {
        let directory = directory();
        let err = directory
            .update(
                &manager(),
                Uuid::new_v4(),
                UserUpdate {
                    name: " ".into(),
                    email: "no-at-sign".into(),
                    role: Role::Staff,
                    password: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn staff_cannot_list_users() {
        let directory = directory();
        let staff = Actor {
            role: Role::Staff,
            ..manager()
        };
        assert!(matches!(
            directory.list(&staff).unwrap_err(),
            DomainError::AccessDenied(_)
        ));
    }
}
