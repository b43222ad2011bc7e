/// Credential Store
///
/// Durable persistence for user identity records, behind a trait so
/// handlers and tests are independent of the backing database. The real
/// implementation is PostgreSQL; tests use the in-memory store.

mod memory;
mod postgres;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// User role for authorization decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::Internal(format!("unknown role: {}", other))),
        }
    }
}

/// A stored user record. The password hash never leaves the service;
/// responses serialize `UserResponse` in the routes layer instead.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a user. `email` must already be normalized
/// (trimmed, lowercased) by the validation layer.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

/// Durable user persistence. All operations are atomic at the
/// single-row level.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new user. Fails with `Conflict` if the normalized email
    /// already exists.
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError>;

    /// Look up by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn update_profile(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, AppError>;

    async fn update_password_hash(&self, id: Uuid, new_hash: &str) -> Result<(), AppError>;

    async fn set_active(&self, id: Uuid, active: bool) -> Result<(), AppError>;
}
