//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Staff role, stored as the `user_role` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum UserRole {
    Imam,
    FinanceSecretary,
    Auditor,
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [UserRole::Imam, UserRole::FinanceSecretary, UserRole::Auditor];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Imam => "imam",
            UserRole::FinanceSecretary => "finance_secretary",
            UserRole::Auditor => "auditor",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid role. Allowed: imam, finance_secretary, auditor")]
pub struct InvalidRole;

impl FromStr for UserRole {
    type Err = InvalidRole;

    /// Accepts free-form input such as "Finance Secretary" or "finance-secretary".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        UserRole::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or(InvalidRole)
    }
}

/// User account stored in Postgres.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct User {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    #[cfg_attr(feature = "binding-generation", ts(skip))]
    pub hashed_password: String,
    pub full_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub full_name: String,
    pub role: UserRole,
}
