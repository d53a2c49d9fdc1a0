/// Account management system
///
/// Handles registration, profile lookups and updates, and the admin
/// listing/mutation surface.

mod manager;

pub use manager::{AccountManager, AdminUpdate, ProfileUpdate};

use crate::db::models::{Account, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub password: String,
}

/// Full user view, returned to the account owner and admins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for UserView {
    fn from(account: Account) -> Self {
        let role = account.role();
        Self {
            id: account.id,
            email: account.email,
            username: account.username,
            full_name: account.full_name,
            role,
            is_active: account.is_active,
            is_verified: account.is_verified,
            phone: account.phone,
            avatar_url: account.avatar_url,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Public profile view - no email, account flags or timestamps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub avatar_url: Option<String>,
}

impl From<Account> for PublicProfile {
    fn from(account: Account) -> Self {
        let role = account.role();
        Self {
            id: account.id,
            username: account.username,
            full_name: account.full_name,
            role,
            avatar_url: account.avatar_url,
        }
    }
}

/// Self-service profile update; role changes are not allowed here
///
/// Phone and avatar are nullable: an absent field is left alone, an
/// explicit null clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar_url: Option<Option<String>>,
}

/// Admin-only update; may change role and account flags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminUpdateRequest {
    pub full_name: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar_url: Option<Option<String>>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
}

/// Keep "field absent" apart from "field: null"
///
/// Serde flattens null into the outer Option by default; wrapping the
/// deserialized value restores the middle layer so null means "clear".
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Admin listing filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListAccountsQuery {
    #[serde(default)]
    pub skip: i64,
    pub limit: Option<i64>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}
