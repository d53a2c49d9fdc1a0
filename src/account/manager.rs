/// Account manager implementation using runtime queries
use crate::{
    account::{AdminUpdateRequest, ListAccountsQuery, RegisterRequest, UpdateProfileRequest},
    db::models::{Account, Role},
    error::{MarketError, MarketResult},
    password,
};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Applied self-service profile change, for logging
#[derive(Debug)]
pub struct ProfileUpdate {
    pub account: Account,
}

/// Applied admin change with its audit summary
#[derive(Debug)]
pub struct AdminUpdate {
    pub account: Account,
    /// Change summary for the audit log; never contains password material
    pub summary: serde_json::Value,
}

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
}

impl AccountManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Register a new account
    ///
    /// New accounts start inactive and unverified; email verification
    /// flips both flags.
    pub async fn create_account(&self, req: &RegisterRequest) -> MarketResult<Account> {
        Self::validate_email(&req.email)?;
        Self::validate_username(&req.username)?;
        Self::validate_password(&req.password)?;

        if self.email_exists(&req.email).await? {
            return Err(MarketError::Duplicate(
                "User with this email already exists".to_string(),
            ));
        }

        if self.username_exists(&req.username).await? {
            return Err(MarketError::Duplicate("Username already exists".to_string()));
        }

        let password_hash = password::hash(&req.password)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO account (id, email, username, full_name, password_hash, role,
                                  is_active, is_verified, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&id)
        .bind(&req.email)
        .bind(&req.username)
        .bind(&req.full_name)
        .bind(&password_hash)
        .bind(Role::Basic.as_str())
        .bind(false)
        .bind(false)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| match e.as_database_error() {
            // Lost the race against a concurrent registration
            Some(db_err) if db_err.is_unique_violation() => {
                MarketError::Duplicate("Email or username already exists".to_string())
            }
            _ => MarketError::Database(e),
        })?;

        Ok(Account {
            id,
            email: req.email.clone(),
            username: req.username.clone(),
            full_name: req.full_name.clone(),
            password_hash,
            role: Role::Basic.as_str().to_string(),
            is_active: false,
            is_verified: false,
            phone: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get account by id
    pub async fn get_account(&self, id: &str) -> MarketResult<Account> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| MarketError::NotFound("User not found".to_string()))
    }

    pub async fn find_by_id(&self, id: &str) -> MarketResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM account WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(account)
    }

    /// Find account by email or username
    pub async fn find_by_identifier(&self, identifier: &str) -> MarketResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM account WHERE email = ?1 OR username = ?1",
        )
        .bind(identifier)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }

    pub async fn find_by_email(&self, email: &str) -> MarketResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM account WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        Ok(account)
    }

    /// Self-service profile update; role and flags cannot change here
    pub async fn update_profile(
        &self,
        id: &str,
        req: &UpdateProfileRequest,
    ) -> MarketResult<ProfileUpdate> {
        let current = self.get_account(id).await?;

        let password_hash = match &req.password {
            Some(plaintext) => {
                Self::validate_password(plaintext)?;
                password::hash(plaintext)?
            }
            None => current.password_hash.clone(),
        };

        let full_name = req.full_name.clone().unwrap_or(current.full_name);
        // Outer None = leave alone, Some(None) = clear
        let phone = match &req.phone {
            Some(value) => value.clone(),
            None => current.phone,
        };
        let avatar_url = match &req.avatar_url {
            Some(value) => value.clone(),
            None => current.avatar_url,
        };
        let now = Utc::now();

        sqlx::query(
            "UPDATE account
             SET full_name = ?1, password_hash = ?2, phone = ?3, avatar_url = ?4, updated_at = ?5
             WHERE id = ?6",
        )
        .bind(&full_name)
        .bind(&password_hash)
        .bind(&phone)
        .bind(&avatar_url)
        .bind(now)
        .bind(id)
        .execute(&self.db)
        .await?;

        let account = self.get_account(id).await?;
        Ok(ProfileUpdate { account })
    }

    /// Admin update; may change role and account flags
    ///
    /// Returns the updated account plus a change summary for the audit
    /// log. The summary lists the fields that were supplied, never the
    /// password hash.
    pub async fn admin_update(
        &self,
        id: &str,
        req: &AdminUpdateRequest,
    ) -> MarketResult<AdminUpdate> {
        let current = self.get_account(id).await?;

        let mut summary = serde_json::Map::new();

        let password_hash = match &req.password {
            Some(plaintext) => {
                Self::validate_password(plaintext)?;
                password::hash(plaintext)?
            }
            None => current.password_hash.clone(),
        };

        let full_name = match &req.full_name {
            Some(v) => {
                summary.insert("full_name".to_string(), serde_json::json!(v));
                v.clone()
            }
            None => current.full_name,
        };
        let phone = match &req.phone {
            Some(v) => {
                summary.insert("phone".to_string(), serde_json::json!(v));
                v.clone()
            }
            None => current.phone,
        };
        let avatar_url = match &req.avatar_url {
            Some(v) => {
                summary.insert("avatar_url".to_string(), serde_json::json!(v));
                v.clone()
            }
            None => current.avatar_url,
        };
        let role = match req.role {
            Some(role) => {
                summary.insert("role".to_string(), serde_json::json!(role));
                role.as_str().to_string()
            }
            None => current.role,
        };
        let is_active = match req.is_active {
            Some(v) => {
                summary.insert("is_active".to_string(), serde_json::json!(v));
                v
            }
            None => current.is_active,
        };
        let is_verified = match req.is_verified {
            Some(v) => {
                summary.insert("is_verified".to_string(), serde_json::json!(v));
                v
            }
            None => current.is_verified,
        };
        let now = Utc::now();

        sqlx::query(
            "UPDATE account
             SET full_name = ?1, password_hash = ?2, phone = ?3, avatar_url = ?4,
                 role = ?5, is_active = ?6, is_verified = ?7, updated_at = ?8
             WHERE id = ?9",
        )
        .bind(&full_name)
        .bind(&password_hash)
        .bind(&phone)
        .bind(&avatar_url)
        .bind(&role)
        .bind(is_active)
        .bind(is_verified)
        .bind(now)
        .bind(id)
        .execute(&self.db)
        .await?;

        let account = self.get_account(id).await?;
        Ok(AdminUpdate {
            account,
            summary: serde_json::Value::Object(summary),
        })
    }

    /// Activate and verify the account matching an email
    ///
    /// Returns the number of rows changed: zero means the account does
    /// not exist or was already verified, and callers treat that as the
    /// redemption failure signal.
    pub async fn mark_verified_and_active(&self, email: &str) -> MarketResult<u64> {
        let result = sqlx::query(
            "UPDATE account SET is_verified = TRUE, is_active = TRUE, updated_at = ?1
             WHERE email = ?2 AND is_verified = FALSE",
        )
        .bind(Utc::now())
        .bind(email)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Replace the stored password hash
    pub async fn set_password_hash(&self, id: &str, password_hash: &str) -> MarketResult<u64> {
        let result = sqlx::query(
            "UPDATE account SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// List accounts with optional role / active filters and paging
    pub async fn list_accounts(&self, query: &ListAccountsQuery) -> MarketResult<Vec<Account>> {
        let limit = query.limit.unwrap_or(100).clamp(1, 500);
        let skip = query.skip.max(0);

        let mut builder =
            sqlx::QueryBuilder::<sqlx::Sqlite>::new("SELECT * FROM account WHERE 1=1");
        if let Some(role) = query.role {
            builder.push(" AND role = ").push_bind(role.as_str());
        }
        if let Some(is_active) = query.is_active {
            builder.push(" AND is_active = ").push_bind(is_active);
        }
        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(skip);

        let accounts = builder
            .build_query_as::<Account>()
            .fetch_all(&self.db)
            .await?;

        Ok(accounts)
    }

    async fn email_exists(&self, email: &str) -> MarketResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    async fn username_exists(&self, username: &str) -> MarketResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE username = ?1")
            .bind(username)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    fn validate_email(email: &str) -> MarketResult<()> {
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(MarketError::Validation("Invalid email format".to_string()));
        }

        Ok(())
    }

    fn validate_username(username: &str) -> MarketResult<()> {
        if username.len() < 3 {
            return Err(MarketError::Validation(
                "Username must be at least 3 characters".to_string(),
            ));
        }

        if username.len() > 64 {
            return Err(MarketError::Validation("Username too long".to_string()));
        }

        if !username.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(MarketError::Validation(
                "Username can only contain letters, numbers, and underscore".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_password(password: &str) -> MarketResult<()> {
        if password.len() < 8 {
            return Err(MarketError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn register_req(email: &str, username: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            username: username.to_string(),
            full_name: "Test User".to_string(),
            password: "password123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_account_starts_inactive_unverified() {
        let manager = AccountManager::new(test_pool().await);

        let account = manager
            .create_account(&register_req("alice@x.com", "alice"))
            .await
            .unwrap();

        assert!(!account.is_active);
        assert!(!account.is_verified);
        assert_eq!(account.role(), Role::Basic);
        assert_ne!(account.password_hash, "password123");
    }

    #[tokio::test]
    async fn test_duplicate_email_and_username_rejected() {
        let manager = AccountManager::new(test_pool().await);
        manager
            .create_account(&register_req("alice@x.com", "alice"))
            .await
            .unwrap();

        let err = manager
            .create_account(&register_req("alice@x.com", "alice2"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Duplicate(_)));

        let err = manager
            .create_account(&register_req("alice2@x.com", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_find_by_identifier_matches_email_and_username() {
        let manager = AccountManager::new(test_pool().await);
        manager
            .create_account(&register_req("alice@x.com", "alice"))
            .await
            .unwrap();

        assert!(manager.find_by_identifier("alice@x.com").await.unwrap().is_some());
        assert!(manager.find_by_identifier("alice").await.unwrap().is_some());
        assert!(manager.find_by_identifier("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_verified_is_single_shot() {
        let manager = AccountManager::new(test_pool().await);
        manager
            .create_account(&register_req("alice@x.com", "alice"))
            .await
            .unwrap();

        assert_eq!(manager.mark_verified_and_active("alice@x.com").await.unwrap(), 1);
        // Second attempt mutates nothing - the replay signal
        assert_eq!(manager.mark_verified_and_active("alice@x.com").await.unwrap(), 0);
        assert_eq!(manager.mark_verified_and_active("ghost@x.com").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_profile_update_can_set_and_clear_phone() {
        let manager = AccountManager::new(test_pool().await);
        let account = manager
            .create_account(&register_req("alice@x.com", "alice"))
            .await
            .unwrap();

        let update = manager
            .update_profile(
                &account.id,
                &UpdateProfileRequest {
                    phone: Some(Some("+15550100".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(update.account.phone.as_deref(), Some("+15550100"));

        // An absent field leaves the value alone
        let update = manager
            .update_profile(&account.id, &UpdateProfileRequest::default())
            .await
            .unwrap();
        assert_eq!(update.account.phone.as_deref(), Some("+15550100"));

        // An explicit null clears it
        let update = manager
            .update_profile(
                &account.id,
                &UpdateProfileRequest {
                    phone: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(update.account.phone, None);
    }

    #[tokio::test]
    async fn test_admin_update_summary_excludes_password() {
        let manager = AccountManager::new(test_pool().await);
        let account = manager
            .create_account(&register_req("alice@x.com", "alice"))
            .await
            .unwrap();

        let update = manager
            .admin_update(
                &account.id,
                &AdminUpdateRequest {
                    role: Some(Role::Seller),
                    is_active: Some(true),
                    password: Some("newpassword1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(update.account.role(), Role::Seller);
        assert!(update.account.is_active);
        assert_eq!(update.summary["role"], "seller");
        assert!(update.summary.get("password").is_none());
        assert!(update.summary.to_string().find("newpassword1").is_none());
    }

    #[tokio::test]
    async fn test_list_accounts_filters() {
        let manager = AccountManager::new(test_pool().await);
        let a = manager
            .create_account(&register_req("a@x.com", "user_a"))
            .await
            .unwrap();
        manager
            .create_account(&register_req("b@x.com", "user_b"))
            .await
            .unwrap();
        manager
            .admin_update(
                &a.id,
                &AdminUpdateRequest {
                    role: Some(Role::Seller),
                    is_active: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let sellers = manager
            .list_accounts(&ListAccountsQuery {
                role: Some(Role::Seller),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(sellers.len(), 1);
        assert_eq!(sellers[0].id, a.id);

        let inactive = manager
            .list_accounts(&ListAccountsQuery {
                is_active: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(inactive.len(), 1);
    }

    #[tokio::test]
    async fn test_weak_password_rejected() {
        let manager = AccountManager::new(test_pool().await);
        let mut req = register_req("alice@x.com", "alice");
        req.password = "short".to_string();

        assert!(matches!(
            manager.create_account(&req).await.unwrap_err(),
            MarketError::Validation(_)
        ));
    }
}
