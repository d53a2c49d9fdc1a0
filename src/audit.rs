/// Append-only audit log for privileged mutations
///
/// Every admin mutation of another account leaves a record of who
/// changed what. Entries are written inline with the mutation and never
/// updated or deleted.
use crate::{
    db::models::AuditLogEntry,
    error::MarketResult,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Audit log query filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogQuery {
    #[serde(default)]
    pub skip: i64,
    pub limit: Option<i64>,
    pub action: Option<String>,
    pub account_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Audit log service
pub struct AuditLog {
    db: SqlitePool,
}

impl AuditLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Record a privileged action
    pub async fn record(
        &self,
        action: &str,
        account_id: &str,
        admin_id: &str,
        details: serde_json::Value,
    ) -> MarketResult<()> {
        sqlx::query(
            "INSERT INTO audit_log (id, action, account_id, admin_id, details, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(action)
        .bind(account_id)
        .bind(admin_id)
        .bind(details.to_string())
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        tracing::info!(%action, %account_id, %admin_id, "Audit entry recorded");
        Ok(())
    }

    /// List audit entries, newest first
    pub async fn list(&self, query: &AuditLogQuery) -> MarketResult<Vec<AuditLogEntry>> {
        let limit = query.limit.unwrap_or(100).clamp(1, 500);
        let skip = query.skip.max(0);

        let mut builder =
            sqlx::QueryBuilder::<sqlx::Sqlite>::new("SELECT * FROM audit_log WHERE 1=1");
        if let Some(action) = &query.action {
            builder.push(" AND action = ").push_bind(action);
        }
        if let Some(account_id) = &query.account_id {
            builder.push(" AND account_id = ").push_bind(account_id);
        }
        if let Some(since) = query.since {
            builder.push(" AND timestamp >= ").push_bind(since);
        }
        if let Some(until) = query.until {
            builder.push(" AND timestamp <= ").push_bind(until);
        }
        builder
            .push(" ORDER BY timestamp DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(skip);

        let entries = builder
            .build_query_as::<AuditLogEntry>()
            .fetch_all(&self.db)
            .await?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_record_and_list() {
        let audit = AuditLog::new(test_pool().await);

        audit
            .record(
                "admin_update_user",
                "target-1",
                "admin-1",
                serde_json::json!({"role": "seller"}),
            )
            .await
            .unwrap();
        audit
            .record("admin_update_user", "target-2", "admin-1", serde_json::json!({}))
            .await
            .unwrap();

        let all = audit.list(&AuditLogQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let filtered = audit
            .list(&AuditLogQuery {
                account_id: Some("target-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].details, r#"{"role":"seller"}"#);
    }

    #[tokio::test]
    async fn test_action_filter_and_paging() {
        let audit = AuditLog::new(test_pool().await);
        for i in 0..5 {
            audit
                .record("admin_update_user", &format!("t-{}", i), "admin-1", serde_json::json!({}))
                .await
                .unwrap();
        }

        let page = audit
            .list(&AuditLogQuery {
                limit: Some(2),
                skip: 2,
                action: Some("admin_update_user".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);

        let none = audit
            .list(&AuditLogQuery {
                action: Some("other_action".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
