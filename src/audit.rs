//! Append-only audit ledger
//!
//! The only write path is [`AuditLedger::append`] / [`AuditLedger::append_in`].
//! Updates and deletes are aborted by triggers on `audit_entries`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Actor, AuditAction, AuditEntry, Role};
use crate::store::{parse_opt_uuid, parse_uuid};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

/// An audit entry that has not been written yet
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub contract_id: Uuid,
    pub version_id: Option<Uuid>,
    pub action: AuditAction,
    pub actor: Actor,
    pub remarks: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewAuditEntry {
    pub fn new(contract_id: Uuid, action: AuditAction, actor: &Actor) -> Self {
        Self {
            contract_id,
            version_id: None,
            action,
            actor: *actor,
            remarks: None,
            metadata: None,
        }
    }

    pub fn version(mut self, version_id: Uuid) -> Self {
        self.version_id = Some(version_id);
        self
    }

    pub fn remarks(mut self, remarks: Option<String>) -> Self {
        self.remarks = remarks;
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Filters for reading the ledger. Unset filters match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub contract_id: Option<Uuid>,
    #[serde(default)]
    pub actor_id: Option<Uuid>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl AuditQuery {
    pub fn contract(contract_id: Uuid) -> Self {
        Self {
            contract_id: Some(contract_id),
            ..Default::default()
        }
    }

    /// Reject pagination values no page can satisfy. Limits above the
    /// maximum are clamped by [`AuditLedger::list`] rather than refused.
    pub fn validate(&self) -> Result<()> {
        if matches!(self.limit, Some(limit) if limit < 1) {
            return Err(AppError::BadRequest("limit must be at least 1".to_string()));
        }
        if matches!(self.offset, Some(offset) if offset < 0) {
            return Err(AppError::BadRequest("offset must not be negative".to_string()));
        }
        Ok(())
    }

    fn page(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Clone)]
pub struct AuditLedger {
    pool: SqlitePool,
}

impl AuditLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an entry on its own connection
    pub async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry> {
        let mut conn = self.pool.acquire().await?;
        self.append_in(&mut conn, entry).await
    }

    /// Append an entry inside the caller's transaction
    pub async fn append_in(
        &self,
        conn: &mut SqliteConnection,
        entry: NewAuditEntry,
    ) -> Result<AuditEntry> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let metadata = entry
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::Internal(format!("Invalid audit metadata: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO audit_entries (id, contract_id, version_id, action, actor_id, role, remarks, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(entry.contract_id.to_string())
        .bind(entry.version_id.map(|u| u.to_string()))
        .bind(entry.action.as_str())
        .bind(entry.actor.id.to_string())
        .bind(entry.actor.role.as_str())
        .bind(&entry.remarks)
        .bind(metadata)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(AuditEntry {
            id,
            contract_id: entry.contract_id,
            version_id: entry.version_id,
            action: entry.action,
            actor_id: entry.actor.id,
            role: entry.actor.role,
            remarks: entry.remarks,
            metadata: entry.metadata,
            created_at: now,
        })
    }

    /// Entries matching `query`, in append order
    pub async fn list(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>> {
        let (limit, offset) = query.page();
        let contract_id = query.contract_id.map(|u| u.to_string());
        let actor_id = query.actor_id.map(|u| u.to_string());
        let role = query.role.map(|r| r.as_str());

        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, contract_id, version_id, action, actor_id, role, remarks, metadata, created_at
            FROM audit_entries
            WHERE (? IS NULL OR contract_id = ?)
              AND (? IS NULL OR actor_id = ?)
              AND (? IS NULL OR role = ?)
            ORDER BY seq ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&contract_id)
        .bind(&contract_id)
        .bind(&actor_id)
        .bind(&actor_id)
        .bind(role)
        .bind(role)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn for_contract(&self, contract_id: Uuid) -> Result<Vec<AuditEntry>> {
        self.list(&AuditQuery {
            limit: Some(MAX_PAGE_SIZE),
            ..AuditQuery::contract(contract_id)
        })
        .await
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: String,
    contract_id: String,
    version_id: Option<String>,
    action: String,
    actor_id: String,
    role: String,
    remarks: Option<String>,
    metadata: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = AppError;

    fn try_from(row: AuditRow) -> Result<Self> {
        let metadata = row
            .metadata
            .map(|m| serde_json::from_str(&m))
            .transpose()
            .map_err(|e| AppError::Internal(format!("Invalid audit metadata: {}", e)))?;

        Ok(AuditEntry {
            id: parse_uuid(&row.id, "audit id")?,
            contract_id: parse_uuid(&row.contract_id, "contract_id")?,
            version_id: parse_opt_uuid(row.version_id, "version_id")?,
            action: row
                .action
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid audit action: {}", e)))?,
            actor_id: parse_uuid(&row.actor_id, "actor_id")?,
            role: row
                .role
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid role: {}", e)))?,
            remarks: row.remarks,
            metadata,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Directory;
    use crate::store;

    struct Fixture {
        ledger: AuditLedger,
        pool: SqlitePool,
        legal: Actor,
        finance: Actor,
        contract_id: Uuid,
    }

    async fn setup() -> Fixture {
        let pool = store::open("sqlite::memory:", 1)
            .await
            .expect("Failed to create in-memory database");
        let directory = Directory::new(pool.clone());
        let workflow = crate::workflow::WorkflowStore::new(pool.clone())
            .get_active()
            .await
            .unwrap();

        let legal = directory.register("Lena", Role::Legal).await.unwrap();
        let finance = directory.register("Fay", Role::Finance).await.unwrap();
        let client = directory.register("Acme", Role::Client).await.unwrap();

        let contract_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO contracts (id, client_id, creator_id, workflow_definition_id, workflow_version)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(contract_id.to_string())
        .bind(client.id.to_string())
        .bind(legal.id.to_string())
        .bind(workflow.id.to_string())
        .bind(workflow.version)
        .execute(&pool)
        .await
        .unwrap();

        Fixture {
            ledger: AuditLedger::new(pool.clone()),
            pool,
            legal: legal.actor(),
            finance: finance.actor(),
            contract_id,
        }
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let fx = setup().await;
        let written = fx
            .ledger
            .append(
                NewAuditEntry::new(fx.contract_id, AuditAction::Created, &fx.legal)
                    .remarks(Some("first draft".into()))
                    .metadata(serde_json::json!({"version": 1})),
            )
            .await
            .unwrap();

        let entries = fx.ledger.for_contract(fx.contract_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, written.id);
        assert_eq!(entries[0].role, Role::Legal);
        assert_eq!(entries[0].remarks.as_deref(), Some("first draft"));
        assert_eq!(entries[0].metadata, Some(serde_json::json!({"version": 1})));
    }

    #[tokio::test]
    async fn test_filters_and_pagination() {
        let fx = setup().await;
        for _ in 0..3 {
            fx.ledger
                .append(NewAuditEntry::new(fx.contract_id, AuditAction::Updated, &fx.legal))
                .await
                .unwrap();
        }
        fx.ledger
            .append(NewAuditEntry::new(fx.contract_id, AuditAction::Approved, &fx.finance))
            .await
            .unwrap();

        let by_actor = fx
            .ledger
            .list(&AuditQuery {
                actor_id: Some(fx.finance.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_actor.len(), 1);
        assert_eq!(by_actor[0].action, AuditAction::Approved);

        let by_role = fx
            .ledger
            .list(&AuditQuery {
                role: Some(Role::Legal),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_role.len(), 3);

        let page = fx
            .ledger
            .list(&AuditQuery {
                limit: Some(2),
                offset: Some(2),
                ..AuditQuery::contract(fx.contract_id)
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[1].action, AuditAction::Approved);

        let none = fx
            .ledger
            .list(&AuditQuery::contract(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_query_validation() {
        assert!(AuditQuery::default().validate().is_ok());
        let big = AuditQuery {
            limit: Some(MAX_PAGE_SIZE * 4),
            ..Default::default()
        };
        assert!(big.validate().is_ok());
        assert_eq!(big.page(), (MAX_PAGE_SIZE, 0));

        for query in [
            AuditQuery {
                limit: Some(0),
                ..Default::default()
            },
            AuditQuery {
                offset: Some(-1),
                ..Default::default()
            },
        ] {
            assert!(matches!(query.validate(), Err(AppError::BadRequest(_))));
        }
    }

    #[tokio::test]
    async fn test_entries_cannot_be_updated_or_deleted() {
        let fx = setup().await;
        let entry = fx
            .ledger
            .append(NewAuditEntry::new(fx.contract_id, AuditAction::Created, &fx.legal))
            .await
            .unwrap();

        let err: AppError = sqlx::query("UPDATE audit_entries SET remarks = 'edited' WHERE id = ?")
            .bind(entry.id.to_string())
            .execute(&fx.pool)
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::ImmutableResource(_)));

        let err: AppError = sqlx::query("DELETE FROM audit_entries")
            .execute(&fx.pool)
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::ImmutableResource(_)));

        let entries = fx.ledger.for_contract(fx.contract_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].remarks.is_none());
    }
}
