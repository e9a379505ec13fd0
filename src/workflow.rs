//! Workflow definition store
//!
//! Definitions and their steps are insert-only; the schema aborts any update
//! or delete. The active definition is named by the single row of
//! `active_workflow`, so activating a new version implicitly deactivates the
//! previous one.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Step, WorkflowDefinition};
use crate::store::{parse_opt_uuid, parse_uuid};

const DEFINITION_COLUMNS: &str = r#"
    d.id, d.version, d.name, d.created_by, d.created_at,
    (d.id IN (SELECT definition_id FROM active_workflow WHERE slot = 1)) AS is_active
"#;

#[derive(Clone)]
pub struct WorkflowStore {
    pool: SqlitePool,
}

impl WorkflowStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The active definition. When none exists yet, the default three-step
    /// definition is persisted and activated first.
    pub async fn get_active(&self) -> Result<WorkflowDefinition> {
        if let Some(id) = self.active_id().await? {
            return self.get(id).await;
        }

        let bootstrapped = self
            .insert_version(
                WorkflowDefinition::DEFAULT_NAME,
                WorkflowDefinition::default_steps(),
                None,
                true,
            )
            .await?;
        match bootstrapped {
            Some(definition) => {
                tracing::info!(
                    definition_id = %definition.id,
                    "Bootstrapped default workflow definition"
                );
                Ok(definition)
            }
            // Another caller set the pointer between our read and our write
            None => match self.active_id().await? {
                Some(id) => self.get(id).await,
                None => Err(AppError::Internal(
                    "Active workflow pointer missing after bootstrap".to_string(),
                )),
            },
        }
    }

    async fn active_id(&self) -> Result<Option<Uuid>> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT definition_id FROM active_workflow WHERE slot = 1")
                .fetch_optional(&self.pool)
                .await?;
        id.map(|id| parse_uuid(&id, "definition_id")).transpose()
    }

    /// Persist a new definition as version `max + 1` and make it active
    pub async fn create_version(
        &self,
        name: &str,
        steps: Vec<Step>,
        created_by: Option<Uuid>,
    ) -> Result<WorkflowDefinition> {
        self.insert_version(name, steps, created_by, false)
            .await?
            .ok_or_else(|| AppError::Internal("Workflow definition was not inserted".to_string()))
    }

    /// Insert and activate a definition. With `only_if_unset`, nothing is
    /// written when a definition is already active and `None` comes back.
    ///
    /// The first statement of the transaction must be the write: a deferred
    /// transaction that reads first gets SQLITE_BUSY on upgrade rather than
    /// waiting for another connection's write lock.
    async fn insert_version(
        &self,
        name: &str,
        steps: Vec<Step>,
        created_by: Option<Uuid>,
        only_if_unset: bool,
    ) -> Result<Option<WorkflowDefinition>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation(
                "Workflow definition name is required".to_string(),
            ));
        }
        WorkflowDefinition::validate_steps(&steps).map_err(AppError::Validation)?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let version: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO workflow_definitions (id, version, name, created_by, created_at)
            SELECT ?, (SELECT COALESCE(MAX(version), 0) + 1 FROM workflow_definitions), ?, ?, ?
            WHERE ? = 0 OR NOT EXISTS (SELECT 1 FROM active_workflow WHERE slot = 1)
            RETURNING version
            "#,
        )
        .bind(id.to_string())
        .bind(name)
        .bind(created_by.map(|u| u.to_string()))
        .bind(now)
        .bind(only_if_unset)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(version) = version else {
            tx.rollback().await?;
            return Ok(None);
        };

        for step in &steps {
            insert_step(&mut tx, id, step).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO active_workflow (slot, definition_id, activated_at)
            VALUES (1, ?, ?)
            ON CONFLICT (slot) DO UPDATE
            SET definition_id = excluded.definition_id, activated_at = excluded.activated_at
            "#,
        )
        .bind(id.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(definition_id = %id, version, "Activated workflow definition");

        Ok(Some(WorkflowDefinition {
            id,
            version,
            name: name.to_string(),
            steps,
            is_active: true,
            created_by,
            created_at: now,
        }))
    }

    pub async fn get(&self, id: Uuid) -> Result<WorkflowDefinition> {
        let sql = format!(
            "SELECT {} FROM workflow_definitions d WHERE d.id = ?",
            DEFINITION_COLUMNS
        );
        let row = sqlx::query_as::<_, DefinitionRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workflow definition {} not found", id)))?;

        let steps = self.steps(id).await?;
        row.into_definition(steps)
    }

    pub async fn get_by_version(&self, version: i64) -> Result<WorkflowDefinition> {
        let sql = format!(
            "SELECT {} FROM workflow_definitions d WHERE d.version = ?",
            DEFINITION_COLUMNS
        );
        let row = sqlx::query_as::<_, DefinitionRow>(&sql)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Workflow definition version {} not found", version))
            })?;

        let id = parse_uuid(&row.id, "definition id")?;
        let steps = self.steps(id).await?;
        row.into_definition(steps)
    }

    /// Every definition, newest version first
    pub async fn list(&self) -> Result<Vec<WorkflowDefinition>> {
        let sql = format!(
            "SELECT {} FROM workflow_definitions d ORDER BY d.version DESC",
            DEFINITION_COLUMNS
        );
        let rows = sqlx::query_as::<_, DefinitionRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        let mut definitions = Vec::with_capacity(rows.len());
        for row in rows {
            let id = parse_uuid(&row.id, "definition id")?;
            let steps = self.steps(id).await?;
            definitions.push(row.into_definition(steps)?);
        }
        Ok(definitions)
    }

    /// Rename an existing definition. The storage layer refuses.
    pub async fn rename(&self, id: Uuid, name: &str) -> Result<()> {
        self.get(id).await?;
        sqlx::query("UPDATE workflow_definitions SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete an existing definition. The storage layer refuses.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.get(id).await?;
        sqlx::query("DELETE FROM workflow_definitions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn steps(&self, definition_id: Uuid) -> Result<Vec<Step>> {
        let rows = sqlx::query_as::<_, StepRow>(
            r#"
            SELECT step_order, name, required_role, action, can_skip, is_active
            FROM workflow_steps
            WHERE definition_id = ?
            ORDER BY step_order ASC
            "#,
        )
        .bind(definition_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}

async fn insert_step(conn: &mut SqliteConnection, definition_id: Uuid, step: &Step) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO workflow_steps (definition_id, step_order, name, required_role, action, can_skip, is_active)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(definition_id.to_string())
    .bind(step.order)
    .bind(&step.name)
    .bind(step.required_role.as_str())
    .bind(step.action.as_str())
    .bind(step.can_skip)
    .bind(step.is_active)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct DefinitionRow {
    id: String,
    version: i64,
    name: String,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    is_active: i64,
}

impl DefinitionRow {
    fn into_definition(self, steps: Vec<Step>) -> Result<WorkflowDefinition> {
        Ok(WorkflowDefinition {
            id: parse_uuid(&self.id, "definition id")?,
            version: self.version,
            name: self.name,
            steps,
            is_active: self.is_active != 0,
            created_by: parse_opt_uuid(self.created_by, "created_by")?,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StepRow {
    step_order: i64,
    name: String,
    required_role: String,
    action: String,
    can_skip: bool,
    is_active: bool,
}

impl TryFrom<StepRow> for Step {
    type Error = AppError;

    fn try_from(row: StepRow) -> Result<Self> {
        Ok(Step {
            order: row.step_order,
            name: row.name,
            required_role: row
                .required_role
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid step role: {}", e)))?,
            action: row
                .action
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid step action: {}", e)))?,
            can_skip: row.can_skip,
            is_active: row.is_active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, StepAction};
    use crate::store;

    async fn setup() -> WorkflowStore {
        let pool = store::open("sqlite::memory:", 1)
            .await
            .expect("Failed to create in-memory database");
        WorkflowStore::new(pool)
    }

    fn four_steps() -> Vec<Step> {
        let mut review = Step::new(3, "Senior Review", Role::SeniorFinance, StepAction::Review);
        review.can_skip = true;
        vec![
            Step::new(1, "Draft", Role::Legal, StepAction::Submit),
            Step::new(2, "Finance", Role::Finance, StepAction::Approve),
            review,
            Step::new(4, "Client", Role::Client, StepAction::FinalApprove),
        ]
    }

    #[tokio::test]
    async fn test_get_active_bootstraps_default() {
        let store = setup().await;
        let active = store.get_active().await.unwrap();
        assert_eq!(active.version, 1);
        assert!(active.is_active);
        assert_eq!(active.steps, WorkflowDefinition::default_steps());

        // Second call returns the same row instead of creating another
        let again = store.get_active().await.unwrap();
        assert_eq!(again.id, active.id);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_version_deactivates_previous() {
        let store = setup().await;
        let v1 = store.get_active().await.unwrap();
        let v2 = store
            .create_version("With senior review", four_steps(), None)
            .await
            .unwrap();
        assert_eq!(v2.version, 2);

        let active = store.get_active().await.unwrap();
        assert_eq!(active.id, v2.id);
        assert_eq!(active.steps.len(), 4);
        assert!(active.steps[2].can_skip);

        let old = store.get(v1.id).await.unwrap();
        assert!(!old.is_active);

        let all = store.list().await.unwrap();
        assert_eq!(all.iter().filter(|d| d.is_active).count(), 1);
    }

    #[tokio::test]
    async fn test_get_by_version() {
        let store = setup().await;
        store.get_active().await.unwrap();
        let v2 = store.create_version("Second", four_steps(), None).await.unwrap();
        assert_eq!(store.get_by_version(2).await.unwrap().id, v2.id);
        assert!(matches!(
            store.get_by_version(7).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_create_version_validates_steps() {
        let store = setup().await;
        let err = store
            .create_version("Broken", vec![], None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = store
            .create_version(" ", WorkflowDefinition::default_steps(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_definitions_are_immutable() {
        let store = setup().await;
        let active = store.get_active().await.unwrap();

        let err = store.rename(active.id, "Renamed").await.unwrap_err();
        assert!(matches!(err, AppError::ImmutableResource(_)));

        let err = store.delete(active.id).await.unwrap_err();
        assert!(matches!(err, AppError::ImmutableResource(_)));

        let err: AppError = sqlx::query("UPDATE workflow_steps SET required_role = 'admin'")
            .execute(&store.pool)
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::ImmutableResource(_)));

        let unchanged = store.get(active.id).await.unwrap();
        assert_eq!(unchanged.name, WorkflowDefinition::DEFAULT_NAME);
    }

    #[tokio::test]
    async fn test_delete_unknown_definition() {
        let store = setup().await;
        let err = store.delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    /// A file-backed pool, so that concurrent writers really use separate
    /// connections
    async fn setup_shared() -> (WorkflowStore, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("contract-flow-{}.db", Uuid::new_v4()));
        let pool = store::open(&format!("sqlite://{}", path.display()), 8)
            .await
            .expect("Failed to create file database");
        (WorkflowStore::new(pool), path)
    }

    fn cleanup(path: &std::path::Path) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_version_across_connections() {
        let (store, path) = setup_shared().await;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .create_version(&format!("Revision {}", i), four_steps(), None)
                        .await
                })
            })
            .collect();

        let mut versions = Vec::new();
        for handle in handles {
            versions.push(handle.await.unwrap().unwrap().version);
        }
        versions.sort_unstable();
        assert_eq!(versions, (1..=8).collect::<Vec<i64>>());

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 8);
        assert_eq!(all.iter().filter(|d| d.is_active).count(), 1);

        store.pool.close().await;
        cleanup(&path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bootstrap_creates_one_definition() {
        let (store, path) = setup_shared().await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.get_active().await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(store.list().await.unwrap().len(), 1);

        store.pool.close().await;
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_active_pointer_has_single_slot() {
        let store = setup().await;
        let active = store.get_active().await.unwrap();
        let err = sqlx::query("INSERT INTO active_workflow (slot, definition_id) VALUES (2, ?)")
            .bind(active.id.to_string())
            .execute(&store.pool)
            .await;
        assert!(err.is_err());
    }
}
