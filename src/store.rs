//! Database store for contracts and contract versions

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Contract, ContractStatus, ContractVersion, Terms};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connect to `database_url` and bring the schema up to date
pub async fn open(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| AppError::Internal(format!("Invalid {} UUID: {}", column, e)))
}

pub(crate) fn parse_opt_uuid(value: Option<String>, column: &str) -> Result<Option<Uuid>> {
    value.map(|v| parse_uuid(&v, column)).transpose()
}

const VERSION_COLUMNS: &str = r#"
    id, contract_id, version_number, name, counterpart_email, effective_date, amount,
    status, is_current, approved_by_finance, finance_approved_at, approved_by_client,
    client_approved_at, rejected_by, rejected_at, remarks_internal, remarks_client,
    client_remark, rejection_remarks, remarks_sent_to_client_at, cancelled_by,
    cancelled_at, cancellation_reason, created_at, updated_at
"#;

/// Database store
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start the transaction a state transition commits in
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    // Contract operations

    pub async fn insert_contract(&self, conn: &mut SqliteConnection, contract: &Contract) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO contracts (id, client_id, creator_id, workflow_definition_id, workflow_version,
                                   current_version, current_step, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(contract.id.to_string())
        .bind(contract.client_id.to_string())
        .bind(contract.creator_id.to_string())
        .bind(contract.workflow_definition_id.to_string())
        .bind(contract.workflow_version)
        .bind(contract.current_version)
        .bind(contract.current_step)
        .bind(contract.created_at)
        .bind(contract.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn get_contract(&self, id: Uuid) -> Result<Contract> {
        let row = sqlx::query_as::<_, ContractRow>(
            r#"
            SELECT id, client_id, creator_id, workflow_definition_id, workflow_version,
                   current_version, current_step, created_at, updated_at
            FROM contracts
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Contract {} not found", id)))?;

        row.try_into()
    }

    /// Move the contract's version counter and step pointer. The write only
    /// lands if the counter still equals `expected_version`.
    pub async fn advance_contract(
        &self,
        conn: &mut SqliteConnection,
        contract_id: Uuid,
        expected_version: i64,
        new_version: i64,
        current_step: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE contracts
            SET current_version = ?, current_step = ?, updated_at = ?
            WHERE id = ? AND current_version = ?
            "#,
        )
        .bind(new_version)
        .bind(current_step)
        .bind(Utc::now())
        .bind(contract_id.to_string())
        .bind(expected_version)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidState(format!(
                "Contract {} moved past version {}",
                contract_id, expected_version
            )));
        }
        Ok(())
    }

    // Version operations

    pub async fn insert_version(
        &self,
        conn: &mut SqliteConnection,
        version: &ContractVersion,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO contract_versions (id, contract_id, version_number, name, counterpart_email,
                                           effective_date, amount, status, is_current, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(version.id.to_string())
        .bind(version.contract_id.to_string())
        .bind(version.version_number)
        .bind(&version.terms.name)
        .bind(&version.terms.counterpart_email)
        .bind(version.terms.effective_date)
        .bind(version.terms.amount)
        .bind(version.status.as_str())
        .bind(version.is_current)
        .bind(version.created_at)
        .bind(version.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Persist every mutable column of `version`, provided the stored row is
    /// still current and still in `expected` status. Losing a race surfaces
    /// as `InvalidState`.
    pub async fn update_version(
        &self,
        conn: &mut SqliteConnection,
        version: &ContractVersion,
        expected: ContractStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE contract_versions
            SET name = ?, counterpart_email = ?, effective_date = ?, amount = ?, status = ?,
                approved_by_finance = ?, finance_approved_at = ?,
                approved_by_client = ?, client_approved_at = ?,
                rejected_by = ?, rejected_at = ?,
                remarks_internal = ?, remarks_client = ?, client_remark = ?, rejection_remarks = ?,
                remarks_sent_to_client_at = ?,
                cancelled_by = ?, cancelled_at = ?, cancellation_reason = ?,
                updated_at = ?
            WHERE id = ? AND status = ? AND is_current = 1
            "#,
        )
        .bind(&version.terms.name)
        .bind(&version.terms.counterpart_email)
        .bind(version.terms.effective_date)
        .bind(version.terms.amount)
        .bind(version.status.as_str())
        .bind(version.approved_by_finance.map(|u| u.to_string()))
        .bind(version.finance_approved_at)
        .bind(version.approved_by_client.map(|u| u.to_string()))
        .bind(version.client_approved_at)
        .bind(version.rejected_by.map(|u| u.to_string()))
        .bind(version.rejected_at)
        .bind(&version.remarks_internal)
        .bind(&version.remarks_client)
        .bind(&version.client_remark)
        .bind(&version.rejection_remarks)
        .bind(version.remarks_sent_to_client_at)
        .bind(version.cancelled_by.map(|u| u.to_string()))
        .bind(version.cancelled_at)
        .bind(&version.cancellation_reason)
        .bind(version.updated_at)
        .bind(version.id.to_string())
        .bind(expected.as_str())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidState(format!(
                "Version {} is no longer {}",
                version.id,
                expected.as_str()
            )));
        }
        Ok(())
    }

    /// Clear the current flag of a version that is still in `expected` status
    pub async fn retire_version(
        &self,
        conn: &mut SqliteConnection,
        version_id: Uuid,
        expected: ContractStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE contract_versions
            SET is_current = 0, updated_at = ?
            WHERE id = ? AND status = ? AND is_current = 1
            "#,
        )
        .bind(Utc::now())
        .bind(version_id.to_string())
        .bind(expected.as_str())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidState(format!(
                "Version {} is no longer current and {}",
                version_id,
                expected.as_str()
            )));
        }
        Ok(())
    }

    pub async fn get_current_version(&self, contract_id: Uuid) -> Result<ContractVersion> {
        let sql = format!(
            "SELECT {} FROM contract_versions WHERE contract_id = ? AND is_current = 1",
            VERSION_COLUMNS
        );
        let row = sqlx::query_as::<_, VersionRow>(&sql)
            .bind(contract_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No current version for contract {}", contract_id))
            })?;

        row.try_into()
    }

    pub async fn get_version(&self, contract_id: Uuid, version_number: i64) -> Result<ContractVersion> {
        let sql = format!(
            "SELECT {} FROM contract_versions WHERE contract_id = ? AND version_number = ?",
            VERSION_COLUMNS
        );
        let row = sqlx::query_as::<_, VersionRow>(&sql)
            .bind(contract_id.to_string())
            .bind(version_number)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Version {} of contract {} not found",
                    version_number, contract_id
                ))
            })?;

        row.try_into()
    }

    /// All versions of a contract, oldest first
    pub async fn list_versions(&self, contract_id: Uuid) -> Result<Vec<ContractVersion>> {
        let sql = format!(
            "SELECT {} FROM contract_versions WHERE contract_id = ? ORDER BY version_number ASC",
            VERSION_COLUMNS
        );
        let rows = sqlx::query_as::<_, VersionRow>(&sql)
            .bind(contract_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}

// Internal row types for sqlx

#[derive(sqlx::FromRow)]
struct ContractRow {
    id: String,
    client_id: String,
    creator_id: String,
    workflow_definition_id: String,
    workflow_version: i64,
    current_version: i64,
    current_step: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContractRow> for Contract {
    type Error = AppError;

    fn try_from(row: ContractRow) -> Result<Self> {
        Ok(Contract {
            id: parse_uuid(&row.id, "contract id")?,
            client_id: parse_uuid(&row.client_id, "client_id")?,
            creator_id: parse_uuid(&row.creator_id, "creator_id")?,
            workflow_definition_id: parse_uuid(
                &row.workflow_definition_id,
                "workflow_definition_id",
            )?,
            workflow_version: row.workflow_version,
            current_version: row.current_version,
            current_step: row.current_step,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VersionRow {
    id: String,
    contract_id: String,
    version_number: i64,
    name: String,
    counterpart_email: Option<String>,
    effective_date: Option<NaiveDate>,
    amount: Option<i64>,
    status: String,
    is_current: bool,
    approved_by_finance: Option<String>,
    finance_approved_at: Option<DateTime<Utc>>,
    approved_by_client: Option<String>,
    client_approved_at: Option<DateTime<Utc>>,
    rejected_by: Option<String>,
    rejected_at: Option<DateTime<Utc>>,
    remarks_internal: Option<String>,
    remarks_client: Option<String>,
    client_remark: Option<String>,
    rejection_remarks: Option<String>,
    remarks_sent_to_client_at: Option<DateTime<Utc>>,
    cancelled_by: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<VersionRow> for ContractVersion {
    type Error = AppError;

    fn try_from(row: VersionRow) -> Result<Self> {
        Ok(ContractVersion {
            id: parse_uuid(&row.id, "version id")?,
            contract_id: parse_uuid(&row.contract_id, "contract_id")?,
            version_number: row.version_number,
            terms: Terms {
                name: row.name,
                counterpart_email: row.counterpart_email,
                effective_date: row.effective_date,
                amount: row.amount,
            },
            status: row
                .status
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid status: {}", e)))?,
            is_current: row.is_current,
            approved_by_finance: parse_opt_uuid(row.approved_by_finance, "approved_by_finance")?,
            finance_approved_at: row.finance_approved_at,
            approved_by_client: parse_opt_uuid(row.approved_by_client, "approved_by_client")?,
            client_approved_at: row.client_approved_at,
            rejected_by: parse_opt_uuid(row.rejected_by, "rejected_by")?,
            rejected_at: row.rejected_at,
            remarks_internal: row.remarks_internal,
            remarks_client: row.remarks_client,
            client_remark: row.client_remark,
            rejection_remarks: row.rejection_remarks,
            remarks_sent_to_client_at: row.remarks_sent_to_client_at,
            cancelled_by: parse_opt_uuid(row.cancelled_by, "cancelled_by")?,
            cancelled_at: row.cancelled_at,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
