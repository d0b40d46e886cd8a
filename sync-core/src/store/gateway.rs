//! `sqlx::PgPool`-backed gateway onto the upstream alarm store and this
//! service's own `sync_status`/`sync_log` bookkeeping tables.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::error::{DatabaseError, DatabaseOperation, Error, Result};
use crate::model::{Alarm, AuditLogEntry, AuditOperation, SyncRecord, SyncState, SyncStatistics};

use super::rows::{AlarmRow, AuditLogRow, SyncRecordRow, SyncStatisticsRow};

/// Builds a pool with bounded exponential-backoff retries, the way
/// `acton-service::database::create_pool_with_retries` does: each attempt's
/// delay is `retry_delay_secs * 2^(attempt - 1)`, logged on failure, with the
/// final failure propagated as a startup error.
pub async fn create_pool_with_retries(cfg: &DatabaseConfig) -> Result<PgPool> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match try_create_pool(cfg).await {
            Ok(pool) => return Ok(pool),
            Err(err) if attempt < cfg.max_retries => {
                let delay = Duration::from_secs(cfg.retry_delay_secs * 2u64.pow(attempt.saturating_sub(1)));
                tracing::warn!(
                    attempt,
                    max_retries = cfg.max_retries,
                    delay_secs = delay.as_secs(),
                    url = %sanitize_connection_url(&cfg.url),
                    error = %err,
                    "database pool connection attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn try_create_pool(cfg: &DatabaseConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .min_connections(cfg.min_connections)
        .acquire_timeout(Duration::from_secs(cfg.connection_timeout_secs))
        .connect(&cfg.url)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::new(
                DatabaseOperation::PoolInit,
                crate::error::kind_for(&e),
                e.to_string(),
            ))
        })
}

/// Masks the password portion of a Postgres URL for logging, keeping the
/// username and host visible.
pub fn sanitize_connection_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return "<unparseable-url>".to_string();
    };
    let Some((userinfo, host_and_path)) = rest.split_once('@') else {
        return format!("{scheme}://{rest}");
    };
    match userinfo.split_once(':') {
        Some((user, _password)) => format!("{scheme}://{user}:***@{host_and_path}"),
        None => format!("{scheme}://{userinfo}@{host_and_path}"),
    }
}

/// Shared `SELECT ... FROM nm_alarm_cdr ...` prefix for every query that
/// returns `AlarmRow`s: summary row joined against the alarm code library
/// and the most recent matching event (for event-scoped fields like
/// `data_1..data_10`, `task_type`, `event_time`).
const ALARM_SELECT: &str = r#"
SELECT c.alarm_inst_id, e.event_inst_id, c.alarm_code, k.alarm_name, k.alarm_type_name,
       c.alarm_state, c.alarm_level, c.host_name, c.host_ip, c.device_id,
       c.app_name, c.business_domain, c.environment, e.res_inst_type, e.task_type,
       e.detail_info, k.fault_reason, k.deal_suggest,
       e.event_time, c.create_date, c.confirm_date, c.reset_date, c.clear_date,
       c.clear_reason, c.total_alarm,
       e.data_1, e.data_2, e.data_3, e.data_4, e.data_5,
       e.data_6, e.data_7, e.data_8, e.data_9, e.data_10
FROM nm_alarm_cdr c
LEFT JOIN nm_alarm_code k ON k.alarm_code = c.alarm_code
LEFT JOIN LATERAL (
    SELECT event_inst_id, detail_info, task_type, res_inst_type, event_time,
           data_1, data_2, data_3, data_4, data_5, data_6, data_7, data_8, data_9, data_10
    FROM nm_alarm_event
    WHERE alarm_code = c.alarm_code
    ORDER BY event_inst_id DESC LIMIT 1
) e ON true
"#;

pub struct StoreGateway {
    pool: PgPool,
}

impl StoreGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::new(
                    DatabaseOperation::HealthCheck,
                    crate::error::kind_for(&e),
                    e.to_string(),
                ))
            })?;
        Ok(())
    }

    /// Phase 1: alarms in `U` state with no `sync_status` row yet.
    pub async fn fetch_new_active(&self) -> Result<Vec<Alarm>> {
        let sql = format!(
            "{ALARM_SELECT} LEFT JOIN sync_status s ON s.alarm_id = c.alarm_inst_id \
             WHERE c.alarm_state = 'U' AND s.alarm_id IS NULL"
        );
        let rows: Vec<AlarmRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.db_err(DatabaseOperation::FetchNewActive, e))?;

        rows.into_iter().map(Alarm::try_from).collect()
    }

    /// Phase 2: alarms in `U` state whose `sync_status` row is `RESOLVED` —
    /// a re-fire, since the upstream state has returned to active after this
    /// service had already marked the alarm resolved.
    pub async fn fetch_refired(&self) -> Result<Vec<Alarm>> {
        let sql = format!(
            "{ALARM_SELECT} JOIN sync_status s ON s.alarm_id = c.alarm_inst_id \
             WHERE c.alarm_state = 'U' AND s.sync_state = 'RESOLVED'"
        );
        let rows: Vec<AlarmRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.db_err(DatabaseOperation::FetchRefired, e))?;

        rows.into_iter().map(Alarm::try_from).collect()
    }

    /// Phase 3: alarms whose upstream state has moved away from `U` while the
    /// sync record still shows `FIRING`/`PENDING`/`SILENCED`.
    pub async fn fetch_status_changed(&self) -> Result<Vec<Alarm>> {
        let sql = format!(
            "{ALARM_SELECT} JOIN sync_status s ON s.alarm_id = c.alarm_inst_id \
             WHERE c.alarm_state != 'U' AND s.sync_state IN ('FIRING', 'PENDING', 'SILENCED')"
        );
        let rows: Vec<AlarmRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.db_err(DatabaseOperation::FetchStatusChanged, e))?;

        rows.into_iter().map(Alarm::try_from).collect()
    }

    /// Phase 4: alarms still firing whose `last_push_time` predates `before`.
    pub async fn fetch_heartbeat_due(&self, before: chrono::DateTime<chrono::Utc>) -> Result<Vec<Alarm>> {
        let sql = format!(
            "{ALARM_SELECT} JOIN sync_status s ON s.alarm_id = c.alarm_inst_id \
             WHERE c.alarm_state = 'U' AND s.sync_state IN ('FIRING', 'PENDING') \
             AND (s.last_push_time IS NULL OR s.last_push_time < $1)"
        );
        let rows: Vec<AlarmRow> = sqlx::query_as(&sql)
            .bind(before)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.db_err(DatabaseOperation::FetchHeartbeatDue, e))?;

        rows.into_iter().map(Alarm::try_from).collect()
    }

    /// Phase 5: sync records in `SILENCED` whose alarm has since been
    /// confirmed cleared upstream (`C`), so the suppression can be torn down.
    pub async fn fetch_silences_to_clear(&self) -> Result<Vec<SyncRecord>> {
        let rows: Vec<SyncRecordRow> = sqlx::query_as(
            r#"
            SELECT s.alarm_id, s.sync_state, s.backend_ref, s.suppression_id, s.push_count,
                   s.last_push_time, s.error_count, s.last_error, s.created_at, s.updated_at
            FROM sync_status s
            JOIN nm_alarm_cdr c ON c.alarm_inst_id = s.alarm_id
            WHERE s.sync_state = 'SILENCED' AND c.alarm_state = 'C'
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.db_err(DatabaseOperation::FetchSilencesToClear, e))?;

        Ok(rows.into_iter().map(SyncRecord::from).collect())
    }

    pub async fn insert_sync(&self, alarm_id: i64, state: SyncState, backend_ref: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_status (alarm_id, sync_state, backend_ref, push_count, last_push_time, error_count)
            VALUES ($1, $2, $3, 1, now(), 0)
            "#,
        )
        .bind(alarm_id)
        .bind(state.as_str())
        .bind(backend_ref)
        .execute(&self.pool)
        .await
        .map_err(|e| self.db_err(DatabaseOperation::InsertSync, e))?;
        Ok(())
    }

    pub async fn update_sync_success(
        &self,
        alarm_id: i64,
        state: SyncState,
        backend_ref: Option<&str>,
        bump_push_count: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sync_status
            SET sync_state = $2,
                backend_ref = COALESCE($3, backend_ref),
                push_count = push_count + CASE WHEN $4 THEN 1 ELSE 0 END,
                last_push_time = now(),
                error_count = 0,
                last_error = NULL,
                updated_at = now()
            WHERE alarm_id = $1
            "#,
        )
        .bind(alarm_id)
        .bind(state.as_str())
        .bind(backend_ref)
        .bind(bump_push_count)
        .execute(&self.pool)
        .await
        .map_err(|e| self.db_err(DatabaseOperation::UpdateSyncSuccess, e))?;
        Ok(())
    }

    pub async fn update_sync_error(&self, alarm_id: i64, error_message: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sync_status
            SET sync_state = 'ERROR',
                error_count = error_count + 1,
                last_error = $2,
                updated_at = now()
            WHERE alarm_id = $1
            "#,
        )
        .bind(alarm_id)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| self.db_err(DatabaseOperation::UpdateSyncError, e))?;
        Ok(())
    }

    pub async fn set_suppression(&self, alarm_id: i64, suppression_id: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE sync_status SET suppression_id = $2, updated_at = now() WHERE alarm_id = $1")
            .bind(alarm_id)
            .bind(suppression_id)
            .execute(&self.pool)
            .await
            .map_err(|e| self.db_err(DatabaseOperation::UpdateSyncSuccess, e))?;
        Ok(())
    }

    pub async fn append_audit(
        &self,
        batch_id: &str,
        alarm_id: i64,
        operation: AuditOperation,
        success: bool,
        detail: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO sync_log (batch_id, alarm_id, operation, success, detail) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(batch_id)
        .bind(alarm_id)
        .bind(operation.as_str())
        .bind(success)
        .bind(detail)
        .execute(&self.pool)
        .await
        .map_err(|e| self.db_err(DatabaseOperation::AppendAudit, e))?;
        Ok(())
    }

    pub async fn get_sync_record(&self, alarm_id: i64) -> Result<Option<SyncRecord>> {
        let row: Option<SyncRecordRow> = sqlx::query_as(
            r#"
            SELECT alarm_id, sync_state, backend_ref, suppression_id, push_count,
                   last_push_time, error_count, last_error, created_at, updated_at
            FROM sync_status WHERE alarm_id = $1
            "#,
        )
        .bind(alarm_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| self.db_err(DatabaseOperation::FetchSyncRecord, e))?;

        Ok(row.map(SyncRecord::from))
    }

    pub async fn list_sync_records(&self, state_filter: Option<SyncState>, limit: i64, offset: i64) -> Result<Vec<SyncRecord>> {
        let rows: Vec<SyncRecordRow> = match state_filter {
            Some(state) => sqlx::query_as(
                r#"
                SELECT alarm_id, sync_state, backend_ref, suppression_id, push_count,
                       last_push_time, error_count, last_error, created_at, updated_at
                FROM sync_status WHERE sync_state = $1 ORDER BY updated_at DESC LIMIT $2 OFFSET $3
                "#,
            )
            .bind(state.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query_as(
                r#"
                SELECT alarm_id, sync_state, backend_ref, suppression_id, push_count,
                       last_push_time, error_count, last_error, created_at, updated_at
                FROM sync_status ORDER BY updated_at DESC LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(|e| self.db_err(DatabaseOperation::ListSyncRecords, e))?;

        Ok(rows.into_iter().map(SyncRecord::from).collect())
    }

    pub async fn list_audit_log(
        &self,
        batch_id: Option<&str>,
        alarm_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLogEntry>> {
        let rows: Vec<AuditLogRow> = sqlx::query_as(
            r#"
            SELECT id, batch_id, alarm_id, operation, success, detail, created_at
            FROM sync_log
            WHERE ($1::text IS NULL OR batch_id = $1)
              AND ($2::bigint IS NULL OR alarm_id = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(batch_id)
        .bind(alarm_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.db_err(DatabaseOperation::ListAuditLog, e))?;

        Ok(rows.into_iter().map(AuditLogEntry::from).collect())
    }

    pub async fn get_sync_statistics(&self) -> Result<Vec<SyncStatistics>> {
        let rows: Vec<SyncStatisticsRow> = sqlx::query_as(
            r#"
            SELECT sync_state,
                   COUNT(*) AS alarm_count,
                   MIN(created_at) AS earliest_alarm,
                   MAX(updated_at) AS latest_update,
                   COALESCE(SUM(push_count), 0) AS total_pushes,
                   COALESCE(SUM(error_count), 0) AS total_errors,
                   COUNT(*) FILTER (WHERE error_count > 0) AS alarms_with_errors
            FROM sync_status
            GROUP BY sync_state
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.db_err(DatabaseOperation::FetchStatistics, e))?;

        Ok(rows.into_iter().map(SyncStatistics::from).collect())
    }

    /// Optional `sync_config` override layer, consulted once at reconciler
    /// startup. Never supersedes `figment`-loaded config at runtime.
    pub async fn get_config_value(&self, group: &str, key: &str) -> Result<Option<String>> {
        let value: Option<(String,)> = sqlx::query_as(
            "SELECT value FROM sync_config WHERE group_name = $1 AND key = $2 AND active = true",
        )
        .bind(group)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| self.db_err(DatabaseOperation::FetchConfig, e))?;

        Ok(value.map(|(v,)| v))
    }

    fn db_err(&self, operation: DatabaseOperation, err: sqlx::Error) -> Error {
        let kind = crate::error::kind_for(&err);
        Error::Database(DatabaseError::new(operation, kind, err.to_string()))
    }
}
