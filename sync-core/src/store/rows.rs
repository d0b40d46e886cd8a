//! Typed row shapes returned by the store gateway's `sqlx` queries.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::model::{Alarm, AuditLogEntry, AuditOperation, SyncRecord, SyncState, SyncStatistics, UpstreamState};

/// Joined view of `nm_alarm_cdr` + latest `nm_alarm_event` + `nm_alarm_code`
/// + device/domain metadata, as the gateway's read queries return it.
#[derive(Debug, FromRow)]
pub struct AlarmRow {
    pub alarm_inst_id: i64,
    pub event_inst_id: Option<i64>,
    pub alarm_code: String,
    pub alarm_name: Option<String>,
    pub alarm_type_name: Option<String>,
    pub alarm_state: String,
    pub alarm_level: String,
    pub host_name: Option<String>,
    pub host_ip: Option<String>,
    pub device_id: Option<i64>,
    pub app_name: Option<String>,
    pub business_domain: Option<String>,
    pub environment: Option<String>,
    pub res_inst_type: Option<String>,
    pub task_type: Option<String>,
    pub detail_info: Option<String>,
    pub fault_reason: Option<String>,
    pub deal_suggest: Option<String>,
    pub event_time: Option<DateTime<Utc>>,
    pub create_date: Option<DateTime<Utc>>,
    pub confirm_date: Option<DateTime<Utc>>,
    pub reset_date: Option<DateTime<Utc>>,
    pub clear_date: Option<DateTime<Utc>>,
    pub clear_reason: Option<String>,
    pub total_alarm: i64,
    pub data_1: Option<String>,
    pub data_2: Option<String>,
    pub data_3: Option<String>,
    pub data_4: Option<String>,
    pub data_5: Option<String>,
    pub data_6: Option<String>,
    pub data_7: Option<String>,
    pub data_8: Option<String>,
    pub data_9: Option<String>,
    pub data_10: Option<String>,
}

impl TryFrom<AlarmRow> for Alarm {
    type Error = crate::error::Error;

    fn try_from(row: AlarmRow) -> Result<Self, Self::Error> {
        let state = UpstreamState::from_code(&row.alarm_state).ok_or_else(|| {
            crate::error::Error::Mapper(format!("unknown alarm_state code: {}", row.alarm_state))
        })?;
        Ok(Alarm {
            alarm_id: row.alarm_inst_id,
            event_id: row.event_inst_id,
            alarm_code: row.alarm_code,
            alarm_name: row.alarm_name,
            alarm_type_name: row.alarm_type_name,
            state,
            level: row.alarm_level,
            host_name: row.host_name,
            host_ip: row.host_ip,
            device_id: row.device_id,
            app_name: row.app_name,
            business_domain: row.business_domain,
            environment: row.environment,
            resource_type: row.res_inst_type,
            task_type: row.task_type,
            detail: row.detail_info,
            fault_reason: row.fault_reason,
            suggestion: row.deal_suggest,
            event_time: row.event_time,
            create_date: row.create_date,
            confirm_date: row.confirm_date,
            reset_date: row.reset_date,
            clear_date: row.clear_date,
            clear_reason: row.clear_reason,
            total_alarm: row.total_alarm,
            data_1: row.data_1,
            data_2: row.data_2,
            data_3: row.data_3,
            data_4: row.data_4,
            data_5: row.data_5,
            data_6: row.data_6,
            data_7: row.data_7,
            data_8: row.data_8,
            data_9: row.data_9,
            data_10: row.data_10,
        })
    }
}

/// Row shape for `sync_status`.
#[derive(Debug, FromRow)]
pub struct SyncRecordRow {
    pub alarm_id: i64,
    pub sync_state: String,
    pub backend_ref: Option<String>,
    pub suppression_id: Option<String>,
    pub push_count: i64,
    pub last_push_time: Option<DateTime<Utc>>,
    pub error_count: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shape for `sync_log`.
#[derive(Debug, FromRow)]
pub struct AuditLogRow {
    pub id: i64,
    pub batch_id: String,
    pub alarm_id: i64,
    pub operation: String,
    pub success: bool,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row shape for the `get_sync_statistics()` aggregate query.
#[derive(Debug, FromRow)]
pub struct SyncStatisticsRow {
    pub sync_state: String,
    pub alarm_count: i64,
    pub earliest_alarm: Option<DateTime<Utc>>,
    pub latest_update: Option<DateTime<Utc>>,
    pub total_pushes: i64,
    pub total_errors: i64,
    pub alarms_with_errors: i64,
}

fn parse_sync_state(raw: &str) -> SyncState {
    match raw {
        "FIRING" | "PENDING" => SyncState::Firing,
        "RESOLVED" => SyncState::Resolved,
        "SILENCED" => SyncState::Silenced,
        "ERROR" => SyncState::Error,
        _ => SyncState::Error,
    }
}

fn parse_audit_operation(raw: &str) -> AuditOperation {
    match raw {
        "PUSH_FIRING" => AuditOperation::PushFiring,
        "PUSH_RESOLVED" => AuditOperation::PushResolved,
        "PUSH_REFIRED" => AuditOperation::PushRefired,
        "HEARTBEAT" => AuditOperation::Heartbeat,
        "CREATE_SILENCE" => AuditOperation::CreateSilence,
        "DELETE_SILENCE" => AuditOperation::DeleteSilence,
        "PUSH_RESOLVED_FOR_SILENCE" => AuditOperation::PushResolvedForSilence,
        _ => AuditOperation::Error,
    }
}

impl From<SyncRecordRow> for SyncRecord {
    fn from(row: SyncRecordRow) -> Self {
        SyncRecord {
            alarm_id: row.alarm_id,
            sync_state: parse_sync_state(&row.sync_state),
            backend_ref: row.backend_ref,
            suppression_id: row.suppression_id,
            push_count: row.push_count,
            last_push_time: row.last_push_time,
            error_count: row.error_count,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<AuditLogRow> for AuditLogEntry {
    fn from(row: AuditLogRow) -> Self {
        AuditLogEntry {
            id: row.id,
            batch_id: row.batch_id,
            alarm_id: row.alarm_id,
            operation: parse_audit_operation(&row.operation),
            success: row.success,
            detail: row.detail,
            created_at: row.created_at,
        }
    }
}

impl From<SyncStatisticsRow> for SyncStatistics {
    fn from(row: SyncStatisticsRow) -> Self {
        SyncStatistics {
            sync_state: parse_sync_state(&row.sync_state),
            alarm_count: row.alarm_count,
            earliest_alarm: row.earliest_alarm,
            latest_update: row.latest_update,
            total_pushes: row.total_pushes,
            total_errors: row.total_errors,
            alarms_with_errors: row.alarms_with_errors,
        }
    }
}
