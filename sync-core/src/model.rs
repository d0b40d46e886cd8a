//! Upstream alarm model, sync-side records and notification types.
//!
//! `Alarm` is read-only: it mirrors rows joined out of the upstream
//! summary/event/code tables and is never written back. Everything else
//! here belongs to this service's own bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Upstream alarm lifecycle state (`nm_alarm_cdr.alarm_state`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpstreamState {
    /// Unconfirmed / active.
    #[serde(rename = "U")]
    Unconfirmed,
    /// Auto-recovered.
    #[serde(rename = "A")]
    AutoRecovered,
    /// Manually cleared.
    #[serde(rename = "M")]
    ManuallyCleared,
    /// Confirmed cleared.
    #[serde(rename = "C")]
    Confirmed,
}

impl UpstreamState {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "U" => Some(Self::Unconfirmed),
            "A" => Some(Self::AutoRecovered),
            "M" => Some(Self::ManuallyCleared),
            "C" => Some(Self::Confirmed),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unconfirmed => "U",
            Self::AutoRecovered => "A",
            Self::ManuallyCleared => "M",
            Self::Confirmed => "C",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Unconfirmed)
    }

    pub fn is_recovery(&self) -> bool {
        matches!(self, Self::AutoRecovered | Self::ManuallyCleared | Self::Confirmed)
    }
}

impl fmt::Display for UpstreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Read-only view of an upstream alarm, joined from `nm_alarm_cdr` /
/// `nm_alarm_event` / `nm_alarm_code` plus device/domain metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    pub alarm_id: i64,
    /// Most-recent event instance backing this alarm, if the event join matched.
    pub event_id: Option<i64>,
    pub alarm_code: String,
    pub alarm_name: Option<String>,
    pub alarm_type_name: Option<String>,
    pub state: UpstreamState,
    /// Raw severity level, e.g. "0".."4"; display mapping lives in the mapper.
    pub level: String,
    pub host_name: Option<String>,
    pub host_ip: Option<String>,
    pub device_id: Option<i64>,
    pub app_name: Option<String>,
    pub business_domain: Option<String>,
    pub environment: Option<String>,
    pub resource_type: Option<String>,
    pub task_type: Option<String>,
    pub detail: Option<String>,
    pub fault_reason: Option<String>,
    pub suggestion: Option<String>,
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

impl Alarm {
    /// `host_name@host_ip` -> `host_ip` -> `host_name` -> `device_<id>`.
    pub fn effective_host(&self) -> String {
        match (self.host_name.as_deref(), self.host_ip.as_deref()) {
            (Some(name), Some(ip)) if !name.is_empty() && !ip.is_empty() => {
                format!("{name}@{ip}")
            }
            (_, Some(ip)) if !ip.is_empty() => ip.to_string(),
            (Some(name), _) if !name.is_empty() => name.to_string(),
            _ => match self.device_id {
                Some(id) => format!("device_{id}"),
                None => "device_unknown".to_string(),
            },
        }
    }

    /// Numbered extension fields (`data_1`..`data_10`), in order.
    pub fn data_fields(&self) -> [Option<&str>; 10] {
        [
            self.data_1.as_deref(),
            self.data_2.as_deref(),
            self.data_3.as_deref(),
            self.data_4.as_deref(),
            self.data_5.as_deref(),
            self.data_6.as_deref(),
            self.data_7.as_deref(),
            self.data_8.as_deref(),
            self.data_9.as_deref(),
            self.data_10.as_deref(),
        ]
    }

    /// `alarm_name` if present, else `ZMC_ALARM_<code>`.
    pub fn effective_alert_name(&self) -> String {
        match &self.alarm_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("ZMC_ALARM_{}", self.alarm_code),
        }
    }

    /// The time the alarm was resolved, if any:
    /// `A` -> reset_date; `M`/`C` -> clear_date, falling back to confirm_date; else `None`.
    pub fn resolved_time(&self) -> Option<DateTime<Utc>> {
        match self.state {
            UpstreamState::AutoRecovered => self.reset_date,
            UpstreamState::ManuallyCleared | UpstreamState::Confirmed => {
                self.clear_date.or(self.confirm_date)
            }
            UpstreamState::Unconfirmed => None,
        }
    }
}

/// This service's own bookkeeping state for an upstream alarm.
///
/// `Pending` is never written by this service; it exists only so a
/// hand-edited row (or a future writer) still deserializes. Every read
/// predicate that historically matched "FIRING OR PENDING" treats
/// `Pending` as an alias of `Firing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncState {
    Pending,
    Firing,
    Resolved,
    Silenced,
    Error,
}

impl SyncState {
    /// True for `Firing` and the legacy `Pending` alias.
    pub fn is_firing(&self) -> bool {
        matches!(self, Self::Firing | Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Firing => "FIRING",
            Self::Resolved => "RESOLVED",
            Self::Silenced => "SILENCED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// This service's per-alarm sync bookkeeping row (`sync_status`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRecord {
    pub alarm_id: i64,
    pub sync_state: SyncState,
    pub backend_ref: Option<String>,
    pub suppression_id: Option<String>,
    pub push_count: i64,
    pub last_push_time: Option<DateTime<Utc>>,
    pub error_count: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit log entry (`sync_log`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditOperation {
    PushFiring,
    PushResolved,
    PushRefired,
    Heartbeat,
    CreateSilence,
    DeleteSilence,
    PushResolvedForSilence,
    Error,
}

impl AuditOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PushFiring => "PUSH_FIRING",
            Self::PushResolved => "PUSH_RESOLVED",
            Self::PushRefired => "PUSH_REFIRED",
            Self::Heartbeat => "HEARTBEAT",
            Self::CreateSilence => "CREATE_SILENCE",
            Self::DeleteSilence => "DELETE_SILENCE",
            Self::PushResolvedForSilence => "PUSH_RESOLVED_FOR_SILENCE",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub batch_id: String,
    pub alarm_id: i64,
    pub operation: AuditOperation,
    pub success: bool,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A backend-agnostic notification derived from an `Alarm` by the mapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub alarm_id: i64,
    pub alert_name: String,
    pub severity: String,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// A request to suppress/acknowledge notifications for an alarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionRule {
    pub alarm_id: i64,
    pub alert_name: String,
    pub matchers: HashMap<String, String>,
    pub comment: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Aggregate view grouped by `sync_state`, backing `/api/v1/sync/statistics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatistics {
    pub sync_state: SyncState,
    pub alarm_count: i64,
    pub earliest_alarm: Option<DateTime<Utc>>,
    pub latest_update: Option<DateTime<Utc>>,
    pub total_pushes: i64,
    pub total_errors: i64,
    pub alarms_with_errors: i64,
}
