//! # sync-core
//!
//! The alarm/incident reconciliation engine: a store gateway onto an
//! upstream relational alarm database, a pure mapper from upstream alarms to
//! backend-agnostic notifications, HTTP backend clients for an
//! Alertmanager-style aggregator and a direct-incident API, and the
//! five-phase reconciliation engine that diffs state between them on a
//! timer.

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod model;
pub mod observability;
pub mod store;

pub mod prelude {
    pub use crate::backend::{AggregatorClient, BackendClient, DirectIncidentClient, PushOutcome};
    pub use crate::config::{BackendConfig, BackendMode, Config, DatabaseConfig, SyncConfig};
    pub use crate::engine::{CycleReport, Engine, PhaseReport};
    pub use crate::error::{Error, Result};
    pub use crate::mapper;
    pub use crate::model::{
        Alarm, AuditLogEntry, AuditOperation, Notification, SuppressionRule, SyncRecord, SyncState,
        SyncStatistics, UpstreamState,
    };
    pub use crate::observability::init_tracing;
    pub use crate::store::{Store, StoreGateway};
}
