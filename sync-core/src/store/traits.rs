//! The reconciliation engine's view onto the store, factored out of
//! `StoreGateway` so the cycle logic can be driven by an in-memory fake in
//! tests instead of a live Postgres instance — the same RPITIT shape
//! `BackendClient` uses for the backend side of the engine.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Alarm, AuditOperation, SyncRecord, SyncState};

use super::StoreGateway;

/// The subset of `StoreGateway` the five-phase reconciliation cycle needs.
pub trait Store: Send + Sync {
    fn fetch_new_active(&self) -> impl Future<Output = Result<Vec<Alarm>>> + Send;
    fn fetch_refired(&self) -> impl Future<Output = Result<Vec<Alarm>>> + Send;
    fn fetch_status_changed(&self) -> impl Future<Output = Result<Vec<Alarm>>> + Send;
    fn fetch_heartbeat_due(&self, before: DateTime<Utc>) -> impl Future<Output = Result<Vec<Alarm>>> + Send;
    fn fetch_silences_to_clear(&self) -> impl Future<Output = Result<Vec<SyncRecord>>> + Send;

    fn insert_sync(&self, alarm_id: i64, state: SyncState, backend_ref: Option<&str>) -> impl Future<Output = Result<()>> + Send;
    fn update_sync_success(
        &self,
        alarm_id: i64,
        state: SyncState,
        backend_ref: Option<&str>,
        bump_push_count: bool,
    ) -> impl Future<Output = Result<()>> + Send;
    fn update_sync_error(&self, alarm_id: i64, error_message: &str) -> impl Future<Output = Result<()>> + Send;
    fn set_suppression(&self, alarm_id: i64, suppression_id: Option<&str>) -> impl Future<Output = Result<()>> + Send;
    fn append_audit(
        &self,
        batch_id: &str,
        alarm_id: i64,
        operation: AuditOperation,
        success: bool,
        detail: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;
    fn get_sync_record(&self, alarm_id: i64) -> impl Future<Output = Result<Option<SyncRecord>>> + Send;
}

impl Store for StoreGateway {
    async fn fetch_new_active(&self) -> Result<Vec<Alarm>> {
        self.fetch_new_active().await
    }

    async fn fetch_refired(&self) -> Result<Vec<Alarm>> {
        self.fetch_refired().await
    }

    async fn fetch_status_changed(&self) -> Result<Vec<Alarm>> {
        self.fetch_status_changed().await
    }

    async fn fetch_heartbeat_due(&self, before: DateTime<Utc>) -> Result<Vec<Alarm>> {
        self.fetch_heartbeat_due(before).await
    }

    async fn fetch_silences_to_clear(&self) -> Result<Vec<SyncRecord>> {
        self.fetch_silences_to_clear().await
    }

    async fn insert_sync(&self, alarm_id: i64, state: SyncState, backend_ref: Option<&str>) -> Result<()> {
        self.insert_sync(alarm_id, state, backend_ref).await
    }

    async fn update_sync_success(
        &self,
        alarm_id: i64,
        state: SyncState,
        backend_ref: Option<&str>,
        bump_push_count: bool,
    ) -> Result<()> {
        self.update_sync_success(alarm_id, state, backend_ref, bump_push_count).await
    }

    async fn update_sync_error(&self, alarm_id: i64, error_message: &str) -> Result<()> {
        self.update_sync_error(alarm_id, error_message).await
    }

    async fn set_suppression(&self, alarm_id: i64, suppression_id: Option<&str>) -> Result<()> {
        self.set_suppression(alarm_id, suppression_id).await
    }

    async fn append_audit(
        &self,
        batch_id: &str,
        alarm_id: i64,
        operation: AuditOperation,
        success: bool,
        detail: Option<&str>,
    ) -> Result<()> {
        self.append_audit(batch_id, alarm_id, operation, success, detail).await
    }

    async fn get_sync_record(&self, alarm_id: i64) -> Result<Option<SyncRecord>> {
        self.get_sync_record(alarm_id).await
    }
}
