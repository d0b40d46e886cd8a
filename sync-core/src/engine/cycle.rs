//! The five-phase reconciliation cycle: new_active, refired, status_changed,
//! heartbeat, silence_cleanup. Each phase's per-alarm errors are caught and
//! recorded; they never abort the phase loop or the cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::backend::BackendClient;
use crate::config::SyncConfig;
use crate::mapper;
use crate::model::{Alarm, AuditOperation, SyncState};
use crate::store::Store;

/// Per-phase detected/pushed/errors counters, mirroring the original's
/// per-phase stats dicts.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PhaseReport {
    pub detected: usize,
    pub pushed: usize,
    pub errors: usize,
}

/// Returned by `run_cycle()`; `/api/v1/sync/trigger` serializes this as-is.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CycleReport {
    pub batch_id: String,
    pub new_active: PhaseReport,
    pub refired: PhaseReport,
    pub status_changed: PhaseReport,
    pub heartbeat: PhaseReport,
    pub silence_cleanup: PhaseReport,
}

/// `"{local_timestamp:%Y%m%d%H%M%S}_{short_uuid_8}"`.
pub fn generate_batch_id() -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    let short_uuid: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("{timestamp}_{short_uuid}")
}

pub struct Engine<S: Store, B: BackendClient> {
    store: Arc<S>,
    backend: B,
    sync_cfg: SyncConfig,
    running: Arc<AtomicBool>,
}

impl<S: Store, B: BackendClient> Engine<S, B> {
    pub fn new(store: Arc<S>, backend: B, sync_cfg: SyncConfig) -> Self {
        Self {
            store,
            backend,
            sync_cfg,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn backend_health(&self) -> crate::error::Result<()> {
        self.backend.health().await
    }

    /// Runs one full five-phase cycle and returns a report. Errors fetching a
    /// phase's candidate set abort that phase only; per-alarm errors are
    /// recorded in the audit log and counted, never raised.
    pub async fn run_cycle(&self) -> CycleReport {
        let batch_id = generate_batch_id();
        let mut report = CycleReport {
            batch_id: batch_id.clone(),
            ..Default::default()
        };

        report.new_active = self.sync_new_active(&batch_id).await;
        report.refired = self.sync_refired(&batch_id).await;
        report.status_changed = self.sync_status_changed(&batch_id).await;
        if self.sync_cfg.heartbeat_enabled {
            report.heartbeat = self.sync_heartbeat(&batch_id).await;
        }
        if self.sync_cfg.auto_remove_on_clear {
            report.silence_cleanup = self.cleanup_silences(&batch_id).await;
        }

        tracing::info!(
            batch_id = %batch_id,
            new_active = report.new_active.pushed,
            refired = report.refired.pushed,
            status_changed = report.status_changed.pushed,
            heartbeat = report.heartbeat.pushed,
            silence_cleanup = report.silence_cleanup.pushed,
            "sync cycle complete"
        );
        report
    }

    async fn sync_new_active(&self, batch_id: &str) -> PhaseReport {
        let mut phase = PhaseReport::default();
        let alarms = match self.store.fetch_new_active().await {
            Ok(alarms) => alarms,
            Err(err) => {
                tracing::error!(batch_id, error = %err, phase = "new_active", "fetch failed, skipping phase");
                return phase;
            }
        };
        phase.detected = alarms.len();

        for alarm in &alarms {
            if !mapper::should_sync(alarm, &self.sync_cfg) {
                continue;
            }
            let notification = mapper::to_notification(alarm, &self.sync_cfg, Utc::now());
            match self.backend.push(std::slice::from_ref(&notification)).await {
                Ok(_) => {
                    if let Err(err) = self.store.insert_sync(alarm.alarm_id, SyncState::Firing, None).await {
                        tracing::error!(batch_id, alarm_id = alarm.alarm_id, error = %err, "failed to record new sync row");
                        phase.errors += 1;
                        continue;
                    }
                    self.audit(batch_id, alarm.alarm_id, AuditOperation::PushFiring, true, None).await;
                    phase.pushed += 1;
                }
                Err(err) => {
                    tracing::warn!(batch_id, alarm_id = alarm.alarm_id, error = %err, "push failed for new alarm");
                    self.audit(batch_id, alarm.alarm_id, AuditOperation::PushFiring, false, Some(&err.to_string())).await;
                    phase.errors += 1;
                }
            }
        }
        phase
    }

    async fn sync_refired(&self, batch_id: &str) -> PhaseReport {
        let mut phase = PhaseReport::default();
        let alarms = match self.store.fetch_refired().await {
            Ok(alarms) => alarms,
            Err(err) => {
                tracing::error!(batch_id, error = %err, phase = "refired", "fetch failed, skipping phase");
                return phase;
            }
        };
        phase.detected = alarms.len();

        for alarm in &alarms {
            let notification = mapper::to_notification(alarm, &self.sync_cfg, Utc::now());
            match self.backend.push(std::slice::from_ref(&notification)).await {
                Ok(_) => {
                    if let Err(err) = self
                        .store
                        .update_sync_success(alarm.alarm_id, SyncState::Firing, None, true)
                        .await
                    {
                        tracing::error!(batch_id, alarm_id = alarm.alarm_id, error = %err, "failed to record refired push");
                        phase.errors += 1;
                        continue;
                    }
                    self.audit(batch_id, alarm.alarm_id, AuditOperation::PushRefired, true, None).await;
                    phase.pushed += 1;
                }
                Err(err) => {
                    let _ = self.store.update_sync_error(alarm.alarm_id, &err.to_string()).await;
                    self.audit(batch_id, alarm.alarm_id, AuditOperation::PushRefired, false, Some(&err.to_string())).await;
                    phase.errors += 1;
                }
            }
        }
        phase
    }

    async fn sync_status_changed(&self, batch_id: &str) -> PhaseReport {
        let mut phase = PhaseReport::default();
        let alarms = match self.store.fetch_status_changed().await {
            Ok(alarms) => alarms,
            Err(err) => {
                tracing::error!(batch_id, error = %err, phase = "status_changed", "fetch failed, skipping phase");
                return phase;
            }
        };
        phase.detected = alarms.len();

        for alarm in &alarms {
            match self.handle_status_change(batch_id, alarm).await {
                Ok(()) => phase.pushed += 1,
                Err(err) => {
                    let _ = self.store.update_sync_error(alarm.alarm_id, &err.to_string()).await;
                    self.audit(batch_id, alarm.alarm_id, AuditOperation::Error, false, Some(&err.to_string())).await;
                    phase.errors += 1;
                }
            }
        }
        phase
    }

    async fn handle_status_change(&self, batch_id: &str, alarm: &Alarm) -> crate::error::Result<()> {
        let existing = self.store.get_sync_record(alarm.alarm_id).await?;
        let push_count = existing.as_ref().map(|r| r.push_count).unwrap_or(0);

        // Never pushed before: nothing to resolve on the backend, transition directly.
        if push_count == 0 {
            self.store.update_sync_success(alarm.alarm_id, SyncState::Resolved, None, false).await?;
            self.audit(batch_id, alarm.alarm_id, AuditOperation::PushResolved, true, Some("skipped push, push_count=0")).await;
            return Ok(());
        }

        let notification = mapper::to_notification(alarm, &self.sync_cfg, Utc::now());

        match alarm.state {
            crate::model::UpstreamState::AutoRecovered | crate::model::UpstreamState::Confirmed => {
                self.backend.push(std::slice::from_ref(&notification)).await?;
                if let Some(suppression_id) = existing.as_ref().and_then(|r| r.suppression_id.clone()) {
                    let _ = self.backend.delete_suppression(&suppression_id).await;
                    self.audit(batch_id, alarm.alarm_id, AuditOperation::DeleteSilence, true, None).await;
                }
                self.store.update_sync_success(alarm.alarm_id, SyncState::Resolved, None, false).await?;
                self.store.set_suppression(alarm.alarm_id, None).await?;
                self.audit(batch_id, alarm.alarm_id, AuditOperation::PushResolved, true, None).await;
                Ok(())
            }
            crate::model::UpstreamState::ManuallyCleared => {
                self.backend.push(std::slice::from_ref(&notification)).await?;
                self.audit(batch_id, alarm.alarm_id, AuditOperation::PushResolved, true, None).await;

                // Suppression-on-manual-clear always runs; `auto_remove_on_clear`
                // only gates phase 5's silence cleanup, not this transition.
                let rule = mapper::create_suppression(alarm, "auto-silenced on manual clear", Utc::now());
                match self.backend.create_suppression(&rule).await {
                    Ok(suppression_id) => {
                        self.store.update_sync_success(alarm.alarm_id, SyncState::Silenced, None, false).await?;
                        self.store.set_suppression(alarm.alarm_id, Some(&suppression_id)).await?;
                        self.audit(batch_id, alarm.alarm_id, AuditOperation::CreateSilence, true, None).await;
                    }
                    Err(err) => {
                        tracing::warn!(batch_id, alarm_id = alarm.alarm_id, error = %err, "silence creation failed, staying resolved");
                        self.store.update_sync_success(alarm.alarm_id, SyncState::Resolved, None, false).await?;
                        self.audit(batch_id, alarm.alarm_id, AuditOperation::CreateSilence, false, Some(&err.to_string())).await;
                    }
                }
                Ok(())
            }
            crate::model::UpstreamState::Unconfirmed => Ok(()),
        }
    }

    async fn sync_heartbeat(&self, batch_id: &str) -> PhaseReport {
        let mut phase = PhaseReport::default();
        let before = Utc::now() - chrono::Duration::seconds(self.sync_cfg.heartbeat_interval_secs as i64);
        let alarms = match self.store.fetch_heartbeat_due(before).await {
            Ok(alarms) => alarms,
            Err(err) => {
                tracing::error!(batch_id, error = %err, phase = "heartbeat", "fetch failed, skipping phase");
                return phase;
            }
        };
        phase.detected = alarms.len();

        let notifications: Vec<_> = alarms.iter().map(|a| mapper::to_notification(a, &self.sync_cfg, Utc::now())).collect();
        if notifications.is_empty() {
            return phase;
        }

        match self.backend.push(&notifications).await {
            Ok(_) => {
                for alarm in &alarms {
                    if self
                        .store
                        .update_sync_success(alarm.alarm_id, SyncState::Firing, None, true)
                        .await
                        .is_ok()
                    {
                        self.audit(batch_id, alarm.alarm_id, AuditOperation::Heartbeat, true, None).await;
                        phase.pushed += 1;
                    } else {
                        phase.errors += 1;
                    }
                }
            }
            Err(err) => {
                tracing::warn!(batch_id, error = %err, "heartbeat push failed for batch");
                for alarm in &alarms {
                    self.audit(batch_id, alarm.alarm_id, AuditOperation::Heartbeat, false, Some(&err.to_string())).await;
                }
                phase.errors += alarms.len();
            }
        }
        phase
    }

    async fn cleanup_silences(&self, batch_id: &str) -> PhaseReport {
        let mut phase = PhaseReport::default();
        let records = match self.store.fetch_silences_to_clear().await {
            Ok(records) => records,
            Err(err) => {
                tracing::error!(batch_id, error = %err, phase = "silence_cleanup", "fetch failed, skipping phase");
                return phase;
            }
        };
        phase.detected = records.len();

        for record in &records {
            let Some(suppression_id) = &record.suppression_id else {
                continue;
            };
            match self.backend.delete_suppression(suppression_id).await {
                Ok(()) => {
                    if let Err(err) = self.store.update_sync_success(record.alarm_id, SyncState::Resolved, None, false).await {
                        tracing::error!(batch_id, alarm_id = record.alarm_id, error = %err, "failed to clear silence record");
                        phase.errors += 1;
                        continue;
                    }
                    let _ = self.store.set_suppression(record.alarm_id, None).await;
                    self.audit(batch_id, record.alarm_id, AuditOperation::DeleteSilence, true, None).await;
                    self.audit(batch_id, record.alarm_id, AuditOperation::PushResolvedForSilence, true, None).await;
                    phase.pushed += 1;
                }
                Err(err) => {
                    let _ = self.store.update_sync_error(record.alarm_id, &err.to_string()).await;
                    self.audit(batch_id, record.alarm_id, AuditOperation::DeleteSilence, false, Some(&err.to_string())).await;
                    phase.errors += 1;
                }
            }
        }
        phase
    }

    async fn audit(&self, batch_id: &str, alarm_id: i64, operation: AuditOperation, success: bool, detail: Option<&str>) {
        if let Err(err) = self.store.append_audit(batch_id, alarm_id, operation, success, detail).await {
            tracing::error!(batch_id, alarm_id, error = %err, "failed to append audit log entry");
        }
    }

    /// Runs `sync_on_startup` once (if configured) then loops, sleeping
    /// `scan_interval_secs` between cycles. Never panics on a cycle error —
    /// `run_cycle` already swallows per-phase errors into the report.
    pub async fn run_background_loop(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        self.running.store(true, Ordering::SeqCst);

        if self.sync_cfg.sync_on_startup {
            self.run_cycle().await;
        }

        let interval = Duration::from_secs(self.sync_cfg.scan_interval_secs);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if !self.running.load(Ordering::SeqCst) {
                        continue;
                    }
                    self.run_cycle().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("reconciler loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::backend::PushOutcome;
    use crate::model::{SuppressionRule, SyncRecord, UpstreamState};

    #[test]
    fn batch_id_has_timestamp_and_short_uuid() {
        let id = generate_batch_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 14);
        assert_eq!(parts[1].len(), 8);
    }

    /// In-memory stand-in for `StoreGateway`, driven purely by the engine's
    /// `Store` seam so phase logic can be exercised without Postgres.
    #[derive(Default)]
    struct FakeStore {
        alarms: Mutex<HashMap<i64, Alarm>>,
        records: Mutex<HashMap<i64, SyncRecord>>,
    }

    fn blank_record(alarm_id: i64, state: SyncState) -> SyncRecord {
        SyncRecord {
            alarm_id,
            sync_state: state,
            backend_ref: None,
            suppression_id: None,
            push_count: 1,
            last_push_time: Some(Utc::now()),
            error_count: 0,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    impl FakeStore {
        fn seed(&self, alarm: Alarm) {
            self.alarms.lock().unwrap().insert(alarm.alarm_id, alarm);
        }

        fn seed_record(&self, record: SyncRecord) {
            self.records.lock().unwrap().insert(record.alarm_id, record);
        }

        fn record(&self, alarm_id: i64) -> Option<SyncRecord> {
            self.records.lock().unwrap().get(&alarm_id).cloned()
        }
    }

    impl Store for FakeStore {
        async fn fetch_new_active(&self) -> crate::error::Result<Vec<Alarm>> {
            let alarms = self.alarms.lock().unwrap();
            let records = self.records.lock().unwrap();
            Ok(alarms
                .values()
                .filter(|a| a.state == UpstreamState::Unconfirmed && !records.contains_key(&a.alarm_id))
                .cloned()
                .collect())
        }

        async fn fetch_refired(&self) -> crate::error::Result<Vec<Alarm>> {
            let alarms = self.alarms.lock().unwrap();
            let records = self.records.lock().unwrap();
            Ok(alarms
                .values()
                .filter(|a| {
                    a.state == UpstreamState::Unconfirmed
                        && records.get(&a.alarm_id).map(|r| r.sync_state == SyncState::Resolved).unwrap_or(false)
                })
                .cloned()
                .collect())
        }

        async fn fetch_status_changed(&self) -> crate::error::Result<Vec<Alarm>> {
            let alarms = self.alarms.lock().unwrap();
            let records = self.records.lock().unwrap();
            Ok(alarms
                .values()
                .filter(|a| {
                    a.state != UpstreamState::Unconfirmed
                        && records.get(&a.alarm_id).map(|r| r.sync_state.is_firing() || r.sync_state == SyncState::Silenced).unwrap_or(false)
                })
                .cloned()
                .collect())
        }

        async fn fetch_heartbeat_due(&self, before: chrono::DateTime<Utc>) -> crate::error::Result<Vec<Alarm>> {
            let alarms = self.alarms.lock().unwrap();
            let records = self.records.lock().unwrap();
            Ok(alarms
                .values()
                .filter(|a| {
                    a.state == UpstreamState::Unconfirmed
                        && records
                            .get(&a.alarm_id)
                            .map(|r| r.sync_state.is_firing() && r.last_push_time.map(|t| t < before).unwrap_or(true))
                            .unwrap_or(false)
                })
                .cloned()
                .collect())
        }

        async fn fetch_silences_to_clear(&self) -> crate::error::Result<Vec<SyncRecord>> {
            let alarms = self.alarms.lock().unwrap();
            let records = self.records.lock().unwrap();
            Ok(records
                .values()
                .filter(|r| {
                    r.sync_state == SyncState::Silenced
                        && alarms.get(&r.alarm_id).map(|a| a.state == UpstreamState::Confirmed).unwrap_or(false)
                })
                .cloned()
                .collect())
        }

        async fn insert_sync(&self, alarm_id: i64, state: SyncState, backend_ref: Option<&str>) -> crate::error::Result<()> {
            let mut record = blank_record(alarm_id, state);
            record.backend_ref = backend_ref.map(str::to_string);
            self.records.lock().unwrap().insert(alarm_id, record);
            Ok(())
        }

        async fn update_sync_success(
            &self,
            alarm_id: i64,
            state: SyncState,
            backend_ref: Option<&str>,
            bump_push_count: bool,
        ) -> crate::error::Result<()> {
            let mut records = self.records.lock().unwrap();
            let record = records.entry(alarm_id).or_insert_with(|| blank_record(alarm_id, state));
            record.sync_state = state;
            if let Some(reference) = backend_ref {
                record.backend_ref = Some(reference.to_string());
            }
            if bump_push_count {
                record.push_count += 1;
            }
            record.last_push_time = Some(Utc::now());
            record.error_count = 0;
            Ok(())
        }

        async fn update_sync_error(&self, alarm_id: i64, error_message: &str) -> crate::error::Result<()> {
            let mut records = self.records.lock().unwrap();
            let record = records.entry(alarm_id).or_insert_with(|| blank_record(alarm_id, SyncState::Error));
            record.sync_state = SyncState::Error;
            record.error_count += 1;
            record.last_error = Some(error_message.to_string());
            Ok(())
        }

        async fn set_suppression(&self, alarm_id: i64, suppression_id: Option<&str>) -> crate::error::Result<()> {
            if let Some(record) = self.records.lock().unwrap().get_mut(&alarm_id) {
                record.suppression_id = suppression_id.map(str::to_string);
            }
            Ok(())
        }

        async fn append_audit(
            &self,
            _batch_id: &str,
            _alarm_id: i64,
            _operation: AuditOperation,
            _success: bool,
            _detail: Option<&str>,
        ) -> crate::error::Result<()> {
            Ok(())
        }

        async fn get_sync_record(&self, alarm_id: i64) -> crate::error::Result<Option<SyncRecord>> {
            Ok(self.record(alarm_id))
        }
    }

    /// Fake backend: records every push/suppression call, and can be made to
    /// fail pushes or suppression creation on demand.
    #[derive(Default)]
    struct FakeBackend {
        fail_push: bool,
        fail_suppression: bool,
    }

    impl BackendClient for FakeBackend {
        async fn push(&self, notifications: &[crate::model::Notification]) -> crate::error::Result<PushOutcome> {
            if self.fail_push {
                return Err(crate::error::Error::backend_transient("push failed", None));
            }
            Ok(PushOutcome { accepted: notifications.len(), backend_ref: None })
        }

        async fn create_suppression(&self, _rule: &SuppressionRule) -> crate::error::Result<String> {
            if self.fail_suppression {
                return Err(crate::error::Error::backend_permanent("suppression rejected", None));
            }
            Ok("sup-1".to_string())
        }

        async fn delete_suppression(&self, _suppression_id: &str) -> crate::error::Result<()> {
            Ok(())
        }

        async fn list_suppressions(&self) -> crate::error::Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn list_active(&self) -> crate::error::Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn health(&self) -> crate::error::Result<()> {
            Ok(())
        }
    }

    fn bare_alarm(alarm_id: i64, state: UpstreamState, level: &str) -> Alarm {
        Alarm {
            alarm_id,
            event_id: Some(alarm_id * 10),
            alarm_code: "E1001".to_string(),
            alarm_name: Some("Link Down".to_string()),
            alarm_type_name: None,
            state,
            level: level.to_string(),
            host_name: Some("core-sw-01".to_string()),
            host_ip: Some("10.0.0.1".to_string()),
            device_id: None,
            app_name: Some("network".to_string()),
            business_domain: None,
            environment: None,
            resource_type: None,
            task_type: None,
            detail: None,
            fault_reason: None,
            suggestion: None,
            event_time: Some(Utc::now()),
            create_date: Some(Utc::now()),
            confirm_date: None,
            reset_date: None,
            clear_date: None,
            clear_reason: None,
            total_alarm: 1,
            data_1: None,
            data_2: None,
            data_3: None,
            data_4: None,
            data_5: None,
            data_6: None,
            data_7: None,
            data_8: None,
            data_9: None,
            data_10: None,
        }
    }

    fn engine(store: FakeStore, backend: FakeBackend) -> Engine<FakeStore, FakeBackend> {
        Engine::new(Arc::new(store), backend, SyncConfig::default())
    }

    /// S1: a brand-new `U` alarm with no `sync_status` row gets pushed and a
    /// `FIRING` row created.
    #[tokio::test]
    async fn new_active_alarm_is_pushed_and_recorded_firing() {
        let store = FakeStore::default();
        store.seed(bare_alarm(1, UpstreamState::Unconfirmed, "1"));
        let eng = engine(store, FakeBackend::default());

        let report = eng.run_cycle().await;

        assert_eq!(report.new_active.pushed, 1);
        let record = eng.store().record(1).unwrap();
        assert_eq!(record.sync_state, SyncState::Firing);
        assert_eq!(record.push_count, 1);
    }

    /// S3: an alarm previously marked `RESOLVED` whose upstream state has
    /// returned to `U` must be detected as refired, not silently skipped.
    #[tokio::test]
    async fn resolved_alarm_back_to_u_is_detected_as_refired() {
        let store = FakeStore::default();
        store.seed(bare_alarm(2, UpstreamState::Unconfirmed, "1"));
        store.seed_record(blank_record(2, SyncState::Resolved));
        let eng = engine(store, FakeBackend::default());

        let report = eng.run_cycle().await;

        assert_eq!(report.refired.detected, 1);
        assert_eq!(report.refired.pushed, 1);
        let record = eng.store().record(2).unwrap();
        assert_eq!(record.sync_state, SyncState::Firing);
    }

    /// A `FIRING` row with total_alarm advanced but still `FIRING` (not yet
    /// `RESOLVED`) is not a refire — it belongs to `status_changed`/heartbeat,
    /// not phase 2.
    #[tokio::test]
    async fn still_firing_alarm_is_not_treated_as_refired() {
        let store = FakeStore::default();
        store.seed(bare_alarm(3, UpstreamState::Unconfirmed, "1"));
        store.seed_record(blank_record(3, SyncState::Firing));
        let eng = engine(store, FakeBackend::default());

        let report = eng.run_cycle().await;

        assert_eq!(report.refired.detected, 0);
    }

    /// S4: a manually-cleared (`M`) alarm gets pushed resolved, then silenced
    /// via a backend suppression, unconditionally — not gated by
    /// `auto_remove_on_clear` (that flag only governs phase 5 cleanup).
    #[tokio::test]
    async fn manual_clear_creates_suppression_regardless_of_auto_remove_flag() {
        let store = FakeStore::default();
        store.seed(bare_alarm(4, UpstreamState::ManuallyCleared, "1"));
        store.seed_record(blank_record(4, SyncState::Firing));
        let mut eng = engine(store, FakeBackend::default());
        eng.sync_cfg.auto_remove_on_clear = false;

        let report = eng.run_cycle().await;

        assert_eq!(report.status_changed.pushed, 1);
        let record = eng.store().record(4).unwrap();
        assert_eq!(record.sync_state, SyncState::Silenced);
        assert!(record.suppression_id.is_some());
    }

    /// When suppression creation fails, the alarm still ends up `RESOLVED`
    /// rather than stuck `FIRING` or erroring the whole phase.
    #[tokio::test]
    async fn manual_clear_falls_back_to_resolved_when_suppression_fails() {
        let store = FakeStore::default();
        store.seed(bare_alarm(5, UpstreamState::ManuallyCleared, "1"));
        store.seed_record(blank_record(5, SyncState::Firing));
        let backend = FakeBackend { fail_suppression: true, ..Default::default() };
        let eng = engine(store, backend);

        let report = eng.run_cycle().await;

        assert_eq!(report.status_changed.pushed, 1);
        let record = eng.store().record(5).unwrap();
        assert_eq!(record.sync_state, SyncState::Resolved);
    }

    /// S5: a stale silenced record whose suppression phase 3 never tore down
    /// (e.g. the alarm reached `C` without a matching status-change sweep)
    /// gets cleared by phase 5 directly. Exercised as a standalone phase
    /// call since phase 3's own predicate also matches `SILENCED` rows and
    /// would otherwise race phase 5 for the same alarm within one cycle.
    #[tokio::test]
    async fn confirmed_clear_removes_silence_when_auto_remove_enabled() {
        let store = FakeStore::default();
        store.seed(bare_alarm(6, UpstreamState::Confirmed, "1"));
        let mut record = blank_record(6, SyncState::Silenced);
        record.suppression_id = Some("sup-6".to_string());
        store.seed_record(record);
        let mut eng = engine(store, FakeBackend::default());
        eng.sync_cfg.auto_remove_on_clear = true;

        let report = eng.cleanup_silences("test-batch").await;

        assert_eq!(report.pushed, 1);
        let record = eng.store().record(6).unwrap();
        assert_eq!(record.sync_state, SyncState::Resolved);
        assert!(record.suppression_id.is_none());
    }

    /// S6: a transient backend failure on a brand-new alarm is recorded as a
    /// phase error and does not create a sync row.
    #[tokio::test]
    async fn new_active_push_failure_is_counted_and_leaves_no_sync_row() {
        let store = FakeStore::default();
        store.seed(bare_alarm(7, UpstreamState::Unconfirmed, "1"));
        let backend = FakeBackend { fail_push: true, ..Default::default() };
        let eng = engine(store, backend);

        let report = eng.run_cycle().await;

        assert_eq!(report.new_active.errors, 1);
        assert_eq!(report.new_active.pushed, 0);
        assert!(eng.store().record(7).is_none());
    }

    /// S7: `allowed_levels` filters a new alarm out of phase 1 entirely.
    #[tokio::test]
    async fn disallowed_level_is_skipped_in_new_active() {
        let store = FakeStore::default();
        store.seed(bare_alarm(8, UpstreamState::Unconfirmed, "3"));
        let mut eng = engine(store, FakeBackend::default());
        eng.sync_cfg.allowed_levels = Some(vec!["1".to_string(), "2".to_string()]);

        let report = eng.run_cycle().await;

        assert_eq!(report.new_active.detected, 1);
        assert_eq!(report.new_active.pushed, 0);
        assert!(eng.store().record(8).is_none());
    }
}
