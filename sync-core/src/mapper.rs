//! Pure alarm -> notification mapping. No I/O; unit-tested in isolation.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::config::SyncConfig;
use crate::model::{Alarm, Notification, SuppressionRule, UpstreamState};

const LABEL_VALUE_MAX: usize = 256;
const LABEL_TRUNCATE_AT: usize = 253;
const DETAIL_ANNOTATION_MAX: usize = 200;
const DETAIL_ANNOTATION_TRUNCATE_AT: usize = 197;
const SUGGESTION_ANNOTATION_MAX: usize = 150;
const SUGGESTION_ANNOTATION_TRUNCATE_AT: usize = 147;

/// Display name for a raw severity level code.
pub fn severity_display(level: &str) -> &'static str {
    match level {
        "1" => "Critical",
        "2" => "Major",
        "3" => "Minor",
        "4" => "Warning",
        "0" => "Undefined",
        _ => "Undefined",
    }
}

/// Lower-case severity keyword used in labels and priority mapping.
pub fn severity_keyword(level: &str) -> &'static str {
    match level {
        "1" => "critical",
        "2" => "error",
        "3" => "warning",
        "4" => "info",
        _ => "info",
    }
}

/// Whether an alarm should be synced at all, per configured level/severity allow-sets.
pub fn should_sync(alarm: &Alarm, cfg: &SyncConfig) -> bool {
    if let Some(levels) = &cfg.allowed_levels {
        if !levels.iter().any(|l| l == &alarm.level) {
            return false;
        }
    }
    if let Some(severities) = &cfg.allowed_severities {
        let sev = severity_keyword(&alarm.level);
        if !severities.iter().any(|s| s == sev) {
            return false;
        }
    }
    true
}

/// Replace newlines/carriage-returns with a space, double quotes with a
/// single quote, and truncate to 256 chars with a `...` suffix at 253.
fn sanitize_label_value(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            '"' => '\'',
            other => other,
        })
        .collect();
    if cleaned.chars().count() > LABEL_VALUE_MAX {
        let truncated: String = cleaned.chars().take(LABEL_TRUNCATE_AT).collect();
        format!("{truncated}...")
    } else {
        cleaned
    }
}

fn truncate_with_ellipsis(value: &str, max: usize, truncate_at: usize) -> String {
    if value.chars().count() > max {
        let truncated: String = value.chars().take(truncate_at).collect();
        format!("{truncated}...")
    } else {
        value.to_string()
    }
}

fn build_labels(alarm: &Alarm, cfg: &SyncConfig) -> HashMap<String, String> {
    let mut labels = HashMap::new();
    labels.insert("alertname".to_string(), sanitize_label_value(&alarm.effective_alert_name()));
    labels.insert("instance".to_string(), sanitize_label_value(&alarm.effective_host()));
    labels.insert("severity".to_string(), severity_keyword(&alarm.level).to_string());
    labels.insert("alarm_id".to_string(), alarm.alarm_id.to_string());
    labels.insert("event_id".to_string(), alarm.event_id.map(|id| id.to_string()).unwrap_or_default());
    labels.insert("alarm_code".to_string(), sanitize_label_value(&alarm.alarm_code));
    let resource_type = alarm.resource_type.as_deref().filter(|s| !s.is_empty()).unwrap_or("UNKNOWN");
    labels.insert("resource_type".to_string(), sanitize_label_value(resource_type));

    if let (Some(name), host_ip) = (&alarm.host_name, alarm.host_ip.as_deref()) {
        if !name.is_empty() && Some(name.as_str()) != host_ip {
            labels.insert("host".to_string(), sanitize_label_value(name));
        }
    }
    if let Some(app) = &alarm.app_name {
        if !app.is_empty() {
            labels.insert("application".to_string(), sanitize_label_value(app));
        }
    }
    if let Some(domain) = &alarm.business_domain {
        if !domain.is_empty() {
            labels.insert("domain".to_string(), sanitize_label_value(domain));
        }
    }
    if let Some(env) = &alarm.environment {
        if !env.is_empty() {
            labels.insert("env".to_string(), sanitize_label_value(&env.to_lowercase()));
        }
    }
    if let Some(task_type) = &alarm.task_type {
        if !task_type.is_empty() {
            labels.insert("task_type".to_string(), sanitize_label_value(task_type));
        }
    }

    for (key, value) in &cfg.static_labels {
        labels.insert(key.clone(), sanitize_label_value(value));
    }
    labels
}

/// Bulleted Markdown description, one leading forced line break then one
/// per populated field, joined with a forced Markdown line break ("  \n").
fn build_description(alarm: &Alarm) -> String {
    let mut lines = vec![format!("• Severity: {}", severity_display(&alarm.level))];
    if let Some(detail) = &alarm.detail {
        if !detail.is_empty() {
            lines.push(format!(
                "• Detail: {}",
                truncate_with_ellipsis(detail, DETAIL_ANNOTATION_MAX, DETAIL_ANNOTATION_TRUNCATE_AT)
            ));
        }
    }
    if let Some(host) = &alarm.host_name {
        if !host.is_empty() {
            lines.push(format!("• Host: {host}"));
        }
    }
    if let Some(ip) = &alarm.host_ip {
        if !ip.is_empty() {
            lines.push(format!("• IP: {ip}"));
        }
    }
    if let Some(app) = &alarm.app_name {
        if !app.is_empty() {
            lines.push(format!("• App: {app}"));
        }
    }
    if let Some(domain) = &alarm.business_domain {
        if !domain.is_empty() {
            lines.push(format!("• Domain: {domain}"));
        }
    }
    if let Some(reason) = &alarm.fault_reason {
        if !reason.is_empty() {
            lines.push(format!("• Reason: {reason}"));
        }
    }
    if let Some(suggestion) = &alarm.suggestion {
        if !suggestion.is_empty() {
            lines.push(format!(
                "• Suggestion: {}",
                truncate_with_ellipsis(suggestion, SUGGESTION_ANNOTATION_MAX, SUGGESTION_ANNOTATION_TRUNCATE_AT)
            ));
        }
    }
    format!("  \n{}", lines.join("  \n"))
}

fn build_annotations(alarm: &Alarm) -> HashMap<String, String> {
    let mut annotations = HashMap::new();
    let summary = match &alarm.alarm_name {
        Some(name) if !name.is_empty() => name.clone(),
        _ => format!("ZMC Alert {}", alarm.alarm_code),
    };
    annotations.insert("summary".to_string(), sanitize_label_value(&summary));
    annotations.insert(
        "severity_level".to_string(),
        format!("{} ({})", severity_keyword(&alarm.level).to_uppercase(), severity_display(&alarm.level)),
    );
    annotations.insert("description".to_string(), build_description(alarm));
    if let Some(reason) = &alarm.fault_reason {
        if !reason.is_empty() {
            annotations.insert("fault_reason".to_string(), sanitize_label_value(reason));
        }
    }
    if let Some(suggestion) = &alarm.suggestion {
        if !suggestion.is_empty() {
            annotations.insert("runbook".to_string(), sanitize_label_value(suggestion));
        }
    }
    if let Some(alarm_type) = &alarm.alarm_type_name {
        if !alarm_type.is_empty() {
            annotations.insert("alarm_type".to_string(), sanitize_label_value(alarm_type));
        }
    }
    for (i, data) in alarm.data_fields().iter().enumerate() {
        if let Some(value) = data {
            if !value.is_empty() {
                annotations.insert(format!("data_{}", i + 1), sanitize_label_value(value));
            }
        }
    }
    annotations
}

/// Build a `Notification` from an `Alarm`. `now` is passed in rather than
/// read from the clock so the mapper stays pure and testable.
pub fn to_notification(alarm: &Alarm, cfg: &SyncConfig, now: DateTime<Utc>) -> Notification {
    let mut starts_at = alarm.event_time.or(alarm.create_date).unwrap_or(now);
    let ends_at = if alarm.state.is_active() {
        None
    } else {
        Some(alarm.resolved_time().unwrap_or(now))
    };

    if let Some(end) = ends_at {
        if starts_at >= end {
            tracing::warn!(
                alarm_id = alarm.alarm_id,
                %starts_at,
                %end,
                "starts_at >= ends_at, clamping starts_at"
            );
            starts_at = end - Duration::seconds(1);
        }
    }

    Notification {
        alarm_id: alarm.alarm_id,
        alert_name: alarm.effective_alert_name(),
        severity: severity_keyword(&alarm.level).to_string(),
        labels: build_labels(alarm, cfg),
        annotations: build_annotations(alarm),
        starts_at,
        ends_at,
    }
}

/// Build a suppression request for an alarm that has moved to `M` (manually
/// cleared) while `auto_remove_on_clear`/silence emulation is configured.
pub fn create_suppression(alarm: &Alarm, comment: impl Into<String>, now: DateTime<Utc>) -> SuppressionRule {
    let mut matchers = HashMap::new();
    matchers.insert("alertname".to_string(), alarm.effective_alert_name());
    matchers.insert("alarm_code".to_string(), alarm.alarm_code.clone());
    SuppressionRule {
        alarm_id: alarm.alarm_id,
        alert_name: alarm.effective_alert_name(),
        matchers,
        comment: comment.into(),
        starts_at: now,
        ends_at: now + Duration::hours(24),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_alarm(state: UpstreamState, level: &str) -> Alarm {
        Alarm {
            alarm_id: 42,
            event_id: Some(9001),
            alarm_code: "E1001".to_string(),
            alarm_name: Some("Link Down".to_string()),
            alarm_type_name: Some("Connectivity".to_string()),
            state,
            level: level.to_string(),
            host_name: Some("core-sw-01".to_string()),
            host_ip: Some("10.0.0.1".to_string()),
            device_id: Some(7),
            app_name: Some("network".to_string()),
            business_domain: Some("core".to_string()),
            environment: Some("production".to_string()),
            resource_type: Some("switch".to_string()),
            task_type: Some("fault".to_string()),
            detail: Some("Interface eth0 down".to_string()),
            fault_reason: Some("Cable fault".to_string()),
            suggestion: Some("Check physical cabling".to_string()),
            event_time: Some(Utc.with_ymd_and_hms(2026, 7, 20, 10, 0, 0).unwrap()),
            create_date: Some(Utc.with_ymd_and_hms(2026, 7, 20, 9, 59, 0).unwrap()),
            confirm_date: Some(Utc.with_ymd_and_hms(2026, 7, 20, 10, 0, 0).unwrap()),
            reset_date: None,
            clear_date: None,
            clear_reason: None,
            total_alarm: 1,
            data_1: Some("eth0".to_string()),
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

    #[test]
    fn effective_host_prefers_name_and_ip() {
        let alarm = sample_alarm(UpstreamState::Unconfirmed, "1");
        assert_eq!(alarm.effective_host(), "core-sw-01@10.0.0.1");
    }

    #[test]
    fn effective_host_falls_back_to_device_id() {
        let mut alarm = sample_alarm(UpstreamState::Unconfirmed, "1");
        alarm.host_name = None;
        alarm.host_ip = None;
        assert_eq!(alarm.effective_host(), "device_7");
    }

    #[test]
    fn effective_host_falls_back_to_unknown_without_device_id() {
        let mut alarm = sample_alarm(UpstreamState::Unconfirmed, "1");
        alarm.host_name = None;
        alarm.host_ip = None;
        alarm.device_id = None;
        assert_eq!(alarm.effective_host(), "device_unknown");
    }

    #[test]
    fn effective_alert_name_falls_back_to_code() {
        let mut alarm = sample_alarm(UpstreamState::Unconfirmed, "1");
        alarm.alarm_name = None;
        assert_eq!(alarm.effective_alert_name(), "ZMC_ALARM_E1001");
    }

    #[test]
    fn resolved_time_uses_reset_date_for_auto_recovered() {
        let mut alarm = sample_alarm(UpstreamState::AutoRecovered, "1");
        alarm.reset_date = Some(Utc.with_ymd_and_hms(2026, 7, 20, 11, 0, 0).unwrap());
        assert_eq!(alarm.resolved_time(), alarm.reset_date);
    }

    #[test]
    fn resolved_time_falls_back_to_confirm_date_for_manually_cleared() {
        let alarm = sample_alarm(UpstreamState::ManuallyCleared, "1");
        assert_eq!(alarm.resolved_time(), alarm.confirm_date);
    }

    #[test]
    fn sanitize_label_value_replaces_newlines_and_quotes() {
        assert_eq!(sanitize_label_value("a\nb\r\"c\""), "a b 'c'");
    }

    #[test]
    fn sanitize_label_value_truncates_long_values() {
        let long = "x".repeat(300);
        let sanitized = sanitize_label_value(&long);
        assert_eq!(sanitized.chars().count(), 256);
        assert!(sanitized.ends_with("..."));
    }

    #[test]
    fn to_notification_sets_ends_at_none_while_active() {
        let alarm = sample_alarm(UpstreamState::Unconfirmed, "1");
        let cfg = SyncConfig::default();
        let notification = to_notification(&alarm, &cfg, Utc::now());
        assert!(notification.ends_at.is_none());
        assert_eq!(notification.severity, "critical");
    }

    #[test]
    fn to_notification_clamps_inverted_window() {
        let mut alarm = sample_alarm(UpstreamState::AutoRecovered, "1");
        alarm.event_time = Some(Utc.with_ymd_and_hms(2026, 7, 20, 12, 0, 0).unwrap());
        alarm.reset_date = Some(Utc.with_ymd_and_hms(2026, 7, 20, 11, 0, 0).unwrap());
        let cfg = SyncConfig::default();
        let notification = to_notification(&alarm, &cfg, Utc::now());
        assert!(notification.starts_at < notification.ends_at.unwrap());
    }

    #[test]
    fn to_notification_starts_at_prefers_event_time_over_create_date() {
        let mut alarm = sample_alarm(UpstreamState::Unconfirmed, "1");
        alarm.event_time = Some(Utc.with_ymd_and_hms(2026, 7, 20, 8, 0, 0).unwrap());
        alarm.create_date = Some(Utc.with_ymd_and_hms(2026, 7, 20, 7, 0, 0).unwrap());
        let cfg = SyncConfig::default();
        let notification = to_notification(&alarm, &cfg, Utc::now());
        assert_eq!(notification.starts_at, alarm.event_time.unwrap());
    }

    #[test]
    fn to_notification_starts_at_falls_back_to_create_date() {
        let mut alarm = sample_alarm(UpstreamState::Unconfirmed, "1");
        alarm.event_time = None;
        alarm.create_date = Some(Utc.with_ymd_and_hms(2026, 7, 20, 7, 0, 0).unwrap());
        let cfg = SyncConfig::default();
        let notification = to_notification(&alarm, &cfg, Utc::now());
        assert_eq!(notification.starts_at, alarm.create_date.unwrap());
    }

    #[test]
    fn build_labels_includes_spec_mandated_label_set() {
        let alarm = sample_alarm(UpstreamState::Unconfirmed, "1");
        let cfg = SyncConfig::default();
        let notification = to_notification(&alarm, &cfg, Utc::now());
        assert_eq!(notification.labels.get("alarm_id").unwrap(), "42");
        assert_eq!(notification.labels.get("event_id").unwrap(), "9001");
        assert_eq!(notification.labels.get("instance").unwrap(), "core-sw-01@10.0.0.1");
        assert_eq!(notification.labels.get("resource_type").unwrap(), "switch");
        assert_eq!(notification.labels.get("application").unwrap(), "network");
        assert_eq!(notification.labels.get("domain").unwrap(), "core");
        assert_eq!(notification.labels.get("env").unwrap(), "production");
        assert_eq!(notification.labels.get("task_type").unwrap(), "fault");
    }

    #[test]
    fn build_labels_omits_host_when_it_duplicates_host_ip() {
        let mut alarm = sample_alarm(UpstreamState::Unconfirmed, "1");
        alarm.host_name = Some("10.0.0.1".to_string());
        let cfg = SyncConfig::default();
        let notification = to_notification(&alarm, &cfg, Utc::now());
        assert!(!notification.labels.contains_key("host"));
    }

    #[test]
    fn build_annotations_includes_data_fields_and_alarm_type() {
        let alarm = sample_alarm(UpstreamState::Unconfirmed, "1");
        let cfg = SyncConfig::default();
        let notification = to_notification(&alarm, &cfg, Utc::now());
        assert_eq!(notification.annotations.get("data_1").unwrap(), "eth0");
        assert_eq!(notification.annotations.get("alarm_type").unwrap(), "Connectivity");
        assert!(notification.annotations.contains_key("summary"));
        assert!(notification.annotations.contains_key("severity_level"));
    }

    #[test]
    fn should_sync_respects_allowed_levels() {
        let alarm = sample_alarm(UpstreamState::Unconfirmed, "3");
        let mut cfg = SyncConfig::default();
        cfg.allowed_levels = Some(vec!["1".to_string(), "2".to_string()]);
        assert!(!should_sync(&alarm, &cfg));
    }
}
