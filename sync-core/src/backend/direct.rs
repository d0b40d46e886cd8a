//! Opsgenie-shaped direct-incident backend: per-alarm create/close/acknowledge,
//! no batch support, no true silence listing.
//!
//! Suppression here is a true acknowledge-by-alias, not a silence:
//! `create_suppression` acknowledges the alert and returns the alias as the
//! suppression id; `delete_suppression` closes by alias. This is
//! backend-specific behavior, not papered over with a fake silence store.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::DirectIncidentConfig;
use crate::error::{Error, Result};
use crate::model::{Notification, SuppressionRule};

use super::retry::{classify_transport_error, with_retry};
use super::{BackendClient, PushOutcome};

const MESSAGE_MAX: usize = 130;
const DESCRIPTION_MAX: usize = 15000;
const TAGS_MAX: usize = 20;

#[derive(Debug, Serialize)]
struct Responder {
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct CreateAlertPayload {
    message: String,
    alias: String,
    priority: String,
    tags: Vec<String>,
    details: HashMap<String, String>,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    responders: Option<Vec<Responder>>,
}

#[derive(Debug, Deserialize)]
struct OpenAlertEntry {
    alias: String,
}

#[derive(Debug, Deserialize)]
struct ListAlertsResponse {
    data: Vec<OpenAlertEntry>,
}

fn priority_for(severity: &str) -> &'static str {
    match severity {
        "critical" => "P1",
        "error" => "P2",
        "warning" => "P3",
        "info" => "P4",
        _ => "",
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    if value.chars().count() > max {
        value.chars().take(max).collect()
    } else {
        value.to_string()
    }
}

fn alias_for(alarm_id: i64) -> String {
    format!("zmc-{alarm_id}")
}

fn build_payload(n: &Notification, cfg: &DirectIncidentConfig) -> CreateAlertPayload {
    let priority = priority_for(&n.severity);
    let priority = if priority.is_empty() { cfg.default_priority.clone() } else { priority.to_string() };

    let mut tags = vec!["zmc".to_string(), format!("alarm_code:{}", n.labels.get("alarm_code").cloned().unwrap_or_default())];
    if let Some(source) = n.labels.get("source") {
        tags.push(source.clone());
    }
    tags.push(n.severity.clone());
    tags.truncate(TAGS_MAX);

    let mut details = HashMap::new();
    for (key, value) in &n.labels {
        if key == "alertname" {
            continue;
        }
        details.insert(format!("label_{key}"), value.clone());
    }
    for (key, value) in &n.annotations {
        details.insert(format!("annotation_{key}"), value.clone());
    }

    let description = n
        .annotations
        .get("description")
        .cloned()
        .unwrap_or_default();

    CreateAlertPayload {
        message: truncate_chars(&n.alert_name, MESSAGE_MAX),
        alias: alias_for(n.alarm_id),
        priority,
        tags,
        details,
        description: truncate_chars(&description, DESCRIPTION_MAX),
        responders: cfg.team.as_ref().map(|team| vec![Responder { name: team.clone(), kind: "team" }]),
    }
}

pub struct DirectIncidentClient {
    client: Client,
    cfg: DirectIncidentConfig,
}

impl DirectIncidentClient {
    pub fn new(client: Client, cfg: DirectIncidentConfig) -> Self {
        Self { client, cfg }
    }

    fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.cfg.retry_interval_secs)
    }

    fn auth_header(&self) -> String {
        format!("GenieKey {}", self.cfg.api_key)
    }
}

impl BackendClient for DirectIncidentClient {
    async fn push(&self, notifications: &[Notification]) -> Result<PushOutcome> {
        let mut accepted = 0usize;
        for notification in notifications {
            let payload = build_payload(notification, &self.cfg);
            let url = format!("{}/v2/alerts", self.cfg.base_url);
            let body = serde_json::to_vec(&payload).map_err(|e| Error::Mapper(e.to_string()))?;

            with_retry(self.cfg.retry_count, self.retry_interval(), || async {
                let response = self
                    .client
                    .post(&url)
                    .header("Content-Type", "application/json; charset=utf-8")
                    .header("Authorization", self.auth_header())
                    .body(body.clone())
                    .send()
                    .await
                    .map_err(|e| classify_transport_error(&e))?;

                if response.status().is_success() {
                    Ok(())
                } else {
                    let status = response.status().as_u16();
                    let text = response.text().await.unwrap_or_default();
                    Err(Error::backend_permanent(format!("direct-incident push rejected: {text}"), Some(status)))
                }
            })
            .await?;
            accepted += 1;
        }
        Ok(PushOutcome { accepted, backend_ref: None })
    }

    /// Acknowledges the alert by alias. Not a real silence; see module docs.
    async fn create_suppression(&self, rule: &SuppressionRule) -> Result<String> {
        let alias = alias_for(rule.alarm_id);
        let url = format!("{}/v2/alerts/{}/acknowledge?identifierType=alias", self.cfg.base_url, alias);

        with_retry(self.cfg.retry_count, self.retry_interval(), || async {
            let response = self
                .client
                .post(&url)
                .header("Authorization", self.auth_header())
                .send()
                .await
                .map_err(|e| classify_transport_error(&e))?;

            // 404: alert already gone upstream, nothing to acknowledge -> success.
            if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
                Ok(())
            } else {
                let status = response.status().as_u16();
                Err(Error::backend_permanent("acknowledge rejected", Some(status)))
            }
        })
        .await?;

        Ok(alias)
    }

    /// Closes the alert by alias (the suppression id returned by
    /// `create_suppression` is the alias itself).
    async fn delete_suppression(&self, suppression_id: &str) -> Result<()> {
        let url = format!("{}/v2/alerts/{}/close?identifierType=alias", self.cfg.base_url, suppression_id);
        with_retry(self.cfg.retry_count, self.retry_interval(), || async {
            let response = self
                .client
                .post(&url)
                .header("Authorization", self.auth_header())
                .send()
                .await
                .map_err(|e| classify_transport_error(&e))?;

            if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
                Ok(())
            } else {
                let status = response.status().as_u16();
                Err(Error::backend_permanent("close rejected", Some(status)))
            }
        })
        .await
    }

    /// Direct-incident backends don't support listing silences.
    async fn list_suppressions(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn list_active(&self) -> Result<Vec<String>> {
        let url = format!("{}/v2/alerts?query=status:open", self.cfg.base_url);
        let response_body = with_retry(self.cfg.retry_count, self.retry_interval(), || async {
            let response = self
                .client
                .get(&url)
                .header("Authorization", self.auth_header())
                .send()
                .await
                .map_err(|e| classify_transport_error(&e))?;

            if response.status().is_success() {
                response
                    .json::<ListAlertsResponse>()
                    .await
                    .map_err(|e| Error::backend_permanent(e.to_string(), None))
            } else {
                let status = response.status().as_u16();
                Err(Error::backend_permanent("open alert listing rejected", Some(status)))
            }
        })
        .await?;

        Ok(response_body.data.into_iter().map(|e| e.alias).collect())
    }

    async fn health(&self) -> Result<()> {
        let url = format!("{}/v2/account", self.cfg.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::backend_transient("direct-incident health check failed", Some(response.status().as_u16())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_notification() -> Notification {
        let mut labels = HashMap::new();
        labels.insert("alertname".to_string(), "x".repeat(200));
        labels.insert("alarm_code".to_string(), "E1001".to_string());
        labels.insert("source".to_string(), "network".to_string());
        let mut annotations = HashMap::new();
        annotations.insert("description".to_string(), "some description".to_string());
        Notification {
            alarm_id: 7,
            alert_name: "x".repeat(200),
            severity: "critical".to_string(),
            labels,
            annotations,
            starts_at: chrono::Utc::now(),
            ends_at: None,
        }
    }

    #[test]
    fn message_is_truncated_to_130_chars() {
        let cfg = DirectIncidentConfig::default();
        let payload = build_payload(&sample_notification(), &cfg);
        assert_eq!(payload.message.chars().count(), MESSAGE_MAX);
    }

    #[test]
    fn priority_maps_from_severity() {
        assert_eq!(priority_for("critical"), "P1");
        assert_eq!(priority_for("error"), "P2");
        assert_eq!(priority_for("warning"), "P3");
        assert_eq!(priority_for("info"), "P4");
    }

    #[test]
    fn alias_is_zmc_prefixed() {
        assert_eq!(alias_for(7), "zmc-7");
    }

    #[test]
    fn tags_include_zmc_code_source_and_severity() {
        let cfg = DirectIncidentConfig::default();
        let payload = build_payload(&sample_notification(), &cfg);
        assert!(payload.tags.contains(&"zmc".to_string()));
        assert!(payload.tags.contains(&"alarm_code:E1001".to_string()));
        assert!(payload.tags.contains(&"network".to_string()));
        assert!(payload.tags.contains(&"critical".to_string()));
    }
}
