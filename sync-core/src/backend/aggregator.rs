//! Alertmanager-shaped aggregator backend: batch POST `/api/v2/alerts`,
//! explicit Silence API, health via `/-/healthy`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AggregatorConfig;
use crate::error::{Error, Result};
use crate::model::{Notification, SuppressionRule};

use super::retry::{classify_transport_error, with_retry};
use super::{BackendClient, PushOutcome};

#[derive(Debug, Serialize)]
struct AlertPayload {
    labels: std::collections::HashMap<String, String>,
    annotations: std::collections::HashMap<String, String>,
    #[serde(rename = "startsAt")]
    starts_at: DateTime<Utc>,
    #[serde(rename = "endsAt", skip_serializing_if = "Option::is_none")]
    ends_at: Option<DateTime<Utc>>,
}

impl From<&Notification> for AlertPayload {
    fn from(n: &Notification) -> Self {
        Self {
            labels: n.labels.clone(),
            annotations: n.annotations.clone(),
            starts_at: n.starts_at,
            ends_at: n.ends_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct SilencePayload {
    matchers: Vec<Matcher>,
    #[serde(rename = "startsAt")]
    starts_at: DateTime<Utc>,
    #[serde(rename = "endsAt")]
    ends_at: DateTime<Utc>,
    #[serde(rename = "createdBy")]
    created_by: String,
    comment: String,
}

#[derive(Debug, Serialize)]
struct Matcher {
    name: String,
    value: String,
    #[serde(rename = "isEqual")]
    is_equal: bool,
    #[serde(rename = "isRegex")]
    is_regex: bool,
}

#[derive(Debug, Deserialize)]
struct SilenceCreateResponse {
    #[serde(rename = "silenceID")]
    silence_id: String,
}

#[derive(Debug, Deserialize)]
struct SilenceListEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ActiveAlertEntry {
    fingerprint: String,
}

pub struct AggregatorClient {
    client: Client,
    cfg: AggregatorConfig,
}

impl AggregatorClient {
    pub fn new(client: Client, cfg: AggregatorConfig) -> Self {
        Self { client, cfg }
    }

    fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.cfg.retry_interval_secs)
    }
}

impl BackendClient for AggregatorClient {
    async fn push(&self, notifications: &[Notification]) -> Result<PushOutcome> {
        if notifications.is_empty() {
            return Ok(PushOutcome { accepted: 0, backend_ref: None });
        }
        let payload: Vec<AlertPayload> = notifications.iter().map(AlertPayload::from).collect();
        let url = format!("{}{}", self.cfg.base_url, self.cfg.alerts_path);
        let body = serde_json::to_vec(&payload).map_err(|e| Error::Mapper(e.to_string()))?;

        with_retry(self.cfg.retry_count, self.retry_interval(), || async {
            let response = self
                .client
                .post(&url)
                .header("Content-Type", "application/json; charset=utf-8")
                .body(body.clone())
                .send()
                .await
                .map_err(|e| classify_transport_error(&e))?;

            if response.status().is_success() {
                Ok(())
            } else {
                let status = response.status().as_u16();
                let text = response.text().await.unwrap_or_default();
                Err(Error::backend_permanent(format!("aggregator push rejected: {text}"), Some(status)))
            }
        })
        .await?;

        Ok(PushOutcome {
            accepted: notifications.len(),
            backend_ref: None,
        })
    }

    async fn create_suppression(&self, rule: &SuppressionRule) -> Result<String> {
        let matchers = rule
            .matchers
            .iter()
            .map(|(name, value)| Matcher {
                name: name.clone(),
                value: value.clone(),
                is_equal: true,
                is_regex: false,
            })
            .collect();
        let payload = SilencePayload {
            matchers,
            starts_at: rule.starts_at,
            ends_at: rule.ends_at,
            created_by: "zmc-alarm-sync".to_string(),
            comment: rule.comment.clone(),
        };
        let url = format!("{}{}", self.cfg.base_url, self.cfg.silences_path);
        let body = serde_json::to_vec(&payload).map_err(|e| Error::Mapper(e.to_string()))?;

        let response_body = with_retry(self.cfg.retry_count, self.retry_interval(), || async {
            let response = self
                .client
                .post(&url)
                .header("Content-Type", "application/json; charset=utf-8")
                .body(body.clone())
                .send()
                .await
                .map_err(|e| classify_transport_error(&e))?;

            if response.status().is_success() {
                response
                    .json::<SilenceCreateResponse>()
                    .await
                    .map_err(|e| Error::backend_permanent(e.to_string(), None))
            } else {
                let status = response.status().as_u16();
                Err(Error::backend_permanent("silence creation rejected", Some(status)))
            }
        })
        .await?;

        Ok(response_body.silence_id)
    }

    async fn delete_suppression(&self, suppression_id: &str) -> Result<()> {
        let url = format!("{}{}/{}", self.cfg.base_url, self.cfg.silences_path, suppression_id);
        with_retry(self.cfg.retry_count, self.retry_interval(), || async {
            let response = self
                .client
                .delete(&url)
                .send()
                .await
                .map_err(|e| classify_transport_error(&e))?;
            if response.status().is_success() || response.status() == reqwest::StatusCode::NOT_FOUND {
                Ok(())
            } else {
                let status = response.status().as_u16();
                Err(Error::backend_permanent("silence deletion rejected", Some(status)))
            }
        })
        .await
    }

    async fn list_suppressions(&self) -> Result<Vec<String>> {
        let url = format!("{}{}", self.cfg.base_url, self.cfg.silences_path);
        let entries: Vec<SilenceListEntry> = with_retry(self.cfg.retry_count, self.retry_interval(), || async {
            let response = self.client.get(&url).send().await.map_err(|e| classify_transport_error(&e))?;
            if response.status().is_success() {
                response
                    .json::<Vec<SilenceListEntry>>()
                    .await
                    .map_err(|e| Error::backend_permanent(e.to_string(), None))
            } else {
                let status = response.status().as_u16();
                Err(Error::backend_permanent("silence listing rejected", Some(status)))
            }
        })
        .await?;

        Ok(entries.into_iter().map(|e| e.id).collect())
    }

    async fn list_active(&self) -> Result<Vec<String>> {
        let url = format!("{}{}", self.cfg.base_url, self.cfg.alerts_path);
        let entries: Vec<ActiveAlertEntry> = with_retry(self.cfg.retry_count, self.retry_interval(), || async {
            let response = self.client.get(&url).send().await.map_err(|e| classify_transport_error(&e))?;
            if response.status().is_success() {
                response
                    .json::<Vec<ActiveAlertEntry>>()
                    .await
                    .map_err(|e| Error::backend_permanent(e.to_string(), None))
            } else {
                let status = response.status().as_u16();
                Err(Error::backend_permanent("active alert listing rejected", Some(status)))
            }
        })
        .await?;

        Ok(entries.into_iter().map(|e| e.fingerprint).collect())
    }

    async fn health(&self) -> Result<()> {
        let url = format!("{}{}", self.cfg.base_url, self.cfg.health_path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::backend_transient("aggregator health check failed", Some(response.status().as_u16())))
        }
    }
}
