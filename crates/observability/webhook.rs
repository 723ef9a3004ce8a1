use super::dispatcher::{AlertEvent, AlertSink};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use url::Url;

const SUMMARY_LIMIT: usize = 2000;

/// Posts alerts as JSON to an ops webhook. `text` carries a one-screen summary
/// for chat integrations; `event` carries the structured payload.
pub(crate) struct WebhookAlertSink {
    webhook_url: Url,
    client: Client,
}

impl WebhookAlertSink {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(3)).build()?;
        Ok(Self {
            webhook_url,
            client,
        })
    }
}

pub(crate) fn summarize(event: &AlertEvent) -> String {
    let mut lines = vec![format!(
        "[{}] {} ({}/{}) {}",
        event.level,
        event.service_name,
        event.environment,
        event.component,
        event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    )];

    if let Some(message) = event.message.as_deref().filter(|m| !m.trim().is_empty()) {
        lines.push(message.trim().to_string());
    }
    match &event.location {
        Some(location) => lines.push(format!("at {} ({location})", event.target)),
        None => lines.push(format!("at {}", event.target)),
    }
    for (key, value) in &event.fields {
        lines.push(format!("{key} = {value}"));
    }
    for span in &event.spans {
        for (key, value) in &span.fields {
            lines.push(format!("{}.{key} = {value}", span.name));
        }
    }

    truncate(lines.join("\n"))
}

fn truncate(content: String) -> String {
    const SUFFIX: &str = "\n... (truncated)";

    if content.chars().count() <= SUMMARY_LIMIT {
        return content;
    }
    let allowed = SUMMARY_LIMIT - SUFFIX.chars().count();
    let mut truncated: String = content.chars().take(allowed).collect();
    truncated.push_str(SUFFIX);
    truncated
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn send(&self, event: &AlertEvent) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "text": summarize(event), "event": event }))
            .send()
            .await
            .map_err(|err| {
                // reqwest errors embed the URL, which is a credential.
                if err.is_timeout() {
                    anyhow!("alert webhook request timed out")
                } else if err.is_connect() {
                    anyhow!("alert webhook connection failed")
                } else {
                    anyhow!("alert webhook request failed")
                }
            })?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(anyhow!(
            "alert webhook returned non-success status: {}",
            response.status()
        ))
    }

    fn sink_name(&self) -> &'static str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[test]
    fn summary_lists_fields_and_is_bounded() {
        let mut fields = BTreeMap::new();
        fields.insert("external_id".to_string(), "order_1_abc".to_string());
        fields.insert("detail".to_string(), "x".repeat(5000));

        let summary = summarize(&AlertEvent {
            level: "ERROR".to_string(),
            timestamp: Utc::now(),
            service_name: "backend".to_string(),
            environment: "prod".to_string(),
            component: "backend".to_string(),
            target: "backend::usecases::payments".to_string(),
            location: Some("backend/src/usecases/payments.rs:120".to_string()),
            message: Some("payments: order write failed".to_string()),
            fields,
            spans: Vec::new(),
        });

        assert!(summary.starts_with("[ERROR] backend (prod/backend)"));
        assert!(summary.contains("external_id = order_1_abc"));
        assert!(summary.ends_with("(truncated)"));
        assert!(summary.chars().count() <= SUMMARY_LIMIT);
    }
}
