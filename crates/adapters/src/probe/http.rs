// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RabbitMQ management API probe

use super::{CapacityProbe, ObservedDepth, ProbeError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use qsem_core::{BrokerConfig, QueueName};
use serde::Deserialize;

/// Queue statistics as reported by `GET /api/queues/{vhost}/{queue}`
///
/// Counts are absent until the broker has sampled a freshly declared queue.
#[derive(Debug, Deserialize)]
struct QueueStats {
    #[serde(default)]
    messages_ready: u64,
    #[serde(default)]
    messages_unacknowledged: u64,
}

/// Probe that queries the management HTTP API
#[derive(Clone)]
pub struct HttpCapacityProbe {
    agent: ureq::Agent,
    url: String,
    authorization: String,
}

impl HttpCapacityProbe {
    pub fn new(config: &BrokerConfig, queue: &QueueName) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.probe_timeout))
            .build()
            .into();
        let credentials = format!("{}:{}", config.username, config.password);

        Self {
            agent,
            url: queue_url(&config.host, config.admin_port, &config.virtual_host, queue),
            authorization: format!("Basic {}", STANDARD.encode(credentials)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn fetch(&self) -> Result<ObservedDepth, ProbeError> {
        let mut response = self
            .agent
            .get(&self.url)
            .header("Authorization", &self.authorization)
            .call()
            .map_err(|e| classify(e, &self.url))?;

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ProbeError::Malformed(format!("failed to read response: {}", e)))?;

        parse_queue_stats(&body)
    }
}

#[async_trait]
impl CapacityProbe for HttpCapacityProbe {
    async fn depth(&self) -> Result<ObservedDepth, ProbeError> {
        // ureq is blocking
        let probe = self.clone();
        tokio::task::spawn_blocking(move || probe.fetch())
            .await
            .map_err(|e| ProbeError::Unreachable(format!("probe task failed: {}", e)))?
    }
}

fn classify(err: ureq::Error, url: &str) -> ProbeError {
    match err {
        ureq::Error::StatusCode(401) | ureq::Error::StatusCode(403) => ProbeError::Unauthorized,
        ureq::Error::StatusCode(404) => ProbeError::QueueNotFound(url.to_string()),
        ureq::Error::StatusCode(code) => ProbeError::Status(code),
        other => ProbeError::Unreachable(other.to_string()),
    }
}

/// Build the management API URL for `queue` in `vhost`; the default vhost `/` becomes `%2F`
pub(crate) fn queue_url(host: &str, port: u16, vhost: &str, queue: &QueueName) -> String {
    format!(
        "http://{}:{}/api/queues/{}/{}",
        host,
        port,
        urlencoding::encode(vhost),
        urlencoding::encode(queue.as_str())
    )
}

pub(crate) fn parse_queue_stats(body: &str) -> Result<ObservedDepth, ProbeError> {
    let stats: QueueStats =
        serde_json::from_str(body).map_err(|e| ProbeError::Malformed(e.to_string()))?;
    Ok(ObservedDepth::new(
        stats.messages_ready,
        stats.messages_unacknowledged,
    ))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
