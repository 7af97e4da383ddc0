//! Elasticsearch document sink for finalized audit records.
//!
//! One finalized transaction becomes one document in a fixed index, written
//! with `PUT /{index}/_doc/{id}` so a rewrite under the same id is an upsert
//! rather than a duplicate. Alongside the [`AuditSink`] implementation the
//! client exposes the small cluster-metadata surface operators poll: ping,
//! cluster health, and the index document count.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use smartlogger_core::event::truncate_for_log;
use smartlogger_core::record::AuditRecord;
use smartlogger_core::sink::{AuditSink, SinkError};
use std::future::Future;
use std::pin::Pin;

/// Maximum response-body length reproduced in errors and logs.
const BODY_TRUNCATE_AT: usize = 512;

/// Cluster health summary, as reported by `_cluster/health`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterHealth {
    /// Cluster name.
    pub cluster_name: String,
    /// Health color: `green`, `yellow` or `red`.
    pub status: String,
    /// Number of nodes in the cluster.
    pub number_of_nodes: u32,
}

/// Elasticsearch client writing audit records into one index.
#[derive(Clone)]
pub struct ElasticsearchSink {
    client: Client,
    base_url: String,
    index: String,
}

impl ElasticsearchSink {
    /// Create a sink writing into `index` at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, index: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            index: index.into(),
        }
    }

    /// The index this sink writes into.
    #[must_use]
    pub fn index(&self) -> &str {
        &self.index
    }

    fn document_url(&self, document_id: &str) -> String {
        format!("{}/{}/_doc/{}", self.base_url, self.index, document_id)
    }

    /// Whether the cluster answers at all.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Unreachable`] on transport failure; an
    /// unexpected HTTP status is reported as `Ok(false)`, not an error.
    pub async fn ping(&self) -> Result<bool, SinkError> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| SinkError::Unreachable(e.to_string()))?;
        Ok(response.status().is_success())
    }

    /// Fetch the cluster health summary.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Unreachable`] on transport failure and
    /// [`SinkError::UnexpectedStatus`] on a non-success response.
    pub async fn cluster_health(&self) -> Result<ClusterHealth, SinkError> {
        let response = self
            .client
            .get(format!("{}/_cluster/health", self.base_url))
            .send()
            .await
            .map_err(|e| SinkError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::UnexpectedStatus {
                status: status.as_u16(),
                body: truncate_for_log(&body, BODY_TRUNCATE_AT).to_string(),
            });
        }

        response
            .json::<ClusterHealth>()
            .await
            .map_err(|e| SinkError::Serialization(e.to_string()))
    }

    /// Count the documents currently in the index.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Unreachable`] on transport failure and
    /// [`SinkError::UnexpectedStatus`] on a non-success response.
    pub async fn document_count(&self) -> Result<u64, SinkError> {
        #[derive(Deserialize)]
        struct CountResponse {
            count: u64,
        }

        let response = self
            .client
            .get(format!("{}/{}/_count", self.base_url, self.index))
            .send()
            .await
            .map_err(|e| SinkError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::UnexpectedStatus {
                status: status.as_u16(),
                body: truncate_for_log(&body, BODY_TRUNCATE_AT).to_string(),
            });
        }

        response
            .json::<CountResponse>()
            .await
            .map(|c| c.count)
            .map_err(|e| SinkError::Serialization(e.to_string()))
    }
}

impl AuditSink for ElasticsearchSink {
    fn upsert(
        &self,
        document_id: &str,
        record: &AuditRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + '_>> {
        let url = self.document_url(document_id);
        let body = serde_json::to_vec(record).map_err(|e| SinkError::Serialization(e.to_string()));
        let document_id = document_id.to_string();

        Box::pin(async move {
            let body = body?;

            let response = self
                .client
                .put(&url)
                .header("content-type", "application/json")
                .body(body)
                .send()
                .await
                .map_err(|e| SinkError::Unreachable(e.to_string()))?;

            match response.status() {
                // 200 on overwrite, 201 on first write.
                StatusCode::OK | StatusCode::CREATED => {
                    tracing::debug!(document_id = %document_id, "Document indexed");
                    Ok(())
                }
                status => {
                    let body = response.text().await.unwrap_or_default();
                    Err(SinkError::UnexpectedStatus {
                        status: status.as_u16(),
                        body: truncate_for_log(&body, BODY_TRUNCATE_AT).to_string(),
                    })
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<ElasticsearchSink>();
        assert_sync::<ElasticsearchSink>();
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let sink = ElasticsearchSink::new("http://localhost:9200/", "audit-records");
        assert_eq!(
            sink.document_url("doc-1"),
            "http://localhost:9200/audit-records/_doc/doc-1"
        );
    }
}
