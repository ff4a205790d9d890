//! Callwave API Client

use anyhow::{bail, Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// API Client for Callwave
pub struct CallwaveClient {
    client: Client,
    base_url: String,
    api_key: String,
}

// ============================================
// API Response Types
// ============================================

#[derive(Debug, Deserialize)]
pub struct BatchResponse {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub total_calls: i32,
    pub successful_calls: i32,
    pub failed_calls: i32,
    pub created_at: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallResponse {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub phone_number: String,
    pub reg_no: Option<String>,
    pub external_call_id: Option<String>,
    pub status: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub live_transcript: Option<String>,
    pub final_transcript: Option<String>,
    pub recording_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchDetailResponse {
    pub batch: BatchResponse,
    pub calls: Vec<CallResponse>,
}

#[derive(Debug, Deserialize)]
pub struct DispatchAccepted {
    pub batch_id: Uuid,
    pub total_calls: i32,
    pub watchdog_started: bool,
}

#[derive(Debug, Deserialize)]
pub struct StopSummary {
    pub canceled: usize,
    pub provider_cancels: usize,
    pub batch_completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChangeResponse {
    pub table: String,
    pub id: Uuid,
    pub status: String,
    pub successful_calls: Option<i32>,
    pub failed_calls: Option<i32>,
}

impl ChangeResponse {
    pub fn is_batch_completion(&self) -> bool {
        self.table == "batch" && self.status == "completed"
    }
}

#[derive(Debug, Deserialize)]
pub struct TranscriptResponse {
    pub available: bool,
    pub transcript: Option<String>,
    pub recording_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct SweepReport {
    pub examined: usize,
    pub timed_out: usize,
    pub already_resolved: usize,
    pub cancel_failures: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CallEntryRequest {
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reg_no: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateBatchRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub calls: Vec<CallEntryRequest>,
}

impl CallwaveClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/callwave{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        if self.api_key.is_empty() {
            request
        } else {
            request.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }

    /// Send, fail on non-2xx, parse the JSON body
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let resp = self
            .authorized(request)
            .send()
            .await
            .context("Failed to connect to Callwave API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("API error ({}): {}", status, body);
        }

        resp.json().await.context("Failed to parse response")
    }

    /// Test connection with health check
    pub async fn health(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        let resp = self.client.get(&url).send().await?;
        Ok(resp.status().is_success())
    }

    pub async fn create_batch(&self, request: &CreateBatchRequest) -> Result<BatchResponse> {
        self.send(self.client.post(self.url("/batches")).json(request))
            .await
    }

    pub async fn list_batches(&self) -> Result<Vec<BatchResponse>> {
        self.send(self.client.get(self.url("/batches"))).await
    }

    pub async fn get_batch(&self, batch_id: Uuid) -> Result<BatchDetailResponse> {
        self.send(self.client.get(self.url(&format!("/batches/{}", batch_id))))
            .await
    }

    pub async fn dispatch_batch(&self, batch_id: Uuid) -> Result<DispatchAccepted> {
        self.send(
            self.client
                .post(self.url(&format!("/batches/{}/dispatch", batch_id))),
        )
        .await
    }

    pub async fn stop_batch(&self, batch_id: Uuid) -> Result<StopSummary> {
        self.send(self.client.post(self.url(&format!("/batches/{}/stop", batch_id))))
            .await
    }

    /// Long-poll the next change; `None` when the wait elapsed quietly
    pub async fn next_change(
        &self,
        batch_id: Uuid,
        wait_secs: u64,
    ) -> Result<Option<ChangeResponse>> {
        let request = self
            .client
            .get(self.url(&format!("/batches/{}/changes", batch_id)))
            .query(&[("wait_secs", wait_secs)]);

        let resp = self
            .authorized(request)
            .send()
            .await
            .context("Failed to connect to Callwave API")?;

        match resp.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => {
                let change = resp.json().await.context("Failed to parse response")?;
                Ok(Some(change))
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                bail!("API error ({}): {}", status, body);
            }
        }
    }

    pub async fn get_call(&self, call_id: Uuid) -> Result<CallResponse> {
        self.send(self.client.get(self.url(&format!("/calls/{}", call_id))))
            .await
    }

    pub async fn fetch_transcript(&self, call_id: Uuid) -> Result<TranscriptResponse> {
        self.send(
            self.client
                .post(self.url(&format!("/calls/{}/transcript", call_id))),
        )
        .await
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        self.send(self.client.post(self.url("/watchdog/sweep")))
            .await
    }
}
