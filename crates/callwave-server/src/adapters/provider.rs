//! HTTP Provider Gateway
//!
//! Talks to the voice provider's REST API using reqwest.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use callwave::domain::normalizer::{extract_call_details, extract_external_call_id};
use callwave::{CallDetails, DomainError, ProviderGateway, TriggerRequest};

use crate::config::ProviderConfig;

/// HTTP implementation of ProviderGateway
pub struct HttpProviderGateway {
    client: Client,
    config: ProviderConfig,
}

impl HttpProviderGateway {
    pub fn new(config: ProviderConfig) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| DomainError::ExternalService(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, DomainError> {
        if self.config.base_url.trim().is_empty() {
            return Err(DomainError::ConfigurationMissing(
                "PROVIDER_BASE_URL".to_string(),
            ));
        }
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| DomainError::ConfigurationMissing("PROVIDER_API_KEY".to_string()))?;
        Ok(request.bearer_auth(api_key))
    }

    /// Send a request and return the parsed JSON body of a 2xx answer
    async fn send(&self, request: RequestBuilder) -> Result<Value, DomainError> {
        let response = self
            .authorized(request)?
            .send()
            .await
            .map_err(|e| DomainError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| {
            DomainError::ExternalService(format!("Invalid provider response JSON: {e}"))
        })
    }

    fn trigger_body(&self, request: &TriggerRequest) -> Value {
        let metadata = &request.metadata;
        let mut body = json!({
            "phone_number": request.phone_number,
            "metadata": {
                "call_id": metadata.internal_call_id,
                "batch_id": metadata.batch_id,
                "message": metadata.message,
                "reg_no": metadata.reg_no,
            }
        });
        if let Some(agent_id) = &self.config.agent_id {
            body["agent_id"] = json!(agent_id);
        }
        if let Some(message) = &metadata.message {
            body["first_message"] = json!(message);
        }
        body
    }
}

/// Server-side and throttling failures are worth retrying; other 4xx are not
fn status_error(status: StatusCode, body: &str) -> DomainError {
    let detail = format!("{}: {}", status.as_u16(), truncate(body, 300));
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        DomainError::ProviderUnavailable(detail)
    } else {
        DomainError::ExternalService(detail)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl ProviderGateway for HttpProviderGateway {
    async fn trigger(&self, request: &TriggerRequest) -> Result<String, DomainError> {
        let body = self.trigger_body(request);
        let response = self.send(self.client.post(self.url("calls")).json(&body)).await?;

        extract_external_call_id(&response).ok_or_else(|| {
            DomainError::ExternalService("Provider response carried no call id".to_string())
        })
    }

    async fn cancel(&self, external_call_id: &str) -> Result<(), DomainError> {
        let url = self.url(&format!("calls/{external_call_id}/cancel"));
        self.send(self.client.post(url)).await?;
        Ok(())
    }

    async fn fetch_details(&self, external_call_id: &str) -> Result<CallDetails, DomainError> {
        let url = self.url(&format!("calls/{external_call_id}"));
        let response = self.send(self.client.get(url)).await?;
        Ok(extract_call_details(&response))
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.is_some() && !self.config.base_url.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callwave::TriggerMetadata;
    use uuid::Uuid;

    fn gateway(api_key: Option<&str>) -> HttpProviderGateway {
        HttpProviderGateway::new(ProviderConfig {
            base_url: "https://provider.example/v1/".to_string(),
            api_key: api_key.map(str::to_string),
            agent_id: Some("agent-7".to_string()),
            ..ProviderConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_trigger_body_embeds_internal_ids() {
        let call_id = Uuid::new_v4();
        let batch_id = Uuid::new_v4();
        let body = gateway(Some("k")).trigger_body(&TriggerRequest {
            phone_number: "+15550001".to_string(),
            metadata: TriggerMetadata {
                internal_call_id: call_id,
                batch_id,
                message: Some("Your service is due".to_string()),
                reg_no: None,
            },
        });

        assert_eq!(body["metadata"]["call_id"], json!(call_id));
        assert_eq!(body["metadata"]["batch_id"], json!(batch_id));
        assert_eq!(body["agent_id"], "agent-7");
        assert_eq!(body["first_message"], "Your service is due");
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        assert_eq!(
            gateway(None).url("calls"),
            "https://provider.example/v1/calls"
        );
    }

    #[test]
    fn test_status_error_classification() {
        assert!(status_error(StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(!status_error(StatusCode::BAD_REQUEST, "bad number").is_retryable());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_configuration_error() {
        let gw = gateway(None);
        assert!(!gw.is_configured());

        let result = gw.cancel("abc").await;
        assert!(matches!(result, Err(DomainError::ConfigurationMissing(_))));
    }
}
