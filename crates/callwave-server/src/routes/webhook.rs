//! Provider Webhook Intake
//!
//! Unauthenticated; the provider signs bodies when a shared secret is set.
//! Every request that passes the signature check is answered 200.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::models::WebhookAck;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Receive a provider lifecycle notification
#[utoipa::path(
    post,
    path = "/callwave/webhooks/provider",
    responses(
        (status = 200, description = "Acknowledged", body = WebhookAck),
        (status = 401, description = "Bad signature")
    ),
    tag = "Webhook"
)]
pub async fn provider_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, (StatusCode, String)> {
    if let Some(secret) = state.webhook_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if !verify_signature(secret, &body, signature) {
            tracing::warn!("🔏 Rejected provider webhook with invalid signature");
            return Err((
                StatusCode::UNAUTHORIZED,
                "Invalid webhook signature".to_string(),
            ));
        }
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("⚠️  Provider webhook with invalid JSON: {}", e);
            return Ok(Json(WebhookAck::skipped(format!("invalid JSON: {e}"))));
        }
    };

    let outcome = state.webhooks.process(&payload).await;
    Ok(Json(WebhookAck::from(outcome)))
}

/// Check a `sha256=<hex>` HMAC of the raw body
fn verify_signature(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(header) = header else {
        return false;
    };
    let hex_digest = header.trim();
    let hex_digest = hex_digest.strip_prefix("sha256=").unwrap_or(hex_digest);

    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

pub fn router() -> Router<AppState> {
    Router::new().route("/callwave/webhooks/provider", post(provider_webhook))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"event":"completed","call_id":"c1"}"#;
        let header = sign("s3cret", body);
        assert!(verify_signature("s3cret", body, Some(&header)));
    }

    #[test]
    fn test_invalid_signatures_rejected() {
        let body = br#"{"event":"completed"}"#;
        let header = sign("s3cret", body);

        assert!(!verify_signature("other", body, Some(&header)));
        assert!(!verify_signature("s3cret", b"{}", Some(&header)));
        assert!(!verify_signature("s3cret", body, Some("sha256=zz")));
        assert!(!verify_signature("s3cret", body, None));
    }
}
