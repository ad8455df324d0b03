//! Provider webhook envelope

use super::types::PaymentProvider;
use crate::util::{now_millis, seconds_to_millis};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound provider event, already authenticated upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub provider: PaymentProvider,
    /// Provider's unique event id (deduplication key)
    pub provider_event_id: String,
    /// Provider's event type string, e.g. `checkout.session.completed`
    pub provider_event_type: String,
    /// Unix milliseconds
    pub occurred_at: i64,
    /// Full provider JSON as received
    pub payload: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookParseError {
    #[error("webhook body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("webhook body is missing `{0}`")]
    MissingField(&'static str),
}

impl ProviderEvent {
    /// Read a Stripe event body (`id`, `type`, `created` in seconds).
    pub fn from_stripe_body(body: &[u8]) -> Result<Self, WebhookParseError> {
        let payload: Value = serde_json::from_slice(body)?;
        Self::from_stripe_value(payload)
    }

    pub fn from_stripe_value(payload: Value) -> Result<Self, WebhookParseError> {
        let provider_event_id = payload["id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or(WebhookParseError::MissingField("id"))?
            .to_string();
        let provider_event_type = payload["type"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or(WebhookParseError::MissingField("type"))?
            .to_string();
        let occurred_at = payload["created"]
            .as_i64()
            .map(seconds_to_millis)
            .unwrap_or_else(now_millis);

        Ok(Self {
            provider: PaymentProvider::Stripe,
            provider_event_id,
            provider_event_type,
            occurred_at,
            payload,
        })
    }

    /// `data.object` of the provider payload (Null when absent)
    pub fn object(&self) -> &Value {
        &self.payload["data"]["object"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_stripe_body() {
        let body = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": 1_700_000_000,
            "data": { "object": { "id": "cs_1" } }
        });
        let event = ProviderEvent::from_stripe_body(body.to_string().as_bytes()).unwrap();
        assert_eq!(event.provider_event_id, "evt_1");
        assert_eq!(event.provider_event_type, "checkout.session.completed");
        assert_eq!(event.occurred_at, 1_700_000_000_000);
        assert_eq!(event.object()["id"], "cs_1");
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let err = ProviderEvent::from_stripe_value(json!({ "id": "evt_1" })).unwrap_err();
        assert!(matches!(err, WebhookParseError::MissingField("type")));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(matches!(
            ProviderEvent::from_stripe_body(b"{not json"),
            Err(WebhookParseError::InvalidJson(_))
        ));
    }
}
