//! Response envelope.
//!
//! Every event response follows the same shape:
//! `{success: bool, message: string, data?: any}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared::error::ChatError;

/// Uniform success/error envelope for event responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// Successful outcome with a payload.
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Successful outcome without a payload.
    pub fn ok_empty(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    /// Failed outcome.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

impl From<&ChatError> for Envelope {
    fn from(err: &ChatError) -> Self {
        // Infrastructure details stay in the logs; the sender only
        // learns the operation is retryable.
        match err {
            ChatError::Infrastructure(_) => {
                Envelope::error("Service temporarily unavailable, please retry")
            }
            other => Envelope::error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_envelope_shape() {
        let env = Envelope::ok("saved", serde_json::json!({"id": "1"}));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "saved");
        assert_eq!(json["data"]["id"], "1");
    }

    #[test]
    fn test_error_envelope_omits_data() {
        let env = Envelope::error("nope");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_infrastructure_details_not_leaked() {
        let err = ChatError::Infrastructure("database: connection refused at 10.0.0.5".into());
        let env = Envelope::from(&err);
        assert!(!env.message.contains("10.0.0.5"));
        assert!(!env.success);
    }
}
