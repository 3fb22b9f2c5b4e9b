//! Response envelope for request layers.
//!
//! An [`Envelope`] is either the operation's payload or an [`ErrorBody`]
//! carrying the stable error kind and a human-readable message.

use serde::{Deserialize, Serialize};

use crate::error::{CadenceError, CadenceResult, ErrorKind};

/// Error half of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_kind: ErrorKind,
    pub message: String,
}

impl From<&CadenceError> for ErrorBody {
    fn from(err: &CadenceError) -> Self {
        Self {
            error_kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Payload or error, serialized without a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Error(ErrorBody),
    Ok(T),
}

impl<T> Envelope<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Error kind, if this envelope carries an error.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error(body) => Some(body.error_kind),
            Self::Ok(_) => None,
        }
    }
}

impl<T> From<CadenceResult<T>> for Envelope<T> {
    fn from(result: CadenceResult<T>) -> Self {
        match result {
            Ok(payload) => Self::Ok(payload),
            Err(err) => Self::Error(ErrorBody::from(&err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LearnerStats;
    use serde_json::json;

    #[test]
    fn test_error_envelope_shape() {
        let envelope: Envelope<LearnerStats> =
            Err(CadenceError::invalid_field("limit", "limit must be between 1 and 100")).into();
        assert!(!envelope.is_ok());
        assert_eq!(envelope.error_kind(), Some(ErrorKind::InvalidArgument));

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["error_kind"], json!("invalid_argument"));
        assert!(value["message"].as_str().unwrap().contains("between 1 and 100"));
    }

    #[test]
    fn test_ok_envelope_is_bare_payload() {
        let stats = LearnerStats {
            learner_id: "brett".to_string(),
            total_items: 3,
            ..Default::default()
        };
        let envelope: Envelope<LearnerStats> = Ok(stats.clone()).into();
        assert!(envelope.is_ok());

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["learner_id"], json!("brett"));
        assert!(value.get("error_kind").is_none());

        let back: Envelope<LearnerStats> = serde_json::from_value(value).unwrap();
        assert_eq!(back, Envelope::Ok(stats));
    }

    #[test]
    fn test_error_envelope_deserializes() {
        let value = json!({"error_kind": "not_found", "message": "Item not found: x"});
        let envelope: Envelope<LearnerStats> = serde_json::from_value(value).unwrap();
        assert_eq!(envelope.error_kind(), Some(ErrorKind::NotFound));
    }
}
