//! Response classification
//!
//! Disambiguates success, API-reported error, and undecodable payload from a
//! single complete response body. Transport failures never reach this
//! module; they are forwarded as [`ChatError::Transport`] unchanged.

use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ChatError;

/// Wire shape of an API-reported error body
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorDetail,
}

/// Error payload fields
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl From<ErrorDetail> for ChatError {
    fn from(detail: ErrorDetail) -> Self {
        Self::Api {
            message: detail.message,
            kind: detail.kind,
            param: detail.param,
            code: detail.code,
        }
    }
}

/// Classify a complete response body, first match wins.
///
/// The error envelope is probed before the success shape: the service may
/// report logical errors inside a 2xx body, and error payloads can resemble
/// partial success payloads to a success-first decoder. The HTTP status is
/// only logged, never used to pick a branch.
pub(crate) fn classify<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, ChatError> {
    if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) {
        tracing::warn!(status = %status, kind = %envelope.error.kind, "api reported an error");
        return Err(envelope.error.into());
    }

    match serde_json::from_slice::<T>(body) {
        Ok(value) => Ok(value),
        Err(e) => {
            if !status.is_success() {
                tracing::warn!(status = %status, "undecodable non-success response");
            }
            Err(ChatError::Decode(e))
        }
    }
}

/// Classify a body that can only carry an error, e.g. the non-success
/// response to a streaming request before any SSE frame is read.
pub(crate) fn classify_error(status: StatusCode, body: &[u8]) -> ChatError {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.into(),
        Err(e) => {
            tracing::warn!(status = %status, "undecodable non-success response");
            ChatError::Decode(e)
        }
    }
}
