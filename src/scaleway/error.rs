//! Classification of Scaleway failures into [`ApiError`].

use reqwest::StatusCode;
use scaleway_rs::ScalewayError;

use crate::cloud::{ApiError, NOT_FOUND_TYPE};

use super::types::ErrorBody;

impl From<ScalewayError> for ApiError {
    fn from(value: ScalewayError) -> Self {
        match value {
            ScalewayError::Api(api_err) => Self::api(api_err.etype, api_err.message),
            other => Self::other(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        Self::other(value.to_string())
    }
}

/// Classifies a non-2xx response from its status and body.
pub(crate) fn classify_response(status: StatusCode, body: &[u8]) -> ApiError {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return ApiError::api(parsed.kind, parsed.message);
    }

    let text = String::from_utf8_lossy(body).trim().to_owned();
    if status == StatusCode::NOT_FOUND {
        return ApiError::api(NOT_FOUND_TYPE, text);
    }
    ApiError::other(format!("HTTP {status}: {text}"))
}
