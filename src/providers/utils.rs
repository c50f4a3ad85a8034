use crate::error::{FailureKind, ServiceFailure};
use async_openai::error::OpenAIError;
use reqwest::StatusCode;

/// Maps an HTTP status to the failure class the retry and rendering logic understand.
pub fn kind_for_status(status: StatusCode) -> FailureKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::Authentication,
        StatusCode::REQUEST_TIMEOUT => FailureKind::Timeout,
        StatusCode::TOO_MANY_REQUESTS => FailureKind::RateLimited,
        s if s.is_server_error() => FailureKind::Server,
        _ => FailureKind::Api,
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> ServiceFailure {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() || err.is_request() {
        FailureKind::Connectivity
    } else if let Some(status) = err.status() {
        kind_for_status(status)
    } else if err.is_decode() {
        FailureKind::InvalidResponse
    } else {
        FailureKind::Connectivity
    };
    ServiceFailure::new(kind, err.to_string())
}

pub fn classify_openai_error(err: OpenAIError) -> ServiceFailure {
    match err {
        OpenAIError::Reqwest(e) => classify_reqwest_error(&e),
        OpenAIError::ApiError(api) => {
            let code = api.code.as_ref().map(|c| c.to_string()).unwrap_or_default();
            let kind_name = api.r#type.clone().unwrap_or_default();
            let kind = if code.contains("invalid_api_key") || api.message.contains("API key") {
                FailureKind::Authentication
            } else if code.contains("insufficient_quota") || kind_name == "insufficient_quota" {
                FailureKind::Api
            } else if code.contains("rate_limit") || kind_name.contains("rate_limit") {
                FailureKind::RateLimited
            } else if kind_name == "server_error" {
                FailureKind::Server
            } else {
                FailureKind::Api
            };
            ServiceFailure::new(kind, api.message)
        }
        OpenAIError::JSONDeserialize(e) => ServiceFailure::invalid_response(e.to_string()),
        OpenAIError::StreamError(message) => {
            if let Some(status) = stream_status(&message) {
                return ServiceFailure::new(kind_for_status(status), message);
            }
            let lowered = message.to_lowercase();
            if lowered.contains("connect") || lowered.contains("transport") || lowered.contains("timed out") {
                ServiceFailure::connectivity(message)
            } else {
                ServiceFailure::new(FailureKind::Api, message)
            }
        }
        other => ServiceFailure::new(FailureKind::Api, other.to_string()),
    }
}

/// Non-2xx replies to a streamed request only reach us as "Invalid status code: 429 ...".
fn stream_status(message: &str) -> Option<StatusCode> {
    let (_, rest) = message.split_once("Invalid status code:")?;
    let code = rest.trim_start().split_whitespace().next()?;
    StatusCode::from_u16(code.parse().ok()?).ok()
}
