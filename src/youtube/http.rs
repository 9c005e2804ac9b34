//! HTTP utilities for YouTube Data API calls

use crate::error::ApiError;
use reqwest::{Client, StatusCode};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut cut = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Classify a non-success API response into the error taxonomy.
///
/// YouTube error bodies look like:
/// `{"error": {"code": 403, "message": "...", "errors": [{"reason": "quotaExceeded"}]}}`
pub fn classify_api_error(status: StatusCode, body: &str) -> ApiError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    let reason = error
        .and_then(|e| e.get("errors"))
        .and_then(|a| a.get(0))
        .and_then(|e| e.get("reason"))
        .and_then(|r| r.as_str())
        .unwrap_or("");

    let message = error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .unwrap_or("no error message")
        .to_string();

    match reason {
        "quotaExceeded" | "dailyLimitExceeded" => return ApiError::QuotaExceeded,
        "rateLimitExceeded" | "userRateLimitExceeded" => return ApiError::RateLimited,
        "authError" | "unauthorized" => return ApiError::AuthFailure(message),
        "forbidden" | "notFound" | "videoNotFound" | "playlistNotFound" => {
            return ApiError::RemoteRejected {
                code: reason.to_string(),
                message,
            }
        }
        _ => {}
    }

    // Fall back to the HTTP status when the body carries no known reason
    match status {
        StatusCode::UNAUTHORIZED => ApiError::AuthFailure(message),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
        StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => ApiError::RemoteRejected {
            code: status.as_u16().to_string(),
            message,
        },
        _ => ApiError::Remote {
            code: status.as_u16().to_string(),
            message,
        },
    }
}

/// Map a reqwest transport error into the taxonomy
fn classify_transport_error(err: reqwest::Error) -> ApiError {
    ApiError::NetworkUnreachable(err.to_string())
}

/// HTTP client wrapper for YouTube API calls
#[derive(Clone)]
pub struct YtHttpClient {
    client: Client,
}

impl YtHttpClient {
    /// Create a new HTTP client
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ytbulk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {e}"))?;

        Ok(Self { client })
    }

    /// Make a GET request to a YouTube API endpoint
    pub async fn get(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, ApiError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(token)
            .send()
            .await
            .map_err(classify_transport_error)?;

        Self::read_json(response).await
    }

    /// Make a PUT request to a YouTube API endpoint
    pub async fn put(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, &str)],
        body: &Value,
    ) -> Result<Value, ApiError> {
        tracing::debug!("PUT {}", url);

        let response = self
            .client
            .put(url)
            .query(query)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();
        let body = response.text().await.map_err(classify_transport_error)?;

        if !status.is_success() {
            // Only log sanitized/truncated error bodies to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(classify_api_error(status, &body));
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Remote {
            code: "malformed-json".to_string(),
            message: e.to_string(),
        })
    }
}

impl Default for YtHttpClient {
    fn default() -> Self {
        Self::new().expect("Failed to create default HTTP client")
    }
}
