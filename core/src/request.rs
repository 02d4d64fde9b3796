//! Request core: builds requests and normalizes responses.
//!
//! # Design
//! `RequestCore` holds the base URL and the session store. `build` produces
//! an `HttpRequest` with the JSON content type, any caller headers layered
//! on top, and a bearer token when the store has one. `check_status` turns
//! every non-2xx response into `ApiError::Status`; a body that is not JSON
//! is treated like an empty object, so the error path itself never fails.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::session::SessionStore;

/// Message used when an error body carries no usable `detail`.
pub const DEFAULT_ERROR_MESSAGE: &str = "Request failed";

/// Shared by the task and auth clients. Cloning is cheap.
#[derive(Clone)]
pub struct RequestCore {
    base_url: String,
    session: Arc<dyn SessionStore>,
}

impl fmt::Debug for RequestCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RequestCore {
    pub fn new(base_url: &str, session: Arc<dyn SessionStore>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn from_config(config: &ClientConfig, session: Arc<dyn SessionStore>) -> Self {
        Self::new(&config.base_url, session)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &dyn SessionStore {
        self.session.as_ref()
    }

    /// Build a request for `endpoint` (which must start with `/`).
    ///
    /// Header order: `content-type: application/json`, then `headers` (a
    /// caller value replaces the default for the same name), then
    /// `authorization: Bearer <token>` when a token is stored.
    pub fn build(
        &self,
        method: HttpMethod,
        endpoint: &str,
        headers: &[(&str, &str)],
        body: Option<String>,
    ) -> Result<HttpRequest> {
        if !endpoint.starts_with('/') {
            return Err(ApiError::InvalidEndpoint(endpoint.to_string()));
        }

        let mut request = HttpRequest {
            method,
            url: format!("{}{endpoint}", self.base_url),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body,
        };
        for (name, value) in headers {
            request.set_header(name, *value);
        }
        if let Some(token) = self.session.token()?.filter(|t| !t.is_empty()) {
            request.set_header("authorization", format!("Bearer {token}"));
        }

        debug!(method = %request.method, url = %request.url, "built request");
        Ok(request)
    }

    /// `build` with `body` serialized as JSON.
    pub fn build_json<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: &B,
    ) -> Result<HttpRequest> {
        let body =
            serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        self.build(method, endpoint, &[], Some(body))
    }

    /// Check the status, then decode the body as `T`.
    pub fn parse_json<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T> {
        check_status(&response, DEFAULT_ERROR_MESSAGE)?;
        decode_body(&response)
    }

    /// Check the status and discard the body.
    pub fn parse_empty(&self, response: HttpResponse) -> Result<()> {
        check_status(&response, DEFAULT_ERROR_MESSAGE)
    }
}

/// Map a non-success status to `ApiError::Status`.
///
/// `detail` becomes the message when it is a non-empty string. A list of
/// validation entries (`[{"msg": ...}, ...]`) is joined with `"; "`. Anything
/// else, including a body that is not JSON, yields `fallback`. The two fields
/// are read independently, so a malformed `error_code` never hides `detail`.
pub fn check_status(response: &HttpResponse, fallback: &str) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }

    let body: serde_json::Value =
        serde_json::from_str(&response.body).unwrap_or(serde_json::Value::Null);
    let message = body
        .get("detail")
        .and_then(detail_message)
        .unwrap_or_else(|| fallback.to_string());
    let error_code = body.get("error_code").and_then(error_code);

    debug!(status = response.status, %message, "request failed");
    Err(ApiError::Status {
        status: response.status,
        message,
        error_code,
    })
}

fn error_code(code: &serde_json::Value) -> Option<String> {
    match code {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn detail_message(detail: &serde_json::Value) -> Option<String> {
    match detail {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Array(entries) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(|m| m.as_str()))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

/// Decode a success body. An empty body reads as JSON `null`.
pub fn decode_body<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    let body = response.body.trim();
    let body = if body.is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))
}
