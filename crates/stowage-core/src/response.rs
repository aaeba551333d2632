//! Service response envelope
//!
//! Every explorer service answers with a `ServiceResponse`: code `0` on success,
//! `-301`/`-302` when the caller must redirect to the URL carried in `data`, and a
//! positive application code otherwise.

use serde::Serialize;

use crate::error::{AppError, ErrorMetadata};

/// Application codes carried in [`ServiceResponse::code`].
pub mod codes {
    pub const SUCCESS: i32 = 0;
    /// Permanent redirect to `data`.
    pub const REDIRECT_PERMANENT: i32 = -301;
    /// Temporary redirect to `data`.
    pub const REDIRECT_TEMPORARY: i32 = -302;
    pub const NOT_SET: i32 = -1;
    /// Request carried no usable identity.
    pub const CHECK_LOGIN: i32 = 401;
    pub const NOT_FOUND: i32 = 404;
    pub const PARAM_ERR: i32 = 40001;
    pub const UPLOAD_FAILED: i32 = 40002;
    pub const OBJECT_EXIST: i32 = 40004;
    pub const SIGN_EXPIRED: i32 = 40005;
    pub const POLICY_NOT_ALLOWED: i32 = 40006;
    pub const GROUP_NOT_ALLOWED: i32 = 40007;
    pub const DB_ERROR: i32 = 50001;
    pub const IO_FAILED: i32 = 50004;
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceResponse {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub msg: String,
    /// Underlying cause, only populated outside production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// HTTP status the transport should use; not part of the body.
    #[serde(skip)]
    pub status: u16,
}

impl ServiceResponse {
    pub fn ok() -> Self {
        Self {
            code: codes::SUCCESS,
            data: None,
            msg: String::new(),
            error: None,
            status: 200,
        }
    }

    pub fn with_data(data: impl Into<serde_json::Value>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::ok()
        }
    }

    /// Redirect instruction; `code` must be one of the redirect codes.
    pub fn redirect(code: i32, url: impl Into<String>) -> Self {
        debug_assert!(code == codes::REDIRECT_PERMANENT || code == codes::REDIRECT_TEMPORARY);
        Self {
            code,
            data: Some(serde_json::Value::String(url.into())),
            msg: String::new(),
            error: None,
            status: if code == codes::REDIRECT_PERMANENT { 301 } else { 302 },
        }
    }

    /// Build an error response. When a cause is attached the HTTP status follows the
    /// cause's metadata, otherwise it is derived from the application code.
    pub fn err(code: i32, msg: impl Into<String>, cause: Option<&AppError>) -> Self {
        let status = match cause {
            Some(err) => err.http_status_code(),
            None if code == codes::NOT_FOUND => 404,
            None if code >= 50000 => 500,
            None => 400,
        };
        Self {
            code,
            data: None,
            msg: msg.into(),
            error: cause.map(|e| e.detailed_message()),
            status,
        }
    }

    /// Parameter error (malformed request input).
    pub fn param_err(msg: impl Into<String>, cause: Option<&AppError>) -> Self {
        let mut resp = Self::err(codes::PARAM_ERR, msg, cause);
        resp.status = 400;
        resp
    }

    pub fn is_success(&self) -> bool {
        self.code == codes::SUCCESS
    }

    pub fn is_redirect(&self) -> bool {
        self.code == codes::REDIRECT_PERMANENT || self.code == codes::REDIRECT_TEMPORARY
    }

    /// The redirect target for `-301`/`-302` responses.
    pub fn redirect_url(&self) -> Option<&str> {
        if !self.is_redirect() {
            return None;
        }
        self.data.as_ref().and_then(|d| d.as_str())
    }

    /// Drop the underlying cause before the response leaves the process.
    pub fn without_cause(mut self) -> Self {
        self.error = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_shape() {
        let json = serde_json::to_value(ServiceResponse::ok()).expect("serialize");
        assert_eq!(json["code"], 0);
        assert!(json.get("data").is_none());
        assert!(json.get("status").is_none());
    }

    #[test]
    fn test_redirect_carries_url() {
        let resp = ServiceResponse::redirect(codes::REDIRECT_TEMPORARY, "https://cdn/x");
        assert!(resp.is_redirect());
        assert_eq!(resp.redirect_url(), Some("https://cdn/x"));
        assert_eq!(resp.status, 302);
    }

    #[test]
    fn test_err_status_follows_cause() {
        let cause = AppError::NotFound("file".to_string());
        let resp = ServiceResponse::err(codes::NOT_SET, "file missing", Some(&cause));
        assert_eq!(resp.status, 404);
        assert_eq!(resp.code, codes::NOT_SET);
        assert!(resp.error.as_deref().unwrap_or_default().contains("file"));
    }

    #[test]
    fn test_err_without_cause_uses_code() {
        let resp = ServiceResponse::err(codes::NOT_FOUND, "archive missing", None);
        assert_eq!(resp.status, 404);
        assert!(resp.error.is_none());
        assert!(resp.redirect_url().is_none());
    }
}
