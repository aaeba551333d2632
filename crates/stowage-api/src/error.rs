//! HTTP error response conversion
//!
//! Handlers that fail before reaching an explorer service return `HttpAppError`.
//! It renders the same JSON envelope the services use, so clients only ever parse
//! `ServiceResponse`.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use stowage_core::{codes, AppError, ErrorMetadata, LogLevel, ServiceResponse};

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from stowage-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

/// Convert JSON body deserialization failures into a parameter error.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

/// JSON body extractor that answers malformed bodies with the service envelope.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

/// Application code reported for an error raised outside the services.
pub fn app_code(error: &AppError) -> i32 {
    match error {
        AppError::SignInvalid(_) | AppError::SignExpired => codes::SIGN_EXPIRED,
        AppError::Unauthorized(_) => codes::CHECK_LOGIN,
        AppError::NotFound(_) => codes::NOT_FOUND,
        AppError::InvalidInput(_) => codes::PARAM_ERR,
        AppError::PolicyNotAllowed(_) => codes::POLICY_NOT_ALLOWED,
        AppError::GroupNotAllowed(_) => codes::GROUP_NOT_ALLOWED,
        AppError::Database(_) => codes::DB_ERROR,
        AppError::Io(_) | AppError::Storage(_) => codes::IO_FAILED,
        _ => codes::NOT_SET,
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        log_error(app_error);

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut body = ServiceResponse::err(
            app_code(app_error),
            app_error.client_message(),
            Some(app_error),
        );
        // Hide the cause in production and for anything touching infrastructure.
        if is_production_env() || app_error.is_sensitive() {
            body = body.without_cause();
        }

        (status, Json(body)).into_response()
    }
}
