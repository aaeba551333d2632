//! Request identity
//!
//! Authentication happens upstream; this service trusts the `X-Stowage-User` header
//! set by the gateway and resolves it to a user record. Requests without the header
//! act as the guest user.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use stowage_core::models::User;
use stowage_core::AppError;

use crate::constants::USER_HEADER;
use crate::error::HttpAppError;
use crate::state::AppState;

/// The user a request acts as, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

fn user_id(request: &Request) -> Result<Option<u64>, AppError> {
    let Some(value) = request.headers().get(USER_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .map(Some)
        .ok_or_else(|| AppError::Unauthorized(format!("malformed {} header", USER_HEADER)))
}

/// Resolve the caller and attach [`CurrentUser`].
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match user_id(&request) {
        Ok(id) => state.explorer.resolve_user(id).await,
        Err(err) => Err(err),
    };
    match user {
        Ok(user) => {
            tracing::debug!(
                user_id = user.id,
                anonymous = user.is_anonymous(),
                "Request identity resolved"
            );
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Err(err) => HttpAppError(err).into_response(),
    }
}

/// Reject guest callers on routes that act on a user's own files.
pub async fn require_user(request: Request, next: Next) -> Response {
    match request.extensions().get::<CurrentUser>() {
        Some(CurrentUser(user)) if !user.is_anonymous() => next.run(request).await,
        _ => HttpAppError(AppError::Unauthorized("login required".to_string())).into_response(),
    }
}
