//! Signed, time-limited routes
//!
//! Each route rebuilds the path its link was issued for and checks the `sign` query
//! parameter against it before doing anything else.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Extension,
};
use serde::Deserialize;
use stowage_core::AppError;
use stowage_explorer::issuer::{archive_path, download_path, perm_source_path, source_path};
use stowage_explorer::{DownloadService, FileAnonymousGetService, Reply};

use crate::error::HttpAppError;
use crate::identity::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignQuery {
    pub sign: Option<String>,
}

fn verify(state: &AppState, path: &str, query: &SignQuery) -> Result<(), HttpAppError> {
    let sign = query
        .sign
        .as_deref()
        .ok_or_else(|| AppError::SignInvalid("missing sign parameter".to_string()))?;
    state.explorer.issuer().verify(path, sign)?;
    Ok(())
}

/// Stream file `id` to an anonymous client under `name`.
pub async fn anonymous_download(
    State(state): State<AppState>,
    Path((id, name)): Path<(u64, String)>,
    Query(query): Query<SignQuery>,
    headers: HeaderMap,
) -> Result<Reply, HttpAppError> {
    verify(&state, &source_path(id, &name), &query)?;
    let reply = FileAnonymousGetService { id, name }
        .download(&state.explorer, &headers)
        .await;
    Ok(state.finish(reply))
}

/// Redirect an anonymous client to a fresh source link for file `id`.
pub async fn source(
    State(state): State<AppState>,
    Path((id, name)): Path<(u64, String)>,
    Query(query): Query<SignQuery>,
) -> Result<Reply, HttpAppError> {
    verify(&state, &perm_source_path(id, &name), &query)?;
    let reply = FileAnonymousGetService { id, name }
        .source(&state.explorer)
        .await;
    Ok(state.finish(reply))
}

/// Serve the file staged under download session `id`.
pub async fn download(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Query(query): Query<SignQuery>,
    headers: HeaderMap,
) -> Result<Reply, HttpAppError> {
    verify(&state, &download_path(&id), &query)?;
    let reply = DownloadService { id }
        .download(&state.explorer, user, &headers)
        .await;
    Ok(state.finish(reply))
}

/// Serve the archive prepared under session `id`.
pub async fn download_archived(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Query(query): Query<SignQuery>,
    headers: HeaderMap,
) -> Result<Reply, HttpAppError> {
    verify(&state, &archive_path(&id), &query)?;
    let reply = DownloadService { id }
        .download_archived(&state.explorer, user, &headers)
        .await;
    Ok(state.finish(reply))
}
