//! Handlers acting on the caller's own files.

use std::io;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap},
    Extension,
};
use futures::TryStreamExt;
use serde::Deserialize;
use stowage_core::AppError;
use stowage_explorer::{
    FileIdService, OperationParams, PutContentRequest, Reply, SingleFileService,
};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use crate::error::{HttpAppError, ValidatedJson};
use crate::identity::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateFileRequest {
    /// Full virtual path of the new file.
    pub path: String,
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Create an empty file at `path`.
pub async fn create_file(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(body): ValidatedJson<CreateFileRequest>,
) -> Reply {
    let reply = SingleFileService { path: body.path }
        .create(&state.explorer, user)
        .await;
    state.finish(reply)
}

/// Replace the content of file `id` with the request body.
///
/// The upload runs on its own task. If the client goes away the handler future is
/// dropped, which cancels the upload and lets it roll back.
pub async fn put_content(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    body: Body,
) -> Result<Reply, HttpAppError> {
    let stream = body.into_data_stream().map_err(io::Error::other);
    let req = PutContentRequest {
        content_length: header_string(&headers, header::CONTENT_LENGTH),
        mime_type: header_string(&headers, header::CONTENT_TYPE),
        body: Box::pin(StreamReader::new(stream)),
    };

    let cancel = CancellationToken::new();
    let _abort_on_drop = cancel.clone().drop_guard();
    let explorer = state.explorer.clone();
    let upload = tokio::spawn(async move {
        FileIdService
            .put_content(&explorer, user, &OperationParams::by_id(id), req, &cancel)
            .await
    });

    let reply = upload
        .await
        .map_err(|e| AppError::Internal(format!("upload task failed: {}", e)))?;
    Ok(state.finish(reply))
}

async fn preview(
    state: AppState,
    user: CurrentUser,
    id: u64,
    is_text: bool,
    headers: HeaderMap,
) -> Reply {
    let reply = FileIdService
        .preview_content(
            &state.explorer,
            user.0,
            &OperationParams::by_id(id),
            is_text,
            &headers,
        )
        .await;
    state.finish(reply)
}

/// Preview file `id`: proxied content or a redirect to a signed URL.
pub async fn preview_content(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Reply {
    preview(state, user, id, false, headers).await
}

/// Text content of file `id`, for the editor.
pub async fn text_content(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Reply {
    preview(state, user, id, true, headers).await
}

/// Document preview service URL for file `id`.
pub async fn doc_preview(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Reply {
    let reply = FileIdService
        .create_doc_preview_session(&state.explorer, user, &OperationParams::by_id(id))
        .await;
    state.finish(reply)
}

/// Signed download URL for file `id`.
pub async fn create_download_session(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Reply {
    let reply = FileIdService
        .create_download_session(&state.explorer, user, &OperationParams::by_id(id))
        .await;
    state.finish(reply)
}
