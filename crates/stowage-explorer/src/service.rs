//! Explorer services
//!
//! Request-level operations. Each one builds a `FileSystem` for the caller, wires the
//! hooks its semantics need and reports the outcome as a [`Reply`]: a JSON
//! `ServiceResponse`, a redirect, or streamed content.

use std::sync::Arc;

use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use http::{HeaderMap, StatusCode};
use stowage_core::models::{FileRecord, FolderRecord, User};
use stowage_core::settings::names;
use stowage_core::{codes, AppError, ErrorMetadata, ServiceResponse};
use stowage_storage::ByteReader;
use tokio_util::sync::CancellationToken;

use crate::conflict::{resolve_overwrite, Resolution};
use crate::delivery::{self, ServeOptions};
use crate::explorer::Explorer;
use crate::filesystem::{FileSystem, PreviewResponse, UploadRequest};
use crate::hooks::{
    ChangeCapacity, CleanFileContent, ClearFileSize, GenericAfterUpdate, GenericAfterUpload,
    GiveBackCapacity, HookStage, ResetPolicy, ValidateDestination, ValidateFile,
};
use crate::issuer::SignedAccessIssuer;
use crate::session::{SessionValue, ARCHIVE_PREFIX, DOWNLOAD_PREFIX};

/// Outcome of a service call.
#[derive(Debug)]
pub enum Reply {
    Json(ServiceResponse),
    /// Send the client to the URL carried by `response`.
    Redirect {
        response: ServiceResponse,
        max_age: Option<u64>,
    },
    /// Content already rendered as an HTTP response.
    Content(Response),
}

impl Reply {
    /// The JSON body of the reply; `None` for streamed content.
    pub fn response(&self) -> Option<&ServiceResponse> {
        match self {
            Reply::Json(response) | Reply::Redirect { response, .. } => Some(response),
            Reply::Content(_) => None,
        }
    }

    /// Application code of the reply. Streamed content counts as success.
    pub fn code(&self) -> i32 {
        self.response().map_or(codes::SUCCESS, |response| response.code)
    }

    /// Drop error causes, for environments that must not leak internals.
    pub fn without_cause(self) -> Self {
        match self {
            Reply::Json(response) => Reply::Json(response.without_cause()),
            other => other,
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Reply::Json(response) => {
                let status =
                    StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, Json(response)).into_response()
            }
            Reply::Redirect { response, max_age } => {
                let status =
                    StatusCode::from_u16(response.status).unwrap_or(StatusCode::FOUND);
                let url = response.redirect_url().unwrap_or_default();
                match delivery::redirect(status, url, max_age) {
                    Ok(redirect) => redirect,
                    Err(err) => Reply::Json(fail(codes::NOT_SET, err)).into_response(),
                }
            }
            Reply::Content(response) => response,
        }
    }
}

fn fail(code: i32, err: AppError) -> ServiceResponse {
    tracing::debug!(
        code,
        error_code = err.error_code(),
        error = %err,
        "Explorer operation failed"
    );
    ServiceResponse::err(code, err.to_string(), Some(&err))
}

fn fail_reply(code: i32, err: AppError) -> Reply {
    Reply::Json(fail(code, err))
}

/// Split a full virtual path into its parent folder and base name.
fn split_path(path: &str) -> (String, String) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some(("", name)) => ("/".to_string(), name.to_string()),
        Some((dir, name)) => (dir.to_string(), name.to_string()),
        None => ("/".to_string(), trimmed.to_string()),
    }
}

/// Operates on a single file addressed by its full virtual path.
#[derive(Debug, Clone)]
pub struct SingleFileService {
    pub path: String,
}

impl SingleFileService {
    /// Create an empty file; fails when the name is taken.
    #[tracing::instrument(skip(self, explorer, user), fields(path = %self.path, user_id = user.id))]
    pub async fn create(&self, explorer: &Explorer, user: User) -> Reply {
        let mut fs = match explorer.filesystem(user).await {
            Ok(fs) => fs,
            Err(err) => return fail_reply(codes::POLICY_NOT_ALLOWED, err),
        };

        fs.use_hook(HookStage::BeforeUpload, Arc::new(ValidateFile));
        fs.use_hook(
            HookStage::BeforeUpload,
            Arc::new(ValidateDestination {
                disable_overwrite: true,
            }),
        );
        fs.use_hook(HookStage::AfterUpload, Arc::new(GenericAfterUpload));

        let (virtual_path, name) = split_path(&self.path);
        let req = UploadRequest {
            virtual_path,
            name,
            size: 0,
            mime_type: None,
            reader: Box::pin(tokio::io::empty()),
            original: None,
        };
        match fs.upload(req, &CancellationToken::new()).await {
            Ok(_) => Reply::Json(ServiceResponse::ok()),
            Err(err) => fail_reply(codes::UPLOAD_FAILED, err),
        }
    }
}

/// Serves content staged under a session token.
#[derive(Debug, Clone)]
pub struct DownloadService {
    pub id: String,
}

impl DownloadService {
    /// Serve a prepared archive.
    #[tracing::instrument(skip_all, fields(session_id = %self.id))]
    pub async fn download_archived(
        &self,
        explorer: &Explorer,
        user: User,
        headers: &HeaderMap,
    ) -> Reply {
        let fs = match explorer.filesystem(user).await {
            Ok(fs) => fs,
            Err(err) => return fail_reply(codes::POLICY_NOT_ALLOWED, err),
        };

        let key = format!("{}{}", ARCHIVE_PREFIX, self.id);
        let Some(SessionValue::Archive(path)) = explorer.sessions().get(&key).await else {
            return Reply::Json(ServiceResponse::err(codes::NOT_FOUND, "archive not found", None));
        };

        let content = match fs.get_physical_file_content(&path).await {
            Ok(content) => content,
            Err(err) => return fail_reply(codes::NOT_SET, err),
        };

        if fs.user.group.options.one_time_download {
            explorer
                .sessions()
                .deletes(&[self.id.as_str()], ARCHIVE_PREFIX)
                .await;
        }

        let options = ServeOptions::new("", Some(Utc::now()))
            .attachment(None)
            .content_type("application/zip");
        match delivery::serve_content(headers, content, &options).await {
            Ok(response) => Reply::Content(response),
            Err(err) => fail_reply(codes::IO_FAILED, err),
        }
    }

    /// Serve the file staged by a download session.
    #[tracing::instrument(skip_all, fields(session_id = %self.id))]
    pub async fn download(&self, explorer: &Explorer, user: User, headers: &HeaderMap) -> Reply {
        let mut fs = match explorer.filesystem(user).await {
            Ok(fs) => fs,
            Err(err) => return fail_reply(codes::POLICY_NOT_ALLOWED, err),
        };

        let key = format!("{}{}", DOWNLOAD_PREFIX, self.id);
        let Some(SessionValue::Download(file)) = explorer.sessions().get(&key).await else {
            return Reply::Json(ServiceResponse::err(
                codes::NOT_FOUND,
                "download session not found",
                None,
            ));
        };

        fs.set_target_file(vec![file]);
        let (file, content) = match fs.get_download_content().await {
            Ok(found) => found,
            Err(err) => return fail_reply(codes::NOT_SET, err),
        };

        if fs.user.group.options.one_time_download {
            explorer
                .sessions()
                .deletes(&[self.id.as_str()], DOWNLOAD_PREFIX)
                .await;
        }

        let options =
            ServeOptions::new(file.name.clone(), Some(file.updated_at)).attachment(Some(&file.name));
        match delivery::serve_content(headers, content, &options).await {
            Ok(response) => Reply::Content(response),
            Err(err) => fail_reply(codes::IO_FAILED, err),
        }
    }
}

/// Signed, unauthenticated access to a file.
#[derive(Debug, Clone)]
pub struct FileAnonymousGetService {
    pub id: u64,
    pub name: String,
}

impl FileAnonymousGetService {
    async fn target(&self, explorer: &Explorer) -> Result<FileSystem, Reply> {
        let mut fs = explorer
            .anonymous_filesystem()
            .await
            .map_err(|err| fail_reply(codes::GROUP_NOT_ALLOWED, err))?;
        fs.set_target_file_by_ids(&[self.id])
            .await
            .map_err(|err| fail_reply(codes::NOT_SET, err))?;
        Ok(fs)
    }

    /// Stream the file under the name the link was issued for.
    #[tracing::instrument(skip_all, fields(file_id = self.id))]
    pub async fn download(&self, explorer: &Explorer, headers: &HeaderMap) -> Reply {
        let fs = match self.target(explorer).await {
            Ok(fs) => fs,
            Err(reply) => return reply,
        };
        let (file, content) = match fs.get_download_content().await {
            Ok(found) => found,
            Err(err) => return fail_reply(codes::NOT_SET, err),
        };

        let options = ServeOptions::new(self.name.clone(), Some(file.updated_at));
        match delivery::serve_content(headers, content, &options).await {
            Ok(response) => Reply::Content(response),
            Err(err) => fail_reply(codes::IO_FAILED, err),
        }
    }

    /// Redirect to a fresh source link for the file.
    #[tracing::instrument(skip_all, fields(file_id = self.id))]
    pub async fn source(&self, explorer: &Explorer) -> Reply {
        let fs = match self.target(explorer).await {
            Ok(fs) => fs,
            Err(reply) => return reply,
        };
        let file = match fs.first_target() {
            Ok(file) => file.clone(),
            Err(err) => return fail_reply(codes::NOT_SET, err),
        };
        let ttl = explorer.issuer().ttl(names::PREVIEW_TIMEOUT);
        match fs.sign_url(&file, ttl, false).await {
            Ok(url) => Reply::Redirect {
                response: ServiceResponse::redirect(codes::REDIRECT_TEMPORARY, url),
                max_age: None,
            },
            Err(err) => fail_reply(codes::NOT_SET, err),
        }
    }
}

/// Target of a `FileIdService` call.
///
/// A file already resolved by the caller wins over `object_id`; a folder makes
/// `path` resolve relative to it.
#[derive(Debug, Clone, Default)]
pub struct OperationParams {
    pub object_id: Option<u64>,
    pub file: Option<FileRecord>,
    pub folder: Option<FolderRecord>,
    /// Path of the target relative to `folder`.
    pub path: Option<String>,
}

impl OperationParams {
    pub fn by_id(object_id: u64) -> Self {
        Self {
            object_id: Some(object_id),
            ..Self::default()
        }
    }

    /// Point `fs` at the target and return the id still to be resolved, if any.
    async fn apply(&self, fs: &mut FileSystem) -> Result<Option<u64>, Reply> {
        let mut object_id = self.object_id;

        if let Some(file) = &self.file {
            fs.set_target_file(vec![file.clone()]);
            object_id = None;
        }

        if let Some(folder) = &self.folder {
            fs.root = Some(folder.clone());
            let path = self.path.as_deref().unwrap_or_default();
            fs.reset_file_if_not_exist(path)
                .await
                .map_err(|err| fail_reply(codes::NOT_FOUND, err))?;
            object_id = None;
        }

        Ok(object_id)
    }
}

/// Body of a content update.
pub struct PutContentRequest {
    /// Raw `Content-Length` header.
    pub content_length: Option<String>,
    pub mime_type: Option<String>,
    pub body: ByteReader,
}

impl std::fmt::Debug for PutContentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PutContentRequest")
            .field("content_length", &self.content_length)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// Operations on a file the caller owns.
#[derive(Debug, Clone, Default)]
pub struct FileIdService;

impl FileIdService {
    async fn filesystem(explorer: &Explorer, user: User) -> Result<FileSystem, Reply> {
        explorer
            .filesystem(user)
            .await
            .map_err(|err| fail_reply(codes::POLICY_NOT_ALLOWED, err))
    }

    /// Link to the configured document preview service for the target.
    #[tracing::instrument(skip_all, fields(object_id = ?params.object_id))]
    pub async fn create_doc_preview_session(
        &self,
        explorer: &Explorer,
        user: User,
        params: &OperationParams,
    ) -> Reply {
        let mut fs = match Self::filesystem(explorer, user).await {
            Ok(fs) => fs,
            Err(reply) => return reply,
        };
        let object_id = match params.apply(&mut fs).await {
            Ok(object_id) => object_id,
            Err(reply) => return reply,
        };

        let download_url = match fs.get_download_url(object_id, names::DOC_PREVIEW_TIMEOUT).await {
            Ok(url) => url,
            Err(err) => return fail_reply(codes::NOT_SET, err),
        };

        let template = explorer
            .settings()
            .get_setting(names::OFFICE_PREVIEW_SERVICE)
            .unwrap_or_default();
        let preview_url = SignedAccessIssuer::doc_preview_url(&template, &download_url);
        Reply::Json(ServiceResponse::with_data(preview_url))
    }

    /// Download link for the target.
    #[tracing::instrument(skip_all, fields(object_id = ?params.object_id))]
    pub async fn create_download_session(
        &self,
        explorer: &Explorer,
        user: User,
        params: &OperationParams,
    ) -> Reply {
        let mut fs = match Self::filesystem(explorer, user).await {
            Ok(fs) => fs,
            Err(reply) => return reply,
        };
        match fs
            .get_download_url(params.object_id, names::DOWNLOAD_TIMEOUT)
            .await
        {
            Ok(url) => Reply::Json(ServiceResponse::with_data(url)),
            Err(err) => fail_reply(codes::NOT_SET, err),
        }
    }

    /// Preview the target. Text previews are always proxied and never cached.
    #[tracing::instrument(skip_all, fields(object_id = ?params.object_id, is_text = is_text))]
    pub async fn preview_content(
        &self,
        explorer: &Explorer,
        user: User,
        params: &OperationParams,
        is_text: bool,
        headers: &HeaderMap,
    ) -> Reply {
        let mut fs = match Self::filesystem(explorer, user).await {
            Ok(fs) => fs,
            Err(reply) => return reply,
        };
        let object_id = match params.apply(&mut fs).await {
            Ok(object_id) => object_id,
            Err(reply) => return reply,
        };

        match fs.preview(object_id, is_text).await {
            Ok(PreviewResponse::Redirect { url, max_age }) => Reply::Redirect {
                response: ServiceResponse::redirect(codes::REDIRECT_PERMANENT, url),
                max_age: Some(max_age),
            },
            Ok(PreviewResponse::Content { file, content }) => {
                let mut options = ServeOptions::new(file.name.clone(), Some(file.updated_at));
                if is_text {
                    options = options.no_cache();
                }
                match delivery::serve_content(headers, content, &options).await {
                    Ok(response) => Reply::Content(response),
                    Err(err) => fail_reply(codes::IO_FAILED, err),
                }
            }
            Err(err) => fail_reply(codes::NOT_SET, err),
        }
    }

    /// Replace the content of the target file.
    ///
    /// Content shared with other records through a soft link is written to a fresh
    /// key; the shared object is left untouched.
    #[tracing::instrument(skip_all, fields(object_id = ?params.object_id))]
    pub async fn put_content(
        &self,
        explorer: &Explorer,
        user: User,
        params: &OperationParams,
        req: PutContentRequest,
        cancel: &CancellationToken,
    ) -> Reply {
        let size = match req
            .content_length
            .as_deref()
            .and_then(|value| value.trim().parse::<u64>().ok())
        {
            Some(size) => size,
            None => {
                let err = AppError::InvalidInput("missing or invalid Content-Length".to_string());
                return Reply::Json(ServiceResponse::param_err(
                    "unable to parse file size",
                    Some(&err),
                ));
            }
        };

        let mut fs = match Self::filesystem(explorer, user).await {
            Ok(fs) => fs,
            Err(reply) => return reply,
        };

        let id = params.object_id.unwrap_or_default();
        let mut original = match explorer.store().get_files_by_ids(&[id], Some(fs.user.id)).await {
            Ok(files) => match files.into_iter().next() {
                Some(file) => file,
                None => {
                    return Reply::Json(ServiceResponse::err(codes::NOT_FOUND, "file not found", None))
                }
            },
            Err(err) => return fail_reply(codes::DB_ERROR, err),
        };

        let resolution = match resolve_overwrite(&mut fs, &mut original).await {
            Ok(resolution) => resolution,
            Err(err) => return fail_reply(codes::DB_ERROR, err),
        };
        let shared = matches!(resolution, Resolution::Redirected { .. });

        fs.use_hook(HookStage::BeforeUpload, Arc::new(ResetPolicy));
        fs.use_hook(HookStage::BeforeUpload, Arc::new(ValidateFile));
        fs.use_hook(HookStage::BeforeUpload, Arc::new(ChangeCapacity));
        fs.use_hook(HookStage::AfterUploadCanceled, Arc::new(CleanFileContent));
        fs.use_hook(HookStage::AfterUploadCanceled, Arc::new(ClearFileSize));
        fs.use_hook(HookStage::AfterUploadCanceled, Arc::new(GiveBackCapacity));
        fs.use_hook(HookStage::AfterUpload, Arc::new(GenericAfterUpdate));
        // Nothing was written yet; only the reservation needs undoing.
        fs.use_hook(HookStage::AfterValidateFailed, Arc::new(GiveBackCapacity));

        let upload = UploadRequest {
            virtual_path: String::new(),
            name: original.name.clone(),
            size,
            mime_type: req.mime_type,
            reader: req.body,
            original: Some(original),
        };
        match fs.upload(upload, cancel).await {
            Ok(ctx) => {
                tracing::info!(
                    file_id = ctx.original.as_ref().map(|file| file.id),
                    storage_key = %ctx.save_key,
                    shared,
                    "File content replaced"
                );
                Reply::Json(ServiceResponse::ok())
            }
            Err(err) => fail_reply(codes::UPLOAD_FAILED, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEnv;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/docs/a.txt"), ("/docs".to_string(), "a.txt".to_string()));
        assert_eq!(split_path("/a.txt"), ("/".to_string(), "a.txt".to_string()));
        assert_eq!(split_path("a.txt"), ("/".to_string(), "a.txt".to_string()));
        assert_eq!(split_path("/x/y/z.md/"), ("/x/y".to_string(), "z.md".to_string()));
    }

    #[tokio::test]
    async fn test_create_rejects_existing_name() {
        let env = TestEnv::new().await;
        env.put_file("a.txt", b"x").await;

        let reply = SingleFileService {
            path: "/a.txt".to_string(),
        }
        .create(&env.explorer, env.user.clone())
        .await;
        assert_eq!(reply.code(), codes::UPLOAD_FAILED);
    }

    #[tokio::test]
    async fn test_put_content_requires_length() {
        let env = TestEnv::new().await;
        let file = env.put_file("a.txt", b"x").await;
        let req = PutContentRequest {
            content_length: Some("abc".to_string()),
            mime_type: None,
            body: Box::pin(tokio::io::empty()),
        };
        let reply = FileIdService
            .put_content(
                &env.explorer,
                env.user.clone(),
                &OperationParams::by_id(file.id),
                req,
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(reply.code(), codes::PARAM_ERR);
    }

    #[tokio::test]
    async fn test_put_content_unknown_file() {
        let env = TestEnv::new().await;
        let req = PutContentRequest {
            content_length: Some("0".to_string()),
            mime_type: None,
            body: Box::pin(tokio::io::empty()),
        };
        let reply = FileIdService
            .put_content(
                &env.explorer,
                env.user.clone(),
                &OperationParams::by_id(999),
                req,
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(reply.code(), codes::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_source_redirects_with_signed_url() {
        let env = TestEnv::new().await;
        let file = env.put_file("report.pdf", b"%PDF").await;

        let reply = FileAnonymousGetService {
            id: file.id,
            name: "report.pdf".to_string(),
        }
        .source(&env.explorer)
        .await;

        assert_eq!(reply.code(), codes::REDIRECT_TEMPORARY);
        let url = reply.response().and_then(|r| r.redirect_url()).unwrap();
        assert!(url.contains(&format!("/api/v3/file/get/{}/report.pdf?sign=", file.id)));

        let response = reply.into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(response.headers().contains_key(http::header::LOCATION));
    }

    #[tokio::test]
    async fn test_anonymous_access_to_missing_file() {
        let env = TestEnv::new().await;
        let service = FileAnonymousGetService {
            id: 7,
            name: "report.pdf".to_string(),
        };
        assert_eq!(service.source(&env.explorer).await.code(), codes::NOT_SET);
        assert_eq!(
            service.download(&env.explorer, &HeaderMap::new()).await.code(),
            codes::NOT_SET
        );
    }

    #[tokio::test]
    async fn test_preview_folder_target_not_found() {
        let env = TestEnv::new().await;
        let params = OperationParams {
            folder: Some(env.root.clone()),
            path: Some("missing.txt".to_string()),
            ..OperationParams::default()
        };
        let reply = FileIdService
            .preview_content(&env.explorer, env.user.clone(), &params, false, &HeaderMap::new())
            .await;
        assert_eq!(reply.code(), codes::NOT_FOUND);
    }

    #[test]
    fn test_without_cause_strips_error() {
        let err = AppError::NotFound("secret path".to_string());
        let reply = fail_reply(codes::NOT_SET, err).without_cause();
        assert!(reply.response().unwrap().error.is_none());
    }
}
