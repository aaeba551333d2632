//! Signed access issuer
//!
//! Hands out time-limited URLs for a file. Proxied (local) policies get a URL on
//! this service: a signed `/file/get` link for previews and sources, or a signed
//! download-session link whose token resolves through the session store. Every other
//! backend answers with the driver's presigned URL, so clients fetch from the origin.

use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use stowage_core::models::{FileRecord, StoragePolicy};
use stowage_core::settings::DEFAULT_TIMEOUT_SECS;
use stowage_core::signing::unix_now;
use stowage_core::{AppError, SettingsStore, UrlSigner};
use stowage_storage::Driver;
use uuid::Uuid;

use crate::session::{SessionStore, SessionValue, DOWNLOAD_PREFIX};

/// Characters escaped inside a single URL path segment.
pub(crate) const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'\\')
    .add(b'^')
    .add(b'|')
    .add(b'[')
    .add(b']')
    .add(b'+')
    .add(b'&')
    .add(b'=')
    .add(b';');

/// Signed path serving file content to anonymous clients.
pub fn source_path(file_id: u64, name: &str) -> String {
    format!("/api/v3/file/get/{}/{}", file_id, name)
}

/// Signed path redirecting anonymous clients to a fresh source link.
pub fn perm_source_path(file_id: u64, name: &str) -> String {
    format!("/api/v3/file/source/{}/{}", file_id, name)
}

/// Signed path serving a staged download session.
pub fn download_path(session_id: &str) -> String {
    format!("/api/v3/file/download/{}", session_id)
}

/// Signed path serving a prepared archive.
pub fn archive_path(session_id: &str) -> String {
    format!("/api/v3/file/archive/{}/archive.zip", session_id)
}

#[derive(Clone)]
pub struct SignedAccessIssuer {
    signer: UrlSigner,
    sessions: SessionStore,
    settings: Arc<dyn SettingsStore>,
    site_url: String,
}

impl SignedAccessIssuer {
    pub fn new(
        signer: UrlSigner,
        sessions: SessionStore,
        settings: Arc<dyn SettingsStore>,
        site_url: String,
    ) -> Self {
        Self {
            signer,
            sessions,
            settings,
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    /// Lifetime configured under the setting `name`, 60 seconds by default.
    pub fn ttl(&self, name: &str) -> Duration {
        let secs = self.settings.get_int_setting(name, DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs.max(0) as u64)
    }

    /// Absolute URL of `path` on this service, signed until `issued_at + ttl`.
    ///
    /// The signature covers the unescaped path; the returned URL escapes it.
    pub fn sign_path_at(&self, path: &str, ttl: Duration, issued_at: u64) -> String {
        let expires = issued_at.saturating_add(ttl.as_secs());
        let sign = self.signer.sign(path, expires);
        let escaped: Vec<String> = path
            .split('/')
            .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
            .collect();
        format!(
            "{}{}?sign={}",
            self.site_url,
            escaped.join("/"),
            urlencoding::encode(&sign)
        )
    }

    /// Check the `sign` query parameter of a request for `path`.
    pub fn verify(&self, path: &str, sign: &str) -> Result<(), AppError> {
        self.signer.verify(path, sign)
    }

    pub async fn sign_url(
        &self,
        policy: &StoragePolicy,
        driver: &dyn Driver,
        file: &FileRecord,
        ttl: Duration,
        is_download: bool,
    ) -> Result<String, AppError> {
        self.sign_url_at(policy, driver, file, ttl, is_download, unix_now())
            .await
    }

    /// Time-limited URL for `file`.
    ///
    /// `is_download` asks for a link that makes the client save the file; on proxied
    /// policies it stages a download session.
    pub async fn sign_url_at(
        &self,
        policy: &StoragePolicy,
        driver: &dyn Driver,
        file: &FileRecord,
        ttl: Duration,
        is_download: bool,
        issued_at: u64,
    ) -> Result<String, AppError> {
        if !policy.is_directly_preview() {
            let url = driver
                .presigned_url(&file.source_name, ttl, &file.name, is_download)
                .await?;
            return Ok(url);
        }

        let path = if is_download {
            let session_id = Uuid::new_v4().simple().to_string();
            self.sessions
                .put(
                    &format!("{}{}", DOWNLOAD_PREFIX, session_id),
                    SessionValue::Download(file.clone()),
                    ttl,
                )
                .await;
            tracing::debug!(file_id = file.id, ttl_secs = ttl.as_secs(), "Download session created");
            download_path(&session_id)
        } else {
            source_path(file.id, &file.name)
        };

        Ok(self.sign_path_at(&path, ttl, issued_at))
    }

    /// Render the document preview template for `download_url`.
    ///
    /// `{$src}` receives the percent-encoded URL and `{$srcB64}` the percent-encoded
    /// base64 of it.
    pub fn doc_preview_url(template: &str, download_url: &str) -> String {
        use base64::Engine;

        let src_b64 = base64::engine::general_purpose::STANDARD.encode(download_url);
        template
            .replace("{$src}", &urlencoding::encode(download_url))
            .replace("{$srcB64}", &urlencoding::encode(&src_b64))
    }
}

impl std::fmt::Debug for SignedAccessIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedAccessIssuer")
            .field("site_url", &self.site_url)
            .finish_non_exhaustive()
    }
}
