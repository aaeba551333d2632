use std::sync::Arc;

use stowage_core::models::{User, GUEST_GROUP_ID};
use stowage_core::{AppError, Config, MetadataStore, SettingsStore, UrlSigner};
use stowage_storage::DriverRegistry;

use crate::filesystem::FileSystem;
use crate::issuer::SignedAccessIssuer;
use crate::session::SessionStore;

/// Long-lived collaborators shared by every request.
///
/// Cloning is cheap; per-request state lives in [`FileSystem`].
#[derive(Clone)]
pub struct Explorer {
    config: Arc<Config>,
    store: Arc<dyn MetadataStore>,
    settings: Arc<dyn SettingsStore>,
    drivers: Arc<DriverRegistry>,
    sessions: SessionStore,
    issuer: SignedAccessIssuer,
}

impl Explorer {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn MetadataStore>,
        settings: Arc<dyn SettingsStore>,
        drivers: Arc<DriverRegistry>,
    ) -> Self {
        let sessions = SessionStore::from_config(&config);
        let issuer = SignedAccessIssuer::new(
            UrlSigner::new(&config.signing_secret),
            sessions.clone(),
            settings.clone(),
            config.site_url.clone(),
        );
        Self {
            config,
            store,
            settings,
            drivers,
            sessions,
            issuer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn issuer(&self) -> &SignedAccessIssuer {
        &self.issuer
    }

    /// The user a request acts as: the identified user, or the guest user.
    pub async fn resolve_user(&self, user_id: Option<u64>) -> Result<User, AppError> {
        match user_id {
            Some(id) => self
                .store
                .get_user(id)
                .await?
                .ok_or_else(|| AppError::Unauthorized(format!("unknown user {}", id))),
            None => Ok(User::anonymous(self.guest_group().await?)),
        }
    }

    async fn guest_group(&self) -> Result<stowage_core::models::Group, AppError> {
        self.store
            .get_group(GUEST_GROUP_ID)
            .await?
            .ok_or_else(|| AppError::GroupNotAllowed("guest group is not configured".to_string()))
    }

    /// Filesystem acting as `user`.
    pub async fn filesystem(&self, user: User) -> Result<FileSystem, AppError> {
        FileSystem::new(self.clone(), user).await
    }

    /// Filesystem acting as the guest user, for signed anonymous access.
    pub async fn anonymous_filesystem(&self) -> Result<FileSystem, AppError> {
        let user = User::anonymous(self.guest_group().await?);
        FileSystem::new(self.clone(), user).await
    }
}

impl std::fmt::Debug for Explorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Explorer")
            .field("site_url", &self.config.site_url)
            .field("drivers", &self.drivers)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}
