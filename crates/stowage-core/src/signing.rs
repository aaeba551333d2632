//! HMAC URL signing for unauthenticated, time-limited access.
//!
//! Signature = base64url(HMAC-SHA256(secret, "{path}:{expires}")) + ":" + expires,
//! appended to a URL as the `sign` query parameter. `expires` is a unix timestamp
//! in seconds.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key size")
    }

    /// Signature for `path` valid until `expires` (unix seconds).
    pub fn sign(&self, path: &str, expires: u64) -> String {
        let mut mac = self.mac();
        mac.update(format!("{}:{}", path, expires).as_bytes());
        let tag = mac.finalize().into_bytes();
        format!(
            "{}:{}",
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(tag),
            expires
        )
    }

    /// Check a signature produced by [`UrlSigner::sign`] against `path` at time `now`.
    pub fn verify_at(&self, path: &str, sign: &str, now: u64) -> Result<(), AppError> {
        let (tag, expires) = sign
            .rsplit_once(':')
            .ok_or_else(|| AppError::SignInvalid("malformed signature".to_string()))?;
        let expires: u64 = expires
            .parse()
            .map_err(|_| AppError::SignInvalid("malformed expiry".to_string()))?;
        let tag = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| AppError::SignInvalid("malformed signature".to_string()))?;

        let mut mac = self.mac();
        mac.update(format!("{}:{}", path, expires).as_bytes());
        mac.verify_slice(&tag)
            .map_err(|_| AppError::SignInvalid("signature mismatch".to_string()))?;

        if now > expires {
            return Err(AppError::SignExpired);
        }
        Ok(())
    }

    pub fn verify(&self, path: &str, sign: &str) -> Result<(), AppError> {
        self.verify_at(path, sign, unix_now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "/api/v3/file/get/7/report.pdf";

    #[test]
    fn test_sign_then_verify() {
        let signer = UrlSigner::new("secret");
        let sign = signer.sign(PATH, 1_000);
        assert!(signer.verify_at(PATH, &sign, 999).is_ok());
        assert!(signer.verify_at(PATH, &sign, 1_000).is_ok());
    }

    #[test]
    fn test_expired_signature_rejected() {
        let signer = UrlSigner::new("secret");
        let sign = signer.sign(PATH, 1_000);
        assert!(matches!(
            signer.verify_at(PATH, &sign, 1_001),
            Err(AppError::SignExpired)
        ));
    }

    #[test]
    fn test_tampered_path_or_expiry_rejected() {
        let signer = UrlSigner::new("secret");
        let sign = signer.sign(PATH, 1_000);
        assert!(matches!(
            signer.verify_at("/api/v3/file/get/8/report.pdf", &sign, 0),
            Err(AppError::SignInvalid(_))
        ));

        let (tag, _) = sign.rsplit_once(':').unwrap();
        let extended = format!("{}:{}", tag, 9_999);
        assert!(matches!(
            signer.verify_at(PATH, &extended, 0),
            Err(AppError::SignInvalid(_))
        ));
    }

    #[test]
    fn test_other_secret_rejected() {
        let sign = UrlSigner::new("secret").sign(PATH, 1_000);
        assert!(UrlSigner::new("other").verify_at(PATH, &sign, 0).is_err());
    }

    #[test]
    fn test_sign_is_deterministic() {
        let signer = UrlSigner::new("secret");
        let a = signer.sign(PATH, 160);
        assert_eq!(a, signer.sign(PATH, 160));
        assert_ne!(a, signer.sign(PATH, 161));
        assert_ne!(a, signer.sign("/api/v3/file/get/8/report.pdf", 160));
        assert!(a.ends_with(":160"));
    }
}
