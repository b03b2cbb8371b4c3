//! Short-lived signed links to stored artifacts.

use crate::sink::error::StoreError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// A time-limited link to a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and checks HMAC-SHA256 signatures binding an object key to an expiry.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn signature(&self, key: &str, expires: i64) -> Result<Vec<u8>, StoreError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|e| StoreError::Signing {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Builds `<base_url>/<key>?expires=<unix>&signature=<sig>` valid for `ttl` from `now`.
    pub fn sign(
        &self,
        base_url: &str,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<SignedUrl, StoreError> {
        let expires = now.timestamp() + ttl.as_secs() as i64;
        let expires_at = DateTime::from_timestamp(expires, 0).ok_or_else(|| StoreError::Signing {
            key: key.to_string(),
            reason: format!("expiry {expires} is out of range"),
        })?;
        let signature = URL_SAFE_NO_PAD.encode(self.signature(key, expires)?);
        Ok(SignedUrl {
            url: format!(
                "{}/{}?expires={}&signature={}",
                base_url.trim_end_matches('/'),
                key,
                expires,
                signature
            ),
            expires_at,
        })
    }

    /// Whether `signature` was issued by this signer for `key` and `expires`
    /// and has not yet expired at `now`.
    pub fn verify(&self, key: &str, expires: i64, signature: &str, now: DateTime<Utc>) -> bool {
        if expires < now.timestamp() {
            return false;
        }
        let Ok(provided) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac.verify_slice(&provided).is_ok()
    }
}
