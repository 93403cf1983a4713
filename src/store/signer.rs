//! HMAC-signed download URLs for the local backend.
//!
//! The S3 backend gets presigned URLs from the SDK; the local backend has no
//! provider to sign for it, so the gateway signs its own: the URL points back
//! at `GET /files/raw/{key}` and carries an expiry plus an HMAC-SHA256 token
//! over `key + expiry`. Anyone holding the URL can read the object until the
//! expiry passes, same contract as a provider-signed URL.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    public_url: String,
}

impl UrlSigner {
    /// `public_url` is the externally reachable base of this gateway, e.g.
    /// `http://127.0.0.1:8000`. A trailing slash is tolerated.
    pub fn new(secret: impl Into<Vec<u8>>, public_url: impl Into<String>) -> Self {
        let mut public_url: String = public_url.into();
        while public_url.ends_with('/') {
            public_url.pop();
        }
        Self {
            secret: secret.into(),
            public_url,
        }
    }

    /// Full signed URL for `key`, valid until `expires_at` (unix seconds).
    pub fn signed_url(&self, key: &str, expires_at: i64) -> String {
        let encoded_key = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/files/raw/{}?expires={}&token={}",
            self.public_url,
            encoded_key,
            expires_at,
            self.token(key, expires_at)
        )
    }

    /// URL-safe base64 HMAC token binding `key` to `expires_at`.
    pub fn token(&self, key: &str, expires_at: i64) -> String {
        let mut mac = self.mac();
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires_at.to_string().as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Check a presented token. Comparison is constant-time; an expiry in the
    /// past fails regardless of the token.
    pub fn verify(&self, key: &str, expires_at: i64, token: &str, now: i64) -> bool {
        if now > expires_at {
            return false;
        }
        let Ok(raw) = URL_SAFE_NO_PAD.decode(token) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires_at.to_string().as_bytes());
        mac.verify_slice(&raw).is_ok()
    }

    fn mac(&self) -> HmacSha256 {
        // Hmac accepts keys of any length.
        HmacSha256::new_from_slice(&self.secret).expect("hmac key")
    }
}
