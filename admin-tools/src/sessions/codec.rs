//! Signed encoding of session payloads.
//!
//! A payload is a JSON object, stored as
//! `base64url(json) "." base64url(hmac_sha256(secret, salt || base64url(json)))`.
//! Anything that fails the signature check or does not decode to an object is
//! rejected with a [`SessionError`].

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Decoded session payload.
pub type SessionMap = Map<String, Value>;

const SESSION_SALT: &[u8] = b"admin_tools.sessions.SessionStore";
const AUTH_HASH_SALT: &[u8] = b"admin_tools.accounts.session_auth_hash";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session payload has no signature")]
    MissingSignature,

    #[error("session payload signature does not match")]
    BadSignature,

    #[error("invalid base64 in session payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid JSON in session payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session payload is not a JSON object")]
    NotAnObject,

    #[error("invalid signing key")]
    InvalidKey,
}

/// Encodes, signs and verifies session payloads with the server secret.
#[derive(Clone)]
pub struct SessionCodec {
    mac: HmacSha256,
}

impl SessionCodec {
    pub fn new(secret_key: &str) -> Result<Self, SessionError> {
        let mac = HmacSha256::new_from_slice(secret_key.as_bytes())
            .map_err(|_| SessionError::InvalidKey)?;
        Ok(Self { mac })
    }

    fn signature(&self, salt: &[u8], message: &[u8]) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(salt);
        mac.update(message);
        mac
    }

    /// Serialize and sign a payload.
    pub fn encode(&self, data: &SessionMap) -> Result<String, SessionError> {
        let json = serde_json::to_vec(data)?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let tag = self
            .signature(SESSION_SALT, payload.as_bytes())
            .finalize()
            .into_bytes();
        Ok(format!("{payload}.{}", URL_SAFE_NO_PAD.encode(tag)))
    }

    /// Verify and deserialize a payload produced by [`SessionCodec::encode`].
    pub fn decode(&self, encoded: &str) -> Result<SessionMap, SessionError> {
        let (payload, tag) = encoded
            .rsplit_once('.')
            .ok_or(SessionError::MissingSignature)?;

        let tag = URL_SAFE_NO_PAD.decode(tag)?;
        self.signature(SESSION_SALT, payload.as_bytes())
            .verify_slice(&tag)
            .map_err(|_| SessionError::BadSignature)?;

        let json = URL_SAFE_NO_PAD.decode(payload)?;
        match serde_json::from_slice(&json)? {
            Value::Object(map) => Ok(map),
            _ => Err(SessionError::NotAnObject),
        }
    }

    /// Digest of a user's password hash, stored in the session at login.
    ///
    /// Changing the password changes the digest, which logs out every other
    /// session of that user.
    pub fn user_hash(&self, password_hash: &str) -> String {
        hex::encode(
            self.signature(AUTH_HASH_SALT, password_hash.as_bytes())
                .finalize()
                .into_bytes(),
        )
    }

    /// Constant-time check of a stored digest against the current password hash.
    pub fn verify_user_hash(&self, password_hash: &str, claimed: &str) -> bool {
        let Ok(claimed) = hex::decode(claimed) else {
            return false;
        };
        self.signature(AUTH_HASH_SALT, password_hash.as_bytes())
            .verify_slice(&claimed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> SessionMap {
        match json!({"_auth_user_id": "7", "theme": "dark"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_encode_decode() {
        let codec = SessionCodec::new("secret").unwrap();
        let encoded = codec.encode(&sample()).unwrap();
        assert!(!encoded.contains('{'));
        assert_eq!(codec.decode(&encoded).unwrap(), sample());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let encoded = SessionCodec::new("secret").unwrap().encode(&sample()).unwrap();
        let other = SessionCodec::new("other-secret").unwrap();
        assert!(matches!(other.decode(&encoded), Err(SessionError::BadSignature)));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let codec = SessionCodec::new("secret").unwrap();
        let encoded = codec.encode(&sample()).unwrap();
        let (_, tag) = encoded.rsplit_once('.').unwrap();

        let forged_map = match json!({"_auth_user_id": "1"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_map).unwrap());
        let forged = format!("{forged_payload}.{tag}");

        assert!(matches!(codec.decode(&forged), Err(SessionError::BadSignature)));
    }

    #[test]
    fn test_malformed_payloads() {
        let codec = SessionCodec::new("secret").unwrap();
        assert!(matches!(
            codec.decode("no-separator"),
            Err(SessionError::MissingSignature)
        ));
        assert!(matches!(
            codec.decode("abc.!!!not-base64!!!"),
            Err(SessionError::Base64(_))
        ));

        // Correctly signed, but not an object
        let payload = URL_SAFE_NO_PAD.encode(b"[1,2,3]");
        let tag = codec.signature(SESSION_SALT, payload.as_bytes()).finalize().into_bytes();
        let encoded = format!("{payload}.{}", URL_SAFE_NO_PAD.encode(tag));
        assert!(matches!(codec.decode(&encoded), Err(SessionError::NotAnObject)));

        // Correctly signed, but not JSON
        let payload = URL_SAFE_NO_PAD.encode(b"not json");
        let tag = codec.signature(SESSION_SALT, payload.as_bytes()).finalize().into_bytes();
        let encoded = format!("{payload}.{}", URL_SAFE_NO_PAD.encode(tag));
        assert!(matches!(codec.decode(&encoded), Err(SessionError::Json(_))));
    }

    #[test]
    fn test_user_hash() {
        let codec = SessionCodec::new("secret").unwrap();
        let digest = codec.user_hash("$argon2id$v=19$old");
        assert!(codec.verify_user_hash("$argon2id$v=19$old", &digest));
        assert!(!codec.verify_user_hash("$argon2id$v=19$new", &digest));
        assert!(!codec.verify_user_hash("$argon2id$v=19$old", "zz-not-hex"));
    }
}
