//! JWT issuing and verification
//!
//! Tokens are HS256-signed and carry the username as `sub`. The same token
//! authenticates HTTP requests (Bearer header or `jwt_token` cookie) and
//! WebSocket upgrades (`?token=` query parameter).

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use super::{AuthError, IdentityVerifier};

/// Length of generated signing secrets in bytes
const SECRET_LEN: usize = 32;

/// Claims embedded in every token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username
    pub sub: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

/// Issues and verifies access tokens with a shared secret
pub struct JwtAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtAuthority {
    /// Create an authority from a raw secret and token lifetime
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            ttl,
        }
    }

    /// Token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `username`
    pub fn issue(&self, username: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        self.encode_claims(&Claims {
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        })
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| AuthError::Token(e.to_string()))
    }

    /// Validate a token and return its claims
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidCredential,
            })
    }
}

impl IdentityVerifier for JwtAuthority {
    fn verify(&self, credential: &str) -> Result<String, AuthError> {
        let claims = self.decode(credential)?;
        if claims.sub.is_empty() {
            return Err(AuthError::InvalidCredential);
        }
        Ok(claims.sub)
    }
}

/// Load the signing secret from `path`, generating one if missing or malformed.
pub fn load_or_generate_secret(path: &Path) -> Result<Vec<u8>, AuthError> {
    if path.exists() {
        let key = std::fs::read(path)?;
        if key.len() == SECRET_LEN {
            tracing::info!("JWT signing key loaded from {}", path.display());
            return Ok(key);
        }
        tracing::warn!("JWT key file has wrong size ({}), regenerating", key.len());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let key: [u8; SECRET_LEN] = rand::rng().random();
    write_private(path, &key)?;
    tracing::info!("JWT signing key generated at {}", path.display());
    Ok(key.to_vec())
}

/// Write `bytes` to a file only the owner can read
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;

    // mode() only applies when the file is created
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn authority() -> JwtAuthority {
        JwtAuthority::new(b"test-secret-test-secret-test-sec", Duration::hours(24))
    }

    #[test]
    fn test_issue_and_verify() {
        let auth = authority();
        let token = auth.issue("alice").unwrap();
        assert_eq!(auth.verify(&token).unwrap(), "alice");
    }

    #[test]
    fn test_expired_token() {
        let auth = authority();
        let past = Utc::now() - Duration::hours(2);
        let token = auth
            .encode_claims(&Claims {
                sub: "alice".to_string(),
                iat: past.timestamp(),
                exp: (past + Duration::minutes(5)).timestamp(),
            })
            .unwrap();

        assert!(matches!(auth.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = authority().issue("alice").unwrap();
        let other = JwtAuthority::new(b"another-secret-another-secret-xx", Duration::hours(24));
        assert!(matches!(
            other.verify(&token),
            Err(AuthError::InvalidCredential)
        ));
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(matches!(
            authority().verify("not.a.token"),
            Err(AuthError::InvalidCredential)
        ));
        assert!(matches!(
            authority().verify(""),
            Err(AuthError::InvalidCredential)
        ));
    }

    #[test]
    fn test_secret_generated_then_reloaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jwt_secret");

        let first = load_or_generate_secret(&path).unwrap();
        assert_eq!(first.len(), SECRET_LEN);

        let second = load_or_generate_secret(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_secret_regenerated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jwt_secret");
        std::fs::write(&path, b"short").unwrap();

        let key = load_or_generate_secret(&path).unwrap();
        assert_eq!(key.len(), SECRET_LEN);
        assert_eq!(std::fs::read(&path).unwrap(), key);
    }

    #[test]
    fn test_generated_secrets_differ() {
        let dir = tempdir().unwrap();

        let a = load_or_generate_secret(&dir.path().join("a")).unwrap();
        let b = load_or_generate_secret(&dir.path().join("b")).unwrap();
        assert_ne!(a, b);
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("jwt_secret");
        load_or_generate_secret(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        // Regenerating over a world-readable file tightens it
        std::fs::write(&path, b"short").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        load_or_generate_secret(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
