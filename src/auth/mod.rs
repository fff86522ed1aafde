//! Identity Verification
//!
//! Turns a credential into a validated display name.
//!
//! - **jwt**: HS256 token issuing and verification ([`JwtAuthority`])
//! - **password**: Argon2 password hashing for signup/login
//!
//! The relay only sees the [`IdentityVerifier`] trait. Streaming connections
//! authenticate once, when the WebSocket is upgraded; frames on an
//! established connection are attributed to that identity and never carry
//! credentials of their own.

pub mod jwt;
pub mod password;

pub use jwt::{load_or_generate_secret, Claims, JwtAuthority};
pub use password::{hash_password, verify_password};

use thiserror::Error;

/// Errors produced while verifying identities or handling credentials
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credential is missing, malformed, forged or names an unknown user
    #[error("Invalid credential")]
    InvalidCredential,

    /// Credential was valid but has expired
    #[error("Credential expired")]
    Expired,

    /// Token could not be created
    #[error("Token error: {0}")]
    Token(String),

    /// Password hashing failed
    #[error("Password hashing error: {0}")]
    Hashing(String),

    /// Secret file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Validates a credential and yields the display name it belongs to
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, credential: &str) -> Result<String, AuthError>;
}
