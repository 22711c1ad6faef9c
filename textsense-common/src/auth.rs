//! API authentication via bearer tokens
//!
//! # Architecture
//!
//! - Every analysis request carries `Authorization: Bearer <token>`
//! - An [`Authenticator`] turns the token into a verified [`Principal`]
//! - Configured tokens are stored as SHA-256 digests, never in plain text
//! - Authentication can be disabled entirely (`auth.enabled = false`)
//!
//! This module has no HTTP framework dependencies. The axum middleware lives
//! in the service crate.

use crate::config::AuthConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;

/// Verified caller identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal(pub String);

impl Principal {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authentication error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No Authorization header on the request
    #[error("Missing Authorization header")]
    MissingCredentials,

    /// Authorization header present but not `Bearer <token>`
    #[error("Malformed Authorization header")]
    MalformedHeader,

    /// Token does not match any configured credential
    #[error("Invalid token")]
    InvalidToken,
}

/// Capability that verifies a presented token
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn verify(&self, token: &str) -> std::result::Result<Principal, AuthError>;

    /// `false` when every request is accepted without a token
    fn is_enforcing(&self) -> bool {
        true
    }
}

/// Extract the token from an `Authorization` header value
///
/// # Examples
///
/// ```
/// use textsense_common::auth::{parse_bearer, AuthError};
///
/// assert_eq!(parse_bearer("Bearer abc123"), Ok("abc123"));
/// assert_eq!(parse_bearer("Basic abc123"), Err(AuthError::MalformedHeader));
/// ```
pub fn parse_bearer(header: &str) -> std::result::Result<&str, AuthError> {
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedHeader)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

/// Lowercase hex SHA-256 digest of a token
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Authenticator backed by a fixed table of token digests
pub struct StaticTokenAuthenticator {
    digests: HashMap<String, Principal>,
}

impl StaticTokenAuthenticator {
    /// Build from `(principal, sha256 hex)` pairs
    ///
    /// Digests must be 64 hex characters; case is normalized.
    pub fn from_digests<I, P, D>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, D)>,
        P: Into<String>,
        D: AsRef<str>,
    {
        let mut digests = HashMap::new();
        for (principal, digest) in entries {
            let digest = digest.as_ref().trim().to_ascii_lowercase();
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::Config(format!(
                    "Invalid token digest '{}': expected 64 hex characters",
                    digest
                )));
            }
            digests.insert(digest, Principal(principal.into()));
        }
        Ok(Self { digests })
    }

    /// Build from plain tokens (used by tests and tooling)
    pub fn from_tokens<I, P, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, T)>,
        P: Into<String>,
        T: AsRef<str>,
    {
        let digests = entries
            .into_iter()
            .map(|(principal, token)| (hash_token(token.as_ref()), Principal(principal.into())))
            .collect();
        Self { digests }
    }

    /// Number of accepted tokens
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn verify(&self, token: &str) -> std::result::Result<Principal, AuthError> {
        self.digests
            .get(&hash_token(token))
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

/// Accepts every request as the anonymous principal
pub struct DisabledAuthenticator;

/// Principal reported when authentication is disabled
pub const ANONYMOUS_PRINCIPAL: &str = "anonymous";

#[async_trait]
impl Authenticator for DisabledAuthenticator {
    async fn verify(&self, _token: &str) -> std::result::Result<Principal, AuthError> {
        Ok(Principal(ANONYMOUS_PRINCIPAL.to_string()))
    }

    fn is_enforcing(&self) -> bool {
        false
    }
}

/// Build the authenticator described by configuration
pub fn authenticator_from_config(
    config: &AuthConfig,
) -> Result<std::sync::Arc<dyn Authenticator>> {
    if !config.enabled {
        return Ok(std::sync::Arc::new(DisabledAuthenticator));
    }
    let table = StaticTokenAuthenticator::from_digests(
        config
            .tokens
            .iter()
            .map(|t| (t.principal.clone(), t.sha256.as_str())),
    )?;
    Ok(std::sync::Arc::new(table))
}
