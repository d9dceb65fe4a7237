//! Auth gate: a stateless accept/reject decision per request.
//!
//! Routes flagged `auth` consult the gate before any delay or template work.
//! The gate only sees request headers; nothing is remembered between calls.

use axum::http::{header, HeaderMap};
use chrono::Utc;
use thiserror::Error;

use crate::security::jwt;

/// Why a request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing bearer credentials")]
    MissingCredentials,
    #[error("malformed token: {0}")]
    Malformed(&'static str),
    #[error("unsupported signing algorithm {0:?}")]
    UnsupportedAlgorithm(String),
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("requests are rejected by policy")]
    Denied,
}

/// A pluggable credential check.
pub trait AuthGate: Send + Sync + std::fmt::Debug {
    /// Accept (`Ok`) or reject the request carrying these headers.
    fn check(&self, headers: &HeaderMap) -> Result<(), AuthError>;
}

/// Accepts every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthGate for AllowAll {
    fn check(&self, _headers: &HeaderMap) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Rejects every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl AuthGate for DenyAll {
    fn check(&self, _headers: &HeaderMap) -> Result<(), AuthError> {
        Err(AuthError::Denied)
    }
}

/// `Authorization: Bearer <jwt>` signed with a shared HS256 secret.
#[derive(Clone)]
pub struct BearerJwtGate {
    secret: Vec<u8>,
}

impl std::fmt::Debug for BearerJwtGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerJwtGate").finish_non_exhaustive()
    }
}

impl BearerJwtGate {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl AuthGate for BearerJwtGate {
    fn check(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingCredentials)?;
        jwt::verify(&self.secret, token, Utc::now()).map(|_| ())
    }
}

/// Extract the token from an `Authorization: Bearer ...` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
