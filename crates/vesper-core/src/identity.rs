//! Caller identity from bearer tokens
//!
//! The row store verifies token signatures. Here the JWT payload is only
//! decoded to read the `sub` claim, which becomes the owning user id on
//! inserts and the scope key for the in-memory store.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Authenticated caller: raw token plus the user id it names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
}

impl Identity {
    /// Parse an `Authorization` header value (`Bearer <token>`)
    ///
    /// The scheme name is matched case-insensitively.
    pub fn from_authorization(header: Option<&str>) -> Result<Self> {
        let header =
            header.ok_or_else(|| Error::Unauthorized("missing Authorization header".into()))?;
        let token = header
            .trim_start()
            .split_once(' ')
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Unauthorized("expected a Bearer token".into()))?;
        Self::from_token(token)
    }

    pub fn from_token(token: &str) -> Result<Self> {
        Ok(Self {
            user_id: subject_from_token(token)?,
            token: token.to_string(),
        })
    }
}

/// Decode the JWT payload without verifying it and return `sub` as a UUID
pub fn subject_from_token(token: &str) -> Result<Uuid> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(Error::Unauthorized(
            "not a JWT (expected 3 segments)".into(),
        ));
    }

    // Tolerate padded payloads
    let payload = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|e| Error::Unauthorized(format!("could not decode JWT payload: {}", e)))?;
    let claims: Claims = serde_json::from_slice(&payload)
        .map_err(|e| Error::Unauthorized(format!("could not decode JWT payload: {}", e)))?;

    let sub = claims
        .sub
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Unauthorized("token missing 'sub' claim".into()))?;
    Uuid::parse_str(&sub)
        .map_err(|_| Error::Unauthorized(format!("invalid user id in token: {}", sub)))
}
