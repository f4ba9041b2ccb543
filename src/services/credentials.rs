// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session token issuing and validation.
//!
//! Tokens are HS256 JWTs signed with the configured shared secret. They are
//! stateless: there is no refresh and no revocation, so a token stays valid
//! until its `exp`.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Role;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user document ID)
    pub sub: String,
    /// Role at the time the token was issued
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Issues and validates session tokens with one signing key and lifetime.
#[derive(Clone)]
pub struct SessionTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionTokens {
    pub fn new(signing_key: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
            ttl,
        }
    }

    /// Create a token for a session using the configured lifetime.
    pub fn issue(&self, subject_id: &str, role: Role) -> Result<String> {
        self.issue_with_ttl(subject_id, role, self.ttl)
    }

    /// Create a token that expires `ttl` from now.
    pub fn issue_with_ttl(&self, subject_id: &str, role: Role, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject_id.to_string(),
            role,
            iat: now.timestamp().max(0) as usize,
            exp: (now + ttl).timestamp().max(0) as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign token: {}", e)))
    }

    /// Verify signature and expiry. Any failure is `InvalidToken`.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            AppError::InvalidToken
        })?;

        if data.claims.sub.is_empty() {
            return Err(AppError::InvalidToken);
        }
        Ok(data.claims)
    }
}
