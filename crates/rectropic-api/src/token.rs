//! Bearer credential issuance and verification.
//!
//! Credentials are HS256 JWTs carrying the user id and an expiry. There is no
//! server-side revocation: a credential stays valid until it expires, even
//! after the client logs out and discards it.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use rectropic_types::api::Claims;
use rectropic_types::models::Provider;

use crate::error::ApiError;

/// How the session was established; decides its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Provider,
    Anonymous,
}

impl SessionKind {
    pub fn for_provider(provider: Provider) -> Self {
        match provider {
            Provider::Anonymous => Self::Anonymous,
            Provider::Google | Provider::Apple => Self::Provider,
        }
    }

    pub fn lifetime(self) -> Duration {
        match self {
            Self::Provider => Duration::days(30),
            Self::Anonymous => Duration::days(7),
        }
    }
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn issue(&self, user_id: Uuid, email: &str, kind: SessionKind) -> anyhow::Result<String> {
        self.issue_at(user_id, email, kind, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: Uuid,
        email: &str,
        kind: SessionKind,
        now: DateTime<Utc>,
    ) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.timestamp().max(0) as usize,
            exp: (now + kind.lifetime()).timestamp().max(0) as usize,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    /// The user id the credential was issued for. Every failure looks the same.
    pub fn verify(&self, token: &str) -> Result<Uuid, ApiError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(|_| ApiError::InvalidCredential)
    }
}
