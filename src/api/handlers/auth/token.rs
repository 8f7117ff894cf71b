//! HS256 session token signing and verification.
//!
//! Flow Overview:
//! 1) `sign` stamps `iat`/`exp` from the caller's clock and encodes the claims.
//! 2) `verify` checks the signature with a fixed algorithm, then applies the
//!    expiry rule itself so the clock and skew tolerance stay injectable.
//!
//! A token is accepted while `now <= exp + tolerance`.

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::{Error as JwtError, ErrorKind},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{error::AuthError, role::Role, state::AuthConfig};

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Decoded payload of a session token.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct SessionClaims {
    pub sub: i64,
    #[schema(value_type = String, example = "super_admin")]
    pub role: Role,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<u8>,
}

/// Claims supplied by the login flow; timestamps are added at signing.
#[derive(Clone, Debug)]
pub struct NewSession {
    pub sub: i64,
    pub role: Role,
    pub name: String,
    pub ns: Option<String>,
    pub role_id: Option<u8>,
}

pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    tolerance_seconds: i64,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &[u8], tolerance_seconds: i64) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        // Expiry is checked in `verify_at` against the injected clock.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            tolerance_seconds: tolerance_seconds.max(0),
        }
    }

    /// Build a codec from configuration.
    ///
    /// # Errors
    /// Returns [`AuthError::NoSecret`] if the configuration has no secret.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let secret = config.session_secret().ok_or(AuthError::NoSecret)?;
        Ok(Self::new(
            secret.expose_secret().as_bytes(),
            config.clock_tolerance_seconds(),
        ))
    }

    #[must_use]
    pub fn tolerance_seconds(&self) -> i64 {
        self.tolerance_seconds
    }

    /// Sign a session valid for `ttl_seconds` from `now`.
    ///
    /// # Errors
    /// Returns [`AuthError::Signing`] for a non-positive TTL or an encoding failure.
    pub fn sign(
        &self,
        session: &NewSession,
        ttl_seconds: i64,
        now: i64,
    ) -> Result<String, AuthError> {
        if ttl_seconds <= 0 {
            return Err(AuthError::Signing("ttl must be positive".to_string()));
        }
        let exp = now
            .checked_add(ttl_seconds)
            .ok_or_else(|| AuthError::Signing("ttl overflows expiry".to_string()))?;

        let claims = SessionClaims {
            sub: session.sub,
            role: session.role,
            name: session.name.clone(),
            iat: now,
            exp,
            ns: session.ns.clone(),
            role_id: session.role_id,
        };

        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|err| AuthError::Signing(err.to_string()))
    }

    /// Verify a token against the current wall clock.
    ///
    /// # Errors
    /// See [`TokenCodec::verify_at`].
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.verify_at(token, unix_now())
    }

    /// Verify a token as of `now` (unix seconds).
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidToken`] for malformed, tampered, foreign-algorithm
    /// or expired tokens, and [`AuthError::VerifyFailure`] for unexpected library errors.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<SessionClaims, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::NoToken);
        }

        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(classify)?;
        let claims = data.claims;

        if now > claims.exp.saturating_add(self.tolerance_seconds) {
            return Err(AuthError::InvalidToken("token expired".to_string()));
        }

        Ok(claims)
    }
}

fn classify(err: JwtError) -> AuthError {
    match err.kind() {
        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::MissingAlgorithm
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => AuthError::InvalidToken(err.to_string()),
        _ => AuthError::VerifyFailure(err.to_string()),
    }
}

/// Current unix time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
