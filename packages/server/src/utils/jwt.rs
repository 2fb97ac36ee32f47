use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::JwtConfig;

/// JWT Claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "EmailAddr")]
    pub email_addr: String,
    /// Expiration, seconds since the epoch.
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("unsupported signing algorithm '{0}', expected one of HS256, HS384, HS512")]
    UnsupportedAlgorithm(String),
    #[error("token lifetime must be positive")]
    BadLifetime,
    #[error("token rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),
}

/// Signing material derived from `[jwt]` configuration.
///
/// Tokens are always signed with the current key. Verification tries the
/// current key first and then each retired key, so rotating `jwt.key`
/// does not log out sessions signed before the rotation.
#[derive(Clone)]
pub struct JwtKeys {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: Vec<DecodingKey>,
    lifetime: Duration,
}

impl JwtKeys {
    pub fn from_config(config: &JwtConfig) -> Result<Self, JwtError> {
        let algorithm = Algorithm::from_str(&config.algorithm)
            .ok()
            .filter(|alg| matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512))
            .ok_or_else(|| JwtError::UnsupportedAlgorithm(config.algorithm.clone()))?;
        if config.duration_minutes <= 0 {
            return Err(JwtError::BadLifetime);
        }

        let decoding = std::iter::once(&config.key)
            .chain(config.previous_keys.iter())
            .map(|key| DecodingKey::from_secret(key.as_bytes()))
            .collect();

        Ok(Self {
            algorithm,
            encoding: EncodingKey::from_secret(config.key.as_bytes()),
            decoding,
            lifetime: Duration::minutes(config.duration_minutes),
        })
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sign a new token for `email`. Returns the token and its expiry.
    pub fn sign(&self, email: &str) -> Result<(String, DateTime<Utc>), JwtError> {
        let expires_at = Utc::now() + self.lifetime;
        let claims = Claims {
            email_addr: email.to_owned(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        Ok((token, expires_at))
    }

    /// Verify and decode a token.
    ///
    /// A header naming any algorithm other than the configured one is
    /// rejected, as is an expired token.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        let mut last_err = None;
        for key in &self.decoding {
            match decode::<Claims>(token, key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => last_err = Some(e),
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_err
            .map(JwtError::from)
            .unwrap_or(JwtError::Rejected(ErrorKind::InvalidSignature.into())))
    }
}
