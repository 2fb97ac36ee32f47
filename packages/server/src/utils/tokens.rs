//! Single-use account tokens for password recovery and email confirmation.
//!
//! The wire form is the URL-safe base64 of 64 random bytes. The first 32
//! bytes are the selector, stored in clear to find the row; the last 32 are
//! the verifier, of which only the SHA-512 digest is stored.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use chrono::{DateTime, SubsecRound, Utc};
use rand::RngCore;
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const SELECTOR_LEN: usize = 32;
pub const VERIFIER_LEN: usize = 32;
pub const HASH_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is not valid base64")]
    Encoding,
    #[error("token must decode to {} bytes", SELECTOR_LEN + VERIFIER_LEN)]
    Length,
    #[error("token does not match")]
    Mismatch,
    #[error("token has expired")]
    Expired,
}

/// A freshly minted token and the values persisted for it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Sent to the user; never stored.
    pub token: String,
    pub selector: String,
    pub verifier_hash: Vec<u8>,
}

/// The two halves of a presented token.
#[derive(Debug, Clone)]
pub struct PresentedToken {
    pub selector: String,
    verifier: [u8; VERIFIER_LEN],
}

pub fn issue() -> IssuedToken {
    let mut raw = [0u8; SELECTOR_LEN + VERIFIER_LEN];
    rand::rng().fill_bytes(&mut raw);
    let (selector, verifier) = raw.split_at(SELECTOR_LEN);
    IssuedToken {
        token: URL_SAFE.encode(raw),
        selector: URL_SAFE.encode(selector),
        verifier_hash: hash64(verifier).to_vec(),
    }
}

pub fn hash64(verifier: &[u8]) -> [u8; HASH_LEN] {
    Sha512::digest(verifier).into()
}

pub fn parse(token: &str) -> Result<PresentedToken, TokenError> {
    let raw = URL_SAFE
        .decode(token.trim())
        .map_err(|_| TokenError::Encoding)?;
    if raw.len() != SELECTOR_LEN + VERIFIER_LEN {
        return Err(TokenError::Length);
    }
    let (selector, verifier) = raw.split_at(SELECTOR_LEN);
    let mut presented = [0u8; VERIFIER_LEN];
    presented.copy_from_slice(verifier);
    Ok(PresentedToken {
        selector: URL_SAFE.encode(selector),
        verifier: presented,
    })
}

impl PresentedToken {
    /// Check the verifier against the stored digest and the stored expiry.
    ///
    /// The digest comparison runs in constant time over all 64 bytes. The
    /// expiry must lie strictly after `now`, both truncated to the second.
    pub fn check(
        &self,
        stored_hash: &[u8],
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), TokenError> {
        let presented = hash64(&self.verifier);
        if stored_hash.len() != HASH_LEN || !bool::from(presented.ct_eq(stored_hash)) {
            return Err(TokenError::Mismatch);
        }
        if now.trunc_subsecs(0) >= expires_at.trunc_subsecs(0) {
            return Err(TokenError::Expired);
        }
        Ok(())
    }
}
