use thiserror::Error;
use uuid::Uuid;

/// Length of the canonical hyphenated form, e.g. `67e55044-10b1-426f-9247-bb680e5fe0c8`.
pub const ENCODED_LEN: usize = 36;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("malformed identifier '{0}'")]
    BadIdentifier(String),
}

/// Mint a new 128-bit external identifier from the OS random source.
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}

/// Canonical 36-character lowercase hyphenated form.
pub fn encode(id: &Uuid) -> String {
    id.hyphenated().to_string()
}

/// Inverse of [`encode`]. Only the hyphenated form is accepted; simple,
/// braced and URN spellings are rejected so that every external id has
/// exactly one textual representation.
pub fn decode(s: &str) -> Result<Uuid, IdError> {
    if s.len() != ENCODED_LEN {
        return Err(IdError::BadIdentifier(s.to_string()));
    }
    Uuid::try_parse(s).map_err(|_| IdError::BadIdentifier(s.to_string()))
}
