//! Forward-only descending pagination cursor.
//!
//! A cursor is the standard base64 encoding of the decimal representation of
//! an internal row id. Listings select `id <= cursor ORDER BY id DESC`, so the
//! cursor handed back to the caller is `last_id - 1`. An empty cursor starts
//! from the highest id; the literal `"0"` marks an exhausted listing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use thiserror::Error;

/// Returned as `next_cursor` when a page came back empty.
pub const EXHAUSTED: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    #[error("cursor '{0}' is not valid base64")]
    Encoding(String),
    #[error("cursor '{0}' does not hold a row id")]
    NotAnId(String),
}

pub fn encode(id: i64) -> String {
    B64.encode(id.to_string())
}

/// Decode a cursor into the inclusive upper bound for the next page.
pub fn decode(cursor: &str) -> Result<i64, CursorError> {
    let cursor = cursor.trim();
    if cursor.is_empty() {
        return Ok(i64::MAX);
    }
    if cursor == EXHAUSTED {
        return Ok(0);
    }
    let raw = B64
        .decode(cursor)
        .map_err(|_| CursorError::Encoding(cursor.to_string()))?;
    let text = String::from_utf8(raw).map_err(|_| CursorError::NotAnId(cursor.to_string()))?;
    let id: i64 = text
        .parse()
        .map_err(|_| CursorError::NotAnId(cursor.to_string()))?;
    if id < 0 {
        return Err(CursorError::NotAnId(cursor.to_string()));
    }
    Ok(id)
}

/// Cursor for the page after one whose smallest id was `last_id`.
pub fn next(last_id: Option<i64>) -> String {
    match last_id {
        Some(id) => encode(id - 1),
        None => EXHAUSTED.to_string(),
    }
}
