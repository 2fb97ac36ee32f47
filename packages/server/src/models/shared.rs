use serde::{Deserialize, Serialize};

use crate::config::DatabaseConfig;
use crate::error::AppError;

/// Reference to a row either by internal id (JSON number) or by external
/// id (JSON string).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum EntityRef {
    Internal(i64),
    External(String),
}

impl EntityRef {
    /// Interpret a path segment: all digits is an internal id, anything else
    /// is treated as an external id.
    pub fn from_path(segment: &str) -> Self {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = segment.parse() {
                return EntityRef::Internal(id);
            }
        }
        EntityRef::External(segment.to_owned())
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRef::Internal(id) => write!(f, "{id}"),
            EntityRef::External(uuid) => f.write_str(uuid),
        }
    }
}

/// Cursor-paginated list envelope.
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Pass back as `cursor` to get the next page. `"0"` once exhausted.
    #[schema(example = "MTI=")]
    pub next_cursor: String,
}

/// Query parameters of every cursor listing.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Page size; defaults to `db.limit_default`, capped at `db.limit_max`.
    pub limit: Option<u64>,
    /// Opaque cursor from a previous page; empty starts at the newest row.
    pub cursor: Option<String>,
}

impl ListParams {
    pub fn limit(&self, config: &DatabaseConfig) -> u64 {
        self.limit
            .unwrap_or(config.limit_default)
            .clamp(1, config.limit_max.max(1))
    }

    pub fn cursor(&self) -> &str {
        self.cursor.as_deref().unwrap_or("")
    }
}

/// Validate a trimmed text field against a character-count range.
pub fn validate_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), AppError> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(AppError::Validation(format!(
            "{field} must be {min}-{max} characters"
        )));
    }
    Ok(())
}
