use chrono::{DateTime, Datelike, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// The timestamp tuple attached to every row.
///
/// A logical operation calls [`Stamp::now`] once and hands the same value to
/// every row it creates or updates, so all of them agree on the instant and
/// on the derived calendar fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Stamp {
    /// UTC instant truncated to whole seconds.
    pub at: DateTime<Utc>,
    /// Day of year, 1-based.
    pub day: i32,
    /// ISO-8601 week number.
    pub week: i32,
    pub month: i32,
    pub year: i32,
}

impl Stamp {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        let at = instant.trunc_subsecs(0);
        Self {
            at,
            day: at.ordinal() as i32,
            week: at.iso_week().week() as i32,
            month: at.month() as i32,
            year: at.year(),
        }
    }
}
