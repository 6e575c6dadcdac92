use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// DateTimeRange
///
/// Closed interval with optionally open ends.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct DateTimeRange {
    pub from: Option<DateTime<FixedOffset>>,
    pub to: Option<DateTime<FixedOffset>>,
}

impl DateTimeRange {
    #[must_use]
    pub const fn between(from: DateTime<FixedOffset>, to: DateTime<FixedOffset>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    #[must_use]
    pub const fn since(from: DateTime<FixedOffset>) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    #[must_use]
    pub const fn until(to: DateTime<FixedOffset>) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    #[must_use]
    pub fn contains(&self, moment: DateTime<FixedOffset>) -> bool {
        self.from.is_none_or(|from| from <= moment) && self.to.is_none_or(|to| moment <= to)
    }
}

impl fmt::Display for DateTimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from = self.from.map(|d| d.to_rfc3339()).unwrap_or_default();
        let to = self.to.map(|d| d.to_rfc3339()).unwrap_or_default();

        write!(f, "[{from},{to}]")
    }
}
