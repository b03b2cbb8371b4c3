use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

/// A calendar month, ordered chronologically.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Month(pub i32, pub u32);

impl Month {
    pub fn new(year: i32, month: u32) -> Self {
        Self(year, month)
    }
    pub fn year(self) -> i32 {
        self.0
    }
    pub fn month(self) -> u32 {
        self.1
    }

    pub(crate) fn is_valid(self) -> bool {
        (1..=12).contains(&self.1)
    }

    /// Months since year 0, used for range arithmetic.
    pub(crate) fn ordinal(self) -> i64 {
        i64::from(self.0) * 12 + i64::from(self.1) - 1
    }

    pub(crate) fn from_ordinal(ordinal: i64) -> Self {
        let year = ordinal.div_euclid(12) as i32;
        let month = ordinal.rem_euclid(12) as u32 + 1;
        Self(year, month)
    }

    /// Reads the leading `YYYY-MM` of an archive timestamp such as
    /// `2019-01-31 23:00`, `2019-01-31` or `2019-01`.
    pub(crate) fn parse_prefix(timestamp: &str) -> Option<Self> {
        let timestamp = timestamp.trim();
        let year = timestamp.get(0..4)?.parse::<i32>().ok()?;
        if timestamp.get(4..5)? != "-" {
            return None;
        }
        let month = timestamp.get(5..7)?.parse::<u32>().ok()?;
        let parsed = Self(year, month);
        parsed.is_valid().then_some(parsed)
    }
}

impl Display for Month {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.0, self.1)
    }
}
