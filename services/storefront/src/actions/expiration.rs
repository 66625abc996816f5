//! Listing and offer expiration presets

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StorefrontError, StorefrontResult};

/// Duration presets offered when listing or bidding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpirationPreset {
    OneHour,
    OneWeek,
    OneMonth,
    #[default]
    ThreeMonths,
}

impl ExpirationPreset {
    /// All presets in display order
    pub const ALL: [Self; 4] = [Self::OneHour, Self::OneWeek, Self::OneMonth, Self::ThreeMonths];

    #[must_use]
    pub const fn display(&self) -> &'static str {
        match self {
            Self::OneHour => "1 Hour",
            Self::OneWeek => "1 Week",
            Self::OneMonth => "1 Month",
            Self::ThreeMonths => "3 Months",
        }
    }

    /// Nominal length in seconds; a month counts as 30 days
    #[must_use]
    pub const fn duration_seconds(&self) -> i64 {
        const HOUR: i64 = 60 * 60;
        const DAY: i64 = 24 * HOUR;
        match self {
            Self::OneHour => HOUR,
            Self::OneWeek => 7 * DAY,
            Self::OneMonth => 30 * DAY,
            Self::ThreeMonths => 90 * DAY,
        }
    }

    /// Absolute expiry, using calendar months for the month presets
    pub fn expires_at(&self, now: DateTime<Utc>) -> StorefrontResult<DateTime<Utc>> {
        let expiry = match self {
            Self::OneHour => now.checked_add_signed(Duration::hours(1)),
            Self::OneWeek => now.checked_add_signed(Duration::weeks(1)),
            Self::OneMonth => now.checked_add_months(Months::new(1)),
            Self::ThreeMonths => now.checked_add_months(Months::new(3)),
        };
        expiry.ok_or_else(|| StorefrontError::Validation {
            message: format!("expiration {} overflows", self.display()),
        })
    }

    /// Expiry as unix seconds, the form the order protocol expects
    pub fn expiration_time(&self, now: DateTime<Utc>) -> StorefrontResult<i64> {
        Ok(self.expires_at(now)?.timestamp())
    }
}
