// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and window checks.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Length of a conditioning week and of the activity backdating window, in days.
pub const WEEK_DAYS: i64 = 7;

/// One conditioning week.
pub fn week() -> Duration {
    Duration::days(WEEK_DAYS)
}

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Calendar date (`YYYY-MM-DD`) of a timestamp, used for the nominal date fields.
pub fn calendar_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Whether at least one full week has elapsed since `since`.
pub fn week_elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - since >= week()
}
