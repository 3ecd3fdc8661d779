//! UTC timestamp helpers.

use chrono::{DateTime, SubsecRound, Utc};

/// Returns the current time as a timezone-aware UTC timestamp.
pub fn utc_now_time_aware() -> DateTime<Utc> {
    Utc::now()
}

/// Returns the current UTC time truncated to microseconds.
///
/// Storage keeps microsecond precision, so values stamped with this helper
/// compare equal after a round trip.
pub fn utc_now_micros() -> DateTime<Utc> {
    utc_now_time_aware().trunc_subsecs(6)
}
