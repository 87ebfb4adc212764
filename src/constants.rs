//! Common constants used across the application

use chrono_tz::Tz;

/// Fixed reference timezone for interpreting deadlines and wall-clock times
pub const REFERENCE_ZONE: Tz = chrono_tz::Asia::Bangkok;

/// Instants within this window of now are treated as "fire immediately"
pub const GRACE_BUFFER_MINUTES: i64 = 5;

/// New schedules must land at least this far in the future
/// (larger than the grace buffer: multi-recipient fan-out takes time)
pub const SCHEDULE_GUARD_MINUTES: i64 = 10;

/// Minimum delay accepted by the dispatch facility (seconds)
pub const MIN_DISPATCH_DELAY_SECS: i64 = 60;

/// Lead time used by the degraded day-level schedule check
pub const FALLBACK_LEAD_HOURS: i64 = 1;
