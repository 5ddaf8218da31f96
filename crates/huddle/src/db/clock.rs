//! Timestamps stored in `messages.date` and `groups.last_message`.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};

static LAST_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Current time as a millisecond RFC 3339 UTC string.
///
/// Readings are strictly increasing within the process; a reading equal to
/// or behind the previous one is bumped by one millisecond. Lexicographic
/// order of the strings therefore matches insertion order.
pub fn timestamp_now() -> String {
    let now = Utc::now().timestamp_millis();
    let mut prev = LAST_MILLIS.load(Ordering::Relaxed);
    let millis = loop {
        let next = now.max(prev + 1);
        match LAST_MILLIS.compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => break next,
            Err(actual) => prev = actual,
        }
    };
    format_millis(millis)
}

/// Format epoch milliseconds as `YYYY-MM-DDTHH:MM:SS.sssZ`.
pub fn format_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse any RFC 3339 timestamp and re-emit it in the stored format.
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| format_millis(dt.with_timezone(&Utc).timestamp_millis()))
}
