use tracing::warn;

/// Epoch timestamp (seconds, millisecond precision) in the configured
/// timezone. Falls back to UTC if the tz string does not parse; refresh
/// markers are better slightly off than missing.
pub fn now_local_ts(tz: &str) -> f64 {
    let now = match tz.parse::<chrono_tz::Tz>() {
        Ok(tz) => chrono::Utc::now().with_timezone(&tz).timestamp_millis(),
        Err(_) => {
            warn!(tz, "time.invalid_tz, falling back to UTC");
            chrono::Utc::now().timestamp_millis()
        }
    };
    now as f64 / 1000.0
}
