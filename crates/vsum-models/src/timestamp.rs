//! Timecode formatting utilities.
//!
//! Frames are sampled on whole-second boundaries, so the pipeline only ever
//! needs `HH:MM:SS`; parsing exists for reading timecodes back out of
//! model responses and ledger records.

/// Format whole seconds as `HH:MM:SS`.
///
/// Hours are not wrapped, so a 100-hour offset renders as `100:00:00`.
///
/// # Examples
/// ```
/// use vsum_models::timestamp::format_timecode;
/// assert_eq!(format_timecode(0), "00:00:00");
/// assert_eq!(format_timecode(3661), "01:01:01");
/// ```
pub fn format_timecode(total_secs: u32) -> String {
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// Parse `HH:MM:SS`, `MM:SS` or `SS` into whole seconds.
///
/// Returns `None` for anything else, including fractional seconds.
pub fn parse_timecode(ts: &str) -> Option<u32> {
    let ts = ts.trim();
    if ts.is_empty() {
        return None;
    }

    let mut total: u32 = 0;
    let parts: Vec<&str> = ts.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    for (i, part) in parts.iter().enumerate() {
        let value: u32 = part.parse().ok()?;
        // Every component after the first is bounded to a sexagesimal digit.
        if i > 0 && value >= 60 {
            return None;
        }
        total = total.checked_mul(60)?.checked_add(value)?;
    }
    Some(total)
}
