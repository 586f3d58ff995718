//! Timer strings: `H:MM:SS.mmm`, `M:SS`, `SS.s` and plain seconds.

/// Parse a timer string into milliseconds.
///
/// Accepts up to three `:`-separated components (hours, minutes, seconds);
/// the last component may carry a fractional part which is truncated to
/// milliseconds. Surrounding whitespace is ignored. Returns `None` for
/// anything else.
pub fn parse_timer(raw: &str) -> Option<u64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let (whole_parts, last) = parts.split_at(parts.len() - 1);
    let last = last.first()?;
    let (secs_str, frac_str) = match last.split_once('.') {
        Some((a, b)) => (a, b),
        None => (*last, ""),
    };

    let secs = if secs_str.is_empty() && !frac_str.is_empty() {
        0
    } else {
        parse_digits(secs_str)?
    };
    let total = if whole_parts.is_empty() {
        secs
    } else {
        let mut minutes: u64 = 0;
        for part in whole_parts {
            minutes = minutes.checked_mul(60)?.checked_add(parse_digits(part)?)?;
        }
        minutes.checked_mul(60)?.checked_add(secs)?
    };

    if !frac_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut millis: u64 = 0;
    for (i, b) in frac_str.bytes().take(3).enumerate() {
        millis += u64::from(b - b'0') * 10u64.pow(2 - i as u32);
    }

    total.checked_mul(1000)?.checked_add(millis)
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Render milliseconds as `H:MM:SS.mmm`, dropping the hour field when zero.
pub fn format_timer(ms: u64) -> String {
    let total_secs = ms / 1000;
    let millis = ms % 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs / 60) % 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
    } else {
        format!("{}:{:02}.{:03}", minutes, secs, millis)
    }
}
