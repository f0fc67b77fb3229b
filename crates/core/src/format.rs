/// Format seconds for encoder arguments: millisecond precision, no trailing zeros.
pub fn format_seconds(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let mut text = format!("{:.3}", seconds);
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
    }
    text
}

/// Parse an HH:MM:SS.ff clock into seconds.
pub fn parse_clock(clock: &str) -> Option<f64> {
    let mut parts = clock.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let mins: u64 = parts.next()?.parse().ok()?;
    let secs: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(3600.0 * hours as f64 + 60.0 * mins as f64 + secs)
}
