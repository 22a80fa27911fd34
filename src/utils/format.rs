use chrono::{DateTime, Local};
use rand::Rng;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Formats an RFC 3339 timestamp as `YYYY-MM-DD` or `YYYY-MM-DD HH:MM` in
/// local time. Empty input gives an empty string, unparsable input is
/// returned unchanged.
pub fn format_date(value: &str, include_time: bool) -> String {
    if value.is_empty() {
        return String::new();
    }

    let Ok(parsed) = DateTime::parse_from_rfc3339(value) else {
        return value.to_string();
    };
    let local = parsed.with_timezone(&Local);

    if include_time {
        local.format("%Y-%m-%d %H:%M").to_string()
    } else {
        local.format("%Y-%m-%d").to_string()
    }
}

/// Human-readable byte count with 1024-based units and at most two decimals
#[allow(clippy::cast_precision_loss)]
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut unit = 0;
    let mut scale: u64 = 1;
    while unit < SIZE_UNITS.len() - 1 && bytes >= scale * 1024 {
        scale *= 1024;
        unit += 1;
    }
    let value = bytes as f64 / scale as f64;

    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", SIZE_UNITS[unit])
}

/// Short unique token: base-36 millisecond timestamp followed by random base-36 characters
#[allow(clippy::cast_sign_loss)]
pub fn generate_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let mut id = to_base36(millis);

    let mut rng = rand::rng();
    for _ in 0..11 {
        id.push(char::from(BASE36_DIGITS[rng.random_range(0..36)]));
    }
    id
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Shared-secret comparison for the session gate. Plain equality, not a
/// security boundary.
pub fn validate_password(input: &str, secret: &str) -> bool {
    input == secret
}
