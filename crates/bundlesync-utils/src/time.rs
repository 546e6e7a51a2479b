use std::time::Duration;

/// Parses a duration string such as `1h30m` or `45s`.
///
/// The string is a sequence of integers each followed by one of the letters
/// `s`, `m`, `h` or `d` for seconds, minutes, hours and days. An empty string
/// is a zero duration.
///
/// Returns `None` if the input is malformed or overflows.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use bundlesync_utils::time::parse_duration;
///
/// assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
/// ```
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut total: u64 = 0;
    let mut chars = input.trim().chars().peekable();

    while chars.peek().is_some() {
        let mut number_str = String::new();
        while let Some(c) = chars.peek() {
            if c.is_ascii_digit() {
                number_str.push(chars.next()?);
            } else {
                break;
            }
        }

        if number_str.is_empty() {
            return None;
        }

        let number: u64 = number_str.parse().ok()?;
        let multiplier = match chars.next()? {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            _ => return None,
        };

        total = total.checked_add(number.checked_mul(multiplier)?)?;
    }

    Some(Duration::from_secs(total))
}

/// Renders a duration in the compact form accepted by [`parse_duration`].
pub fn format_duration(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, size) in [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)] {
        if secs >= size {
            out.push_str(&format!("{}{unit}", secs / size));
            secs %= size;
        }
    }
    out
}
