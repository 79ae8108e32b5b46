use time::OffsetDateTime;

/// Local wall time, or UTC when the local offset cannot be determined.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// `hh:mm:ss AM` on a 12-hour clock.
pub fn format_time(at: OffsetDateTime) -> String {
    let hour = at.hour();
    let meridiem = if hour >= 12 { "PM" } else { "AM" };
    let hour = match hour % 12 {
        0 => 12,
        other => other,
    };
    format!(
        "{hour:02}:{:02}:{:02} {meridiem}",
        at.minute(),
        at.second()
    )
}

/// `Friday, Oct 16`.
pub fn format_date(at: OffsetDateTime) -> String {
    let month = at.month().to_string();
    let short: String = month.chars().take(3).collect();
    format!("{}, {short} {}", at.weekday(), at.day())
}
