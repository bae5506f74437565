use chrono::{Days, Local, NaiveDate, Utc};

/// Gestation length used to derive a pregnancy's expected foaling date.
pub const GESTATION_DAYS: u64 = 340;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// The server's local calendar date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parse a calendar day. Accepts `YYYY-MM-DD` and anything that starts with
/// it (`2024-03-01T10:00:00Z`, `2024-03-01 08:00:00`), which is how the
/// legacy client and document store wrote dates.
pub fn parse_day(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    let head = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

pub fn expected_foaling_date(mating_date: NaiveDate) -> NaiveDate {
    mating_date
        .checked_add_days(Days::new(GESTATION_DAYS))
        .unwrap_or(NaiveDate::MAX)
}

/// Whole days from `today` to `date`; negative when `date` is in the past.
pub fn days_until(date: NaiveDate, today: NaiveDate) -> i64 {
    (date - today).num_days()
}
