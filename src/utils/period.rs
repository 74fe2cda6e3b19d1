//! Monthly billing period arithmetic.

use chrono::{DateTime, Datelike, Duration, Months, Utc};

fn add_month(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.checked_add_months(Months::new(1))
        .unwrap_or_else(|| ts + Duration::days(30))
}

/// The boundary `months` months after `anchor`'s month, on `day` or the last
/// day of a shorter month. Time of day is taken from `anchor`.
fn month_boundary(anchor: DateTime<Utc>, months: u32, day: u32) -> Option<DateTime<Utc>> {
    let first = anchor
        .with_day(1)?
        .checked_add_months(Months::new(months))?;
    let last_day = (first.checked_add_months(Months::new(1))? - Duration::days(1)).day();
    first.with_day(day.min(last_day))
}

/// A one-month period starting at `now`.
pub fn monthly_period_from(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (now, add_month(now))
}

/// Advances `[start, end)` by whole months until it contains `now`.
///
/// Boundaries are counted from `start`, so a period anchored on the 31st
/// comes back to the 31st after a short month. A period that is already
/// current is returned unchanged. Degenerate periods (end not after start)
/// restart at `now`.
pub fn roll_period_forward(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    if end <= start {
        return monthly_period_from(now);
    }
    // A clamped boundary is shorter than the anchor day on either side.
    let day = start.day().max(end.day());
    let (mut from, mut to) = (start, end);
    let mut months = 1;
    while to <= now {
        months += 1;
        let Some(next) = month_boundary(start, months, day) else {
            return monthly_period_from(now);
        };
        from = to;
        to = next;
    }
    (from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_monthly_period() {
        let (s, e) = monthly_period_from(at(2025, 1, 31));
        assert_eq!(s, at(2025, 1, 31));
        assert_eq!(e, at(2025, 2, 28));
    }

    #[test]
    fn test_current_period_untouched() {
        let (s, e) = roll_period_forward(at(2025, 3, 1), at(2025, 4, 1), at(2025, 3, 15));
        assert_eq!((s, e), (at(2025, 3, 1), at(2025, 4, 1)));
    }

    #[test]
    fn test_rolls_over_several_months() {
        let (s, e) = roll_period_forward(at(2025, 1, 10), at(2025, 2, 10), at(2025, 5, 20));
        assert_eq!((s, e), (at(2025, 5, 10), at(2025, 6, 10)));

        // Boundary: a period ending exactly now is expired.
        let (s, e) = roll_period_forward(at(2025, 1, 10), at(2025, 2, 10), at(2025, 2, 10));
        assert_eq!((s, e), (at(2025, 2, 10), at(2025, 3, 10)));
    }

    #[test]
    fn test_month_end_anchor_does_not_drift() {
        let (s, e) = roll_period_forward(at(2025, 1, 31), at(2025, 2, 28), at(2025, 4, 5));
        assert_eq!((s, e), (at(2025, 3, 31), at(2025, 4, 30)));

        // Rolling again from a clamped start still lands on the 31st.
        let (s, e) = roll_period_forward(at(2025, 2, 28), at(2025, 3, 31), at(2025, 5, 1));
        assert_eq!((s, e), (at(2025, 4, 30), at(2025, 5, 31)));
    }

    #[test]
    fn test_degenerate_period_restarts() {
        let now = at(2025, 6, 1);
        let (s, e) = roll_period_forward(at(2025, 2, 1), at(2025, 2, 1), now);
        assert_eq!((s, e), (now, at(2025, 7, 1)));
    }
}
