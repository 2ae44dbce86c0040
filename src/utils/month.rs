use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// A calendar month, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) || !(1970..=9999).contains(&year) {
            return None;
        }
        Some(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }

    pub fn first_day(&self) -> NaiveDate {
        // validated in `new`
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    fn next_first_day(&self) -> NaiveDate {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX)
    }

    pub fn days_in_month(&self) -> u32 {
        (self.next_first_day() - self.first_day()).num_days() as u32
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let first = self.first_day();
        (0..self.days_in_month()).map(move |d| first + Duration::days(d as i64))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Half-open UTC range `[start, end)` covering the month in local time.
    pub fn utc_bounds(&self, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            local_midnight_utc(self.first_day(), offset),
            local_midnight_utc(self.next_first_day(), offset),
        )
    }
}

fn local_midnight_utc(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN) - Duration::seconds(offset.local_minus_utc() as i64);
    Utc.from_utc_datetime(&naive)
}

pub fn local_date(ts: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    ts.with_timezone(&offset).date_naive()
}

/// `YYYY-MM-DD` key used by the register views.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_months() {
        assert!(Month::new(2025, 0).is_none());
        assert!(Month::new(2025, 13).is_none());
        assert!(Month::new(1969, 5).is_none());
        assert!(Month::new(2025, 12).is_some());
    }

    #[test]
    fn counts_days_including_leap_february() {
        assert_eq!(Month::new(2024, 2).unwrap().days_in_month(), 29);
        assert_eq!(Month::new(2025, 2).unwrap().days_in_month(), 28);
        assert_eq!(Month::new(2025, 12).unwrap().days_in_month(), 31);
        assert_eq!(Month::new(2025, 4).unwrap().days().count(), 30);
    }

    #[test]
    fn utc_bounds_follow_the_local_offset() {
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        let (start, end) = Month::new(2025, 3).unwrap().utc_bounds(ist);

        assert_eq!(start.to_rfc3339(), "2025-02-28T18:30:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-03-31T18:30:00+00:00");
    }

    #[test]
    fn local_date_crosses_midnight() {
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 3, 31, 20, 0, 0).unwrap();

        assert_eq!(day_key(local_date(ts, ist)), "2025-04-01");
        assert!(Month::new(2025, 4).unwrap().contains(local_date(ts, ist)));
    }
}
