use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use serde::Serialize;
use strum::Display;
use utoipa::ToSchema;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, ToSchema)]
pub enum ShiftKind {
    Pending,
    Day,
    Night,
}

/// Local time window that separates day shifts from night shifts.
#[derive(Debug, Clone, Copy)]
pub struct ShiftWindow {
    pub day_start: NaiveTime,
    pub night_start: NaiveTime,
    pub offset: FixedOffset,
}

impl ShiftWindow {
    pub fn from_config(config: &Config) -> Self {
        Self {
            day_start: config.day_shift_start,
            night_start: config.night_shift_start,
            offset: config.utc_offset,
        }
    }

    /// A shift is pending until it has a check-out; afterwards the local
    /// check-in time decides between day and night.
    pub fn classify(&self, check_in: DateTime<Utc>, check_out: Option<DateTime<Utc>>) -> ShiftKind {
        if check_out.is_none() {
            return ShiftKind::Pending;
        }

        let t = check_in.with_timezone(&self.offset).time();
        let is_day = if self.day_start <= self.night_start {
            t >= self.day_start && t < self.night_start
        } else {
            // window wraps midnight
            t >= self.day_start || t < self.night_start
        };

        if is_day { ShiftKind::Day } else { ShiftKind::Night }
    }

    pub fn format_time(&self, ts: DateTime<Utc>) -> String {
        ts.with_timezone(&self.offset).format("%-I:%M %p").to_string()
    }

    pub fn format_day(&self, ts: DateTime<Utc>) -> String {
        ts.with_timezone(&self.offset).format("%d %b").to_string()
    }
}

/// Time worked on a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Worked {
    Working,
    Invalid,
    Duration { hours: i64, minutes: i64 },
}

pub fn worked(check_in: DateTime<Utc>, check_out: Option<DateTime<Utc>>) -> Worked {
    let Some(check_out) = check_out else {
        return Worked::Working;
    };

    let diff = check_out - check_in;
    if diff < chrono::Duration::zero() {
        return Worked::Invalid;
    }

    let total_minutes = diff.num_minutes();
    Worked::Duration {
        hours: total_minutes / 60,
        minutes: total_minutes % 60,
    }
}

impl fmt::Display for Worked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Worked::Working => write!(f, "Working"),
            Worked::Invalid => write!(f, "Invalid"),
            Worked::Duration { hours, minutes } => write!(f, "{hours}h {minutes}m"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window(offset_minutes: i32) -> ShiftWindow {
        ShiftWindow {
            day_start: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            night_start: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            offset: FixedOffset::east_opt(offset_minutes * 60).unwrap(),
        }
    }

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, h, m, 0).unwrap()
    }

    #[test]
    fn open_shift_is_pending() {
        assert_eq!(window(0).classify(utc(9, 0), None), ShiftKind::Pending);
    }

    #[test]
    fn check_in_hour_decides_day_or_night() {
        let w = window(0);
        assert_eq!(w.classify(utc(6, 0), Some(utc(14, 0))), ShiftKind::Day);
        assert_eq!(w.classify(utc(17, 59), Some(utc(22, 0))), ShiftKind::Day);
        assert_eq!(w.classify(utc(18, 0), Some(utc(23, 0))), ShiftKind::Night);
        assert_eq!(w.classify(utc(2, 0), Some(utc(5, 0))), ShiftKind::Night);
    }

    #[test]
    fn classification_uses_local_time() {
        // 13:00 UTC is 18:30 at +05:30
        assert_eq!(window(330).classify(utc(13, 0), Some(utc(20, 0))), ShiftKind::Night);
    }

    #[test]
    fn wrapped_window() {
        let w = ShiftWindow {
            day_start: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            night_start: NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
            offset: FixedOffset::east_opt(0).unwrap(),
        };
        assert_eq!(w.classify(utc(22, 0), Some(utc(23, 0))), ShiftKind::Day);
        assert_eq!(w.classify(utc(3, 0), Some(utc(5, 0))), ShiftKind::Day);
        assert_eq!(w.classify(utc(12, 0), Some(utc(13, 0))), ShiftKind::Night);
    }

    #[test]
    fn worked_hours_floor_to_minutes() {
        let out = Utc.with_ymd_and_hms(2025, 3, 14, 17, 45, 59).unwrap();
        assert_eq!(worked(utc(9, 0), Some(out)).to_string(), "8h 45m");
        assert_eq!(worked(utc(9, 0), None).to_string(), "Working");
        assert_eq!(worked(utc(9, 0), Some(utc(8, 0))), Worked::Invalid);
    }

    #[test]
    fn display_helpers() {
        let w = window(330);
        assert_eq!(w.format_time(utc(3, 35)), "9:05 AM");
        assert_eq!(w.format_day(utc(3, 35)), "14 Mar");
    }
}
