//! Wall-clock time for the clock band

use core::fmt::Write;
use core::future::Future;

use heapless::String;
use jiff::civil::DateTime;
use jiff::tz::Offset;
use jiff::Timestamp;

/// Network time source
pub trait TimeSource {
    /// (Re)start synchronisation; local time is `offset_s` seconds east of
    /// UTC from now on.
    fn configure(&mut self, offset_s: i32) -> impl Future<Output = ()>;

    /// Local wall-clock time, or `None` until the first successful sync
    fn local_now(&self) -> Option<DateTime>;
}

/// Convert a UTC instant to local civil time.
///
/// Offsets jiff cannot represent (beyond ±25:59:59) fall back to UTC.
pub fn local_time(utc: Timestamp, offset_s: i32) -> DateTime {
    Offset::from_seconds(offset_s)
        .unwrap_or(Offset::UTC)
        .to_datetime(utc)
}

/// Text shown in the clock band
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockFace {
    /// `HH:MM`, or `--:--` before the clock is set
    pub time: String<5>,
    /// `Mon DD`
    pub date: Option<String<6>>,
}

impl ClockFace {
    pub fn new(now: Option<DateTime>) -> Self {
        match now {
            Some(now) => Self::at(now),
            None => Self::unset(),
        }
    }

    pub fn unset() -> Self {
        let mut time = String::new();
        let _ = time.push_str("--:--");
        Self { time, date: None }
    }

    fn at(now: DateTime) -> Self {
        let mut time = String::new();
        let _ = write!(time, "{}", now.strftime("%H:%M"));

        let mut date = String::new();
        let _ = write!(date, "{}", now.strftime("%b %d"));

        Self {
            time,
            date: Some(date),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_unset_face() {
        let face = ClockFace::new(None);
        assert_eq!(face.time.as_str(), "--:--");
        assert_eq!(face.date, None);
    }

    #[test]
    fn test_face_formatting() {
        let face = ClockFace::new(Some(date(2024, 1, 5).at(9, 7, 59, 0)));
        assert_eq!(face.time.as_str(), "09:07");
        assert_eq!(face.date.as_deref(), Some("Jan 05"));

        let face = ClockFace::new(Some(date(2023, 12, 31).at(23, 59, 0, 0)));
        assert_eq!(face.time.as_str(), "23:59");
        assert_eq!(face.date.as_deref(), Some("Dec 31"));
    }

    #[test]
    fn test_month_abbreviations() {
        let expected = [
            "Jan 01", "Feb 01", "Mar 01", "Apr 01", "May 01", "Jun 01", "Jul 01", "Aug 01",
            "Sep 01", "Oct 01", "Nov 01", "Dec 01",
        ];
        for (month, text) in (1..=12).zip(expected) {
            let face = ClockFace::new(Some(date(2025, month, 1).at(0, 0, 0, 0)));
            assert_eq!(face.date.as_deref(), Some(text));
            assert_eq!(face.time.as_str(), "00:00");
        }
    }

    #[test]
    fn test_local_time_applies_offset() {
        // 2024-03-01T20:30:00Z
        let utc = Timestamp::from_second(1_709_325_000).unwrap();

        assert_eq!(local_time(utc, 0), date(2024, 3, 1).at(20, 30, 0, 0));
        // UTC+8 crosses midnight into the next day.
        assert_eq!(local_time(utc, 28_800), date(2024, 3, 2).at(4, 30, 0, 0));
        assert_eq!(local_time(utc, -18_000), date(2024, 3, 1).at(15, 30, 0, 0));
    }

    #[test]
    fn test_unrepresentable_offset_is_utc() {
        let utc = Timestamp::from_second(1_709_325_000).unwrap();
        assert_eq!(local_time(utc, 200_000), local_time(utc, 0));
    }
}
