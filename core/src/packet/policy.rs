//! When a packet opens
//!
//! A [`ReleasePolicy`] is resolved once, at creation, into the release
//! timestamp registered with the key registry.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::error::CreateError;

/// Lunar New Year (UTC dates)
const LUNAR_NEW_YEAR: &[(i32, u32, u32)] = &[
    (2025, 1, 29),
    (2026, 2, 17),
    (2027, 2, 6),
    (2028, 1, 26),
    (2029, 2, 13),
    (2030, 2, 3),
    (2031, 1, 23),
    (2032, 2, 11),
    (2033, 1, 31),
    (2034, 2, 19),
    (2035, 2, 8),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarEvent {
    LunarNewYear,
    NewYear,
}

impl CalendarEvent {
    /// First occurrence strictly after `now`, at UTC midnight
    pub fn next_after(&self, now: u64) -> Option<u64> {
        match self {
            CalendarEvent::LunarNewYear => LUNAR_NEW_YEAR
                .iter()
                .filter_map(|&(y, m, d)| midnight(y, m, d))
                .find(|&ts| ts > now),
            CalendarEvent::NewYear => {
                let year = DateTime::<Utc>::from_timestamp(i64::try_from(now).ok()?, 0)?.year();
                midnight(year + 1, 1, 1)
            }
        }
    }
}

impl fmt::Display for CalendarEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalendarEvent::LunarNewYear => f.write_str("lunar-new-year"),
            CalendarEvent::NewYear => f.write_str("new-year"),
        }
    }
}

fn midnight(year: i32, month: u32, day: u32) -> Option<u64> {
    let ts = NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(0, 0, 0)?
        .and_utc()
        .timestamp();
    u64::try_from(ts).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Seconds from creation
    After(u64),
    /// Absolute unix timestamp
    At(u64),
    Event(CalendarEvent),
}

impl ReleasePolicy {
    /// Release timestamp for a packet created at `now`. Must be in the future.
    pub fn resolve(&self, now: u64) -> Result<u64, CreateError> {
        let ts = match self {
            ReleasePolicy::After(0) => {
                return Err(CreateError::InvalidRelease("delay must be positive".into()));
            }
            ReleasePolicy::After(secs) => now
                .checked_add(*secs)
                .ok_or_else(|| CreateError::InvalidRelease("delay overflows".into()))?,
            ReleasePolicy::At(ts) => *ts,
            ReleasePolicy::Event(event) => event.next_after(now).ok_or_else(|| {
                CreateError::InvalidRelease(format!("no known date for the next {event}"))
            })?,
        };
        if ts <= now {
            return Err(CreateError::InvalidRelease(format!(
                "release time {ts} is not in the future"
            )));
        }
        Ok(ts)
    }
}

impl FromStr for ReleasePolicy {
    type Err = CreateError;

    /// `60s`, `5m`, `2h`, `1d`, bare seconds, `@<unix>`, RFC 3339,
    /// `lunar-new-year`, `new-year`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || CreateError::InvalidRelease(format!("unrecognized release time {s:?}"));

        match s.to_ascii_lowercase().as_str() {
            "lunar-new-year" | "cny" => return Ok(ReleasePolicy::Event(CalendarEvent::LunarNewYear)),
            "new-year" => return Ok(ReleasePolicy::Event(CalendarEvent::NewYear)),
            _ => {}
        }

        if let Some(ts) = s.strip_prefix('@') {
            return ts.parse().map(ReleasePolicy::At).map_err(|_| invalid());
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            let ts = u64::try_from(dt.timestamp()).map_err(|_| invalid())?;
            return Ok(ReleasePolicy::At(ts));
        }

        let (digits, unit) = match s.char_indices().last() {
            Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], c.to_ascii_lowercase()),
            _ => (s, 's'),
        };
        let n: u64 = digits.parse().map_err(|_| invalid())?;
        let scale = match unit {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            _ => return Err(invalid()),
        };
        n.checked_mul(scale)
            .map(ReleasePolicy::After)
            .ok_or_else(invalid)
    }
}

/// Countdown until release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRemaining {
    pub secs: u64,
}

impl TimeRemaining {
    pub fn until(release_timestamp: u64, now: u64) -> Self {
        Self {
            secs: release_timestamp.saturating_sub(now),
        }
    }

    pub fn is_released(&self) -> bool {
        self.secs == 0
    }

    pub fn hours(&self) -> u64 {
        self.secs / 3_600
    }

    pub fn minutes(&self) -> u64 {
        (self.secs % 3_600) / 60
    }

    pub fn seconds(&self) -> u64 {
        self.secs % 60
    }
}

impl fmt::Display for TimeRemaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h {}m {}s", self.hours(), self.minutes(), self.seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2026-01-01T00:00:00Z
    const JAN_1_2026: u64 = 1_767_225_600;

    #[test]
    fn test_parse_durations() {
        assert_eq!("60s".parse::<ReleasePolicy>().unwrap(), ReleasePolicy::After(60));
        assert_eq!("5m".parse::<ReleasePolicy>().unwrap(), ReleasePolicy::After(300));
        assert_eq!("2h".parse::<ReleasePolicy>().unwrap(), ReleasePolicy::After(7_200));
        assert_eq!("1d".parse::<ReleasePolicy>().unwrap(), ReleasePolicy::After(86_400));
        assert_eq!("90".parse::<ReleasePolicy>().unwrap(), ReleasePolicy::After(90));
        assert!("5w".parse::<ReleasePolicy>().is_err());
        assert!("soon".parse::<ReleasePolicy>().is_err());
    }

    #[test]
    fn test_parse_absolute() {
        assert_eq!(
            "@1767225600".parse::<ReleasePolicy>().unwrap(),
            ReleasePolicy::At(JAN_1_2026)
        );
        assert_eq!(
            "2026-01-01T00:00:00Z".parse::<ReleasePolicy>().unwrap(),
            ReleasePolicy::At(JAN_1_2026)
        );
        assert_eq!(
            "lunar-new-year".parse::<ReleasePolicy>().unwrap(),
            ReleasePolicy::Event(CalendarEvent::LunarNewYear)
        );
    }

    #[test]
    fn test_resolve_rejects_past() {
        assert_eq!(ReleasePolicy::After(60).resolve(100).unwrap(), 160);
        assert!(ReleasePolicy::After(0).resolve(100).is_err());
        assert!(ReleasePolicy::At(100).resolve(100).is_err());
        assert!(ReleasePolicy::At(99).resolve(100).is_err());
        assert_eq!(ReleasePolicy::At(101).resolve(100).unwrap(), 101);
    }

    #[test]
    fn test_calendar_events() {
        // 2026-02-17
        assert_eq!(
            CalendarEvent::LunarNewYear.next_after(JAN_1_2026),
            Some(1_771_286_400)
        );
        // 2027-01-01
        assert_eq!(CalendarEvent::NewYear.next_after(JAN_1_2026), Some(1_798_761_600));
        // exactly at midnight moves on to the next one
        assert_eq!(
            CalendarEvent::LunarNewYear.next_after(1_771_286_400),
            midnight(2027, 2, 6)
        );
        // past the table
        assert_eq!(CalendarEvent::LunarNewYear.next_after(midnight(2036, 1, 1).unwrap()), None);
    }

    #[test]
    fn test_time_remaining() {
        let t = TimeRemaining::until(JAN_1_2026 + 3_725, JAN_1_2026);
        assert_eq!(t.to_string(), "1h 2m 5s");
        assert!(!t.is_released());
        assert!(TimeRemaining::until(10, 20).is_released());
    }
}
