//! Sampling steps between consecutive index entries.
//!
//! Calendar steps (months, quarters, years) are not fixed durations, so a gap
//! between two timestamps is classified as a month step when both stamps share
//! the same day-of-month and time of day (or both sit on a month end).
//! Everything else is measured in seconds.

use std::fmt;

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TsError};

/// Step between two index entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Seconds(i64),
    Months(u32),
    Positions(i64),
}

impl Step {
    /// Parse a frequency alias: `S`, `min`, `H`, `D`, `W`, `M`, `Q`, `Y`,
    /// optionally prefixed by a multiplier (`15min`, `2D`).
    pub fn parse(alias: &str) -> Result<Step> {
        let alias = alias.trim();
        let split = alias.find(|c: char| !c.is_ascii_digit()).unwrap_or(alias.len());
        let (count, unit) = alias.split_at(split);
        let count: i64 = if count.is_empty() {
            1
        } else {
            count
                .parse()
                .map_err(|_| TsError::invalid_parameter("frequency", format!("bad multiplier in '{alias}'")))?
        };
        if count <= 0 {
            return Err(TsError::invalid_parameter("frequency", "multiplier must be >= 1"));
        }
        let months = |m: i64| -> Result<Step> {
            u32::try_from(m * count)
                .map(Step::Months)
                .map_err(|_| TsError::invalid_parameter("frequency", format!("'{alias}' is too large")))
        };
        match unit {
            "S" | "s" => Ok(Step::Seconds(count)),
            "min" | "T" => Ok(Step::Seconds(60 * count)),
            "H" | "h" => Ok(Step::Seconds(3_600 * count)),
            "D" | "d" => Ok(Step::Seconds(86_400 * count)),
            "W" | "w" => Ok(Step::Seconds(7 * 86_400 * count)),
            "M" => months(1),
            "Q" | "q" => months(3),
            "Y" | "y" | "A" => months(12),
            "" => Ok(Step::Positions(count)),
            other => Err(TsError::invalid_parameter(
                "frequency",
                format!("unknown frequency unit '{other}' (expected S, min, H, D, W, M, Q or Y)"),
            )),
        }
    }

    /// Classify the gap between two timestamps.
    pub fn between_timestamps(a: NaiveDateTime, b: NaiveDateTime) -> Step {
        let months = (b.year() - a.year()) * 12 + b.month() as i32 - a.month() as i32;
        let same_day = a.day() == b.day() || (is_month_end(a.date()) && is_month_end(b.date()));
        if months > 0 && same_day && a.time() == b.time() {
            return Step::Months(months as u32);
        }
        Step::Seconds((b - a).num_seconds())
    }

    pub fn between_positions(a: i64, b: i64) -> Step {
        Step::Positions(b - a)
    }

    /// Move a timestamp forward by `k` steps.
    pub fn advance_timestamp(self, ts: NaiveDateTime, k: u32) -> Option<NaiveDateTime> {
        match self {
            Step::Seconds(s) => ts.checked_add_signed(Duration::seconds(s.checked_mul(i64::from(k))?)),
            Step::Months(m) => {
                let shifted = ts.checked_add_months(Months::new(m.checked_mul(k)?))?;
                if is_month_end(ts.date()) {
                    let end = last_day_of_month(shifted.date())?;
                    Some(end.and_time(ts.time()))
                } else {
                    Some(shifted)
                }
            }
            Step::Positions(_) => None,
        }
    }

    /// Move an integer position forward by `k` steps.
    pub fn advance_position(self, p: i64, k: u32) -> Option<i64> {
        match self {
            Step::Positions(s) => p.checked_add(s.checked_mul(i64::from(k))?),
            _ => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Step::Seconds(s) if s % 604_800 == 0 => write!(f, "{}W", s / 604_800),
            Step::Seconds(s) if s % 86_400 == 0 => write!(f, "{}D", s / 86_400),
            Step::Seconds(s) if s % 3_600 == 0 => write!(f, "{}H", s / 3_600),
            Step::Seconds(s) if s % 60 == 0 => write!(f, "{}min", s / 60),
            Step::Seconds(s) => write!(f, "{s}S"),
            Step::Months(m) if m % 12 == 0 => write!(f, "{}Y", m / 12),
            Step::Months(m) if m % 3 == 0 => write!(f, "{}Q", m / 3),
            Step::Months(m) => write!(f, "{m}M"),
            Step::Positions(p) => write!(f, "{p}"),
        }
    }
}

pub(crate) fn is_month_end(d: NaiveDate) -> bool {
    d.succ_opt().map(|n| n.month() != d.month()).unwrap_or(true)
}

pub(crate) fn last_day_of_month(d: NaiveDate) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(d.year(), d.month(), 1)?;
    first.checked_add_months(Months::new(1))?.pred_opt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn parses_aliases_with_multipliers() {
        assert_eq!(Step::parse("D").unwrap(), Step::Seconds(86_400));
        assert_eq!(Step::parse("15min").unwrap(), Step::Seconds(900));
        assert_eq!(Step::parse("Q").unwrap(), Step::Months(3));
        assert_eq!(Step::parse("2Y").unwrap(), Step::Months(24));
        assert!(Step::parse("fortnight").is_err());
    }

    #[test]
    fn month_end_series_is_monthly() {
        assert_eq!(Step::between_timestamps(ts(2020, 1, 31), ts(2020, 2, 29)), Step::Months(1));
        assert_eq!(Step::between_timestamps(ts(2020, 1, 15), ts(2020, 4, 15)), Step::Months(3));
        assert_eq!(Step::between_timestamps(ts(2020, 1, 31), ts(2020, 2, 1)), Step::Seconds(86_400));
    }

    #[test]
    fn advancing_month_end_stays_on_month_end() {
        let next = Step::Months(1).advance_timestamp(ts(2021, 1, 31), 1).unwrap();
        assert_eq!(next, ts(2021, 2, 28));
        let next = Step::Months(1).advance_timestamp(ts(2021, 1, 31), 3).unwrap();
        assert_eq!(next, ts(2021, 4, 30));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for alias in ["1D", "1W", "15min", "1M", "1Q", "1Y", "1H"] {
            let step = Step::parse(alias).unwrap();
            assert_eq!(step.to_string(), alias);
        }
    }
}
