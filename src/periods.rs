// src/periods.rs

use anyhow::{bail, Result};
use chrono::{Datelike, NaiveDate};
use std::fmt;

/// One calendar year-month unit of work. Identifies a single BTS archive
/// and a single warehouse load batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            bail!("month {} out of range 1-12", month);
        }
        Ok(Period { year, month })
    }

    fn next(self) -> Self {
        if self.month == 12 {
            Period {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Period {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for Period {
    /// BTS archive names use an unpadded month, e.g. `2024_10` and `2025_4`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.year, self.month)
    }
}

/// The most recent month BTS has normally published by `today`: three
/// calendar months prior, with the year rolling back for Jan-Mar.
pub fn latest_published(today: NaiveDate) -> Period {
    let (year, month) = match today.month() {
        m @ 1..=3 => (today.year() - 1, m + 9),
        m => (today.year(), m - 3),
    };
    Period { year, month }
}

/// Every month from `start` to `end` inclusive, in chronological order.
/// When `end` is `None` it defaults to [`latest_published`] of `today`.
pub fn resolve_range(start: Period, end: Option<Period>, today: NaiveDate) -> Result<Vec<Period>> {
    let end = end.unwrap_or_else(|| latest_published(today));
    if start > end {
        bail!("start period {} is after end period {}", start, end);
    }

    let mut periods = Vec::new();
    let mut cur = start;
    loop {
        periods.push(cur);
        if cur == end {
            break;
        }
        cur = cur.next();
    }
    Ok(periods)
}
