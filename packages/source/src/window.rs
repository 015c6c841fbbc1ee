//! Recent and historical date-window arithmetic.
//!
//! The recent window is the last `days` complete days ending yesterday. The
//! historical window covers the same month/day span shifted back by a whole
//! number of years, either to a fixed reference year or by a fixed offset.

use chrono::{Datelike as _, Days, NaiveDate};
use drift311_snapshot_models::DateWindow;
use serde::{Deserialize, Serialize};

/// Errors from window arithmetic. These are configuration errors and are
/// fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    /// A window must cover at least one day.
    #[error("window length must be at least one day")]
    ZeroDays,

    /// Subtracting the window length from `today` left the calendar range.
    #[error("cannot compute a {days}-day window ending before {today}")]
    OutOfRange {
        /// Reference date.
        today: NaiveDate,
        /// Requested window length.
        days: u32,
    },

    /// Shifting a date to the target year produced a day that does not exist
    /// (February 29 in a non-leap year).
    #[error("{date} has no counterpart in {year}")]
    NonexistentDate {
        /// The recent-window date being shifted.
        date: NaiveDate,
        /// The year it was shifted to.
        year: i32,
    },

    /// The shifted window does not span the same number of days, which
    /// happens when exactly one of the two years contains a leap day inside
    /// the window.
    #[error("historical window {hist} spans {hist_days} days but recent window {recent} spans {recent_days}")]
    LengthMismatch {
        /// The recent window.
        recent: DateWindow,
        /// The shifted window.
        hist: DateWindow,
        /// Days in the recent window.
        recent_days: i64,
        /// Days in the shifted window.
        hist_days: i64,
    },
}

/// How far back the historical window sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoricalAnchor {
    /// Shift so the window starts in a fixed reference year.
    Year {
        /// The reference year (e.g., `2019`).
        year: i32,
    },
    /// Shift back by a fixed number of years.
    YearsBack {
        /// Number of years to subtract.
        years: u32,
    },
}

impl HistoricalAnchor {
    /// The year offset to subtract from a window starting in `start_year`.
    #[must_use]
    pub fn offset_from(self, start_year: i32) -> i32 {
        match self {
            Self::Year { year } => start_year - year,
            Self::YearsBack { years } => i32::try_from(years).unwrap_or(i32::MAX),
        }
    }
}

impl Default for HistoricalAnchor {
    fn default() -> Self {
        Self::Year { year: 2019 }
    }
}

/// The pair of windows fetched on each run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Windows {
    /// The last complete days ending yesterday.
    pub recent: DateWindow,
    /// The same span in the comparison year.
    pub hist: DateWindow,
}

/// Returns the recent window: `days` complete days ending the day before
/// `today`.
///
/// # Errors
///
/// Returns [`WindowError`] if `days` is zero or the window falls outside
/// the supported calendar range.
pub fn recent_window(today: NaiveDate, days: u32) -> Result<DateWindow, WindowError> {
    if days == 0 {
        return Err(WindowError::ZeroDays);
    }
    let out_of_range = || WindowError::OutOfRange { today, days };

    let end = today.checked_sub_days(Days::new(1)).ok_or_else(out_of_range)?;
    let start = end
        .checked_sub_days(Days::new(u64::from(days - 1)))
        .ok_or_else(out_of_range)?;

    DateWindow::new(start, end).ok_or_else(out_of_range)
}

/// Shifts both endpoints of `recent` back by the anchor's year offset.
///
/// Fails instead of rolling over when an endpoint has no counterpart in the
/// target year, or when the shifted window covers a different number of
/// days.
///
/// # Errors
///
/// Returns [`WindowError`] if the shifted dates are invalid.
pub fn shift_window(recent: DateWindow, anchor: HistoricalAnchor) -> Result<DateWindow, WindowError> {
    let offset = anchor.offset_from(recent.start().year());
    let shift = |date: NaiveDate| {
        let year = date.year() - offset;
        date.with_year(year)
            .ok_or(WindowError::NonexistentDate { date, year })
    };

    let start = shift(recent.start())?;
    let end = shift(recent.end())?;

    let hist = DateWindow::new(start, end).ok_or(WindowError::NonexistentDate {
        date: recent.end(),
        year: end.year(),
    })?;

    if hist.len_days() != recent.len_days() {
        return Err(WindowError::LengthMismatch {
            recent,
            hist,
            recent_days: recent.len_days(),
            hist_days: hist.len_days(),
        });
    }

    Ok(hist)
}

/// Computes both windows for a run starting on `today`.
///
/// # Errors
///
/// Returns [`WindowError`] if either window cannot be computed.
pub fn compute_windows(
    today: NaiveDate,
    days: u32,
    anchor: HistoricalAnchor,
) -> Result<Windows, WindowError> {
    let recent = recent_window(today, days)?;
    let hist = shift_window(recent, anchor)?;
    log::debug!("Computed windows: recent={recent}, hist={hist}");
    Ok(Windows { recent, hist })
}
