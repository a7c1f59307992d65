//! "On this day": shows and releases whose month and day match today.

use chrono::{Datelike, FixedOffset, NaiveDate, Offset, Utc};

use crate::cache::Cache;
use crate::models::{ListEntry, LiveRecord, parse_calendar_date};

/// Cache key holding the day the greeting last fired.
pub const LAST_GREETING_KEY: &str = "lldb_last_greeting_date";

/// Offset for a whole number of hours east of UTC. Falls back to UTC when the
/// value is out of range.
pub fn offset_from_hours(hours: i32) -> FixedOffset {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| {
            log::warn!("utc offset {hours}h out of range, using UTC");
            Utc.fix()
        })
}

/// Current civil date in `offset`.
pub fn today_in(offset: FixedOffset) -> NaiveDate {
    Utc::now().with_timezone(&offset).date_naive()
}

/// Gate key for a day: `YYYY-M-D` without zero padding.
pub fn greeting_key(day: NaiveDate) -> String {
    format!("{}-{}-{}", day.year(), day.month(), day.day())
}

/// Month and day equality; the year is ignored.
pub fn same_month_day(a: NaiveDate, b: NaiveDate) -> bool {
    a.month() == b.month() && a.day() == b.day()
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnniversaryHit {
    Live(LiveRecord),
    Release(ListEntry),
}

impl AnniversaryHit {
    pub fn date(&self, offset: FixedOffset) -> Option<NaiveDate> {
        match self {
            Self::Live(record) => record.calendar_date(offset),
            Self::Release(item) => item
                .release_date
                .as_deref()
                .and_then(|d| parse_calendar_date(d, offset)),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Live(record) => &record.tour_name,
            Self::Release(item) => &item.title,
        }
    }

    /// Whole years between the event and `today` (calendar year difference).
    pub fn years_since(&self, today: NaiveDate, offset: FixedOffset) -> Option<i32> {
        self.date(offset).map(|d| today.year() - d.year())
    }
}

/// Every live record and release item falling on today's month and day,
/// records first. Unparseable dates never match.
pub fn find_anniversaries(
    records: &[LiveRecord],
    releases: &[ListEntry],
    today: NaiveDate,
    offset: FixedOffset,
) -> Vec<AnniversaryHit> {
    let lives = records
        .iter()
        .filter(|r| r.calendar_date(offset).is_some_and(|d| same_month_day(d, today)))
        .cloned()
        .map(AnniversaryHit::Live);

    let cds = releases
        .iter()
        .filter(|item| {
            item.release_date
                .as_deref()
                .and_then(|d| parse_calendar_date(d, offset))
                .is_some_and(|d| same_month_day(d, today))
        })
        .cloned()
        .map(AnniversaryHit::Release);

    lives.chain(cds).collect()
}

/// Persistence for the once-a-day gate.
pub trait GreetingLog {
    fn last_greeting(&self) -> Option<String>;
    fn record_greeting(&mut self, key: &str);
}

impl GreetingLog for Cache {
    fn last_greeting(&self) -> Option<String> {
        match self.get(LAST_GREETING_KEY) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("could not read greeting gate: {e}");
                None
            }
        }
    }

    fn record_greeting(&mut self, key: &str) {
        if let Err(e) = self.set(LAST_GREETING_KEY, key) {
            log::warn!("could not store greeting gate: {e}");
        }
    }
}

/// Hits waiting to be shown. Nothing is shown while another modal is up.
#[derive(Debug, Default)]
pub struct AnniversaryQueue {
    pending: Vec<AnniversaryHit>,
}

impl AnniversaryQueue {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every pending hit if nothing else is on screen.
    pub fn next_batch(&mut self, modal_visible: bool) -> Option<Vec<AnniversaryHit>> {
        if self.pending.is_empty() || modal_visible {
            return None;
        }
        Some(std::mem::take(&mut self.pending))
    }

    /// Called after a modal closes; shows whatever queued up meanwhile.
    pub fn modal_closed(&mut self) -> Option<Vec<AnniversaryHit>> {
        self.next_batch(false)
    }
}

/// Run the daily check. Fills the queue and closes the gate for the day when
/// something matched. Returns the number of hits, 0 when already greeted.
pub fn check_today(
    records: &[LiveRecord],
    releases: &[ListEntry],
    today: NaiveDate,
    offset: FixedOffset,
    gate: &mut impl GreetingLog,
    queue: &mut AnniversaryQueue,
) -> usize {
    let key = greeting_key(today);
    let last = gate.last_greeting();
    log::debug!("checking events for {key} (last greeted: {last:?})");
    if last.as_deref() == Some(key.as_str()) {
        return 0;
    }

    let hits = find_anniversaries(records, releases, today, offset);
    log::info!("{} anniversaries on {key}", hits.len());
    if hits.is_empty() {
        return 0;
    }
    let count = hits.len();
    queue.pending = hits;
    gate.record_greeting(&key);
    count
}

/// Age on a given day as years, months and days, plus the raw day count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Age {
    pub years: i32,
    pub months: i32,
    pub days: i32,
    pub total_days: i64,
}

pub fn age_on(birth: NaiveDate, day: NaiveDate) -> Age {
    let mut years = day.year() - birth.year();
    let mut months = day.month() as i32 - birth.month() as i32;
    let mut days = day.day() as i32 - birth.day() as i32;

    if days < 0 {
        months -= 1;
        days += days_in_previous_month(day);
    }
    if months < 0 {
        years -= 1;
        months += 12;
    }

    Age {
        years,
        months,
        days,
        total_days: (day - birth).num_days().abs(),
    }
}

fn days_in_previous_month(day: NaiveDate) -> i32 {
    day.with_day(1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day() as i32)
        .unwrap_or(30)
}
