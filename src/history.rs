//! Month-by-month career timeline.

use std::collections::BTreeMap;

use chrono::{Datelike, FixedOffset, NaiveDate};

use crate::models::{HistoryEntry, parse_calendar_date};
use crate::search::format_tour_name;

/// One month of the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthRow {
    pub year: i32,
    pub month: u32,
    /// Age during that month; `None` before birth.
    pub age: Option<i32>,
    /// Formatted tour names, first appearance order, no duplicates.
    pub lives: Vec<String>,
    pub singles: Vec<String>,
    pub albums: Vec<String>,
}

impl MonthRow {
    pub fn is_empty(&self) -> bool {
        self.lives.is_empty() && self.singles.is_empty() && self.albums.is_empty()
    }
}

#[derive(Debug, Default)]
struct MonthEvents {
    lives: Vec<String>,
    singles: Vec<String>,
    albums: Vec<String>,
}

impl MonthEvents {
    fn add_live(&mut self, title: &str) {
        let name = format_tour_name(title);
        if !self.lives.contains(&name) {
            self.lives.push(name);
        }
    }
}

/// Age in whole years during a month. The birthday month already counts.
fn age_in_month(birth: NaiveDate, year: i32, month: u32) -> Option<i32> {
    let mut age = year - birth.year();
    if month < birth.month() {
        age -= 1;
    }
    (age >= 0).then_some(age)
}

fn collect_events(entries: &[HistoryEntry], offset: FixedOffset) -> BTreeMap<(i32, u32), MonthEvents> {
    let mut events: BTreeMap<(i32, u32), MonthEvents> = BTreeMap::new();
    for entry in entries {
        let Some(date) = entry.date.as_deref().and_then(|d| parse_calendar_date(d, offset)) else {
            continue;
        };
        let slot = events.entry((date.year(), date.month())).or_default();

        match (entry.kind.as_deref(), entry.title.as_deref()) {
            (Some(kind), title) => {
                let Some(title) = title.filter(|t| !t.is_empty()) else {
                    continue;
                };
                match kind {
                    "live" => slot.add_live(title),
                    "single" => slot.singles.push(title.to_string()),
                    "album" => slot.albums.push(title.to_string()),
                    other => log::debug!("history row of unknown type {other:?}"),
                }
            }
            (None, _) => {
                if let Some(live) = entry.live.as_deref() {
                    slot.add_live(live);
                }
                if let Some(single) = &entry.single {
                    slot.singles.push(single.clone());
                }
                if let Some(album) = &entry.album {
                    slot.albums.push(album.clone());
                }
            }
        }
    }
    events
}

/// Rows for every month from `start` through `until`, inclusive.
pub fn timeline(
    entries: &[HistoryEntry],
    start: NaiveDate,
    until: NaiveDate,
    birth: NaiveDate,
    offset: FixedOffset,
) -> Vec<MonthRow> {
    let mut events = collect_events(entries, offset);
    let mut rows = Vec::new();
    let (mut year, mut month) = (start.year(), start.month());

    while (year, month) <= (until.year(), until.month()) {
        let found = events.remove(&(year, month)).unwrap_or_default();
        rows.push(MonthRow {
            year,
            month,
            age: age_in_month(birth, year, month),
            lives: found.lives,
            singles: found.singles,
            albums: found.albums,
        });
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn typed(date: &str, kind: &str, title: &str) -> HistoryEntry {
        HistoryEntry {
            date: Some(date.into()),
            kind: Some(kind.into()),
            title: Some(title.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_month_rows_and_ages() {
        let rows = timeline(&[], day(1996, 8, 1), day(1997, 2, 10), day(1975, 11, 22), jst());
        assert_eq!(rows.len(), 7);
        assert_eq!((rows[0].year, rows[0].month), (1996, 8));
        assert_eq!(rows[0].age, Some(20));
        // November is the birthday month
        assert_eq!(rows[3].age, Some(21));
        assert_eq!((rows[6].year, rows[6].month), (1997, 2));
        assert!(rows.iter().all(MonthRow::is_empty));
    }

    #[test]
    fn test_events_both_row_forms() {
        let entries = vec![
            typed("1998/07/17", "single", "Hanabi"),
            typed("1998/07/20", "live", "Love Like Pop vol.1〜first〜"),
            typed("1998/07/25", "live", "Love Like Pop vol.1"),
            HistoryEntry {
                date: Some("1998/07/30".into()),
                album: Some("Kanojo".into()),
                live: Some("Summer Fes".into()),
                ..Default::default()
            },
            HistoryEntry { date: None, single: Some("lost".into()), ..Default::default() },
        ];
        let rows = timeline(&entries, day(1998, 6, 1), day(1998, 8, 1), day(1975, 11, 22), jst());
        let july = &rows[1];
        assert_eq!(july.lives, vec!["Pop1", "Summer Fes"]);
        assert_eq!(july.singles, vec!["Hanabi"]);
        assert_eq!(july.albums, vec!["Kanojo"]);
        assert!(rows[0].is_empty());
        assert!(rows[2].is_empty());
    }

    #[test]
    fn test_age_before_birth() {
        assert_eq!(age_in_month(day(1975, 11, 22), 1975, 10), None);
        assert_eq!(age_in_month(day(1975, 11, 22), 1975, 11), Some(0));
    }
}
