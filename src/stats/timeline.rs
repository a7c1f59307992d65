use super::{CategoryCounts, shows_per_year};
use crate::models::LiveRecord;
use crate::setlist::count_in_record_ignore_case;

/// One year of the per-song play-count chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearRow {
    pub year: i32,
    /// Shows held that year.
    pub held: u32,
    /// Shows counted that year, split by tour family.
    pub played: CategoryCounts,
}

impl YearRow {
    /// Shows that year that did not feature the song.
    pub fn not_played(&self) -> u32 {
        self.held.saturating_sub(self.played.total())
    }
}

/// Per-year show counts broken down by tour family. With a song, only shows
/// that feature it (case-insensitive, medley setting respected) are counted.
pub fn song_timeline(records: &[LiveRecord], song: Option<&str>, include_medley: bool) -> Vec<YearRow> {
    let mut rows: Vec<YearRow> = shows_per_year(records)
        .into_iter()
        .map(|(year, held)| YearRow { year, held, played: CategoryCounts::default() })
        .collect();

    for record in records.iter().filter(|r| r.year != 0) {
        let counted = match song {
            Some(song) if !song.trim().is_empty() => {
                count_in_record_ignore_case(&record.setlist, song, include_medley) > 0
            }
            _ => true,
        };
        if !counted {
            continue;
        }
        if let Some(row) = rows.iter_mut().find(|r| r.year == record.year) {
            row.played.add(record.category());
        }
    }
    rows
}

/// Show counts by tour family, optionally only shows featuring `song`.
/// Matches the song the same way as [`song_timeline`].
pub fn category_summary(records: &[LiveRecord], song: Option<&str>, include_medley: bool) -> CategoryCounts {
    let mut counts = CategoryCounts::default();
    for record in records {
        if let Some(song) = song.filter(|s| !s.trim().is_empty()) {
            if count_in_record_ignore_case(&record.setlist, song, include_medley) == 0 {
                continue;
            }
        }
        counts.add(record.category());
    }
    counts
}

/// A venue or region picked from the place rankings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceSelection {
    /// A [`LiveRecord::venue_key`].
    Venue(String),
    Region(String),
}

impl PlaceSelection {
    pub fn matches(&self, record: &LiveRecord) -> bool {
        match self {
            Self::Venue(key) => record.venue_key() == *key,
            Self::Region(region) => record.region == *region,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Venue(name) | Self::Region(name) => name,
        }
    }
}

/// One year of the venue chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceYearRow {
    pub year: i32,
    pub total: u32,
    pub selected: u32,
}

/// Shows per year, and how many of them were at the selected place.
pub fn place_timeline(records: &[LiveRecord], selection: Option<&PlaceSelection>) -> Vec<PlaceYearRow> {
    shows_per_year(records)
        .into_iter()
        .map(|(year, total)| {
            let selected = selection
                .map(|sel| {
                    records
                        .iter()
                        .filter(|r| r.year == year && sel.matches(r))
                        .count() as u32
                })
                .unwrap_or(0);
            PlaceYearRow { year, total, selected }
        })
        .collect()
}
