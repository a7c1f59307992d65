//! Aggregate tables folded from normalized setlists.
//!
//! Everything here is a pure function of a record slice. Tables are always
//! rebuilt from scratch; filters such as the medley toggle or a search term
//! are applied when reading, not baked into the tables.

pub mod composition;
pub mod ranking;
pub mod timeline;
pub mod venues;

use std::collections::BTreeMap;

use crate::models::{LiveRecord, SongCatalog, TourCategory};
use crate::setlist;

/// Per-song play counts and last-played years, with and without medley
/// appearances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongStats {
    pub song_stats: BTreeMap<String, u32>,
    pub song_stats_no_medley: BTreeMap<String, u32>,
    /// 0 = never observed.
    pub song_last_years: BTreeMap<String, i32>,
    pub song_last_years_no_medley: BTreeMap<String, i32>,
}

/// One song's row of [`SongStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SongStat {
    pub total_count: u32,
    pub count_excluding_medley: u32,
    pub last_year_played: i32,
    pub last_year_played_excluding_medley: i32,
}

impl SongStats {
    pub fn stat(&self, song: &str) -> Option<SongStat> {
        let total_count = *self.song_stats.get(song)?;
        Some(SongStat {
            total_count,
            count_excluding_medley: self.song_stats_no_medley.get(song).copied().unwrap_or(0),
            last_year_played: self.song_last_years.get(song).copied().unwrap_or(0),
            last_year_played_excluding_medley: self
                .song_last_years_no_medley
                .get(song)
                .copied()
                .unwrap_or(0),
        })
    }

    /// Count and last-year tables for the active medley setting.
    pub fn tables(&self, include_medley: bool) -> (&BTreeMap<String, u32>, &BTreeMap<String, i32>) {
        if include_medley {
            (&self.song_stats, &self.song_last_years)
        } else {
            (&self.song_stats_no_medley, &self.song_last_years_no_medley)
        }
    }

    /// Number of distinct songs known to the tables.
    pub fn song_count(&self) -> usize {
        self.song_stats.len()
    }

    fn seed(&mut self, song: &str) {
        self.song_stats.entry(song.to_string()).or_insert(0);
        self.song_stats_no_medley.entry(song.to_string()).or_insert(0);
        self.song_last_years.entry(song.to_string()).or_insert(0);
        self.song_last_years_no_medley.entry(song.to_string()).or_insert(0);
    }
}

fn bump_year(table: &mut BTreeMap<String, i32>, song: &str, year: i32) {
    let entry = table.entry(song.to_string()).or_insert(0);
    if year > *entry {
        *entry = year;
    }
}

/// Fold every countable song event into play counts and last-played years.
pub fn compute_song_stats(records: &[LiveRecord]) -> SongStats {
    let mut stats = SongStats::default();
    fold_song_stats(&mut stats, records);
    stats
}

/// Like [`compute_song_stats`], but every catalog song (except bracketed
/// internal names) starts at zero so unplayed songs still rank.
pub fn compute_song_stats_with_catalog(records: &[LiveRecord], catalog: &SongCatalog) -> SongStats {
    let mut stats = SongStats::default();
    for name in catalog.keys() {
        if !name.contains('[') && !name.contains(']') {
            stats.seed(name);
        }
    }
    fold_song_stats(&mut stats, records);
    stats
}

fn fold_song_stats(stats: &mut SongStats, records: &[LiveRecord]) {
    for record in records {
        for event in setlist::countable_songs(&record.setlist) {
            let name = event.clean_name.as_str();
            *stats.song_stats.entry(name.to_string()).or_insert(0) += 1;
            bump_year(&mut stats.song_last_years, name, record.year);

            if !event.is_medley_member {
                *stats.song_stats_no_medley.entry(name.to_string()).or_insert(0) += 1;
                bump_year(&mut stats.song_last_years_no_medley, name, record.year);
            }
        }
    }
}

/// Opening, encore and closing song tallies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternStats {
    pub opening_songs: BTreeMap<String, u32>,
    pub encore_songs: BTreeMap<String, u32>,
    pub last_songs: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Opening,
    Encore,
    Last,
}

impl PatternKind {
    pub const ALL: [PatternKind; 3] = [Self::Opening, Self::Encore, Self::Last];

    pub fn label(self) -> &'static str {
        match self {
            Self::Opening => "Opening songs",
            Self::Encore => "Encore songs",
            Self::Last => "Closing songs",
        }
    }
}

impl PatternStats {
    pub fn table(&self, kind: PatternKind) -> &BTreeMap<String, u32> {
        match kind {
            PatternKind::Opening => &self.opening_songs,
            PatternKind::Encore => &self.encore_songs,
            PatternKind::Last => &self.last_songs,
        }
    }
}

/// Medley members never open, close or count as encores. Opening and closing
/// look at the whole medley-free set (encore songs included), so a one-song
/// set counts once in each table.
pub fn compute_pattern_stats(records: &[LiveRecord]) -> PatternStats {
    let mut stats = PatternStats::default();
    for record in records {
        let main: Vec<_> = setlist::countable_songs(&record.setlist)
            .filter(|e| !e.is_medley_member)
            .collect();

        if let (Some(first), Some(last)) = (main.first(), main.last()) {
            *stats.opening_songs.entry(first.clean_name.clone()).or_insert(0) += 1;
            *stats.last_songs.entry(last.clean_name.clone()).or_insert(0) += 1;
        }

        for event in main.iter().filter(|e| e.is_encore()) {
            *stats.encore_songs.entry(event.clean_name.clone()).or_insert(0) += 1;
        }
    }
    stats
}

/// Record counts split by tour family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub pop: u32,
    pub rock: u32,
    pub aloha: u32,
    pub other: u32,
}

impl CategoryCounts {
    pub fn add(&mut self, category: TourCategory) {
        *self.slot(category) += 1;
    }

    pub fn get(&self, category: TourCategory) -> u32 {
        match category {
            TourCategory::Pop => self.pop,
            TourCategory::Rock => self.rock,
            TourCategory::Aloha => self.aloha,
            TourCategory::Other => self.other,
        }
    }

    pub fn total(&self) -> u32 {
        self.pop + self.rock + self.aloha + self.other
    }

    fn slot(&mut self, category: TourCategory) -> &mut u32 {
        match category {
            TourCategory::Pop => &mut self.pop,
            TourCategory::Rock => &mut self.rock,
            TourCategory::Aloha => &mut self.aloha,
            TourCategory::Other => &mut self.other,
        }
    }
}

/// Shows per year (records without a year are skipped).
pub fn shows_per_year(records: &[LiveRecord]) -> BTreeMap<i32, u32> {
    let mut years = BTreeMap::new();
    for record in records.iter().filter(|r| r.year != 0) {
        *years.entry(record.year).or_insert(0) += 1;
    }
    years
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::LiveRecord;

    pub fn record(date: &str, year: i32, tour: &str, tokens: &[&str]) -> LiveRecord {
        LiveRecord {
            date: date.to_string(),
            tour_name: tour.to_string(),
            venue: "Hall".to_string(),
            region: "東京都".to_string(),
            year,
            song_count: tokens.len() as i32,
            setlist: tokens.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }
}
