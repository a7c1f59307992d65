use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::{PatternKind, PatternStats, SongStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Count,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

/// Active ordering of a ranked list. Defaults to count, descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SongSort {
    pub key: SortKey,
    pub order: SortOrder,
}

impl SongSort {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// Header-click behaviour: the active key flips direction, another key
    /// starts descending.
    pub fn toggle(self, key: SortKey) -> Self {
        if self.key == key {
            let order = match self.order {
                SortOrder::Desc => SortOrder::Asc,
                SortOrder::Asc => SortOrder::Desc,
            };
            Self { key, order }
        } else {
            Self { key, order: SortOrder::Desc }
        }
    }

    /// Count ties break on last year in the same direction. Year ties break
    /// on count descending. Ascending by year puts "never played" (0) last.
    pub fn compare(&self, a: &RankItem, b: &RankItem) -> Ordering {
        match (self.key, self.order) {
            (SortKey::Count, SortOrder::Desc) => {
                b.count.cmp(&a.count).then(b.last_year.cmp(&a.last_year))
            }
            (SortKey::Count, SortOrder::Asc) => {
                a.count.cmp(&b.count).then(a.last_year.cmp(&b.last_year))
            }
            (SortKey::Year, SortOrder::Desc) => {
                b.last_year.cmp(&a.last_year).then(b.count.cmp(&a.count))
            }
            (SortKey::Year, SortOrder::Asc) => match (a.last_year == 0, b.last_year == 0) {
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => a.last_year.cmp(&b.last_year).then(b.count.cmp(&a.count)),
            },
        }
    }
}

/// An unranked row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankItem {
    pub name: String,
    pub count: u32,
    pub last_year: i32,
}

/// A row with its displayed rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub rank: usize,
    pub name: String,
    pub count: u32,
    pub last_year: i32,
}

/// How a search term matches names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    Prefix,
    Substring,
}

impl NameMatch {
    pub fn matches(self, name: &str, term: &str) -> bool {
        if term.is_empty() {
            return true;
        }
        let name = name.to_lowercase();
        let term = term.to_lowercase();
        match self {
            Self::Prefix => name.starts_with(&term),
            Self::Substring => name.contains(&term),
        }
    }
}

/// Ranks for a count sequence in display order. Equal neighbouring counts
/// share a rank, and the next distinct count resumes at
/// `previous rank + size of the tied group`: `[5, 5, 3] -> [1, 1, 3]`.
pub fn competition_ranks<I>(counts: I) -> Vec<usize>
where
    I: IntoIterator<Item = u32>,
{
    let mut ranks = Vec::new();
    let mut current = 0;
    let mut skip = 1;
    let mut last: Option<u32> = None;

    for count in counts {
        match last {
            Some(prev) if prev == count => skip += 1,
            Some(_) => {
                current += skip;
                skip = 1;
                last = Some(count);
            }
            None => {
                current = 1;
                last = Some(count);
            }
        }
        ranks.push(current);
    }
    ranks
}

/// Sort the items and attach displayed ranks.
pub fn rank_items(mut items: Vec<RankItem>, sort: SongSort) -> Vec<RankedEntry> {
    items.sort_by(|a, b| sort.compare(a, b));
    let ranks = competition_ranks(items.iter().map(|i| i.count));
    items
        .into_iter()
        .zip(ranks)
        .map(|(item, rank)| RankedEntry {
            rank,
            name: item.name,
            count: item.count,
            last_year: item.last_year,
        })
        .collect()
}

/// Build rank items from a count table and a last-year table.
pub fn items_from_tables(
    counts: &BTreeMap<String, u32>,
    last_years: &BTreeMap<String, i32>,
    search: &str,
    name_match: NameMatch,
) -> Vec<RankItem> {
    counts
        .iter()
        .filter(|(name, _)| name_match.matches(name, search))
        .map(|(name, &count)| RankItem {
            name: name.clone(),
            count,
            last_year: last_years.get(name).copied().unwrap_or(0),
        })
        .collect()
}

/// The global song ranking. Search is a case-insensitive name prefix.
pub fn song_ranking(
    stats: &SongStats,
    include_medley: bool,
    search: &str,
    sort: SongSort,
) -> Vec<RankedEntry> {
    let (counts, years) = stats.tables(include_medley);
    rank_items(items_from_tables(counts, years, search, NameMatch::Prefix), sort)
}

/// Top `limit` songs of one pattern table, ties broken by last year played.
pub fn pattern_ranking(
    patterns: &PatternStats,
    kind: PatternKind,
    last_years: &BTreeMap<String, i32>,
    limit: usize,
) -> Vec<RankedEntry> {
    let items = items_from_tables(patterns.table(kind), last_years, "", NameMatch::Substring);
    let mut ranked = rank_items(items, SongSort::default());
    ranked.truncate(limit);
    ranked
}
