use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use super::ranking::{NameMatch, RankedEntry, SongSort, items_from_tables, rank_items};
use crate::models::{LiveRecord, ONLINE_REGION};

/// Japanese prefectures in the conventional north-to-south order.
pub const PREFECTURES: [&str; 47] = [
    "北海道", "青森県", "岩手県", "宮城県", "秋田県", "山形県", "福島県",
    "茨城県", "栃木県", "群馬県", "埼玉県", "千葉県", "東京都", "神奈川県",
    "新潟県", "富山県", "石川県", "福井県", "山梨県", "長野県", "岐阜県",
    "静岡県", "愛知県", "三重県", "滋賀県", "京都府", "大阪府", "兵庫県",
    "奈良県", "和歌山県", "鳥取県", "島根県", "岡山県", "広島県", "山口県",
    "徳島県", "香川県", "愛媛県", "高知県", "福岡県", "佐賀県", "長崎県",
    "熊本県", "大分県", "宮崎県", "鹿児島県", "沖縄県",
];

/// Sort position of a region: prefectures in order, then online, then
/// anything unknown.
pub fn region_position(region: &str) -> usize {
    if let Some(i) = PREFECTURES.iter().position(|p| *p == region) {
        i
    } else if region == ONLINE_REGION {
        PREFECTURES.len()
    } else {
        999
    }
}

pub fn compare_regions(a: &str, b: &str) -> Ordering {
    region_position(a).cmp(&region_position(b))
}

/// Show counts and last show year per place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceTables {
    pub counts: BTreeMap<String, u32>,
    pub last_years: BTreeMap<String, i32>,
}

impl PlaceTables {
    fn add(&mut self, key: String, year: i32) {
        let last = self.last_years.entry(key.clone()).or_insert(0);
        if year > *last {
            *last = year;
        }
        *self.counts.entry(key).or_insert(0) += 1;
    }

    /// Ranked by show count, case-insensitive substring search.
    pub fn ranking(&self, search: &str) -> Vec<RankedEntry> {
        let items = items_from_tables(&self.counts, &self.last_years, search, NameMatch::Substring);
        rank_items(items, SongSort::default())
    }
}

/// Venue tables keyed by [`LiveRecord::venue_key`].
pub fn venue_tables(records: &[LiveRecord]) -> PlaceTables {
    let mut tables = PlaceTables::default();
    for record in records {
        tables.add(record.venue_key(), record.year);
    }
    tables
}

/// Region tables; records without a region are skipped.
pub fn region_tables(records: &[LiveRecord]) -> PlaceTables {
    let mut tables = PlaceTables::default();
    for record in records.iter().filter(|r| !r.region.is_empty()) {
        tables.add(record.region.clone(), record.year);
    }
    tables
}

/// Prefectures with no show at all, in prefecture order.
pub fn unvisited_prefectures(regions: &PlaceTables) -> Vec<&'static str> {
    let held: HashSet<&str> = regions.counts.keys().map(String::as_str).collect();
    PREFECTURES.iter().copied().filter(|p| !held.contains(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::test_support::record;

    fn at(venue: &str, region: &str, year: i32) -> LiveRecord {
        let mut r = record("d", year, "t", &[]);
        r.venue = venue.into();
        r.region = region.into();
        r
    }

    #[test]
    fn test_venue_ranking() {
        let records = vec![
            at("武道館", "東京都", 2000),
            at("武道館", "東京都", 2010),
            at("城ホール", "大阪府", 2005),
            at("配信", ONLINE_REGION, 2020),
            at("別配信", ONLINE_REGION, 2021),
        ];
        let ranking = venue_tables(&records).ranking("");
        assert_eq!(ranking[0].count, 2);
        assert_eq!(ranking[0].rank, 1);
        assert_eq!(ranking[1].rank, 1);
        // online shows share one key and the later year wins the tie
        assert_eq!(ranking[0].name, ONLINE_REGION);
        assert_eq!(ranking[2].name, "城ホール (大阪府)");
        assert_eq!(ranking[2].rank, 3);
    }

    #[test]
    fn test_region_search_and_unvisited() {
        let records = vec![at("a", "東京都", 2000), at("b", "", 2000), at("c", "大阪府", 2001)];
        let regions = region_tables(&records);
        assert_eq!(regions.counts.len(), 2);
        assert_eq!(regions.ranking("大阪").len(), 1);
        let unvisited = unvisited_prefectures(&regions);
        assert_eq!(unvisited.len(), 45);
        assert_eq!(unvisited[0], "北海道");
        assert!(!unvisited.contains(&"東京都"));
    }

    #[test]
    fn test_region_order() {
        let mut regions = vec!["海外", ONLINE_REGION, "沖縄県", "北海道"];
        regions.sort_by(|a, b| compare_regions(a, b));
        assert_eq!(regions, vec!["北海道", "沖縄県", ONLINE_REGION, "海外"]);
    }
}
