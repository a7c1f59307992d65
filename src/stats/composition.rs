use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::models::{SongCatalog, SongType};
use crate::setlist;

/// What one setlist is made of: catalog song types, and for the three main
/// types the songs grouped by release year.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    pub type_counts: BTreeMap<SongType, u32>,
    pub cells: BTreeMap<(SongType, i32), Vec<String>>,
}

impl Composition {
    pub fn count(&self, song_type: SongType) -> u32 {
        self.type_counts.get(&song_type).copied().unwrap_or(0)
    }

    pub fn cell(&self, song_type: SongType, year: i32) -> &[String] {
        self.cells
            .get(&(song_type, year))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First through last release year with a filled cell.
    pub fn year_span(&self) -> Option<RangeInclusive<i32>> {
        let first = self.cells.keys().map(|(_, year)| *year).min()?;
        let last = self.cells.keys().map(|(_, year)| *year).max()?;
        Some(first..=last)
    }

    /// Songs of one cell grouped by the single (coupling songs) or album
    /// (album songs) they were released on. Ungrouped songs come under `None`.
    pub fn grouped_by_release(
        &self,
        song_type: SongType,
        year: i32,
        catalog: &SongCatalog,
    ) -> Vec<(Option<String>, Vec<String>)> {
        let mut groups: Vec<(Option<String>, Vec<String>)> = Vec::new();
        for song in self.cell(song_type, year) {
            let source = catalog.get(song).and_then(|info| match song_type {
                SongType::Coupling => info.single_title.clone(),
                SongType::Album => info.album_title.clone(),
                _ => None,
            });
            match groups.iter_mut().find(|(s, _)| *s == source) {
                Some((_, songs)) => songs.push(song.clone()),
                None => groups.push((source, vec![song.clone()])),
            }
        }
        groups
    }
}

/// Classify every song of a setlist (medley members included) against the
/// catalog. Songs missing from the catalog are ignored.
pub fn setlist_composition(setlist: &[String], catalog: &SongCatalog) -> Composition {
    let mut composition = Composition::default();
    for event in setlist::songs(setlist) {
        let Some(info) = catalog.get(&event.clean_name) else {
            continue;
        };
        let song_type = info.song_type();
        *composition.type_counts.entry(song_type).or_insert(0) += 1;

        if song_type != SongType::Other && info.year != 0 {
            composition
                .cells
                .entry((song_type, info.year))
                .or_default()
                .push(event.clean_name);
        }
    }
    composition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SongInfo;

    fn info(year: i32, kind: &str, single: Option<&str>) -> SongInfo {
        SongInfo {
            year,
            kind: Some(kind.into()),
            single_title: single.map(String::from),
            ..Default::default()
        }
    }

    fn catalog() -> SongCatalog {
        let mut c = SongCatalog::new();
        c.insert("A".into(), info(1999, "表題曲", None));
        c.insert("B".into(), info(1999, "カップリング", Some("A")));
        c.insert("C".into(), info(1999, "カップリング", Some("Z")));
        c.insert("D".into(), info(0, "アルバム", None));
        c.insert("E".into(), info(2001, "配信限定", None));
        c
    }

    #[test]
    fn test_composition() {
        let list: Vec<String> = ["A", "__MEDLEY_START__", "B", "__MEDLEY_END__", "C_アンコール", "D", "E", "unknown"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let comp = setlist_composition(&list, &catalog());
        assert_eq!(comp.count(SongType::Title), 1);
        assert_eq!(comp.count(SongType::Coupling), 2);
        assert_eq!(comp.count(SongType::Album), 1);
        assert_eq!(comp.count(SongType::Other), 1);
        assert_eq!(comp.cell(SongType::Coupling, 1999), ["B", "C"]);
        // no release year, no cell
        assert!(comp.cells.keys().all(|(t, _)| *t != SongType::Album));

        let groups = comp.grouped_by_release(SongType::Coupling, 1999, &catalog());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], (Some("A".to_string()), vec!["B".to_string()]));
    }

    #[test]
    fn test_grid_by_album() {
        let mut c = catalog();
        for (name, album) in [("F", Some("Kanojo")), ("G", Some("Kanojo")), ("H", None)] {
            c.insert(
                name.into(),
                SongInfo {
                    year: 2003,
                    kind: Some("アルバム".into()),
                    album_title: album.map(String::from),
                    ..Default::default()
                },
            );
        }
        let list: Vec<String> = ["A", "F", "H", "G"].iter().map(|s| s.to_string()).collect();
        let comp = setlist_composition(&list, &c);
        assert_eq!(comp.year_span(), Some(1999..=2003));
        assert!(comp.cell(SongType::Album, 2001).is_empty());

        let groups = comp.grouped_by_release(SongType::Album, 2003, &c);
        assert_eq!(
            groups,
            vec![
                (Some("Kanojo".to_string()), vec!["F".to_string(), "G".to_string()]),
                (None, vec!["H".to_string()]),
            ]
        );
        assert_eq!(setlist_composition(&[], &c).year_span(), None);
    }
}
