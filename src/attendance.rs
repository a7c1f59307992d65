//! Personal attendance: which shows the user went to, and every statistic
//! restricted to those shows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::messaging::OutboundMessage;
use crate::models::{LiveRecord, TourCategory};
use crate::setlist::{self, count_in_record};
use crate::stats::CategoryCounts;
use crate::stats::ranking::{RankItem, RankedEntry, SongSort, rank_items};

/// Memo and link attached to one attended show.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceEntry {
    pub memo: String,
    pub link: String,
}

/// Attended shows keyed by record date.
pub type AttendanceMap = BTreeMap<String, AttendanceEntry>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub sync_id: Option<String>,
}

/// The user document the host pushes with `userDataUpdated`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserData {
    pub attended_lives: AttendanceMap,
    pub settings: Option<UserSettings>,
}

/// Where attendance lives. The host owns the real copy; this is the local
/// mirror that gets patched optimistically.
pub trait AttendanceStore {
    fn get(&self) -> &AttendanceMap;
    /// Insert or replace an entry, or remove it with `None`.
    fn set(&mut self, date: &str, entry: Option<AttendanceEntry>);
    fn is_registered(&self) -> bool;
}

/// Outbound side of the host channel.
pub trait HostShell {
    fn notify(&mut self, message: OutboundMessage);
}

impl AttendanceStore for UserData {
    fn get(&self) -> &AttendanceMap {
        &self.attended_lives
    }

    fn set(&mut self, date: &str, entry: Option<AttendanceEntry>) {
        match entry {
            Some(entry) => {
                self.attended_lives.insert(date.to_string(), entry);
            }
            None => {
                self.attended_lives.remove(date);
            }
        }
    }

    fn is_registered(&self) -> bool {
        self.settings
            .as_ref()
            .and_then(|s| s.sync_id.as_deref())
            .is_some_and(|id| !id.is_empty())
    }
}

/// Mark a show attended or not. Unregistered users are sent to account
/// setup and nothing changes. Returns whether the change was applied.
pub fn toggle_attendance(
    store: &mut impl AttendanceStore,
    host: &mut impl HostShell,
    date: &str,
    attended: bool,
) -> bool {
    if !store.is_registered() {
        log::info!("attendance change for {date} refused: not registered");
        host.notify(OutboundMessage::OpenAccountSetup);
        return false;
    }

    let current = store.get().get(date).cloned().unwrap_or_default();
    host.notify(OutboundMessage::UpdateUserLiveRecord {
        id: date.to_string(),
        attended,
        memo: current.memo.clone(),
        link: current.link.clone(),
    });
    store.set(date, attended.then_some(current));
    true
}

/// Save a memo for a show, marking it attended. Saving a memo clears the link.
/// Like [`toggle_attendance`], unregistered users are refused and sent to
/// account setup instead, since the memo is written to their account record.
pub fn save_memo(
    store: &mut impl AttendanceStore,
    host: &mut impl HostShell,
    date: &str,
    memo: &str,
) -> bool {
    if !store.is_registered() {
        host.notify(OutboundMessage::OpenAccountSetup);
        return false;
    }

    store.set(
        date,
        Some(AttendanceEntry { memo: memo.to_string(), link: String::new() }),
    );
    host.notify(OutboundMessage::UpdateUserLiveRecord {
        id: date.to_string(),
        attended: true,
        memo: memo.to_string(),
        link: String::new(),
    });
    true
}

/// Records whose date is in the attendance map, in input order.
pub fn attended_records<'a>(records: &'a [LiveRecord], attendance: &AttendanceMap) -> Vec<&'a LiveRecord> {
    records.iter().filter(|r| attendance.contains_key(&r.date)).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersonalSongStat {
    pub count: u32,
    pub count_no_medley: u32,
    pub last_year: i32,
}

/// Per-category, per-year record counts.
pub type CategoryBreakdown = BTreeMap<TourCategory, BTreeMap<i32, u32>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserStats {
    pub attended: u32,
    /// Attended shows per year.
    pub yearly: BTreeMap<i32, u32>,
    pub categories: CategoryCounts,
    pub breakdown: CategoryBreakdown,
    pub songs: BTreeMap<String, PersonalSongStat>,
}

pub fn user_stats(records: &[LiveRecord], attendance: &AttendanceMap) -> UserStats {
    let mut stats = UserStats::default();

    for record in attended_records(records, attendance) {
        stats.attended += 1;
        let category = record.category();
        stats.categories.add(category);
        if record.year != 0 {
            *stats.yearly.entry(record.year).or_insert(0) += 1;
            *stats
                .breakdown
                .entry(category)
                .or_default()
                .entry(record.year)
                .or_insert(0) += 1;
        }

        for event in setlist::countable_songs(&record.setlist) {
            let entry = stats.songs.entry(event.clean_name).or_default();
            entry.count += 1;
            if !event.is_medley_member {
                entry.count_no_medley += 1;
            }
            entry.last_year = entry.last_year.max(record.year);
        }
    }
    stats
}

/// The personal song ranking: substring search, songs never heard under the
/// current medley setting dropped.
pub fn personal_ranking(stats: &UserStats, include_medley: bool, search: &str, sort: SongSort) -> Vec<RankedEntry> {
    let term = search.to_lowercase();
    let items = stats
        .songs
        .iter()
        .filter(|(name, _)| name.to_lowercase().contains(&term))
        .map(|(name, stat)| RankItem {
            name: name.clone(),
            count: if include_medley { stat.count } else { stat.count_no_medley },
            last_year: stat.last_year,
        })
        .filter(|item| item.count > 0)
        .collect();
    rank_items(items, sort)
}

/// How often the user heard one song.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongFocus {
    pub song: String,
    /// Every performance heard, a song played twice in one show counts twice.
    pub total_occurrences: u32,
    /// Attended shows featuring the song.
    pub record_count: u32,
    pub categories: CategoryCounts,
    pub yearly: BTreeMap<i32, u32>,
    pub breakdown: CategoryBreakdown,
}

pub fn song_focus(
    records: &[LiveRecord],
    attendance: &AttendanceMap,
    song: &str,
    include_medley: bool,
) -> SongFocus {
    let mut focus = SongFocus { song: song.to_string(), ..Default::default() };

    for record in attended_records(records, attendance) {
        let hits = count_in_record(&record.setlist, song, include_medley) as u32;
        if hits == 0 {
            continue;
        }
        focus.total_occurrences += hits;
        focus.record_count += 1;
        let category = record.category();
        focus.categories.add(category);
        if record.year != 0 {
            *focus.yearly.entry(record.year).or_insert(0) += 1;
            *focus
                .breakdown
                .entry(category)
                .or_default()
                .entry(record.year)
                .or_insert(0) += 1;
        }
    }
    focus
}
