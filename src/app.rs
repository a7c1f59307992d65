//! Application state: the current data snapshot, the user's attendance and
//! the active show filter.

use chrono::FixedOffset;

use crate::attendance::UserData;
use crate::loader::LoadError;
use crate::messaging::InboundMessage;
use crate::models::{LiveRecord, Payload};
use crate::search::{FilterOptions, LiveFilter, apply_filters, filter_options};
use crate::stats::venues::{PlaceTables, region_tables, venue_tables};
use crate::stats::{PatternStats, SongStats, compute_pattern_stats, compute_song_stats_with_catalog};

/// A payload together with every table derived from it. Built in one go and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub payload: Payload,
    pub song_stats: SongStats,
    pub patterns: PatternStats,
    pub venues: PlaceTables,
    pub regions: PlaceTables,
    pub filter_options: FilterOptions,
}

impl Snapshot {
    pub fn build(payload: Payload) -> Self {
        let records = &payload.live_records;
        let snapshot = Self {
            song_stats: compute_song_stats_with_catalog(records, &payload.song_data),
            patterns: compute_pattern_stats(records),
            venues: venue_tables(records),
            regions: region_tables(records),
            filter_options: filter_options(records),
            payload,
        };
        log::info!(
            "built snapshot: {} shows, {} songs",
            snapshot.payload.live_records.len(),
            snapshot.song_stats.song_count()
        );
        snapshot
    }

    pub fn records(&self) -> &[LiveRecord] {
        &self.payload.live_records
    }
}

/// What handling an inbound message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    UserDataReplaced,
    /// The tour search was applied; number of matching shows.
    SearchApplied(usize),
    /// A refetch was attempted; whether the new data was installed.
    Refreshed(bool),
}

#[derive(Debug)]
pub struct AppState {
    snapshot: Option<Snapshot>,
    error: Option<String>,
    pub user: UserData,
    pub filter: LiveFilter,
    pub offset: FixedOffset,
}

impl AppState {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            snapshot: None,
            error: None,
            user: UserData::default(),
            filter: LiveFilter { include_medley: true, ..Default::default() },
            offset,
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Set when loading failed and there is nothing to show.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn records(&self) -> &[LiveRecord] {
        self.snapshot.as_ref().map(Snapshot::records).unwrap_or(&[])
    }

    /// Derive every table from `payload` and swap them in.
    pub fn install(&mut self, payload: Payload) {
        self.snapshot = Some(Snapshot::build(payload));
        self.error = None;
    }

    /// Initial load result: populated or an explicit error.
    pub fn load(&mut self, result: Result<Payload, LoadError>) {
        match result {
            Ok(payload) => self.install(payload),
            Err(e) => {
                log::error!("loading data failed: {e}");
                self.error = Some(e.to_string());
            }
        }
    }

    /// Replace the data with a refetched payload. On failure the current
    /// snapshot stays. Returns whether new data was installed.
    pub fn hot_swap(&mut self, result: Result<Payload, LoadError>) -> bool {
        match result {
            Ok(payload) => {
                self.install(payload);
                log::info!("data hot-swapped to latest");
                true
            }
            Err(e) => {
                log::error!("hot swap failed: {e}");
                false
            }
        }
    }

    /// Shows passing the current filter, newest first.
    pub fn visible_records(&self) -> Vec<&LiveRecord> {
        apply_filters(self.records(), &self.filter, &self.user.attended_lives, self.offset)
    }

    /// Apply a host message. `refetch` is only called for
    /// [`InboundMessage::ForceUpdateData`].
    pub fn handle<F>(&mut self, message: InboundMessage, refetch: F) -> MessageOutcome
    where
        F: FnOnce() -> Result<Payload, LoadError>,
    {
        match message {
            InboundMessage::UserDataUpdated { data } => {
                log::debug!("user data updated: {} attended shows", data.attended_lives.len());
                self.user = data;
                MessageOutcome::UserDataReplaced
            }
            InboundMessage::ExecLiveSearch { tour_name } => {
                self.filter = LiveFilter {
                    include_medley: self.filter.include_medley,
                    attended_only: self.filter.attended_only,
                    ..LiveFilter::for_tour(&tour_name)
                };
                MessageOutcome::SearchApplied(self.visible_records().len())
            }
            InboundMessage::ForceUpdateData { new_version } => {
                log::info!("update requested, new version {}", new_version.as_deref().unwrap_or("?"));
                MessageOutcome::Refreshed(self.hot_swap(refetch()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{AttendanceEntry, AttendanceMap};
    use crate::stats::test_support::record;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn payload(records: Vec<LiveRecord>) -> Payload {
        Payload { live_records: records, ..Default::default() }
    }

    fn sample() -> Payload {
        payload(vec![
            record("2019/05/01", 2019, "Love Like Pop vol.21", &["A", "B"]),
            record("2022/01/01", 2022, "Love Like Rock vol.9", &["B", "C_アンコール"]),
        ])
    }

    #[test]
    fn test_load_failure_is_explicit() {
        let mut app = AppState::new(jst());
        app.load(Err(LoadError::Status(500)));
        assert!(app.snapshot().is_none());
        assert!(app.error().unwrap().contains("500"));
        app.load(Ok(sample()));
        assert!(app.error().is_none());
        assert_eq!(app.records().len(), 2);
    }

    #[test]
    fn test_hot_swap_failure_keeps_snapshot() {
        let mut app = AppState::new(jst());
        app.install(sample());
        assert!(!app.hot_swap(Err(LoadError::Remote("down".into()))));
        assert_eq!(app.snapshot().unwrap().song_stats.song_stats["B"], 2);

        assert!(app.hot_swap(Ok(payload(vec![record("2023/01/01", 2023, "t", &["Z"])]))));
        let snapshot = app.snapshot().unwrap();
        assert!(!snapshot.song_stats.song_stats.contains_key("B"));
        assert_eq!(snapshot.patterns.opening_songs["Z"], 1);
    }

    #[test]
    fn test_handle_messages() {
        let mut app = AppState::new(jst());
        app.install(sample());

        let mut attended = AttendanceMap::new();
        attended.insert("2022/01/01".into(), AttendanceEntry::default());
        let outcome = app.handle(
            InboundMessage::UserDataUpdated { data: UserData { attended_lives: attended, settings: None } },
            || panic!("no refetch"),
        );
        assert_eq!(outcome, MessageOutcome::UserDataReplaced);
        assert_eq!(app.user.attended_lives.len(), 1);

        let outcome = app.handle(
            InboundMessage::ExecLiveSearch { tour_name: "Love Like Rock vol.9".into() },
            || panic!("no refetch"),
        );
        assert_eq!(outcome, MessageOutcome::SearchApplied(1));

        let outcome = app.handle(InboundMessage::ForceUpdateData { new_version: Some("v5".into()) }, || {
            Err(LoadError::Status(502))
        });
        assert_eq!(outcome, MessageOutcome::Refreshed(false));
        assert_eq!(app.records().len(), 2);
    }
}
