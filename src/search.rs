//! Show list filtering.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::FixedOffset;
use regex::Regex;

use crate::attendance::AttendanceMap;
use crate::models::{LiveRecord, TourCategory};
use crate::setlist::count_in_record_ignore_case;
use crate::stats::venues::compare_regions;

static TOUR_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[〜~].*$").unwrap());
static SERIES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Love Like (Pop|Rock|Aloha)").unwrap());
static SERIES_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Love Like ").unwrap());
static VOL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i) vol\.?").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Compact tour name for timelines: "Love Like Pop vol.20〜…" becomes "Pop20".
/// Names outside the three series are only cut at the subtitle.
pub fn format_tour_name(name: &str) -> String {
    let head = TOUR_SUFFIX_RE.replace(name, "");
    if !SERIES_RE.is_match(&head) {
        return head.trim().to_string();
    }
    let n = SERIES_PREFIX_RE.replace(&head, "");
    let n = VOL_RE.replace(&n, "");
    let n = n.replace("追加公演", "");
    WHITESPACE_RE.replace_all(n.trim(), "").into_owned()
}

/// Active show-list filters. Empty fields don't filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveFilter {
    /// Free text matched against tour, short tour name, date, venue and region.
    pub text: String,
    /// Strict series filter ("Love Like ..." names only).
    pub tour: Option<TourCategory>,
    pub year: Option<i32>,
    pub region: Option<String>,
    pub song: Option<String>,
    pub include_medley: bool,
    pub attended_only: bool,
}

impl LiveFilter {
    /// The filter the host's tour jump produces: only the tour text set.
    pub fn for_tour(tour_name: &str) -> Self {
        Self {
            text: tour_name.to_string(),
            include_medley: true,
            ..Default::default()
        }
    }
}

fn short_name(record: &LiveRecord) -> &str {
    record.short_tour_name.as_deref().unwrap_or("")
}

/// Apply `filter`, newest show first. If the text is exactly some record's
/// tour name or short tour name, only exact tour matches are kept.
pub fn apply_filters<'a>(
    records: &'a [LiveRecord],
    filter: &LiveFilter,
    attendance: &AttendanceMap,
    offset: FixedOffset,
) -> Vec<&'a LiveRecord> {
    let text = filter.text.trim().to_lowercase();
    let exact_tour = !text.is_empty()
        && records.iter().any(|r| {
            r.tour_name.to_lowercase() == text || short_name(r).to_lowercase() == text
        });
    let song = filter.song.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let mut matched: Vec<&LiveRecord> = records
        .iter()
        .filter(|r| !filter.attended_only || attendance.contains_key(&r.date))
        .filter(|r| filter.tour.is_none_or(|t| r.series() == t))
        .filter(|r| filter.year.is_none_or(|y| r.year == y))
        .filter(|r| filter.region.as_deref().is_none_or(|region| r.region == region))
        .filter(|r| {
            song.is_none_or(|s| count_in_record_ignore_case(&r.setlist, s, filter.include_medley) > 0)
        })
        .filter(|r| {
            if text.is_empty() {
                true
            } else if exact_tour {
                r.tour_name.to_lowercase() == text || short_name(r).to_lowercase() == text
            } else {
                [r.tour_name.as_str(), short_name(r), r.date.as_str(), r.venue.as_str(), r.region.as_str()]
                    .join(" ")
                    .to_lowercase()
                    .contains(&text)
            }
        })
        .collect();

    matched.sort_by_key(|r| Reverse(r.calendar_date(offset)));
    matched
}

/// Choices offered by the year and region filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    /// Newest first.
    pub years: Vec<i32>,
    /// Prefecture order, unknown regions last.
    pub regions: Vec<String>,
}

pub fn filter_options(records: &[LiveRecord]) -> FilterOptions {
    let years: BTreeSet<i32> = records.iter().map(|r| r.year).filter(|&y| y != 0).collect();
    let regions: BTreeSet<&str> = records
        .iter()
        .map(|r| r.region.as_str())
        .filter(|r| !r.is_empty())
        .collect();

    let mut regions: Vec<String> = regions.into_iter().map(String::from).collect();
    regions.sort_by(|a, b| compare_regions(a, b));

    FilterOptions {
        years: years.into_iter().rev().collect(),
        regions,
    }
}
