use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

/// Region value used for streamed (online) shows.
pub const ONLINE_REGION: &str = "オンライン";

/// One live performance. `date` is the unique key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveRecord {
    pub date: String,
    pub day_of_week: String,
    pub tour_name: String,
    /// The sheet sometimes types this column as a number.
    #[serde(deserialize_with = "de_opt_string")]
    pub short_tour_name: Option<String>,
    pub venue: String,
    pub region: String,
    #[serde(deserialize_with = "de_int")]
    pub year: i32,
    #[serde(deserialize_with = "de_int")]
    pub song_count: i32,
    #[serde(deserialize_with = "de_setlist")]
    pub setlist: Vec<String>,
    #[serde(deserialize_with = "de_opt_string")]
    pub after_live_tweet: Option<String>,
}

impl LiveRecord {
    /// Calendar date of the show, if the key parses.
    pub fn calendar_date(&self, offset: FixedOffset) -> Option<NaiveDate> {
        parse_calendar_date(&self.date, offset)
    }

    /// Key used by the venue ranking: online shows collapse into one entry.
    pub fn venue_key(&self) -> String {
        if self.region == ONLINE_REGION {
            ONLINE_REGION.to_string()
        } else {
            format!("{} ({})", self.venue, self.region)
        }
    }

    pub fn category(&self) -> TourCategory {
        TourCategory::from_tour_name(&self.tour_name)
    }

    pub fn series(&self) -> TourCategory {
        TourCategory::from_series_name(&self.tour_name)
    }
}

/// Tour family used by every per-category breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TourCategory {
    Pop,
    Rock,
    Aloha,
    Other,
}

impl TourCategory {
    pub const ALL: [TourCategory; 4] = [Self::Pop, Self::Rock, Self::Aloha, Self::Other];

    /// Loose classification used by the statistics charts: any tour name
    /// containing "pop", "rock" or "aloha" (case-insensitive).
    pub fn from_tour_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("pop") {
            Self::Pop
        } else if lower.contains("rock") {
            Self::Rock
        } else if lower.contains("aloha") {
            Self::Aloha
        } else {
            Self::Other
        }
    }

    /// Strict classification used for labels and the tour filter:
    /// only the "Love Like ..." series count.
    pub fn from_series_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("love like pop") {
            Self::Pop
        } else if lower.contains("love like rock") {
            Self::Rock
        } else if lower.contains("love like aloha") {
            Self::Aloha
        } else {
            Self::Other
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pop => "POP",
            Self::Rock => "ROCK",
            Self::Aloha => "ALOHA",
            Self::Other => "Event",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Pop => "Pop",
            Self::Rock => "Rock",
            Self::Aloha => "Aloha",
            Self::Other => "Other",
        }
    }
}

/// Reference data for one song, keyed by clean name in [`Payload::song_data`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SongInfo {
    /// Release year; 0 when unknown.
    #[serde(deserialize_with = "de_int")]
    pub year: i32,
    #[serde(rename = "type", deserialize_with = "de_opt_string")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "de_opt_string")]
    pub single_title: Option<String>,
    #[serde(deserialize_with = "de_opt_string")]
    pub album_title: Option<String>,
    #[serde(rename = "imgS", deserialize_with = "de_opt_string")]
    pub img_s: Option<String>,
    #[serde(rename = "imgA", deserialize_with = "de_opt_string")]
    pub img_a: Option<String>,
}

impl SongInfo {
    pub fn song_type(&self) -> SongType {
        SongType::from_raw(self.kind.as_deref())
    }
}

/// Catalog classification of a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SongType {
    Title,
    Coupling,
    Album,
    Other,
}

impl SongType {
    /// Map the free-text type column onto the four catalog buckets.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Other;
        };
        if raw.contains("表題") || raw.contains("シングル") {
            Self::Title
        } else if raw.contains("カップリング") || raw.contains("C/W") || raw.contains("B面") {
            Self::Coupling
        } else if raw.contains("アルバム") || raw.contains("Album") {
            Self::Album
        } else {
            Self::Other
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Title => "表題曲",
            Self::Coupling => "カップリング曲",
            Self::Album => "アルバム曲",
            Self::Other => "その他",
        }
    }
}

pub type SongCatalog = BTreeMap<String, SongInfo>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlbumEntry {
    pub album_name: String,
    #[serde(deserialize_with = "de_int")]
    pub play_count: i32,
}

/// One row of the career timeline sheet. Newer rows use `type` + `title`,
/// older rows put the title in a per-kind column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryEntry {
    #[serde(deserialize_with = "de_opt_string")]
    pub date: Option<String>,
    #[serde(rename = "type", deserialize_with = "de_opt_string")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "de_opt_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "de_opt_string")]
    pub live: Option<String>,
    #[serde(deserialize_with = "de_opt_string")]
    pub single: Option<String>,
    #[serde(deserialize_with = "de_opt_string")]
    pub album: Option<String>,
}

/// A released item (single, album, ...) from the discography list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListEntry {
    #[serde(rename = "type", deserialize_with = "de_opt_string")]
    pub kind: Option<String>,
    pub title: String,
    #[serde(deserialize_with = "de_opt_string")]
    pub release_date: Option<String>,
    /// Track list separated by `/`.
    #[serde(deserialize_with = "de_opt_string")]
    pub tracks: Option<String>,
    #[serde(deserialize_with = "de_opt_string")]
    pub img1: Option<String>,
    #[serde(deserialize_with = "de_opt_string")]
    pub img2: Option<String>,
}

impl ListEntry {
    pub fn track_list(&self) -> Vec<&str> {
        self.tracks
            .as_deref()
            .map(|t| t.split('/').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }
}

/// Response body of `?action=getAllData`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Payload {
    pub status: Option<String>,
    pub message: Option<String>,
    #[serde(deserialize_with = "de_opt_string")]
    pub last_update: Option<String>,
    pub live_records: Vec<LiveRecord>,
    pub album_data: Vec<AlbumEntry>,
    pub song_data: SongCatalog,
    pub history_data: Vec<HistoryEntry>,
    pub list_data: Vec<ListEntry>,
}

impl Payload {
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }

    /// `lastUpdate` if present, otherwise the newest record date as `YYYY/MM/DD`.
    pub fn last_update_label(&self, offset: FixedOffset) -> Option<String> {
        if let Some(ref label) = self.last_update {
            if !label.is_empty() {
                return Some(label.clone());
            }
        }
        self.live_records
            .iter()
            .filter_map(|r| r.calendar_date(offset))
            .max()
            .map(|d| format!("{:04}/{:02}/{:02}", d.year(), d.month(), d.day()))
    }

    /// Album play counts in sheet order, rows without a name skipped.
    pub fn album_chart(&self) -> impl Iterator<Item = &AlbumEntry> {
        self.album_data.iter().filter(|a| !a.album_name.trim().is_empty())
    }
}

/// Parse the date formats the sheet produces: `YYYY/MM/DD`, `YYYY-MM-DD`,
/// `YYYY/M/D`, or a full RFC 3339 timestamp (converted into `offset`).
pub fn parse_calendar_date(raw: &str, offset: FixedOffset) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&offset).date_naive());
    }
    for fmt in ["%Y/%m/%d", "%Y-%m-%d", "%Y.%m.%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    // Trailing time or weekday, e.g. "2024/03/15 18:00" or "2024/03/15(金)"
    let head: String = raw
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '/' | '-' | '.'))
        .collect();
    if head.len() != raw.len() && !head.is_empty() {
        return parse_calendar_date(&head, offset);
    }
    None
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

fn de_int<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
    Ok(match Option::<Loose>::deserialize(d)? {
        Some(Loose::Int(n)) => n as i32,
        Some(Loose::Float(f)) => f as i32,
        Some(Loose::Str(s)) => s.trim().parse().unwrap_or(0),
        Some(Loose::Bool(_)) | None => 0,
    })
}

fn de_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Loose>::deserialize(d)? {
        Some(Loose::Str(s)) if s.is_empty() => None,
        Some(Loose::Str(s)) => Some(s),
        Some(Loose::Int(n)) => Some(n.to_string()),
        Some(Loose::Float(f)) => Some(f.to_string()),
        Some(Loose::Bool(_)) | None => None,
    })
}

fn de_setlist<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let raw = Option::<Vec<Option<Loose>>>::deserialize(d)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .map(|t| match t {
            Some(Loose::Str(s)) => s,
            Some(Loose::Int(n)) => n.to_string(),
            Some(Loose::Float(f)) => f.to_string(),
            Some(Loose::Bool(_)) | None => String::new(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    #[test]
    fn test_record_deserialize_loose_types() {
        let json = r#"{
            "date": "2024/03/15", "dayOfWeek": "金", "tourName": "Love Like Pop vol.24",
            "shortTourName": 24, "venue": "Zepp Haneda", "region": "東京都",
            "year": "2024", "songCount": 21,
            "setlist": ["Song A", null, "Song B_アンコール"]
        }"#;
        let r: LiveRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.year, 2024);
        assert_eq!(r.song_count, 21);
        assert_eq!(r.short_tour_name.as_deref(), Some("24"));
        assert_eq!(r.setlist, vec!["Song A", "", "Song B_アンコール"]);
        assert!(r.after_live_tweet.is_none());
    }

    #[test]
    fn test_record_missing_fields_default() {
        let r: LiveRecord = serde_json::from_str(r#"{"date": "2001/01/01"}"#).unwrap();
        assert_eq!(r.year, 0);
        assert!(r.setlist.is_empty());
        assert!(r.short_tour_name.is_none());
    }

    #[test]
    fn test_payload_error_flag() {
        let p: Payload = serde_json::from_str(r#"{"status":"error","message":"boom"}"#).unwrap();
        assert!(p.is_error());
        assert_eq!(p.message.as_deref(), Some("boom"));
        assert!(p.live_records.is_empty());
    }

    #[test]
    fn test_album_chart() {
        let p: Payload = serde_json::from_str(
            r#"{"albumData":[
                {"albumName":"LOVE LIKE POP","playCount":"120"},
                {"albumName":"","playCount":3},
                {"albumName":"Kanojo","playCount":45}
            ]}"#,
        )
        .unwrap();
        let chart: Vec<_> = p.album_chart().map(|a| (a.album_name.as_str(), a.play_count)).collect();
        assert_eq!(chart, vec![("LOVE LIKE POP", 120), ("Kanojo", 45)]);
    }

    #[test]
    fn test_parse_calendar_date() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_calendar_date("2024/03/15", jst()), Some(d));
        assert_eq!(parse_calendar_date("2024-03-15", jst()), Some(d));
        assert_eq!(parse_calendar_date("2024/3/15", jst()), Some(d));
        assert_eq!(parse_calendar_date("2024/03/15 18:30", jst()), Some(d));
        // 15:00 UTC on the 14th is already the 15th in Tokyo
        assert_eq!(parse_calendar_date("2024-03-14T15:00:00Z", jst()), Some(d));
        assert_eq!(parse_calendar_date("", jst()), None);
        assert_eq!(parse_calendar_date("soon", jst()), None);
    }

    #[test]
    fn test_tour_categories() {
        assert_eq!(TourCategory::from_tour_name("Love Like Pop vol.20"), TourCategory::Pop);
        assert_eq!(TourCategory::from_tour_name("ROCK IN JAPAN"), TourCategory::Rock);
        assert_eq!(TourCategory::from_series_name("ROCK IN JAPAN"), TourCategory::Other);
        assert_eq!(TourCategory::from_series_name("Love Like Aloha vol.6"), TourCategory::Aloha);
        assert_eq!(TourCategory::Other.label(), "Event");
    }

    #[test]
    fn test_song_type_mapping() {
        assert_eq!(SongType::from_raw(Some("表題曲")), SongType::Title);
        assert_eq!(SongType::from_raw(Some("シングル")), SongType::Title);
        assert_eq!(SongType::from_raw(Some("C/W")), SongType::Coupling);
        assert_eq!(SongType::from_raw(Some("Album")), SongType::Album);
        assert_eq!(SongType::from_raw(Some("配信")), SongType::Other);
        assert_eq!(SongType::from_raw(None), SongType::Other);
    }

    #[test]
    fn test_venue_key() {
        let mut r = LiveRecord {
            venue: "日本武道館".into(),
            region: "東京都".into(),
            ..Default::default()
        };
        assert_eq!(r.venue_key(), "日本武道館 (東京都)");
        r.region = ONLINE_REGION.into();
        assert_eq!(r.venue_key(), ONLINE_REGION);
    }

    #[test]
    fn test_last_update_fallback() {
        let p = Payload {
            live_records: vec![
                LiveRecord { date: "2023/12/01".into(), ..Default::default() },
                LiveRecord { date: "2024/02/09".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        assert_eq!(p.last_update_label(jst()).as_deref(), Some("2024/02/09"));
    }

    #[test]
    fn test_track_list() {
        let item = ListEntry { tracks: Some("A / B/C".into()), ..Default::default() };
        assert_eq!(item.track_list(), vec!["A", "B", "C"]);
    }
}
