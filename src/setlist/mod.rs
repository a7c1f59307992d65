//! Setlist tokenizer and normalizer.
//!
//! A setlist is a list of raw tokens in performance order. Tokens are either
//! medley sentinels or song references carrying optional encore markers:
//!
//! ```text
//! "Song A"                 plain song
//! "__MEDLEY_START__"       opens a medley
//! "Song B"                 medley member
//! "__MEDLEY_END__"         closes it
//! "Song C_アンコール"        first encore
//! "Song D_アンコール #2"     second encore wave
//! ```
//!
//! Every count in the crate goes through [`clean_name`] / [`normalize`] so the
//! tables never disagree about what a song is called.

pub mod display;

use regex::Regex;
use std::sync::LazyLock;

pub const MEDLEY_START: &str = "__MEDLEY_START__";
pub const MEDLEY_END: &str = "__MEDLEY_END__";

/// Encore marker as it appears in the data.
pub const ENCORE_MARKER: &str = "_アンコール";

/// Placeholder the sheet uses for a medley row.
pub const MEDLEY_PLACEHOLDER: &str = "メドレー";

// Encore marker plus an optional wave ordinal right after it: "_アンコール #2"
static ENCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:_アンコール|_ENCORE)(?:\s*#(?P<wave>\d+))?").unwrap()
});

// Any trailing ordinal(s) left after the encore marker is gone: "Song #2"
static TRAILING_ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\s*#\d+)+$").unwrap());

static ORDINAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(?P<n>\d+)").unwrap());

/// A song reference after marker stripping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongRef {
    pub name: String,
    /// 0 = main set, 1..=3 = encore wave.
    pub encore_wave: u8,
}

/// One classified setlist token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    MedleyStart,
    MedleyEnd,
    Song(SongRef),
}

impl Token {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            MEDLEY_START => Token::MedleyStart,
            MEDLEY_END => Token::MedleyEnd,
            _ => Token::Song(SongRef {
                name: clean_name(raw),
                encore_wave: encore_wave(raw),
            }),
        }
    }
}

/// Canonical song name: encore markers and trailing `#<n>` ordinals removed,
/// whitespace trimmed. Applying it to its own output is a no-op.
pub fn clean_name(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = {
            let stripped = ENCORE_RE.replace_all(current.trim(), "");
            TRAILING_ORDINAL_RE.replace(stripped.trim(), "").trim().to_string()
        };
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Encore wave of a raw token: 0 when not an encore, otherwise the `#<n>`
/// ordinal (2 or 3) or 1 when none is given.
pub fn encore_wave(raw: &str) -> u8 {
    if !is_encore(raw) {
        return 0;
    }
    let explicit = ENCORE_RE
        .captures(raw)
        .and_then(|c| c.name("wave"))
        .or_else(|| ORDINAL_RE.captures_iter(raw).last().and_then(|c| c.name("n")))
        .and_then(|m| m.as_str().parse::<u8>().ok());
    match explicit {
        Some(n @ 2..=3) => n,
        _ => 1,
    }
}

pub fn is_encore(raw: &str) -> bool {
    raw.contains(ENCORE_MARKER) || raw.contains("_ENCORE")
}

/// Whether a clean name may enter any count. Blank names, the medley
/// placeholder and bracketed internal markers are skipped.
pub fn is_countable(clean: &str) -> bool {
    !clean.trim().is_empty()
        && clean != MEDLEY_PLACEHOLDER
        && !clean.eq_ignore_ascii_case("medley")
        && !clean.contains('[')
        && !clean.contains(']')
}

/// A song occurrence within one setlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvent {
    /// Index of the token within the setlist.
    pub position: usize,
    pub clean_name: String,
    pub is_medley_member: bool,
    pub encore_wave: u8,
}

impl NormalizedEvent {
    pub fn is_countable(&self) -> bool {
        is_countable(&self.clean_name)
    }

    pub fn is_encore(&self) -> bool {
        self.encore_wave > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetlistEvent {
    /// A medley opened here. Used for numbering only, never counted.
    MedleyHeader { position: usize },
    Song(NormalizedEvent),
}

/// Lazy normalizer over one setlist. See [`normalize`].
#[derive(Debug, Clone)]
pub struct Normalize<'a> {
    tokens: std::iter::Enumerate<std::slice::Iter<'a, String>>,
    in_medley: bool,
}

impl Iterator for Normalize<'_> {
    type Item = SetlistEvent;

    fn next(&mut self) -> Option<SetlistEvent> {
        for (position, raw) in self.tokens.by_ref() {
            match Token::parse(raw) {
                Token::MedleyStart => {
                    self.in_medley = true;
                    return Some(SetlistEvent::MedleyHeader { position });
                }
                Token::MedleyEnd => {
                    self.in_medley = false;
                }
                Token::Song(song) => {
                    return Some(SetlistEvent::Song(NormalizedEvent {
                        position,
                        clean_name: song.name,
                        is_medley_member: self.in_medley,
                        encore_wave: song.encore_wave,
                    }));
                }
            }
        }
        None
    }
}

/// Turn a setlist into classified events, tracking medley membership.
/// Pure: the same slice always yields the same sequence.
pub fn normalize(setlist: &[String]) -> Normalize<'_> {
    Normalize {
        tokens: setlist.iter().enumerate(),
        in_medley: false,
    }
}

/// Song events only (medley headers dropped), countable or not.
pub fn songs(setlist: &[String]) -> impl Iterator<Item = NormalizedEvent> + '_ {
    normalize(setlist).filter_map(|e| match e {
        SetlistEvent::Song(song) => Some(song),
        SetlistEvent::MedleyHeader { .. } => None,
    })
}

/// Songs that may enter counts.
pub fn countable_songs(setlist: &[String]) -> impl Iterator<Item = NormalizedEvent> + '_ {
    songs(setlist).filter(NormalizedEvent::is_countable)
}

/// Occurrences of `song` (a clean name) in a setlist. Medley members are
/// skipped unless `include_medley` is set.
pub fn count_in_record(setlist: &[String], song: &str, include_medley: bool) -> usize {
    songs(setlist)
        .filter(|e| include_medley || !e.is_medley_member)
        .filter(|e| e.clean_name == song)
        .count()
}

/// Case-insensitive variant of [`count_in_record`] used by free-text filters.
pub fn count_in_record_ignore_case(setlist: &[String], song: &str, include_medley: bool) -> usize {
    let needle = song.trim().to_lowercase();
    songs(setlist)
        .filter(|e| include_medley || !e.is_medley_member)
        .filter(|e| e.clean_name.to_lowercase() == needle)
        .count()
}
