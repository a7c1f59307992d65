use super::{MEDLEY_PLACEHOLDER, SetlistEvent, Token, normalize};

/// How a setlist line is numbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineNumber {
    /// Running number shared by songs and medley headers: `3.`
    Main(usize),
    /// Position inside a medley: `(2)`
    Medley(usize),
}

/// One printable setlist line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetlistLine {
    pub number: LineNumber,
    pub title: String,
    pub is_medley_header: bool,
    pub is_medley_member: bool,
    pub encore_wave: u8,
    /// Set when an encore wave starts at this line.
    pub encore_header: Option<u8>,
}

/// Number a setlist for display. Blank tokens are skipped. An encore header
/// is attached the first time a higher wave appears outside a medley, or
/// when a medley opens with an encore song.
pub fn numbered_lines(setlist: &[String]) -> Vec<SetlistLine> {
    let mut lines = Vec::new();
    let mut song_num = 1;
    let mut medley_num = 1;
    let mut encore_num = 0u8;

    for event in normalize(setlist) {
        match event {
            SetlistEvent::MedleyHeader { position } => {
                let next_wave = setlist
                    .get(position + 1)
                    .map(|raw| match Token::parse(raw) {
                        Token::Song(song) => song.encore_wave,
                        _ => 0,
                    })
                    .unwrap_or(0);
                let mut encore_header = None;
                if next_wave > encore_num {
                    encore_num = next_wave;
                    encore_header = Some(next_wave);
                }
                lines.push(SetlistLine {
                    number: LineNumber::Main(song_num),
                    title: MEDLEY_PLACEHOLDER.to_string(),
                    is_medley_header: true,
                    is_medley_member: false,
                    encore_wave: next_wave,
                    encore_header,
                });
                song_num += 1;
                medley_num = 1;
            }
            SetlistEvent::Song(song) => {
                if setlist[song.position].trim().is_empty() {
                    continue;
                }
                let mut encore_header = None;
                if song.encore_wave > encore_num && !song.is_medley_member {
                    encore_num = song.encore_wave;
                    encore_header = Some(song.encore_wave);
                }
                let number = if song.is_medley_member {
                    medley_num += 1;
                    LineNumber::Medley(medley_num - 1)
                } else {
                    song_num += 1;
                    LineNumber::Main(song_num - 1)
                };
                lines.push(SetlistLine {
                    number,
                    title: song.clean_name,
                    is_medley_header: false,
                    is_medley_member: song.is_medley_member,
                    encore_wave: song.encore_wave,
                    encore_header,
                });
            }
        }
    }
    lines
}

/// Plain-text setlist for sharing:
///
/// ```text
/// 1. Song A
/// 2. メドレー
///   (1) Song B
/// ```
pub fn copy_text(setlist: &[String]) -> String {
    let mut text = String::new();
    for line in numbered_lines(setlist) {
        match line.number {
            LineNumber::Main(n) => text.push_str(&format!("{n}. {}\n", line.title)),
            LineNumber::Medley(n) => text.push_str(&format!("  ({n}) {}\n", line.title)),
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setlist(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_numbering_with_medley() {
        let list = setlist(&[
            "Song A",
            "__MEDLEY_START__",
            "Song B",
            "Song C",
            "__MEDLEY_END__",
            "Song D",
        ]);
        let lines = numbered_lines(&list);
        let numbers: Vec<_> = lines.iter().map(|l| l.number).collect();
        assert_eq!(
            numbers,
            vec![
                LineNumber::Main(1),
                LineNumber::Main(2),
                LineNumber::Medley(1),
                LineNumber::Medley(2),
                LineNumber::Main(3),
            ]
        );
        assert!(lines[1].is_medley_header);
        assert_eq!(lines[1].title, "メドレー");
    }

    #[test]
    fn test_encore_headers() {
        let list = setlist(&[
            "Song A",
            "Song B_アンコール",
            "Song C_アンコール",
            "Song D_アンコール #2",
            "Song E_アンコール #3",
        ]);
        let headers: Vec<_> = numbered_lines(&list).iter().map(|l| l.encore_header).collect();
        assert_eq!(headers, vec![None, Some(1), None, Some(2), Some(3)]);
    }

    #[test]
    fn test_medley_opening_encore() {
        let list = setlist(&[
            "Song A",
            "__MEDLEY_START__",
            "Song B_アンコール",
            "Song C_アンコール",
            "__MEDLEY_END__",
        ]);
        let lines = numbered_lines(&list);
        assert_eq!(lines[1].encore_header, Some(1));
        assert!(lines[2].encore_header.is_none());
    }

    #[test]
    fn test_blank_tokens_skipped() {
        let list = setlist(&["Song A", "  ", "Song B"]);
        let lines = numbered_lines(&list);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].number, LineNumber::Main(2));
    }

    #[test]
    fn test_copy_text() {
        let list = setlist(&[
            "Song A",
            "__MEDLEY_START__",
            "Song B",
            "__MEDLEY_END__",
            "Song C_アンコール #2",
        ]);
        assert_eq!(
            copy_text(&list),
            "1. Song A\n2. メドレー\n  (1) Song B\n3. Song C\n"
        );
    }
}
