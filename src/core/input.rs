//! Key parsing for legacy (xterm-style) terminal input.
//!
//! Key ids are normalized strings: `tab`, `shift+tab`, `enter`, `escape`, `backspace`,
//! `delete`, `up`, `down`, `left`, `right`, `home`, `end`, `pageUp`, `pageDown`,
//! `ctrl+<letter>`, `alt+<letter>`, or the printable character itself (`G` and `g` are
//! distinct ids).

const ESC: &str = "\x1b";

const LEGACY_UP: [&str; 2] = ["\x1b[A", "\x1bOA"];
const LEGACY_DOWN: [&str; 2] = ["\x1b[B", "\x1bOB"];
const LEGACY_RIGHT: [&str; 2] = ["\x1b[C", "\x1bOC"];
const LEGACY_LEFT: [&str; 2] = ["\x1b[D", "\x1bOD"];
const LEGACY_HOME: [&str; 4] = ["\x1b[H", "\x1bOH", "\x1b[1~", "\x1b[7~"];
const LEGACY_END: [&str; 4] = ["\x1b[F", "\x1bOF", "\x1b[4~", "\x1b[8~"];
const LEGACY_PAGE_UP: [&str; 1] = ["\x1b[5~"];
const LEGACY_PAGE_DOWN: [&str; 1] = ["\x1b[6~"];
const LEGACY_DELETE: [&str; 1] = ["\x1b[3~"];

fn matches_legacy_sequence(data: &str, sequences: &[&str]) -> bool {
    sequences.iter().any(|sequence| *sequence == data)
}

/// Parses one complete input sequence into a key id.
pub fn parse_key(data: &str) -> Option<String> {
    if data.is_empty() {
        return None;
    }

    let named = match data {
        "\t" => Some("tab"),
        "\x1b[Z" => Some("shift+tab"),
        "\r" | "\n" | "\x1bOM" => Some("enter"),
        ESC => Some("escape"),
        "\x7f" | "\x08" => Some("backspace"),
        " " => Some("space"),
        _ => None,
    };
    if let Some(name) = named {
        return Some(name.to_string());
    }

    let legacy: [(&[&str], &str); 9] = [
        (&LEGACY_UP, "up"),
        (&LEGACY_DOWN, "down"),
        (&LEGACY_RIGHT, "right"),
        (&LEGACY_LEFT, "left"),
        (&LEGACY_HOME, "home"),
        (&LEGACY_END, "end"),
        (&LEGACY_PAGE_UP, "pageUp"),
        (&LEGACY_PAGE_DOWN, "pageDown"),
        (&LEGACY_DELETE, "delete"),
    ];
    for (sequences, name) in legacy {
        if matches_legacy_sequence(data, sequences) {
            return Some(name.to_string());
        }
    }

    let mut chars = data.chars();
    let first = chars.next()?;
    let second = chars.next();
    let rest = chars.next();

    match (first, second, rest) {
        (ch, None, None) if is_ctrl_letter(ch) => {
            let letter = (b'a' + (ch as u8) - 1) as char;
            Some(format!("ctrl+{letter}"))
        }
        (ch, None, None) if !ch.is_control() => Some(ch.to_string()),
        ('\x1b', Some(ch), None) if ch.is_ascii_alphanumeric() => {
            Some(format!("alt+{}", ch.to_ascii_lowercase()))
        }
        _ => None,
    }
}

/// Returns whether `data` parses to `key_id`.
pub fn matches_key(data: &str, key_id: &str) -> bool {
    parse_key(data).as_deref() == Some(key_id)
}

/// Returns decoded printable text, if `data` contains no control characters.
pub fn parse_text(data: &str) -> Option<String> {
    if data.is_empty() || data.chars().any(char::is_control) {
        return None;
    }
    Some(data.to_string())
}

fn is_ctrl_letter(ch: char) -> bool {
    // 0x08 (backspace), 0x09 (tab), 0x0a (line feed) and 0x0d (enter) are named above.
    matches!(ch as u32, 0x01..=0x1a) && !matches!(ch, '\x08' | '\t' | '\n' | '\r')
}

#[cfg(test)]
mod tests {
    use super::{matches_key, parse_key, parse_text};

    #[test]
    fn named_keys_parse() {
        assert_eq!(parse_key("\t").as_deref(), Some("tab"));
        assert_eq!(parse_key("\x1b[Z").as_deref(), Some("shift+tab"));
        assert_eq!(parse_key("\r").as_deref(), Some("enter"));
        assert_eq!(parse_key("\x1b").as_deref(), Some("escape"));
        assert_eq!(parse_key("\x7f").as_deref(), Some("backspace"));
    }

    #[test]
    fn navigation_sequences_parse_in_both_cursor_modes() {
        assert_eq!(parse_key("\x1b[A").as_deref(), Some("up"));
        assert_eq!(parse_key("\x1bOA").as_deref(), Some("up"));
        assert_eq!(parse_key("\x1b[B").as_deref(), Some("down"));
        assert_eq!(parse_key("\x1b[5~").as_deref(), Some("pageUp"));
        assert_eq!(parse_key("\x1b[6~").as_deref(), Some("pageDown"));
        assert_eq!(parse_key("\x1b[H").as_deref(), Some("home"));
        assert_eq!(parse_key("\x1b[4~").as_deref(), Some("end"));
        assert_eq!(parse_key("\x1bOF").as_deref(), Some("end"));
    }

    #[test]
    fn control_letters_map_to_ctrl_ids() {
        assert_eq!(parse_key("\x03").as_deref(), Some("ctrl+c"));
        assert_eq!(parse_key("\x15").as_deref(), Some("ctrl+u"));
        assert_eq!(parse_key("\x04").as_deref(), Some("ctrl+d"));
    }

    #[test]
    fn printable_characters_keep_case() {
        assert_eq!(parse_key("G").as_deref(), Some("G"));
        assert_eq!(parse_key("g").as_deref(), Some("g"));
        assert_eq!(parse_key("k").as_deref(), Some("k"));
        assert!(matches_key("q", "q"));
        assert!(!matches_key("Q", "q"));
    }

    #[test]
    fn alt_letters_and_unknown_sequences() {
        assert_eq!(parse_key("\x1bx").as_deref(), Some("alt+x"));
        assert_eq!(parse_key("\x1b[99~"), None);
        assert_eq!(parse_key(""), None);
    }

    #[test]
    fn text_rejects_control_characters() {
        assert_eq!(parse_text("hello").as_deref(), Some("hello"));
        assert_eq!(parse_text("\x1b[A"), None);
    }
}
