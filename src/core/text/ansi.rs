//! ANSI escape extraction.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnsiCodeKind {
    Csi,
    Osc,
    Ss3,
}

/// One escape sequence found at a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnsiCode {
    pub length: usize,
    pub kind: AnsiCodeKind,
}

/// Returns the escape sequence starting at byte `pos`, if it is complete.
pub fn extract_ansi_code(input: &str, pos: usize) -> Option<AnsiCode> {
    let bytes = input.as_bytes();
    if bytes.get(pos) != Some(&0x1b) {
        return None;
    }

    match bytes.get(pos + 1)? {
        b'[' => {
            let end = bytes[pos + 2..]
                .iter()
                .position(|byte| (0x40..=0x7e).contains(byte))?;
            Some(AnsiCode {
                length: end + 3,
                kind: AnsiCodeKind::Csi,
            })
        }
        b']' => {
            let mut idx = pos + 2;
            while idx < bytes.len() {
                if bytes[idx] == 0x07 {
                    return Some(AnsiCode {
                        length: idx + 1 - pos,
                        kind: AnsiCodeKind::Osc,
                    });
                }
                if bytes[idx] == 0x1b && bytes.get(idx + 1) == Some(&b'\\') {
                    return Some(AnsiCode {
                        length: idx + 2 - pos,
                        kind: AnsiCodeKind::Osc,
                    });
                }
                idx += 1;
            }
            None
        }
        b'O' if pos + 2 < bytes.len() => Some(AnsiCode {
            length: 3,
            kind: AnsiCodeKind::Ss3,
        }),
        _ => None,
    }
}

/// Removes complete escape sequences, keeping everything else.
pub fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut idx = 0;
    while idx < input.len() {
        if let Some(code) = extract_ansi_code(input, idx) {
            idx += code.length;
            continue;
        }
        let Some(ch) = input[idx..].chars().next() else {
            break;
        };
        out.push(ch);
        idx += ch.len_utf8();
    }
    out
}
