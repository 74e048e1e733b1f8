//! Stdin escape-sequence buffering.
//!
//! Raw reads can split an escape sequence (a wheel report arriving as `ESC [ < 6` then
//! `5;10;4M`). The buffer holds incomplete tails until they complete or the flush timeout
//! expires, and emits each complete sequence or plain character on its own.

use std::time::{Duration, Instant};

const ESC: u8 = 0x1b;

#[derive(Debug, PartialEq, Eq)]
enum SequenceStatus {
    Complete,
    Incomplete,
}

/// Buffers stdin input and emits complete sequences.
#[derive(Debug)]
pub struct StdinBuffer {
    buffer: String,
    timeout_ms: u64,
    flush_deadline: Option<Instant>,
}

impl StdinBuffer {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            buffer: String::new(),
            timeout_ms,
            flush_deadline: None,
        }
    }

    /// Appends raw bytes and returns every sequence that is now complete.
    pub fn process(&mut self, data: &[u8]) -> Vec<String> {
        self.flush_deadline = None;
        self.buffer.push_str(&String::from_utf8_lossy(data));

        let (sequences, remainder) = split_complete_sequences(&self.buffer);
        self.buffer = remainder;
        if !self.buffer.is_empty() {
            self.flush_deadline = Some(Instant::now() + Duration::from_millis(self.timeout_ms));
        }
        sequences
    }

    /// Emits the buffered tail verbatim once its deadline has passed.
    pub fn flush_due(&mut self, now: Instant) -> Vec<String> {
        match self.flush_deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => Vec::new(),
        }
    }

    /// Poll timeout that wakes the reader in time for the next flush.
    pub fn next_timeout_ms(&self, now: Instant, default_ms: i32) -> i32 {
        match self.flush_deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(now).as_millis();
                (remaining.min(i32::MAX as u128) as i32).clamp(0, default_ms)
            }
            None => default_ms,
        }
    }

    pub fn flush(&mut self) -> Vec<String> {
        self.flush_deadline = None;
        if self.buffer.is_empty() {
            return Vec::new();
        }
        vec![std::mem::take(&mut self.buffer)]
    }

    pub fn clear(&mut self) {
        self.flush_deadline = None;
        self.buffer.clear();
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }
}

fn split_complete_sequences(buffer: &str) -> (Vec<String>, String) {
    let mut sequences = Vec::new();
    let bytes = buffer.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] != ESC {
            let Some(ch) = buffer[pos..].chars().next() else {
                break;
            };
            sequences.push(ch.to_string());
            pos += ch.len_utf8();
            continue;
        }

        let mut end = pos + 1;
        loop {
            if end > bytes.len() {
                return (sequences, buffer[pos..].to_string());
            }
            if !buffer.is_char_boundary(end) {
                end += 1;
                continue;
            }
            match sequence_status(&buffer[pos..end]) {
                SequenceStatus::Complete => break,
                SequenceStatus::Incomplete => end += 1,
            }
        }
        sequences.push(buffer[pos..end].to_string());
        pos = end;
    }

    (sequences, String::new())
}

fn sequence_status(candidate: &str) -> SequenceStatus {
    let bytes = candidate.as_bytes();
    if bytes.len() == 1 {
        return SequenceStatus::Incomplete;
    }

    match bytes[1] {
        b'[' => csi_status(&candidate[2..]),
        b']' => {
            if candidate.ends_with('\x07') || candidate.ends_with("\x1b\\") {
                SequenceStatus::Complete
            } else {
                SequenceStatus::Incomplete
            }
        }
        b'O' => {
            if bytes.len() >= 3 {
                SequenceStatus::Complete
            } else {
                SequenceStatus::Incomplete
            }
        }
        _ => SequenceStatus::Complete,
    }
}

fn csi_status(payload: &str) -> SequenceStatus {
    let Some(&last) = payload.as_bytes().last() else {
        return SequenceStatus::Incomplete;
    };
    if !(0x40..=0x7e).contains(&last) {
        return SequenceStatus::Incomplete;
    }

    // `<` opens an SGR mouse report, which only ends at `M`/`m` after three fields.
    if let Some(report) = payload.strip_prefix('<') {
        let Some(fields) = report
            .strip_suffix('M')
            .or_else(|| report.strip_suffix('m'))
        else {
            return SequenceStatus::Incomplete;
        };
        let parts: Vec<&str> = fields.split(';').collect();
        let well_formed = parts.len() == 3
            && parts
                .iter()
                .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()));
        return if well_formed {
            SequenceStatus::Complete
        } else {
            SequenceStatus::Incomplete
        };
    }

    SequenceStatus::Complete
}

#[cfg(test)]
mod tests {
    use super::StdinBuffer;
    use std::time::{Duration, Instant};

    #[test]
    fn splits_partial_mouse_report() {
        let mut buffer = StdinBuffer::new(10);

        assert!(buffer.process(b"\x1b").is_empty());
        assert!(buffer.process(b"[<65").is_empty());
        assert_eq!(buffer.process(b";20;5M"), vec!["\x1b[<65;20;5M".to_string()]);
    }

    #[test]
    fn plain_characters_and_sequences_are_separated() {
        let mut buffer = StdinBuffer::new(10);
        assert_eq!(
            buffer.process(b"jk\x1b[Aq"),
            vec![
                "j".to_string(),
                "k".to_string(),
                "\x1b[A".to_string(),
                "q".to_string()
            ]
        );
    }

    #[test]
    fn lone_escape_flushes_after_timeout_only_once() {
        let mut buffer = StdinBuffer::new(25);

        assert!(buffer.process(b"\x1b").is_empty());
        assert!(buffer.flush_due(Instant::now()).is_empty());

        let flushed = buffer.flush_due(Instant::now() + Duration::from_millis(50));
        assert_eq!(flushed, vec!["\x1b".to_string()]);
        assert!(buffer
            .flush_due(Instant::now() + Duration::from_millis(100))
            .is_empty());
    }

    #[test]
    fn next_timeout_tracks_deadline_and_clear_resets_it() {
        let mut buffer = StdinBuffer::new(25);
        assert!(buffer.process(b"\x1b[").is_empty());
        assert!(buffer.next_timeout_ms(Instant::now(), 1000) <= 25);

        buffer.clear();
        assert!(buffer.buffer().is_empty());
        assert_eq!(buffer.next_timeout_ms(Instant::now(), 77), 77);
    }

    #[test]
    fn malformed_mouse_tail_is_preserved_on_flush() {
        let mut buffer = StdinBuffer::new(10);
        let input = "a\x1b[<65;1;xM";

        let mut events = buffer.process(input.as_bytes());
        assert_eq!(events, vec!["a".to_string()]);

        events.extend(buffer.flush_due(Instant::now() + Duration::from_millis(25)));
        assert_eq!(events.concat(), input);
    }

    #[test]
    fn utf8_characters_survive() {
        let mut buffer = StdinBuffer::new(10);
        assert_eq!(buffer.process("é".as_bytes()), vec!["é".to_string()]);
    }
}
