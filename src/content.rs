//! Single-pass byte classifier.
//!
//! Characterizes a byte stream so that the charset selector and the
//! transfer-encoding policy can work from counters instead of re-reading
//! the content. The stream may be fed in chunks of any size; all carried
//! state lives in an explicit [`ScanState`], so the final [`ContentStats`]
//! are identical no matter how the input is split.

/// Accumulated counters over a byte stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ContentStats {
    /// Printable 7-bit bytes (including tab and form feed).
    pub ascii: usize,
    /// Control bytes other than tab/form-feed/line terminators, plus DEL.
    pub lobin: usize,
    /// Bytes with the high bit set.
    pub hibin: usize,
    /// NUL bytes (also counted in `lobin`).
    pub nulbin: usize,
    /// Line terminators seen (LF or CRLF).
    pub crlf: usize,
    /// Bare carriage returns not followed by LF.
    pub cr: usize,
    /// Longest line seen, in content bytes excluding the terminator.
    pub linemax: usize,
    /// Some line ended in space, tab or form feed.
    pub space: bool,
    /// A line consisting solely of `.` was seen.
    pub dot: bool,
    /// A line began with the literal word `From`.
    pub from: bool,
    /// A bare CR was seen; the stream cannot be treated as text-safe.
    pub binary: bool,
}

impl ContentStats {
    /// Folds another part's counters into this one, for aggregating a
    /// multipart container from its children.
    pub fn merge(&mut self, other: &ContentStats) {
        self.ascii += other.ascii;
        self.lobin += other.lobin;
        self.hibin += other.hibin;
        self.nulbin += other.nulbin;
        self.crlf += other.crlf;
        self.cr += other.cr;
        self.linemax = self.linemax.max(other.linemax);
        self.space |= other.space;
        self.dot |= other.dot;
        self.from |= other.from;
        self.binary |= other.binary;
    }
}

/// Carried state between [`scan`] calls.
///
/// A bare `\r` cannot be classified until the next byte is seen, so the
/// scanner needs one byte of lookahead across chunk boundaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanState {
    linelen: usize,
    was_cr: bool,
    trailing_ws: bool,
    dot: bool,
    /// Progress through a "From" prefix at the start of the current line:
    /// 0 = dead for this line, 1..=3 = matched that many characters.
    from_progress: u8,
}

/// Feeds one chunk of the stream into the classifier.
pub fn scan(chunk: &[u8], state: &mut ScanState, stats: &mut ContentStats) {
    for &ch in chunk {
        if state.was_cr {
            state.was_cr = false;
            if ch == b'\n' {
                stats.crlf += 1;
                end_line(state, stats);
                continue;
            }
            // The buffered CR turned out to be a content byte.
            stats.binary = true;
            stats.cr += 1;
            stats.lobin += 1;
            content_byte(state, false);
        }

        match ch {
            b'\r' => {
                state.was_cr = true;
            }
            b'\n' => {
                stats.crlf += 1;
                end_line(state, stats);
            }
            _ => {
                classify(ch, state, stats);
            }
        }
    }
}

/// Closes out the stream: resolves a pending CR and folds any unterminated
/// trailing line into `linemax`.
pub fn finish(state: &mut ScanState, stats: &mut ContentStats) {
    if state.was_cr {
        state.was_cr = false;
        stats.binary = true;
        stats.cr += 1;
        stats.lobin += 1;
        content_byte(state, false);
    }
    if state.linelen > stats.linemax {
        stats.linemax = state.linelen;
    }
}

fn classify(ch: u8, state: &mut ScanState, stats: &mut ContentStats) {
    if ch & 0x80 != 0 {
        stats.hibin += 1;
        content_byte(state, false);
    } else if ch == 0 {
        stats.nulbin += 1;
        stats.lobin += 1;
        content_byte(state, false);
    } else if ch == b'\t' || ch == 0x0c {
        stats.ascii += 1;
        content_byte(state, true);
    } else if ch < 32 || ch == 127 {
        stats.lobin += 1;
        content_byte(state, false);
    } else {
        stats.ascii += 1;
        content_byte(state, ch == b' ');
        track_line_start(ch, state, stats);
    }
}

/// Common bookkeeping for any byte that belongs to the current line.
fn content_byte(state: &mut ScanState, is_ws: bool) {
    state.linelen += 1;
    state.trailing_ws = is_ws;
    state.dot = false;
    if state.linelen > 4 {
        state.from_progress = 0;
    }
}

/// Matches `From`/`from` and a lone `.` against the first bytes of a line.
///
/// Called after `content_byte`, so `state.linelen` is the 1-based position
/// of `ch` within the line.
fn track_line_start(ch: u8, state: &mut ScanState, stats: &mut ContentStats) {
    match state.linelen {
        1 => {
            state.dot = ch == b'.';
            state.from_progress = u8::from(ch == b'F' || ch == b'f');
        }
        2 if state.from_progress == 1 => {
            state.from_progress = if ch == b'r' { 2 } else { 0 };
        }
        3 if state.from_progress == 2 => {
            state.from_progress = if ch == b'o' { 3 } else { 0 };
        }
        4 if state.from_progress == 3 => {
            if ch == b'm' {
                stats.from = true;
            }
            state.from_progress = 0;
        }
        _ => {}
    }
}

fn end_line(state: &mut ScanState, stats: &mut ContentStats) {
    if state.trailing_ws {
        stats.space = true;
    }
    if state.dot {
        stats.dot = true;
    }
    if state.linelen > stats.linemax {
        stats.linemax = state.linelen;
    }
    state.linelen = 0;
    state.trailing_ws = false;
    state.dot = false;
    state.from_progress = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(data: &[u8]) -> ContentStats {
        let mut state = ScanState::default();
        let mut stats = ContentStats::default();
        scan(data, &mut state, &mut stats);
        finish(&mut state, &mut stats);
        stats
    }

    #[test]
    fn test_plain_ascii() {
        let stats = scan_all(b"hello world\nsecond line\n");
        assert_eq!(stats.ascii, 22);
        assert_eq!(stats.crlf, 2);
        assert_eq!(stats.lobin, 0);
        assert_eq!(stats.hibin, 0);
        assert_eq!(stats.linemax, 11);
        assert!(!stats.binary);
    }

    #[test]
    fn test_crlf_counts_as_one_terminator() {
        let stats = scan_all(b"one\r\ntwo\r\n");
        assert_eq!(stats.crlf, 2);
        assert_eq!(stats.cr, 0);
        assert_eq!(stats.linemax, 3);
        assert!(!stats.binary);
    }

    #[test]
    fn test_bare_cr_is_binary() {
        let stats = scan_all(b"abc\rdef\n");
        assert!(stats.binary);
        assert_eq!(stats.cr, 1);
        assert_eq!(stats.lobin, 1);
        // The CR counts toward the line length.
        assert_eq!(stats.linemax, 7);
    }

    #[test]
    fn test_trailing_cr_resolved_at_finish() {
        let stats = scan_all(b"abc\r");
        assert!(stats.binary);
        assert_eq!(stats.cr, 1);
        assert_eq!(stats.linemax, 4);
    }

    #[test]
    fn test_high_bit_and_nul() {
        let stats = scan_all(&[0x41, 0xC3, 0xA9, 0x00, 0x07]);
        assert_eq!(stats.ascii, 1);
        assert_eq!(stats.hibin, 2);
        assert_eq!(stats.nulbin, 1);
        // NUL and BEL both land in lobin.
        assert_eq!(stats.lobin, 2);
    }

    #[test]
    fn test_from_line_detection() {
        assert!(scan_all(b"From the future\n").from);
        assert!(scan_all(b"from the past\n").from);
        assert!(scan_all(b"From\n").from);
        assert!(!scan_all(b"Fro m\n").from);
        assert!(!scan_all(b"xFrom\n").from);
        assert!(!scan_all(b"FROM\n").from);
        // Only at line start, but any line qualifies.
        assert!(scan_all(b"first\nFrom here\n").from);
    }

    #[test]
    fn test_dot_and_trailing_space() {
        let stats = scan_all(b".\n");
        assert!(stats.dot);
        assert!(!scan_all(b".x\n").dot);
        assert!(!scan_all(b"x.\n").dot);

        assert!(scan_all(b"line \n").space);
        assert!(scan_all(b"line\t\n").space);
        assert!(scan_all(b"line\x0c\n").space);
        assert!(!scan_all(b"line\n").space);
        // Unterminated trailing whitespace is not latched.
        assert!(!scan_all(b"line ").space);
    }

    #[test]
    fn test_unterminated_line_sets_linemax() {
        let stats = scan_all(b"ab\nlonger-tail");
        assert_eq!(stats.linemax, 11);
        assert_eq!(stats.crlf, 1);
    }

    #[test]
    fn test_chunking_invariance() {
        let data: &[u8] =
            b"From here\r\nplain text with trailing \t\n.\n\x00\x07\xFF\xC3\xA9line\rstill\r";
        let whole = scan_all(data);

        // Every single split point.
        for split in 0..=data.len() {
            let mut state = ScanState::default();
            let mut stats = ContentStats::default();
            scan(&data[..split], &mut state, &mut stats);
            scan(&data[split..], &mut state, &mut stats);
            finish(&mut state, &mut stats);
            assert_eq!(stats, whole, "split at {}", split);
        }

        // Byte-at-a-time.
        let mut state = ScanState::default();
        let mut stats = ContentStats::default();
        for b in data {
            scan(std::slice::from_ref(b), &mut state, &mut stats);
        }
        finish(&mut state, &mut stats);
        assert_eq!(stats, whole);
    }

    #[test]
    fn test_merge() {
        let mut a = scan_all(b"plain\n");
        let b = scan_all(b"From x\r\nwith \xE9 high bits \n");
        a.merge(&b);
        assert!(a.from);
        assert!(a.space);
        assert_eq!(a.hibin, 1);
        assert_eq!(a.crlf, 3);
        assert_eq!(a.linemax, 17);
    }
}
