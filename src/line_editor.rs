use std::{
    io::{self, Read, Write},
    time::Instant,
};

use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use tracing::debug;

use crate::completion::{Completer, Sources, TabOutcome};

const ERASE_LINE: &str = "\x1b[K";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Candidates per row in a Tab listing
const LISTING_COLUMNS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(u8),
    Backspace,
    Tab,
    Enter,
    Up,
    Down,
    Left,
    Right,
    Eof,
    Ignored,
}

/// Reads one keystroke; arrow keys arrive as `ESC [ X`.
pub fn read_key<R: Read>(input: &mut R) -> io::Result<Key> {
    let b = match read_byte(input)? {
        Some(b) => b,
        None => return Ok(Key::Eof),
    };
    let key = match b {
        b'\n' | b'\r' => Key::Enter,
        b'\t' => Key::Tab,
        127 | 8 => Key::Backspace,
        4 => Key::Eof,
        0x1b => {
            if read_byte(input)? != Some(b'[') {
                return Ok(Key::Ignored);
            }
            match read_byte(input)? {
                Some(b'A') => Key::Up,
                Some(b'B') => Key::Down,
                Some(b'C') => Key::Right,
                Some(b'D') => Key::Left,
                _ => Key::Ignored,
            }
        }
        b if b >= 0x20 => Key::Char(b),
        _ => Key::Ignored,
    };
    Ok(key)
}

fn read_byte<R: Read>(input: &mut R) -> io::Result<Option<u8>> {
    let mut b = [0u8; 1];
    loop {
        match input.read(&mut b) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(b[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Non-canonical, non-echoing stdin until dropped.
pub struct RawMode {
    original: Termios,
}

impl RawMode {
    pub fn enable() -> nix::Result<RawMode> {
        let stdin = io::stdin();
        let original = termios::tcgetattr(&stdin)?;
        let mut raw = original.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(&stdin, SetArg::TCSANOW, &raw)?;
        Ok(RawMode { original })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &self.original);
    }
}

/// Lines handled by the editor itself instead of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meta {
    Clear,
    Deactivate,
}

impl Meta {
    pub fn as_str(&self) -> &'static str {
        match self {
            Meta::Clear => "clear",
            Meta::Deactivate => "deactivate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    Meta(Meta),
    /// Nothing typed; not worth a history entry.
    Empty,
    /// Input closed. The session ends without committing anything.
    Eof,
}

/// The line being edited. `cursor` is a byte offset on a char boundary, the
/// same coordinates completion queries use.
#[derive(Debug, Default)]
struct EditState {
    buf: String,
    cursor: usize,
    /// Bytes of a multi-byte character still being typed.
    partial: Vec<u8>,
    /// Index into history while browsing with Up/Down.
    browse: Option<usize>,
    /// Token start and full candidate behind the dim suggestion on screen.
    shown: Option<(usize, String)>,
}

impl EditState {
    fn set(&mut self, text: &str) {
        self.buf = text.to_owned();
        self.cursor = self.buf.len();
    }

    /// Feeds one raw byte. Completed characters are inserted at the cursor;
    /// an invalid sequence becomes U+FFFD and the byte that broke it starts
    /// over.
    fn push_byte(&mut self, b: u8, max_len: usize) {
        self.partial.push(b);
        match std::str::from_utf8(&self.partial) {
            Ok(s) => {
                let s = s.to_owned();
                self.partial.clear();
                self.insert(&s, max_len);
            }
            Err(e) if e.error_len().is_none() => {}
            Err(_) => {
                self.partial.pop();
                let restart = !self.partial.is_empty();
                self.partial.clear();
                self.insert(&char::REPLACEMENT_CHARACTER.to_string(), max_len);
                if restart {
                    self.push_byte(b, max_len);
                }
            }
        }
    }

    fn insert(&mut self, text: &str, max_len: usize) {
        if self.buf.len() + text.len() <= max_len {
            self.buf.insert_str(self.cursor, text);
            self.cursor += text.len();
        }
    }

    fn prev_boundary(&self) -> usize {
        self.buf[..self.cursor]
            .char_indices()
            .next_back()
            .map_or(0, |(i, _)| i)
    }

    fn next_boundary(&self) -> usize {
        self.buf[self.cursor..]
            .chars()
            .next()
            .map_or(self.cursor, |c| self.cursor + c.len_utf8())
    }
}

pub struct LineEditor {
    completer: Completer,
    max_len: usize,
    raw_mode: bool,
}

impl LineEditor {
    pub fn new(completer: Completer, max_len: usize) -> LineEditor {
        LineEditor {
            completer,
            max_len,
            raw_mode: false,
        }
    }

    /// Put the terminal in raw mode for each line. Off for piped input.
    pub fn with_raw_mode(mut self, raw_mode: bool) -> LineEditor {
        self.raw_mode = raw_mode;
        self
    }

    pub fn read_line<R: Read, W: Write>(
        &mut self,
        prompt: &str,
        sources: &Sources,
        input: &mut R,
        out: &mut W,
    ) -> io::Result<ReadOutcome> {
        write!(out, "{}", prompt)?;
        out.flush()?;

        let raw = if self.raw_mode {
            match RawMode::enable() {
                Ok(r) => Some(r),
                Err(e) => {
                    debug!(error = %e, "raw mode unavailable");
                    None
                }
            }
        } else {
            None
        };

        let result = self.edit(prompt, sources, input, out);
        // Terminal mode goes back before anything else is written.
        drop(raw);

        let line = match result? {
            Some(line) => line,
            None => return Ok(ReadOutcome::Eof),
        };
        writeln!(out)?;
        out.flush()?;

        let trimmed = line.trim();
        let outcome = match trimmed {
            "" => ReadOutcome::Empty,
            "clear" => ReadOutcome::Meta(Meta::Clear),
            "deactivate" => ReadOutcome::Meta(Meta::Deactivate),
            _ => ReadOutcome::Line(line),
        };
        Ok(outcome)
    }

    /// Keystroke loop. None on end of input.
    fn edit<R: Read, W: Write>(
        &mut self,
        prompt: &str,
        sources: &Sources,
        input: &mut R,
        out: &mut W,
    ) -> io::Result<Option<String>> {
        let mut state = EditState::default();
        self.completer.reset();

        loop {
            let key = read_key(input)?;
            if !matches!(key, Key::Char(_)) {
                state.partial.clear();
            }
            match key {
                Key::Enter => break,
                Key::Eof => return Ok(None),
                Key::Char(b) => {
                    state.push_byte(b, self.max_len);
                    state.browse = None;
                }
                Key::Backspace => {
                    if state.cursor > 0 {
                        let prev = state.prev_boundary();
                        state.buf.replace_range(prev..state.cursor, "");
                        state.cursor = prev;
                    }
                }
                Key::Tab => {
                    match self
                        .completer
                        .tab(sources, &state.buf, state.cursor, Instant::now())
                    {
                        TabOutcome::Replace { start, end, text } => {
                            state.buf.replace_range(start..end, &text);
                            state.cursor = start + text.len();
                        }
                        TabOutcome::Listing(candidates) => {
                            write_listing(out, &candidates)?;
                        }
                        TabOutcome::Armed | TabOutcome::Nothing => {}
                    }
                }
                Key::Up => {
                    let len = sources.history.len();
                    if len > 0 {
                        let idx = match state.browse {
                            None => len - 1,
                            Some(i) => i.saturating_sub(1),
                        };
                        if let Some(entry) = sources.history.get(idx) {
                            state.set(entry);
                            state.browse = Some(idx);
                        }
                    }
                }
                Key::Down => {
                    if let Some(i) = state.browse {
                        match sources.history.get(i + 1) {
                            Some(entry) => {
                                state.set(entry);
                                state.browse = Some(i + 1);
                            }
                            None => {
                                state.set("");
                                state.browse = None;
                            }
                        }
                    }
                }
                Key::Left => {
                    state.cursor = state.prev_boundary();
                }
                Key::Right => match state.shown.take() {
                    Some((start, full)) if full != state.buf[start..] => {
                        state.buf.replace_range(start.., &full);
                        state.cursor = state.buf.len();
                    }
                    _ => {
                        state.cursor = state.next_boundary();
                    }
                },
                Key::Ignored => continue,
            }
            self.redraw(prompt, sources, &mut state, out)?;
        }

        Ok(Some(state.buf))
    }

    /// Prompt and buffer, then the dim remainder of the top candidate, then
    /// the cursor moved back to the insertion point.
    fn redraw<W: Write>(
        &self,
        prompt: &str,
        sources: &Sources,
        state: &mut EditState,
        out: &mut W,
    ) -> io::Result<()> {
        write!(out, "\r{}{}{}", ERASE_LINE, prompt, state.buf)?;

        state.shown = None;
        let mut back = state.buf[state.cursor..].chars().count();
        if state.cursor == state.buf.len() {
            if let Some((query, full)) = self.completer.suggestion(sources, &state.buf, state.cursor) {
                let rest = &full[query.token.len()..];
                write!(out, "{}{}{}", DIM, rest, RESET)?;
                back += rest.chars().count();
                state.shown = Some((query.start, full));
            }
        }
        if back > 0 {
            write!(out, "\x1b[{}D", back)?;
        }
        out.flush()
    }
}

fn write_listing<W: Write>(out: &mut W, candidates: &[String]) -> io::Result<()> {
    write!(out, "\n{}", DIM)?;
    for row in candidates.chunks(LISTING_COLUMNS) {
        writeln!(out, "{}", row.join("  "))?;
    }
    write!(out, "{}", RESET)
}
