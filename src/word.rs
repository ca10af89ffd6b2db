//! Timed-word sources
//!
//! A [`WordSource`] gives the matcher indexed access to a stream of
//! `(symbol, timestamp)` events with a discardable prefix: `fetch(n)`
//! makes index `n` readable (false at end of stream), `get(n)` reads it,
//! and `set_front(n)` hands the prefix below `n` back to the container so
//! its storage can be released. `set_front` must be monotone and `get`
//! may only be called inside the fetched window; both are contracts, not
//! recoverable errors.
//!
//! [`LazyWord`] streams from a reader in one of two formats:
//! - ASCII: one event per line, `<char> <decimal>`, absolute
//!   non-decreasing timestamps;
//! - binary: a symbol byte followed by an 8-byte little-endian IEEE-754
//!   double, no framing.

use std::collections::VecDeque;
use std::io::{BufRead, ErrorKind};

use thiserror::Error;

use crate::automaton::Alphabet;

/// One stream event.
pub type Event = (Alphabet, f64);

/// Failures surfaced by a word source. End of stream is *not* an error;
/// `fetch` reports it by returning `false`.
#[derive(Debug, Error)]
pub enum WordError {
    /// A record could not be parsed.
    #[error("malformed timed-word record {index}: {reason}")]
    Malformed {
        /// Zero-based index of the offending record.
        index: usize,
        /// What went wrong.
        reason: String,
    },
    /// The underlying reader failed.
    #[error("timed-word read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Indexed, windowed access to a timed word.
pub trait WordSource {
    /// Make index `n` readable. `Ok(false)` means the stream ended
    /// before `n`.
    fn fetch(&mut self, n: usize) -> Result<bool, WordError>;

    /// Read index `n`. Panics outside the fetched, undiscarded window.
    fn get(&self, n: usize) -> Event;

    /// Discard the prefix strictly below `n`. Must be monotone; going
    /// backwards panics.
    fn set_front(&mut self, n: usize);

    /// Total length, once known (after the stream ended).
    fn len(&self) -> Option<usize>;
}

/// An in-memory timed word.
#[derive(Clone, Debug)]
pub struct VecWord {
    events: Vec<Event>,
    front: usize,
}

impl VecWord {
    /// Wrap a complete in-memory word.
    pub fn new(events: Vec<Event>) -> Self {
        VecWord { events, front: 0 }
    }
}

impl WordSource for VecWord {
    fn fetch(&mut self, n: usize) -> Result<bool, WordError> {
        Ok(n < self.events.len())
    }

    fn get(&self, n: usize) -> Event {
        assert!(n >= self.front, "read below the discarded front");
        self.events[n]
    }

    fn set_front(&mut self, n: usize) {
        assert!(n >= self.front, "set_front must be monotone");
        self.front = n;
    }

    fn len(&self) -> Option<usize> {
        Some(self.events.len())
    }
}

/// Record encoding of a [`LazyWord`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WordFormat {
    /// `<char> <decimal>` per line.
    Ascii,
    /// Symbol byte + little-endian f64.
    Binary,
}

/// A lazily read timed word backed by any reader. Events are buffered in
/// a deque whose prefix is released by `set_front`.
#[derive(Debug)]
pub struct LazyWord<R> {
    reader: R,
    format: WordFormat,
    window: VecDeque<Event>,
    front: usize,
    known_len: Option<usize>,
}

impl<R: BufRead> LazyWord<R> {
    /// Stream events from `reader` in the given format.
    pub fn new(reader: R, format: WordFormat) -> Self {
        LazyWord { reader, format, window: VecDeque::new(), front: 0, known_len: None }
    }

    fn next_index(&self) -> usize {
        self.front + self.window.len()
    }

    /// Read one record; `Ok(None)` at end of stream.
    fn read_record(&mut self) -> Result<Option<Event>, WordError> {
        let index = self.next_index();
        match self.format {
            WordFormat::Ascii => {
                let mut line = String::new();
                loop {
                    line.clear();
                    if self.reader.read_line(&mut line)? == 0 {
                        return Ok(None);
                    }
                    if !line.trim().is_empty() {
                        break;
                    }
                }
                let mut tokens = line.split_whitespace();
                let symbol = tokens.next().ok_or_else(|| WordError::Malformed {
                    index,
                    reason: "missing symbol".into(),
                })?;
                if symbol.len() != 1 || !symbol.is_ascii() {
                    return Err(WordError::Malformed {
                        index,
                        reason: format!("symbol must be one ASCII character, got `{symbol}`"),
                    });
                }
                let stamp = tokens.next().ok_or_else(|| WordError::Malformed {
                    index,
                    reason: "missing timestamp".into(),
                })?;
                let t: f64 = stamp.parse().map_err(|e| WordError::Malformed {
                    index,
                    reason: format!("bad timestamp `{stamp}`: {e}"),
                })?;
                if tokens.next().is_some() {
                    return Err(WordError::Malformed {
                        index,
                        reason: "trailing garbage after timestamp".into(),
                    });
                }
                Ok(Some((symbol.as_bytes()[0], t)))
            }
            WordFormat::Binary => {
                let mut sym = [0u8; 1];
                match self.reader.read_exact(&mut sym) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
                    Err(e) => return Err(e.into()),
                }
                let mut stamp = [0u8; 8];
                self.reader.read_exact(&mut stamp).map_err(|e| {
                    if e.kind() == ErrorKind::UnexpectedEof {
                        WordError::Malformed { index, reason: "truncated binary record".into() }
                    } else {
                        WordError::Io(e)
                    }
                })?;
                Ok(Some((sym[0], f64::from_le_bytes(stamp))))
            }
        }
    }
}

impl<R: BufRead> WordSource for LazyWord<R> {
    fn fetch(&mut self, n: usize) -> Result<bool, WordError> {
        if n < self.front {
            return Ok(false);
        }
        if let Some(len) = self.known_len {
            return Ok(n < len);
        }
        while self.next_index() <= n {
            match self.read_record()? {
                Some(ev) => self.window.push_back(ev),
                None => {
                    self.known_len = Some(self.next_index());
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn get(&self, n: usize) -> Event {
        assert!(n >= self.front, "read below the discarded front");
        self.window[n - self.front]
    }

    fn set_front(&mut self, n: usize) {
        assert!(n >= self.front, "set_front must be monotone");
        let buffered = (n - self.front).min(self.window.len());
        self.window.drain(..buffered);
        let mut unread = (n - self.front) - buffered;
        self.front = n;
        // Skip records that were never buffered.
        while unread > 0 && self.known_len.is_none() {
            match self.read_record() {
                Ok(Some(_)) => unread -= 1,
                _ => {
                    self.known_len = Some(self.front - unread);
                    break;
                }
            }
        }
    }

    fn len(&self) -> Option<usize> {
        self.known_len
    }
}
