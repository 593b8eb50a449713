//! Accumulation buffer for not-yet-emitted speakable text
//!
//! Segments are cut from the front of the buffer as boundaries are found.
//! Rather than reallocating on every cut, the buffer keeps a cursor into an
//! append-only string and compacts once the dead prefix grows large.

/// Compact once the consumed prefix exceeds this many bytes and at least
/// half of the allocation
const COMPACT_THRESHOLD_BYTES: usize = 4096;

/// Append-only text buffer with a consume cursor
#[derive(Debug, Default)]
pub struct AccumulationBuffer {
    text: String,
    start: usize,
}

impl AccumulationBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of text
    pub fn push_str(&mut self, chunk: &str) {
        self.text.push_str(chunk);
    }

    /// View the unconsumed text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text[self.start..]
    }

    /// Whether any unconsumed text remains (ignoring whitespace)
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.as_str().trim().is_empty()
    }

    /// Count of whitespace-delimited words in the unconsumed text
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.as_str().split_whitespace().count()
    }

    /// Consume `len` bytes from the front, returning them trimmed.
    ///
    /// Leading whitespace on the remainder is also consumed so the next
    /// segment never starts with a space. `len` must fall on a char
    /// boundary of the unconsumed view.
    pub fn consume(&mut self, len: usize) -> String {
        debug_assert!(self.as_str().is_char_boundary(len));
        let segment = self.as_str()[..len].trim().to_string();
        self.start += len;

        let rest = self.as_str();
        let skip = rest.len() - rest.trim_start().len();
        self.start += skip;

        self.maybe_compact();
        segment
    }

    /// Consume everything, returning it trimmed
    pub fn take_all(&mut self) -> String {
        let remaining = self.as_str().len();
        self.consume(remaining)
    }

    /// Reset to empty
    pub fn clear(&mut self) {
        self.text.clear();
        self.start = 0;
    }

    fn maybe_compact(&mut self) {
        if self.start >= COMPACT_THRESHOLD_BYTES && self.start * 2 >= self.text.len() {
            self.text.drain(..self.start);
            self.start = 0;
        }
    }
}
