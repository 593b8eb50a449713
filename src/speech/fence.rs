//! Code-fence filtering for the incoming text stream
//!
//! Fenced code blocks (triple backticks) are never spoken. The stream
//! arrives in arbitrary chunks, so a fence marker can be split across two
//! chunks; up to two trailing backticks are carried over and re-examined
//! when the next chunk arrives.

/// Fence marker
const FENCE: &str = "```";

/// What the filter saw in a pushed chunk, in stream order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenceEvent {
    /// Speakable text outside any fence
    Text(String),
    /// A fence opened; text that follows is code until it closes
    Enter,
    /// A fence closed
    Exit,
}

/// Tracks fence state across chunk boundaries
#[derive(Debug, Default)]
pub struct CodeFenceFilter {
    in_code_block: bool,
    carry: String,
}

impl CodeFenceFilter {
    /// Create a new filter, outside any fence
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the stream is currently inside a fence
    #[must_use]
    pub const fn in_code_block(&self) -> bool {
        self.in_code_block
    }

    /// Process one chunk, returning speakable text and fence transitions
    /// in the order they occur
    pub fn push(&mut self, chunk: &str) -> Vec<FenceEvent> {
        let mut events = Vec::new();
        let data = std::mem::take(&mut self.carry) + chunk;
        let mut rest = data.as_str();

        while !rest.is_empty() {
            if let Some(idx) = rest.find(FENCE) {
                if !self.in_code_block && idx > 0 {
                    events.push(FenceEvent::Text(rest[..idx].to_string()));
                }
                self.in_code_block = !self.in_code_block;
                events.push(if self.in_code_block {
                    FenceEvent::Enter
                } else {
                    FenceEvent::Exit
                });
                rest = &rest[idx + FENCE.len()..];
            } else {
                // No complete marker. A partial one (one or two trailing
                // backticks) may finish in the next chunk, so hold it back.
                let trailing = rest.chars().rev().take_while(|&c| c == '`').count();
                let keep = rest.len() - trailing;
                if !self.in_code_block && keep > 0 {
                    events.push(FenceEvent::Text(rest[..keep].to_string()));
                }
                self.carry = rest[keep..].to_string();
                break;
            }
        }

        debug_assert!(self.carry.len() < FENCE.len());
        events
    }

    /// Release any held partial marker as plain text (end of stream)
    pub fn finish(&mut self) -> Option<FenceEvent> {
        if self.carry.is_empty() || self.in_code_block {
            self.carry.clear();
            return None;
        }
        Some(FenceEvent::Text(std::mem::take(&mut self.carry)))
    }

    /// Reset to the initial state
    pub fn reset(&mut self) {
        self.in_code_block = false;
        self.carry.clear();
    }
}
