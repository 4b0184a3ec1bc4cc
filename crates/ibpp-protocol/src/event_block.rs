//! Event parameter buffers.
//!
//! An event buffer lists the event names a client is interested in, each
//! followed by a 4-byte counter:
//!
//! ```text
//! [1] [len:1][name][count:4] [len:1][name][count:4] ...
//! ```
//!
//! New entries start with a counter of `u32::MAX`, so that the first
//! notification from the server only synchronizes the counters instead of
//! being reported as a burst of events.

use std::ops::Range;

use bytes::Buf;

use crate::codec::decode_text;
use crate::error::ProtocolError;

/// Longest event name accepted.
pub const MAX_EVENT_NAME_LEN: usize = 127;

/// Ceiling on the size of an event buffer.
pub const MAX_EVENT_BUFFER: usize = 32766;

const EVENT_BUFFER_VERSION: u8 = 1;
const UNINITIALIZED_COUNT: [u8; 4] = [0xFF; 4];

/// An event name/counter buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBlock {
    buf: Vec<u8>,
}

/// One entry of an [`EventBlock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEntry {
    /// Event name.
    pub name: String,
    /// Counter value.
    pub count: u32,
    /// Byte range of the whole entry (length prefix to counter).
    pub range: Range<usize>,
}

impl EventBlock {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Encoded size.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether no event has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.len() <= 1
    }

    /// Validate a name against the protocol limits.
    pub fn check_name(name: &str) -> Result<(), ProtocolError> {
        if name.is_empty() || name.len() > MAX_EVENT_NAME_LEN {
            return Err(ProtocolError::InvalidEventName(name.len()));
        }
        Ok(())
    }

    /// Append an event with an uninitialized counter.
    pub fn push(&mut self, name: &str) -> Result<(), ProtocolError> {
        Self::check_name(name)?;
        let needed = self.buf.len() + name.len() + 5;
        if needed > MAX_EVENT_BUFFER {
            return Err(ProtocolError::EventBufferOverflow {
                needed,
                limit: MAX_EVENT_BUFFER,
            });
        }
        if self.buf.is_empty() {
            self.buf.push(EVENT_BUFFER_VERSION);
        }
        self.buf.push(name.len() as u8);
        self.buf.extend_from_slice(name.as_bytes());
        self.buf.extend_from_slice(&UNINITIALIZED_COUNT);
        Ok(())
    }

    /// Remove the entry at `index`. Returns the removed entry.
    pub fn remove(&mut self, index: usize) -> Option<EventEntry> {
        let entry = self.entries().nth(index)?;
        self.buf.drain(entry.range.clone());
        Some(entry)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Iterate over the entries.
    pub fn entries(&self) -> impl Iterator<Item = EventEntry> + '_ {
        let mut pos = 1;
        std::iter::from_fn(move || {
            let len = usize::from(*self.buf.get(pos)?);
            let name = self.buf.get(pos + 1..pos + 1 + len)?;
            let mut count = self.buf.get(pos + 1 + len..pos + 5 + len)?;
            let entry = EventEntry {
                name: decode_text(name),
                count: count.get_u32_le(),
                range: pos..pos + 5 + len,
            };
            pos += 5 + len;
            Some(entry)
        })
    }

    /// Names, in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries().map(|e| e.name).collect()
    }

    /// Position of `name`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries().position(|e| e.name == name)
    }

    /// Overwrite the buffer's leading bytes with `src`, never growing it.
    ///
    /// This is how a notification delivers fresh counters: the server sends
    /// back a buffer of the same shape.
    pub fn overwrite_from(&mut self, src: &[u8]) {
        let n = src.len().min(self.buf.len());
        self.buf[..n].copy_from_slice(&src[..n]);
    }

    /// Copy the entry occupying `range` from `other`.
    pub fn copy_entry_from(&mut self, other: &EventBlock, range: Range<usize>) {
        if let (Some(dst), Some(src)) = (self.buf.get_mut(range.clone()), other.buf.get(range)) {
            dst.copy_from_slice(src);
        }
    }

    /// Set the counter of the entry at `index`.
    pub fn set_count(&mut self, index: usize, count: u32) -> bool {
        let Some(entry) = self.entries().nth(index) else {
            return false;
        };
        let at = entry.range.end - 4;
        self.buf[at..entry.range.end].copy_from_slice(&count.to_le_bytes());
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let mut block = EventBlock::new();
        block.push("AB").unwrap();
        assert_eq!(block.as_bytes(), &[1, 2, b'A', b'B', 0xFF, 0xFF, 0xFF, 0xFF]);
        let entry = block.entries().next().unwrap();
        assert_eq!(entry.count, u32::MAX);
        assert_eq!(entry.range, 1..8);
    }

    #[test]
    fn test_name_limits() {
        let mut block = EventBlock::new();
        assert!(block.push("").is_err());
        assert!(block.push(&"x".repeat(MAX_EVENT_NAME_LEN + 1)).is_err());
        block.push(&"x".repeat(MAX_EVENT_NAME_LEN)).unwrap();
    }

    #[test]
    fn test_overflow() {
        let mut block = EventBlock::new();
        let name = "n".repeat(100);
        let mut added = 0;
        while block.push(&name).is_ok() {
            added += 1;
        }
        assert_eq!(added, (MAX_EVENT_BUFFER - 1) / 105);
        assert!(matches!(
            block.push(&name),
            Err(ProtocolError::EventBufferOverflow { .. })
        ));
    }

    #[test]
    fn test_remove_and_names() {
        let mut block = EventBlock::new();
        block.push("one").unwrap();
        block.push("two").unwrap();
        block.push("three").unwrap();
        let removed = block.remove(1).unwrap();
        assert_eq!(removed.name, "two");
        assert_eq!(block.names(), vec!["one".to_string(), "three".to_string()]);
        assert_eq!(block.position("three"), Some(1));
    }

    #[test]
    fn test_counters_and_copy() {
        let mut primary = EventBlock::new();
        primary.push("E").unwrap();
        let mut results = primary.clone();
        assert!(results.set_count(0, 5));
        let range = results.entries().next().unwrap().range;
        primary.copy_entry_from(&results, range);
        assert_eq!(primary.entries().next().unwrap().count, 5);
    }

    #[test]
    fn test_overwrite_never_grows() {
        let mut block = EventBlock::new();
        block.push("E").unwrap();
        let long = vec![9u8; 64];
        block.overwrite_from(&long);
        assert_eq!(block.len(), 7);
    }
}
