//! Protocol-level error types.

use thiserror::Error;

/// Errors raised while building or decoding protocol buffers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// A requested information item is not present in a result block.
    #[error("field {tag} not found in result block")]
    FieldNotFound {
        /// Information item tag.
        tag: u8,
        /// Optional sub-item tag.
        subtag: Option<u8>,
    },

    /// A string is too long for its length prefix.
    #[error("value for tag {tag} is {len} bytes, limit is {max}")]
    ValueTooLong {
        /// Cluster tag.
        tag: u8,
        /// Actual length in bytes.
        len: usize,
        /// Maximum length the prefix can express.
        max: usize,
    },

    /// A buffer ended before an entry it announced.
    #[error("buffer truncated at offset {offset}")]
    Truncated {
        /// Offset of the incomplete entry.
        offset: usize,
    },

    /// An unknown SQL type code was encountered.
    #[error("unknown SQL type code {0}")]
    UnknownSqlType(i16),

    /// An unknown BLR data type was encountered.
    #[error("unknown BLR data type {0}")]
    UnknownBlrType(u8),

    /// The server answered an information request with an unexpected item.
    #[error("unexpected information item {found}, expected {expected}")]
    UnexpectedItem {
        /// Item tag the caller asked for.
        expected: u8,
        /// Item tag actually found.
        found: u8,
    },

    /// An event name is empty or too long.
    #[error("invalid event name length {0}")]
    InvalidEventName(usize),

    /// Adding to an event buffer would exceed the protocol ceiling.
    #[error("event buffer would grow to {needed} bytes, limit is {limit}")]
    EventBufferOverflow {
        /// Size the buffer would have reached.
        needed: usize,
        /// Protocol ceiling.
        limit: usize,
    },

    /// Array bounds describe more elements or bytes than fit in memory.
    #[error("array bounds [{lower}:{upper}] describe a slice too large to address")]
    ArrayTooLarge {
        /// Lowest index of the offending dimension.
        lower: i32,
        /// Highest index of the offending dimension.
        upper: i32,
    },
}
