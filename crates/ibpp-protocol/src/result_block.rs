//! Result block decoding.
//!
//! Information requests (database, statement, blob and service info) are
//! answered with a buffer of entries terminated by [`info::END`]:
//!
//! ```text
//! [tag:1][len:2 vax][value:len] [tag:1][len:2 vax][value:len] ... [END]
//! ```
//!
//! Lookups scan linearly. A missing tag is reported as `None` by the
//! `find_*` methods and as [`ProtocolError::FieldNotFound`] by the value
//! accessors, so callers can tell "absent" apart from zero.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{decode_text, read_len16, vax_integer};
use crate::error::ProtocolError;
use crate::info;

/// A read-only information response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultBlock {
    buf: Bytes,
}

impl ResultBlock {
    /// Wrap a buffer filled by the server.
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self { buf: buf.into() }
    }

    /// Start building a block entry by entry.
    #[must_use]
    pub fn builder() -> ResultBlockBuilder {
        ResultBlockBuilder::default()
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Tag of the first entry, if any.
    #[must_use]
    pub fn first_tag(&self) -> Option<u8> {
        self.buf.first().copied()
    }

    /// Offset of the first entry tagged `tag`.
    #[must_use]
    pub fn find_token(&self, tag: u8) -> Option<usize> {
        self.scan(0, self.buf.len(), tag)
    }

    /// Offset of the entry tagged `subtag` nested inside the entry tagged `tag`.
    #[must_use]
    pub fn find_subtoken(&self, tag: u8, subtag: u8) -> Option<usize> {
        let outer = self.find_token(tag)?;
        let len = read_len16(&self.buf, outer + 1)?;
        let start = outer + 3;
        let end = (start + len).min(self.buf.len());
        self.scan(start, end, subtag)
    }

    fn scan(&self, mut pos: usize, end: usize, tag: u8) -> Option<usize> {
        while pos < end {
            let current = self.buf[pos];
            if current == info::END || current == info::TRUNCATED {
                return None;
            }
            if current == tag {
                return Some(pos);
            }
            let len = read_len16(&self.buf, pos + 1)?;
            pos += len + 3;
        }
        None
    }

    /// Value bytes of the entry at `pos`.
    fn value_at(&self, pos: usize) -> Result<&[u8], ProtocolError> {
        let len = read_len16(&self.buf, pos + 1).ok_or(ProtocolError::Truncated { offset: pos })?;
        self.buf
            .get(pos + 3..pos + 3 + len)
            .ok_or(ProtocolError::Truncated { offset: pos })
    }

    /// Integer value of `tag`.
    pub fn get_value(&self, tag: u8) -> Result<i64, ProtocolError> {
        let pos = self
            .find_token(tag)
            .ok_or(ProtocolError::FieldNotFound { tag, subtag: None })?;
        Ok(vax_integer(self.value_at(pos)?))
    }

    /// Integer value of `subtag` inside `tag`.
    pub fn get_subvalue(&self, tag: u8, subtag: u8) -> Result<i64, ProtocolError> {
        let pos = self
            .find_subtoken(tag, subtag)
            .ok_or(ProtocolError::FieldNotFound {
                tag,
                subtag: Some(subtag),
            })?;
        Ok(vax_integer(self.value_at(pos)?))
    }

    /// Sum of the counters in a per-table count entry.
    ///
    /// The value is a sequence of 6-byte records: a 2-byte table id
    /// followed by a 4-byte count.
    pub fn get_count_value(&self, tag: u8) -> Result<i64, ProtocolError> {
        let pos = self
            .find_token(tag)
            .ok_or(ProtocolError::FieldNotFound { tag, subtag: None })?;
        Ok(self
            .value_at(pos)?
            .chunks_exact(6)
            .map(|record| vax_integer(&record[2..6]))
            .sum())
    }

    /// Boolean value of `tag` (any non-zero value is true).
    pub fn get_bool(&self, tag: u8) -> Result<bool, ProtocolError> {
        self.get_value(tag).map(|v| v != 0)
    }

    /// String value of `tag`.
    pub fn get_string(&self, tag: u8) -> Result<String, ProtocolError> {
        let pos = self
            .find_token(tag)
            .ok_or(ProtocolError::FieldNotFound { tag, subtag: None })?;
        Ok(decode_text(self.value_at(pos)?))
    }

    /// Iterate over top-level entries as `(tag, value)` pairs.
    pub fn entries(&self) -> Entries<'_> {
        Entries { buf: &self.buf, pos: 0 }
    }
}

/// Iterator over the top-level entries of a [`ResultBlock`].
#[derive(Debug)]
pub struct Entries<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let tag = *self.buf.get(self.pos)?;
        if tag == info::END || tag == info::TRUNCATED {
            return None;
        }
        let len = read_len16(self.buf, self.pos + 1)?;
        let value = self.buf.get(self.pos + 3..self.pos + 3 + len)?;
        self.pos += len + 3;
        Some((tag, value))
    }
}

/// Builder producing well-formed result blocks.
///
/// Transports use it to answer information requests; tests use it to
/// fabricate server answers.
#[derive(Debug, Default)]
pub struct ResultBlockBuilder {
    buf: BytesMut,
}

impl ResultBlockBuilder {
    /// Append an entry with raw value bytes.
    #[must_use]
    pub fn raw(mut self, tag: u8, value: &[u8]) -> Self {
        self.buf.put_u8(tag);
        self.buf.put_u16_le(value.len() as u16);
        self.buf.put_slice(value);
        self
    }

    /// Append a 4-byte integer entry.
    #[must_use]
    pub fn int(self, tag: u8, value: i32) -> Self {
        self.raw(tag, &value.to_le_bytes())
    }

    /// Append a single-byte integer entry.
    #[must_use]
    pub fn byte(self, tag: u8, value: u8) -> Self {
        self.raw(tag, &[value])
    }

    /// Append a string entry.
    #[must_use]
    pub fn string(self, tag: u8, value: &str) -> Self {
        self.raw(tag, value.as_bytes())
    }

    /// Append a per-table count entry from `(table_id, count)` pairs.
    #[must_use]
    pub fn counts(self, tag: u8, counts: &[(u16, u32)]) -> Self {
        let mut value = Vec::with_capacity(counts.len() * 6);
        for (table, count) in counts {
            value.put_u16_le(*table);
            value.put_u32_le(*count);
        }
        self.raw(tag, &value)
    }

    /// Append an entry whose value is itself a list of entries.
    #[must_use]
    pub fn nested(self, tag: u8, inner: ResultBlockBuilder) -> Self {
        self.raw(tag, &inner.buf)
    }

    /// Append raw bytes without an entry header.
    #[must_use]
    pub fn bytes(mut self, raw: &[u8]) -> Self {
        self.buf.put_slice(raw);
        self
    }

    /// Terminate with [`info::END`] and freeze.
    #[must_use]
    pub fn build(mut self) -> ResultBlock {
        self.buf.put_u8(info::END);
        ResultBlock {
            buf: self.buf.freeze(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::info::{db, req, sql};

    #[test]
    fn test_find_token_skips_entries() {
        let block = ResultBlock::builder()
            .int(db::PAGE_SIZE, 4096)
            .byte(db::ODS_VERSION, 11)
            .build();
        assert_eq!(block.find_token(db::PAGE_SIZE), Some(0));
        assert_eq!(block.find_token(db::ODS_VERSION), Some(7));
        assert_eq!(block.find_token(db::SQL_DIALECT), None);
    }

    #[test]
    fn test_get_value_and_missing_field() {
        let block = ResultBlock::builder()
            .int(db::PAGE_SIZE, 8192)
            .byte(db::SQL_DIALECT, 3)
            .build();
        assert_eq!(block.get_value(db::PAGE_SIZE).unwrap(), 8192);
        assert_eq!(block.get_value(db::SQL_DIALECT).unwrap(), 3);
        assert_eq!(
            block.get_value(db::ALLOCATION),
            Err(ProtocolError::FieldNotFound {
                tag: db::ALLOCATION,
                subtag: None
            })
        );
    }

    #[test]
    fn test_zero_is_not_absent() {
        let block = ResultBlock::builder().int(db::FORCED_WRITES, 0).build();
        assert_eq!(block.get_value(db::FORCED_WRITES).unwrap(), 0);
        assert!(!block.get_bool(db::FORCED_WRITES).unwrap());
    }

    #[test]
    fn test_subtoken_lookup() {
        let records = ResultBlock::builder()
            .int(req::UPDATE_COUNT, 4)
            .int(req::SELECT_COUNT, 9);
        let block = ResultBlock::builder()
            .byte(sql::STMT_TYPE, 3)
            .nested(sql::RECORDS, records)
            .build();
        assert_eq!(block.get_subvalue(sql::RECORDS, req::UPDATE_COUNT).unwrap(), 4);
        assert_eq!(block.get_subvalue(sql::RECORDS, req::SELECT_COUNT).unwrap(), 9);
        assert!(block.get_subvalue(sql::RECORDS, req::DELETE_COUNT).is_err());
    }

    #[test]
    fn test_count_value_sums_tables() {
        let block = ResultBlock::builder()
            .counts(db::INSERT_COUNT, &[(128, 3), (129, 5), (140, 1)])
            .build();
        assert_eq!(block.get_count_value(db::INSERT_COUNT).unwrap(), 9);
    }

    #[test]
    fn test_get_string() {
        let block = ResultBlock::builder()
            .string(crate::info::svc::SERVER_VERSION, "LI-V2.5.9")
            .build();
        assert_eq!(
            block.get_string(crate::info::svc::SERVER_VERSION).unwrap(),
            "LI-V2.5.9"
        );
    }

    #[test]
    fn test_scan_stops_on_truncated_buffer() {
        // Entry claims 200 bytes but the buffer ends early.
        let block = ResultBlock::new(vec![db::PAGE_SIZE, 200, 0, 1, 2]);
        assert_eq!(block.find_token(db::ODS_VERSION), None);
        assert!(matches!(
            block.get_value(db::PAGE_SIZE),
            Err(ProtocolError::Truncated { offset: 0 })
        ));
    }

    #[test]
    fn test_entries_iterates_in_order() {
        let block = ResultBlock::builder()
            .string(db::USER_NAMES, "A")
            .string(db::USER_NAMES, "B")
            .build();
        let tags: Vec<_> = block.entries().map(|(t, v)| (t, v.to_vec())).collect();
        assert_eq!(
            tags,
            vec![(db::USER_NAMES, b"A".to_vec()), (db::USER_NAMES, b"B".to_vec())]
        );
    }
}
