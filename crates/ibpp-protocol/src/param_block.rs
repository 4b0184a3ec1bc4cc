//! Parameter block builders (DPB, TPB, SPB).
//!
//! A parameter block is an append-only tag-length-value buffer handed to the
//! server together with an attach, transaction start or service call. The
//! first byte of a DPB or TPB is a version tag, written once when the block
//! goes from empty to non-empty. Service blocks carry no implicit version;
//! their first byte is the opcode the caller inserts.
//!
//! ```text
//! DPB: [version] [tag][len:1][value] [tag][len:1][value] ...
//! TPB: [version] [flag] [flag] [len:1][table] [flag] ...
//! SPB: [opcode]  [tag][len:1|2][value] [tag][i32] ...
//! ```

use std::fmt;
use std::marker::PhantomData;

use bytes::{BufMut, BytesMut};

use crate::codec::{put_vax_i16, put_vax_i32};
use crate::error::ProtocolError;
use crate::tags::{dpb, tpb};

/// Capacity step used when a block grows.
pub const BUFFER_INCREMENT: usize = 128;

/// Marker trait describing one family of parameter block.
pub trait BlockKind: private::Sealed {
    /// Version byte written on first insertion, if any.
    const VERSION: Option<u8>;
    /// Short name used in diagnostics.
    const NAME: &'static str;
}

/// Database parameter block marker.
#[derive(Debug, Clone, Copy)]
pub struct Dpb;

/// Transaction parameter block marker.
#[derive(Debug, Clone, Copy)]
pub struct Tpb;

/// Service parameter block marker.
#[derive(Debug, Clone, Copy)]
pub struct Spb;

impl BlockKind for Dpb {
    const VERSION: Option<u8> = Some(dpb::VERSION1);
    const NAME: &'static str = "DPB";
}

impl BlockKind for Tpb {
    const VERSION: Option<u8> = Some(tpb::VERSION3);
    const NAME: &'static str = "TPB";
}

impl BlockKind for Spb {
    const VERSION: Option<u8> = None;
    const NAME: &'static str = "SPB";
}

mod private {
    pub trait Sealed {}
    impl Sealed for super::Dpb {}
    impl Sealed for super::Tpb {}
    impl Sealed for super::Spb {}
}

/// Width of a string length prefix in a service block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    /// One byte, up to 255 bytes of data.
    Byte,
    /// Two vax bytes, up to 65535 bytes of data.
    Word,
}

impl LengthPrefix {
    const fn max(self) -> usize {
        match self {
            Self::Byte => u8::MAX as usize,
            Self::Word => u16::MAX as usize,
        }
    }
}

/// A growable parameter block.
#[derive(Clone)]
pub struct ParamBlock<K: BlockKind> {
    buf: BytesMut,
    _kind: PhantomData<K>,
}

impl<K: BlockKind> ParamBlock<K> {
    /// Create an empty block. Nothing is allocated until the first insert.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            _kind: PhantomData,
        }
    }

    /// Encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been inserted since creation or the last reset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Currently reserved capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Release the buffer. The next insert starts a fresh block.
    pub fn reset(&mut self) {
        self.buf = BytesMut::new();
    }

    /// Make room for `needed` more bytes, writing the version tag if the
    /// block is empty.
    fn grow(&mut self, needed: usize) {
        let version = usize::from(self.buf.is_empty() && K::VERSION.is_some());
        let required = self.buf.len() + needed + version;
        if required > self.buf.capacity() {
            let steps = required.div_ceil(BUFFER_INCREMENT);
            let target = steps * BUFFER_INCREMENT;
            self.buf.reserve(target - self.buf.len());
        }
        if self.buf.is_empty() {
            if let Some(v) = K::VERSION {
                self.buf.put_u8(v);
            }
        }
    }

    fn check_len(tag: u8, len: usize, max: usize) -> Result<(), ProtocolError> {
        if len > max {
            return Err(ProtocolError::ValueTooLong { tag, len, max });
        }
        Ok(())
    }
}

impl<K: BlockKind> Default for ParamBlock<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: BlockKind> fmt::Debug for ParamBlock<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(K::NAME).field("bytes", &self.buf.as_ref()).finish()
    }
}

impl ParamBlock<Dpb> {
    /// Insert a string cluster with a 1-byte length.
    pub fn insert_str(&mut self, tag: u8, value: &str) -> Result<(), ProtocolError> {
        Self::check_len(tag, value.len(), u8::MAX as usize)?;
        self.grow(value.len() + 2);
        self.buf.put_u8(tag);
        self.buf.put_u8(value.len() as u8);
        self.buf.put_slice(value.as_bytes());
        Ok(())
    }

    /// Insert a 2-byte integer cluster.
    pub fn insert_i16(&mut self, tag: u8, value: i16) {
        self.grow(4);
        self.buf.put_u8(tag);
        self.buf.put_u8(2);
        put_vax_i16(&mut self.buf, value);
    }

    /// Insert a 4-byte integer cluster.
    pub fn insert_i32(&mut self, tag: u8, value: i32) {
        self.grow(6);
        self.buf.put_u8(tag);
        self.buf.put_u8(4);
        put_vax_i32(&mut self.buf, value);
    }

    /// Insert a boolean cluster (one byte, 0 or 1).
    pub fn insert_bool(&mut self, tag: u8, value: bool) {
        self.insert_byte(tag, u8::from(value));
    }

    /// Insert a single-byte cluster.
    pub fn insert_byte(&mut self, tag: u8, value: u8) {
        self.grow(3);
        self.buf.put_u8(tag);
        self.buf.put_u8(1);
        self.buf.put_u8(value);
    }
}

impl ParamBlock<Tpb> {
    /// Insert a bare flag.
    pub fn insert(&mut self, flag: u8) {
        self.grow(1);
        self.buf.put_u8(flag);
    }

    /// Insert a length-prefixed table name, as used by table reservations.
    pub fn insert_str(&mut self, value: &str) -> Result<(), ProtocolError> {
        Self::check_len(tpb::LOCK_WRITE, value.len(), u8::MAX as usize)?;
        self.grow(value.len() + 1);
        self.buf.put_u8(value.len() as u8);
        self.buf.put_slice(value.as_bytes());
        Ok(())
    }
}

impl ParamBlock<Spb> {
    /// Insert a bare opcode.
    pub fn insert(&mut self, opcode: u8) {
        self.grow(1);
        self.buf.put_u8(opcode);
    }

    /// Insert a string with a 1- or 2-byte length prefix.
    pub fn insert_string(
        &mut self,
        tag: u8,
        prefix: LengthPrefix,
        value: &str,
    ) -> Result<(), ProtocolError> {
        Self::check_len(tag, value.len(), prefix.max())?;
        let width = match prefix {
            LengthPrefix::Byte => 1,
            LengthPrefix::Word => 2,
        };
        self.grow(1 + width + value.len());
        self.buf.put_u8(tag);
        match prefix {
            LengthPrefix::Byte => self.buf.put_u8(value.len() as u8),
            LengthPrefix::Word => self.buf.put_u16_le(value.len() as u16),
        }
        self.buf.put_slice(value.as_bytes());
        Ok(())
    }

    /// Insert a tag followed by a single data byte.
    pub fn insert_byte(&mut self, tag: u8, value: u8) {
        self.grow(2);
        self.buf.put_u8(tag);
        self.buf.put_u8(value);
    }

    /// Insert a tag followed by a 4-byte vax integer.
    pub fn insert_quad(&mut self, tag: u8, value: i32) {
        self.grow(5);
        self.buf.put_u8(tag);
        put_vax_i32(&mut self.buf, value);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tags::spb;

    #[test]
    fn test_dpb_version_written_once() {
        let mut block = ParamBlock::<Dpb>::new();
        assert!(block.is_empty());
        block.insert_str(dpb::USER_NAME, "ann").unwrap();
        block.insert_i16(dpb::NUM_BUFFERS, 300);
        assert_eq!(
            block.as_bytes(),
            &[dpb::VERSION1, dpb::USER_NAME, 3, b'a', b'n', b'n', dpb::NUM_BUFFERS, 2, 0x2C, 0x01]
        );
    }

    #[test]
    fn test_dpb_bool_and_byte() {
        let mut block = ParamBlock::<Dpb>::new();
        block.insert_bool(dpb::FORCE_WRITE, true);
        block.insert_byte(dpb::NO_RESERVE, 7);
        assert_eq!(
            block.as_bytes(),
            &[dpb::VERSION1, dpb::FORCE_WRITE, 1, 1, dpb::NO_RESERVE, 1, 7]
        );
    }

    #[test]
    fn test_dpb_string_too_long() {
        let mut block = ParamBlock::<Dpb>::new();
        let long = "x".repeat(256);
        let err = block.insert_str(dpb::PASSWORD, &long).unwrap_err();
        assert!(matches!(err, ProtocolError::ValueTooLong { len: 256, .. }));
        assert!(block.is_empty());
    }

    #[test]
    fn test_tpb_flags_and_table() {
        let mut block = ParamBlock::<Tpb>::new();
        block.insert(tpb::WRITE);
        block.insert(tpb::LOCK_READ);
        block.insert_str("T1").unwrap();
        block.insert(tpb::SHARED);
        assert_eq!(
            block.as_bytes(),
            &[tpb::VERSION3, tpb::WRITE, tpb::LOCK_READ, 2, b'T', b'1', tpb::SHARED]
        );
    }

    #[test]
    fn test_spb_has_no_implicit_version() {
        let mut block = ParamBlock::<Spb>::new();
        block.insert(spb::VERSION);
        block.insert(spb::CURRENT_VERSION);
        block
            .insert_string(spb::USER_NAME, LengthPrefix::Byte, "sa")
            .unwrap();
        block
            .insert_string(spb::DBNAME, LengthPrefix::Word, "db")
            .unwrap();
        block.insert_quad(spb::OPTIONS, 0x0102);
        block.insert_byte(spb::PRP_WRITE_MODE, spb::PRP_WM_SYNC);
        assert_eq!(
            block.as_bytes(),
            &[
                2, 2, 28, 2, b's', b'a', 106, 2, 0, b'd', b'b', 108, 0x02, 0x01, 0, 0, 12, 38
            ]
        );
    }

    #[test]
    fn test_growth_in_fixed_increments() {
        let mut block = ParamBlock::<Tpb>::new();
        block.insert(tpb::READ);
        for _ in 0..200 {
            block.insert(tpb::WAIT);
        }
        assert_eq!(block.len(), 202);
        assert!(block.capacity() >= 202);
        assert_eq!(block.as_bytes()[0], tpb::VERSION3);
    }

    #[test]
    fn test_reset_restarts_version() {
        let mut block = ParamBlock::<Dpb>::new();
        block.insert_byte(dpb::NO_RESERVE, 1);
        block.reset();
        assert!(block.is_empty());
        assert_eq!(block.capacity(), 0);
        block.insert_byte(dpb::NO_RESERVE, 0);
        assert_eq!(block.as_bytes(), &[dpb::VERSION1, dpb::NO_RESERVE, 1, 0]);
    }
}
