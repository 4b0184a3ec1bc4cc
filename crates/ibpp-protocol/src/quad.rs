//! Eight-byte identifiers for blobs and arrays.

use std::fmt;

/// Opaque 8-byte id of a blob or array, assigned by the server.
///
/// An all-zero quad means "no id".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Quad(pub [u8; 8]);

impl Quad {
    /// The empty id.
    pub const ZERO: Self = Self([0; 8]);

    /// Build from a high and a low 32-bit word.
    #[must_use]
    pub fn from_parts(high: i32, low: u32) -> Self {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&high.to_le_bytes());
        bytes[4..].copy_from_slice(&low.to_le_bytes());
        Self(bytes)
    }

    /// Build from the first 8 bytes of a slice.
    #[must_use]
    pub fn from_slice(src: &[u8]) -> Option<Self> {
        let bytes: [u8; 8] = src.get(..8)?.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Whether the id is unassigned.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 8]
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Debug for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Quad({self})")
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
