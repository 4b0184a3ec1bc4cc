//! Row locators.

use std::fmt;

/// The value of a hidden `RDB$DB_KEY` column.
///
/// A key is opaque binary data, 8 bytes per table involved in the query.
/// It reads and writes through fixed-width text columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DbKey(Vec<u8>);

impl DbKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key width in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Each 8-byte group renders as two hex words (`relation:record`),
/// groups separated by `-`.
impl fmt::Display for DbKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, group) in self.0.chunks(8).enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            let (high, low) = group.split_at(group.len().min(4));
            for b in high {
                write!(f, "{b:02x}")?;
            }
            if !low.is_empty() {
                f.write_str(":")?;
                for b in low {
                    write!(f, "{b:02x}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups() {
        let key = DbKey::new(vec![0, 0, 0, 0x81, 0, 0, 0, 1, 0, 0, 0, 0x82, 0, 0, 0, 2]);
        assert_eq!(key.to_string(), "00000081:00000001-00000082:00000002");
        assert_eq!(key.len(), 16);
    }
}
