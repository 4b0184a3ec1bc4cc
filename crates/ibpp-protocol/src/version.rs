//! SQL dialects and on-disk structure versions.

use std::fmt;

/// SQL dialect of an attachment.
///
/// Dialect 1 is the legacy InterBase 5 behavior (no DATE-only or TIME
/// types, DOUBLE-backed NUMERICs). Dialect 3 is the modern default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// Legacy dialect.
    V1,
    /// Current dialect.
    #[default]
    V3,
}

impl Dialect {
    /// Map a numeric dialect. Only 1 and 3 are valid.
    #[must_use]
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::V1),
            3 => Some(Self::V3),
            _ => None,
        }
    }

    /// Numeric value sent to the server.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::V1 => 1,
            Self::V3 => 3,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// On-disk structure version of a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OdsVersion {
    /// Major version.
    pub major: u16,
    /// Minor version.
    pub minor: u16,
}

impl OdsVersion {
    /// Oldest major version the driver accepts. ODS 9 and below predate
    /// dialect support.
    pub const MIN_SUPPORTED_MAJOR: u16 = 10;

    /// Create a version.
    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Whether the driver can work with this database.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.major >= Self::MIN_SUPPORTED_MAJOR
    }
}

impl fmt::Display for OdsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_i64() {
        assert_eq!(Dialect::from_i64(1), Some(Dialect::V1));
        assert_eq!(Dialect::from_i64(3), Some(Dialect::V3));
        assert_eq!(Dialect::from_i64(2), None);
        assert_eq!(Dialect::default(), Dialect::V3);
    }

    #[test]
    fn test_ods_support() {
        assert!(!OdsVersion::new(9, 1).is_supported());
        assert!(OdsVersion::new(10, 0).is_supported());
        assert!(OdsVersion::new(11, 2) > OdsVersion::new(11, 1));
        assert_eq!(OdsVersion::new(11, 2).to_string(), "11.2");
    }
}
