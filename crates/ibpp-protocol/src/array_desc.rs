//! Array slice descriptors.

use crate::error::ProtocolError;
use crate::types::BlrType;

/// Maximum number of dimensions an array column may have.
pub const MAX_ARRAY_DIMENSIONS: usize = 16;

/// Inclusive bounds of one array dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArrayBound {
    /// Lowest index.
    pub lower: i32,
    /// Highest index.
    pub upper: i32,
}

impl ArrayBound {
    /// Create a bound pair.
    #[must_use]
    pub const fn new(lower: i32, upper: i32) -> Self {
        Self { lower, upper }
    }

    /// Number of elements along this dimension.
    pub fn len(&self) -> Result<usize, ProtocolError> {
        let extent = (i64::from(self.upper) - i64::from(self.lower) + 1).max(0);
        usize::try_from(extent).map_err(|_| self.too_large())
    }

    /// Whether the dimension holds no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.upper < self.lower
    }

    fn too_large(&self) -> ProtocolError {
        ProtocolError::ArrayTooLarge {
            lower: self.lower,
            upper: self.upper,
        }
    }

    /// Whether `other` lies within these bounds.
    #[must_use]
    pub const fn contains(&self, other: &ArrayBound) -> bool {
        other.lower >= self.lower && other.upper <= self.upper && other.lower <= other.upper
    }
}

/// Shape and element type of an array column, filled by a bounds lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayDesc {
    /// Element type.
    pub dtype: BlrType,
    /// Element scale (negative for NUMERIC elements).
    pub scale: i8,
    /// Declared element length in bytes.
    pub length: u16,
    /// Column name.
    pub field_name: String,
    /// Table name.
    pub relation_name: String,
    /// Bounds for each dimension.
    pub bounds: Vec<ArrayBound>,
}

impl ArrayDesc {
    /// Number of dimensions.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.bounds.len()
    }

    /// Total number of elements in the described slice.
    pub fn element_count(&self) -> Result<usize, ProtocolError> {
        self.bounds.iter().try_fold(1usize, |count, bound| {
            count
                .checked_mul(bound.len()?)
                .ok_or_else(|| bound.too_large())
        })
    }

    /// Bytes one element occupies in a slice buffer.
    #[must_use]
    pub fn element_size(&self) -> usize {
        self.dtype.element_size(usize::from(self.length))
    }

    /// Bytes the whole slice occupies.
    pub fn slice_size(&self) -> Result<usize, ProtocolError> {
        let count = self.element_count()?;
        count.checked_mul(self.element_size()).ok_or_else(|| {
            let last = self.bounds.last().copied().unwrap_or_default();
            last.too_large()
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn desc(bounds: Vec<ArrayBound>) -> ArrayDesc {
        ArrayDesc {
            dtype: BlrType::Varying,
            scale: 0,
            length: 10,
            field_name: "A".into(),
            relation_name: "T".into(),
            bounds,
        }
    }

    #[test]
    fn test_element_count_is_product_of_dimensions() {
        let d = desc(vec![ArrayBound::new(1, 3), ArrayBound::new(0, 4)]);
        assert_eq!(d.element_count().unwrap(), 15);
        assert_eq!(d.element_size(), 12);
        assert_eq!(d.slice_size().unwrap(), 180);
    }

    #[test]
    fn test_bound_len_handles_extreme_bounds() {
        assert_eq!(ArrayBound::new(5, 4).len().unwrap(), 0);
        assert!(ArrayBound::new(5, 4).is_empty());
        assert_eq!(ArrayBound::new(i32::MAX, i32::MIN).len().unwrap(), 0);
        assert_eq!(ArrayBound::new(-3, 3).len().unwrap(), 7);

        let full = ArrayBound::new(i32::MIN, i32::MAX);
        match usize::try_from(1u64 << 32) {
            Ok(expected) => assert_eq!(full.len().unwrap(), expected),
            Err(_) => assert!(matches!(
                full.len(),
                Err(ProtocolError::ArrayTooLarge { .. })
            )),
        }
    }

    #[test]
    fn test_element_count_overflow_is_an_error() {
        let full = ArrayBound::new(i32::MIN, i32::MAX);
        let d = desc(vec![full; 3]);
        assert!(matches!(
            d.element_count(),
            Err(ProtocolError::ArrayTooLarge {
                lower: i32::MIN,
                upper: i32::MAX
            })
        ));
        assert!(d.slice_size().is_err());

        let empty = desc(vec![ArrayBound::new(1, 1000), ArrayBound::new(1, 0)]);
        assert_eq!(empty.element_count().unwrap(), 0);
    }

    #[test]
    fn test_bound_contains() {
        let outer = ArrayBound::new(1, 10);
        assert!(outer.contains(&ArrayBound::new(2, 5)));
        assert!(outer.contains(&ArrayBound::new(1, 10)));
        assert!(!outer.contains(&ArrayBound::new(0, 5)));
        assert!(!outer.contains(&ArrayBound::new(5, 11)));
        assert!(!outer.contains(&ArrayBound::new(6, 5)));
    }
}
