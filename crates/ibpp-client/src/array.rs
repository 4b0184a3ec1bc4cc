//! Typed array columns.
//!
//! An array must be described from its table and column before anything
//! else; the description gives the element type and the declared bounds of
//! every dimension. Bounds may then be narrowed to transfer a slice.
//! Elements are converted with the same rules as row cells.

use ibpp_protocol::{ArrayBound, ArrayDesc, Quad};
use ibpp_types::{decode_value, encode_value, FromSql, SqlDataType, ToSql, TypeInfo};

use crate::arena::{ArrayKey, DatabaseKey, TransactionKey};
use crate::client::Client;
use crate::error::{Error, Result};
use crate::transport::{DbHandle, TrHandle};

#[derive(Debug, Default)]
pub(crate) struct ArrayState {
    pub(crate) database: Option<DatabaseKey>,
    pub(crate) transaction: Option<TransactionKey>,
    pub(crate) id: Option<Quad>,
    pub(crate) desc: Option<ArrayDesc>,
}

impl ArrayState {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

/// Whether `[low, high]` narrows `declared`.
fn narrows(declared: ArrayBound, low: i32, high: i32) -> bool {
    declared.contains(&ArrayBound::new(low, high))
}

impl Client {
    pub(crate) fn array_state(&self, key: ArrayKey) -> Result<&ArrayState> {
        self.arrays.get(key).ok_or(Error::InvalidHandle("array"))
    }

    pub(crate) fn array_state_mut(&mut self, key: ArrayKey) -> Result<&mut ArrayState> {
        self.arrays.get_mut(key).ok_or(Error::InvalidHandle("array"))
    }

    pub(crate) fn link_array_database(&mut self, key: ArrayKey, db: DatabaseKey) -> Result<()> {
        self.db_mut(db)?.arrays.push(key);
        self.array_state_mut(key)?.database = Some(db);
        Ok(())
    }

    pub(crate) fn link_array_transaction(&mut self, key: ArrayKey, tr: TransactionKey) -> Result<()> {
        self.tr_mut(tr)?.arrays.push(key);
        self.array_state_mut(key)?.transaction = Some(tr);
        Ok(())
    }

    pub(crate) fn unlink_array_database(&mut self, key: ArrayKey) {
        let Some(db) = self.arrays.get_mut(key).and_then(|a| a.database.take()) else {
            return;
        };
        if let Some(state) = self.databases.get_mut(db) {
            state.arrays.retain(|a| *a != key);
        }
    }

    pub(crate) fn unlink_array_transaction(&mut self, key: ArrayKey) {
        let Some(tr) = self.arrays.get_mut(key).and_then(|a| a.transaction.take()) else {
            return;
        };
        if let Some(state) = self.transactions.get_mut(tr) {
            state.arrays.retain(|a| *a != key);
        }
    }

    fn array_targets(&self, context: &'static str, key: ArrayKey) -> Result<(DbHandle, TrHandle)> {
        let state = self.array_state(key)?;
        let db = self.connected_db(context, state.database)?;
        let tr = self.started_tr(context, state.transaction)?;
        Ok((db, tr))
    }
}

/// An array borrowed from a [`Client`].
pub struct Array<'c> {
    client: &'c mut Client,
    key: ArrayKey,
}

impl<'c> Array<'c> {
    pub(crate) fn new(client: &'c mut Client, key: ArrayKey) -> Self {
        Self { client, key }
    }

    /// Key of this array.
    #[must_use]
    pub fn key(&self) -> ArrayKey {
        self.key
    }

    fn state(&self) -> Result<&ArrayState> {
        self.client.array_state(self.key)
    }

    fn state_mut(&mut self) -> Result<&mut ArrayState> {
        self.client.array_state_mut(self.key)
    }

    fn desc(&self, context: &'static str) -> Result<&ArrayDesc> {
        self.state()?
            .desc
            .as_ref()
            .ok_or_else(|| Error::logic(context, "Array description not set."))
    }

    /// Rebind to another database.
    pub fn attach_database(&mut self, db: DatabaseKey) -> Result<()> {
        self.client.db(db)?;
        self.client.unlink_array_database(self.key);
        self.client.link_array_database(self.key, db)
    }

    /// Rebind to another transaction.
    pub fn attach_transaction(&mut self, tr: TransactionKey) -> Result<()> {
        self.client.tr(tr)?;
        self.client.unlink_array_transaction(self.key);
        self.client.link_array_transaction(self.key, tr)
    }

    /// Look up the declared shape of `table.column`.
    ///
    /// Forgets any id previously set.
    pub fn describe(&mut self, table: &str, column: &str) -> Result<()> {
        const CONTEXT: &str = "Array::Describe";
        let (db, tr) = self.client.array_targets(CONTEXT, self.key)?;
        self.state_mut()?.id = None;
        let desc = self
            .client
            .transport
            .array_lookup_bounds(db, tr, table, column)
            .map_err(|status| self.client.server_error(CONTEXT, status))?;
        tracing::debug!(
            table,
            column,
            dimensions = desc.dimensions(),
            elements = desc.element_count().ok(),
            "array described"
        );
        self.state_mut()?.desc = Some(desc);
        Ok(())
    }

    /// Current bounds of dimension `dim` (0-based).
    pub fn bounds(&self, dim: usize) -> Result<ArrayBound> {
        self.desc("Array::Bounds")?
            .bounds
            .get(dim)
            .copied()
            .ok_or_else(|| Error::logic("Array::Bounds", "Invalid dimension."))
    }

    /// Narrow dimension `dim` (0-based) to `[low, high]`.
    pub fn set_bounds(&mut self, dim: usize, low: i32, high: i32) -> Result<()> {
        const CONTEXT: &str = "Array::SetBounds";
        let current = self.bounds_for(CONTEXT, dim)?;
        if !narrows(current, low, high) {
            return Err(Error::InvalidBounds {
                dimension: dim,
                low,
                high,
            });
        }
        if let Some(bound) = self
            .state_mut()?
            .desc
            .as_mut()
            .and_then(|desc| desc.bounds.get_mut(dim))
        {
            *bound = ArrayBound::new(low, high);
        }
        Ok(())
    }

    fn bounds_for(&self, context: &'static str, dim: usize) -> Result<ArrayBound> {
        let desc = self.desc(context)?;
        let state = self.state()?;
        if state.database.is_none() {
            return Err(Error::logic(context, "No Database is attached."));
        }
        if state.transaction.is_none() {
            return Err(Error::logic(context, "No Transaction is attached."));
        }
        desc.bounds
            .get(dim)
            .copied()
            .ok_or_else(|| Error::logic(context, "Invalid dimension."))
    }

    /// Logical element type.
    pub fn element_type(&self) -> Result<SqlDataType> {
        Ok(self.desc("Array::ElementType")?.dtype.into())
    }

    /// Declared element length in bytes.
    pub fn element_size(&self) -> Result<usize> {
        Ok(usize::from(self.desc("Array::ElementSize")?.length))
    }

    /// Element scale.
    pub fn element_scale(&self) -> Result<i16> {
        Ok(i16::from(self.desc("Array::ElementScale")?.scale))
    }

    /// Number of dimensions.
    pub fn dimensions(&self) -> Result<usize> {
        Ok(self.desc("Array::Dimensions")?.dimensions())
    }

    /// Number of elements in the current slice.
    pub fn element_count(&self) -> Result<usize> {
        Ok(self.desc("Array::ElementCount")?.element_count()?)
    }

    /// Id of the stored array.
    pub fn id(&self) -> Result<Quad> {
        self.state()?
            .id
            .ok_or_else(|| Error::logic("Array::GetId", "Array Id not assigned."))
    }

    /// Point at an existing array, as read from a column.
    pub fn set_id(&mut self, id: Quad) -> Result<()> {
        self.state_mut()?.id = (!id.is_zero()).then_some(id);
        Ok(())
    }

    /// Read the current slice, in row-major order.
    pub fn read_to<T: FromSql>(&mut self) -> Result<Vec<T>> {
        const CONTEXT: &str = "Array::ReadTo";
        let id = self
            .state()?
            .id
            .ok_or_else(|| Error::logic(CONTEXT, "Array Id not read from column."))?;
        let desc = self.desc(CONTEXT)?.clone();
        let (db, tr) = self.client.array_targets(CONTEXT, self.key)?;
        let data = self
            .client
            .transport
            .array_get_slice(db, tr, id, &desc)
            .map_err(|status| self.client.server_error(CONTEXT, status))?;
        if data.len() != desc.slice_size()? {
            return Err(Error::logic(CONTEXT, "Internal buffer size discrepancy."));
        }

        let info = TypeInfo::element(&desc);
        if info.size == 0 {
            return Ok(Vec::new());
        }
        data.chunks_exact(info.size)
            .map(|cell| {
                let value = decode_value(&info, cell, T::NATIVE)
                    .map_err(|e| Error::from_type(CONTEXT, e))?;
                T::from_sql(&value).map_err(|e| Error::from_type(CONTEXT, e))
            })
            .collect()
    }

    /// Write `values` as the current slice, in row-major order, and keep
    /// the id of the stored array.
    pub fn write_from<T: ToSql>(&mut self, values: &[T]) -> Result<()> {
        const CONTEXT: &str = "Array::WriteFrom";
        let desc = self.desc(CONTEXT)?.clone();
        let (db, tr) = self.client.array_targets(CONTEXT, self.key)?;
        let expected = desc.element_count()?;
        if values.len() != expected {
            return Err(Error::ElementCountMismatch {
                expected,
                actual: values.len(),
            });
        }

        let info = TypeInfo::element(&desc);
        let mut data = vec![0u8; desc.slice_size()?];
        if info.size > 0 {
            for (cell, value) in data.chunks_exact_mut(info.size).zip(values) {
                cell.copy_from_slice(&info.blank());
                let value = value.to_sql().map_err(|e| Error::from_type(CONTEXT, e))?;
                encode_value(&info, &value, cell).map_err(|e| Error::from_type(CONTEXT, e))?;
            }
        }

        let current = self.state()?.id;
        let id = self
            .client
            .transport
            .array_put_slice(db, tr, current, &desc, &data)
            .map_err(|status| self.client.server_error(CONTEXT, status))?;
        self.state_mut()?.id = Some(id);
        tracing::debug!(elements = expected, %id, "array slice written");
        Ok(())
    }
}

impl std::fmt::Debug for Array<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Array").field("key", &self.key).finish()
    }
}
