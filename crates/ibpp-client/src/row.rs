//! Row descriptors.
//!
//! A [`Row`] is an ordered set of typed slots, each with its own native
//! storage and null indicator. Statements own one row for their input
//! parameters and one for their output columns; callers can take detached
//! copies of the output row with [`Statement::fetch_row`](crate::Statement::fetch_row).
//!
//! Slots are numbered from 1.

use ibpp_protocol::{Dialect, SqlType};
use ibpp_types::{
    decode_value, encode_value, FromSql, NativeType, SqlDataType, Timestamp, ToSql, Value,
};

use crate::error::{Error, Result};
use crate::transport::{ColumnDesc, SqlVar};

/// Typed slots with native storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    vars: Vec<SqlVar>,
    updated: Vec<bool>,
    dialect: Dialect,
}

impl Row {
    /// Allocate storage for `columns`, every slot null and untouched.
    #[must_use]
    pub fn new(columns: Vec<ColumnDesc>, dialect: Dialect) -> Self {
        let updated = vec![false; columns.len()];
        Self {
            vars: columns.into_iter().map(SqlVar::new).collect(),
            updated,
            dialect,
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn columns(&self) -> usize {
        self.vars.len()
    }

    /// Dialect used for date conversions.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn slot(&self, context: &'static str, idx: usize) -> Result<usize> {
        if idx == 0 || idx > self.vars.len() {
            return Err(Error::logic(context, "Variable index out of range."));
        }
        Ok(idx - 1)
    }

    /// Whether slot `idx` holds SQL NULL.
    pub fn is_null(&self, idx: usize) -> Result<bool> {
        let i = self.slot("Row::IsNull", idx)?;
        let var = &self.vars[i];
        Ok(var.desc.nullable && var.null)
    }

    /// Set slot `idx` to SQL NULL.
    pub fn set_null(&mut self, idx: usize) -> Result<()> {
        let i = self.slot("Row::SetNull", idx)?;
        let var = &mut self.vars[i];
        if !var.desc.nullable {
            return Err(Error::logic("Row::SetNull", "This column can't be null."));
        }
        var.null = true;
        self.updated[i] = true;
        Ok(())
    }

    /// Write a native value into slot `idx`.
    pub fn set<T: ToSql + ?Sized>(&mut self, idx: usize, value: &T) -> Result<()> {
        let value = value.to_sql().map_err(|e| Error::from_type("Row::Set", e))?;
        self.set_value(idx, &value)
    }

    /// Write `value` into slot `idx`; [`Value::Null`] nulls the slot.
    pub fn set_value(&mut self, idx: usize, value: &Value) -> Result<()> {
        if value.is_null() {
            return self.set_null(idx);
        }
        let i = self.slot("Row::Set", idx)?;
        let value = self.adapt_for_write(value)?;
        let var = &mut self.vars[i];
        encode_value(&var.desc.type_info(), &value, &mut var.data)
            .map_err(|e| Error::from_type("Row::Set", e))?;
        var.null = false;
        self.updated[i] = true;
        Ok(())
    }

    /// Read slot `idx` as `T`.
    ///
    /// Reading a NULL slot into `Option<T>` gives `None`; into a plain `T`
    /// it fails.
    pub fn get<T: FromSql>(&self, idx: usize) -> Result<T> {
        let value = self.get_value(idx, T::NATIVE)?;
        T::from_sql(&value).map_err(|e| Error::from_type("Row::Get", e))
    }

    /// Read the column named `name` as `T`.
    pub fn get_by_name<T: FromSql>(&self, name: &str) -> Result<T> {
        self.get(self.column_num(name)?)
    }

    /// Read slot `idx` as `native`, or [`Value::Null`].
    pub fn get_value(&self, idx: usize, native: NativeType) -> Result<Value> {
        let i = self.slot("Row::Get", idx)?;
        let var = &self.vars[i];
        if var.desc.nullable && var.null {
            return Ok(Value::Null);
        }
        let info = var.desc.type_info();
        let decode = |target| {
            decode_value(&info, &var.data, target).map_err(|e| Error::from_type("Row::Get", e))
        };
        match (self.dialect, native) {
            (Dialect::V1, NativeType::Date) => match decode(NativeType::Timestamp)? {
                Value::Timestamp(ts) => Ok(Value::Date(ts.date())),
                other => Ok(other),
            },
            (Dialect::V1, NativeType::Time) => Err(Error::logic(
                "Row::Get",
                "Time values are only available in dialect 3.",
            )),
            _ => decode(native),
        }
    }

    fn adapt_for_write(&self, value: &Value) -> Result<Value> {
        Ok(match (self.dialect, value) {
            (Dialect::V1, Value::Date(d)) => Value::Timestamp(Timestamp::from(*d)),
            (Dialect::V1, Value::Time(_)) => {
                return Err(Error::logic(
                    "Row::Set",
                    "Time values are only available in dialect 3.",
                ));
            }
            _ => value.clone(),
        })
    }

    /// 1-based number of the column named `name`.
    ///
    /// Names are matched case-insensitively, first against column names,
    /// then against aliases.
    pub fn column_num(&self, name: &str) -> Result<usize> {
        if name.is_empty() {
            return Err(Error::ColumnNotFound(String::new()));
        }
        self.vars
            .iter()
            .position(|v| v.desc.name.eq_ignore_ascii_case(name))
            .or_else(|| {
                self.vars
                    .iter()
                    .position(|v| v.desc.alias.eq_ignore_ascii_case(name))
            })
            .map(|i| i + 1)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    fn desc(&self, context: &'static str, idx: usize) -> Result<&ColumnDesc> {
        let i = self.slot(context, idx)?;
        Ok(&self.vars[i].desc)
    }

    /// Column name.
    pub fn column_name(&self, idx: usize) -> Result<&str> {
        Ok(&self.desc("Row::ColumnName", idx)?.name)
    }

    /// Column alias.
    pub fn column_alias(&self, idx: usize) -> Result<&str> {
        Ok(&self.desc("Row::ColumnAlias", idx)?.alias)
    }

    /// Table the column belongs to.
    pub fn column_table(&self, idx: usize) -> Result<&str> {
        Ok(&self.desc("Row::ColumnTable", idx)?.relation)
    }

    /// Logical data type.
    pub fn column_type(&self, idx: usize) -> Result<SqlDataType> {
        Ok(self.desc("Row::ColumnType", idx)?.sql_type.into())
    }

    /// Wire type.
    pub fn column_sql_type(&self, idx: usize) -> Result<SqlType> {
        Ok(self.desc("Row::ColumnType", idx)?.sql_type)
    }

    /// Blob subtype or text character set.
    pub fn column_subtype(&self, idx: usize) -> Result<i16> {
        Ok(self.desc("Row::ColumnSubtype", idx)?.subtype)
    }

    /// Declared length in bytes.
    pub fn column_size(&self, idx: usize) -> Result<usize> {
        Ok(usize::from(self.desc("Row::ColumnSize", idx)?.length))
    }

    /// NUMERIC scale.
    pub fn column_scale(&self, idx: usize) -> Result<i16> {
        Ok(self.desc("Row::ColumnScale", idx)?.scale)
    }

    /// Whether slot `idx` was set or nulled since the row was allocated.
    pub fn column_updated(&self, idx: usize) -> Result<bool> {
        let i = self.slot("Row::ColumnUpdated", idx)?;
        Ok(self.updated[i])
    }

    /// Whether any slot was set or nulled.
    #[must_use]
    pub fn updated(&self) -> bool {
        self.updated.iter().any(|&u| u)
    }

    /// Number of slots never set nor nulled.
    #[must_use]
    pub fn missing_values(&self) -> usize {
        self.updated.iter().filter(|&&u| !u).count()
    }

    pub(crate) fn vars(&self) -> &[SqlVar] {
        &self.vars
    }

    pub(crate) fn vars_mut(&mut self) -> &mut [SqlVar] {
        &mut self.vars
    }

    /// Input parameters always accept NULL, whatever the server says.
    pub(crate) fn force_nullable(&mut self) {
        for var in &mut self.vars {
            var.desc.nullable = true;
        }
    }

    /// Overwrite the cells of slot `idx` with a raw id.
    pub(crate) fn set_raw(&mut self, idx: usize, bytes: &[u8]) -> Result<()> {
        let i = self.slot("Row::Set", idx)?;
        let var = &mut self.vars[i];
        let n = bytes.len().min(var.data.len());
        var.data[..n].copy_from_slice(&bytes[..n]);
        var.null = false;
        self.updated[i] = true;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ibpp_types::{Date, Time};

    fn row() -> Row {
        Row::new(
            vec![
                ColumnDesc::new(SqlType::Long, 4).named("ID").not_null(),
                ColumnDesc::new(SqlType::Varying, 20).named("NAME").alias("FULL_NAME"),
                ColumnDesc::new(SqlType::Int64, 8).named("PRICE").scale(-2),
                ColumnDesc::new(SqlType::Timestamp, 8).named("CREATED"),
            ],
            Dialect::V3,
        )
    }

    #[test]
    fn test_new_row_is_null_and_untouched() {
        let row = row();
        assert_eq!(row.columns(), 4);
        assert_eq!(row.missing_values(), 4);
        assert!(!row.updated());
        assert!(row.is_null(2).unwrap());
        // NOT NULL columns never report null
        assert!(!row.is_null(1).unwrap());
    }

    #[test]
    fn test_index_is_one_based() {
        let row = row();
        assert!(row.is_null(0).is_err());
        assert!(row.is_null(5).is_err());
    }

    #[test]
    fn test_set_and_get() {
        let mut row = row();
        row.set(1, &7i32).unwrap();
        row.set(2, "Alice").unwrap();
        row.set(3, &19.99f64).unwrap();

        assert_eq!(row.get::<i32>(1).unwrap(), 7);
        assert_eq!(row.get::<i64>(1).unwrap(), 7);
        assert_eq!(row.get::<String>(2).unwrap(), "Alice");
        assert_eq!(row.get::<f64>(3).unwrap(), 19.99);
        assert_eq!(row.missing_values(), 1);
        assert!(row.column_updated(3).unwrap());
        assert!(!row.column_updated(4).unwrap());
    }

    #[test]
    fn test_null_hides_previous_value() {
        let mut row = row();
        row.set(2, "Bob").unwrap();
        row.set_null(2).unwrap();
        assert!(row.is_null(2).unwrap());
        assert_eq!(row.get::<Option<String>>(2).unwrap(), None);
        assert_eq!(row.get_value(2, NativeType::String).unwrap(), Value::Null);
        assert!(row.get::<String>(2).is_err());
        assert!(row.column_updated(2).unwrap());
    }

    #[test]
    fn test_set_null_on_not_null_column_fails() {
        let mut row = row();
        let err = row.set_null(1).unwrap_err();
        assert!(err.to_string().contains("can't be null"));
        row.force_nullable();
        row.set_null(1).unwrap();
    }

    #[test]
    fn test_wrong_type_names_both_sides() {
        let mut row = row();
        let err = row.set(1, &Date::new(2024, 1, 1).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            Error::WrongType {
                sql_type: "SQL_LONG",
                native: NativeType::Date,
                ..
            }
        ));
    }

    #[test]
    fn test_column_lookup_prefers_names_over_aliases() {
        let row = Row::new(
            vec![
                ColumnDesc::new(SqlType::Long, 4).named("A").alias("B"),
                ColumnDesc::new(SqlType::Long, 4).named("B").alias("C"),
            ],
            Dialect::V3,
        );
        assert_eq!(row.column_num("b").unwrap(), 2);
        assert_eq!(row.column_num("c").unwrap(), 2);
        assert_eq!(row.column_num("A").unwrap(), 1);
        assert!(matches!(row.column_num("D"), Err(Error::ColumnNotFound(n)) if n == "D"));
        assert!(row.column_num("").is_err());
    }

    #[test]
    fn test_metadata_accessors() {
        let row = row();
        assert_eq!(row.column_name(2).unwrap(), "NAME");
        assert_eq!(row.column_alias(2).unwrap(), "FULL_NAME");
        assert_eq!(row.column_type(3).unwrap(), SqlDataType::Largeint);
        assert_eq!(row.column_scale(3).unwrap(), -2);
        assert_eq!(row.column_size(2).unwrap(), 20);
        assert_eq!(row.column_num("full_name").unwrap(), 2);
    }

    #[test]
    fn test_dialect_one_dates_travel_as_timestamps() {
        let mut row = Row::new(
            vec![ColumnDesc::new(SqlType::Timestamp, 8).named("D")],
            Dialect::V1,
        );
        let date = Date::new(1999, 12, 31).unwrap();
        row.set(1, &date).unwrap();
        assert_eq!(row.get::<Date>(1).unwrap(), date);
        assert_eq!(row.get::<Timestamp>(1).unwrap(), Timestamp::from(date));
        assert!(row.set(1, &Time::MIDNIGHT).is_err());
        assert!(row.get::<Time>(1).is_err());
    }

    #[test]
    fn test_clone_is_deep() {
        let mut row = row();
        row.set(2, "first").unwrap();
        let copy = row.clone();
        row.set(2, "second").unwrap();
        assert_eq!(copy.get::<String>(2).unwrap(), "first");
        assert_eq!(row.get::<String>(2).unwrap(), "second");
    }
}
