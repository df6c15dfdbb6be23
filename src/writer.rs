//! Result writer handed to a prepared statement's row producer.
//!
//! Rows are encoded as DataRow ('D') messages straight into an owned buffer,
//! in text format. The session writes that buffer to the client once the
//! producer returns.

use std::fmt::Write as _;

use bytes::{BufMut, BytesMut};

use crate::bridge::Value;
use crate::error::{SqlException, SqlState};

/// Most columns a row can carry; the wire count is an `i16`.
pub const MAX_COLUMNS: usize = i16::MAX as usize;

/// Rejects results too wide to describe on the wire.
pub fn check_column_count(num_columns: usize) -> Result<(), SqlException> {
    if num_columns > MAX_COLUMNS {
        return Err(SqlException::error(
            format!("result has {num_columns} columns, at most {MAX_COLUMNS} are supported"),
            SqlState::TooManyColumns,
        ));
    }
    Ok(())
}

/// Collects the DataRow messages of one result set.
#[derive(Debug)]
pub struct ResultWriter {
    num_columns: usize,
    num_rows: usize,
    data: BytesMut,
}

impl ResultWriter {
    /// Creates a writer whose rows all carry `num_columns` values, which must
    /// not exceed [`MAX_COLUMNS`].
    pub fn new(num_columns: usize) -> Self {
        debug_assert!(num_columns <= MAX_COLUMNS);
        Self {
            num_columns,
            num_rows: 0,
            data: BytesMut::new(),
        }
    }

    /// Starts a new row. The row is committed when the returned writer drops.
    pub fn add_row(&mut self) -> RowWriter<'_> {
        RowWriter::new(self)
    }

    /// Number of rows written so far.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Encoded DataRow messages.
    pub fn into_bytes(self) -> BytesMut {
        self.data
    }
}

/// Temporarily leased from a [`ResultWriter`] to encode a single row.
///
/// Values beyond the column count are dropped; columns left unwritten when
/// the row is dropped are sent as NULL.
pub struct RowWriter<'a> {
    current_col: usize,
    len_pos: usize,
    parent: &'a mut ResultWriter,
}

impl<'a> RowWriter<'a> {
    fn new(parent: &'a mut ResultWriter) -> Self {
        let len_pos = parent.data.len() + 1;
        parent.data.put_u8(b'D');
        parent.data.put_i32(0); // patched on drop
        parent.data.put_i16(parent.num_columns as i16);
        Self {
            current_col: 0,
            len_pos,
            parent,
        }
    }

    fn full(&self) -> bool {
        self.current_col >= self.parent.num_columns
    }

    fn write_bytes(&mut self, data: &[u8]) {
        if self.full() {
            return;
        }
        self.current_col += 1;
        self.parent.data.put_i32(data.len() as i32);
        self.parent.data.put_slice(data);
    }

    /// Writes the `Display` form of `val` without an intermediate allocation.
    fn write_display(&mut self, val: impl std::fmt::Display) {
        if self.full() {
            return;
        }
        self.current_col += 1;
        let data = &mut self.parent.data;
        let len_pos = data.len();
        data.put_i32(0);
        // Writing into a BytesMut cannot fail.
        let _ = write!(data, "{val}");
        let len = (data.len() - len_pos - 4) as i32;
        data[len_pos..len_pos + 4].copy_from_slice(&len.to_be_bytes());
    }

    fn write_float(&mut self, val: f64) {
        if val.is_nan() {
            self.write_string("NaN");
        } else if val.is_infinite() {
            self.write_string(if val > 0.0 { "Infinity" } else { "-Infinity" });
        } else {
            self.write_display(val);
        }
    }

    /// Writes a null value for the next column.
    pub fn write_null(&mut self) {
        if self.full() {
            return;
        }
        self.current_col += 1;
        self.parent.data.put_i32(-1);
    }

    /// Writes a string value for the next column.
    pub fn write_string(&mut self, val: &str) {
        self.write_bytes(val.as_bytes());
    }

    /// Writes a bool value for the next column.
    pub fn write_bool(&mut self, val: bool) {
        self.write_bytes(if val { b"t" } else { b"f" });
    }

    pub fn write_int2(&mut self, val: i16) {
        self.write_display(val);
    }

    pub fn write_int4(&mut self, val: i32) {
        self.write_display(val);
    }

    pub fn write_int8(&mut self, val: i64) {
        self.write_display(val);
    }

    pub fn write_float4(&mut self, val: f32) {
        if val.is_finite() {
            self.write_display(val);
        } else {
            self.write_float(val as f64);
        }
    }

    pub fn write_float8(&mut self, val: f64) {
        self.write_float(val);
    }

    /// Writes an engine value for the next column.
    pub fn write_value(&mut self, value: &Value) {
        match value {
            Value::Null => self.write_null(),
            Value::Bool(v) => self.write_bool(*v),
            Value::Int2(v) => self.write_int2(*v),
            Value::Int4(v) => self.write_int4(*v),
            Value::Int8(v) => self.write_int8(*v),
            Value::Float4(v) => self.write_float4(*v),
            Value::Float8(v) => self.write_float8(*v),
            Value::Text(v) => self.write_string(v),
        }
    }
}

impl Drop for RowWriter<'_> {
    fn drop(&mut self) {
        while !self.full() {
            self.write_null();
        }
        let data = &mut self.parent.data;
        let len = (data.len() - self.len_pos) as i32;
        data[self.len_pos..self.len_pos + 4].copy_from_slice(&len.to_be_bytes());
        self.parent.num_rows += 1;
    }
}
