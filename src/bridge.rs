//! Query Bridge: the boundary between the protocol engine and the query engine.
//!
//! The session only knows how to ask a [`QueryHandler`] to turn SQL text into
//! a [`PreparedStatement`]: a list of result fields plus a row producer that
//! streams rows into a [`ResultWriter`]. How the query actually runs is up to
//! the embedder.
//!
//! [`ResultSet`] is a ready-made adapter for engines that hand back typed
//! columns and values. It maps engine column types to protocol type
//! identifiers and drops the columns that have no mapping.

use crate::error::SqlException;
use crate::protocol::{FieldDescription, Oid};
use crate::server::SessionId;
use crate::writer::ResultWriter;

/// Produces the rows of a prepared statement.
///
/// The producer owns everything the execution needs. Parameters are always
/// empty since the extended query protocol is not supported.
pub type RowProducer =
    Box<dyn FnOnce(&mut ResultWriter, &[Value]) -> Result<(), SqlException> + Send>;

/// A statement ready to execute: its result shape and its row producer.
pub struct PreparedStatement {
    pub fields: Vec<FieldDescription>,
    pub producer: RowProducer,
}

impl PreparedStatement {
    pub fn new<F>(fields: Vec<FieldDescription>, producer: F) -> Self
    where
        F: FnOnce(&mut ResultWriter, &[Value]) -> Result<(), SqlException> + Send + 'static,
    {
        Self {
            fields,
            producer: Box::new(producer),
        }
    }

    /// Runs the producer into `writer`, consuming the statement.
    pub fn execute(self, writer: &mut ResultWriter, params: &[Value]) -> Result<(), SqlException> {
        (self.producer)(writer, params)
    }
}

impl std::fmt::Debug for PreparedStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Turns SQL text into a prepared statement. One handler serves one session.
///
/// Failures should be reported as [`SqlException::data_exception`] unless the
/// handler knows the underlying engine connection is unusable, in which case
/// a `Fatal` exception ends the session.
pub trait QueryHandler: Send {
    fn prepare(&mut self, query: &str) -> Result<PreparedStatement, SqlException>;
}

impl<F> QueryHandler for F
where
    F: FnMut(&str) -> Result<PreparedStatement, SqlException> + Send,
{
    fn prepare(&mut self, query: &str) -> Result<PreparedStatement, SqlException> {
        self(query)
    }
}

/// Creates a [`QueryHandler`] for every accepted session, e.g. to open a
/// fresh engine connection per client.
pub trait HandlerFactory: Send + Sync + 'static {
    type Handler: QueryHandler + 'static;

    fn create(&self, session: SessionId) -> Self::Handler;
}

impl<F, H> HandlerFactory for F
where
    F: Fn(SessionId) -> H + Send + Sync + 'static,
    H: QueryHandler + 'static,
{
    type Handler = H;

    fn create(&self, session: SessionId) -> H {
        self(session)
    }
}

/// A value produced by the query engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    /// Text and every type sent in its text form (dates, times, timestamps).
    Text(String),
}

/// Engine-native column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    HugeInt,
    Float,
    Double,
    Decimal,
    Varchar,
    Blob,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Interval,
    Uuid,
    List,
    Struct,
}

impl ColumnType {
    /// Protocol type identifier for this column type, or `None` when the type
    /// has no wire mapping. Unmapped columns are left out of results.
    pub fn oid(self) -> Option<Oid> {
        match self {
            ColumnType::Boolean => Some(Oid::Bool),
            ColumnType::SmallInt => Some(Oid::Int2),
            ColumnType::Integer => Some(Oid::Int4),
            ColumnType::BigInt => Some(Oid::Int8),
            ColumnType::Float => Some(Oid::Float4),
            ColumnType::Double => Some(Oid::Float8),
            ColumnType::Varchar => Some(Oid::Varchar),
            ColumnType::Date => Some(Oid::Date),
            ColumnType::Time => Some(Oid::Time),
            ColumnType::Timestamp => Some(Oid::Timestamp),
            ColumnType::TimestampTz => Some(Oid::TimestampTz),
            ColumnType::TinyInt
            | ColumnType::HugeInt
            | ColumnType::Decimal
            | ColumnType::Blob
            | ColumnType::Interval
            | ColumnType::Uuid
            | ColumnType::List
            | ColumnType::Struct => None,
        }
    }
}

/// A named, typed result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// A materialized result that can be served as a prepared statement.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row. Values are positional, one per column.
    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Builds a statement whose fields and rows skip every column without a
    /// protocol type mapping.
    pub fn into_statement(self) -> PreparedStatement {
        let mapped: Vec<(usize, Oid)> = self
            .columns
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.column_type.oid().map(|oid| (i, oid)))
            .collect();

        let fields = mapped
            .iter()
            .map(|&(i, oid)| FieldDescription::new(self.columns[i].name.clone(), oid))
            .collect();

        let rows = self.rows;
        PreparedStatement::new(fields, move |writer, _params| {
            for row in &rows {
                let mut out = writer.add_row();
                for &(i, _) in &mapped {
                    out.write_value(row.get(i).unwrap_or(&Value::Null));
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultSet {
        let mut rs = ResultSet::new(vec![
            Column::new("id", ColumnType::Integer),
            Column::new("blob", ColumnType::Blob),
            Column::new("name", ColumnType::Varchar),
        ]);
        rs.push_row(vec![
            Value::Int4(1),
            Value::Text("skipped".into()),
            Value::Text("a".into()),
        ]);
        rs.push_row(vec![Value::Int4(2), Value::Null, Value::Null]);
        rs
    }

    #[test]
    fn test_unmapped_columns_omitted_from_fields() {
        let stmt = sample().into_statement();
        assert_eq!(
            stmt.fields,
            vec![
                FieldDescription::new("id", Oid::Int4),
                FieldDescription::new("name", Oid::Varchar),
            ]
        );
    }

    #[test]
    fn test_unmapped_columns_omitted_from_rows() {
        let stmt = sample().into_statement();
        let mut writer = ResultWriter::new(stmt.fields.len());
        stmt.execute(&mut writer, &[]).unwrap();
        assert_eq!(writer.num_rows(), 2);

        let buf = writer.into_bytes();
        // First row: 2 values, "1" and "a"
        assert_eq!(&buf[5..7], &[0, 2]);
        assert_eq!(&buf[7..12], &[0, 0, 0, 1, b'1']);
        assert_eq!(&buf[12..17], &[0, 0, 0, 1, b'a']);
    }

    #[test]
    fn test_short_rows_padded_with_null() {
        let mut rs = ResultSet::new(vec![
            Column::new("a", ColumnType::Integer),
            Column::new("b", ColumnType::Integer),
        ]);
        rs.push_row(vec![Value::Int4(1)]);
        let stmt = rs.into_statement();
        let mut writer = ResultWriter::new(stmt.fields.len());
        stmt.execute(&mut writer, &[]).unwrap();
        let buf = writer.into_bytes();
        assert_eq!(&buf[12..16], &[0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_type_mapping() {
        assert_eq!(ColumnType::Integer.oid(), Some(Oid::Int4));
        assert_eq!(ColumnType::TimestampTz.oid(), Some(Oid::TimestampTz));
        assert_eq!(ColumnType::TinyInt.oid(), None);
        assert_eq!(ColumnType::Decimal.oid(), None);
    }

    #[test]
    fn test_closure_handler() {
        let mut handler = |query: &str| -> Result<PreparedStatement, SqlException> {
            if query.is_empty() {
                return Err(SqlException::data_exception("empty"));
            }
            Ok(ResultSet::default().into_statement())
        };
        assert!(handler.prepare("SELECT 1").is_ok());
        assert!(handler.prepare("").is_err());
    }
}
