//! Purpose: SQL script backend: schema inference, CREATE TABLE, and one INSERT per row.
//! Exports: `SqlTable`, `SqlTableWriter`, `SqlOptions`, `LineEnding`, `ColumnDescriptor`, `ForeignKey`.
//! Role: `TableBackend` that renders a table session as text into any `io::Write` sink.
//! Invariants: The schema freezes once, on the second row or on close, whichever comes first.
//! Invariants: After the freeze the column set is fixed; new headers fail with `SchemaFrozen`.
//! Invariants: Primary keys aggregate into a single trailing `PRIMARY KEY(...)` clause.
//! Invariants: The last open row is flushed on close.
use std::collections::HashMap;
use std::io::Write;

use crate::core::encode::{push_sql_literal, quote_identifier, sql_type};
use crate::core::error::{Error, ErrorKind};
use crate::core::table::{BaseTableWriter, Headers, TableBackend};
use crate::core::value::{CellValue, ValueType};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SqlOptions {
    pub line_ending: LineEnding,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

/// Column metadata attached to a header independently of the data written to it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnDescriptor {
    name: String,
    declared_type: Option<ValueType>,
    primary_key: bool,
    references: Option<ForeignKey>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
            primary_key: false,
            references: None,
        }
    }

    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.declared_type = Some(value_type);
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> Option<ValueType> {
        self.declared_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn foreign_key(&self) -> Option<&ForeignKey> {
        self.references.as_ref()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SchemaState {
    NoRowsYet,
    SchemaPending,
    Frozen,
}

/// Fixed-capacity row of cells, reallocated only when a header index outgrows it.
#[derive(Debug, Default)]
struct RowBuffer {
    cells: Box<[CellValue]>,
}

impl RowBuffer {
    fn ensure_width(&mut self, width: usize) {
        if width <= self.cells.len() {
            return;
        }
        let capacity = width.max(self.cells.len() * 2);
        let mut cells = std::mem::take(&mut self.cells).into_vec();
        cells.resize(capacity, CellValue::Null);
        self.cells = cells.into_boxed_slice();
    }

    fn set(&mut self, index: usize, value: CellValue) {
        self.ensure_width(index + 1);
        self.cells[index] = value;
    }

    fn values(&self, width: usize) -> &[CellValue] {
        &self.cells[..width]
    }

    fn clear(&mut self) {
        for cell in self.cells.iter_mut() {
            *cell = CellValue::Null;
        }
    }

    fn capacity(&self) -> usize {
        self.cells.len()
    }
}

pub struct SqlTable<W: Write> {
    table_name: String,
    sink: W,
    options: SqlOptions,
    descriptors: HashMap<String, ColumnDescriptor>,
    observed: Vec<Option<ValueType>>,
    row: RowBuffer,
    columns: Vec<ColumnDescriptor>,
    insert_prefix: String,
    state: SchemaState,
    rows_started: usize,
}

pub type SqlTableWriter<W> = BaseTableWriter<SqlTable<W>>;

impl<W: Write> SqlTable<W> {
    pub fn new(table_name: impl Into<String>, sink: W, options: SqlOptions) -> Self {
        Self {
            table_name: table_name.into(),
            sink,
            options,
            descriptors: HashMap::new(),
            observed: Vec::new(),
            row: RowBuffer::default(),
            columns: Vec::new(),
            insert_prefix: String::new(),
            state: SchemaState::NoRowsYet,
            rows_started: 0,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn is_schema_frozen(&self) -> bool {
        self.state == SchemaState::Frozen
    }

    /// Columns of the frozen schema; empty until the freeze.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn put_descriptor(&mut self, header: &str, descriptor: ColumnDescriptor) -> Result<(), Error> {
        if self.is_schema_frozen() {
            return Err(self.frozen_error(header));
        }
        self.descriptors.insert(header.to_string(), descriptor);
        Ok(())
    }

    fn descriptor_for(&self, header: &str) -> ColumnDescriptor {
        self.descriptors
            .get(header)
            .cloned()
            .unwrap_or_else(|| ColumnDescriptor::new(header))
    }

    fn frozen_error(&self, header: &str) -> Error {
        Error::new(ErrorKind::SchemaFrozen)
            .with_message("schema is frozen; no new columns can be added")
            .with_hint("Create every header before the second row is started.")
            .with_table(&self.table_name)
            .with_column(header)
    }

    fn emit(&mut self, text: &str) -> Result<(), Error> {
        self.sink
            .write_all(text.as_bytes())
            .map_err(|err| Error::from(err).with_table(&self.table_name))
    }

    fn freeze(&mut self, headers: &Headers) -> Result<(), Error> {
        let columns: Vec<ColumnDescriptor> = headers
            .names()
            .iter()
            .map(|name| self.descriptor_for(name))
            .collect();
        let ddl = self.render_create_table(&columns)?;

        self.row.ensure_width(columns.len());
        self.insert_prefix = self.render_insert_prefix(&columns);
        self.columns = columns;
        self.state = SchemaState::Frozen;
        tracing::debug!(
            table = %self.table_name,
            columns = self.columns.len(),
            "sql schema frozen"
        );

        if !ddl.is_empty() {
            self.emit(&ddl)?;
        }
        Ok(())
    }

    fn render_create_table(&self, columns: &[ColumnDescriptor]) -> Result<String, Error> {
        if columns.is_empty() {
            return Ok(String::new());
        }
        let nl = self.options.line_ending.as_str();
        let mut definitions = Vec::with_capacity(columns.len() + 1);
        let mut primary_keys = Vec::new();

        for (index, column) in columns.iter().enumerate() {
            let mut definition = format!("  {}", quote_identifier(column.name()));
            let inferred = column
                .declared_type()
                .or_else(|| self.observed.get(index).copied().flatten());
            if let Some(value_type) = inferred {
                let keyword = sql_type(value_type)
                    .map_err(|err| err.with_table(&self.table_name).with_column(column.name()))?;
                definition.push(' ');
                definition.push_str(keyword);
            }
            if let Some(foreign) = column.foreign_key() {
                definition.push_str(&format!(
                    " REFERENCES {}({})",
                    quote_identifier(&foreign.table),
                    quote_identifier(&foreign.column)
                ));
            }
            if column.is_primary_key() {
                primary_keys.push(quote_identifier(column.name()).into_owned());
            }
            definitions.push(definition);
        }
        if !primary_keys.is_empty() {
            definitions.push(format!("  PRIMARY KEY({})", primary_keys.join(", ")));
        }

        Ok(format!(
            "CREATE TABLE {} ({nl}{}{nl});{nl}",
            quote_identifier(&self.table_name),
            definitions.join(&format!(",{nl}"))
        ))
    }

    fn render_insert_prefix(&self, columns: &[ColumnDescriptor]) -> String {
        let names = columns
            .iter()
            .map(|column| quote_identifier(column.name()))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {}({names}) VALUES (",
            quote_identifier(&self.table_name)
        )
    }

    fn flush_row(&mut self) -> Result<(), Error> {
        if self.columns.is_empty() {
            self.row.clear();
            return Ok(());
        }
        let mut statement = self.insert_prefix.clone();
        for (index, value) in self.row.values(self.columns.len()).iter().enumerate() {
            if index > 0 {
                statement.push_str(", ");
            }
            push_sql_literal(&mut statement, value);
        }
        statement.push_str(");");
        statement.push_str(self.options.line_ending.as_str());

        self.row.clear();
        self.emit(&statement)
    }
}

impl<W: Write> TableBackend for SqlTable<W> {
    fn on_increment_row(&mut self, headers: &Headers) -> Result<(), Error> {
        self.rows_started += 1;
        match self.state {
            SchemaState::NoRowsYet => {
                self.state = SchemaState::SchemaPending;
                Ok(())
            }
            SchemaState::SchemaPending => {
                self.freeze(headers)?;
                self.flush_row()
            }
            SchemaState::Frozen => self.flush_row(),
        }
    }

    fn on_header_created(&mut self, name: &str, index: usize) -> Result<(), Error> {
        if self.is_schema_frozen() {
            return Err(self.frozen_error(name));
        }
        self.observed.push(None);
        self.row.ensure_width(index + 1);
        Ok(())
    }

    fn on_write_value(
        &mut self,
        index: usize,
        value: CellValue,
        value_type: ValueType,
    ) -> Result<(), Error> {
        // An undeclared null carries no type; a non-null `Any` is kept so the freeze rejects it.
        if value_type != ValueType::Any || !value.is_null() {
            if let Some(slot) = self.observed.get_mut(index) {
                *slot = Some(value_type);
            }
        }
        self.row.set(index, value);
        Ok(())
    }

    fn on_closed(&mut self, headers: &Headers) -> Result<(), Error> {
        if !self.is_schema_frozen() {
            self.freeze(headers)?;
        }
        if self.rows_started > 0 {
            self.flush_row()?;
        }
        self.sink
            .flush()
            .map_err(|err| Error::from(err).with_table(&self.table_name))
    }

    fn data_row_count(&self) -> usize {
        self.rows_started
    }
}

impl<W: Write> BaseTableWriter<SqlTable<W>> {
    pub fn new(table_name: impl Into<String>, sink: W) -> Self {
        Self::with_options(table_name, sink, SqlOptions::default())
    }

    pub fn with_options(table_name: impl Into<String>, sink: W, options: SqlOptions) -> Self {
        BaseTableWriter::with_backend(SqlTable::new(table_name, sink, options))
    }

    /// Attach column metadata to `header`, whether or not the header exists yet.
    pub fn put_column_descriptor(
        &mut self,
        header: &str,
        descriptor: ColumnDescriptor,
    ) -> Result<&mut Self, Error> {
        self.check_closed()?;
        self.backend_mut().put_descriptor(header, descriptor)?;
        Ok(self)
    }

    /// Registered descriptor, or the generic one for an existing header.
    pub fn column_descriptor(&self, header: &str) -> Option<ColumnDescriptor> {
        self.header_registry().index_of(header)?;
        Some(self.backend().descriptor_for(header))
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnDescriptor, LineEnding, SqlOptions, SqlTableWriter};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::table::TableWriter;
    use crate::core::value::{CellValue, ValueType, instant_from_unix_millis};

    fn output(writer: &SqlTableWriter<Vec<u8>>) -> String {
        String::from_utf8(writer.backend().sink().clone()).expect("utf8")
    }

    fn render(
        body: impl FnOnce(&mut SqlTableWriter<Vec<u8>>) -> Result<(), Error>,
    ) -> String {
        let mut writer = SqlTableWriter::new("T", Vec::new());
        body(&mut writer).expect("table session");
        writer.close().expect("close");
        output(&writer)
    }

    fn normalize(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn primary_key_table_round_trip() {
        let sql = render(|writer| {
            writer.put_column_descriptor(
                "id",
                ColumnDescriptor::new("id")
                    .with_type(ValueType::Int)
                    .primary_key(),
            )?;
            writer.put_column_descriptor("name", ColumnDescriptor::new("name"))?;
            writer.increment_row()?;
            writer.write("id", 1)?;
            writer.write("name", "a")?;
            writer.increment_row()?;
            writer.write("id", 2)?;
            writer.write("name", "O'Brien")?;
            Ok(())
        });

        assert_eq!(
            sql,
            concat!(
                "CREATE TABLE \"T\" (\n",
                "  \"id\" INTEGER,\n",
                "  \"name\" TEXT,\n",
                "  PRIMARY KEY(\"id\")\n",
                ");\n",
                "INSERT INTO \"T\"(\"id\", \"name\") VALUES (1, 'a');\n",
                "INSERT INTO \"T\"(\"id\", \"name\") VALUES (2, 'O''Brien');\n",
            )
        );
        let mut lines = sql.lines();
        let ddl: Vec<&str> = lines.by_ref().take(5).collect();
        assert_eq!(
            normalize(&ddl.join("\n")),
            "CREATE TABLE \"T\" ( \"id\" INTEGER, \"name\" TEXT, PRIMARY KEY(\"id\") );"
        );
    }

    #[test]
    fn single_row_is_frozen_and_flushed_on_close() {
        let mut writer = SqlTableWriter::new("T", Vec::new());
        writer.increment_row().unwrap();
        writer.write("n", 5).unwrap();
        assert!(!writer.backend().is_schema_frozen());
        assert!(output(&writer).is_empty());

        writer.close().unwrap();
        assert!(writer.backend().is_schema_frozen());
        assert_eq!(
            output(&writer),
            "CREATE TABLE \"T\" (\n  \"n\" INTEGER\n);\nINSERT INTO \"T\"(\"n\") VALUES (5);\n"
        );
    }

    #[test]
    fn schema_freezes_when_second_row_starts() {
        let mut writer = SqlTableWriter::new("T", Vec::new());
        writer.increment_row().unwrap();
        writer.write("n", 1).unwrap();
        writer.increment_row().unwrap();
        assert!(writer.backend().is_schema_frozen());
        assert_eq!(
            output(&writer),
            "CREATE TABLE \"T\" (\n  \"n\" INTEGER\n);\nINSERT INTO \"T\"(\"n\") VALUES (1);\n"
        );
    }

    #[test]
    fn close_is_idempotent() {
        let mut writer = SqlTableWriter::new("T", Vec::new());
        writer.increment_row().unwrap();
        writer.write("n", 1).unwrap();
        writer.close().unwrap();
        let first = output(&writer);
        writer.close().unwrap();
        writer.close().unwrap();
        assert_eq!(output(&writer), first);
    }

    #[test]
    fn primary_keys_aggregate_in_header_order() {
        let sql = render(|writer| {
            writer.put_column_descriptor("b", ColumnDescriptor::new("b").primary_key())?;
            writer.put_column_descriptor("a", ColumnDescriptor::new("a").primary_key())?;
            writer.create_header("a")?;
            writer.create_header("c")?;
            writer.create_header("b")?;
            Ok(())
        });
        assert_eq!(
            sql,
            "CREATE TABLE \"T\" (\n  \"a\",\n  \"c\",\n  \"b\",\n  PRIMARY KEY(\"a\", \"b\")\n);\n"
        );
        assert_eq!(sql.matches("PRIMARY KEY").count(), 1);
    }

    #[test]
    fn foreign_keys_are_inline_after_the_type() {
        let sql = render(|writer| {
            writer.put_column_descriptor(
                "owner",
                ColumnDescriptor::new("owner_id").references("Other", "id"),
            )?;
            writer.increment_row()?;
            writer.write("owner", "x")?;
            Ok(())
        });
        assert!(sql.contains("  \"owner_id\" TEXT REFERENCES \"Other\"(\"id\")\n"));
        assert!(sql.contains("INSERT INTO \"T\"(\"owner_id\") VALUES ('x');"));
    }

    #[test]
    fn inference_uses_most_recent_typed_write() {
        let sql = render(|writer| {
            writer.increment_row()?;
            writer.write("v", 1)?;
            writer.write("v", 1.5)?;
            writer.write("u", CellValue::Null)?;
            writer.write_typed("t", CellValue::Null, ValueType::Text)?;
            let when = instant_from_unix_millis(1_000).expect("instant");
            writer.write("when", when)?;
            writer.write("flag", true)?;
            Ok(())
        });
        assert!(sql.contains("  \"v\" REAL,\n"));
        assert!(sql.contains("  \"u\",\n"));
        assert!(sql.contains("  \"t\" TEXT,\n"));
        assert!(sql.contains("  \"when\" DATETIME,\n"));
        assert!(sql.contains("  \"flag\" INTEGER\n"));
        assert!(sql.contains("VALUES (1.5, null, null, 1000, 1);"));
    }

    #[test]
    fn declared_type_wins_over_observed() {
        let sql = render(|writer| {
            writer.put_column_descriptor(
                "code",
                ColumnDescriptor::new("code").with_type(ValueType::Text),
            )?;
            writer.increment_row()?;
            writer.write("code", 42)?;
            Ok(())
        });
        assert!(sql.contains("  \"code\" TEXT\n"));
    }

    #[test]
    fn declared_any_is_rejected_at_freeze() {
        let mut writer = SqlTableWriter::new("T", Vec::new());
        writer
            .put_column_descriptor("x", ColumnDescriptor::new("x").with_type(ValueType::Any))
            .unwrap();
        writer.increment_row().unwrap();
        writer.write("x", 1).unwrap();
        let err = writer.increment_row().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedType);
        assert_eq!(err.column(), Some("x"));
    }

    #[test]
    fn explicit_any_write_is_rejected_at_freeze() {
        let mut writer = SqlTableWriter::new("T", Vec::new());
        writer.increment_row().unwrap();
        writer
            .write_typed("x", CellValue::Int(3), ValueType::Any)
            .unwrap();
        let err = writer.close().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedType);
        assert_eq!(err.column(), Some("x"));
        assert!(output(&writer).is_empty());

        let sql = render(|writer| {
            writer.increment_row()?;
            writer.write("y", CellValue::Null)
        });
        assert_eq!(
            sql,
            "CREATE TABLE \"T\" (\n  \"y\"\n);\nINSERT INTO \"T\"(\"y\") VALUES (null);\n"
        );
    }

    #[test]
    fn header_after_freeze_fails() {
        let mut writer = SqlTableWriter::new("T", Vec::new());
        writer.increment_row().unwrap();
        writer.write("a", 1).unwrap();
        writer.increment_row().unwrap();

        let err = writer.create_header("late").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaFrozen);
        assert_eq!(
            writer.write("late", 2).unwrap_err().kind(),
            ErrorKind::SchemaFrozen
        );
        let err = writer
            .put_column_descriptor("late", ColumnDescriptor::new("late"))
            .err()
            .expect("schema frozen");
        assert_eq!(err.kind(), ErrorKind::SchemaFrozen);
        assert_eq!(writer.header_count(), 1);
    }

    #[test]
    fn write_before_first_row_fails() {
        let mut writer = SqlTableWriter::new("T", Vec::new());
        assert_eq!(
            writer.write("a", 1).unwrap_err().kind(),
            ErrorKind::NoActiveRow
        );
    }

    #[test]
    fn unwritten_cells_are_null() {
        let sql = render(|writer| {
            writer.create_header("a")?;
            writer.create_header("b")?;
            writer.increment_row()?;
            writer.write("b", "only b")?;
            writer.increment_row()?;
            writer.write("a", 7)?;
            Ok(())
        });
        assert!(sql.contains("VALUES (null, 'only b');"));
        assert!(sql.contains("VALUES (7, null);"));
    }

    #[test]
    fn table_without_rows_still_gets_schema() {
        let sql = render(|writer| {
            writer.create_header("a")?;
            Ok(())
        });
        assert_eq!(sql, "CREATE TABLE \"T\" (\n  \"a\"\n);\n");
    }

    #[test]
    fn table_without_headers_emits_nothing() {
        let sql = render(|writer| writer.increment_row());
        assert!(sql.is_empty());
    }

    #[test]
    fn crlf_line_endings_are_honoured() {
        let mut writer = SqlTableWriter::with_options(
            "T",
            Vec::new(),
            SqlOptions {
                line_ending: LineEnding::CrLf,
            },
        );
        writer.increment_row().unwrap();
        writer.write("a", 1).unwrap();
        writer.close().unwrap();
        assert_eq!(
            output(&writer),
            "CREATE TABLE \"T\" (\r\n  \"a\" INTEGER\r\n);\r\nINSERT INTO \"T\"(\"a\") VALUES (1);\r\n"
        );
    }

    #[test]
    fn empty_identifiers_pass_through() {
        let mut writer = SqlTableWriter::new("", Vec::new());
        writer.increment_row().unwrap();
        writer.write("a", 1).unwrap();
        writer.close().unwrap();
        assert!(output(&writer).starts_with("CREATE TABLE  (\n"));
        assert!(output(&writer).contains("INSERT INTO (\"a\") VALUES (1);"));
    }

    #[test]
    fn column_descriptor_lookup_defaults_for_known_headers() {
        let mut writer = SqlTableWriter::new("T", Vec::new());
        assert!(writer.column_descriptor("a").is_none());
        writer.create_header("a").unwrap();
        assert_eq!(
            writer.column_descriptor("a"),
            Some(ColumnDescriptor::new("a"))
        );
    }

    #[test]
    fn row_buffer_grows_past_initial_capacity() {
        let mut writer = SqlTableWriter::new("T", Vec::new());
        writer.increment_row().unwrap();
        for index in 0..9 {
            writer.write(format!("c{index}").as_str(), index).unwrap();
        }
        assert!(writer.backend().row.capacity() >= 9);
        writer.close().unwrap();
        assert!(output(&writer).contains("VALUES (0, 1, 2, 3, 4, 5, 6, 7, 8);"));
    }
}
