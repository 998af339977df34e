//! Purpose: Define the stable public Rust API boundary for the exporter.
//! Exports: Engine, model, and exporter types needed by the CLI and embedders.
//! Role: Public, additive-only surface; internal module paths may move.
//! Invariants: Everything the binary uses is reachable from this module.
//! Invariants: Re-exports only; no logic lives here.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::convert::{FieldColumn, FieldEncoding, HeaderNaming, TableConverter, TableView};
pub use crate::core::encode::SheetCell;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::sheet::{
    CellSink, CellStyle, SheetLayout, SheetWriterBuilder, SpreadsheetTableWriter, StyleRole,
    WorkbookStyle,
};
pub use crate::core::sql::{ColumnDescriptor, ForeignKey, LineEnding, SqlOptions, SqlTableWriter};
pub use crate::core::table::{BaseTableWriter, HeaderRef, TableBackend, TableWriter, run_and_close};
pub use crate::core::value::{CellValue, ValueType};
pub use crate::export::{
    DestinationFormat, ExportOptions, ExportSummary, RenderedExport, TableSummary, render,
    write_sql_script, write_workbook,
};
pub use crate::json::{parse_document, read_document};
pub use crate::model::DataRoot;
