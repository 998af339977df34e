//! Purpose: Document-level exporters that run every table view into one output document.
//! Exports: `DestinationFormat`, `ExportOptions`, `ExportSummary`, `TableSummary`, `RenderedExport`,
//! `render`, `write_sql_script`, `write_workbook`.
//! Role: Owns writer lifetimes; each table writer is closed before the next one starts.
//! Invariants: Rendering happens fully in memory; callers persist bytes only on success.
//! Invariants: Summaries list tables in output order.
mod sql;
mod xlsx;

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::core::error::Error;
use crate::core::sheet::SheetLayout;
use crate::core::sql::LineEnding;
use crate::core::table::TableWriter;
use crate::model::DataRoot;

pub use sql::{SQL_TABLES, write_sql_script};
pub use xlsx::{INFO_SHEET, TOP_LIST_SHEET, TRANSACTION_SHEETS, write_workbook};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationFormat {
    Xlsx,
    Sql,
}

impl DestinationFormat {
    pub fn extension(self) -> &'static str {
        match self {
            DestinationFormat::Xlsx => "xlsx",
            DestinationFormat::Sql => "sql",
        }
    }

    /// Case-insensitive match on a bare extension such as "SQL".
    pub fn from_extension(extension: &str) -> Option<Self> {
        if extension.eq_ignore_ascii_case("xlsx") {
            Some(DestinationFormat::Xlsx)
        } else if extension.eq_ignore_ascii_case("sql") {
            Some(DestinationFormat::Sql)
        } else {
            None
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|extension| extension.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for DestinationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ExportOptions {
    /// Statement terminator for SQL output.
    pub line_ending: LineEnding,
    /// Header and first data row of every table sheet.
    pub layout: SheetLayout,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub columns: usize,
    pub rows: usize,
}

impl TableSummary {
    fn capture<W: TableWriter + ?Sized>(name: &str, writer: &W) -> Self {
        Self {
            name: name.to_string(),
            columns: writer.header_count(),
            rows: writer.data_row_count(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ExportSummary {
    pub format: DestinationFormat,
    pub tables: Vec<TableSummary>,
}

impl ExportSummary {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|table| table.rows).sum()
    }

    fn finished(format: DestinationFormat, tables: Vec<TableSummary>) -> Self {
        let summary = Self { format, tables };
        tracing::info!(
            format = %summary.format,
            tables = summary.tables.len(),
            rows = summary.total_rows(),
            "export complete"
        );
        summary
    }
}

#[derive(Clone, Debug)]
pub struct RenderedExport {
    pub bytes: Vec<u8>,
    pub summary: ExportSummary,
}

/// Render `root` into an in-memory document of the given format.
pub fn render(
    root: &DataRoot,
    format: DestinationFormat,
    options: &ExportOptions,
) -> Result<RenderedExport, Error> {
    let mut bytes = Vec::new();
    let summary = match format {
        DestinationFormat::Xlsx => write_workbook(root, options, &mut bytes)?,
        DestinationFormat::Sql => write_sql_script(root, options, &mut bytes)?,
    };
    Ok(RenderedExport { bytes, summary })
}
