//! Purpose: Spreadsheet backend: header row plus one sheet row per table row.
//! Exports: `CellSink`, `CellStyle`, `StyleRole`, `WorkbookStyle`, `SheetLayout`, `SheetTable`,
//! `SpreadsheetTableWriter`, `SheetWriterBuilder`, `DATE_FORMAT`.
//! Role: `TableBackend` that turns typed writes into styled cell writes on one sheet.
//! Invariants: Header cells land on `layout.header_row` with the header style.
//! Invariants: Instant-typed cells carry the date style; booleans are "True"/"False" text.
//! Invariants: The sink only sees cell writes; rows exist once something is written to them.
use rust_xlsxwriter::{Format, Worksheet};

use crate::core::encode::{SheetCell, sheet_cell};
use crate::core::error::{Error, ErrorKind};
use crate::core::table::{BaseTableWriter, Headers, TableBackend};
use crate::core::value::{CellValue, ValueType};

pub const DATE_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StyleRole {
    Header,
    Date,
}

#[derive(Clone, Debug)]
pub struct CellStyle {
    role: StyleRole,
    format: Format,
}

impl CellStyle {
    pub fn new(role: StyleRole, format: Format) -> Self {
        Self { role, format }
    }

    pub fn role(&self) -> StyleRole {
        self.role
    }

    pub fn format(&self) -> &Format {
        &self.format
    }
}

/// Read-only style handles shared by every sheet of a workbook.
#[derive(Clone, Debug)]
pub struct WorkbookStyle {
    header: CellStyle,
    date: CellStyle,
}

impl WorkbookStyle {
    pub fn new(header: Format, date: Format) -> Self {
        Self {
            header: CellStyle::new(StyleRole::Header, header),
            date: CellStyle::new(StyleRole::Date, date),
        }
    }

    pub fn header(&self) -> &CellStyle {
        &self.header
    }

    pub fn date(&self) -> &CellStyle {
        &self.date
    }
}

impl Default for WorkbookStyle {
    fn default() -> Self {
        Self::new(
            Format::new().set_bold(),
            Format::new().set_num_format(DATE_FORMAT),
        )
    }
}

/// Minimal "set cell value and style" capability of a worksheet.
pub trait CellSink {
    fn set_cell(
        &mut self,
        row: u32,
        column: u16,
        cell: SheetCell<'_>,
        style: Option<&CellStyle>,
    ) -> Result<(), Error>;
}

impl CellSink for Worksheet {
    fn set_cell(
        &mut self,
        row: u32,
        column: u16,
        cell: SheetCell<'_>,
        style: Option<&CellStyle>,
    ) -> Result<(), Error> {
        match (cell, style) {
            (SheetCell::Blank, None) => {}
            (SheetCell::Blank, Some(style)) => {
                self.write_blank(row, column, style.format())?;
            }
            (SheetCell::Number(number), None) => {
                self.write_number(row, column, number)?;
            }
            (SheetCell::Number(number), Some(style)) => {
                self.write_number_with_format(row, column, number, style.format())?;
            }
            (SheetCell::Text(text), None) => {
                self.write_string(row, column, text.as_ref())?;
            }
            (SheetCell::Text(text), Some(style)) => {
                self.write_string_with_format(row, column, text.as_ref(), style.format())?;
            }
        }
        Ok(())
    }
}

/// Fixed row offsets of the header row and the first data row.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SheetLayout {
    pub header_row: u32,
    pub data_row: u32,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            header_row: 0,
            data_row: 1,
        }
    }
}

pub struct SheetTable<'a, S: CellSink + ?Sized> {
    style: &'a WorkbookStyle,
    sink: &'a mut S,
    layout: SheetLayout,
    rows_started: usize,
}

pub type SpreadsheetTableWriter<'a, S> = BaseTableWriter<SheetTable<'a, S>>;

fn sheet_column(index: usize) -> Result<u16, Error> {
    u16::try_from(index).map_err(|_| {
        Error::new(ErrorKind::Workbook)
            .with_message(format!("column index {index} exceeds the sheet column limit"))
    })
}

impl<'a, S: CellSink + ?Sized> SheetTable<'a, S> {
    pub fn new(style: &'a WorkbookStyle, sink: &'a mut S, layout: SheetLayout) -> Self {
        Self {
            style,
            sink,
            layout,
            rows_started: 0,
        }
    }

    pub fn layout(&self) -> SheetLayout {
        self.layout
    }

    fn current_row(&self) -> Result<u32, Error> {
        let offset = self.rows_started.saturating_sub(1);
        u32::try_from(offset)
            .ok()
            .and_then(|offset| self.layout.data_row.checked_add(offset))
            .ok_or_else(|| {
                Error::new(ErrorKind::Workbook)
                    .with_message(format!("row {offset} exceeds the sheet row limit"))
            })
    }
}

impl<S: CellSink + ?Sized> TableBackend for SheetTable<'_, S> {
    fn on_increment_row(&mut self, _headers: &Headers) -> Result<(), Error> {
        self.rows_started += 1;
        Ok(())
    }

    fn on_header_created(&mut self, name: &str, index: usize) -> Result<(), Error> {
        let column = sheet_column(index)?;
        self.sink.set_cell(
            self.layout.header_row,
            column,
            SheetCell::Text(name.into()),
            Some(self.style.header()),
        )
    }

    fn on_write_value(
        &mut self,
        index: usize,
        value: CellValue,
        value_type: ValueType,
    ) -> Result<(), Error> {
        let row = self.current_row()?;
        let column = sheet_column(index)?;
        let cell = sheet_cell(&value, value_type)?;
        let styles = self.style;
        let style = (value_type == ValueType::Instant).then(|| styles.date());
        self.sink.set_cell(row, column, cell, style)
    }

    fn on_closed(&mut self, headers: &Headers) -> Result<(), Error> {
        tracing::debug!(
            columns = headers.len(),
            rows = self.rows_started,
            "sheet table closed"
        );
        Ok(())
    }

    fn data_row_count(&self) -> usize {
        self.rows_started
    }
}

impl<'a, S: CellSink + ?Sized> BaseTableWriter<SheetTable<'a, S>> {
    pub fn new(style: &'a WorkbookStyle, sink: &'a mut S) -> Self {
        Self::with_layout(style, sink, SheetLayout::default())
    }

    pub fn with_layout(style: &'a WorkbookStyle, sink: &'a mut S, layout: SheetLayout) -> Self {
        BaseTableWriter::with_backend(SheetTable::new(style, sink, layout))
    }

    pub fn builder() -> SheetWriterBuilder<'a, S> {
        SheetWriterBuilder {
            style: None,
            sink: None,
            layout: SheetLayout::default(),
        }
    }
}

/// Assembles a sheet writer from parts that may not all be known up front.
pub struct SheetWriterBuilder<'a, S: CellSink + ?Sized> {
    style: Option<&'a WorkbookStyle>,
    sink: Option<&'a mut S>,
    layout: SheetLayout,
}

impl<'a, S: CellSink + ?Sized> SheetWriterBuilder<'a, S> {
    pub fn style(mut self, style: &'a WorkbookStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn sink(mut self, sink: &'a mut S) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn layout(mut self, layout: SheetLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn build(self) -> Result<SpreadsheetTableWriter<'a, S>, Error> {
        let style = self.style.ok_or_else(|| {
            Error::new(ErrorKind::MissingDependency).with_message("sheet writer needs a workbook style")
        })?;
        let sink = self.sink.ok_or_else(|| {
            Error::new(ErrorKind::MissingDependency).with_message("sheet writer needs a cell sink")
        })?;
        Ok(SpreadsheetTableWriter::with_layout(style, sink, self.layout))
    }
}
