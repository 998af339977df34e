//! Purpose: Render the export document as a styled workbook, one sheet per table view.
//! Exports: `INFO_SHEET`, `TOP_LIST_SHEET`, `TRANSACTION_SHEETS`, `write_workbook`.
//! Role: Creates sheets, runs a sheet writer per view, then serializes the workbook.
//! Invariants: Sheet order is Info (when totals exist), TopList, then the transaction sheets.
//! Invariants: Transaction sheets are only created when at least one transaction exists.
use std::io::Write;

use rust_xlsxwriter::{Workbook, Worksheet};

use crate::convert::{TableConverter, TableView};
use crate::core::encode::SheetCell;
use crate::core::error::Error;
use crate::core::sheet::{CellSink, SheetLayout, SpreadsheetTableWriter, WorkbookStyle};
use crate::core::table::run_and_close;
use crate::model::{DataRoot, TransactionsInfo};

use super::{DestinationFormat, ExportOptions, ExportSummary, TableSummary};

pub const INFO_SHEET: &str = "Info";
pub const TOP_LIST_SHEET: &str = "TopList";

pub const TRANSACTION_SHEETS: &[(&str, TableView)] = &[
    ("Transactions", TableView::Transactions),
    ("Receipt Entries", TableView::JoinedTransactions),
    ("Transactions Payments", TableView::Payments),
    ("Used Offers", TableView::UsedOffers),
];

fn add_sheet<'w>(workbook: &'w mut Workbook, name: &str) -> Result<&'w mut Worksheet, Error> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;
    tracing::debug!(sheet = name, "worksheet created");
    Ok(sheet)
}

/// Label/value pairs: bold label in column 0, number in column 1.
fn write_info<S: CellSink + ?Sized>(
    style: &WorkbookStyle,
    sheet: &mut S,
    info: &TransactionsInfo,
) -> Result<(), Error> {
    let lines = [
        ("Bonus Total", info.bonus_total),
        ("Discount Total", info.discount_total),
        ("Purchase Total", info.purchase_total),
    ];
    for (row, (label, value)) in (0u32..).zip(lines) {
        sheet.set_cell(row, 0, SheetCell::Text(label.into()), Some(style.header()))?;
        sheet.set_cell(row, 1, SheetCell::Number(value), None)?;
    }
    Ok(())
}

fn write_table_sheet(
    workbook: &mut Workbook,
    style: &WorkbookStyle,
    layout: SheetLayout,
    name: &str,
    view: TableView,
    root: &DataRoot,
) -> Result<TableSummary, Error> {
    let converter = TableConverter::default();
    let sheet = add_sheet(workbook, name)?;
    let mut writer = SpreadsheetTableWriter::with_layout(style, sheet, layout);
    run_and_close(&mut writer, |writer| {
        converter.write_view(view, writer, root)?;
        Ok(TableSummary::capture(name, writer))
    })
    .map_err(|err| err.with_table(name))
}

pub fn write_workbook<W: Write + ?Sized>(
    root: &DataRoot,
    options: &ExportOptions,
    sink: &mut W,
) -> Result<ExportSummary, Error> {
    let style = WorkbookStyle::default();
    let mut workbook = Workbook::new();
    let mut tables = Vec::new();

    if let Some(info) = &root.transactions_info {
        let sheet = add_sheet(&mut workbook, INFO_SHEET)?;
        write_info(&style, sheet, info)?;
    }
    tables.push(write_table_sheet(
        &mut workbook,
        &style,
        options.layout,
        TOP_LIST_SHEET,
        TableView::TopList,
        root,
    )?);

    if !root.transactions().is_empty() {
        for &(name, view) in TRANSACTION_SHEETS {
            tables.push(write_table_sheet(
                &mut workbook,
                &style,
                options.layout,
                name,
                view,
                root,
            )?);
        }
    }

    let bytes = workbook.save_to_buffer()?;
    sink.write_all(&bytes)?;
    sink.flush()?;
    Ok(ExportSummary::finished(DestinationFormat::Xlsx, tables))
}

#[cfg(test)]
mod tests {
    use super::write_info;
    use crate::core::sheet::StyleRole;
    use crate::core::sheet::WorkbookStyle;
    use crate::core::sheet::memory::MemorySheet;
    use crate::model::TransactionsInfo;

    #[test]
    fn info_sheet_lists_totals_with_bold_labels() {
        let style = WorkbookStyle::default();
        let mut sheet = MemorySheet::default();
        let info = TransactionsInfo {
            bonus_total: 1.5,
            purchase_total: 300.0,
            discount_total: 12.0,
            transactions: Vec::new(),
        };
        write_info(&style, &mut sheet, &info).expect("info");
        assert_eq!(sheet.text(0, 0), Some("Bonus Total"));
        assert_eq!(sheet.style(0, 0), Some(StyleRole::Header));
        assert_eq!(sheet.number(0, 1), Some(1.5));
        assert_eq!(sheet.text(1, 0), Some("Discount Total"));
        assert_eq!(sheet.number(1, 1), Some(12.0));
        assert_eq!(sheet.text(2, 0), Some("Purchase Total"));
        assert_eq!(sheet.number(2, 1), Some(300.0));
        assert_eq!(sheet.style(2, 1), None);
    }
}
