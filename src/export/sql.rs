//! Purpose: Render the export document as one SQL script (schema plus data per table).
//! Exports: `SQL_TABLES`, `write_sql_script`.
//! Role: Runs one `SqlTableWriter` per table, in sequence, over a shared sink.
//! Invariants: Every column is declared up front, so empty tables still get a typed schema.
//! Invariants: Key metadata ties receipts, payments, and offers to `Transactions`.
use std::io::Write;

use crate::convert::{HeaderNaming, TableConverter, TableView};
use crate::core::error::Error;
use crate::core::sql::{ColumnDescriptor, SqlOptions, SqlTableWriter};
use crate::core::table::run_and_close;
use crate::model::DataRoot;

use super::{DestinationFormat, ExportOptions, ExportSummary, TableSummary};

const TRANSACTIONS: &str = "Transactions";
const RECEIPT_ENTRIES: &str = "ReceiptEntries";
const TRANSACTION_ID: &str = "transaction_id";
const RECEIPT_ENTRY_ID: &str = "receipt_entry_id";

/// Output tables in script order.
pub const SQL_TABLES: &[(&str, TableView)] = &[
    ("TopList", TableView::TopList),
    (TRANSACTIONS, TableView::Transactions),
    (RECEIPT_ENTRIES, TableView::Receipts),
    ("TransactionsPayments", TableView::Payments),
    ("UsedOffers", TableView::UsedOffers),
];

fn with_keys(table: &str, column: &str, descriptor: ColumnDescriptor) -> ColumnDescriptor {
    match (table, column) {
        (TRANSACTIONS, TRANSACTION_ID) | (RECEIPT_ENTRIES, RECEIPT_ENTRY_ID) => {
            descriptor.primary_key()
        }
        (RECEIPT_ENTRIES, TRANSACTION_ID) => descriptor
            .primary_key()
            .references(TRANSACTIONS, TRANSACTION_ID),
        (_, TRANSACTION_ID) if table != TRANSACTIONS && table != "TopList" => {
            descriptor.references(TRANSACTIONS, TRANSACTION_ID)
        }
        _ => descriptor,
    }
}

fn column_descriptors(
    converter: &TableConverter,
    table: &str,
    view: TableView,
) -> Vec<(String, ColumnDescriptor)> {
    view.columns()
        .iter()
        .map(|column| {
            let header = converter.header_name(column).into_owned();
            let descriptor = ColumnDescriptor::new(header.as_str()).with_type(column.value_type);
            let descriptor = with_keys(table, &header, descriptor);
            (header, descriptor)
        })
        .collect()
}

pub fn write_sql_script<W: Write + ?Sized>(
    root: &DataRoot,
    options: &ExportOptions,
    sink: &mut W,
) -> Result<ExportSummary, Error> {
    let converter = TableConverter::new(HeaderNaming::SqlIdentifier);
    let sql_options = SqlOptions {
        line_ending: options.line_ending,
    };
    let mut tables = Vec::with_capacity(SQL_TABLES.len());

    for &(name, view) in SQL_TABLES {
        let mut writer = SqlTableWriter::with_options(name, &mut *sink, sql_options);
        for (header, descriptor) in column_descriptors(&converter, name, view) {
            writer.put_column_descriptor(&header, descriptor)?;
        }
        let summary = run_and_close(&mut writer, |writer| {
            converter.write_view(view, writer, root)?;
            Ok(TableSummary::capture(name, writer))
        })?;
        tables.push(summary);
    }
    sink.flush()?;
    Ok(ExportSummary::finished(DestinationFormat::Sql, tables))
}
