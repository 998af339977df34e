//! Purpose: Walk the export model and drive a `TableWriter` once per logical table view.
//! Exports: `TableConverter`, `TableView`, `FieldColumn`, `FieldEncoding`, `HeaderNaming`,
//! and the per-view column lists.
//! Role: The only producer of rows; backends never see model types.
//! Invariants: Every row writes every column of its view, in the listed order.
//! Invariants: Transactions without receipt lines produce no rows in any transaction view.
//! Invariants: Each write carries the column's declared type, so all-null columns still type.
use std::borrow::Cow;

use crate::core::error::{Error, ErrorKind};
use crate::core::table::{HeaderRef, TableWriter};
use crate::core::value::{CellValue, ValueType, instant_from_unix_millis};
use crate::model::{DataRoot, ScorecardEntry, Transaction};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldEncoding {
    Plain,
    /// Integer epoch milliseconds written as an instant.
    UnixTime,
}

/// Static description of one output column.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FieldColumn {
    pub name: &'static str,
    pub value_type: ValueType,
    pub encoding: FieldEncoding,
}

const fn plain(name: &'static str, value_type: ValueType) -> FieldColumn {
    FieldColumn {
        name,
        value_type,
        encoding: FieldEncoding::Plain,
    }
}

const fn unix_time(name: &'static str) -> FieldColumn {
    FieldColumn {
        name,
        value_type: ValueType::Instant,
        encoding: FieldEncoding::UnixTime,
    }
}

impl FieldColumn {
    pub fn encode(&self, value: CellValue) -> Result<CellValue, Error> {
        match (self.encoding, value) {
            (FieldEncoding::UnixTime, CellValue::Int(millis)) => instant_from_unix_millis(millis)
                .map(CellValue::Instant)
                .ok_or_else(|| {
                    Error::new(ErrorKind::Parse)
                        .with_message(format!("timestamp {millis} ms is out of range"))
                        .with_column(self.name)
                }),
            (_, value) => Ok(value),
        }
    }
}

pub const TRANSACTION_COLUMNS: &[FieldColumn] = &[
    plain("Transaction ID", ValueType::Text),
    unix_time("Purchase Date"),
    plain("Store ID", ValueType::Text),
    plain("Store Name", ValueType::Text),
    plain("Transaction Amount", ValueType::Float),
    plain("Transaction Bonus Points", ValueType::Int),
    plain("Transaction Discount", ValueType::Float),
    plain("Transaction Net Amount", ValueType::Float),
];

pub const RECEIPT_COLUMNS: &[FieldColumn] = &[
    plain("Receipt Entry ID", ValueType::Int),
    plain("Transaction ID", ValueType::Text),
    plain("Product Code", ValueType::Text),
    plain("Product Description", ValueType::Text),
    plain("Product Text1", ValueType::Text),
    plain("Product Text2", ValueType::Text),
    plain("Barcode", ValueType::Text),
    plain("Product Group Code", ValueType::Text),
    plain("Product Group Desc", ValueType::Text),
    plain("Bonus Based", ValueType::Bool),
    plain("Pieces", ValueType::Int),
    plain("Product Price", ValueType::Float),
    plain("Product Discount", ValueType::Float),
    plain("Product Net Price", ValueType::Float),
    plain("Product Deposit", ValueType::Float),
    plain("Volume Amount", ValueType::Float),
    plain("Volume Unit", ValueType::Text),
];

/// Transaction header fields, the receipt line from Product Code on, then the amounts.
pub const JOINED_COLUMNS: &[FieldColumn] = &[
    plain("Transaction ID", ValueType::Text),
    plain("Receipt Entry ID", ValueType::Int),
    unix_time("Purchase Date"),
    plain("Store ID", ValueType::Text),
    plain("Store Name", ValueType::Text),
    plain("Product Code", ValueType::Text),
    plain("Product Description", ValueType::Text),
    plain("Product Text1", ValueType::Text),
    plain("Product Text2", ValueType::Text),
    plain("Barcode", ValueType::Text),
    plain("Product Group Code", ValueType::Text),
    plain("Product Group Desc", ValueType::Text),
    plain("Bonus Based", ValueType::Bool),
    plain("Pieces", ValueType::Int),
    plain("Product Price", ValueType::Float),
    plain("Product Discount", ValueType::Float),
    plain("Product Net Price", ValueType::Float),
    plain("Product Deposit", ValueType::Float),
    plain("Volume Amount", ValueType::Float),
    plain("Volume Unit", ValueType::Text),
    plain("Transaction Amount", ValueType::Float),
    plain("Transaction Bonus Points", ValueType::Int),
    plain("Transaction Discount", ValueType::Float),
    plain("Transaction Net Amount", ValueType::Float),
];

pub const PAYMENT_COLUMNS: &[FieldColumn] = &[
    plain("Transaction ID", ValueType::Text),
    plain("Means Of Payment Desc", ValueType::Text),
    plain("Amount", ValueType::Float),
];

pub const USED_OFFER_COLUMNS: &[FieldColumn] = &[
    plain("Transaction ID", ValueType::Text),
    plain("Receipt Entry ID", ValueType::Int),
    plain("Offer Code", ValueType::Text),
    plain("Offer Desc", ValueType::Text),
    plain("Discount Flat", ValueType::Float),
    plain("Discount Percent", ValueType::Float),
];

pub const TOP_LIST_COLUMNS: &[FieldColumn] = &[
    plain("Rank", ValueType::Int),
    plain("Product ID", ValueType::Text),
    plain("Product Name", ValueType::Text),
    plain("Product Description", ValueType::Text),
    plain("Product Group Code", ValueType::Text),
    plain("Product Group Desc", ValueType::Text),
    unix_time("Created Time"),
    unix_time("Modified Time"),
    plain("Amount Used", ValueType::Float),
    plain("Amount Saved", ValueType::Float),
    plain("Barcode", ValueType::Text),
    plain("Times Bought", ValueType::Int),
    plain("Items Bought", ValueType::Int),
    plain("Account ID", ValueType::Text),
    plain("Volume", ValueType::Float),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TableView {
    Transactions,
    /// Flat receipt lines keyed by (entry id, transaction id).
    Receipts,
    /// Receipt lines with their transaction's fields inlined.
    JoinedTransactions,
    Payments,
    UsedOffers,
    TopList,
}

impl TableView {
    pub fn columns(self) -> &'static [FieldColumn] {
        match self {
            TableView::Transactions => TRANSACTION_COLUMNS,
            TableView::Receipts => RECEIPT_COLUMNS,
            TableView::JoinedTransactions => JOINED_COLUMNS,
            TableView::Payments => PAYMENT_COLUMNS,
            TableView::UsedOffers => USED_OFFER_COLUMNS,
            TableView::TopList => TOP_LIST_COLUMNS,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum HeaderNaming {
    /// Column names as listed, e.g. "Transaction ID".
    #[default]
    Display,
    /// Lower-case with spaces replaced by underscores, e.g. "transaction_id".
    SqlIdentifier,
}

impl HeaderNaming {
    pub fn header_name(self, display: &str) -> Cow<'_, str> {
        match self {
            HeaderNaming::Display => Cow::Borrowed(display),
            HeaderNaming::SqlIdentifier => Cow::Owned(display.replace(' ', "_").to_lowercase()),
        }
    }
}

fn text(value: &Option<String>) -> CellValue {
    CellValue::from(value.as_deref())
}

fn entry_id(position: usize) -> CellValue {
    CellValue::Int(i64::try_from(position + 1).unwrap_or(i64::MAX))
}

fn transaction_cells(transaction: &Transaction) -> Vec<CellValue> {
    vec![
        text(&transaction.id),
        CellValue::Int(transaction.purchase_date),
        text(&transaction.store_id),
        text(&transaction.store_name),
        CellValue::Float(transaction.amount),
        CellValue::Int(transaction.bonus_points),
        CellValue::Float(transaction.discount),
        CellValue::Float(transaction.net_amount()),
    ]
}

fn receipt_cells(transaction: &Transaction, position: usize) -> Vec<CellValue> {
    let line = &transaction.receipt[position];
    vec![
        entry_id(position),
        text(&transaction.id),
        text(&line.product_code),
        text(&line.product_description),
        text(&line.product_text1),
        text(&line.product_text2),
        text(&line.barcode),
        text(&line.product_group_code),
        text(&line.product_group_desc),
        CellValue::Bool(line.bonus_based),
        CellValue::Int(line.pieces),
        CellValue::Float(line.price),
        CellValue::Float(line.discount),
        CellValue::Float(line.net_price()),
        CellValue::Float(line.deposit),
        CellValue::Float(line.volume),
        text(&line.unit),
    ]
}

fn joined_cells(transaction: &Transaction, position: usize) -> Vec<CellValue> {
    let mut header = transaction_cells(transaction);
    let amounts = header.split_off(4);
    let mut line = receipt_cells(transaction, position);
    let product = line.split_off(2);
    let receipt_id = line.swap_remove(0);

    let mut cells = Vec::with_capacity(JOINED_COLUMNS.len());
    let mut header = header.into_iter();
    cells.extend(header.next());
    cells.push(receipt_id);
    cells.extend(header);
    cells.extend(product);
    cells.extend(amounts);
    cells
}

fn scorecard_cells(entry: &ScorecardEntry) -> Vec<CellValue> {
    vec![
        CellValue::Int(entry.rank),
        text(&entry.product_id),
        text(&entry.product_name),
        text(&entry.product_description),
        text(&entry.product_group_code),
        text(&entry.product_group_desc),
        CellValue::Int(entry.created_time),
        CellValue::Int(entry.modified_time),
        CellValue::Float(entry.amount_used),
        CellValue::Float(entry.amount_saved),
        text(&entry.barcode),
        CellValue::Int(entry.times_bought),
        CellValue::Int(entry.items_bought),
        text(&entry.account_id),
        CellValue::Float(entry.volume),
    ]
}

/// Converts model records into rows; stateless apart from the header naming.
#[derive(Clone, Copy, Debug, Default)]
pub struct TableConverter {
    naming: HeaderNaming,
}

impl TableConverter {
    pub fn new(naming: HeaderNaming) -> Self {
        Self { naming }
    }

    pub fn naming(&self) -> HeaderNaming {
        self.naming
    }

    pub fn header_name<'a>(&self, column: &'a FieldColumn) -> Cow<'a, str> {
        self.naming.header_name(column.name)
    }

    pub fn write_view<W: TableWriter + ?Sized>(
        &self,
        view: TableView,
        writer: &mut W,
        root: &DataRoot,
    ) -> Result<(), Error> {
        match view {
            TableView::Transactions => self.write_transactions(writer, root.transactions()),
            TableView::Receipts => self.write_receipts(writer, root.transactions()),
            TableView::JoinedTransactions => {
                self.write_joined_transactions(writer, root.transactions())
            }
            TableView::Payments => self.write_payments(writer, root.transactions()),
            TableView::UsedOffers => self.write_used_offers(writer, root.transactions()),
            TableView::TopList => self.write_top_list(writer, root.scorecard()),
        }
    }

    pub fn write_transactions<W: TableWriter + ?Sized>(
        &self,
        writer: &mut W,
        transactions: &[Transaction],
    ) -> Result<(), Error> {
        let headers = self.create_headers(writer, TRANSACTION_COLUMNS)?;
        for transaction in transactions.iter().filter(|t| t.has_receipt()) {
            write_row(
                writer,
                &headers,
                TRANSACTION_COLUMNS,
                transaction_cells(transaction),
            )?;
        }
        Ok(())
    }

    pub fn write_receipts<W: TableWriter + ?Sized>(
        &self,
        writer: &mut W,
        transactions: &[Transaction],
    ) -> Result<(), Error> {
        let headers = self.create_headers(writer, RECEIPT_COLUMNS)?;
        for transaction in transactions {
            for position in 0..transaction.receipt.len() {
                write_row(
                    writer,
                    &headers,
                    RECEIPT_COLUMNS,
                    receipt_cells(transaction, position),
                )?;
            }
        }
        Ok(())
    }

    pub fn write_joined_transactions<W: TableWriter + ?Sized>(
        &self,
        writer: &mut W,
        transactions: &[Transaction],
    ) -> Result<(), Error> {
        let headers = self.create_headers(writer, JOINED_COLUMNS)?;
        for transaction in transactions {
            for position in 0..transaction.receipt.len() {
                write_row(
                    writer,
                    &headers,
                    JOINED_COLUMNS,
                    joined_cells(transaction, position),
                )?;
            }
        }
        Ok(())
    }

    pub fn write_payments<W: TableWriter + ?Sized>(
        &self,
        writer: &mut W,
        transactions: &[Transaction],
    ) -> Result<(), Error> {
        let headers = self.create_headers(writer, PAYMENT_COLUMNS)?;
        for transaction in transactions.iter().filter(|t| t.has_receipt()) {
            for payment in &transaction.payments {
                let cells = vec![
                    text(&transaction.id),
                    text(&payment.means_of_payment_desc),
                    CellValue::Float(payment.amount),
                ];
                write_row(writer, &headers, PAYMENT_COLUMNS, cells)?;
            }
        }
        Ok(())
    }

    pub fn write_used_offers<W: TableWriter + ?Sized>(
        &self,
        writer: &mut W,
        transactions: &[Transaction],
    ) -> Result<(), Error> {
        let headers = self.create_headers(writer, USED_OFFER_COLUMNS)?;
        for transaction in transactions {
            for (position, line) in transaction.receipt.iter().enumerate() {
                for offer in &line.used_offers {
                    let cells = vec![
                        text(&transaction.id),
                        entry_id(position),
                        text(&offer.offer_code),
                        text(&offer.offer_desc),
                        CellValue::Float(offer.discount_flat),
                        CellValue::Float(offer.discount_percent),
                    ];
                    write_row(writer, &headers, USED_OFFER_COLUMNS, cells)?;
                }
            }
        }
        Ok(())
    }

    /// Scorecard rows sorted by rank; equal ranks keep their input order.
    pub fn write_top_list<W: TableWriter + ?Sized>(
        &self,
        writer: &mut W,
        scorecard: &[ScorecardEntry],
    ) -> Result<(), Error> {
        let headers = self.create_headers(writer, TOP_LIST_COLUMNS)?;
        let mut entries: Vec<&ScorecardEntry> = scorecard.iter().collect();
        entries.sort_by_key(|entry| entry.rank);
        for entry in entries {
            write_row(writer, &headers, TOP_LIST_COLUMNS, scorecard_cells(entry))?;
        }
        Ok(())
    }

    fn create_headers<W: TableWriter + ?Sized>(
        &self,
        writer: &mut W,
        columns: &[FieldColumn],
    ) -> Result<Vec<usize>, Error> {
        columns
            .iter()
            .map(|column| writer.create_header(&self.header_name(column)))
            .collect()
    }
}

fn write_row<W: TableWriter + ?Sized>(
    writer: &mut W,
    headers: &[usize],
    columns: &[FieldColumn],
    cells: Vec<CellValue>,
) -> Result<(), Error> {
    writer.increment_row()?;
    for ((index, column), cell) in headers.iter().zip(columns).zip(cells) {
        let value = column.encode(cell)?;
        writer
            .write_value(HeaderRef::Index(*index), value, Some(column.value_type))
            .map_err(|err| {
                if err.column().is_some() {
                    err
                } else {
                    err.with_column(column.name)
                }
            })?;
    }
    Ok(())
}
