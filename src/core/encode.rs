//! Purpose: Type-directed encoding of cell values for the SQL and sheet backends.
//! Exports: `sql_literal`, `push_sql_literal`, `sql_type`, `quote_identifier`, `quote_text`,
//! `SheetCell`, `sheet_cell`, `excel_serial`.
//! Role: Pure functions; backends decide where the encoded output goes.
//! Invariants: Null always encodes (SQL `null`, blank cell) whatever the declared type.
//! Invariants: Identifier and string quoting double the embedded quote character.
use std::borrow::Cow;
use std::fmt::Write as _;

use time::format_description::well_known::Rfc3339;

use crate::core::error::{Error, ErrorKind};
use crate::core::value::{CellValue, ValueType, unix_millis};

/// Days between the spreadsheet epoch (1899-12-30) and the Unix epoch.
const EXCEL_UNIX_EPOCH_DAYS: f64 = 25_569.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

fn unsupported(value_type: ValueType, target: &str) -> Error {
    Error::new(ErrorKind::UnsupportedType).with_message(format!(
        "no {target} encoding for values of type {value_type}"
    ))
}

/// Double-quote an SQL identifier. The empty name is passed through as-is.
pub fn quote_identifier(name: &str) -> Cow<'_, str> {
    if name.is_empty() {
        return Cow::Borrowed(name);
    }
    Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
}

pub fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

pub fn sql_literal(value: &CellValue) -> String {
    let mut out = String::new();
    push_sql_literal(&mut out, value);
    out
}

pub fn push_sql_literal(out: &mut String, value: &CellValue) {
    match value {
        CellValue::Null => out.push_str("null"),
        CellValue::Bool(flag) => out.push(if *flag { '1' } else { '0' }),
        CellValue::Int(number) => {
            let _ = write!(out, "{number}");
        }
        // NaN and infinities have no SQL literal.
        CellValue::Float(number) if !number.is_finite() => out.push_str("null"),
        CellValue::Float(number) => {
            let _ = write!(out, "{number}");
        }
        CellValue::Text(text) => out.push_str(&quote_text(text)),
        CellValue::Instant(instant) => {
            let _ = write!(out, "{}", unix_millis(instant));
        }
        CellValue::Binary(bytes) => {
            out.push_str("X'");
            for byte in bytes {
                let _ = write!(out, "{byte:02X}");
            }
            out.push('\'');
        }
    }
}

/// Column type keyword for a declared or observed value type.
pub fn sql_type(value_type: ValueType) -> Result<&'static str, Error> {
    match value_type {
        ValueType::Bool | ValueType::Int => Ok("INTEGER"),
        ValueType::Float => Ok("REAL"),
        ValueType::Text => Ok("TEXT"),
        ValueType::Binary => Ok("BLOB"),
        ValueType::Instant => Ok("DATETIME"),
        ValueType::Any => Err(unsupported(value_type, "SQL column")),
    }
}

/// A single cell write as understood by a sheet sink.
#[derive(Clone, Debug, PartialEq)]
pub enum SheetCell<'a> {
    Blank,
    Number(f64),
    Text(Cow<'a, str>),
}

pub fn excel_serial(instant: &time::OffsetDateTime) -> f64 {
    unix_millis(instant) as f64 / MILLIS_PER_DAY + EXCEL_UNIX_EPOCH_DAYS
}

fn mismatch(value: &CellValue, value_type: ValueType) -> Error {
    let found = value.value_type().map_or("null", ValueType::name);
    Error::new(ErrorKind::UnsupportedType).with_message(format!(
        "cannot write a {found} value into a {value_type} sheet cell"
    ))
}

fn bool_text(flag: bool) -> &'static str {
    if flag { "True" } else { "False" }
}

fn cell_text(value: &CellValue) -> Result<Cow<'_, str>, Error> {
    match value {
        CellValue::Text(text) => Ok(Cow::Borrowed(text)),
        CellValue::Bool(flag) => Ok(Cow::Borrowed(bool_text(*flag))),
        CellValue::Int(number) => Ok(Cow::Owned(number.to_string())),
        CellValue::Float(number) => Ok(Cow::Owned(number.to_string())),
        CellValue::Instant(instant) => instant.format(&Rfc3339).map(Cow::Owned).map_err(|err| {
            Error::new(ErrorKind::UnsupportedType)
                .with_message("instant has no text form")
                .with_source(err)
        }),
        CellValue::Null | CellValue::Binary(_) => Err(mismatch(value, ValueType::Text)),
    }
}

/// Encode a value for a sheet cell, dispatching on the effective type.
/// Booleans become the text "True"/"False"; null is always blank.
pub fn sheet_cell(value: &CellValue, value_type: ValueType) -> Result<SheetCell<'_>, Error> {
    if value.is_null() {
        return Ok(SheetCell::Blank);
    }
    match (value_type, value) {
        (ValueType::Text, value) => cell_text(value).map(SheetCell::Text),
        (ValueType::Int | ValueType::Float, CellValue::Int(number)) => {
            Ok(SheetCell::Number(*number as f64))
        }
        (ValueType::Int | ValueType::Float, CellValue::Float(number)) => {
            Ok(SheetCell::Number(*number))
        }
        (ValueType::Bool, CellValue::Bool(flag)) => {
            Ok(SheetCell::Text(Cow::Borrowed(bool_text(*flag))))
        }
        (ValueType::Instant, CellValue::Instant(instant)) => {
            Ok(SheetCell::Number(excel_serial(instant)))
        }
        (ValueType::Any | ValueType::Binary, _) => Err(unsupported(value_type, "sheet cell")),
        (_, value) => Err(mismatch(value, value_type)),
    }
}

#[cfg(test)]
mod tests {
    use super::{SheetCell, excel_serial, quote_identifier, sheet_cell, sql_literal, sql_type};
    use crate::core::error::ErrorKind;
    use crate::core::value::{CellValue, ValueType, instant_from_unix_millis};
    use std::borrow::Cow;

    #[test]
    fn literals_follow_type_rules() {
        assert_eq!(sql_literal(&CellValue::Null), "null");
        assert_eq!(sql_literal(&CellValue::Bool(true)), "1");
        assert_eq!(sql_literal(&CellValue::Bool(false)), "0");
        assert_eq!(sql_literal(&CellValue::Int(-42)), "-42");
        assert_eq!(sql_literal(&CellValue::Float(12.5)), "12.5");
        assert_eq!(sql_literal(&CellValue::Float(f64::NAN)), "null");
        assert_eq!(sql_literal(&CellValue::from("O'Brien")), "'O''Brien'");
        assert_eq!(sql_literal(&CellValue::Binary(vec![0x00, 0xab])), "X'00AB'");

        let instant = instant_from_unix_millis(1_529_400_000_123).expect("instant");
        assert_eq!(sql_literal(&CellValue::Instant(instant)), "1529400000123");
    }

    #[test]
    fn identifiers_are_quoted_unless_empty() {
        assert_eq!(quote_identifier("name"), "\"name\"");
        assert_eq!(quote_identifier("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(quote_identifier(""), "");
    }

    #[test]
    fn sql_types_cover_every_concrete_type() {
        assert_eq!(sql_type(ValueType::Bool).unwrap(), "INTEGER");
        assert_eq!(sql_type(ValueType::Int).unwrap(), "INTEGER");
        assert_eq!(sql_type(ValueType::Float).unwrap(), "REAL");
        assert_eq!(sql_type(ValueType::Text).unwrap(), "TEXT");
        assert_eq!(sql_type(ValueType::Binary).unwrap(), "BLOB");
        assert_eq!(sql_type(ValueType::Instant).unwrap(), "DATETIME");
        assert_eq!(
            sql_type(ValueType::Any).unwrap_err().kind(),
            ErrorKind::UnsupportedType
        );
    }

    #[test]
    fn sheet_cells_render_booleans_as_text() {
        assert_eq!(
            sheet_cell(&CellValue::Bool(true), ValueType::Bool).unwrap(),
            SheetCell::Text(Cow::Borrowed("True"))
        );
        assert_eq!(
            sheet_cell(&CellValue::Bool(false), ValueType::Bool).unwrap(),
            SheetCell::Text(Cow::Borrowed("False"))
        );
        assert_eq!(
            sheet_cell(&CellValue::Int(7), ValueType::Int).unwrap(),
            SheetCell::Number(7.0)
        );
    }

    #[test]
    fn sheet_null_is_blank_even_for_binary() {
        assert_eq!(
            sheet_cell(&CellValue::Null, ValueType::Binary).unwrap(),
            SheetCell::Blank
        );
        let err = sheet_cell(&CellValue::Binary(vec![1]), ValueType::Binary).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedType);
    }

    #[test]
    fn sheet_cells_follow_the_declared_type() {
        assert_eq!(
            sheet_cell(&CellValue::Int(42), ValueType::Text).unwrap(),
            SheetCell::Text(Cow::Borrowed("42"))
        );
        assert_eq!(
            sheet_cell(&CellValue::Bool(true), ValueType::Text).unwrap(),
            SheetCell::Text(Cow::Borrowed("True"))
        );
        let epoch = instant_from_unix_millis(0).expect("epoch");
        assert_eq!(
            sheet_cell(&CellValue::Instant(epoch), ValueType::Text).unwrap(),
            SheetCell::Text(Cow::Borrowed("1970-01-01T00:00:00Z"))
        );
        assert_eq!(
            sheet_cell(&CellValue::Int(3), ValueType::Float).unwrap(),
            SheetCell::Number(3.0)
        );

        for (value, value_type) in [
            (CellValue::Int(3), ValueType::Any),
            (CellValue::from("3"), ValueType::Int),
            (CellValue::Int(1), ValueType::Bool),
            (CellValue::Int(0), ValueType::Instant),
        ] {
            let err = sheet_cell(&value, value_type).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedType, "{value:?} as {value_type}");
        }
        assert_eq!(
            sheet_cell(&CellValue::Null, ValueType::Any).unwrap(),
            SheetCell::Blank
        );
    }

    #[test]
    fn excel_serial_counts_days_from_1899() {
        let epoch = instant_from_unix_millis(0).expect("epoch");
        assert_eq!(excel_serial(&epoch), 25_569.0);
        let noon = instant_from_unix_millis(43_200_000).expect("noon");
        assert_eq!(excel_serial(&noon), 25_569.5);
    }
}
