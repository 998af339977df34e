//! Purpose: JSON ingestion boundary for export documents.
//! Exports: `read_document`, `parse_document`; `parse` module with decode helpers.
//! Role: Single seam for parser implementation so callsites avoid ad hoc decode logic.
//! Invariants: Decode failures surface as `ErrorKind::Parse` with a category hint.
//! Invariants: Helper APIs stay small and deterministic (no hidden global state).

pub(crate) mod parse;

use std::io::Read;

use crate::core::error::{Error, ErrorKind};
use crate::model::DataRoot;

fn parse_error(err: serde_json::Error, context: &str) -> Error {
    let hint = parse::hint_for_error(&err, context);
    Error::new(ErrorKind::Parse)
        .with_message(format!("invalid export document: {err}"))
        .with_hint(hint)
        .with_source(err)
}

pub fn parse_document(input: &[u8]) -> Result<DataRoot, Error> {
    parse::from_slice(input).map_err(|err| parse_error(err, "document"))
}

pub fn read_document<R: Read>(reader: R) -> Result<DataRoot, Error> {
    parse::from_reader(reader).map_err(|err| {
        if err.is_io() {
            return Error::new(ErrorKind::Io)
                .with_message("failed to read export document")
                .with_source(err);
        }
        parse_error(err, "reader")
    })
}

#[cfg(test)]
mod tests {
    use super::{parse, parse_document, read_document};
    use crate::core::error::ErrorKind;
    use crate::model::DataRoot;

    #[test]
    fn empty_object_is_an_empty_document() {
        let root = parse_document(b"{}").expect("decode");
        assert!(root.transactions().is_empty());
        assert!(root.top_list.is_none());
        let from_text: DataRoot = parse::from_str("{}").expect("decode text");
        assert_eq!(from_text, root);
    }

    #[test]
    fn malformed_input_is_a_parse_error_with_hint() {
        let err = parse_document(br#"{"TopList": "#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.hint().unwrap_or_default().contains("parse category: eof"));

        let err = read_document(&br#"{"TopList": {"Scorecard": 3}}"#[..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.hint().unwrap_or_default().contains("parse category: data"));
    }
}
