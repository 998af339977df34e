//! Purpose: Provide the internal runtime JSON decode entrypoints.
//! Exports: `from_str`, `from_slice`, `from_reader`, `ParseFailureCategory`, `categorize_error`,
//! `categorize_message`, `hint_for_error`.
//! Role: Parser boundary that centralizes serde_json usage details.
//! Invariants: Category labels are stable strings; callers surface them in hints.
//! Invariants: Hints never echo input payload bytes.
//! Notes: Error mapping is done by callsites so domain context stays explicit.

use std::io::Read;

use serde::de::DeserializeOwned;
use serde_json::error::Category;

#[cfg(test)]
pub(crate) fn from_str<T: DeserializeOwned>(input: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(input)
}

pub(crate) fn from_slice<T: DeserializeOwned>(input: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(input)
}

pub(crate) fn from_reader<T: DeserializeOwned, R: Read>(reader: R) -> Result<T, serde_json::Error> {
    serde_json::from_reader(reader)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ParseFailureCategory {
    Syntax,
    Data,
    Eof,
    Io,
    NumericRange,
    Utf8,
    DepthLimit,
    Unknown,
}

impl ParseFailureCategory {
    pub(crate) fn label(self) -> &'static str {
        match self {
            ParseFailureCategory::Syntax => "syntax",
            ParseFailureCategory::Data => "data",
            ParseFailureCategory::Eof => "eof",
            ParseFailureCategory::Io => "io",
            ParseFailureCategory::NumericRange => "numeric-range",
            ParseFailureCategory::Utf8 => "utf8",
            ParseFailureCategory::DepthLimit => "depth-limit",
            ParseFailureCategory::Unknown => "unknown",
        }
    }
}

/// Message-based categories take priority; they are sharper than serde_json's own.
pub(crate) fn categorize_error(err: &serde_json::Error) -> ParseFailureCategory {
    let by_message = categorize_message(&err.to_string());
    if by_message != ParseFailureCategory::Unknown {
        return by_message;
    }
    match err.classify() {
        Category::Syntax => ParseFailureCategory::Syntax,
        Category::Data => ParseFailureCategory::Data,
        Category::Eof => ParseFailureCategory::Eof,
        Category::Io => ParseFailureCategory::Io,
    }
}

pub(crate) fn categorize_message(message: &str) -> ParseFailureCategory {
    let lower = message.to_ascii_lowercase();
    if lower.contains("recursion limit") {
        ParseFailureCategory::DepthLimit
    } else if lower.contains("out of range") {
        ParseFailureCategory::NumericRange
    } else if lower.contains("unicode") || lower.contains("utf-8") || lower.contains("utf8") {
        ParseFailureCategory::Utf8
    } else {
        ParseFailureCategory::Unknown
    }
}

pub(crate) fn hint_for_error(err: &serde_json::Error, context: &str) -> String {
    let category = categorize_error(err);
    let advice = match category {
        ParseFailureCategory::Syntax | ParseFailureCategory::Eof => {
            "Check that the input is one complete JSON document."
        }
        ParseFailureCategory::Data => "A field has an unexpected JSON type for the export format.",
        ParseFailureCategory::Io => "The input could not be read completely.",
        ParseFailureCategory::NumericRange => "A number does not fit the expected numeric type.",
        ParseFailureCategory::Utf8 => "The input must be UTF-8 encoded.",
        ParseFailureCategory::DepthLimit => "The document nests too deeply.",
        ParseFailureCategory::Unknown => "Check the input document.",
    };
    format!(
        "{advice} (parse category: {}; line {}, column {}; context: {context})",
        category.label(),
        err.line(),
        err.column()
    )
}
