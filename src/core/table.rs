//! Purpose: The table-writing contract and the bookkeeping every backend shares.
//! Exports: `TableWriter`, `HeaderRef`, `Headers`, `TableBackend`, `BaseTableWriter`, `run_and_close`.
//! Role: Producers drive `TableWriter`; backends only implement `TableBackend` hooks.
//! Invariants: Header indices are assigned once, in first-seen order, and never change.
//! Invariants: `on_header_created` runs before the header is registered.
//! Invariants: A writer closes exactly once; every operation after that fails.
use std::collections::HashMap;

use crate::core::error::{Error, ErrorKind};
use crate::core::value::{CellValue, ValueType};

/// Addresses a column either by header name or by header index.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HeaderRef<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for HeaderRef<'a> {
    fn from(name: &'a str) -> Self {
        HeaderRef::Name(name)
    }
}

impl<'a> From<&'a String> for HeaderRef<'a> {
    fn from(name: &'a String) -> Self {
        HeaderRef::Name(name.as_str())
    }
}

impl From<usize> for HeaderRef<'_> {
    fn from(index: usize) -> Self {
        HeaderRef::Index(index)
    }
}

/// Append-only, bidirectional header registry.
#[derive(Clone, Debug, Default)]
pub struct Headers {
    by_name: HashMap<String, usize>,
    names: Vec<String>,
}

impl Headers {
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Header names in index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn push(&mut self, name: &str) -> usize {
        let index = self.names.len();
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), index);
        index
    }
}

pub trait TableWriter {
    /// Start a new row. Must be called before the first write.
    fn increment_row(&mut self) -> Result<(), Error>;

    /// Create a header, or return the index of an existing one.
    fn create_header(&mut self, name: &str) -> Result<usize, Error>;

    /// Write into the current row. Named headers are created on demand.
    fn write_value(
        &mut self,
        header: HeaderRef<'_>,
        value: CellValue,
        declared: Option<ValueType>,
    ) -> Result<(), Error>;

    /// Flush pending state. Repeated calls are no-ops.
    fn close(&mut self) -> Result<(), Error>;

    fn is_closed(&self) -> bool;

    fn header_index(&self, name: &str) -> Option<usize>;

    fn header_name(&self, index: usize) -> Option<&str>;

    fn header_count(&self) -> usize;

    fn headers(&self) -> &[String];

    /// Number of rows started so far.
    fn data_row_count(&self) -> usize;

    fn write<'h>(
        &mut self,
        header: impl Into<HeaderRef<'h>>,
        value: impl Into<CellValue>,
    ) -> Result<(), Error>
    where
        Self: Sized,
    {
        self.write_value(header.into(), value.into(), None)
    }

    fn write_typed<'h>(
        &mut self,
        header: impl Into<HeaderRef<'h>>,
        value: impl Into<CellValue>,
        value_type: ValueType,
    ) -> Result<(), Error>
    where
        Self: Sized,
    {
        self.write_value(header.into(), value.into(), Some(value_type))
    }
}

/// Backend hooks invoked by [`BaseTableWriter`].
pub trait TableBackend {
    fn on_increment_row(&mut self, headers: &Headers) -> Result<(), Error>;

    /// Runs before `name` is registered at `index`; an error leaves the header absent.
    fn on_header_created(&mut self, name: &str, index: usize) -> Result<(), Error>;

    fn on_write_value(
        &mut self,
        index: usize,
        value: CellValue,
        value_type: ValueType,
    ) -> Result<(), Error>;

    fn on_closed(&mut self, headers: &Headers) -> Result<(), Error>;

    fn data_row_count(&self) -> usize;
}

/// Shared header/row/close bookkeeping around an injected backend.
///
/// Dropping an unclosed writer closes it; failures at that point are only logged,
/// so callers that care about the outcome close explicitly.
pub struct BaseTableWriter<B: TableBackend> {
    headers: Headers,
    closed: bool,
    backend: B,
}

impl<B: TableBackend> BaseTableWriter<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            headers: Headers::default(),
            closed: false,
            backend,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub(crate) fn header_registry(&self) -> &Headers {
        &self.headers
    }

    pub(crate) fn check_closed(&self) -> Result<(), Error> {
        if self.closed {
            return Err(Error::closed_writer());
        }
        Ok(())
    }

    fn resolve(&mut self, header: HeaderRef<'_>) -> Result<usize, Error> {
        match header {
            HeaderRef::Name(name) => self.create_header(name),
            HeaderRef::Index(index) if index < self.headers.len() => Ok(index),
            HeaderRef::Index(index) => Err(Error::new(ErrorKind::UnknownHeader).with_message(
                format!(
                    "illegal header index {index} (header count: {})",
                    self.headers.len()
                ),
            )),
        }
    }
}

impl<B: TableBackend> TableWriter for BaseTableWriter<B> {
    fn increment_row(&mut self) -> Result<(), Error> {
        self.check_closed()?;
        self.backend.on_increment_row(&self.headers)
    }

    fn create_header(&mut self, name: &str) -> Result<usize, Error> {
        self.check_closed()?;
        if let Some(index) = self.headers.index_of(name) {
            return Ok(index);
        }
        let index = self.headers.len();
        self.backend.on_header_created(name, index)?;
        Ok(self.headers.push(name))
    }

    fn write_value(
        &mut self,
        header: HeaderRef<'_>,
        value: CellValue,
        declared: Option<ValueType>,
    ) -> Result<(), Error> {
        self.check_closed()?;
        if self.backend.data_row_count() == 0 {
            return Err(Error::new(ErrorKind::NoActiveRow)
                .with_message("no active row")
                .with_hint("Call increment_row() before the first write."));
        }
        let index = self.resolve(header)?;
        let value_type = value.effective_type(declared);
        self.backend.on_write_value(index, value, value_type)
    }

    fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.backend.on_closed(&self.headers)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn header_index(&self, name: &str) -> Option<usize> {
        self.headers.index_of(name)
    }

    fn header_name(&self, index: usize) -> Option<&str> {
        self.headers.name_of(index)
    }

    fn header_count(&self) -> usize {
        self.headers.len()
    }

    fn headers(&self) -> &[String] {
        self.headers.names()
    }

    fn data_row_count(&self) -> usize {
        self.backend.data_row_count()
    }
}

impl<B: TableBackend> Drop for BaseTableWriter<B> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "implicit table close failed");
        }
    }
}

/// Run `body` against `writer`, then close it on every exit path.
///
/// The body's error wins over a close error.
pub fn run_and_close<W, T, F>(writer: &mut W, body: F) -> Result<T, Error>
where
    W: TableWriter + ?Sized,
    F: FnOnce(&mut W) -> Result<T, Error>,
{
    let outcome = body(writer);
    let closed = writer.close();
    let value = outcome?;
    closed?;
    Ok(value)
}
