//! Purpose: Library crate behind the `rema-export` CLI and its tests.
//! Exports: `api` (stable surface), `core` (table engine), `model`, `json`, `convert`, `export`.
//! Role: Turns a retail export document into table views rendered as a workbook or SQL script.
//! Invariants: Data flows one way: model -> converter -> table writer -> bytes.
//! Invariants: Library code reports failures as `core::error::Error`; it never prints.
pub mod api;
pub mod convert;
pub mod core;
pub mod export;
pub mod json;
pub mod model;
