// Core modules implementing the table writers, value encoding, and error modeling.
pub mod encode;
pub mod error;
pub mod sheet;
pub mod sql;
pub mod table;
pub mod value;
