pub mod table;
pub mod csv;

pub use table::{Table, DataType, Value, Schema, Column, Row};
pub use csv::{CsvReader, CsvWriter, CsvError};
