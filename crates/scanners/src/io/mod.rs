//! Tabular input and output
//!
//! Input rows become `CodeUnit`s (or malformed records that still get a verdict);
//! output rows are the reporter's three-column records.

pub mod csv_io;

pub use csv_io::{
    read_output, read_output_from, read_units, read_units_from, write_output, write_output_to,
    InputRecord,
};
