//! CSV ingestion and reporting used by the command-line harness.

pub mod csv;
