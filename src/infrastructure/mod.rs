//! Adapters for the external catalog, directory and ledger services.

pub mod in_memory;
