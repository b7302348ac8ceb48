//! Application layer orchestrating the fee engine.
//!
//! `FeeCoordinator` owns every derived-data cache and is the only component
//! that reads or writes it. `PaymentGateway` validates submissions, writes
//! them to the ledger and tells the coordinator what to invalidate.

pub mod cache;
pub mod coordinator;
pub mod gateway;
pub mod retry;
