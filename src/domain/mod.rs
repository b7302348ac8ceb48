//! Pure fee types, the residence filter, reconciliation and the ports to the
//! external catalog, directory and ledger services.

pub mod billing;
pub mod money;
pub mod payment;
pub mod ports;
pub mod reconcile;
pub mod residence;
pub mod student;
