//! Domain types and the ports the ledger engine depends on.

pub mod account;
pub mod fees;
pub mod gateway;
pub mod money;
pub mod payment_method;
pub mod ports;
pub mod session;
pub mod transaction;
