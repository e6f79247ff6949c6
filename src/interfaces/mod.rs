//! Driving adapters: ways into and out of the ledger.

pub mod csv;
