//! Application layer orchestrating the wallet use cases.
//!
//! `LedgerEngine` runs top-ups and wallet payments as atomic units against a
//! `LedgerStore`; `TransactionFeed` exposes live per-account history views.

pub mod engine;
pub mod feed;
