//! CSV adapters for the `wallet` binary.

pub mod account_writer;
pub mod method_writer;
pub mod operation_reader;
pub mod replay;
pub mod transaction_writer;
