use crate::domain::account::{Account, Role};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct AccountRow<'a> {
    account: &'a str,
    role: Role,
    contact: &'a str,
    balance: String,
}

/// Writes final account balances as `account,role,contact,balance`.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes a header and one row per account, in the order given.
    pub fn write_accounts<'a>(
        &mut self,
        accounts: impl IntoIterator<Item = &'a Account>,
    ) -> Result<()> {
        let mut empty = true;
        for account in accounts {
            empty = false;
            self.writer.serialize(AccountRow {
                account: &account.id,
                role: account.role,
                contact: &account.email,
                balance: format!("{:.2}", account.balance.value()),
            })?;
        }
        if empty {
            self.writer
                .write_record(["account", "role", "contact", "balance"])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
