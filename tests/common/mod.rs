#![allow(dead_code)]

use std::fs::File;
use std::io::Error;
use std::path::Path;
use tempfile::NamedTempFile;

pub const HEADER: [&str; 10] = [
    "type",
    "account",
    "role",
    "contact",
    "counterparty",
    "amount",
    "channel",
    "subject",
    "reference",
    "description",
];

/// Config with an always-accepting, zero-latency gateway.
pub const INSTANT_CONFIG: &str = "tests/fixtures/instant.json";

/// Writes `rows` under the operations header into a temp file.
pub fn operations_file<R, S>(rows: &[R]) -> NamedTempFile
where
    R: AsRef<[S]>,
    S: AsRef<[u8]>,
{
    let file = NamedTempFile::new().unwrap();
    let mut wtr = csv::Writer::from_path(file.path()).unwrap();
    wtr.write_record(HEADER).unwrap();
    for row in rows {
        wtr.write_record(row.as_ref()).unwrap();
    }
    wtr.flush().unwrap();
    file
}

pub fn open(account: &str, role: &str) -> [String; 10] {
    let contact = format!("{}@example.com", account.to_lowercase());
    [
        "open".into(),
        account.into(),
        role.into(),
        contact,
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
    ]
}

/// One funded client paying `rows` transfers of 1 to ten merchants.
pub fn generate_transfers(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(HEADER)?;
    wtr.write_record(&open("A", "client"))?;
    wtr.write_record([
        "top_up", "A", "", "", "", "50000", "mtn_momo", "76123456", "TOPUP-1", "",
    ])?;

    for i in 1..=rows {
        wtr.write_record([
            "transfer",
            "A",
            "",
            "",
            &format!("M{}", i % 10),
            "1",
            "",
            "",
            &format!("T-{i}"),
            "",
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
