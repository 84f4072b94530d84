use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub const HEADER: [&str; 9] = [
    "type",
    "id",
    "product_id",
    "subscription_group_id",
    "purchase_date",
    "price",
    "currency",
    "code",
    "message",
];

/// Writes a store updates CSV with the given rows to a temp file.
pub fn updates_file(rows: &[&[&str]]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    {
        let mut wtr = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(file.as_file_mut());
        wtr.write_record(HEADER).unwrap();
        for row in rows {
            wtr.write_record(*row).unwrap();
        }
        wtr.flush().unwrap();
    }
    file.flush().unwrap();
    file
}

/// Writes `renewals` renewals per group for `groups` groups, each group's
/// renewals dated 1..=renewals and emitted newest first.
#[allow(dead_code)]
pub fn generate_reversed_renewals(path: &Path, groups: usize, renewals: i64) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);
    wtr.write_record(&HEADER[..5])?;

    for group in 1..=groups {
        for date in (1..=renewals).rev() {
            wtr.write_record(&[
                "purchase",
                format!("G{group}-T{date}").as_str(),
                "pro.monthly",
                format!("G{group}").as_str(),
                date.to_string().as_str(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
