use std::fs;
use std::io;
use std::path::Path;

use crate::types::Record;

/// Line written before and after every record.
pub const SEPARATOR: &str = "====================";

/// Renders records as `key: value` blocks framed by [`SEPARATOR`].
pub fn format_records(records: &[Record]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(SEPARATOR);
        out.push('\n');
        out.push_str(&record.to_string());
        out.push_str(SEPARATOR);
        out.push('\n');
    }
    out
}

/// Writes `contents` to `path`, creating missing parent directories first.
fn save(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

pub fn write_records(path: impl AsRef<Path>, records: &[Record]) -> io::Result<()> {
    let path = path.as_ref();
    save(path, &format_records(records))?;
    log::info!("Saved {} card(s) to {}", records.len(), path.display());
    Ok(())
}

pub fn records_to_json(records: &[Record]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}

pub fn write_records_json(path: impl AsRef<Path>, records: &[Record]) -> io::Result<()> {
    let path = path.as_ref();
    let json = records_to_json(records).map_err(io::Error::other)?;
    save(path, &json)?;
    log::info!("Saved {} card(s) as JSON to {}", records.len(), path.display());
    Ok(())
}
