use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

pub const DATA_DIR: &str = "data";

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(())
}

/// Write one pretty-printed JSON document.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))
}

/// Line-per-record writer, flushed after every record.
pub struct JsonlWriter {
    out: BufWriter<File>,
}

impl JsonlWriter {
    pub fn create(path: &Path) -> Result<Self> {
        ensure_parent(path)?;
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(JsonlWriter {
            out: BufWriter::new(file),
        })
    }

    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Load a JSONL file, skipping lines that do not parse.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut records = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(r) => records.push(r),
            Err(e) => warn!("{}:{}: skipping unparseable line: {}", path.display(), n + 1, e),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn jsonl_skips_bad_lines() {
        let dir = std::env::temp_dir().join(format!("hf_org_profile_store_{}", std::process::id()));
        let path = dir.join("records.jsonl");
        {
            let mut w = JsonlWriter::create(&path).unwrap();
            w.write(&json!({ "id": "a" })).unwrap();
            w.write(&json!({ "id": "b" })).unwrap();
        }
        let mut raw = fs::read_to_string(&path).unwrap();
        raw.push_str("{broken\n\n");
        fs::write(&path, raw).unwrap();

        let records: Vec<Value> = read_jsonl(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["id"], json!("b"));
        fs::remove_dir_all(dir).unwrap();
    }
}
