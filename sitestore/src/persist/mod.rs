// Table file I/O - one JSON array per table

use crate::error::Result;
use serde_json::Value;
use std::io::Write;
use std::path::Path;

/// How table files are written.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    pub pretty: bool,
    pub atomic: bool,
}

/// Read a table file into memory.
///
/// A missing file is an empty table. An unreadable file, malformed JSON, or a
/// top-level value that is not an array is logged and also treated as empty.
pub fn read_table(path: &Path) -> Vec<Value> {
    if !path.exists() {
        log::debug!("Table file {} does not exist yet", path.display());
        return Vec::new();
    }

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Failed to read table file {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            log::warn!(
                "Table file {} does not contain a JSON array (found {}), treating as empty",
                path.display(),
                json_kind(&other)
            );
            Vec::new()
        }
        Err(e) => {
            log::warn!("Corrupt table file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Rewrite a table file with the full contents of `items`.
///
/// The parent directory is created if needed. With `atomic`, the data lands in
/// a temp file next to the target and is renamed over it, so readers never see
/// a half-written table.
pub fn write_table(path: &Path, items: &[Value], options: WriteOptions) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let bytes = if options.pretty {
        serde_json::to_vec_pretty(items)?
    } else {
        serde_json::to_vec(items)?
    };

    if options.atomic {
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)?;
    } else {
        std::fs::write(path, &bytes)?;
    }

    log::debug!("Wrote {} records to {}", items.len(), path.display());
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
