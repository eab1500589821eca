//! Serialization helpers for decoded trace structures.
//!
//! JSON and CBOR read/write utilities with extension-based auto-detection.
//! Unknown/missing extensions are rejected for reads and default to JSON
//! for writes. [`write_jsonl`] streams one JSON object per line for large
//! per-edge outputs.

use crate::error::{Result, TraceError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Ensure the parent directory for a file exists (no-op if none).
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    Ok(())
}

/// Read any `T` from **JSON**.
pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path_ref = path.as_ref();
    let rdr = BufReader::new(File::open(path_ref)?);
    serde_json::from_reader(rdr).map_err(|source| TraceError::Metadata {
        path: display(path_ref),
        source,
    })
}

/// Write any `T` to **JSON** (pretty).
pub fn write_json<T: Serialize, P: AsRef<Path>>(path: P, v: &T) -> Result<()> {
    let path_ref = path.as_ref();
    ensure_parent_dir(path_ref)?;
    let mut w = BufWriter::new(File::create(path_ref)?);
    serde_json::to_writer_pretty(&mut w, v).map_err(std::io::Error::from)?;
    w.flush()?;
    Ok(())
}

/// Read any `T` from **CBOR**.
pub fn read_cbor<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path_ref = path.as_ref();
    let mut rdr = BufReader::new(File::open(path_ref)?);
    ciborium::de::from_reader(&mut rdr).map_err(|e| {
        TraceError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("deserialize CBOR {}: {e}", display(path_ref)),
        ))
    })
}

/// Write any `T` to **CBOR**.
pub fn write_cbor<T: Serialize, P: AsRef<Path>>(path: P, v: &T) -> Result<()> {
    let path_ref = path.as_ref();
    ensure_parent_dir(path_ref)?;
    let mut w = BufWriter::new(File::create(path_ref)?);
    ciborium::ser::into_writer(v, &mut w).map_err(|e| match e {
        ciborium::ser::Error::Io(io) => TraceError::Io(io),
        ciborium::ser::Error::Value(msg) => {
            TraceError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, msg))
        }
    })?;
    w.flush()?;
    Ok(())
}

/// Auto-detect read by extension `.json` / `.cbor` (case-insensitive).
pub fn read_auto<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("json") => read_json(path),
        Some("cbor") => read_cbor(path),
        Some(other) => Err(TraceError::Config(format!(
            "unsupported extension: {other} (supported: .json, .cbor)"
        ))),
        None => Err(TraceError::Config(
            "path has no extension (expected .json or .cbor)".to_owned(),
        )),
    }
}

/// Auto-detect write (defaults to **JSON** if unknown or missing).
pub fn write_auto<T: Serialize, P: AsRef<Path>>(path: P, v: &T) -> Result<()> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("cbor") => write_cbor(path, v),
        _ => write_json(path, v),
    }
}

/// Write items as JSON Lines (one object per line).
///
/// Takes an iterator so callers can stream without collecting first.
pub fn write_jsonl<P, T, I>(path: P, items: I) -> Result<usize>
where
    P: AsRef<Path>,
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let path_ref = path.as_ref();
    ensure_parent_dir(path_ref)?;
    let mut w = BufWriter::new(File::create(path_ref)?);
    let mut n = 0usize;
    for it in items {
        serde_json::to_writer(&mut w, &it).map_err(std::io::Error::from)?;
        w.write_all(b"\n")?;
        n += 1;
    }
    w.flush()?;
    Ok(n)
}

/// Return the lowercase extension (without dot) if present.
fn ext_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Human-friendly path display for error messages.
fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GlobalBlockId, Interval};
    use std::collections::BTreeMap;

    fn tmp_path(name: &str, ext: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("lodsum_core_io_{name}_{nanos}.{ext}"));
        p
    }

    fn sample() -> BTreeMap<GlobalBlockId, Interval> {
        let mut m = BTreeMap::new();
        m.insert(GlobalBlockId(4), Interval::new(1, 3).unwrap());
        m.insert(GlobalBlockId::singleton(0), Interval::new(2, 2).unwrap());
        m
    }

    #[test]
    fn interval_map_survives_cbor() {
        let path = tmp_path("intervals", "cbor");
        write_auto(&path, &sample()).unwrap();
        let got: BTreeMap<GlobalBlockId, Interval> = read_auto(&path).unwrap();
        assert_eq!(got, sample());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn unknown_extension_rejected_on_read() {
        let err = read_auto::<Vec<u32>, _>("results.yaml").unwrap_err();
        assert!(matches!(err, TraceError::Config(_)));
    }

    #[test]
    fn jsonl_writes_one_line_per_item() {
        let path = tmp_path("edges", "jsonl");
        let n = write_jsonl(&path, [Interval::new(1, 2).unwrap(), Interval::new(3, 4).unwrap()])
            .unwrap();
        assert_eq!(n, 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with(r#"{"start":1,"end":2}"#));
        let _ = std::fs::remove_file(path);
    }
}
