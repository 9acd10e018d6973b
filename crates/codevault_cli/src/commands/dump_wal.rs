//! Dump WAL command implementation.

use super::{CliResult, Output};
use codevault_core::{WalRecord, WalRecordIterator};
use codevault_storage::{FileBackend, StorageBackend};
use serde::Serialize;
use std::path::Path;

/// WAL record representation for output.
#[derive(Debug, Serialize)]
pub struct WalRecordInfo {
    /// Offset in the WAL file.
    pub offset: u64,
    /// Record type.
    pub record_type: String,
    /// Transaction ID (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<u64>,
    /// Collection ID (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<u32>,
    /// Primary key (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Sequence number (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// Payload size in bytes (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<usize>,
}

impl WalRecordInfo {
    fn new(offset: u64, record: &WalRecord) -> Self {
        let mut info = Self {
            offset,
            record_type: format!("{:?}", record.record_type()).to_uppercase(),
            txid: record.txid().map(|txid| txid.as_u64()),
            collection_id: None,
            key: None,
            sequence: None,
            payload_size: None,
        };
        match record {
            WalRecord::Put {
                collection_id,
                key,
                payload,
                ..
            } => {
                info.collection_id = Some(collection_id.as_u32());
                info.key = Some(key.to_string());
                info.payload_size = Some(payload.len());
            }
            WalRecord::Delete {
                collection_id, key, ..
            } => {
                info.collection_id = Some(collection_id.as_u32());
                info.key = Some(key.to_string());
            }
            WalRecord::Clear { collection_id, .. } => {
                info.collection_id = Some(collection_id.as_u32());
            }
            WalRecord::Commit { sequence, .. } | WalRecord::Checkpoint { sequence, .. } => {
                info.sequence = Some(sequence.as_u64());
            }
            WalRecord::Begin { .. } | WalRecord::Abort { .. } => {}
        }
        info
    }
}

/// Runs the dump-wal command.
pub fn run(path: &Path, limit: Option<usize>, out: &Output) -> CliResult {
    let wal_path = path.join("wal.log");

    if !wal_path.exists() {
        return Err("WAL file not found".into());
    }

    let backend = FileBackend::open(&wal_path)?;
    let data = backend.read_all()?;
    let (records, torn_tail) = read_wal_records(&data, limit)?;

    out.emit(&records, || print_text_output(&records, torn_tail))
}

fn read_wal_records(
    data: &[u8],
    limit: Option<usize>,
) -> CliResult<(Vec<WalRecordInfo>, Option<u64>)> {
    let mut iter = WalRecordIterator::new(data);
    let mut records = Vec::new();
    let max_records = limit.unwrap_or(usize::MAX);

    for entry in iter.by_ref().take(max_records) {
        let (offset, record) = entry?;
        records.push(WalRecordInfo::new(offset, &record));
    }

    Ok((records, iter.torn_tail()))
}

fn print_text_output(records: &[WalRecordInfo], torn_tail: Option<u64>) {
    println!("WAL Records ({} total)", records.len());
    println!("================");
    println!();

    for record in records {
        print!("[{:08}] {:10}", record.offset, record.record_type);

        if let Some(txid) = record.txid {
            print!(" txid={txid}");
        }
        if let Some(seq) = record.sequence {
            print!(" seq={seq}");
        }
        if let Some(cid) = record.collection_id {
            print!(" collection={cid}");
        }
        if let Some(ref key) = record.key {
            print!(" key={key}");
        }
        if let Some(size) = record.payload_size {
            print!(" payload={size} bytes");
        }

        println!();
    }

    if let Some(offset) = torn_tail {
        println!();
        println!("Incomplete record at offset {offset}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codevault_core::{CodeVault, SaveOptions};

    #[test]
    fn dumps_committed_records() {
        let dir = tempfile::tempdir().unwrap();
        let vault = CodeVault::open(dir.path()).unwrap();
        vault
            .save_code("js", "print(1)", &SaveOptions::new().filename("a"))
            .unwrap();
        vault.close().unwrap();
        drop(vault);

        let data = std::fs::read(dir.path().join("wal.log")).unwrap();
        let (records, torn_tail) = read_wal_records(&data, None).unwrap();
        assert!(torn_tail.is_none());
        assert!(records.iter().any(|r| r.record_type == "PUT"
            && r.key.as_deref() == Some("\"js:a\"")
            && r.payload_size.is_some()));
        assert!(records.iter().any(|r| r.record_type == "COMMIT" && r.sequence.is_some()));

        let (limited, _) = read_wal_records(&data, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn reports_torn_tail() {
        let mut data = Vec::new();
        data.extend_from_slice(b"CVWL\x01\x00\x01\xff\x00\x00\x00partial");
        let (records, torn_tail) = read_wal_records(&data, None).unwrap();
        assert!(records.is_empty());
        assert_eq!(torn_tail, Some(0));
    }

    #[test]
    fn missing_wal_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = Output::new(crate::commands::Format::Text);
        assert!(run(dir.path(), None, &out).is_err());
    }
}
