//! WAL record iterator.

use crate::error::{CoreError, CoreResult};
use crate::wal::record::{WalRecord, WalRecordType, CRC_SIZE, HEADER_SIZE, WAL_MAGIC, WAL_VERSION};

/// An iterator over the records of a WAL image.
///
/// Yields `(offset, record)` pairs. A truncated header or payload at the end
/// of the image ends iteration without an error; [`torn_tail`] then reports
/// where the valid prefix stops.
///
/// - CRC mismatches return an error
/// - Invalid magic bytes return a corruption error
/// - Unknown record types and future versions return a corruption error
///
/// [`torn_tail`]: WalRecordIterator::torn_tail
pub struct WalRecordIterator<'a> {
    data: &'a [u8],
    offset: usize,
    torn_tail: Option<u64>,
    finished: bool,
}

impl<'a> WalRecordIterator<'a> {
    /// Creates an iterator over a complete WAL image.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            torn_tail: None,
            finished: false,
        }
    }

    /// Offset of the first byte of an incomplete trailing record, if one was
    /// found.
    #[must_use]
    pub fn torn_tail(&self) -> Option<u64> {
        self.torn_tail
    }

    fn stop_torn(&mut self) -> CoreResult<Option<(u64, WalRecord)>> {
        self.finished = true;
        self.torn_tail = Some(self.offset as u64);
        Ok(None)
    }

    fn fail(&mut self, err: CoreError) -> CoreResult<Option<(u64, WalRecord)>> {
        self.finished = true;
        Err(err)
    }

    fn read_next_record(&mut self) -> CoreResult<Option<(u64, WalRecord)>> {
        if self.finished {
            return Ok(None);
        }

        let start = self.offset;
        let remaining = self.data.len() - start;
        if remaining == 0 {
            self.finished = true;
            return Ok(None);
        }
        if remaining < HEADER_SIZE {
            return self.stop_torn();
        }

        let header = &self.data[start..start + HEADER_SIZE];

        if header[0..4] != WAL_MAGIC {
            return self.fail(CoreError::wal_corruption(format!(
                "invalid magic at offset {start}"
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > WAL_VERSION {
            return self.fail(CoreError::wal_corruption(format!(
                "unsupported version {version} at offset {start}"
            )));
        }

        let type_byte = header[6];
        let Some(record_type) = WalRecordType::from_byte(type_byte) else {
            return self.fail(CoreError::wal_corruption(format!(
                "unknown record type {type_byte} at offset {start}"
            )));
        };

        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let total = HEADER_SIZE + payload_len + CRC_SIZE;
        if remaining < total {
            return self.stop_torn();
        }

        let body_end = start + HEADER_SIZE + payload_len;
        let crc_bytes = &self.data[body_end..body_end + CRC_SIZE];
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let computed = crc32fast::hash(&self.data[start..body_end]);
        if stored != computed {
            return self.fail(CoreError::ChecksumMismatch {
                expected: stored,
                actual: computed,
            });
        }

        let payload = &self.data[start + HEADER_SIZE..body_end];
        let record = match WalRecord::decode_payload(record_type, payload) {
            Ok(record) => record,
            Err(e) => return self.fail(e),
        };

        self.offset = start + total;
        Ok(Some((start as u64, record)))
    }
}

impl Iterator for WalRecordIterator<'_> {
    type Item = CoreResult<(u64, WalRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionId;

    fn image(records: &[WalRecord]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|r| r.to_bytes().unwrap())
            .collect()
    }

    fn begin(n: u64) -> WalRecord {
        WalRecord::Begin {
            txid: TransactionId::new(n),
        }
    }

    #[test]
    fn reads_every_record_with_offsets() {
        let data = image(&[begin(1), begin(2)]);
        let records: Vec<_> = WalRecordIterator::new(&data)
            .collect::<CoreResult<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, 0);
        assert_eq!(records[1].1, begin(2));
    }

    #[test]
    fn truncated_tail_ends_cleanly() {
        let mut data = image(&[begin(1), begin(2)]);
        let full = data.len();
        data.truncate(full - 3);

        let mut iter = WalRecordIterator::new(&data);
        let records: Vec<_> = iter.by_ref().collect::<CoreResult<_>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(iter.torn_tail(), Some(records[0].1.to_bytes().unwrap().len() as u64));
    }

    #[test]
    fn short_header_is_torn() {
        let mut data = image(&[begin(1)]);
        let first = data.len() as u64;
        data.extend_from_slice(&WAL_MAGIC);

        let mut iter = WalRecordIterator::new(&data);
        assert_eq!(iter.by_ref().count(), 1);
        assert_eq!(iter.torn_tail(), Some(first));
    }

    #[test]
    fn flipped_byte_is_checksum_error() {
        let mut data = image(&[begin(1)]);
        data[HEADER_SIZE] ^= 0xFF;
        let result: CoreResult<Vec<_>> = WalRecordIterator::new(&data).collect();
        assert!(matches!(result, Err(CoreError::ChecksumMismatch { .. })));
    }

    #[test]
    fn bad_magic_is_fatal() {
        let mut data = image(&[begin(1)]);
        data[0] = b'X';
        let result: CoreResult<Vec<_>> = WalRecordIterator::new(&data).collect();
        assert!(matches!(result, Err(CoreError::WalCorruption { .. })));
    }

    #[test]
    fn future_version_is_fatal() {
        let mut data = image(&[begin(1)]);
        data[4..6].copy_from_slice(&(WAL_VERSION + 1).to_le_bytes());
        let result: CoreResult<Vec<_>> = WalRecordIterator::new(&data).collect();
        assert!(matches!(result, Err(CoreError::WalCorruption { .. })));
    }
}
