//! WAL record types and serialization.

use crate::error::{CoreError, CoreResult};
use crate::types::{CollectionId, RecordKey, SequenceNumber, TransactionId};

/// Magic bytes identifying a WAL record.
pub const WAL_MAGIC: [u8; 4] = *b"CVWL";

/// Current WAL format version.
pub const WAL_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

/// Trailing CRC32.
pub(crate) const CRC_SIZE: usize = 4;

const KEY_TAG_INT: u8 = 0;
const KEY_TAG_TEXT: u8 = 1;

/// Type of WAL record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalRecordType {
    /// Begin a transaction.
    Begin = 1,
    /// Insert or replace a record.
    Put = 2,
    /// Delete a record.
    Delete = 3,
    /// Remove every record of a collection.
    Clear = 4,
    /// Commit a transaction.
    Commit = 5,
    /// Abort a transaction.
    Abort = 6,
    /// Snapshot marker written by a checkpoint.
    Checkpoint = 7,
}

impl WalRecordType {
    /// Converts a byte to a record type.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Begin),
            2 => Some(Self::Put),
            3 => Some(Self::Delete),
            4 => Some(Self::Clear),
            5 => Some(Self::Commit),
            6 => Some(Self::Abort),
            7 => Some(Self::Checkpoint),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A single WAL record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// Begin a transaction.
    Begin {
        /// Transaction ID.
        txid: TransactionId,
    },

    /// Insert or replace a record.
    Put {
        /// Transaction ID.
        txid: TransactionId,
        /// Target collection.
        collection_id: CollectionId,
        /// Primary key.
        key: RecordKey,
        /// Record body as JSON bytes.
        payload: Vec<u8>,
    },

    /// Delete a record.
    Delete {
        /// Transaction ID.
        txid: TransactionId,
        /// Target collection.
        collection_id: CollectionId,
        /// Primary key.
        key: RecordKey,
    },

    /// Remove every record of a collection.
    Clear {
        /// Transaction ID.
        txid: TransactionId,
        /// Target collection.
        collection_id: CollectionId,
    },

    /// Commit a transaction.
    Commit {
        /// Transaction ID.
        txid: TransactionId,
        /// Sequence number assigned to this commit.
        sequence: SequenceNumber,
    },

    /// Abort a transaction.
    Abort {
        /// Transaction ID.
        txid: TransactionId,
    },

    /// Head of a checkpoint snapshot.
    Checkpoint {
        /// Last committed sequence at checkpoint time.
        sequence: SequenceNumber,
        /// Auto-increment key generators: (collection, next key).
        generators: Vec<(CollectionId, u64)>,
    },
}

impl WalRecord {
    /// Maximum payload size; the envelope length field is 4 bytes.
    pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> WalRecordType {
        match self {
            Self::Begin { .. } => WalRecordType::Begin,
            Self::Put { .. } => WalRecordType::Put,
            Self::Delete { .. } => WalRecordType::Delete,
            Self::Clear { .. } => WalRecordType::Clear,
            Self::Commit { .. } => WalRecordType::Commit,
            Self::Abort { .. } => WalRecordType::Abort,
            Self::Checkpoint { .. } => WalRecordType::Checkpoint,
        }
    }

    /// Returns the transaction ID if this record belongs to one.
    #[must_use]
    pub fn txid(&self) -> Option<TransactionId> {
        match self {
            Self::Begin { txid }
            | Self::Put { txid, .. }
            | Self::Delete { txid, .. }
            | Self::Clear { txid, .. }
            | Self::Commit { txid, .. }
            | Self::Abort { txid } => Some(*txid),
            Self::Checkpoint { .. } => None,
        }
    }

    /// Serializes the record payload (without envelope).
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();

        match self {
            Self::Begin { txid } | Self::Abort { txid } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
            }

            Self::Put {
                txid,
                collection_id,
                key,
                payload,
            } => {
                if payload.len() > Self::MAX_PAYLOAD_SIZE {
                    return Err(CoreError::invalid_input(format!(
                        "record too large: {} bytes exceeds maximum of {} bytes",
                        payload.len(),
                        Self::MAX_PAYLOAD_SIZE
                    )));
                }
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                buf.extend_from_slice(&collection_id.as_u32().to_le_bytes());
                encode_key(&mut buf, key)?;
                buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
                buf.extend_from_slice(payload);
            }

            Self::Delete {
                txid,
                collection_id,
                key,
            } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                buf.extend_from_slice(&collection_id.as_u32().to_le_bytes());
                encode_key(&mut buf, key)?;
            }

            Self::Clear {
                txid,
                collection_id,
            } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                buf.extend_from_slice(&collection_id.as_u32().to_le_bytes());
            }

            Self::Commit { txid, sequence } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
            }

            Self::Checkpoint {
                sequence,
                generators,
            } => {
                buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
                let count = u32::try_from(generators.len())
                    .map_err(|_| CoreError::invalid_operation("too many key generators"))?;
                buf.extend_from_slice(&count.to_le_bytes());
                for (collection_id, next_key) in generators {
                    buf.extend_from_slice(&collection_id.as_u32().to_le_bytes());
                    buf.extend_from_slice(&next_key.to_le_bytes());
                }
            }
        }

        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    pub fn decode_payload(record_type: WalRecordType, payload: &[u8]) -> CoreResult<Self> {
        let mut reader = PayloadReader::new(payload);

        let record = match record_type {
            WalRecordType::Begin => Self::Begin {
                txid: TransactionId::new(reader.u64()?),
            },
            WalRecordType::Abort => Self::Abort {
                txid: TransactionId::new(reader.u64()?),
            },
            WalRecordType::Put => {
                let txid = TransactionId::new(reader.u64()?);
                let collection_id = CollectionId::new(reader.u32()?);
                let key = reader.key()?;
                let len = reader.u32()? as usize;
                let payload = reader.bytes(len)?.to_vec();
                Self::Put {
                    txid,
                    collection_id,
                    key,
                    payload,
                }
            }
            WalRecordType::Delete => Self::Delete {
                txid: TransactionId::new(reader.u64()?),
                collection_id: CollectionId::new(reader.u32()?),
                key: reader.key()?,
            },
            WalRecordType::Clear => Self::Clear {
                txid: TransactionId::new(reader.u64()?),
                collection_id: CollectionId::new(reader.u32()?),
            },
            WalRecordType::Commit => Self::Commit {
                txid: TransactionId::new(reader.u64()?),
                sequence: SequenceNumber::new(reader.u64()?),
            },
            WalRecordType::Checkpoint => {
                let sequence = SequenceNumber::new(reader.u64()?);
                let count = reader.u32()? as usize;
                let mut generators = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    let collection_id = CollectionId::new(reader.u32()?);
                    generators.push((collection_id, reader.u64()?));
                }
                Self::Checkpoint {
                    sequence,
                    generators,
                }
            }
        };

        reader.finish()?;
        Ok(record)
    }

    /// Encodes the full record: envelope, payload and CRC.
    pub fn to_bytes(&self) -> CoreResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::invalid_operation("WAL record payload too large"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&WAL_MAGIC);
        data.extend_from_slice(&WAL_VERSION.to_le_bytes());
        data.push(self.record_type().as_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = crc32fast::hash(&data);
        data.extend_from_slice(&crc.to_le_bytes());

        Ok(data)
    }
}

fn encode_key(buf: &mut Vec<u8>, key: &RecordKey) -> CoreResult<()> {
    match key {
        RecordKey::Int(n) => {
            buf.push(KEY_TAG_INT);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        RecordKey::Text(s) => {
            let len = u32::try_from(s.len())
                .map_err(|_| CoreError::invalid_input("record key too long"))?;
            buf.push(KEY_TAG_TEXT);
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
    }
    Ok(())
}

/// Bounds-checked cursor over a record payload.
struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| CoreError::wal_corruption("unexpected end of payload"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> CoreResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> CoreResult<u64> {
        let b = self.bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    fn key(&mut self) -> CoreResult<RecordKey> {
        match self.u8()? {
            KEY_TAG_INT => Ok(RecordKey::Int(self.u64()?)),
            KEY_TAG_TEXT => {
                let len = self.u32()? as usize;
                let bytes = self.bytes(len)?;
                let text = std::str::from_utf8(bytes)
                    .map_err(|_| CoreError::wal_corruption("record key is not UTF-8"))?;
                Ok(RecordKey::Text(text.to_string()))
            }
            tag => Err(CoreError::wal_corruption(format!("unknown key tag {tag}"))),
        }
    }

    fn finish(self) -> CoreResult<()> {
        if self.pos == self.data.len() {
            Ok(())
        } else {
            Err(CoreError::wal_corruption(format!(
                "{} trailing bytes in payload",
                self.data.len() - self.pos
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(record: &WalRecord) -> WalRecord {
        let payload = record.encode_payload().unwrap();
        WalRecord::decode_payload(record.record_type(), &payload).unwrap()
    }

    #[test]
    fn put_with_text_and_int_keys() {
        for key in [RecordKey::Int(42), RecordKey::text("js:main")] {
            let record = WalRecord::Put {
                txid: TransactionId::new(3),
                collection_id: CollectionId::new(2),
                key,
                payload: br#"{"code":"print(1)"}"#.to_vec(),
            };
            assert_eq!(roundtrip(&record), record);
        }
    }

    #[test]
    fn checkpoint_carries_generators() {
        let record = WalRecord::Checkpoint {
            sequence: SequenceNumber::new(9),
            generators: vec![(CollectionId::new(3), 17), (CollectionId::new(4), 2)],
        };
        assert_eq!(roundtrip(&record), record);
    }

    #[test]
    fn truncated_payload_is_corruption() {
        let record = WalRecord::Commit {
            txid: TransactionId::new(1),
            sequence: SequenceNumber::new(1),
        };
        let payload = record.encode_payload().unwrap();
        let result = WalRecord::decode_payload(WalRecordType::Commit, &payload[..10]);
        assert!(matches!(result, Err(CoreError::WalCorruption { .. })));
    }

    #[test]
    fn envelope_layout() {
        let record = WalRecord::Begin {
            txid: TransactionId::new(1),
        };
        let bytes = record.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], &WAL_MAGIC);
        assert_eq!(bytes[6], WalRecordType::Begin.as_byte());
        assert_eq!(bytes.len(), HEADER_SIZE + 8 + CRC_SIZE);
    }

    #[test]
    fn unknown_type_byte() {
        assert!(WalRecordType::from_byte(0).is_none());
        assert!(WalRecordType::from_byte(8).is_none());
        assert_eq!(WalRecordType::from_byte(4), Some(WalRecordType::Clear));
    }
}
