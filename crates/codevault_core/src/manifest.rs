//! Store manifest for metadata storage.
//!
//! ```text
//! | magic "CVMF" (4) | version (2) | length (4) | JSON body (N) | crc32 (4) |
//! ```

use crate::collection::CollectionSchema;
use crate::error::{CoreError, CoreResult};
use crate::types::CollectionId;
use serde::{Deserialize, Serialize};

/// Magic bytes for manifest file.
pub const MANIFEST_MAGIC: [u8; 4] = *b"CVMF";

/// Current manifest version.
pub const MANIFEST_VERSION: u16 = 1;

const HEADER_SIZE: usize = 10;

/// A collection as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestCollection {
    /// Stable collection ID referenced by the WAL.
    pub id: CollectionId,
    /// Collection definition.
    pub schema: CollectionSchema,
}

/// Store manifest.
///
/// The manifest stores:
/// - Format version
/// - Store name and schema version
/// - Collection registry with key paths and index definitions
/// - Last checkpoint sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Format version (major, minor).
    pub format_version: (u16, u16),
    /// Logical store name.
    #[serde(default)]
    pub store_name: String,
    /// Schema version; 0 until the first upgrade.
    #[serde(default)]
    pub schema_version: u32,
    /// Next collection ID to assign.
    pub next_collection_id: u32,
    /// Registered collections.
    #[serde(default)]
    pub collections: Vec<ManifestCollection>,
    /// Sequence number of the last checkpoint.
    #[serde(default)]
    pub last_checkpoint: Option<u64>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new((1, 0))
    }
}

impl Manifest {
    /// Creates a new empty manifest.
    #[must_use]
    pub fn new(format_version: (u16, u16)) -> Self {
        Self {
            format_version,
            store_name: String::new(),
            schema_version: 0,
            next_collection_id: 1,
            collections: Vec::new(),
            last_checkpoint: None,
        }
    }

    /// Returns the collection with the given name.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&ManifestCollection> {
        self.collections.iter().find(|c| c.schema.name == name)
    }

    /// Encodes the manifest to bytes.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let body = serde_json::to_vec(self)?;
        let len = u32::try_from(body.len())
            .map_err(|_| CoreError::invalid_operation("manifest too large"))?;

        let mut buf = Vec::with_capacity(HEADER_SIZE + body.len() + 4);
        buf.extend_from_slice(&MANIFEST_MAGIC);
        buf.extend_from_slice(&MANIFEST_VERSION.to_le_bytes());
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&body);
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Decodes a manifest from bytes.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < HEADER_SIZE + 4 {
            return Err(CoreError::invalid_format("manifest too short"));
        }
        if data[0..4] != MANIFEST_MAGIC {
            return Err(CoreError::invalid_format("invalid manifest magic"));
        }

        let version = u16::from_le_bytes([data[4], data[5]]);
        if version > MANIFEST_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported manifest version: {version}"
            )));
        }

        let len = u32::from_le_bytes([data[6], data[7], data[8], data[9]]) as usize;
        let body_end = HEADER_SIZE + len;
        if data.len() != body_end + 4 {
            return Err(CoreError::invalid_format("manifest length mismatch"));
        }

        let stored = u32::from_le_bytes([
            data[body_end],
            data[body_end + 1],
            data[body_end + 2],
            data[body_end + 3],
        ]);
        let computed = crc32fast::hash(&data[..body_end]);
        if stored != computed {
            return Err(CoreError::ChecksumMismatch {
                expected: stored,
                actual: computed,
            });
        }

        serde_json::from_slice(&data[HEADER_SIZE..body_end])
            .map_err(|e| CoreError::invalid_format(format!("manifest body: {e}")))
    }
}
