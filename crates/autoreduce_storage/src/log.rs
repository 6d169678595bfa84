//! Commit log.
//!
//! Every committed write transaction appends one framed record:
//!
//! ```text
//! | magic (4) | version (2) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! Integers are little-endian. The CRC covers header and payload. The payload
//! is an operation count followed by the transaction's operations in order.
//!
//! On open, complete records are replayed in order. A record cut short by a
//! crash is treated as the end of the log and trimmed away; a bad magic or
//! checksum is corruption.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::tree::Snapshot;
use tracing::warn;

/// Magic bytes opening every record.
pub const LOG_MAGIC: [u8; 4] = *b"ARLG";

/// Current record format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + length (4)
const HEADER_SIZE: usize = 10;

const CRC_SIZE: usize = 4;

const OP_CREATE_TREE: u8 = 1;
const OP_PUT: u8 = 2;
const OP_DELETE: u8 = 3;

/// One logged mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOp {
    /// A tree was created.
    CreateTree {
        /// Tree name.
        tree: String,
    },
    /// A key was set.
    Put {
        /// Tree name.
        tree: String,
        /// Key bytes.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// A key was removed.
    Delete {
        /// Tree name.
        tree: String,
        /// Key bytes.
        key: Vec<u8>,
    },
}

impl LogOp {
    fn encode_into(&self, out: &mut Vec<u8>) -> StorageResult<()> {
        match self {
            LogOp::CreateTree { tree } => {
                out.push(OP_CREATE_TREE);
                put_bytes(out, tree.as_bytes())?;
            }
            LogOp::Put { tree, key, value } => {
                out.push(OP_PUT);
                put_bytes(out, tree.as_bytes())?;
                put_bytes(out, key)?;
                put_bytes(out, value)?;
            }
            LogOp::Delete { tree, key } => {
                out.push(OP_DELETE);
                put_bytes(out, tree.as_bytes())?;
                put_bytes(out, key)?;
            }
        }
        Ok(())
    }

    fn decode(reader: &mut Reader<'_>) -> StorageResult<Self> {
        let tag = reader.byte()?;
        let tree = reader.text()?;
        match tag {
            OP_CREATE_TREE => Ok(LogOp::CreateTree { tree }),
            OP_PUT => Ok(LogOp::Put {
                tree,
                key: reader.bytes()?.to_vec(),
                value: reader.bytes()?.to_vec(),
            }),
            OP_DELETE => Ok(LogOp::Delete {
                tree,
                key: reader.bytes()?.to_vec(),
            }),
            other => Err(StorageError::corrupted(format!("unknown log op {other}"))),
        }
    }

    /// Apply this operation to a snapshot.
    pub(crate) fn apply(self, snapshot: &mut Snapshot) -> StorageResult<()> {
        match self {
            LogOp::CreateTree { tree } => {
                snapshot.create_tree(&tree);
            }
            LogOp::Put { tree, key, value } => {
                snapshot.tree_mut(&tree)?.insert(key, value);
            }
            LogOp::Delete { tree, key } => {
                snapshot.tree_mut(&tree)?.remove(&key);
            }
        }
        Ok(())
    }
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) -> StorageResult<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| StorageError::corrupted("log field exceeds 4 GiB"))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> StorageResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| StorageError::corrupted("log payload truncated"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> StorageResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> StorageResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn bytes(&mut self) -> StorageResult<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn text(&mut self) -> StorageResult<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| StorageError::corrupted("tree name is not UTF-8"))
    }
}

/// Encode a transaction's operations as one framed record.
pub(crate) fn encode_record(ops: &[LogOp]) -> StorageResult<Vec<u8>> {
    let mut payload = Vec::new();
    let count =
        u32::try_from(ops.len()).map_err(|_| StorageError::corrupted("too many log ops"))?;
    payload.extend_from_slice(&count.to_le_bytes());
    for op in ops {
        op.encode_into(&mut payload)?;
    }

    let len = u32::try_from(payload.len())
        .map_err(|_| StorageError::corrupted("log record payload too large"))?;

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&LOG_MAGIC);
    data.extend_from_slice(&LOG_VERSION.to_le_bytes());
    data.extend_from_slice(&len.to_le_bytes());
    data.extend_from_slice(&payload);
    let crc = crc32fast::hash(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    Ok(data)
}

/// Outcome of scanning the log.
#[derive(Debug, Default)]
pub(crate) struct Replay {
    /// Complete records, each a list of operations.
    pub records: Vec<Vec<LogOp>>,
    /// Offset just past the last complete record.
    pub valid_len: u64,
}

/// Decode all complete records from raw log bytes.
pub(crate) fn decode_records(data: &[u8]) -> StorageResult<Replay> {
    let mut replay = Replay::default();
    let mut pos = 0usize;

    while pos < data.len() {
        let offset = pos as u64;
        let Some(header) = data.get(pos..pos + HEADER_SIZE) else {
            break;
        };

        if header[0..4] != LOG_MAGIC {
            return Err(StorageError::corrupted(format!(
                "invalid magic at offset {offset}"
            )));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > LOG_VERSION {
            return Err(StorageError::corrupted(format!(
                "unsupported version {version} at offset {offset}"
            )));
        }
        let payload_len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;

        let payload_end = pos + HEADER_SIZE + payload_len;
        let Some(crc_bytes) = data.get(payload_end..payload_end + CRC_SIZE) else {
            break;
        };
        let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let actual = crc32fast::hash(&data[pos..payload_end]);
        if expected != actual {
            return Err(StorageError::ChecksumMismatch {
                offset,
                expected,
                actual,
            });
        }

        let mut reader = Reader {
            data: &data[pos + HEADER_SIZE..payload_end],
            pos: 0,
        };
        let count = reader.u32()?;
        let mut ops = Vec::with_capacity((count as usize).min(1024));
        for _ in 0..count {
            ops.push(LogOp::decode(&mut reader)?);
        }
        replay.records.push(ops);

        pos = payload_end + CRC_SIZE;
        replay.valid_len = pos as u64;
    }

    Ok(replay)
}

/// Append-only commit log over a byte backend.
pub(crate) struct CommitLog {
    backend: Box<dyn StorageBackend>,
    records: u64,
}

impl CommitLog {
    /// Open a log, replaying every complete record into a fresh snapshot.
    pub(crate) fn open(mut backend: Box<dyn StorageBackend>) -> StorageResult<(Self, Snapshot)> {
        let size = backend.size()?;
        let len = usize::try_from(size).map_err(|_| StorageError::corrupted("log too large"))?;
        let data = backend.read_at(0, len)?;
        let replay = decode_records(&data)?;

        if replay.valid_len < size {
            warn!(
                valid_len = replay.valid_len,
                size, "commit log ends with a torn record; truncating"
            );
            backend.truncate(replay.valid_len)?;
        }

        let mut snapshot = Snapshot::default();
        let records = replay.records.len() as u64;
        for ops in replay.records {
            for op in ops {
                op.apply(&mut snapshot)?;
            }
        }

        Ok((Self { backend, records }, snapshot))
    }

    /// Start a log on a backend known to be empty.
    pub(crate) fn empty(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            records: 0,
        }
    }

    /// Append one transaction's operations.
    pub(crate) fn append(&mut self, ops: &[LogOp], sync: bool) -> StorageResult<()> {
        let record = encode_record(ops)?;
        self.backend.append(&record)?;
        self.backend.flush()?;
        if sync {
            self.backend.sync()?;
        }
        self.records += 1;
        Ok(())
    }

    /// Number of records in the log.
    pub(crate) fn records(&self) -> u64 {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;

    fn sample_ops() -> Vec<LogOp> {
        vec![
            LogOp::CreateTree {
                tree: "t".to_string(),
            },
            LogOp::Put {
                tree: "t".to_string(),
                key: b"k".to_vec(),
                value: b"v".to_vec(),
            },
            LogOp::Delete {
                tree: "t".to_string(),
                key: b"gone".to_vec(),
            },
        ]
    }

    #[test]
    fn record_layout() {
        let record = encode_record(&[]).unwrap();
        assert_eq!(&record[0..4], b"ARLG");
        assert_eq!(u16::from_le_bytes([record[4], record[5]]), LOG_VERSION);
        // Payload is just the zero op count.
        assert_eq!(u32::from_le_bytes([record[6], record[7], record[8], record[9]]), 4);
        assert_eq!(record.len(), HEADER_SIZE + 4 + CRC_SIZE);
    }

    #[test]
    fn decode_recovers_ops() {
        let mut data = encode_record(&sample_ops()).unwrap();
        data.extend(encode_record(&sample_ops()[1..2]).unwrap());

        let replay = decode_records(&data).unwrap();
        assert_eq!(replay.records.len(), 2);
        assert_eq!(replay.records[0], sample_ops());
        assert_eq!(replay.valid_len, data.len() as u64);
    }

    #[test]
    fn torn_tail_is_end_of_log() {
        let first = encode_record(&sample_ops()).unwrap();
        let mut data = first.clone();
        let second = encode_record(&sample_ops()).unwrap();
        data.extend_from_slice(&second[..second.len() - 3]);

        let replay = decode_records(&data).unwrap();
        assert_eq!(replay.records.len(), 1);
        assert_eq!(replay.valid_len, first.len() as u64);
    }

    #[test]
    fn flipped_bit_is_checksum_mismatch() {
        let mut data = encode_record(&sample_ops()).unwrap();
        data[HEADER_SIZE + 6] ^= 0x01;
        assert!(matches!(
            decode_records(&data),
            Err(StorageError::ChecksumMismatch { offset: 0, .. })
        ));
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut data = encode_record(&sample_ops()).unwrap();
        data[0] = b'X';
        assert!(matches!(decode_records(&data), Err(StorageError::Corrupted(_))));
    }

    #[test]
    fn open_truncates_torn_tail() {
        let mut data = encode_record(&sample_ops()[..2]).unwrap();
        let valid = data.len();
        data.extend_from_slice(b"ARLG\x01");
        let backend = InMemoryBackend::with_data(data);

        let (log, snapshot) = CommitLog::open(Box::new(backend.clone())).unwrap();
        assert_eq!(log.records(), 1);
        assert_eq!(backend.size().unwrap(), valid as u64);
        assert_eq!(
            snapshot.tree("t").unwrap().get(b"k".as_slice()),
            Some(&b"v".to_vec())
        );
    }
}
