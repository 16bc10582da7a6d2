//! Durable snapshot of the cluster state.
//!
//! A restarted node seeds its view from the last snapshot before talking to
//! peers. The file is opaque to everyone but this module:
//!
//! ```text
//! +-------+---------+------------------+------------------------------+
//! | CLST  | version | blake3(body) 32B | bincode(ClusterInformation)  |
//! +-------+---------+------------------+------------------------------+
//! ```

use std::path::{Path, PathBuf};

use corelib::ClusterInformation;

use crate::error::{Result, StreamingError};

const MAGIC: &[u8; 4] = b"CLST";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 1 + blake3::OUT_LEN;

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `info`, replacing any previous snapshot atomically.
    pub async fn save(&self, info: &ClusterInformation) -> Result<()> {
        let bytes = encode(info)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), created_at = info.created_at, "saved cluster snapshot");
        Ok(())
    }

    /// Last saved snapshot. Any failure means "no prior knowledge".
    pub async fn load(&self) -> Option<ClusterInformation> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no cluster snapshot");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot read cluster snapshot");
                return None;
            }
        };
        match decode(&bytes) {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring cluster snapshot");
                None
            }
        }
    }
}

fn encode(info: &ClusterInformation) -> Result<Vec<u8>> {
    let body = bincode::serialize(info)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.push(FORMAT_VERSION);
    bytes.extend_from_slice(blake3::hash(&body).as_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

fn decode(bytes: &[u8]) -> Result<ClusterInformation> {
    if bytes.len() < HEADER_LEN {
        return Err(StreamingError::CorruptSnapshot("truncated header".to_string()));
    }
    let (header, body) = bytes.split_at(HEADER_LEN);
    if &header[..MAGIC.len()] != MAGIC {
        return Err(StreamingError::CorruptSnapshot("bad magic".to_string()));
    }
    if header[MAGIC.len()] != FORMAT_VERSION {
        return Err(StreamingError::CorruptSnapshot(format!(
            "unsupported format version {}",
            header[MAGIC.len()]
        )));
    }
    if blake3::hash(body).as_bytes()[..] != header[MAGIC.len() + 1..] {
        return Err(StreamingError::CorruptSnapshot("checksum mismatch".to_string()));
    }
    Ok(bincode::deserialize(body)?)
}
