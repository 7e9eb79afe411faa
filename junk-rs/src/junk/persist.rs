//! Checked, atomically replaced snapshot files
//!
//! Layout:
//!
//! ```text
//! magic (8) | version (u32 LE) | payload length (u64 LE) | sha256(payload) (32) | payload
//! ```
//!
//! Files are written to a temporary file in the target directory, synced and
//! then renamed over the target, so a reader sees either the previous or the
//! new complete file.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{JunkError, Result};

const HEADER_LEN: usize = 8 + 4 + 8 + 32;

/// SHA-256 of a snapshot payload
pub type SnapshotDigest = [u8; 32];

/// Digest identifying the contents of `payload`
pub fn payload_digest(payload: &[u8]) -> SnapshotDigest {
    Sha256::digest(payload).into()
}

/// Write `payload` to `path`, replacing any previous file atomically.
/// Returns the digest of the payload written.
pub fn write_snapshot(
    path: &Path,
    magic: &[u8; 8],
    version: u32,
    payload: &[u8],
) -> Result<SnapshotDigest> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let digest = payload_digest(payload);

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let file = tmp.as_file_mut();
        file.write_all(magic)?;
        file.write_all(&version.to_le_bytes())?;
        file.write_all(&(payload.len() as u64).to_le_bytes())?;
        file.write_all(&digest)?;
        file.write_all(payload)?;
        file.sync_all()?;
    }
    tmp.persist(path).map_err(|e| JunkError::Io(e.error))?;

    Ok(digest)
}

/// Read the payload of a snapshot written by [`write_snapshot`], verifying
/// magic, version, length and checksum.
pub fn read_snapshot(path: &Path, magic: &[u8; 8], version: u32) -> Result<Vec<u8>> {
    let data = fs::read(path)?;
    let corrupt = |reason: &str| JunkError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if data.len() < HEADER_LEN {
        return Err(corrupt("file truncated before end of header"));
    }
    if &data[..8] != magic {
        return Err(corrupt("bad magic"));
    }

    let found = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
    if found != version {
        return Err(JunkError::IncompatibleVersion {
            path: path.to_path_buf(),
            found,
            expected: version,
        });
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&data[12..20]);
    let len = u64::from_le_bytes(len_bytes);

    let payload = &data[HEADER_LEN..];
    if payload.len() as u64 != len {
        return Err(corrupt(&format!(
            "payload length {} does not match header length {}",
            payload.len(),
            len
        )));
    }

    if payload_digest(payload)[..] != data[20..HEADER_LEN] {
        return Err(corrupt("checksum mismatch"));
    }

    Ok(payload.to_vec())
}
