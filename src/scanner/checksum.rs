//! File hashes for duplicate detection.
//!
//! Two SHA-256 digests are kept per file: one over the whole content and
//! a cheap one over the first [`PRESUM_BYTES`] bytes that can be compared
//! before paying for the full read.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Bytes covered by the prefix hash.
pub const PRESUM_BYTES: usize = 2048;

const BUFFER_SIZE: usize = 64 * 1024;

/// Whole-file and prefix hashes as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksums {
    pub checksum: String,
    pub presum: String,
}

/// Hash `path` in a single pass.
///
/// # Errors
///
/// Returns an IO error if the file cannot be read.
pub fn compute_checksums(path: &Path) -> std::io::Result<Checksums> {
    let mut file = File::open(path)?;
    let mut whole = Sha256::new();
    let mut prefix = Sha256::new();
    let mut prefix_left = PRESUM_BYTES;
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        let chunk = &buffer[..read];
        whole.update(chunk);
        if prefix_left > 0 {
            let take = prefix_left.min(read);
            prefix.update(&chunk[..take]);
            prefix_left -= take;
        }
    }

    Ok(Checksums {
        checksum: format!("{:x}", whole.finalize()),
        presum: format!("{:x}", prefix.finalize()),
    })
}
