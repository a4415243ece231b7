use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncReadExt;

use motorhub_types::ContentHash;

use crate::error::FileError;

const READ_BUF_SIZE: usize = 1024 * 1024;

pub fn content_hash(bytes: &[u8]) -> ContentHash {
    let digest: [u8; 32] = Sha256::digest(bytes).into();
    ContentHash::from_digest(&digest)
}

/// Fails with `HashMismatch` unless `bytes` hash to `expected`.
pub fn verify(expected: &ContentHash, bytes: &[u8]) -> Result<(), FileError> {
    let actual = content_hash(bytes);
    if actual != *expected {
        return Err(FileError::HashMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

/// SHA-256 of a file on disk as lowercase hex, read in 1 MB blocks.
pub async fn hash_file(path: &Path) -> Result<String, FileError> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
