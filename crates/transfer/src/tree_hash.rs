//! SHA-256 tree hash over fixed 1 MiB leaves.
//!
//! Every 1 MiB block of the whole file (the last one may be shorter) is
//! hashed into a leaf. Leaves are then combined pairwise, left to right,
//! as `SHA256(left || right)`; an odd trailing hash moves up a level
//! unchanged. The last remaining hash is the root.
//!
//! Leaves are defined over the whole byte stream, so the root only depends
//! on file content, never on how the file was chunked for transfer.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{TransferError, fs_error};

/// Leaf block size: 1 MiB.
pub const LEAF_SIZE: usize = 1024 * 1024;

type Hash = [u8; 32];

fn sha256(data: &[u8]) -> Hash {
    to_array(Sha256::digest(data).as_slice())
}

fn to_array(digest: &[u8]) -> Hash {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest);
    out
}

/// Folds an ordered leaf sequence into the root hash.
///
/// Returns `None` for an empty sequence.
pub fn fold_leaves(mut level: Vec<Hash>) -> Option<Hash> {
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => {
                    let mut hasher = Sha256::new();
                    hasher.update(left);
                    hasher.update(right);
                    to_array(hasher.finalize().as_slice())
                }
                [single] => *single,
                _ => unreachable!("chunks(2) yields one or two items"),
            })
            .collect();
    }
    level.into_iter().next()
}

/// Incremental tree hasher fed with arbitrary-sized slices.
///
/// Slice boundaries do not matter: bytes are accumulated into 1 MiB
/// leaves regardless of how they arrive.
#[derive(Default)]
pub struct TreeHasher {
    leaves: Vec<Hash>,
    current: Sha256,
    filled: usize,
}

impl TreeHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds more bytes of the stream.
    pub fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let take = (LEAF_SIZE - self.filled).min(data.len());
            self.current.update(&data[..take]);
            self.filled += take;
            data = &data[take..];

            if self.filled == LEAF_SIZE {
                let leaf = std::mem::take(&mut self.current).finalize();
                self.leaves.push(to_array(leaf.as_slice()));
                self.filled = 0;
            }
        }
    }

    /// Number of complete leaves hashed so far.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Finishes the stream and returns the root hash.
    ///
    /// An empty stream hashes to `SHA256("")`.
    pub fn finish(mut self) -> Hash {
        if self.filled > 0 || self.leaves.is_empty() {
            self.leaves.push(to_array(self.current.finalize().as_slice()));
        }
        // At least one leaf is always present here.
        fold_leaves(self.leaves).unwrap_or_else(|| sha256(&[]))
    }

    /// Finishes the stream and returns the root as lowercase hex.
    pub fn finish_hex(self) -> String {
        hex::encode(self.finish())
    }
}

/// Tree hash of an in-memory buffer, as lowercase hex.
pub fn tree_hash_bytes(data: &[u8]) -> String {
    let mut hasher = TreeHasher::new();
    hasher.update(data);
    hasher.finish_hex()
}

/// Tree hash of the concatenation of `paths`, in order, as lowercase hex.
///
/// Blocking; call from a blocking context.
pub fn tree_hash_files(paths: &[PathBuf]) -> Result<String, TransferError> {
    let mut hasher = TreeHasher::new();
    let mut buf = vec![0u8; LEAF_SIZE];

    for (i, path) in paths.iter().enumerate() {
        let mut file = File::open(path).map_err(fs_error(path))?;
        loop {
            let n = file.read(&mut buf).map_err(fs_error(path))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        debug!(
            chunk = i + 1,
            chunks = paths.len(),
            leaves = hasher.leaf_count(),
            "hashed chunk file"
        );
    }

    Ok(hasher.finish_hex())
}
