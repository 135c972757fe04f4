#![forbid(unsafe_code)]

use fnv_rs::{Fnv64, FnvHasher};

/// FNV-1a 64-bit hash of `bytes`, as stored in the meta page checksum field.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    let digest = Fnv64::hash(bytes);
    let mut out = [0u8; 8];
    out.copy_from_slice(digest.as_bytes());
    u64::from_be_bytes(out)
}
