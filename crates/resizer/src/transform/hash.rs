//! Content hashing for encoded variants.
//!
//! MD5 is used only to derive deterministic, content-addressed file names.
//! It is not a security boundary.

use md5::{Digest, Md5};

/// Compute the lowercase hex MD5 digest of the given bytes.
pub fn content_hash(data: &[u8]) -> String {
    let hash = Md5::digest(data);
    format!("{hash:x}")
}
