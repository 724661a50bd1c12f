//! Common wrapper around whatever we choose our native hash function to be.

use borsh::BorshSerialize;
use digest::Digest;
use sha2::Sha256;

use crate::buf::Buf32;

/// Direct untagged hash.
pub fn raw(buf: &[u8]) -> Buf32 {
    Buf32::from(<[u8; 32]>::from(Sha256::digest(buf)))
}

/// Hashes the borsh encoding of a value. Used for batch hashes and essence
/// hashes, which are always computed over a value's canonical wire form.
pub fn compute_borsh_hash<T: BorshSerialize>(v: &T) -> Buf32 {
    let mut hasher = Sha256::new();
    v.serialize(&mut hasher).expect("hash: borsh serialize");
    let result = hasher.finalize();
    let arr: [u8; 32] = result.into();
    Buf32::from(arr)
}

/// Hashes the concatenation of several byte spans without allocating an
/// intermediate buffer.
pub fn concat(parts: &[&[u8]]) -> Buf32 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let arr: [u8; 32] = hasher.finalize().into();
    Buf32::from(arr)
}
