//! Thin wrapper around `blst`'s min-pubkey-size BLS12-381 ciphersuite, used
//! for the committee's threshold signature over a batch essence hash.

use blst::{
    min_pk::{AggregatePublicKey, AggregateSignature, PublicKey, SecretKey, Signature},
    BLST_ERROR,
};
use covenant_primitives::prelude::{Buf48, Buf96};
use thiserror::Error;

/// Domain-separation tag for signatures produced by this crate. Keeping it
/// distinct from other BLS consumers avoids cross-protocol signature reuse.
const DST: &[u8] = b"COVENANT-CONSENSUS-BLS-SIG-V1";

#[derive(Debug, Error)]
pub enum BlsError {
    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    #[error("invalid public key encoding")]
    InvalidPublicKey,

    #[error("invalid signature encoding")]
    InvalidSignature,

    #[error("signature share failed verification")]
    VerificationFailed,

    #[error("no shares given to aggregate")]
    EmptyShareSet,
}

fn map_err(e: BLST_ERROR) -> BlsError {
    match e {
        BLST_ERROR::BLST_BAD_ENCODING => BlsError::InvalidSignature,
        _ => BlsError::VerificationFailed,
    }
}

/// One committee member's share of the distributed signing key. The
/// distributed-key-share registry that provisions these is an external
/// collaborator; this type only wraps the share material once obtained.
pub struct SigningShare {
    sk: SecretKey,
}

impl SigningShare {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlsError> {
        let sk = SecretKey::from_bytes(bytes).map_err(|_| BlsError::InvalidSecretKey)?;
        Ok(Self { sk })
    }

    /// Generates a fresh share from OS randomness. Real deployments draw
    /// their share from the distributed-key-share registry instead; this
    /// is for committees with no such registry wired up, e.g. a
    /// single-member committee running solo.
    pub fn generate() -> Self {
        let mut ikm = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut ikm);
        let sk = SecretKey::key_gen(&ikm, &[]).expect("32-byte ikm satisfies blst key_gen");
        Self { sk }
    }

    pub fn public_share(&self) -> Buf48 {
        let pk = self.sk.sk_to_pk();
        Buf48::try_from(pk.compress().as_slice()).expect("blst pubkey is 48 bytes")
    }

    /// Signs a message with this node's share, producing a signature share
    /// to be sent to the leader as `SignedHash.sig_share`.
    pub fn sign(&self, msg: &[u8]) -> Buf96 {
        let sig = self.sk.sign(msg, DST, &[]);
        Buf96::try_from(sig.compress().as_slice()).expect("blst signature is 96 bytes")
    }
}

fn decode_pubkey(buf: &Buf48) -> Result<PublicKey, BlsError> {
    PublicKey::from_bytes(buf.as_slice()).map_err(map_err)
}

fn decode_sig(buf: &Buf96) -> Result<Signature, BlsError> {
    Signature::from_bytes(buf.as_slice()).map_err(map_err)
}

/// Verifies a single signature share against the signer's public share.
pub fn verify_share(msg: &[u8], sig: &Buf96, pubkey: &Buf48) -> Result<(), BlsError> {
    let sig = decode_sig(sig)?;
    let pk = decode_pubkey(pubkey)?;
    match sig.verify(true, msg, DST, &[], &pk, true) {
        BLST_ERROR::BLST_SUCCESS => Ok(()),
        _ => Err(BlsError::VerificationFailed),
    }
}

/// Aggregates a quorum of signature shares over the same message into a
/// single signature, and the corresponding signer public keys into a
/// single aggregate public key. The essence transaction carries the
/// aggregate signature; the aggregate public key is only needed to verify
/// it independently (e.g. in tests).
pub fn aggregate(shares: &[Buf96]) -> Result<Buf96, BlsError> {
    if shares.is_empty() {
        return Err(BlsError::EmptyShareSet);
    }
    let sigs: Vec<Signature> = shares.iter().map(decode_sig).collect::<Result<_, _>>()?;
    let sig_refs: Vec<&Signature> = sigs.iter().collect();
    let agg = AggregateSignature::aggregate(&sig_refs, true).map_err(map_err)?;
    let sig = agg.to_signature();
    Ok(Buf96::try_from(sig.compress().as_slice()).expect("blst signature is 96 bytes"))
}

pub fn aggregate_pubkeys(pubkeys: &[Buf48]) -> Result<Buf48, BlsError> {
    if pubkeys.is_empty() {
        return Err(BlsError::EmptyShareSet);
    }
    let pks: Vec<PublicKey> = pubkeys.iter().map(decode_pubkey).collect::<Result<_, _>>()?;
    let pk_refs: Vec<&PublicKey> = pks.iter().collect();
    let agg = AggregatePublicKey::aggregate(&pk_refs, true).map_err(map_err)?;
    let pk = agg.to_public_key();
    Ok(Buf48::try_from(pk.compress().as_slice()).expect("blst pubkey is 48 bytes"))
}

/// Verifies an aggregate signature against an aggregate public key, used to
/// confirm a finalized batch's recovered signature is sound.
pub fn verify_aggregate(msg: &[u8], sig: &Buf96, agg_pubkey: &Buf48) -> Result<(), BlsError> {
    verify_share(msg, sig, agg_pubkey)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(byte: u8) -> SigningShare {
        let mut ikm = [byte; 32];
        ikm[0] = ikm[0].wrapping_add(1);
        let sk = SecretKey::key_gen(&ikm, &[]).unwrap();
        SigningShare { sk }
    }

    #[test]
    fn single_share_round_trip() {
        let s = share(1);
        let msg = b"batch-essence-hash";
        let sig = s.sign(msg);
        assert!(verify_share(msg, &sig, &s.public_share()).is_ok());
    }

    #[test]
    fn tampered_share_fails_verification() {
        let s = share(2);
        let msg = b"batch-essence-hash";
        let sig = s.sign(b"some other message");
        assert!(verify_share(msg, &sig, &s.public_share()).is_err());
    }

    #[test]
    fn quorum_aggregate_verifies_against_aggregate_pubkey() {
        let shares: Vec<SigningShare> = (0..3).map(share).collect();
        let msg = b"batch-essence-hash";
        let sigs: Vec<Buf96> = shares.iter().map(|s| s.sign(msg)).collect();
        let pubkeys: Vec<Buf48> = shares.iter().map(|s| s.public_share()).collect();

        let agg_sig = aggregate(&sigs).unwrap();
        let agg_pk = aggregate_pubkeys(&pubkeys).unwrap();
        assert!(verify_aggregate(msg, &agg_sig, &agg_pk).is_ok());
    }
}
