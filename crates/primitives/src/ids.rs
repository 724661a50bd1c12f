//! Identifiers for chains, requests and addressable agents.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::{buf::Buf32, errors::ParseError};

/// Content-addressed identifier for a chain: the alias address of its anchor
/// output on L1. Fixed-length, so it doubles as the key for the chain
/// registry and as the subscription handle for the ledger client.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, BorshDeserialize, BorshSerialize)]
pub struct ChainId(Buf32);

impl ChainId {
    pub fn new(buf: Buf32) -> Self {
        Self(buf)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Parses the base58-encoded textual form used by the admin HTTP API.
    pub fn from_base58(s: &str) -> Result<Self, ParseError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| ParseError::Base58(e.to_string()))?;
        let buf = Buf32::try_from(bytes.as_slice())
            .map_err(|_| ParseError::WrongLength(32, bytes.len()))?;
        Ok(Self(buf))
    }

    pub fn to_base58(self) -> String {
        bs58::encode(self.0.as_slice()).into_string()
    }
}

impl fmt::Debug for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainId({})", self.to_base58())
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl Serialize for ChainId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.to_base58().serialize(s)
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        ChainId::from_base58(&s).map_err(serde::de::Error::custom)
    }
}

/// Identifier of a pending request: a transaction id plus output index for
/// on-ledger requests, or a synthetic id minted locally for off-ledger
/// requests (see [`crate::ids::RequestId::new_off_ledger`]).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, BorshDeserialize, BorshSerialize)]
pub struct RequestId {
    tx_id: Buf32,
    output_index: u16,
}

impl RequestId {
    pub fn new_on_ledger(tx_id: Buf32, output_index: u16) -> Self {
        Self {
            tx_id,
            output_index,
        }
    }

    /// Off-ledger requests carry no real ledger output; by convention they
    /// use output index 0 against a synthetic id derived from the request's
    /// own content hash so they remain unique per chain.
    pub fn new_off_ledger(content_hash: Buf32) -> Self {
        Self {
            tx_id: content_hash,
            output_index: 0,
        }
    }

    pub fn tx_id(&self) -> &Buf32 {
        &self.tx_id
    }

    pub fn output_index(&self) -> u16 {
        self.output_index
    }

    /// Textual form `[<output_index>]<txid_base58>`.
    pub fn to_text(self) -> String {
        format!(
            "[{}]{}",
            self.output_index,
            bs58::encode(self.tx_id.as_slice()).into_string()
        )
    }

    pub fn from_text(s: &str) -> Result<Self, ParseError> {
        let rest = s
            .strip_prefix('[')
            .ok_or_else(|| ParseError::MalformedRequestId(s.to_owned()))?;
        let (idx_str, txid_str) = rest
            .split_once(']')
            .ok_or_else(|| ParseError::MalformedRequestId(s.to_owned()))?;
        let output_index: u16 = idx_str
            .parse()
            .map_err(|_| ParseError::MalformedRequestId(s.to_owned()))?;
        let bytes = bs58::decode(txid_str)
            .into_vec()
            .map_err(|e| ParseError::Base58(e.to_string()))?;
        let tx_id = Buf32::try_from(bytes.as_slice())
            .map_err(|_| ParseError::WrongLength(32, bytes.len()))?;
        Ok(Self {
            tx_id,
            output_index,
        })
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

/// 32-bit hashed name identifying a contract or entry point.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, BorshDeserialize, BorshSerialize)]
pub struct Hname(pub u32);

impl Hname {
    /// Computes the hashed-name of a human-readable contract/function name,
    /// truncating the content hash to its first 4 bytes.
    pub fn of(name: &str) -> Self {
        let h = crate::hash::raw(name.as_bytes());
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&h.as_bytes()[..4]);
        Self(u32::from_be_bytes(buf))
    }
}

impl fmt::Debug for Hname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::Display for Hname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Addressing unit combining a chain id with a contract/account identifier,
/// used as the fee destination and as the sender account of a request.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, BorshDeserialize, BorshSerialize)]
pub struct AgentId {
    chain: ChainId,
    contract: Hname,
}

impl AgentId {
    pub fn new(chain: ChainId, contract: Hname) -> Self {
        Self { chain, contract }
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain
    }

    pub fn contract(&self) -> Hname {
        self.contract
    }
}

impl fmt::Debug for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.chain, self.contract)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.chain, self.contract)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_id_base58_round_trip() {
        let id = ChainId::new(Buf32::from([0x11; 32]));
        let text = id.to_base58();
        assert_eq!(ChainId::from_base58(&text).unwrap(), id);
    }

    #[test]
    fn chain_id_rejects_garbage() {
        assert!(ChainId::from_base58("not-base-58!!").is_err());
    }

    #[test]
    fn request_id_text_round_trip() {
        let id = RequestId::new_on_ledger(Buf32::from([0x7a; 32]), 3);
        let text = id.to_text();
        assert!(text.starts_with("[3]"));
        assert_eq!(RequestId::from_text(&text).unwrap(), id);
    }

    #[test]
    fn hname_is_stable() {
        assert_eq!(Hname::of("accounts"), Hname::of("accounts"));
        assert_ne!(Hname::of("accounts"), Hname::of("blob"));
    }
}
