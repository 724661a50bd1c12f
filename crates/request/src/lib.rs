//! The polymorphic request type accepted by a chain's mempool: either an
//! on-ledger request carried by a ledger output, or an off-ledger request
//! submitted directly.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use covenant_primitives::prelude::{AgentId, Buf32, Hname, RequestId};

/// `(contract, entry point)` pair a request is addressed to.
#[derive(Copy, Clone, Eq, PartialEq, Debug, BorshDeserialize, BorshSerialize)]
pub struct CallTarget {
    pub contract: Hname,
    pub entry_point: Hname,
}

/// Token balance carried alongside a request, denominated by a color id.
#[derive(Clone, Eq, PartialEq, Debug, BorshDeserialize, BorshSerialize)]
pub struct TokenBalance {
    pub color: Buf32,
    pub amount: u64,
}

/// A parameter value that may still require external solidification (e.g.
/// a blob reference that hasn't been fetched into local content yet).
#[derive(Clone, Eq, PartialEq, Debug, BorshDeserialize, BorshSerialize)]
pub enum ParamValue {
    Inline(Vec<u8>),
    /// Reference to content that must be resolved before the request is
    /// eligible for batching; see [`Request::args_solid`].
    BlobRef(Buf32),
}

/// Origin of a request: carried by a real ledger output, or submitted
/// off-ledger directly to a node's mempool.
#[derive(Clone, Eq, PartialEq, Debug, BorshDeserialize, BorshSerialize)]
pub enum RequestOrigin {
    OnLedger { output_index: u16 },
    OffLedger,
}

/// A pending request, polymorphic over its origin but sharing one
/// capability set: id, sender, target, params, optional tokens, fee flag.
#[derive(Clone, Eq, PartialEq, Debug, BorshDeserialize, BorshSerialize)]
pub struct Request {
    id: RequestId,
    origin: RequestOrigin,
    sender_address: Buf32,
    sender_account: AgentId,
    target: CallTarget,
    fee_prepaid: bool,
    tokens: Vec<TokenBalance>,
    params: BTreeMap<String, ParamValue>,
}

impl Request {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: RequestId,
        origin: RequestOrigin,
        sender_address: Buf32,
        sender_account: AgentId,
        target: CallTarget,
        fee_prepaid: bool,
        tokens: Vec<TokenBalance>,
        params: BTreeMap<String, ParamValue>,
    ) -> Self {
        Self {
            id,
            origin,
            sender_address,
            sender_account,
            target,
            fee_prepaid,
            tokens,
            params,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn origin(&self) -> &RequestOrigin {
        &self.origin
    }

    pub fn is_off_ledger(&self) -> bool {
        matches!(self.origin, RequestOrigin::OffLedger)
    }

    pub fn sender_address(&self) -> &Buf32 {
        &self.sender_address
    }

    pub fn sender_account(&self) -> AgentId {
        self.sender_account
    }

    pub fn target(&self) -> CallTarget {
        self.target
    }

    pub fn fee_prepaid(&self) -> bool {
        self.fee_prepaid
    }

    pub fn tokens(&self) -> &[TokenBalance] {
        &self.tokens
    }

    pub fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }

    /// A request is eligible for batching only once every parameter has
    /// been solidified: no outstanding `BlobRef`s.
    pub fn args_solid(&self) -> bool {
        self.params
            .values()
            .all(|v| !matches!(v, ParamValue::BlobRef(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_primitives::prelude::ChainId;

    fn dummy_id(n: u8) -> RequestId {
        RequestId::new_on_ledger(Buf32::from([n; 32]), 0)
    }

    fn dummy_request(n: u8, params: BTreeMap<String, ParamValue>) -> Request {
        Request::new(
            dummy_id(n),
            RequestOrigin::OnLedger { output_index: 0 },
            Buf32::from([n; 32]),
            AgentId::new(ChainId::new(Buf32::from([n; 32])), Hname(1)),
            CallTarget {
                contract: Hname(1),
                entry_point: Hname(2),
            },
            false,
            Vec::new(),
            params,
        )
    }

    #[test]
    fn args_solid_is_true_without_blob_refs() {
        let mut params = BTreeMap::new();
        params.insert("a".to_string(), ParamValue::Inline(vec![1, 2, 3]));
        let req = dummy_request(1, params);
        assert!(req.args_solid());
    }

    #[test]
    fn args_solid_is_false_with_unresolved_blob_ref() {
        let mut params = BTreeMap::new();
        params.insert("a".to_string(), ParamValue::BlobRef(Buf32::zero()));
        let req = dummy_request(2, params);
        assert!(!req.args_solid());
    }
}
