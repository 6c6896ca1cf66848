//! Chain/kind selectors for the workflow registry
//!
//! The registry stores the chain selector and blockchain kind as integers;
//! this module gives them types and maps (chain, kind) to an RPC endpoint
//! with an exhaustive match instead of the historical fall-through switch.

use serde::{Deserialize, Serialize};

use crate::entities::workflows;

/// Supported chains, by registry selector value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Blockchain {
    Near,
    Polygon,
    Aurora,
    Avalanche,
    Evmos,
    Ethereum,
    Bsc,
}

/// Testnet/mainnet selector. Value 0 selects the testnet address field,
/// 1 the mainnet field, for every chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockchainKind {
    Testnet,
    Mainnet,
}

impl Blockchain {
    pub fn from_selector(value: i32) -> Option<Self> {
        match value {
            1 => Some(Blockchain::Near),
            2 => Some(Blockchain::Polygon),
            3 => Some(Blockchain::Aurora),
            4 => Some(Blockchain::Avalanche),
            5 => Some(Blockchain::Evmos),
            6 => Some(Blockchain::Ethereum),
            7 => Some(Blockchain::Bsc),
            _ => None,
        }
    }

    pub fn selector(&self) -> i32 {
        match self {
            Blockchain::Near => 1,
            Blockchain::Polygon => 2,
            Blockchain::Aurora => 3,
            Blockchain::Avalanche => 4,
            Blockchain::Evmos => 5,
            Blockchain::Ethereum => 6,
            Blockchain::Bsc => 7,
        }
    }

    /// NEAR workflows are registered but cannot be called over an EVM
    /// JSON-RPC endpoint.
    pub fn is_evm(&self) -> bool {
        !matches!(self, Blockchain::Near)
    }
}

impl BlockchainKind {
    pub fn from_selector(value: i32) -> Option<Self> {
        match value {
            0 => Some(BlockchainKind::Testnet),
            1 => Some(BlockchainKind::Mainnet),
            _ => None,
        }
    }

    pub fn selector(&self) -> i32 {
        match self {
            BlockchainKind::Testnet => 0,
            BlockchainKind::Mainnet => 1,
        }
    }
}

/// (chain, kind) -> JSON-RPC endpoint, exhaustively matched.
pub fn rpc_endpoint(chain: Blockchain, kind: BlockchainKind) -> &'static str {
    use Blockchain::*;
    use BlockchainKind::*;
    match (chain, kind) {
        (Near, Testnet) => "https://rpc.testnet.near.org",
        (Near, Mainnet) => "https://rpc.mainnet.near.org",
        (Polygon, Testnet) => "https://rpc-amoy.polygon.technology",
        (Polygon, Mainnet) => "https://polygon-rpc.com",
        (Aurora, Testnet) => "https://testnet.aurora.dev",
        (Aurora, Mainnet) => "https://mainnet.aurora.dev",
        (Avalanche, Testnet) => "https://api.avax-test.network/ext/bc/C/rpc",
        (Avalanche, Mainnet) => "https://api.avax.network/ext/bc/C/rpc",
        (Evmos, Testnet) => "https://eth.bd.evmos.dev:8545",
        (Evmos, Mainnet) => "https://eth.bd.evmos.org:8545",
        (Ethereum, Testnet) => "https://ethereum-sepolia-rpc.publicnode.com",
        (Ethereum, Mainnet) => "https://ethereum-rpc.publicnode.com",
        (Bsc, Testnet) => "https://data-seed-prebsc-2-s2.binance.org:8545",
        (Bsc, Mainnet) => "https://bsc-dataseed.binance.org",
    }
}

impl workflows::Model {
    pub fn chain(&self) -> Option<Blockchain> {
        Blockchain::from_selector(self.selected_chain)
    }

    pub fn kind(&self) -> Option<BlockchainKind> {
        BlockchainKind::from_selector(self.selected_blockchain_kind)
    }

    /// Kind-selected contract address: testnet field for Testnet, mainnet
    /// field for Mainnet.
    pub fn contract_address(&self, kind: BlockchainKind) -> Option<&str> {
        match kind {
            BlockchainKind::Testnet => self.testnet_address.as_deref(),
            BlockchainKind::Mainnet => self.mainnet_address.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn workflow(chain: i32, kind: i32) -> workflows::Model {
        workflows::Model {
            id: 1,
            url: "silver-demo".into(),
            user_id: "auth0|user".into(),
            project: Some("Silver".into()),
            object: Some("Item".into()),
            abi: "[]".into(),
            selected_chain: chain,
            selected_blockchain_kind: kind,
            testnet_address: Some("0xtest".into()),
            mainnet_address: Some("0xmain".into()),
            created_at: Utc::now().into(),
            modified_at: Utc::now().into(),
        }
    }

    #[test]
    fn kind_zero_selects_testnet_address_for_every_chain() {
        for selector in 1..=7 {
            let wf = workflow(selector, 0);
            assert_eq!(wf.contract_address(wf.kind().unwrap()), Some("0xtest"));
        }
    }

    #[test]
    fn kind_one_selects_mainnet_address_for_every_chain() {
        for selector in 1..=7 {
            let wf = workflow(selector, 1);
            assert_eq!(wf.contract_address(wf.kind().unwrap()), Some("0xmain"));
        }
    }

    #[test]
    fn unknown_selectors_are_rejected() {
        assert_eq!(Blockchain::from_selector(0), None);
        assert_eq!(Blockchain::from_selector(8), None);
        assert_eq!(BlockchainKind::from_selector(2), None);
    }

    #[test]
    fn every_pair_has_an_endpoint() {
        for chain in [
            Blockchain::Near,
            Blockchain::Polygon,
            Blockchain::Aurora,
            Blockchain::Avalanche,
            Blockchain::Evmos,
            Blockchain::Ethereum,
            Blockchain::Bsc,
        ] {
            for kind in [BlockchainKind::Testnet, BlockchainKind::Mainnet] {
                assert!(rpc_endpoint(chain, kind).starts_with("https://"));
            }
        }
    }

    #[test]
    fn near_is_not_evm() {
        assert!(!Blockchain::Near.is_evm());
        assert!(Blockchain::Polygon.is_evm());
    }
}
