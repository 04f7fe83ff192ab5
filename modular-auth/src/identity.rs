//! Deterministic class identifiers and deployment addresses.
//!
//! Both values are pure functions of their inputs: deployment and declaration workflows compare
//! them against chain state to skip work that is already done.

use std::collections::BTreeSet;

use alloy_primitives::U256;
use modular_auth_types::Felt;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AuthError, Result},
    hash::{hash_on_elements, HashChain, PairHasher, Pedersen},
};

/// Version tag hashed in front of every compiled class.
pub const COMPILED_CLASS_VERSION: Felt = Felt::short_string("COMPILED_CLASS_V1");

/// Domain prefix for contract address derivation.
pub const CONTRACT_ADDRESS_PREFIX: Felt = Felt::short_string("STARKNET_CONTRACT_ADDRESS");

/// Deployer used when an account deploys itself.
pub const SELF_DEPLOYER: Felt = Felt::ZERO;

/// Addresses live below 2^251 - 256.
pub const ADDRESS_UPPER_BOUND: U256 = U256::from_limbs([
    0xFFFF_FFFF_FFFF_FF00,
    u64::MAX,
    u64::MAX,
    0x07FF_FFFF_FFFF_FFFF,
]);

/// One entry point of a compiled class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub selector: Felt,
    pub offset: u64,
    #[serde(default)]
    pub builtins: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct EntryPointsByType {
    #[serde(default)]
    pub external: Vec<EntryPoint>,
    #[serde(default)]
    pub l1_handler: Vec<EntryPoint>,
    #[serde(default)]
    pub constructor: Vec<EntryPoint>,
}

/// Compiled (CASM-style) class artifact as emitted by the compiler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    /// Informational only; not part of the class identifier.
    #[serde(default)]
    pub compiler_version: Option<String>,
    pub bytecode: Vec<Felt>,
    pub entry_points_by_type: EntryPointsByType,
}

impl CompiledArtifact {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AuthError::MalformedArtifact(e.to_string()))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| AuthError::MalformedArtifact(e.to_string()))
    }
}

/// Entry point with builtins encoded and ordering fixed.
struct CanonicalEntryPoint {
    selector: Felt,
    offset: Felt,
    builtins: Vec<Felt>,
}

fn canonical_entry_points(kind: &str, entry_points: &[EntryPoint]) -> Result<Vec<CanonicalEntryPoint>> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(entry_points.len());
    for ep in entry_points {
        if !seen.insert(ep.selector) {
            return Err(AuthError::MalformedArtifact(format!(
                "duplicate {kind} selector {}",
                ep.selector
            )));
        }
        let builtins = ep
            .builtins
            .iter()
            .map(|name| {
                Felt::from_short_string(name).map_err(|e| {
                    AuthError::MalformedArtifact(format!("builtin `{name}` in {kind}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        out.push(CanonicalEntryPoint {
            selector: ep.selector,
            offset: Felt::from(ep.offset),
            builtins,
        });
    }
    out.sort_by(|a, b| a.selector.cmp(&b.selector));
    Ok(out)
}

/// Derives class identifiers and deployment addresses.
#[derive(Clone, Debug, Default)]
pub struct IdentityDeriver<H = Pedersen> {
    hasher: H,
}

impl IdentityDeriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H: PairHasher> IdentityDeriver<H> {
    pub fn with_hasher(hasher: H) -> Self {
        Self { hasher }
    }

    /// Content hash of a compiled class.
    pub fn class_identifier(&self, artifact: &CompiledArtifact) -> Result<Felt> {
        if artifact.bytecode.is_empty() {
            return Err(AuthError::MalformedArtifact("empty bytecode".into()));
        }
        let eps = &artifact.entry_points_by_type;
        let external = canonical_entry_points("EXTERNAL", &eps.external)?;
        let l1_handler = canonical_entry_points("L1_HANDLER", &eps.l1_handler)?;
        let constructor = canonical_entry_points("CONSTRUCTOR", &eps.constructor)?;

        let class_id = HashChain::new(&self.hasher)
            .update(COMPILED_CLASS_VERSION)
            .update(self.entry_points_hash(&external))
            .update(self.entry_points_hash(&l1_handler))
            .update(self.entry_points_hash(&constructor))
            .update(hash_on_elements(&self.hasher, &artifact.bytecode))
            .finalize();
        tracing::debug!(%class_id, bytecode_len = artifact.bytecode.len(), "derived class identifier");
        Ok(class_id)
    }

    /// Parse raw artifact JSON and hash it.
    pub fn class_identifier_from_json(&self, json: &[u8]) -> Result<Felt> {
        self.class_identifier(&CompiledArtifact::from_slice(json)?)
    }

    /// Address of a self-deployed contract.
    pub fn deployed_address(&self, class_id: Felt, salt: Felt, constructor_args: &[Felt]) -> Felt {
        self.deployed_address_from(SELF_DEPLOYER, class_id, salt, constructor_args)
    }

    /// Address of a contract deployed by `deployer`.
    pub fn deployed_address_from(
        &self,
        deployer: Felt,
        class_id: Felt,
        salt: Felt,
        constructor_args: &[Felt],
    ) -> Felt {
        let raw = HashChain::new(&self.hasher)
            .update(CONTRACT_ADDRESS_PREFIX)
            .update(deployer)
            .update(salt)
            .update(class_id)
            .update(hash_on_elements(&self.hasher, constructor_args))
            .finalize();
        Felt::reduce(raw.as_u256() % ADDRESS_UPPER_BOUND)
    }

    fn entry_points_hash(&self, entry_points: &[CanonicalEntryPoint]) -> Felt {
        let mut chain = HashChain::new(&self.hasher);
        for ep in entry_points {
            chain = chain
                .update(ep.selector)
                .update(ep.offset)
                .update(hash_on_elements(&self.hasher, &ep.builtins));
        }
        chain.finalize()
    }
}
