//! Remote collaborator boundaries.
//!
//! Every remote read and the prover sit behind one of these narrow traits,
//! bound once per concrete chain client. The controller never talks to a
//! contract binding directly, so swapping SDKs means re-implementing these
//! traits and nothing else.

use alloy_primitives::{Address, U256};
use serde_json::Value;
use thiserror::Error;

/// Opaque failure from the remote store. Not retried here; the enclosing
/// operation fails and the caller starts over from a fresh fetch.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

/// Read access to one remote append-only tree.
pub trait LeafStore {
    /// Number of populated leaves; the next leaf will land at this index.
    fn next_index(&self) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;

    /// Leaves of the half-open range `[start, end)`, index-ascending.
    /// `end` past the populated range is clamped by the store.
    fn leaf_slice(
        &self,
        start: u64,
        end: u64,
    ) -> impl std::future::Future<Output = Result<Vec<U256>, StoreError>> + Send;
}

/// Read access to the miner contract: per-pool issuance rates and the
/// role/address registry.
pub trait MinerRegistry {
    fn rate(&self, instance: Address)
        -> impl std::future::Future<Output = Result<U256, StoreError>> + Send;

    fn role_address(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Address, StoreError>> + Send;
}

/// The three proof circuits this client produces inputs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Circuit {
    Reward,
    WithdrawReward,
    TreeUpdate,
}

/// Opaque prover failure. Non-retryable from this side.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProverError(pub String);

/// The external proving system. Given a circuit, its proving key, and the
/// assembled numeric input record (decimal strings keyed by circuit signal
/// name), returns the serialized proof.
pub trait Prover {
    fn prove(
        &self,
        circuit: Circuit,
        proving_key: &[u8],
        input: &Value,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, ProverError>> + Send;
}
