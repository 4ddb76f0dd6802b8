//! Client for the shielded mining system: remote-tree leaf fetching, the
//! proof-input controller for the reward, withdraw-reward, and tree-update
//! circuits, and the CLI commands.
//!
//! The core entities (accounts, notes, trees, sealing) live in the
//! `sacred-mining` crate; this crate adds everything that needs a network
//! or a prover behind it.

pub mod commands;
pub mod controller;
pub mod error;
pub mod ext;
pub mod leaves;
pub mod store;

pub use controller::{
    BatchRewardProof, Controller, ProvingKeys, RewardOptions, RewardProof, Session,
    TreeUpdateProof, WithdrawOptions, WithdrawProof,
};
pub use error::MinerError;
pub use leaves::{fetch_leaves, DEFAULT_BATCH_SIZE};
pub use store::{Circuit, LeafStore, MinerRegistry, Prover, ProverError, StoreError};
