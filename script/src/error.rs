//! Client-side error taxonomy. All variants are terminal for the operation
//! that raised them: nothing is retried internally, and a failed operation
//! never returns a proof or a mutated account. Remote and prover failures
//! are opaque passthroughs.

use thiserror::Error;

use sacred_mining::error::CoreError;
use sacred_mining::seal::SealError;

use crate::store::{Circuit, StoreError};

#[derive(Debug, Error)]
pub enum MinerError {
    /// The deposit tree has no leaf for this note. The note was never
    /// deposited (or the deposit is not yet registered in the tree).
    #[error("reward: deposit tree has no leaf for note commitment {commitment}")]
    NoteNotDeposited { commitment: String },

    /// The withdrawal tree has no leaf for this note's nullifier.
    #[error("reward: withdrawal tree has no leaf for note commitment {commitment}")]
    NoteNotWithdrawn { commitment: String },

    /// The note records a withdrawal before its deposit; no valid reward
    /// interval exists.
    #[error(
        "reward: withdrawal block {withdrawal} precedes deposit block {deposit} \
         for note commitment {commitment}"
    )]
    InvertedBlockOrder {
        commitment: String,
        deposit: u64,
        withdrawal: u64,
    },

    /// Withdrawals require the account commitment to already be in the
    /// account tree; a never-funded account cannot spend.
    #[error("withdraw: account tree does not contain commitment {commitment}")]
    AccountNotFound { commitment: String },

    /// The fetched leaf set does not cover `[0, next_index)` exactly.
    #[error("{tree} tree: inconsistent leaf set: expected {expected} leaves, fetched {got}")]
    InconsistentLeafSet {
        tree: &'static str,
        expected: u64,
        got: u64,
    },

    #[error("remote read failed: {0}")]
    Remote(#[from] StoreError),

    #[error("prover failed for {circuit:?} circuit: {message}")]
    Prover { circuit: Circuit, message: String },

    #[error("failed to encode prover input: {0}")]
    InputEncoding(#[from] serde_json::Error),

    #[error("failed to seal account state: {0}")]
    Seal(#[from] SealError),

    #[error(transparent)]
    Core(#[from] CoreError),
}
