//! Core entities for the shielded mining system: the private account, the
//! deposit/withdrawal note, the Poseidon commitment hashes, the local
//! reconstruction of the append-only commitment trees, and public-key
//! sealing of account state.
//!
//! Everything here is synchronous and I/O-free; the client crate layers the
//! remote stores, the leaf fetcher, and the proof-input controller on top.

pub mod account;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod note;
pub mod seal;

pub use account::{Account, ENCODED_LEN};
pub use error::CoreError;
pub use merkle::{MerklePath, MerkleTree, DEFAULT_HEIGHT, ZERO_ELEMENT};
pub use note::Note;
