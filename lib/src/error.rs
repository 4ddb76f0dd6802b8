//! Error taxonomy for the core entities. Every variant is terminal for the
//! operation that raised it; callers decide whether to rebuild state and
//! retry from scratch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The note string does not match the
    /// `sacred-<currency>-<amount>-<netId>-0x<124 hex>` grammar.
    #[error("malformed note: {reason}")]
    MalformedNote { reason: String },

    /// Accounts can never hold a negative balance, and amounts must fit
    /// the 31-byte encoding. The rejected amount is carried for
    /// diagnostics.
    #[error("invalid account amount {amount}")]
    InvalidAccount { amount: String },

    /// The encoded account blob is not exactly 93 bytes of valid data.
    #[error("invalid account encoding: {reason}")]
    InvalidAccountEncoding { reason: String },

    /// More leaves than a tree of this height can hold.
    #[error("merkle tree of height {height} cannot hold {leaves} leaves")]
    TreeFull { height: usize, leaves: usize },

    /// A path or lookup referenced a leaf index past the populated range.
    #[error("leaf index {index} out of range (tree has {leaves} leaves)")]
    IndexOutOfRange { index: usize, leaves: usize },
}
