//! External-data hashes.
//!
//! Fields the arithmetic circuits cannot see directly (relayer and
//! recipient addresses, the sealed account ciphertext, the relayer fee) are
//! bound into a single public input: Keccak-256 over their fixed-width
//! concatenation. Tampering with any of them after proving invalidates the
//! proof. The top byte of the digest is zeroed so the value fits the BN254
//! scalar field.

use alloy_primitives::{Address, U256};
use tiny_keccak::{Hasher, Keccak};

/// Binds the reward operation's circuit-external fields.
pub fn ext_reward_args_hash(relayer: Address, encrypted_account: &[u8]) -> U256 {
    let mut hasher = Keccak::v256();
    hasher.update(&pad_address(relayer));
    hasher.update(encrypted_account);
    finalize_to_field(hasher)
}

/// Binds the withdrawal operation's circuit-external fields.
pub fn ext_withdraw_args_hash(
    fee: U256,
    recipient: Address,
    relayer: Address,
    encrypted_account: &[u8],
) -> U256 {
    let mut hasher = Keccak::v256();
    hasher.update(&fee.to_be_bytes::<32>());
    hasher.update(&pad_address(recipient));
    hasher.update(&pad_address(relayer));
    hasher.update(encrypted_account);
    finalize_to_field(hasher)
}

fn pad_address(addr: Address) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(addr.as_slice());
    out
}

fn finalize_to_field(hasher: Keccak) -> U256 {
    let mut digest = [0u8; 32];
    hasher.finalize(&mut digest);
    // Drop the high byte so the hash is always a valid field element.
    digest[0] = 0;
    U256::from_be_bytes(digest)
}
