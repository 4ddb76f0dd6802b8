//! Cryptographic utilities for the shielded mining core.
//!
//! All commitments live in the BN254 scalar field and are produced with the
//! circom parameterization of Poseidon, so the off-chain values here match
//! what the reward/withdraw/tree-update circuits compute in-circuit.

use alloy_primitives::{Address, U256};
use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonBytesHasher};
use rand::{rngs::OsRng, RngCore};

/// Secrets and nullifiers are 31-byte quantities. Staying one byte under the
/// 254-bit field avoids modulo bias when sampling.
pub const SCALAR_SIZE: usize = 31;

/// Poseidon hash of a single field element.
pub fn poseidon1(a: Fr) -> Fr {
    hash_n(&[a])
}

/// Poseidon hash of two field elements. Used for Merkle tree nodes and
/// two-input commitments.
pub fn poseidon2(a: Fr, b: Fr) -> Fr {
    hash_n(&[a, b])
}

/// Poseidon hash of three field elements. Used for account commitments and
/// the instance-bound tree leaves.
pub fn poseidon3(a: Fr, b: Fr, c: Fr) -> Fr {
    hash_n(&[a, b, c])
}

fn hash_n(inputs: &[Fr]) -> Fr {
    let mut poseidon = Poseidon::<Fr>::new_circom(inputs.len()).unwrap();
    let bytes: Vec<Vec<u8>> = inputs
        .iter()
        .map(|x| x.into_bigint().to_bytes_be())
        .collect();
    let refs: Vec<&[u8]> = bytes.iter().map(|b| b.as_slice()).collect();
    let hash = poseidon.hash_bytes_be(&refs).unwrap();
    Fr::from_be_bytes_mod_order(&hash)
}

/// Convert a field element into a 256-bit big integer.
pub fn fr_to_u256(v: Fr) -> U256 {
    let bytes: [u8; 32] = v
        .into_bigint()
        .to_bytes_be()
        .try_into()
        .expect("BN254 scalars are 32 bytes");
    U256::from_be_bytes(bytes)
}

/// Convert a 256-bit big integer into a field element, reducing mod p.
pub fn u256_to_fr(v: U256) -> Fr {
    Fr::from_be_bytes_mod_order(&v.to_be_bytes::<32>())
}

/// Interpret a 20-byte address as a field element.
pub fn address_to_fr(addr: Address) -> Fr {
    Fr::from_be_bytes_mod_order(addr.as_slice())
}

/// Sample a random 31-byte scalar from the OS entropy source.
pub fn random_scalar() -> U256 {
    let mut bytes = [0u8; SCALAR_SIZE];
    OsRng.fill_bytes(&mut bytes);
    U256::from_be_slice(&bytes)
}

/// Format a big integer as a `0x`-prefixed hex string of exactly `len` bytes.
/// This is the fixed-width form the on-chain argument structs expect.
pub fn to_fixed_hex(v: U256, len: usize) -> String {
    format!("0x{:0>width$x}", v, width = len * 2)
}

/// Fixed-width hex for a field element (32 bytes unless narrowed).
pub fn fr_to_fixed_hex(v: Fr, len: usize) -> String {
    to_fixed_hex(fr_to_u256(v), len)
}

/// Pack Merkle direction bits into a single integer. `bits[0]` is the bit at
/// the leaf level and becomes the least significant bit.
pub fn bits_to_number(bits: &[u8]) -> U256 {
    let mut n = U256::ZERO;
    for bit in bits.iter().rev() {
        n = (n << 1) | U256::from(*bit);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poseidon_is_deterministic() {
        let a = Fr::from(123u64);
        let b = Fr::from(456u64);
        assert_eq!(poseidon2(a, b), poseidon2(a, b));
        assert_eq!(poseidon3(a, b, a), poseidon3(a, b, a));
        assert_eq!(poseidon1(a), poseidon1(a));
    }

    #[test]
    fn poseidon_arities_are_domain_separated() {
        let a = Fr::from(7u64);
        assert_ne!(poseidon1(a), poseidon2(a, Fr::from(0u64)));
        assert_ne!(poseidon2(a, a), poseidon3(a, a, Fr::from(0u64)));
    }

    #[test]
    fn u256_fr_round_trip() {
        let v = U256::from(987654321u64);
        assert_eq!(fr_to_u256(u256_to_fr(v)), v);
    }

    #[test]
    fn random_scalar_fits_31_bytes() {
        for _ in 0..16 {
            let s = random_scalar();
            assert!(s < U256::from(1u64) << 248);
        }
    }

    #[test]
    fn fixed_hex_is_zero_padded() {
        assert_eq!(
            to_fixed_hex(U256::from(1u64), 32),
            format!("0x{}1", "0".repeat(63))
        );
        assert_eq!(
            to_fixed_hex(U256::from(0xabcdu64), 20),
            format!("0x{}abcd", "0".repeat(36))
        );
    }

    #[test]
    fn bits_pack_lsb_first() {
        assert_eq!(bits_to_number(&[1, 0, 1]), U256::from(5u64));
        assert_eq!(bits_to_number(&[0, 1]), U256::from(2u64));
        assert_eq!(bits_to_number(&[]), U256::ZERO);
    }
}
