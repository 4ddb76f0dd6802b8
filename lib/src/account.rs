//! The private mining account.
//!
//! A balance is never stored in the clear: only `commitment` ever appears
//! on-chain, as a leaf of the account tree. Accounts are value objects -
//! every reward or withdrawal produces a brand-new account with a fresh
//! secret and nullifier that supersedes the old one.

use alloy_primitives::{I256, U256};
use ark_bn254::Fr;

use crate::crypto::{poseidon1, poseidon3, random_scalar, u256_to_fr, SCALAR_SIZE};
use crate::error::CoreError;
use crate::seal::{self, SealError};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// `amount(31B BE) ‖ secret(31B BE) ‖ nullifier(31B BE)`.
pub const ENCODED_LEN: usize = 3 * SCALAR_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub amount: U256,
    pub secret: U256,
    pub nullifier: U256,
}

impl Account {
    /// Fresh account with a zero balance, for first-time users.
    pub fn new() -> Self {
        Self {
            amount: U256::ZERO,
            secret: random_scalar(),
            nullifier: random_scalar(),
        }
    }

    /// Account holding `amount` with fresh secrets. This is the sole
    /// balance-sufficiency gate: reward and withdraw arithmetic is done in
    /// signed form and lands here, so an overdraft fails before anything
    /// touches the network. Amounts must also fit the 31-byte encoding.
    pub fn try_with_amount(amount: I256) -> Result<Self, CoreError> {
        if amount.is_negative() {
            return Err(CoreError::InvalidAccount {
                amount: amount.to_string(),
            });
        }
        Ok(Self {
            amount: checked_amount(amount.unsigned_abs())?,
            secret: random_scalar(),
            nullifier: random_scalar(),
        })
    }

    /// Account holding `base + credit - debit` with fresh secrets. This is
    /// how reward and withdraw arithmetic lands: a result that would go
    /// negative or exceed the encodable range fails here, before anything
    /// is proven or submitted.
    pub fn try_adjusted(base: U256, credit: U256, debit: U256) -> Result<Self, CoreError> {
        let funds = base
            .checked_add(credit)
            .ok_or_else(|| CoreError::InvalidAccount {
                amount: format!("{base} + {credit} overflows"),
            })?;
        let amount = funds
            .checked_sub(debit)
            .ok_or_else(|| CoreError::InvalidAccount {
                amount: format!("-{}", debit - funds),
            })?;
        Ok(Self {
            amount: checked_amount(amount)?,
            secret: random_scalar(),
            nullifier: random_scalar(),
        })
    }

    /// The account-tree leaf for this account.
    pub fn commitment(&self) -> Fr {
        poseidon3(
            u256_to_fr(self.amount),
            u256_to_fr(self.secret),
            u256_to_fr(self.nullifier),
        )
    }

    /// Published when the account is spent, preventing reuse without
    /// revealing which commitment was consumed.
    pub fn nullifier_hash(&self) -> Fr {
        poseidon1(u256_to_fr(self.nullifier))
    }

    /// Fixed 93-byte encoding. All three components are 31-byte quantities
    /// by construction.
    pub fn encode(&self) -> [u8; ENCODED_LEN] {
        let mut out = [0u8; ENCODED_LEN];
        write_scalar(&mut out[..SCALAR_SIZE], self.amount);
        write_scalar(&mut out[SCALAR_SIZE..2 * SCALAR_SIZE], self.secret);
        write_scalar(&mut out[2 * SCALAR_SIZE..], self.nullifier);
        out
    }

    /// Textual form: standard base64 of the 93-byte encoding.
    pub fn encode_base64(&self) -> String {
        BASE64.encode(self.encode())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != ENCODED_LEN {
            return Err(CoreError::InvalidAccountEncoding {
                reason: format!("expected {} bytes, got {}", ENCODED_LEN, bytes.len()),
            });
        }
        Ok(Self {
            amount: U256::from_be_slice(&bytes[..SCALAR_SIZE]),
            secret: U256::from_be_slice(&bytes[SCALAR_SIZE..2 * SCALAR_SIZE]),
            nullifier: U256::from_be_slice(&bytes[2 * SCALAR_SIZE..]),
        })
    }

    pub fn decode_base64(text: &str) -> Result<Self, CoreError> {
        let bytes = BASE64
            .decode(text)
            .map_err(|e| CoreError::InvalidAccountEncoding {
                reason: format!("invalid base64: {e}"),
            })?;
        Self::decode(&bytes)
    }

    /// Seal the encoding to a recipient public key for on-chain publication.
    pub fn seal_to(&self, recipient: &[u8; 32]) -> Result<Vec<u8>, SealError> {
        seal::seal(recipient, &self.encode())
    }

    /// Open a sealed account published for us.
    pub fn open_from(secret: &[u8; 32], payload: &[u8]) -> Result<Self, CoreError> {
        let bytes = seal::open(secret, payload).map_err(|e| CoreError::InvalidAccountEncoding {
            reason: e.to_string(),
        })?;
        Self::decode(&bytes)
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::new()
    }
}

/// The encoding holds 31-byte components, so amounts are capped below
/// 2^248. Secrets and nullifiers satisfy this by construction.
fn checked_amount(amount: U256) -> Result<U256, CoreError> {
    if amount >= U256::from(1u64) << (8 * SCALAR_SIZE) {
        return Err(CoreError::InvalidAccount {
            amount: amount.to_string(),
        });
    }
    Ok(amount)
}

fn write_scalar(out: &mut [u8], value: U256) {
    // Values are 31-byte quantities by construction; the top byte of the
    // 32-byte form is always zero.
    let be = value.to_be_bytes::<32>();
    debug_assert_eq!(be[0], 0, "scalar exceeds 31 bytes");
    out.copy_from_slice(&be[1..]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seal::keypair;

    #[test]
    fn new_account_is_empty_with_random_secrets() {
        let a = Account::new();
        let b = Account::new();
        assert_eq!(a.amount, U256::ZERO);
        assert_ne!(a.secret, b.secret);
        assert_ne!(a.nullifier, b.nullifier);
        assert_ne!(a.commitment(), b.commitment());
    }

    #[test]
    fn negative_amounts_are_rejected() {
        for raw in [-1i64, -1000] {
            let err = Account::try_with_amount(I256::try_from(raw).unwrap()).unwrap_err();
            match err {
                CoreError::InvalidAccount { amount } => {
                    assert_eq!(amount, raw.to_string());
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn non_negative_amounts_are_accepted() {
        let a = Account::try_with_amount(I256::try_from(1950i64).unwrap()).unwrap();
        assert_eq!(a.amount, U256::from(1950u64));
        assert_eq!(
            Account::try_with_amount(I256::ZERO).unwrap().amount,
            U256::ZERO
        );
    }

    #[test]
    fn adjusted_amounts_are_checked() {
        let a = Account::try_adjusted(
            U256::from(1950u64),
            U256::ZERO,
            U256::from(510u64),
        )
        .unwrap();
        assert_eq!(a.amount, U256::from(1440u64));

        let err = Account::try_adjusted(U256::from(1950u64), U256::ZERO, U256::from(2000u64))
            .unwrap_err();
        match err {
            CoreError::InvalidAccount { amount } => assert_eq!(amount, "-50"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn oversized_amounts_are_rejected() {
        let big = U256::from(1u64) << 250;
        let err = Account::try_adjusted(big, U256::ZERO, U256::ZERO).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAccount { .. }));
        let err = Account::try_with_amount(I256::from_raw(big)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAccount { .. }));
        let err =
            Account::try_adjusted(big >> 3, big >> 3, U256::ZERO).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAccount { .. }));

        // The largest encodable amount still round-trips byte-exact.
        let max = (U256::from(1u64) << 248) - U256::from(1u64);
        let account = Account::try_adjusted(max, U256::ZERO, U256::ZERO).unwrap();
        assert_eq!(account.amount, max);
        assert_eq!(Account::decode(&account.encode()).unwrap(), account);
    }

    #[test]
    fn encode_decode_round_trip_is_byte_exact() {
        let account = Account::new();
        let encoded = account.encode();
        assert_eq!(encoded.len(), ENCODED_LEN);
        let decoded = Account::decode(&encoded).unwrap();
        assert_eq!(decoded, account);
        assert_eq!(decoded.encode(), encoded);
    }

    #[test]
    fn base64_round_trip() {
        let account = Account {
            amount: U256::from(123456789u64),
            secret: random_scalar(),
            nullifier: random_scalar(),
        };
        let text = account.encode_base64();
        assert_eq!(Account::decode_base64(&text).unwrap(), account);
    }

    #[test]
    fn bad_encodings_are_rejected() {
        assert!(Account::decode(&[0u8; 92]).is_err());
        assert!(Account::decode_base64("not base64!!").is_err());
    }

    #[test]
    fn derived_values_are_stable() {
        let account = Account::new();
        assert_eq!(account.commitment(), account.commitment());
        assert_eq!(account.nullifier_hash(), account.nullifier_hash());
    }

    #[test]
    fn seal_round_trips_through_recipient_key() {
        let (sk, pk) = keypair();
        let account = Account::new();
        let sealed = account.seal_to(&pk).unwrap();
        assert_eq!(Account::open_from(&sk, &sealed).unwrap(), account);
    }
}
