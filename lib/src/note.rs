//! Deposit/withdrawal note for the anonymous pools.
//!
//! A note captures one completed deposit/withdrawal pair in a pool instance
//! and is only ever used to locate positions in the deposit and withdrawal
//! trees. Notes are immutable once parsed or created.
//!
//! Textual grammar (what users store after depositing):
//!
//! ```text
//! sacred-<currency>-<amount>-<netId>-0x<124 hex chars>
//! ```
//!
//! where the hex payload is `nullifier(31B) ‖ secret(31B)`, little-endian.

use std::fmt;

use alloy_primitives::{Address, U256};
use ark_bn254::Fr;

use crate::crypto::{
    address_to_fr, poseidon1, poseidon2, poseidon3, random_scalar, u256_to_fr, SCALAR_SIZE,
};
use crate::error::CoreError;

const NOTE_PREFIX: &str = "sacred";
const PAYLOAD_HEX_LEN: usize = 2 * 2 * SCALAR_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    /// Pool address the deposit went into.
    pub instance: Address,
    pub currency: String,
    /// Denomination label from the note string, e.g. "1".
    pub denomination: String,
    pub net_id: u64,
    pub secret: U256,
    pub nullifier: U256,
    /// Block heights at which the deposit/withdrawal were recorded
    /// on-chain. `None` means "not recorded yet" - an explicit flag rather
    /// than the zero sentinel, since height 0 itself is ambiguous.
    pub deposit_block: Option<u64>,
    pub withdrawal_block: Option<u64>,
}

impl Note {
    /// Fresh note with random secrets, as produced at deposit time.
    pub fn generate(instance: Address, currency: &str, denomination: &str, net_id: u64) -> Self {
        Self {
            instance,
            currency: currency.to_string(),
            denomination: denomination.to_string(),
            net_id,
            secret: random_scalar(),
            nullifier: random_scalar(),
            deposit_block: None,
            withdrawal_block: None,
        }
    }

    /// Parse a note string, attaching the chain-side facts the string does
    /// not carry (pool address and recorded block heights).
    pub fn parse(
        text: &str,
        instance: Address,
        deposit_block: Option<u64>,
        withdrawal_block: Option<u64>,
    ) -> Result<Self, CoreError> {
        let parts: Vec<&str> = text.split('-').collect();
        if parts.len() != 5 {
            return Err(malformed(format!(
                "expected 5 dash-separated fields, got {}",
                parts.len()
            )));
        }
        if parts[0] != NOTE_PREFIX {
            return Err(malformed(format!("unknown prefix {:?}", parts[0])));
        }
        if parts[1].is_empty() || parts[2].is_empty() {
            return Err(malformed("empty currency or amount field".to_string()));
        }
        let net_id: u64 = parts[3]
            .parse()
            .map_err(|_| malformed(format!("invalid network id {:?}", parts[3])))?;

        let payload = parts[4]
            .strip_prefix("0x")
            .ok_or_else(|| malformed("payload missing 0x prefix".to_string()))?;
        if payload.len() != PAYLOAD_HEX_LEN {
            return Err(malformed(format!(
                "payload must be {} hex chars, got {}",
                PAYLOAD_HEX_LEN,
                payload.len()
            )));
        }
        let bytes = hex::decode(payload)
            .map_err(|e| malformed(format!("payload is not valid hex: {e}")))?;

        Ok(Self {
            instance,
            currency: parts[1].to_string(),
            denomination: parts[2].to_string(),
            net_id,
            nullifier: U256::from_le_slice(&bytes[..SCALAR_SIZE]),
            secret: U256::from_le_slice(&bytes[SCALAR_SIZE..]),
            deposit_block,
            withdrawal_block,
        })
    }

    /// The deposit commitment published when this note was created.
    pub fn commitment(&self) -> Fr {
        poseidon2(u256_to_fr(self.nullifier), u256_to_fr(self.secret))
    }

    /// Revealed at withdrawal time to prevent double-spends.
    pub fn nullifier_hash(&self) -> Fr {
        poseidon1(u256_to_fr(self.nullifier))
    }

    /// Nullifier for the reward claim. Derived from the same nullifier but
    /// in a distinct hash domain, so claiming the mining reward cannot be
    /// confused with (or blocked by) the withdrawal itself.
    pub fn reward_nullifier(&self) -> Fr {
        poseidon2(u256_to_fr(self.nullifier), Fr::from(0u64))
    }

    /// Recorded block height and leaf of the deposit tree, if the deposit
    /// is recorded.
    pub fn deposit_leaf(&self) -> Option<(u64, Fr)> {
        self.deposit_block.map(|block| {
            let leaf = poseidon3(
                address_to_fr(self.instance),
                self.commitment(),
                Fr::from(block),
            );
            (block, leaf)
        })
    }

    /// Recorded block height and leaf of the withdrawal tree, if the
    /// withdrawal is recorded.
    pub fn withdrawal_leaf(&self) -> Option<(u64, Fr)> {
        self.withdrawal_block.map(|block| {
            let leaf = poseidon3(
                address_to_fr(self.instance),
                self.nullifier_hash(),
                Fr::from(block),
            );
            (block, leaf)
        })
    }
}

/// Regenerates the exact note string.
impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = [0u8; 2 * SCALAR_SIZE];
        payload[..SCALAR_SIZE]
            .copy_from_slice(&self.nullifier.to_le_bytes::<32>()[..SCALAR_SIZE]);
        payload[SCALAR_SIZE..].copy_from_slice(&self.secret.to_le_bytes::<32>()[..SCALAR_SIZE]);
        write!(
            f,
            "{}-{}-{}-{}-0x{}",
            NOTE_PREFIX,
            self.currency,
            self.denomination,
            self.net_id,
            hex::encode(payload)
        )
    }
}

fn malformed(reason: String) -> CoreError {
    CoreError::MalformedNote { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> Address {
        Address::from_slice(&[0x11u8; 20])
    }

    #[test]
    fn display_parse_round_trip() {
        let note = Note::generate(instance(), "cfx", "1", 1029);
        let text = note.to_string();
        let parsed = Note::parse(&text, instance(), None, None).unwrap();
        assert_eq!(parsed, note);
        assert_eq!(parsed.to_string(), text);
    }

    #[test]
    fn parsed_note_reproduces_deposit_commitment() {
        let original = Note::generate(instance(), "cfx", "100", 1);
        let parsed = Note::parse(&original.to_string(), instance(), None, None).unwrap();
        assert_eq!(parsed.commitment(), original.commitment());
        assert_eq!(parsed.nullifier_hash(), original.nullifier_hash());
        assert_eq!(parsed.reward_nullifier(), original.reward_nullifier());
    }

    #[test]
    fn reward_nullifier_differs_from_nullifier_hash() {
        let note = Note::generate(instance(), "cfx", "1", 1);
        assert_ne!(note.reward_nullifier(), note.nullifier_hash());
    }

    #[test]
    fn leaves_require_recorded_blocks() {
        let mut note = Note::generate(instance(), "cfx", "1", 1);
        assert_eq!(note.deposit_leaf(), None);
        assert_eq!(note.withdrawal_leaf(), None);

        note.deposit_block = Some(100);
        note.withdrawal_block = Some(1100);
        let (deposit_block, deposit) = note.deposit_leaf().unwrap();
        let (withdrawal_block, withdrawal) = note.withdrawal_leaf().unwrap();
        assert_eq!(deposit_block, 100);
        assert_eq!(withdrawal_block, 1100);
        assert_ne!(deposit, withdrawal);
    }

    #[test]
    fn malformed_notes_are_rejected() {
        let good = Note::generate(instance(), "cfx", "1", 1).to_string();

        let cases = [
            "sacred-cfx-1-1".to_string(),
            good.replacen("sacred", "shield", 1),
            good.replacen("-1-0x", "-x-0x", 1),
            good[..good.len() - 2].to_string(),
            good.replacen("0x", "", 1),
            format!("{}zz", &good[..good.len() - 2]),
        ];
        for case in cases {
            let err = Note::parse(&case, instance(), None, None).unwrap_err();
            assert!(
                matches!(err, CoreError::MalformedNote { .. }),
                "case {:?} gave {:?}",
                case,
                err
            );
        }
    }
}
