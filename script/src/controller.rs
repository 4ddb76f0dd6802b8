//! Proof-input controller.
//!
//! Orchestrates the entities and tree reconstructions into complete,
//! circuit-ready input records for the three operations: reward issuance,
//! reward-balance withdrawal, and account-tree update. Each operation
//! fetches fresh leaves, rebuilds the trees it needs, locates the caller's
//! positions, assembles the numeric record, and hands it to the external
//! prover. The returned args mirror the public circuit inputs as
//! fixed-width hex, ready for on-chain submission.
//!
//! Batched rewards thread state strictly sequentially: each step's output
//! account and not-yet-published commitment feed the next step's input.

use alloy_primitives::{Address, U256};
use ark_bn254::Fr;
use serde::Serialize;
use tracing::{debug, info};

use sacred_mining::account::Account;
use sacred_mining::crypto::{fr_to_fixed_hex, fr_to_u256, to_fixed_hex, u256_to_fr};
use sacred_mining::error::CoreError;
use sacred_mining::merkle::{MerklePath, MerkleTree};
use sacred_mining::note::Note;

use crate::error::MinerError;
use crate::ext::{ext_reward_args_hash, ext_withdraw_args_hash};
use crate::leaves::{fetch_leaves, DEFAULT_BATCH_SIZE};
use crate::store::{Circuit, LeafStore, MinerRegistry, Prover};

/// Opaque proving-key material, one per circuit.
#[derive(Debug, Clone)]
pub struct ProvingKeys {
    pub reward: Vec<u8>,
    pub withdraw_reward: Vec<u8>,
    pub tree_update: Vec<u8>,
}

/// Per-invocation context. Constructed once by the driver and passed into
/// the controller; there is no ambient global state.
#[derive(Debug, Clone)]
pub struct Session {
    pub tree_height: usize,
    pub leaf_batch_size: u64,
    pub proving_keys: ProvingKeys,
}

impl Session {
    pub fn new(tree_height: usize, proving_keys: ProvingKeys) -> Self {
        Self {
            tree_height,
            leaf_batch_size: DEFAULT_BATCH_SIZE,
            proving_keys,
        }
    }
}

/// Options for a reward claim. Every field is explicit; the zero values are
/// the defaults, not sentinels discovered at run time.
#[derive(Debug, Clone, Default)]
pub struct RewardOptions {
    pub fee: U256,
    pub relayer: Address,
}

/// Options for a reward-balance withdrawal.
#[derive(Debug, Clone, Default)]
pub struct WithdrawOptions {
    pub fee: U256,
    pub relayer: Address,
}

/// Full numeric record for the reward circuit. Serialized with the signal
/// names the circuit declares; all values are decimal strings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardInput {
    pub rate: String,
    pub fee: String,
    pub instance: String,
    pub reward_nullifier: String,
    pub ext_data_hash: String,

    pub note_secret: String,
    pub note_nullifier: String,

    pub input_amount: String,
    pub input_secret: String,
    pub input_nullifier: String,
    pub input_root: String,
    pub input_path_elements: Vec<String>,
    pub input_path_indices: String,
    pub input_nullifier_hash: String,

    pub output_amount: String,
    pub output_secret: String,
    pub output_nullifier: String,
    pub output_commitment: String,

    pub deposit_block: String,
    pub deposit_root: String,
    pub deposit_path_indices: String,
    pub deposit_path_elements: Vec<String>,

    pub withdrawal_block: String,
    pub withdrawal_root: String,
    pub withdrawal_path_indices: String,
    pub withdrawal_path_elements: Vec<String>,
}

/// Numeric record for the withdraw-reward circuit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawInput {
    /// Public spend: requested amount plus relayer fee.
    pub amount: String,
    pub ext_data_hash: String,

    pub input_amount: String,
    pub input_secret: String,
    pub input_nullifier: String,
    pub input_nullifier_hash: String,
    pub input_root: String,
    pub input_path_indices: String,
    pub input_path_elements: Vec<String>,

    pub output_amount: String,
    pub output_secret: String,
    pub output_nullifier: String,
    pub output_commitment: String,
}

/// Numeric record for the tree-update circuit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeUpdateInput {
    pub old_root: String,
    pub new_root: String,
    pub leaf: String,
    pub path_indices: String,
    pub path_elements: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardExtData {
    pub relayer: String,
    pub encrypted_account: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawExtData {
    pub fee: String,
    pub recipient: String,
    pub relayer: String,
    pub encrypted_account: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountArgs {
    pub input_root: String,
    pub input_nullifier_hash: String,
    pub output_commitment: String,
}

/// Public inputs of the reward circuit, fixed-width hex.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardArgs {
    pub rate: String,
    pub fee: String,
    pub instance: String,
    pub reward_nullifier: String,
    pub ext_data_hash: String,
    pub deposit_root: String,
    pub withdrawal_root: String,
    pub ext_data: RewardExtData,
    pub account: AccountArgs,
}

/// Public inputs of the withdraw-reward circuit, fixed-width hex.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawArgs {
    pub amount: String,
    pub ext_data_hash: String,
    pub ext_data: WithdrawExtData,
    pub account: AccountArgs,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeUpdateArgs {
    pub old_root: String,
    pub new_root: String,
    pub leaf: String,
    pub path_indices: String,
}

/// Result of one reward claim. `account` supersedes the input account.
#[derive(Debug, Clone)]
pub struct RewardProof {
    pub proof: Vec<u8>,
    pub args: RewardArgs,
    pub account: Account,
}

#[derive(Debug, Clone)]
pub struct WithdrawProof {
    pub proof: Vec<u8>,
    pub args: WithdrawArgs,
    pub account: Account,
}

/// Ordered per-step proofs of a batch, plus the final account. The caller
/// must submit the steps in exactly this order.
#[derive(Debug, Clone)]
pub struct BatchRewardProof {
    pub proofs: Vec<RewardProof>,
    pub account: Account,
}

#[derive(Debug, Clone)]
pub struct TreeUpdateProof {
    pub proof: Vec<u8>,
    pub args: TreeUpdateArgs,
}

/// The proof-input controller. One `LeafStore` per remote tree, one
/// registry for rates and roles, one prover.
pub struct Controller<S, R, P> {
    session: Session,
    deposit_tree: S,
    withdrawal_tree: S,
    account_tree: S,
    registry: R,
    prover: P,
}

impl<S: LeafStore, R: MinerRegistry, P: Prover> Controller<S, R, P> {
    pub fn new(
        session: Session,
        deposit_tree: S,
        withdrawal_tree: S,
        account_tree: S,
        registry: R,
        prover: P,
    ) -> Self {
        Self {
            session,
            deposit_tree,
            withdrawal_tree,
            account_tree,
            registry,
            prover,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Claim the mining reward for one note against `account`, producing a
    /// proof and the superseding output account.
    pub async fn reward(
        &self,
        account: &Account,
        note: &Note,
        recipient_key: &[u8; 32],
        opts: &RewardOptions,
    ) -> Result<RewardProof, MinerError> {
        self.reward_with_leaves(account, note, recipient_key, opts, None)
            .await
    }

    async fn reward_with_leaves(
        &self,
        account: &Account,
        note: &Note,
        recipient_key: &[u8; 32],
        opts: &RewardOptions,
        account_leaves: Option<&[U256]>,
    ) -> Result<RewardProof, MinerError> {
        let note_id = fr_to_fixed_hex(note.commitment(), 32);
        let height = self.session.tree_height;
        let batch = self.session.leaf_batch_size;

        // An unrecorded deposit or withdrawal can never be in the trees, so
        // fail before touching the network at all.
        let (deposit_block, deposit_leaf) =
            note.deposit_leaf()
                .ok_or_else(|| MinerError::NoteNotDeposited {
                    commitment: note_id.clone(),
                })?;
        let (withdrawal_block, withdrawal_leaf) =
            note.withdrawal_leaf()
                .ok_or_else(|| MinerError::NoteNotWithdrawn {
                    commitment: note_id.clone(),
                })?;
        let delta = withdrawal_block
            .checked_sub(deposit_block)
            .ok_or_else(|| MinerError::InvertedBlockOrder {
                commitment: note_id.clone(),
                deposit: deposit_block,
                withdrawal: withdrawal_block,
            })?;
        info!(op = "reward", note = %note_id, "building proof input");

        let rate = self.registry.rate(note.instance).await?;
        let earned = rate
            .checked_mul(U256::from(delta))
            .ok_or_else(|| CoreError::InvalidAccount {
                amount: format!("{rate} * {delta} overflows"),
            })?;
        let new_account = Account::try_adjusted(account.amount, earned, opts.fee)?;

        // The deposit and withdrawal trees are independent; rebuild both
        // from concurrent fetches.
        let (deposit_leaves, withdrawal_leaves) = futures::try_join!(
            fetch_leaves(&self.deposit_tree, batch, "deposit"),
            fetch_leaves(&self.withdrawal_tree, batch, "withdrawal"),
        )?;

        let deposit_tree = MerkleTree::new(height, &to_field(&deposit_leaves))?;
        let deposit_index =
            deposit_tree
                .index_of(deposit_leaf)
                .ok_or_else(|| MinerError::NoteNotDeposited {
                    commitment: note_id.clone(),
                })?;
        let deposit_path = deposit_tree.path(deposit_index)?;

        let withdrawal_tree = MerkleTree::new(height, &to_field(&withdrawal_leaves))?;
        let withdrawal_index =
            withdrawal_tree
                .index_of(withdrawal_leaf)
                .ok_or_else(|| MinerError::NoteNotWithdrawn {
                    commitment: note_id.clone(),
                })?;
        let withdrawal_path = withdrawal_tree.path(withdrawal_index)?;

        let fetched;
        let account_leaves = match account_leaves {
            Some(leaves) => leaves,
            None => {
                fetched = fetch_leaves(&self.account_tree, batch, "account").await?;
                &fetched
            }
        };
        let account_merkle = MerkleTree::new(height, &to_field(account_leaves))?;
        let input_root = account_merkle.root();
        // A brand-new account is not in the tree yet; the circuit accepts an
        // all-zero path for a zero-amount input.
        let input_path = match account_merkle.index_of(account.commitment()) {
            Some(index) => account_merkle.path(index)?,
            None => MerklePath::zero(height),
        };
        debug!(
            deposit_index,
            withdrawal_index,
            account_leaves = account_leaves.len(),
            "located tree positions"
        );

        let encrypted_account = new_account.seal_to(recipient_key)?;
        let ext_data_hash = ext_reward_args_hash(opts.relayer, &encrypted_account);

        let input = RewardInput {
            rate: rate.to_string(),
            fee: opts.fee.to_string(),
            instance: address_dec(note.instance),
            reward_nullifier: fr_dec(note.reward_nullifier()),
            ext_data_hash: ext_data_hash.to_string(),

            note_secret: note.secret.to_string(),
            note_nullifier: note.nullifier.to_string(),

            input_amount: account.amount.to_string(),
            input_secret: account.secret.to_string(),
            input_nullifier: account.nullifier.to_string(),
            input_root: fr_dec(input_root),
            input_path_elements: path_dec(&input_path),
            input_path_indices: input_path.packed_indices().to_string(),
            input_nullifier_hash: fr_dec(account.nullifier_hash()),

            output_amount: new_account.amount.to_string(),
            output_secret: new_account.secret.to_string(),
            output_nullifier: new_account.nullifier.to_string(),
            output_commitment: fr_dec(new_account.commitment()),

            deposit_block: deposit_block.to_string(),
            deposit_root: fr_dec(deposit_tree.root()),
            deposit_path_indices: deposit_path.packed_indices().to_string(),
            deposit_path_elements: path_dec(&deposit_path),

            withdrawal_block: withdrawal_block.to_string(),
            withdrawal_root: fr_dec(withdrawal_tree.root()),
            withdrawal_path_indices: withdrawal_path.packed_indices().to_string(),
            withdrawal_path_elements: path_dec(&withdrawal_path),
        };

        let proof = self
            .prove(Circuit::Reward, &self.session.proving_keys.reward, &input)
            .await?;

        let args = RewardArgs {
            rate: to_fixed_hex(rate, 32),
            fee: to_fixed_hex(opts.fee, 32),
            instance: address_hex(note.instance),
            reward_nullifier: fr_to_fixed_hex(note.reward_nullifier(), 32),
            ext_data_hash: to_fixed_hex(ext_data_hash, 32),
            deposit_root: fr_to_fixed_hex(deposit_tree.root(), 32),
            withdrawal_root: fr_to_fixed_hex(withdrawal_tree.root(), 32),
            ext_data: RewardExtData {
                relayer: address_hex(opts.relayer),
                encrypted_account: format!("0x{}", hex::encode(&encrypted_account)),
            },
            account: AccountArgs {
                input_root: fr_to_fixed_hex(input_root, 32),
                input_nullifier_hash: fr_to_fixed_hex(account.nullifier_hash(), 32),
                output_commitment: fr_to_fixed_hex(new_account.commitment(), 32),
            },
        };

        Ok(RewardProof {
            proof,
            args,
            account: new_account,
        })
    }

    /// Spend `amount` of the shielded balance to `recipient`. Unlike
    /// `reward`, the current account must already be committed in the
    /// account tree.
    pub async fn withdraw(
        &self,
        account: &Account,
        amount: U256,
        recipient: Address,
        recipient_key: &[u8; 32],
        opts: &WithdrawOptions,
    ) -> Result<WithdrawProof, MinerError> {
        let account_id = fr_to_fixed_hex(account.commitment(), 32);
        let height = self.session.tree_height;

        // Balance sufficiency is checked locally, before any remote call.
        let spend = amount
            .checked_add(opts.fee)
            .ok_or_else(|| CoreError::InvalidAccount {
                amount: format!("{amount} + {} overflows", opts.fee),
            })?;
        let new_account = Account::try_adjusted(account.amount, U256::ZERO, spend)?;
        info!(op = "withdraw", account = %account_id, "building proof input");

        let account_leaves =
            fetch_leaves(&self.account_tree, self.session.leaf_batch_size, "account").await?;
        let account_merkle = MerkleTree::new(height, &to_field(&account_leaves))?;
        let index = account_merkle
            .index_of(account.commitment())
            .ok_or_else(|| MinerError::AccountNotFound {
                commitment: account_id.clone(),
            })?;
        let input_path = account_merkle.path(index)?;
        let input_root = account_merkle.root();

        let encrypted_account = new_account.seal_to(recipient_key)?;
        let ext_data_hash =
            ext_withdraw_args_hash(opts.fee, recipient, opts.relayer, &encrypted_account);

        let input = WithdrawInput {
            amount: spend.to_string(),
            ext_data_hash: ext_data_hash.to_string(),

            input_amount: account.amount.to_string(),
            input_secret: account.secret.to_string(),
            input_nullifier: account.nullifier.to_string(),
            input_nullifier_hash: fr_dec(account.nullifier_hash()),
            input_root: fr_dec(input_root),
            input_path_indices: input_path.packed_indices().to_string(),
            input_path_elements: path_dec(&input_path),

            output_amount: new_account.amount.to_string(),
            output_secret: new_account.secret.to_string(),
            output_nullifier: new_account.nullifier.to_string(),
            output_commitment: fr_dec(new_account.commitment()),
        };

        let proof = self
            .prove(
                Circuit::WithdrawReward,
                &self.session.proving_keys.withdraw_reward,
                &input,
            )
            .await?;

        let args = WithdrawArgs {
            amount: to_fixed_hex(spend, 32),
            ext_data_hash: to_fixed_hex(ext_data_hash, 32),
            ext_data: WithdrawExtData {
                fee: to_fixed_hex(opts.fee, 32),
                recipient: address_hex(recipient),
                relayer: address_hex(opts.relayer),
                encrypted_account: format!("0x{}", hex::encode(&encrypted_account)),
            },
            account: AccountArgs {
                input_root: fr_to_fixed_hex(input_root, 32),
                input_nullifier_hash: fr_to_fixed_hex(account.nullifier_hash(), 32),
                output_commitment: fr_to_fixed_hex(new_account.commitment(), 32),
            },
        };

        Ok(WithdrawProof {
            proof,
            args,
            account: new_account,
        })
    }

    /// Claim rewards for several notes as one atomic batch. The account
    /// tree is fetched once; each step sees every prior step's unconfirmed
    /// output commitment, so the proofs are only valid when submitted in
    /// this exact order.
    pub async fn batch_reward(
        &self,
        account: &Account,
        notes: &[Note],
        recipient_key: &[u8; 32],
        opts: &RewardOptions,
    ) -> Result<BatchRewardProof, MinerError> {
        let mut account_leaves =
            fetch_leaves(&self.account_tree, self.session.leaf_batch_size, "account").await?;
        let mut current = account.clone();
        let mut proofs = Vec::with_capacity(notes.len());
        for note in notes {
            let step = self
                .reward_with_leaves(&current, note, recipient_key, opts, Some(&account_leaves))
                .await?;
            current = step.account.clone();
            account_leaves.push(fr_to_u256(current.commitment()));
            proofs.push(step);
        }
        Ok(BatchRewardProof {
            proofs,
            account: current,
        })
    }

    /// Prove an append of `commitment` to the account tree, independent of
    /// any balance change. With `tree` supplied the append goes into the
    /// caller's tree (no fetch); otherwise the tree is rebuilt from a fresh
    /// fetch.
    pub async fn tree_update(
        &self,
        commitment: Fr,
        tree: Option<&mut MerkleTree>,
    ) -> Result<TreeUpdateProof, MinerError> {
        let mut rebuilt;
        let tree = match tree {
            Some(tree) => tree,
            None => {
                let leaves =
                    fetch_leaves(&self.account_tree, self.session.leaf_batch_size, "account")
                        .await?;
                rebuilt = MerkleTree::new(self.session.tree_height, &to_field(&leaves))?;
                &mut rebuilt
            }
        };

        let old_root = tree.root();
        tree.insert(commitment)?;
        let new_root = tree.root();
        let path = tree.path(tree.len() - 1)?;
        info!(op = "tree_update", leaf_index = tree.len() - 1, "appended commitment");

        let input = TreeUpdateInput {
            old_root: fr_dec(old_root),
            new_root: fr_dec(new_root),
            leaf: fr_dec(commitment),
            path_indices: path.packed_indices().to_string(),
            path_elements: path_dec(&path),
        };

        let proof = self
            .prove(
                Circuit::TreeUpdate,
                &self.session.proving_keys.tree_update,
                &input,
            )
            .await?;

        Ok(TreeUpdateProof {
            proof,
            args: TreeUpdateArgs {
                old_root: fr_to_fixed_hex(old_root, 32),
                new_root: fr_to_fixed_hex(new_root, 32),
                leaf: fr_to_fixed_hex(commitment, 32),
                path_indices: to_fixed_hex(path.packed_indices(), 32),
            },
        })
    }

    async fn prove<T: Serialize>(
        &self,
        circuit: Circuit,
        proving_key: &[u8],
        input: &T,
    ) -> Result<Vec<u8>, MinerError> {
        let record = serde_json::to_value(input)?;
        self.prover
            .prove(circuit, proving_key, &record)
            .await
            .map_err(|e| MinerError::Prover {
                circuit,
                message: e.0,
            })
    }
}

fn to_field(leaves: &[U256]) -> Vec<Fr> {
    leaves.iter().map(|l| u256_to_fr(*l)).collect()
}

fn fr_dec(v: Fr) -> String {
    fr_to_u256(v).to_string()
}

fn path_dec(path: &MerklePath) -> Vec<String> {
    path.elements.iter().map(|e| fr_dec(*e)).collect()
}

fn address_dec(addr: Address) -> String {
    U256::from_be_slice(addr.as_slice()).to_string()
}

fn address_hex(addr: Address) -> String {
    to_fixed_hex(U256::from_be_slice(addr.as_slice()), 20)
}
