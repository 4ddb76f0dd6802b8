use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::*;

use sacred_mining::crypto::fr_to_fixed_hex;
use sacred_mining::seal::keypair;
use sacred_mining::Account;

/// Create and inspect shielded accounts.
#[derive(Args)]
pub struct AccountCommand {
    #[command(subcommand)]
    action: AccountAction,
}

#[derive(Subcommand)]
enum AccountAction {
    /// Generate a fresh empty account and a sealing keypair
    New,
    /// Decode a base64 account and print its balance and commitment
    Decode {
        /// Base64 account encoding
        account: String,
    },
    /// Open a sealed account ciphertext with the sealing secret key
    Unseal {
        /// Sealing secret key, hex
        #[arg(long)]
        key: String,

        /// Sealed account payload, hex
        payload: String,
    },
}

impl AccountCommand {
    pub async fn execute(self) -> Result<()> {
        match self.action {
            AccountAction::New => {
                let account = Account::new();
                let (sk, pk) = keypair();
                println!(
                    "{}",
                    "Keep the account and sealing key safe; they cannot be recovered.".yellow()
                );
                println!("account:     {}", account.encode_base64().bright_green().bold());
                println!("commitment:  {}", fr_to_fixed_hex(account.commitment(), 32));
                println!("sealing key: 0x{}", hex::encode(sk));
                println!("public key:  0x{}", hex::encode(pk));
            }
            AccountAction::Decode { account } => {
                let account =
                    Account::decode_base64(&account).context("failed to decode account")?;
                print_account(&account);
            }
            AccountAction::Unseal { key, payload } => {
                let key = parse_key(&key)?;
                let payload = hex::decode(payload.trim_start_matches("0x"))
                    .context("payload is not valid hex")?;
                let account =
                    Account::open_from(&key, &payload).context("failed to open sealed account")?;
                print_account(&account);
                println!("account:    {}", account.encode_base64().bright_green());
            }
        }
        Ok(())
    }
}

fn print_account(account: &Account) {
    println!("{} {}", "balance:".bright_cyan(), account.amount);
    println!("commitment: {}", fr_to_fixed_hex(account.commitment(), 32));
    println!(
        "nullifier hash: {}",
        fr_to_fixed_hex(account.nullifier_hash(), 32)
    );
}

fn parse_key(text: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(text.trim_start_matches("0x")).context("key is not valid hex")?;
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("key must be exactly 32 bytes"))
}
