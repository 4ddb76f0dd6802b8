use alloy_primitives::Address;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::*;

use sacred_mining::crypto::fr_to_fixed_hex;
use sacred_mining::Note;

/// Create and inspect deposit notes.
#[derive(Args)]
pub struct NoteCommand {
    #[command(subcommand)]
    action: NoteAction,
}

#[derive(Subcommand)]
enum NoteAction {
    /// Generate a fresh note with random secrets
    New {
        /// Pool instance address
        #[arg(long)]
        instance: String,

        /// Currency label, e.g. "cfx"
        #[arg(long, default_value = "cfx")]
        currency: String,

        /// Denomination label, e.g. "1"
        #[arg(long, default_value = "1")]
        denomination: String,

        /// Network id baked into the note string
        #[arg(long, default_value_t = 1)]
        net_id: u64,
    },
    /// Parse a note string and print its derived commitments
    Parse {
        /// The full note string
        note: String,

        /// Pool instance address the note belongs to
        #[arg(long)]
        instance: String,

        /// Block height the deposit was recorded at, if known
        #[arg(long)]
        deposit_block: Option<u64>,

        /// Block height the withdrawal was recorded at, if known
        #[arg(long)]
        withdrawal_block: Option<u64>,
    },
}

impl NoteCommand {
    pub async fn execute(self) -> Result<()> {
        match self.action {
            NoteAction::New {
                instance,
                currency,
                denomination,
                net_id,
            } => {
                let instance = parse_address(&instance)?;
                let note = Note::generate(instance, &currency, &denomination, net_id);
                println!("{}", "Keep this note safe; it cannot be recovered.".yellow());
                println!("{}", note.to_string().bright_green().bold());
                print_derived(&note);
            }
            NoteAction::Parse {
                note,
                instance,
                deposit_block,
                withdrawal_block,
            } => {
                let instance = parse_address(&instance)?;
                let note = Note::parse(&note, instance, deposit_block, withdrawal_block)
                    .context("failed to parse note")?;
                println!(
                    "{} {}-{} on network {}",
                    "Valid note:".bright_green(),
                    note.currency,
                    note.denomination,
                    note.net_id
                );
                print_derived(&note);
                match note.deposit_leaf() {
                    Some((block, leaf)) => println!(
                        "  deposit leaf (block {}):  {}",
                        block,
                        fr_to_fixed_hex(leaf, 32)
                    ),
                    None => println!("  deposit:    {}", "not recorded".bright_black()),
                }
                match note.withdrawal_leaf() {
                    Some((block, leaf)) => println!(
                        "  withdrawal leaf (block {}): {}",
                        block,
                        fr_to_fixed_hex(leaf, 32)
                    ),
                    None => println!("  withdrawal: {}", "not recorded".bright_black()),
                }
            }
        }
        Ok(())
    }
}

fn print_derived(note: &Note) {
    println!("  commitment:       {}", fr_to_fixed_hex(note.commitment(), 32));
    println!(
        "  nullifier hash:   {}",
        fr_to_fixed_hex(note.nullifier_hash(), 32)
    );
    println!(
        "  reward nullifier: {}",
        fr_to_fixed_hex(note.reward_nullifier(), 32)
    );
}

pub(crate) fn parse_address(text: &str) -> Result<Address> {
    text.parse::<Address>()
        .with_context(|| format!("invalid address {text:?}"))
}
