//! CLI command implementations. Everything here is purely local: note and
//! account material never leaves the process, and no command talks to a
//! chain. Proof generation is driven programmatically through the
//! controller, not from this binary.

mod account;
mod note;

pub use account::AccountCommand;
pub use note::NoteCommand;
