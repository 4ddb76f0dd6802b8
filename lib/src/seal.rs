//! Public-key sealing of serialized account state.
//!
//! The encoded account is what gets published on-chain as "encrypted account
//! state", so only the recipient may open it. Scheme: ephemeral x25519
//! Diffie-Hellman, SHA-256 key derivation over the shared secret and the
//! ephemeral public key, ChaCha20-Poly1305 AEAD.
//!
//! Payload layout: `ephemeral_pubkey(32) ‖ nonce(12) ‖ ciphertext`.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

const EPK_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum SealError {
    #[error("sealing failed")]
    SealFailed,
    #[error("opening failed: wrong key or corrupted payload")]
    OpenFailed,
    #[error("sealed payload too short: {len} bytes")]
    TruncatedPayload { len: usize },
}

/// Seal `plaintext` to the holder of `recipient`'s secret key.
pub fn seal(recipient: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret);

    let recipient_pk = PublicKey::from(*recipient);
    let shared = ephemeral_secret.diffie_hellman(&recipient_pk);
    let key = derive_key(shared.as_bytes(), ephemeral_public.as_bytes());

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let cipher = ChaCha20Poly1305::new_from_slice(&key).map_err(|_| SealError::SealFailed)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| SealError::SealFailed)?;

    let mut payload = Vec::with_capacity(EPK_LEN + NONCE_LEN + ciphertext.len());
    payload.extend_from_slice(ephemeral_public.as_bytes());
    payload.extend_from_slice(&nonce);
    payload.extend_from_slice(&ciphertext);
    Ok(payload)
}

/// Open a sealed payload with the recipient's secret key.
pub fn open(secret: &[u8; 32], payload: &[u8]) -> Result<Vec<u8>, SealError> {
    if payload.len() < EPK_LEN + NONCE_LEN + TAG_LEN {
        return Err(SealError::TruncatedPayload { len: payload.len() });
    }

    let mut epk = [0u8; EPK_LEN];
    epk.copy_from_slice(&payload[..EPK_LEN]);
    let nonce = &payload[EPK_LEN..EPK_LEN + NONCE_LEN];
    let ciphertext = &payload[EPK_LEN + NONCE_LEN..];

    let secret = StaticSecret::from(*secret);
    let shared = secret.diffie_hellman(&PublicKey::from(epk));
    let key = derive_key(shared.as_bytes(), &epk);

    let cipher = ChaCha20Poly1305::new_from_slice(&key).map_err(|_| SealError::OpenFailed)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| SealError::OpenFailed)
}

/// Generate a recipient keypair. Returns `(secret, public)`.
pub fn keypair() -> ([u8; 32], [u8; 32]) {
    let secret = StaticSecret::random_from_rng(OsRng);
    let public = PublicKey::from(&secret);
    (secret.to_bytes(), public.to_bytes())
}

fn derive_key(shared: &[u8; 32], epk: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(shared);
    hasher.update(epk);
    hasher.finalize().into()
}
