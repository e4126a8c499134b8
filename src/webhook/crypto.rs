//! Webhook envelope crypto.
//!
//! The upstream notifier optionally encrypts event bodies with
//! AES-256-CBC: the key is the SHA-256 digest of the configured secret,
//! the payload is a 16-byte IV followed by PKCS7-padded ciphertext, all
//! base64-encoded. Request signatures are a plain SHA-256 over
//! `timestamp + nonce + key + raw_body`, hex-encoded.

use crate::{Error, Result};
use aes::Aes256;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};

type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Length of the IV prefix on encrypted envelopes.
const IV_LEN: usize = 16;

/// Decrypts an encrypted event envelope, returning the plaintext JSON.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the envelope is not valid base64,
/// too short to carry an IV, fails to decrypt, or is not UTF-8.
pub fn decrypt_event(encrypted: &str, encrypt_key: &str) -> Result<String> {
    let key = Sha256::digest(encrypt_key.as_bytes());
    let raw = BASE64
        .decode(encrypted)
        .map_err(|e| Error::Validation(format!("envelope is not valid base64: {e}")))?;
    if raw.len() < IV_LEN {
        return Err(Error::Validation(
            "envelope shorter than the IV prefix".to_string(),
        ));
    }
    let (iv, ciphertext) = raw.split_at(IV_LEN);

    let plaintext = Aes256CbcDec::new_from_slices(&key, iv)
        .map_err(|e| Error::Validation(format!("envelope cipher setup failed: {e}")))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Validation("envelope decryption failed".to_string()))?;

    String::from_utf8(plaintext)
        .map_err(|_| Error::Validation("decrypted envelope is not UTF-8".to_string()))
}

/// Verifies a webhook request signature.
///
/// The signature is `hex(SHA256(timestamp + nonce + encrypt_key + body))`.
#[must_use]
pub fn verify_signature(
    timestamp: &str,
    nonce: &str,
    body: &str,
    signature: &str,
    encrypt_key: &str,
) -> bool {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(nonce.as_bytes());
    hasher.update(encrypt_key.as_bytes());
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize()) == signature
}
