//! End-to-end encrypted messaging
//!
//! X25519 ECDH between sender and recipient messaging keys, SHA-256 KDF,
//! XChaCha20-Poly1305 AEAD with a fresh 24-byte nonce. Ciphertext, nonce
//! and sender public key all travel on the wire; anyone holding the
//! recipient seed can decrypt.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{CryptoError, CryptoResult};
use crate::keys::{x25519_public_from_hex, MessagingKeys};

/// Nonce size for XChaCha20-Poly1305
pub const NONCE_SIZE: usize = 24;

const KDF_SUFFIX: &[u8] = b":lac:msg";
const CIPHER_NAME: &str = "x25519-xchacha20-poly1305";

/// An encrypted message envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedMessage {
    /// Cipher identifier
    pub cipher: String,
    /// Ciphertext, hex
    pub data: String,
    /// 24-byte nonce, hex
    pub nonce: String,
    /// Sender's messaging public key, hex
    pub sender_pubkey: String,
}

fn message_key(dh_bytes: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(dh_bytes);
    hasher.update(KDF_SUFFIX);
    hasher.finalize().into()
}

/// Encrypt a message for a recipient's messaging public key.
pub fn encrypt(
    sender_seed: &str,
    recipient_public_hex: &str,
    plaintext: &str,
) -> CryptoResult<EncryptedMessage> {
    let sender = MessagingKeys::from_seed(sender_seed);
    let recipient = x25519_public_from_hex(recipient_public_hex)?;
    let key = message_key(sender.secret.diffie_hellman(&recipient).as_bytes());

    let mut nonce = [0u8; NONCE_SIZE];
    getrandom::getrandom(&mut nonce).map_err(|e| CryptoError::Entropy(e.to_string()))?;

    let aead = XChaCha20Poly1305::new_from_slice(&key)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let ciphertext = aead
        .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedMessage {
        cipher: CIPHER_NAME.to_string(),
        data: hex::encode(ciphertext),
        nonce: hex::encode(nonce),
        sender_pubkey: sender.public_hex(),
    })
}

/// Decrypt a message addressed to the recipient seed.
pub fn decrypt(
    recipient_seed: &str,
    sender_public_hex: &str,
    data_hex: &str,
    nonce_hex: &str,
) -> CryptoResult<String> {
    let recipient = MessagingKeys::from_seed(recipient_seed);
    let sender = x25519_public_from_hex(sender_public_hex)?;
    let key = message_key(recipient.secret.diffie_hellman(&sender).as_bytes());

    let ciphertext = hex::decode(data_hex)?;
    let nonce = hex::decode(nonce_hex)?;
    if nonce.len() != NONCE_SIZE {
        return Err(CryptoError::Decryption(format!(
            "nonce must be {NONCE_SIZE} bytes, got {}",
            nonce.len()
        )));
    }

    let aead = XChaCha20Poly1305::new_from_slice(&key)
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;
    let plaintext = aead
        .decrypt(XNonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| CryptoError::Decryption("authentication failed".into()))?;

    String::from_utf8(plaintext).map_err(|e| CryptoError::Decryption(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "alice seed 1234567890123456789012";
    const BOB: &str = "bob seed 123456789012345678901234";

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let bob_keys = MessagingKeys::from_seed(BOB);
        let msg = encrypt(ALICE, &bob_keys.public_hex(), "secret message!").unwrap();

        assert_eq!(msg.cipher, CIPHER_NAME);
        assert_eq!(hex::decode(&msg.nonce).unwrap().len(), NONCE_SIZE);

        let plain = decrypt(BOB, &msg.sender_pubkey, &msg.data, &msg.nonce).unwrap();
        assert_eq!(plain, "secret message!");
    }

    #[test]
    fn test_wrong_recipient_cannot_decrypt() {
        let bob_keys = MessagingKeys::from_seed(BOB);
        let msg = encrypt(ALICE, &bob_keys.public_hex(), "for bob only").unwrap();

        let eve = decrypt("eve seed 9999999999999999999999", &msg.sender_pubkey, &msg.data, &msg.nonce);
        assert!(eve.is_err());
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let bob_keys = MessagingKeys::from_seed(BOB);
        let mut msg = encrypt(ALICE, &bob_keys.public_hex(), "payload").unwrap();
        let mut raw = hex::decode(&msg.data).unwrap();
        raw[0] ^= 0xff;
        msg.data = hex::encode(raw);

        assert!(decrypt(BOB, &msg.sender_pubkey, &msg.data, &msg.nonce).is_err());
    }

    #[test]
    fn test_fresh_nonce_per_message() {
        let bob_keys = MessagingKeys::from_seed(BOB);
        let a = encrypt(ALICE, &bob_keys.public_hex(), "same").unwrap();
        let b = encrypt(ALICE, &bob_keys.public_hex(), "same").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.data, b.data);
    }
}
