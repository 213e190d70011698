//! LAC Cryptographic Primitives
//!
//! Everything the ledger signs, hides, or links flows through this crate:
//!
//! - Deterministic key derivation from a seed string with per-purpose labels
//! - Ed25519 transaction signing over a canonical JSON encoding
//! - X25519 + XChaCha20-Poly1305 encrypted messaging
//! - Linkable ring signatures (bLSAG over edwards25519) with per-output
//!   key images for double-spend detection
//! - Dual-key stealth addresses producing unlinkable one-time addresses
//!
//! All functions here are pure with respect to ledger state: they take
//! seeds, keys and byte slices, and return values. Nothing in this crate
//! touches disk or a lock.

pub mod canonical;
mod errors;
pub mod keys;
pub mod messaging;
pub mod ring;
pub mod stealth;

pub use errors::{CryptoError, CryptoResult};
pub use keys::{derive_material, MessagingKeys, SigningKeys};
pub use messaging::EncryptedMessage;
pub use ring::{RingKeypair, RingSignature};
pub use stealth::{OneTimeAddress, StealthKeys, StealthPublic};
