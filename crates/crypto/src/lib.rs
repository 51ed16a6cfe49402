//! The crypto suite backing vaultd's wire protocol (spec.md §4.1, §4.2):
//! X25519 for key agreement, HMAC-SHA256 for challenge proofs and per-frame
//! authentication, and ChaCha20 as a bare stream cipher (not an AEAD — the
//! wire format carries the MAC as a separate field, see `vaultd-wire::frame`).
//!
//! Key material is wrapped in [`Sensitive`] so it is scrubbed from memory on
//! drop, the same property `did-simple` gets from `zeroize` on its signing
//! keys.

mod agreement;
mod cipher;
mod mac;
mod sensitive;
mod suite;

pub use agreement::{EphemeralKeypair, PublicKey, StaticPrivateKey};
pub use cipher::apply_keystream;
pub use mac::{hmac_sha256, verify_hmac_sha256, HmacTag};
pub use sensitive::Sensitive;
pub use suite::{check_suite_version, derive_session_keys, SessionKeys, SuiteError};
