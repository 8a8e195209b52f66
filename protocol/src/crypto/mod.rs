//! # Cryptographic Primitives
//!
//! Ed25519 key material and the detached-signature protocol that gates
//! every ledger mutation.
//!
//! - **keys** — keypairs, base58 public keys, base64 signatures.
//! - **signatures** — payload canonicalization, client-side signing, and
//!   the [`VerificationEngine`] capability the authenticator consults.
//!
//! Everything here is a thin, typed wrapper around `ed25519-dalek`.

pub mod keys;
pub mod signatures;

pub use keys::{KeyError, WalletKeypair, WalletPublicKey, WalletSignature};
pub use signatures::{
    canonicalize, sign_payload, verify_payload, Ed25519Engine, EngineError, EngineOutput,
    EngineRun, VerificationEngine, VerificationInput, VERIFY_PROCEDURE,
};
