//! # Key Management
//!
//! Ed25519 key material in the encodings the wallet's clients speak:
//! public and secret keys travel as base58, signatures as base64.
//!
//! The directory and the DID resolver both hand out base58 EdDSA public
//! keys, and the signing procedure prints its signature as base64, so those
//! two encodings are the only ones parsed or emitted here.
//!
//! ## Security considerations
//!
//! - Secret keys are zeroized on drop (ed25519-dalek does this for us).
//! - Key generation uses `OsRng`.
//! - Secret key bytes are never logged, and `Debug` only prints the
//!   public half.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH,
    SECRET_KEY_LENGTH, SIGNATURE_LENGTH,
};
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

/// Errors that can occur while decoding key material. Messages never echo
/// the input back.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key: expected 32 base58-encoded bytes")]
    InvalidSecretKey,

    #[error("invalid public key: expected a base58-encoded Ed25519 point")]
    InvalidPublicKey,

    #[error("invalid signature: expected 64 base64-encoded bytes")]
    InvalidSignature,
}

/// An Ed25519 signing keypair. Not `Serialize`; export the secret with
/// [`WalletKeypair::secret_key_base58`].
pub struct WalletKeypair {
    signing_key: SigningKey,
}

/// The public half of a signer identity. Displayed as base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WalletPublicKey {
    bytes: [u8; PUBLIC_KEY_LENGTH],
}

/// A detached Ed25519 signature. Displayed as base64.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WalletSignature {
    bytes: [u8; SIGNATURE_LENGTH],
}

// ---------------------------------------------------------------------------
// WalletKeypair
// ---------------------------------------------------------------------------

impl WalletKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Build a keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parse a base58-encoded 32-byte secret key, the format the `keygen`
    /// command prints and client keyrings store.
    pub fn from_base58(encoded: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    pub fn public_key(&self) -> WalletPublicKey {
        WalletPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign raw message bytes.
    pub fn sign(&self, message: &[u8]) -> WalletSignature {
        WalletSignature {
            bytes: self.signing_key.sign(message).to_bytes(),
        }
    }

    /// Export the secret key as base58. Handle with care.
    pub fn secret_key_base58(&self) -> String {
        bs58::encode(self.signing_key.to_bytes()).into_string()
    }
}

impl Clone for WalletKeypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for WalletKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletKeypair(pub={})", self.public_key())
    }
}

// ---------------------------------------------------------------------------
// WalletPublicKey
// ---------------------------------------------------------------------------

impl WalletPublicKey {
    /// Parse a base58 public key and check that it decodes to a valid
    /// curve point.
    pub fn from_base58(encoded: &str) -> Result<Self, KeyError> {
        let raw = bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|_| KeyError::InvalidPublicKey)?;
        let bytes: [u8; PUBLIC_KEY_LENGTH] = raw
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.bytes).into_string()
    }

    /// Strict Ed25519 verification. Returns `false` for any failure,
    /// including a key that stopped being a valid point.
    pub fn verify(&self, message: &[u8], signature: &WalletSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let sig = DalekSignature::from_bytes(&signature.bytes);
        verifying_key.verify_strict(message, &sig).is_ok()
    }
}

impl fmt::Display for WalletPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for WalletPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletPublicKey({})", self.to_base58())
    }
}

// ---------------------------------------------------------------------------
// WalletSignature
// ---------------------------------------------------------------------------

impl WalletSignature {
    /// Parse a base64 signature as sent in the `zenflows-sign` header.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|_| KeyError::InvalidSignature)?;
        let bytes: [u8; SIGNATURE_LENGTH] = raw
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSignature)?;
        Ok(Self { bytes })
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.bytes)
    }
}

impl fmt::Display for WalletSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for WalletSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletSignature({})", self.to_base64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let kp = WalletKeypair::generate();
        let sig = kp.sign(b"credit 100 idea");
        assert!(kp.public_key().verify(b"credit 100 idea", &sig));
        assert!(!kp.public_key().verify(b"credit 900 idea", &sig));
    }

    #[test]
    fn secret_key_base58_roundtrip_preserves_identity() {
        let kp = WalletKeypair::generate();
        let restored = WalletKeypair::from_base58(&kp.secret_key_base58()).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());
    }

    #[test]
    fn public_key_parses_from_its_display_form() {
        let pk = WalletKeypair::generate().public_key();
        assert_eq!(WalletPublicKey::from_base58(&pk.to_string()).unwrap(), pk);
    }

    #[test]
    fn public_key_rejects_wrong_length() {
        let short = bs58::encode([7u8; 16]).into_string();
        assert_eq!(
            WalletPublicKey::from_base58(&short),
            Err(KeyError::InvalidPublicKey)
        );
        assert_eq!(
            WalletPublicKey::from_base58("not-base58-0OIl"),
            Err(KeyError::InvalidPublicKey)
        );
    }

    #[test]
    fn signature_rejects_garbage() {
        assert_eq!(
            WalletSignature::from_base64("!!!"),
            Err(KeyError::InvalidSignature)
        );
        let short = BASE64.encode([1u8; 10]);
        assert_eq!(
            WalletSignature::from_base64(&short),
            Err(KeyError::InvalidSignature)
        );
    }

    #[test]
    fn debug_never_prints_secret() {
        let kp = WalletKeypair::generate();
        let dbg = format!("{:?}", kp);
        assert!(!dbg.contains(&kp.secret_key_base58()));
        assert!(dbg.contains(&kp.public_key().to_base58()));
    }
}
