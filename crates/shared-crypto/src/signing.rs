//! # Node Signing Keys
//!
//! Node identities use either Ed25519 or secp256k1 ECDSA. Verification is
//! dispatched on the algorithm recorded alongside the public key, and public
//! key lengths are checked against it (32 bytes for Ed25519, 33-byte
//! compressed SEC1 for secp256k1).

use crate::CryptoError;
use ed25519_dalek::{Signer as _, Verifier as _};
use k256::ecdsa::signature::{Signer as _, Verifier as _};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Signature algorithm of a node key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SigningAlgorithm {
    /// Ed25519 (default).
    #[default]
    Ed25519,
    /// ECDSA over secp256k1.
    Secp256k1,
}

impl SigningAlgorithm {
    /// Expected public key length.
    pub fn public_key_len(self) -> usize {
        match self {
            SigningAlgorithm::Ed25519 => 32,
            SigningAlgorithm::Secp256k1 => 33,
        }
    }

    /// Expected signature length.
    pub fn signature_len(self) -> usize {
        64
    }
}

/// A node's signing key pair.
pub enum NodeKeyPair {
    /// Ed25519 key.
    Ed25519(ed25519_dalek::SigningKey),
    /// secp256k1 key.
    Secp256k1(k256::ecdsa::SigningKey),
}

impl NodeKeyPair {
    /// Generate a random key pair.
    pub fn generate(algorithm: SigningAlgorithm) -> Self {
        let mut rng = rand::thread_rng();
        match algorithm {
            SigningAlgorithm::Ed25519 => {
                NodeKeyPair::Ed25519(ed25519_dalek::SigningKey::generate(&mut rng))
            }
            SigningAlgorithm::Secp256k1 => {
                NodeKeyPair::Secp256k1(k256::ecdsa::SigningKey::random(&mut rng))
            }
        }
    }

    /// Restore from 32 secret bytes.
    pub fn from_secret_bytes(algorithm: SigningAlgorithm, bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidPrivateKey)?;
        match algorithm {
            SigningAlgorithm::Ed25519 => Ok(NodeKeyPair::Ed25519(
                ed25519_dalek::SigningKey::from_bytes(&arr),
            )),
            SigningAlgorithm::Secp256k1 => k256::ecdsa::SigningKey::from_bytes((&arr).into())
                .map(NodeKeyPair::Secp256k1)
                .map_err(|_| CryptoError::InvalidPrivateKey),
        }
    }

    /// Algorithm of this key.
    pub fn algorithm(&self) -> SigningAlgorithm {
        match self {
            NodeKeyPair::Ed25519(_) => SigningAlgorithm::Ed25519,
            NodeKeyPair::Secp256k1(_) => SigningAlgorithm::Secp256k1,
        }
    }

    /// Public key bytes (Ed25519: 32 bytes, secp256k1: compressed 33 bytes).
    pub fn public_key_bytes(&self) -> Vec<u8> {
        match self {
            NodeKeyPair::Ed25519(k) => k.verifying_key().to_bytes().to_vec(),
            NodeKeyPair::Secp256k1(k) => k.verifying_key().to_sec1_bytes().to_vec(),
        }
    }

    /// Secret scalar/seed, wiped when the returned buffer drops.
    pub fn secret_bytes(&self) -> Zeroizing<Vec<u8>> {
        match self {
            NodeKeyPair::Ed25519(k) => Zeroizing::new(k.to_bytes().to_vec()),
            NodeKeyPair::Secp256k1(k) => Zeroizing::new(k.to_bytes().to_vec()),
        }
    }

    /// Sign `message`. Both algorithms produce 64-byte signatures.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            NodeKeyPair::Ed25519(k) => k.sign(message).to_bytes().to_vec(),
            NodeKeyPair::Secp256k1(k) => {
                let sig: k256::ecdsa::Signature = k.sign(message);
                sig.to_bytes().to_vec()
            }
        }
    }
}

impl std::fmt::Debug for NodeKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeKeyPair")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

/// Verify `signature` over `message` with a raw public key.
pub fn verify_signature(
    algorithm: SigningAlgorithm,
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    if public_key.len() != algorithm.public_key_len() {
        return Err(CryptoError::InvalidPublicKey);
    }
    match algorithm {
        SigningAlgorithm::Ed25519 => {
            let pk: [u8; 32] = public_key.try_into().map_err(|_| CryptoError::InvalidPublicKey)?;
            let vk = ed25519_dalek::VerifyingKey::from_bytes(&pk)
                .map_err(|_| CryptoError::InvalidPublicKey)?;
            let sig = ed25519_dalek::Signature::from_slice(signature)
                .map_err(|_| CryptoError::InvalidSignatureFormat)?;
            vk.verify(message, &sig)
                .map_err(|_| CryptoError::SignatureVerificationFailed)
        }
        SigningAlgorithm::Secp256k1 => {
            let vk = k256::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
                .map_err(|_| CryptoError::InvalidPublicKey)?;
            let sig = k256::ecdsa::Signature::from_slice(signature)
                .map_err(|_| CryptoError::InvalidSignatureFormat)?;
            vk.verify(message, &sig)
                .map_err(|_| CryptoError::SignatureVerificationFailed)
        }
    }
}
