//! Hardware-bound derivation inputs.
//!
//! ```text
//! salt     = SHA-256(fingerprint ‖ "model-key-salt")[..16]
//! password = license_key ‖ model_id ‖ key_id
//! key      = PBKDF2-HMAC-SHA256(password, salt, iterations)
//! transfer = HKDF-SHA256(key, salt = session_id, info = "mm-transfer-key")
//! ```
//!
//! The same license on another machine yields a different salt and hence a
//! key that cannot decrypt blocks sealed here.

use shared_crypto::{hkdf_expand, pbkdf2_derive, sha256, CryptoError, SecretKey};

const SALT_DOMAIN: &[u8] = b"model-key-salt";
const TRANSFER_INFO: &[u8] = b"mm-transfer-key";
const SALT_LEN: usize = 16;

/// Salt bound to a hardware fingerprint.
pub fn hardware_salt(fingerprint: &str) -> [u8; SALT_LEN] {
    let mut input = Vec::with_capacity(fingerprint.len() + SALT_DOMAIN.len());
    input.extend_from_slice(fingerprint.as_bytes());
    input.extend_from_slice(SALT_DOMAIN);
    let digest = sha256(&input);

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&digest[..SALT_LEN]);
    salt
}

/// Derive storage key material. CPU-bound; run off the async executor.
pub fn derive_storage_material(
    license_key: &str,
    model_id: &str,
    key_id: &str,
    fingerprint: &str,
    iterations: u32,
) -> Result<SecretKey, CryptoError> {
    let password = format!("{license_key}{model_id}{key_id}");
    pbkdf2_derive(password.as_bytes(), &hardware_salt(fingerprint), iterations)
}

/// Expand storage-style material into a session transfer key.
pub fn expand_transfer_material(base: &SecretKey, session_id: &str) -> Result<SecretKey, CryptoError> {
    hkdf_expand(base, Some(session_id.as_bytes()), TRANSFER_INFO)
}
