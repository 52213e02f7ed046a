//! # Key Derivation
//!
//! - PBKDF2-HMAC-SHA256 stretches a password into 256-bit key material.
//! - HKDF-SHA256 expands existing key material into purpose-scoped subkeys.

use crate::symmetric::{SecretKey, KEY_LEN};
use crate::CryptoError;
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

/// Lowest iteration count accepted by [`pbkdf2_derive`].
pub const MIN_PBKDF2_ITERATIONS: u32 = 1_000;

/// Derive a 256-bit key with PBKDF2-HMAC-SHA256.
///
/// CPU-bound: callers on an async runtime run this on a blocking thread.
pub fn pbkdf2_derive(password: &[u8], salt: &[u8], iterations: u32) -> Result<SecretKey, CryptoError> {
    if iterations < MIN_PBKDF2_ITERATIONS {
        return Err(CryptoError::KeyDerivationFailed(format!(
            "iteration count {iterations} below minimum {MIN_PBKDF2_ITERATIONS}"
        )));
    }
    if salt.is_empty() {
        return Err(CryptoError::KeyDerivationFailed("empty salt".into()));
    }
    let mut out = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    let key = SecretKey::from_bytes(out);
    out.zeroize();
    Ok(key)
}

/// Expand `ikm` into a 256-bit subkey bound to `info`.
pub fn hkdf_expand(ikm: &SecretKey, salt: Option<&[u8]>, info: &[u8]) -> Result<SecretKey, CryptoError> {
    let hk = Hkdf::<Sha256>::new(salt, ikm.as_bytes());
    let mut out = [0u8; KEY_LEN];
    hk.expand(info, &mut out)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
    let key = SecretKey::from_bytes(out);
    out.zeroize();
    Ok(key)
}
