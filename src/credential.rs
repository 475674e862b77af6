//! One-way password storage.
//!
//! A stored credential is `salt || key`: a fresh 32-byte salt from the OS
//! random source followed by PBKDF2-HMAC-SHA256 of the password under that
//! salt. The salt width is fixed, so a stored blob splits unambiguously.

use std::fmt;

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{DalError, Result};
use crate::types::FieldType;

pub const SALT_LEN: usize = 32;
/// SHA-256 output size.
pub const KEY_LEN: usize = 32;
pub const ITERATIONS: u32 = 100_000;

/// Salt and derived key as read back from storage. The password itself is
/// not recoverable.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    salt: [u8; SALT_LEN],
    key: [u8; KEY_LEN],
}

impl Credential {
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn verify(&self, password: &str) -> bool {
        verify(password, self)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SALT_LEN + KEY_LEN);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.key);
        out
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential").finish_non_exhaustive()
    }
}

fn derive_key(password: &[u8], salt: &[u8; SALT_LEN]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, ITERATIONS, &mut key);
    key
}

/// Hash `password` under a new random salt and return `salt || key`.
pub fn encode(password: &str) -> Vec<u8> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let key = derive_key(password.as_bytes(), &salt);
    Credential { salt, key }.to_bytes()
}

/// Like [`encode`], for a password that arrived as raw bytes.
pub fn encode_bytes(password: &[u8]) -> Result<Vec<u8>> {
    let password = std::str::from_utf8(password)?;
    Ok(encode(password))
}

/// Split a stored blob into salt and key.
pub fn decode(blob: &[u8]) -> Result<Credential> {
    if blob.len() != SALT_LEN + KEY_LEN {
        return Err(DalError::conversion(
            FieldType::Pwd,
            format!(
                "blob of {} bytes, expected {}",
                blob.len(),
                SALT_LEN + KEY_LEN
            ),
        ));
    }
    let (salt_part, key_part) = blob.split_at(SALT_LEN);
    let mut salt = [0u8; SALT_LEN];
    let mut key = [0u8; KEY_LEN];
    salt.copy_from_slice(salt_part);
    key.copy_from_slice(key_part);
    Ok(Credential { salt, key })
}

/// Re-derive the key for `password` and compare it in constant time.
pub fn verify(password: &str, credential: &Credential) -> bool {
    let candidate = derive_key(password.as_bytes(), &credential.salt);
    candidate.ct_eq(&credential.key).into()
}
