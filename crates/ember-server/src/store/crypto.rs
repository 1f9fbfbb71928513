use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{
    aead::{Aead, KeyInit, OsRng, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use constant_time_eq::constant_time_eq;
use rand::RngCore;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::{Result, VaultError};

/// 32-byte server-side encryption key, stored in `<data_dir>/ember.key`.
#[derive(ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Generate a fresh random encryption key.
pub fn generate_key() -> EncryptionKey {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    EncryptionKey(key)
}

/// Load a key from raw bytes. Returns `None` unless exactly 32 bytes are given.
pub fn load_key(bytes: &[u8]) -> Option<EncryptionKey> {
    let key: [u8; 32] = bytes.try_into().ok()?;
    Some(EncryptionKey(key))
}

/// Generate a secret identifier: 128 random bits, hex-encoded.
pub fn generate_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Encrypt `plaintext` under `key`, binding `aad` (the record id). Returns `(ciphertext, nonce)`.
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8], aad: &[u8]) -> Result<(Vec<u8>, [u8; 12])> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from(nonce_bytes);

    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|e| VaultError::Storage(format!("encrypt: {e}")))?;

    Ok((ciphertext, nonce_bytes))
}

/// Decrypt and authenticate. Any failure means the stored record was altered.
pub fn decrypt(
    key: &EncryptionKey,
    ciphertext: &[u8],
    nonce_bytes: &[u8; 12],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce = Nonce::from(*nonce_bytes);

    cipher
        .decrypt(&nonce, Payload { msg: ciphertext, aad })
        .map(Zeroizing::new)
        .map_err(|_| VaultError::CorruptRecord)
}

/// Argon2id cost parameters for passphrase hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: 19_456, // 19 MiB
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl HashParams {
    /// Cheapest parameters argon2 accepts. Only for tests.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    /// Check the costs are accepted by argon2.
    pub fn validate(&self) -> Result<()> {
        self.argon2().map(|_| ())
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, Some(32))
            .map_err(|e| VaultError::InvalidInput(format!("argon2 params: {e}")))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Fresh 16-byte salt for a passphrase hash.
pub fn generate_salt() -> [u8; 16] {
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Hash `passphrase` with Argon2id under `salt`.
pub fn hash_passphrase(passphrase: &[u8], salt: &[u8; 16], params: &HashParams) -> Result<[u8; 32]> {
    let mut out = [0u8; 32];
    params
        .argon2()?
        .hash_password_into(passphrase, salt, &mut out)
        .map_err(|e| VaultError::Storage(format!("argon2 hash: {e}")))?;
    Ok(out)
}

/// Recompute the hash and compare in constant time.
pub fn verify_passphrase(
    passphrase: &[u8],
    salt: &[u8; 16],
    expected: &[u8; 32],
    params: &HashParams,
) -> Result<bool> {
    let candidate = Zeroizing::new(hash_passphrase(passphrase, salt, params)?);
    Ok(constant_time_eq(candidate.as_slice(), expected))
}
