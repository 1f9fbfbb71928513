use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

/// How a record expires. The two policies are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpirationPolicy {
    /// Destroyed by the first successful unlock.
    OneTimeView,
    /// Readable any number of times while `now < deadline` (unix seconds).
    TimeToLive { deadline: i64 },
}

impl ExpirationPolicy {
    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::OneTimeView => PolicyKind::OneTime,
            Self::TimeToLive { .. } => PolicyKind::Time,
        }
    }
}

/// Policy requested at creation time, before a deadline is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewPolicy {
    OneTimeView,
    TimeToLive { ttl_seconds: u64 },
}

/// Wire name of a policy, matching the `expiration_method` field of the HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyKind {
    #[serde(rename = "one_time")]
    OneTime,
    #[serde(rename = "time")]
    Time,
}

/// Stored in redb as bincode-encoded bytes under the secret id.
/// `ciphertext` is ChaCha20Poly1305 output (payload + tag) with the id as AAD.
/// Policy metadata stays plaintext so the sweep can evict without decrypting.
#[derive(Debug, Clone, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct SecretRecord {
    pub ciphertext: Vec<u8>,
    /// Per-record random 12-byte nonce.
    pub nonce: [u8; 12],
    pub passphrase_salt: [u8; 16],
    /// Argon2id output for the access passphrase.
    pub passphrase_hash: [u8; 32],
    #[zeroize(skip)]
    pub policy: ExpirationPolicy,
    pub created_at: i64,
    /// Backstop for one-time records nobody ever opens.
    pub unclaimed_until: Option<i64>,
}

impl SecretRecord {
    /// Returns true once the record can no longer be unlocked at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        match self.policy {
            ExpirationPolicy::TimeToLive { deadline } => now >= deadline,
            ExpirationPolicy::OneTimeView => self.unclaimed_until.is_some_and(|t| now >= t),
        }
    }

    /// The instant after which the record is gone, if any.
    pub fn expires_at(&self) -> Option<i64> {
        match self.policy {
            ExpirationPolicy::TimeToLive { deadline } => Some(deadline),
            ExpirationPolicy::OneTimeView => self.unclaimed_until,
        }
    }
}

/// Result of an existence probe. Never carries secret material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretStatus {
    Active { policy: PolicyKind },
    NotFound,
}

/// Returned by `Store::create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub id: String,
    /// Seconds until the record expires on its own, if it ever does.
    pub expires_in: Option<u64>,
}

/// Returned by a successful `Store::unlock`.
pub struct Unlocked {
    pub plaintext: zeroize::Zeroizing<Vec<u8>>,
    /// True when this unlock burned a one-time record.
    pub consumed: bool,
}

impl std::fmt::Debug for Unlocked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unlocked")
            .field("plaintext", &"<redacted>")
            .field("consumed", &self.consumed)
            .finish()
    }
}
