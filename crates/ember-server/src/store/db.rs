use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use tokio::time;
use tracing::{debug, error, info, warn};

use super::clock::{Clock, SystemClock};
use super::crypto::{self, EncryptionKey, HashParams};
use super::model::{
    Created, ExpirationPolicy, NewPolicy, SecretRecord, SecretStatus, Unlocked,
};
use crate::error::{Result, VaultError};

const SECRETS: TableDefinition<&str, &[u8]> = TableDefinition::new("secrets");

/// Leading byte of every encoded record, bumped on incompatible layout changes.
const RECORD_V1_MARKER: u8 = 0x01;

/// Fresh identifiers to try before giving up on a vacant slot.
const ID_ATTEMPTS: usize = 4;

/// Passphrase substituted when the caller supplies none.
pub const DEFAULT_PASSPHRASE: &str = "uvu";

/// Bounded exponential backoff for transient backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(20),
        }
    }
}

/// Validation limits and security knobs for the store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub default_passphrase: String,
    /// Reject creation without an explicit passphrase.
    pub require_passphrase: bool,
    pub min_ttl_seconds: u64,
    pub max_ttl_seconds: u64,
    pub max_secret_bytes: usize,
    pub max_passphrase_bytes: usize,
    /// Unopened one-time secrets are dropped after this many seconds.
    pub one_time_max_age: Option<u64>,
    pub hash: HashParams,
    pub retry: RetryPolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            default_passphrase: DEFAULT_PASSPHRASE.to_owned(),
            require_passphrase: false,
            min_ttl_seconds: 60,
            max_ttl_seconds: 30 * 86_400,
            max_secret_bytes: 4096,
            max_passphrase_bytes: 256,
            one_time_max_age: Some(7 * 86_400),
            hash: HashParams::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl StoreOptions {
    /// Reject limits that would make every request fail or overflow a deadline.
    pub fn validate(&self, now: i64) -> Result<()> {
        let invalid = |msg: String| Err(VaultError::InvalidInput(msg));

        if self.min_ttl_seconds == 0 {
            return invalid("min_ttl_seconds must be at least 1".into());
        }
        if self.min_ttl_seconds > self.max_ttl_seconds {
            return invalid(format!(
                "min_ttl_seconds ({}) exceeds max_ttl_seconds ({})",
                self.min_ttl_seconds, self.max_ttl_seconds
            ));
        }
        if deadline_after(now, self.max_ttl_seconds).is_none() {
            return invalid(format!("max_ttl_seconds ({}) is out of range", self.max_ttl_seconds));
        }
        if let Some(age) = self.one_time_max_age {
            if age == 0 || deadline_after(now, age).is_none() {
                return invalid(format!("one_time_max_age ({age}) is out of range"));
            }
        }
        if self.max_secret_bytes == 0 || self.max_passphrase_bytes == 0 {
            return invalid("size limits must be positive".into());
        }
        if self.default_passphrase.is_empty()
            || self.default_passphrase.len() > self.max_passphrase_bytes
        {
            return invalid("default passphrase must be 1..=max_passphrase_bytes long".into());
        }
        if self.retry.attempts == 0 {
            return invalid("retry attempts must be at least 1".into());
        }
        self.hash.validate()
    }
}

/// `now + secs`, or `None` if it does not fit a unix timestamp.
fn deadline_after(now: i64, secs: u64) -> Option<i64> {
    i64::try_from(secs).ok().and_then(|secs| now.checked_add(secs))
}

/// Thread-safe handle to the vault.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
    key: Arc<EncryptionKey>,
    options: Arc<StoreOptions>,
    clock: Arc<dyn Clock>,
}

impl Store {
    /// Open (or create) the database at `path`, using `key` for encryption.
    pub fn open(path: &Path, key: EncryptionKey, options: StoreOptions) -> Result<Self> {
        Self::open_with_clock(path, key, options, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        path: &Path,
        key: EncryptionKey,
        options: StoreOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        options.validate(clock.now())?;
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        write_txn.open_table(SECRETS)?;
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            key: Arc::new(key),
            options: Arc::new(options),
            clock,
        })
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Encrypt and persist a new secret. Returns its freshly generated id.
    pub fn create(
        &self,
        plaintext: &[u8],
        passphrase: Option<&str>,
        policy: NewPolicy,
    ) -> Result<Created> {
        if plaintext.is_empty() {
            return Err(VaultError::InvalidInput("secret must not be empty".into()));
        }
        if plaintext.len() > self.options.max_secret_bytes {
            return Err(VaultError::InvalidInput(format!(
                "secret exceeds {} bytes",
                self.options.max_secret_bytes
            )));
        }
        let passphrase = self.passphrase_for_create(passphrase)?;

        let now = self.clock.now();
        let (policy, unclaimed_until, expires_in) = match policy {
            NewPolicy::OneTimeView => (
                ExpirationPolicy::OneTimeView,
                self.options
                    .one_time_max_age
                    .map(|age| deadline_after(now, age).unwrap_or(i64::MAX)),
                self.options.one_time_max_age,
            ),
            NewPolicy::TimeToLive { ttl_seconds } => {
                let (min, max) = (self.options.min_ttl_seconds, self.options.max_ttl_seconds);
                if !(min..=max).contains(&ttl_seconds) {
                    return Err(VaultError::InvalidInput(format!(
                        "ttl_seconds must be between {min} and {max}"
                    )));
                }
                (
                    ExpirationPolicy::TimeToLive {
                        deadline: deadline_after(now, ttl_seconds).unwrap_or(i64::MAX),
                    },
                    None,
                    Some(ttl_seconds),
                )
            }
        };

        let passphrase_salt = crypto::generate_salt();
        let passphrase_hash =
            crypto::hash_passphrase(passphrase.as_bytes(), &passphrase_salt, &self.options.hash)?;

        for _ in 0..ID_ATTEMPTS {
            let id = crypto::generate_id();
            let (ciphertext, nonce) = crypto::encrypt(&self.key, plaintext, id.as_bytes())?;
            let record = SecretRecord {
                ciphertext,
                nonce,
                passphrase_salt,
                passphrase_hash,
                policy,
                created_at: now,
                unclaimed_until,
            };
            let bytes = encode(&record)?;

            if self.with_retry("create", || self.insert_vacant(&id, &bytes))? {
                debug!(id = %short_id(&id), policy = ?policy.kind(), "stored secret");
                return Ok(Created { id, expires_in });
            }
            warn!("identifier collision, regenerating");
        }

        Err(VaultError::Storage("could not allocate a unique identifier".into()))
    }

    /// Report whether `id` is currently unlockable. Never mutates the record.
    pub fn exists(&self, id: &str) -> Result<SecretStatus> {
        if !is_well_formed_id(id) {
            return Ok(SecretStatus::NotFound);
        }
        let now = self.clock.now();
        let status = match self.with_retry("exists", || self.load(id))? {
            Some(record) if !record.is_expired(now) => SecretStatus::Active {
                policy: record.policy.kind(),
            },
            _ => SecretStatus::NotFound,
        };
        Ok(status)
    }

    /// Authenticate, decrypt and apply the record's expiration policy.
    ///
    /// One-time records are removed by a compare-and-delete in a single write
    /// transaction that commits before the plaintext is handed back; of any
    /// number of concurrent callers exactly one wins, the rest see `NotFound`.
    /// A wrong passphrase leaves the record untouched.
    pub fn unlock(&self, id: &str, passphrase: Option<&str>) -> Result<Unlocked> {
        if !is_well_formed_id(id) {
            return Err(VaultError::NotFound);
        }

        let record = match self.with_retry("unlock", || self.load(id))? {
            Some(record) if !record.is_expired(self.clock.now()) => record,
            Some(_) => {
                debug!(id = %short_id(id), "unlock of expired secret");
                return Err(VaultError::NotFound);
            }
            None => return Err(VaultError::NotFound),
        };

        let passphrase = self.passphrase_for_unlock(passphrase);
        let matches = crypto::verify_passphrase(
            passphrase.as_bytes(),
            &record.passphrase_salt,
            &record.passphrase_hash,
            &self.options.hash,
        )?;
        if !matches {
            info!(id = %short_id(id), "unlock rejected: passphrase mismatch");
            return Err(VaultError::Unauthorized);
        }

        let plaintext = crypto::decrypt(&self.key, &record.ciphertext, &record.nonce, id.as_bytes())
            .inspect_err(|_| error!(id = %short_id(id), "stored secret failed authentication"))?;

        // Hashing is slow; the deadline or backstop may have passed meanwhile.
        if record.is_expired(self.clock.now()) {
            debug!(id = %short_id(id), "secret expired during unlock");
            return Err(VaultError::NotFound);
        }

        let consumed = match record.policy {
            ExpirationPolicy::OneTimeView => {
                if !self.with_retry("consume", || self.consume(id, &record.nonce))? {
                    debug!(id = %short_id(id), "lost race to consume one-time secret");
                    return Err(VaultError::NotFound);
                }
                info!(id = %short_id(id), "one-time secret burned");
                true
            }
            ExpirationPolicy::TimeToLive { .. } => false,
        };

        Ok(Unlocked {
            plaintext,
            consumed,
        })
    }

    /// Remove every record past its deadline. Returns how many were removed.
    pub fn sweep_expired(&self) -> Result<usize> {
        let now = self.clock.now();

        let candidates: Vec<String> = self.with_retry("sweep.scan", || {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(SECRETS)?;
            let mut keys = Vec::new();
            for item in table.iter()? {
                let (k, v) = item?;
                match decode(v.value()) {
                    Ok(record) if record.is_expired(now) => keys.push(k.value().to_owned()),
                    Ok(_) => {}
                    Err(_) => warn!(id = %short_id(k.value()), "skipping undecodable record"),
                }
            }
            Ok(keys)
        })?;

        if candidates.is_empty() {
            return Ok(0);
        }

        let removed = self.with_retry("sweep.delete", || {
            let write_txn = self.db.begin_write()?;
            let mut removed = 0usize;
            {
                let mut table = write_txn.open_table(SECRETS)?;
                for key in &candidates {
                    // Re-check inside the write transaction: an unlock may have
                    // consumed the record since the scan.
                    let still_expired = table
                        .get(key.as_str())?
                        .is_some_and(|g| decode(g.value()).is_ok_and(|r| r.is_expired(now)));
                    if still_expired {
                        table.remove(key.as_str())?;
                        removed += 1;
                    }
                }
            }
            write_txn.commit()?;
            Ok(removed)
        })?;

        if removed > 0 {
            info!(removed, "swept expired secrets");
        }
        Ok(removed)
    }

    /// Number of stored records, expired-but-unswept ones included.
    pub fn count(&self) -> Result<u64> {
        self.with_retry("count", || {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(SECRETS)?;
            Ok(table.len()?)
        })
    }

    /// Spawn a background Tokio task that calls `sweep_expired()` every `interval`.
    pub fn spawn_sweep(self, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.tick().await; // skip first immediate tick
            loop {
                ticker.tick().await;
                let store = self.clone();
                match tokio::task::spawn_blocking(move || store.sweep_expired()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "background sweep error"),
                    Err(e) => warn!(error = %e, "background sweep task panicked"),
                }
            }
        });
    }

    fn passphrase_for_create<'a>(&'a self, supplied: Option<&'a str>) -> Result<&'a str> {
        match supplied.filter(|p| !p.is_empty()) {
            Some(p) if p.len() > self.options.max_passphrase_bytes => Err(VaultError::InvalidInput(
                format!("passphrase exceeds {} bytes", self.options.max_passphrase_bytes),
            )),
            Some(p) => Ok(p),
            None if self.options.require_passphrase => {
                Err(VaultError::InvalidInput("a passphrase is required".into()))
            }
            None => Ok(&self.options.default_passphrase),
        }
    }

    fn passphrase_for_unlock<'a>(&'a self, supplied: Option<&'a str>) -> &'a str {
        supplied
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.options.default_passphrase)
    }

    fn load(&self, id: &str) -> Result<Option<SecretRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SECRETS)?;
        let raw: Option<Vec<u8>> = table.get(id)?.map(|guard| guard.value().to_vec());
        raw.map(|bytes| decode(&bytes)).transpose()
    }

    /// Insert only if `id` is vacant. Returns false on collision.
    fn insert_vacant(&self, id: &str, bytes: &[u8]) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(SECRETS)?;
            if table.get(id)?.is_some() {
                false
            } else {
                table.insert(id, bytes)?;
                true
            }
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    /// Delete `id` only if it still holds the record identified by `nonce`.
    fn consume(&self, id: &str, nonce: &[u8; 12]) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let consumed = {
            let mut table = write_txn.open_table(SECRETS)?;
            let current: Option<Vec<u8>> = table.get(id)?.map(|guard| guard.value().to_vec());
            let same_record = match current {
                Some(bytes) => decode(&bytes)?.nonce == *nonce,
                None => false,
            };
            if same_record {
                table.remove(id)?;
            }
            same_record
        };
        write_txn.commit()?;
        Ok(consumed)
    }

    fn with_retry<T>(&self, op: &str, mut f: impl FnMut() -> Result<T>) -> Result<T> {
        let RetryPolicy {
            attempts,
            initial_backoff,
        } = self.options.retry;
        let mut backoff = initial_backoff;
        let mut attempt = 1;
        loop {
            match f() {
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(op, attempt, error = %e, ?backoff, "storage error, retrying");
                    std::thread::sleep(backoff);
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    error!(op, attempts, error = %e, "storage error, giving up");
                    return Err(e);
                }
                other => return other,
            }
        }
    }
}

/// 32 lowercase hex characters, the only shape `generate_id` produces.
fn is_well_formed_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Ids are bearer capabilities; logs only ever see a prefix.
fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn encode(record: &SecretRecord) -> Result<Vec<u8>> {
    let payload = bincode::serde::encode_to_vec(record, bincode::config::standard())
        .map_err(|e| VaultError::Storage(format!("bincode encode: {e}")))?;
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(RECORD_V1_MARKER);
    out.extend_from_slice(&payload);
    Ok(out)
}

fn decode(bytes: &[u8]) -> Result<SecretRecord> {
    match bytes.split_first() {
        Some((&RECORD_V1_MARKER, payload)) => {
            let (record, _) =
                bincode::serde::decode_from_slice(payload, bincode::config::standard())
                    .map_err(|_| VaultError::CorruptRecord)?;
            Ok(record)
        }
        _ => Err(VaultError::CorruptRecord),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::clock::ManualClock;
    use crate::store::model::PolicyKind;
    use std::sync::Barrier;
    use tempfile::tempdir;

    const START: i64 = 1_700_000_000;

    fn test_options() -> StoreOptions {
        StoreOptions {
            hash: HashParams::insecure_fast(),
            retry: RetryPolicy {
                attempts: 3,
                initial_backoff: Duration::from_millis(1),
            },
            ..Default::default()
        }
    }

    fn make_store_with(options: StoreOptions) -> (Store, ManualClock, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(START);
        let store = Store::open_with_clock(
            &dir.path().join("test.db"),
            crypto::generate_key(),
            options,
            Arc::new(clock.clone()),
        )
        .unwrap();
        (store, clock, dir)
    }

    fn make_store() -> (Store, ManualClock, tempfile::TempDir) {
        make_store_with(test_options())
    }

    fn ttl(ttl_seconds: u64) -> NewPolicy {
        NewPolicy::TimeToLive { ttl_seconds }
    }

    /// Rewrite the stored record for `id` through `f`.
    fn tamper(s: &Store, id: &str, f: impl FnOnce(&mut SecretRecord)) {
        let mut record = s.load(id).unwrap().unwrap();
        f(&mut record);
        let bytes = encode(&record).unwrap();
        let write_txn = s.db.begin_write().unwrap();
        {
            let mut table = write_txn.open_table(SECRETS).unwrap();
            table.insert(id, bytes.as_slice()).unwrap();
        }
        write_txn.commit().unwrap();
    }

    #[test]
    fn one_time_default_passphrase_burns_after_first_view() {
        let (s, _clock, _dir) = make_store();
        let created = s.create(b"hunter2", None, NewPolicy::OneTimeView).unwrap();

        let unlocked = s.unlock(&created.id, None).unwrap();
        assert_eq!(unlocked.plaintext.as_slice(), b"hunter2");
        assert!(unlocked.consumed);

        assert!(matches!(
            s.unlock(&created.id, None),
            Err(VaultError::NotFound)
        ));
        assert_eq!(s.exists(&created.id).unwrap(), SecretStatus::NotFound);
        assert_eq!(s.count().unwrap(), 0);
    }

    #[test]
    fn round_trip_is_byte_exact() {
        let (s, _clock, _dir) = make_store();
        let payload: Vec<u8> = (0..=255u8).collect();
        let created = s
            .create(&payload, Some("x-pass"), NewPolicy::OneTimeView)
            .unwrap();
        let unlocked = s.unlock(&created.id, Some("x-pass")).unwrap();
        assert_eq!(unlocked.plaintext.as_slice(), payload.as_slice());
    }

    #[test]
    fn explicit_default_passphrase_matches_omitted() {
        let (s, _clock, _dir) = make_store();
        let created = s.create(b"v", None, NewPolicy::OneTimeView).unwrap();
        assert!(s.unlock(&created.id, Some(DEFAULT_PASSPHRASE)).is_ok());
    }

    #[test]
    fn wrong_passphrase_does_not_consume() {
        let (s, _clock, _dir) = make_store();
        let created = s
            .create(b"v", Some("right"), NewPolicy::OneTimeView)
            .unwrap();

        for guess in [Some("wrong"), None, Some("Right")] {
            assert!(matches!(
                s.unlock(&created.id, guess),
                Err(VaultError::Unauthorized)
            ));
        }
        assert!(matches!(
            s.exists(&created.id).unwrap(),
            SecretStatus::Active { .. }
        ));
        assert_eq!(
            s.unlock(&created.id, Some("right")).unwrap().plaintext.as_slice(),
            b"v"
        );
    }

    #[test]
    fn ttl_allows_repeated_unlocks_before_deadline() {
        let (s, clock, _dir) = make_store();
        let created = s.create(b"v", Some("p"), ttl(120)).unwrap();
        assert_eq!(created.expires_in, Some(120));

        for _ in 0..3 {
            let unlocked = s.unlock(&created.id, Some("p")).unwrap();
            assert!(!unlocked.consumed);
        }

        clock.set(START + 119);
        assert!(s.unlock(&created.id, Some("p")).is_ok());

        clock.set(START + 121);
        assert!(matches!(
            s.unlock(&created.id, Some("p")),
            Err(VaultError::NotFound)
        ));
    }

    #[test]
    fn ttl_deadline_itself_is_expired() {
        let (s, clock, _dir) = make_store();
        let created = s.create(b"v", None, ttl(60)).unwrap();
        clock.set(START + 60);
        assert!(matches!(s.unlock(&created.id, None), Err(VaultError::NotFound)));
        assert_eq!(s.exists(&created.id).unwrap(), SecretStatus::NotFound);
    }

    #[test]
    fn wrong_passphrase_on_ttl_leaves_record() {
        let (s, _clock, _dir) = make_store();
        let created = s.create(b"v", Some("p"), ttl(60)).unwrap();
        assert!(matches!(
            s.unlock(&created.id, Some("q")),
            Err(VaultError::Unauthorized)
        ));
        assert!(s.unlock(&created.id, Some("p")).is_ok());
    }

    #[test]
    fn exists_does_not_mutate() {
        let (s, _clock, _dir) = make_store();
        let created = s.create(b"v", None, NewPolicy::OneTimeView).unwrap();
        for _ in 0..5 {
            assert_eq!(
                s.exists(&created.id).unwrap(),
                SecretStatus::Active {
                    policy: PolicyKind::OneTime
                }
            );
        }
        assert!(s.unlock(&created.id, None).is_ok());
    }

    #[test]
    fn exists_reports_policy_kind() {
        let (s, _clock, _dir) = make_store();
        let created = s.create(b"v", None, ttl(600)).unwrap();
        assert_eq!(
            s.exists(&created.id).unwrap(),
            SecretStatus::Active {
                policy: PolicyKind::Time
            }
        );
    }

    #[test]
    fn exists_hides_why_a_secret_is_gone() {
        let (s, clock, _dir) = make_store();
        let burned = s.create(b"v", None, NewPolicy::OneTimeView).unwrap();
        s.unlock(&burned.id, None).unwrap();
        let expired = s.create(b"v", None, ttl(60)).unwrap();
        clock.advance(61);
        let never = crypto::generate_id();

        assert_eq!(s.exists(&burned.id).unwrap(), SecretStatus::NotFound);
        assert_eq!(s.exists(&expired.id).unwrap(), SecretStatus::NotFound);
        assert_eq!(s.exists(&never).unwrap(), SecretStatus::NotFound);
    }

    #[test]
    fn malformed_ids_are_not_found() {
        let (s, _clock, _dir) = make_store();
        for id in ["", "abc123", "../../etc/passwd", &"Z".repeat(32)] {
            assert_eq!(s.exists(id).unwrap(), SecretStatus::NotFound);
            assert!(matches!(s.unlock(id, None), Err(VaultError::NotFound)));
        }
    }

    #[test]
    fn concurrent_unlocks_disclose_once() {
        const CALLERS: usize = 8;
        let (s, _clock, _dir) = make_store();
        let created = s
            .create(b"only once", Some("p"), NewPolicy::OneTimeView)
            .unwrap();
        let barrier = Barrier::new(CALLERS);

        let results: Vec<Result<Unlocked>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..CALLERS)
                .map(|_| {
                    let s = s.clone();
                    let id = created.id.clone();
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        s.unlock(&id, Some("p"))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let not_found = results
            .iter()
            .filter(|r| matches!(r, Err(VaultError::NotFound)))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(not_found, CALLERS - 1);
    }

    #[test]
    fn create_rejects_invalid_input() {
        let (s, _clock, _dir) = make_store();
        let cases: Vec<(Vec<u8>, Option<&str>, NewPolicy)> = vec![
            (vec![], None, NewPolicy::OneTimeView),
            (vec![b'a'; 4097], None, NewPolicy::OneTimeView),
            (b"v".to_vec(), None, ttl(59)),
            (b"v".to_vec(), None, ttl(0)),
            (b"v".to_vec(), None, ttl(30 * 86_400 + 1)),
        ];
        let long_pass = "p".repeat(257);
        for (plaintext, pass, policy) in cases {
            assert!(matches!(
                s.create(&plaintext, pass, policy),
                Err(VaultError::InvalidInput(_))
            ));
        }
        assert!(matches!(
            s.create(b"v", Some(&long_pass), NewPolicy::OneTimeView),
            Err(VaultError::InvalidInput(_))
        ));
        assert_eq!(s.count().unwrap(), 0);
    }

    #[test]
    fn ttl_bounds_are_inclusive() {
        let (s, _clock, _dir) = make_store();
        assert!(s.create(b"v", None, ttl(60)).is_ok());
        assert!(s.create(b"v", None, ttl(30 * 86_400)).is_ok());
    }

    #[test]
    fn required_passphrase_rejects_default() {
        let (s, _clock, _dir) = make_store_with(StoreOptions {
            require_passphrase: true,
            ..test_options()
        });
        assert!(matches!(
            s.create(b"v", None, NewPolicy::OneTimeView),
            Err(VaultError::InvalidInput(_))
        ));
        assert!(matches!(
            s.create(b"v", Some(""), NewPolicy::OneTimeView),
            Err(VaultError::InvalidInput(_))
        ));
        assert!(s.create(b"v", Some("real"), NewPolicy::OneTimeView).is_ok());
    }

    #[test]
    fn unopened_one_time_secret_expires_after_max_age() {
        let (s, clock, _dir) = make_store();
        let created = s.create(b"v", None, NewPolicy::OneTimeView).unwrap();
        assert_eq!(created.expires_in, Some(7 * 86_400));

        clock.advance(7 * 86_400);
        assert_eq!(s.exists(&created.id).unwrap(), SecretStatus::NotFound);
        assert_eq!(s.sweep_expired().unwrap(), 1);
    }

    #[test]
    fn one_time_without_max_age_never_expires() {
        let (s, clock, _dir) = make_store_with(StoreOptions {
            one_time_max_age: None,
            ..test_options()
        });
        let created = s.create(b"v", None, NewPolicy::OneTimeView).unwrap();
        assert_eq!(created.expires_in, None);
        clock.advance(365 * 86_400);
        assert_eq!(s.sweep_expired().unwrap(), 0);
        assert!(s.unlock(&created.id, None).is_ok());
    }

    #[test]
    fn sweep_removes_only_expired_and_is_idempotent() {
        let (s, clock, _dir) = make_store();
        let short = s.create(b"v", None, ttl(60)).unwrap();
        let long = s.create(b"v", None, ttl(3600)).unwrap();
        let once = s.create(b"v", None, NewPolicy::OneTimeView).unwrap();

        assert_eq!(s.sweep_expired().unwrap(), 0);
        clock.advance(120);
        assert_eq!(s.sweep_expired().unwrap(), 1);
        assert_eq!(s.sweep_expired().unwrap(), 0);

        assert_eq!(s.count().unwrap(), 2);
        assert_eq!(s.exists(&short.id).unwrap(), SecretStatus::NotFound);
        assert!(s.unlock(&long.id, None).is_ok());
        assert!(s.unlock(&once.id, None).is_ok());
    }

    #[test]
    fn tampered_ciphertext_is_corrupt() {
        let (s, _clock, _dir) = make_store();
        let created = s.create(b"v", Some("p"), ttl(600)).unwrap();
        tamper(&s, &created.id, |r| r.ciphertext[0] ^= 0xff);
        assert!(matches!(
            s.unlock(&created.id, Some("p")),
            Err(VaultError::CorruptRecord)
        ));
    }

    #[test]
    fn ciphertext_moved_to_another_id_is_corrupt() {
        let (s, _clock, _dir) = make_store();
        let a = s.create(b"alpha", Some("p"), ttl(600)).unwrap();
        let b = s.create(b"beta", Some("p"), ttl(600)).unwrap();
        let a_record = s.load(&a.id).unwrap().unwrap();
        tamper(&s, &b.id, |r| {
            r.ciphertext = a_record.ciphertext.clone();
            r.nonce = a_record.nonce;
        });
        assert!(matches!(
            s.unlock(&b.id, Some("p")),
            Err(VaultError::CorruptRecord)
        ));
    }

    #[test]
    fn corrupt_one_time_record_is_not_consumed() {
        let (s, _clock, _dir) = make_store();
        let created = s.create(b"v", None, NewPolicy::OneTimeView).unwrap();
        tamper(&s, &created.id, |r| r.ciphertext[0] ^= 0x01);
        assert!(matches!(
            s.unlock(&created.id, None),
            Err(VaultError::CorruptRecord)
        ));
        assert_eq!(s.count().unwrap(), 1);
    }

    #[test]
    fn decode_rejects_unknown_marker() {
        assert!(matches!(decode(&[]), Err(VaultError::CorruptRecord)));
        assert!(matches!(decode(&[0x7f, 1, 2]), Err(VaultError::CorruptRecord)));
    }

    #[test]
    fn reopen_with_same_key_keeps_secrets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("persist.db");
        let key_bytes = *crypto::generate_key().as_bytes();

        let id = {
            let s = Store::open(&path, crypto::load_key(&key_bytes).unwrap(), test_options())
                .unwrap();
            s.create(b"durable", None, NewPolicy::OneTimeView).unwrap().id
        };

        let s = Store::open(&path, crypto::load_key(&key_bytes).unwrap(), test_options()).unwrap();
        assert_eq!(s.unlock(&id, None).unwrap().plaintext.as_slice(), b"durable");
    }

    #[test]
    fn retry_recovers_from_transient_errors() {
        let (s, _clock, _dir) = make_store();
        let mut calls = 0;
        let out = s.with_retry("test", || {
            calls += 1;
            if calls < 3 {
                Err(VaultError::Storage("flaky".into()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(out.unwrap(), 3);
    }

    #[test]
    fn retry_is_bounded_and_skips_business_errors() {
        let (s, _clock, _dir) = make_store();
        let mut calls = 0;
        let out: Result<()> = s.with_retry("test", || {
            calls += 1;
            Err(VaultError::Storage("down".into()))
        });
        assert!(matches!(out, Err(VaultError::Storage(_))));
        assert_eq!(calls, 3);

        let mut calls = 0;
        let out: Result<()> = s.with_retry("test", || {
            calls += 1;
            Err(VaultError::NotFound)
        });
        assert!(matches!(out, Err(VaultError::NotFound)));
        assert_eq!(calls, 1);
    }

    /// Advances by `step` every time it is read, like time passing during hashing.
    #[derive(Default)]
    struct SteppingClock {
        now: std::sync::atomic::AtomicI64,
        step: std::sync::atomic::AtomicI64,
    }

    impl SteppingClock {
        fn set(&self, now: i64, step: i64) {
            use std::sync::atomic::Ordering::SeqCst;
            self.now.store(now, SeqCst);
            self.step.store(step, SeqCst);
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> i64 {
            use std::sync::atomic::Ordering::SeqCst;
            self.now.fetch_add(self.step.load(SeqCst), SeqCst)
        }
    }

    #[test]
    fn expiry_reached_during_hashing_refuses_disclosure() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(SteppingClock::default());
        clock.set(START, 0);
        let s = Store::open_with_clock(
            &dir.path().join("stepping.db"),
            crypto::generate_key(),
            StoreOptions {
                one_time_max_age: Some(10),
                ..test_options()
            },
            clock.clone(),
        )
        .unwrap();

        let one_time = s.create(b"late", None, NewPolicy::OneTimeView).unwrap();
        let timed = s.create(b"late", None, ttl(60)).unwrap();

        // Alive at the first read, past the backstop by the second.
        clock.set(START + 9, 1);
        assert!(matches!(
            s.unlock(&one_time.id, None),
            Err(VaultError::NotFound)
        ));
        clock.set(START + 59, 1);
        assert!(matches!(s.unlock(&timed.id, None), Err(VaultError::NotFound)));

        // The one-time record was refused, not consumed.
        clock.set(START + 5, 0);
        assert_eq!(
            s.exists(&one_time.id).unwrap(),
            SecretStatus::Active {
                policy: PolicyKind::OneTime
            }
        );
        assert!(s.unlock(&one_time.id, None).unwrap().consumed);
    }

    #[test]
    fn open_rejects_unusable_options() {
        let bad = [
            StoreOptions {
                min_ttl_seconds: 0,
                ..test_options()
            },
            StoreOptions {
                min_ttl_seconds: 600,
                max_ttl_seconds: 60,
                ..test_options()
            },
            StoreOptions {
                max_ttl_seconds: u64::MAX,
                ..test_options()
            },
            StoreOptions {
                one_time_max_age: Some(i64::MAX as u64),
                ..test_options()
            },
            StoreOptions {
                default_passphrase: String::new(),
                ..test_options()
            },
            StoreOptions {
                hash: HashParams {
                    memory_kib: 1,
                    iterations: 0,
                    parallelism: 1,
                },
                ..test_options()
            },
        ];
        for (i, options) in bad.into_iter().enumerate() {
            let dir = tempdir().unwrap();
            let opened = Store::open_with_clock(
                &dir.path().join("bad.db"),
                crypto::generate_key(),
                options,
                Arc::new(ManualClock::new(START)),
            );
            assert!(
                matches!(opened, Err(VaultError::InvalidInput(_))),
                "options #{i} should be rejected"
            );
        }
        assert!(test_options().validate(START).is_ok());
        assert!(StoreOptions::default().validate(START).is_ok());
    }
}
