pub mod clock;
pub mod crypto;
pub mod db;
pub mod model;

pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::HashParams;
pub use db::{RetryPolicy, Store, StoreOptions, DEFAULT_PASSPHRASE};
pub use model::{
    Created, ExpirationPolicy, NewPolicy, PolicyKind, SecretRecord, SecretStatus, Unlocked,
};
