//! The key service: coordinator task and caller-facing handle.
//!
//! # Architecture
//!
//! ```text
//! KeyService (Clone)                 Coordinator task
//!   ├─ freshness: FreshnessIndex ──▶ (shared, written on insert/sweep)
//!   ├─ key_manager: Arc<dyn KeyManager>
//!   └─ tx: mpsc::Sender ──────────▶ ├─ cache: KeyCache
//!                                   └─ next_counter: u64
//! ```
//!
//! The coordinator is the sole writer of the cache. Commands drain strictly
//! in arrival order, so writes for the same database are totally ordered.
//! Callers touch shared state in exactly one place outside the coordinator:
//! the freshness index, consulted on the encrypt/decrypt fast path before
//! deciding whether a key manager round-trip is needed. That check is
//! advisory — a lookup racing a sweep may miss, and the caller then falls
//! back to the key manager as for any stale entry.
//!
//! Recency bumps are best-effort: a lookup past the inactivity threshold
//! enqueues a bump without waiting, and a full queue drops it.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use aegis_common::{Database, DbKey, Error};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Duration, Instant};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::cache::{FreshnessIndex, KeyCache};
use crate::config::Settings;
use crate::crypto::{
    binding_aad, decrypt_value, encrypt_value, generate_value_key, unwrap_key, wrap_key,
};
use crate::envelope::Envelope;
use crate::keymgr::KeyManager;

/// Grace period for the coordinator to signal readiness at startup.
const READY_GRACE: Duration = Duration::from_secs(60);

/// Idle period after which the coordinator emits a housekeeping heartbeat.
const IDLE_HEARTBEAT: Duration = Duration::from_secs(10);

/// Depth of the coordinator command queue.
const COMMAND_QUEUE_DEPTH: usize = 1024;

/// Commands accepted by the coordinator.
enum Command {
    Insert {
        uuid: Uuid,
        db_key: DbKey,
        done: oneshot::Sender<()>,
    },
    Lookup {
        uuid: Uuid,
        reply: oneshot::Sender<Option<DbKey>>,
    },
    Bump {
        uuid: Uuid,
    },
}

/// Monotonic unix-seconds clock.
///
/// Captures the wall clock once at service start and advances it with the
/// tokio monotonic clock, so cache timestamps never jump backwards and test
/// runtimes can drive expiry with `tokio::time`.
#[derive(Clone, Copy, Debug)]
struct Clock {
    wall0: u64,
    start: Instant,
}

impl Clock {
    fn start() -> Self {
        Self {
            wall0: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            start: Instant::now(),
        }
    }

    fn now_secs(&self) -> u64 {
        self.wall0 + self.start.elapsed().as_secs()
    }
}

/// Cheaply cloneable handle to the key service.
///
/// All clones share one coordinator task; dropping the last clone closes the
/// command channel and the coordinator exits, zeroizing cached keys.
#[derive(Clone)]
pub struct KeyService {
    tx: mpsc::Sender<Command>,
    freshness: FreshnessIndex,
    key_manager: Arc<dyn KeyManager>,
    clock: Clock,
}

impl KeyService {
    /// Spawn the coordinator and return a handle once it is ready.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the coordinator does not signal
    /// readiness within the startup grace period.
    pub async fn start(key_manager: Arc<dyn KeyManager>) -> Result<Self, Error> {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let freshness = FreshnessIndex::new();
        let clock = Clock::start();
        let (ready_tx, ready_rx) = oneshot::channel();

        let coordinator = Coordinator {
            rx,
            bump_tx: tx.downgrade(),
            cache: KeyCache::new(freshness.clone()),
            next_counter: 0,
            clock,
        };
        tokio::spawn(coordinator.run(ready_tx));

        match time::timeout(READY_GRACE, ready_rx).await {
            Ok(Ok(())) => {}
            _ => return Err(Error::Internal("coordinator failed to start".into())),
        }
        info!("key service started");
        Ok(Self {
            tx,
            freshness,
            key_manager,
            clock,
        })
    }

    /// Obtain a wrapping key for a newly created database and cache it.
    ///
    /// Returns `false` if the key manager refuses; the failure is logged.
    pub async fn init_db(&self, db: &Database, options: &serde_json::Value) -> bool {
        match self.key_manager.init_db(db, options).await {
            Ok(db_key) => self.install(db.uuid(), db_key).await.is_ok(),
            Err(e) => {
                warn!(db = %db.uuid(), error = %e, "key manager init_db failed");
                false
            }
        }
    }

    /// Warm the cache for an existing database.
    ///
    /// Returns `false` if the key manager refuses; the failure is logged.
    pub async fn open_db(&self, db: &Database) -> bool {
        match self.key_manager.open_db(db).await {
            Ok(db_key) => self.install(db.uuid(), db_key).await.is_ok(),
            Err(e) => {
                warn!(db = %db.uuid(), error = %e, "key manager open_db failed");
                false
            }
        }
    }

    /// Encrypt `plaintext` for `(db, logical_key)`, returning the framed
    /// ciphertext envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyManagerUnavailable`] if the database key could
    /// not be obtained, or [`Error::Internal`] on a coordinator failure.
    pub async fn encrypt(
        &self,
        db: &Database,
        logical_key: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let db_key = self.db_key(db).await?;
        let value_key = generate_value_key();
        let wrapped_key = wrap_key(&db_key, &value_key)?;
        let aad = binding_aad(&db.uuid(), logical_key);
        let (ciphertext, tag) = encrypt_value(&value_key, &aad, plaintext)?;
        Ok(Envelope {
            wrapped_key,
            tag,
            ciphertext,
        }
        .to_bytes())
    }

    /// Decrypt a ciphertext envelope produced for `(db, logical_key)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotCiphertext`] for a malformed envelope,
    /// [`Error::DecryptionFailed`] if the envelope was produced for a
    /// different identity or under a different database key, and
    /// [`Error::KeyManagerUnavailable`] if the database key could not be
    /// obtained.
    pub async fn decrypt(
        &self,
        db: &Database,
        logical_key: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let db_key = self.db_key(db).await?;
        let envelope = Envelope::parse(ciphertext)?;
        let value_key = unwrap_key(&db_key, &envelope.wrapped_key)?;
        let aad = binding_aad(&db.uuid(), logical_key);
        decrypt_value(&value_key, &aad, &envelope.ciphertext, &envelope.tag)
    }

    /// Number of databases with a cached key.
    pub fn cached_keys(&self) -> usize {
        self.freshness.len()
    }

    /// Resolve the wrapping key for `db`: freshness-gated cache read first,
    /// key manager fallback on miss or stale.
    async fn db_key(&self, db: &Database) -> Result<DbKey, Error> {
        let uuid = db.uuid();
        if self.freshness.is_fresh(&uuid, self.clock.now_secs()) {
            if let Some(db_key) = self.lookup(uuid).await? {
                return Ok(db_key);
            }
            // Lost the race against a sweep; treat as stale.
        }
        debug!(db = %uuid, "cache miss, fetching key from key manager");
        let db_key = self
            .key_manager
            .open_db(db)
            .await
            .map_err(|e| Error::KeyManagerUnavailable(e.to_string()))?;
        self.install(uuid, db_key.clone()).await?;
        Ok(db_key)
    }

    async fn install(&self, uuid: Uuid, db_key: DbKey) -> Result<(), Error> {
        let (done, ack) = oneshot::channel();
        self.tx
            .send(Command::Insert { uuid, db_key, done })
            .await
            .map_err(|_| coordinator_gone())?;
        ack.await.map_err(|_| coordinator_gone())
    }

    async fn lookup(&self, uuid: Uuid) -> Result<Option<DbKey>, Error> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Lookup { uuid, reply })
            .await
            .map_err(|_| coordinator_gone())?;
        rx.await.map_err(|_| coordinator_gone())
    }
}

fn coordinator_gone() -> Error {
    Error::Internal("key service coordinator is not running".into())
}

/// The coordinator task: sole owner and writer of the cache.
struct Coordinator {
    rx: mpsc::Receiver<Command>,
    /// Weak self-sender for scheduling bumps; weak so that the channel
    /// closes when the last caller handle is dropped.
    bump_tx: mpsc::WeakSender<Command>,
    cache: KeyCache,
    next_counter: u64,
    clock: Clock,
}

impl Coordinator {
    async fn run(mut self, ready: oneshot::Sender<()>) {
        let _ = ready.send(());
        let mut next_sweep = Instant::now() + self.sweep_interval();
        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.apply(cmd),
                    None => break,
                },
                _ = time::sleep_until(next_sweep) => {
                    self.sweep();
                    next_sweep = Instant::now() + self.sweep_interval();
                }
                _ = time::sleep(IDLE_HEARTBEAT) => {
                    trace!(cached = self.cache.len(), "coordinator idle");
                }
            }
        }
        debug!("all handles dropped, key service coordinator exiting");
    }

    fn sweep_interval(&self) -> Duration {
        Duration::from_secs(Settings::current().cache_expiration_check_sec.max(1))
    }

    fn apply(&mut self, cmd: Command) {
        if let Err(err) = self.handle(cmd) {
            // An invariant break means a lost write or an illegal observed
            // state; the cache is transient, so die and rebuild on restart.
            error!(error = %err, "cache invariant violated, terminating coordinator");
            panic!("aegis coordinator: {err}");
        }
    }

    fn handle(&mut self, cmd: Command) -> Result<(), Error> {
        match cmd {
            Command::Insert { uuid, db_key, done } => {
                let settings = Settings::current();
                let counter = self.assign_counter();
                self.cache.insert(
                    uuid,
                    db_key,
                    counter,
                    self.clock.now_secs(),
                    settings.cache_max_age_sec,
                    settings.cache_limit,
                )?;
                let _ = done.send(());
            }
            Command::Lookup { uuid, reply } => {
                let hit = self.cache.lookup(&uuid, self.clock.now_secs());
                if hit.as_ref().is_some_and(|h| h.needs_bump) {
                    self.schedule_bump(uuid);
                }
                let _ = reply.send(hit.map(|h| h.db_key));
            }
            Command::Bump { uuid } => {
                let counter = self.assign_counter();
                self.cache.bump(&uuid, counter, self.clock.now_secs())?;
            }
        }
        Ok(())
    }

    fn sweep(&mut self) {
        match self.cache.sweep_expired(self.clock.now_secs()) {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "swept expired database keys"),
            Err(err) => {
                error!(error = %err, "cache invariant violated, terminating coordinator");
                panic!("aegis coordinator: {err}");
            }
        }
    }

    /// Enqueue a best-effort recency bump. A full queue or a closing
    /// channel drops it; the next inactive lookup reschedules.
    fn schedule_bump(&self, uuid: Uuid) {
        if let Some(tx) = self.bump_tx.upgrade() {
            let _ = tx.try_send(Command::Bump { uuid });
        }
    }

    fn assign_counter(&mut self) -> u64 {
        self.next_counter += 1;
        self.next_counter
    }
}
