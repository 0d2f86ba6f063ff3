pub mod migrations;
pub mod models;
pub mod ordering;
pub mod queries;

use anyhow::{Result, anyhow};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// How long a statement waits on SQLite's write lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite VM steps between deadline checks while a statement runs.
const DEADLINE_CHECK_OPS: i32 = 1_000;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let db = Self::init(conn)?;

        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A handle whose calls give up at `deadline`. See [`Bounded`].
    pub fn until(&self, deadline: Instant) -> Bounded<'_> {
        Bounded { db: self, deadline }
    }

    pub fn with_conn<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        self.conn_until(None, f)
    }

    /// Run `f` inside an IMMEDIATE transaction: the write lock is taken up
    /// front, so reads inside `f` can't be invalidated by another writer
    /// before the commit. Rolled back when `f` returns `Err`.
    pub fn with_tx<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        self.tx_until(None, f)
    }

    fn acquire(&self, deadline: Option<Instant>) -> Result<Held<'_>> {
        let conn = self.conn.lock().map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(anyhow!("store deadline passed while waiting for the connection"));
            }
            // returning true interrupts the running statement
            conn.progress_handler(DEADLINE_CHECK_OPS, Some(move || Instant::now() >= deadline));
        }
        Ok(Held { conn, deadline })
    }

    fn conn_until<F, T, E>(&self, deadline: Option<Instant>, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        let held = self.acquire(deadline)?;
        f(&held.conn)
    }

    fn tx_until<F, T, E>(&self, deadline: Option<Instant>, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        let mut held = self.acquire(deadline)?;
        let tx = held
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(anyhow::Error::from)?;
        let out = f(&tx);
        // commit and rollback always run to completion
        tx.progress_handler(0, None::<fn() -> bool>);
        let out = out?;

        if deadline.is_some_and(|d| Instant::now() >= d) {
            warn!("Transaction finished after its deadline, rolling back");
            return Err(anyhow!("store deadline passed; transaction rolled back").into());
        }
        tx.commit().map_err(anyhow::Error::from)?;
        Ok(out)
    }
}

/// The database seen through a deadline. Statements still running at the
/// deadline are interrupted, and a transaction whose work ends after it is
/// rolled back instead of committed, so a late call leaves nothing written.
pub struct Bounded<'db> {
    db: &'db Database,
    deadline: Instant,
}

impl Bounded<'_> {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn with_conn<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        self.db.conn_until(Some(self.deadline), f)
    }

    pub fn with_tx<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        self.db.tx_until(Some(self.deadline), f)
    }
}

/// The locked connection, with any deadline hook removed on release.
struct Held<'db> {
    conn: MutexGuard<'db, Connection>,
    deadline: Option<Instant>,
}

impl Drop for Held<'_> {
    fn drop(&mut self) {
        if self.deadline.is_some() {
            self.conn.progress_handler(0, None::<fn() -> bool>);
        }
    }
}
