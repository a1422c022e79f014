//! # Connection Pool
//!
//! Idle/in-use bookkeeping for native connections, keyed by target database
//! name. The pool lock guards bookkeeping only; I/O always happens on a
//! checked-out connection exclusively owned by the calling thread.
//!
//! ## Checkout Rules
//!
//! One scan over the idle queue per request:
//!
//! 1. Entries that are closed, idle beyond the configured timeout, or from a
//!    cleared pool generation are evicted in passing.
//! 2. When the dialect cannot rebind a connection to another database, only
//!    entries bound to the requested database are eligible. Requesting the
//!    default (empty) database never reuses an entry bound elsewhere.
//! 3. An exact database match wins and stops the scan; a merely eligible
//!    entry is kept as fallback and rebound after checkout.
//! 4. No match means a fresh connection from the factory.
//!
//! Returned connections go to the *front* of the idle queue, biasing reuse
//! toward recently active connections so stale ones age out.
//!
//! ## Ownership
//!
//! [`ConnectionGuard`] is the only way out of [`ConnectionPool::checkout`]:
//! the connection returns to the pool when the guard drops, on every exit
//! path. [`ConnectionGuard::mark_failed`] forces a physical close on return
//! instead.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::Result;
use hashbrown::HashSet;
use parking_lot::Mutex;
use tracing::debug;

use crate::dialect::{ConnectionFactory, DbConnection, Dialect, QueryResult};
use crate::sql::SqlCommand;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// One native connection plus pool bookkeeping.
pub struct PooledConnection {
    id: u64,
    database: String,
    last_used: Instant,
    generation: u64,
    inner: Box<dyn DbConnection>,
}

impl PooledConnection {
    fn new(database: String, generation: u64, inner: Box<dyn DbConnection>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            database,
            last_used: Instant::now(),
            generation,
            inner,
        }
    }

    /// Process-unique identity of this pooled connection.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Database this connection is currently bound to.
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}

struct PoolState {
    idle: VecDeque<PooledConnection>,
    used: HashSet<u64>,
    generation: u64,
}

/// Pool of reusable native connections for one storage target.
pub struct ConnectionPool {
    dialect: Arc<dyn Dialect>,
    factory: Arc<dyn ConnectionFactory>,
    close_timeout: Duration,
    state: Mutex<PoolState>,
}

impl ConnectionPool {
    pub fn new(
        dialect: Arc<dyn Dialect>,
        factory: Arc<dyn ConnectionFactory>,
        close_timeout: Duration,
    ) -> Self {
        Self {
            dialect,
            factory,
            close_timeout,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                used: HashSet::new(),
                generation: 0,
            }),
        }
    }

    /// Checks a connection for `database` out of the pool, creating one if no
    /// idle connection is eligible.
    pub fn checkout(&self, database: &str) -> Result<ConnectionGuard<'_>> {
        let reused = self.take_idle(database);
        let mut connection = match reused {
            Some(connection) => connection,
            None => {
                debug!(database, "opening new connection");
                let generation = self.state.lock().generation;
                let inner = self.factory.connect(database)?;
                let connection = PooledConnection::new(database.to_string(), generation, inner);
                self.state.lock().used.insert(connection.id);
                connection
            }
        };
        if connection.database != database {
            // Eligible non-exact match from a rebindable dialect.
            if let Err(e) = connection.inner.change_database(database) {
                self.discard(connection);
                return Err(e);
            }
            connection.database = database.to_string();
        }
        Ok(ConnectionGuard {
            pool: self,
            connection: Some(connection),
            close_on_return: false,
        })
    }

    /// Single scan over the idle queue: evicts dead entries, returns the best
    /// eligible connection already marked used.
    fn take_idle(&self, database: &str) -> Option<PooledConnection> {
        let mut state = self.state.lock();
        let generation = state.generation;
        let mut fallback: Option<usize> = None;
        let mut index = 0;
        while index < state.idle.len() {
            let entry = &state.idle[index];
            let expired = entry.last_used.elapsed() > self.close_timeout;
            if !entry.inner.is_open() || expired || entry.generation != generation {
                if let Some(mut dead) = state.idle.remove(index) {
                    debug!(id = dead.id, expired, "evicting idle connection");
                    dead.inner.close();
                }
                continue;
            }
            if entry.database == database {
                fallback = Some(index);
                break;
            }
            if fallback.is_none()
                && !database.is_empty()
                && self.dialect.connection_can_change_database()
            {
                fallback = Some(index);
            }
            index += 1;
        }
        let found = fallback.and_then(|i| state.idle.remove(i));
        if let Some(connection) = &found {
            state.used.insert(connection.id);
        }
        found
    }

    /// Checks a connection back in. Closed, failed, or stale-generation
    /// connections are physically closed; the rest go to the front of the
    /// idle queue.
    fn check_in(&self, mut connection: PooledConnection, close: bool) {
        let mut state = self.state.lock();
        state.used.remove(&connection.id);
        if close || !connection.inner.is_open() || connection.generation != state.generation {
            drop(state);
            connection.inner.close();
            return;
        }
        connection.last_used = Instant::now();
        state.idle.push_front(connection);
    }

    fn discard(&self, mut connection: PooledConnection) {
        self.state.lock().used.remove(&connection.id);
        connection.inner.close();
    }

    /// Force-closes every idle connection and invalidates the current
    /// generation, so connections still checked out close on return instead
    /// of rejoining the pool.
    pub fn clear(&self) {
        let drained: Vec<PooledConnection> = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.idle.drain(..).collect()
        };
        for mut connection in drained {
            connection.inner.close();
        }
    }

    /// Number of idle connections, for diagnostics.
    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Number of checked-out connections, for diagnostics.
    pub fn used_count(&self) -> usize {
        self.state.lock().used.len()
    }
}

/// Scoped checkout of one pooled connection. Dropping the guard returns the
/// connection to the pool on every exit path.
pub struct ConnectionGuard<'a> {
    pool: &'a ConnectionPool,
    connection: Option<PooledConnection>,
    close_on_return: bool,
}

impl ConnectionGuard<'_> {
    /// Identity of the held connection.
    pub fn id(&self) -> u64 {
        self.connection.as_ref().map(|c| c.id).unwrap_or(0)
    }

    pub fn is_open(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.inner.is_open())
    }

    /// Marks the connection failed: it will be closed instead of pooled when
    /// the guard drops.
    pub fn mark_failed(&mut self) {
        self.close_on_return = true;
    }

    /// Runs a command without result rows on the held connection.
    pub fn execute(&mut self, command: &SqlCommand, timeout: Duration) -> Result<u64> {
        match &mut self.connection {
            Some(connection) => connection.inner.execute(command, timeout),
            None => unreachable!("guard used after release"),
        }
    }

    /// Runs a query on the held connection.
    pub fn query(&mut self, command: &SqlCommand, timeout: Duration) -> Result<QueryResult> {
        match &mut self.connection {
            Some(connection) => connection.inner.query(command, timeout),
            None => unreachable!("guard used after release"),
        }
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.check_in(connection, self.close_on_return);
        }
    }
}
