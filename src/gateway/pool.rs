// pool.rs - Shared RCON connections and parallel dispatch
//
// Workers borrow a connection, send one command, and hand it back. A
// connection that breaks or falls out of sync is replaced once before the
// command counts as failed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use log::{info, warn};
use rayon::prelude::*;

use super::rcon::RconClient;
use super::{CommandChannel, CommandSink, DispatchReport};
use crate::config::RconConfig;
use crate::error::GatewayError;
use crate::synth::PlacementInstruction;

/// Log progress every this many commands
const PROGRESS_EVERY: usize = 10_000;

pub struct ConnectionPool {
    config: RconConfig,
    idle: Mutex<Vec<RconClient>>,
    available: Condvar,
    /// Connections idle or checked out
    live: AtomicUsize,
}

impl ConnectionPool {
    /// Open `config.pool_size` authenticated connections up front
    pub fn connect(config: RconConfig) -> Result<Self, GatewayError> {
        let size = config.pool_size.max(1);
        let mut conns = Vec::with_capacity(size);
        for _ in 0..size {
            conns.push(open(&config)?);
        }
        info!("rcon pool: {size} connections to {}:{}", config.host, config.port);
        Ok(Self { config, idle: Mutex::new(conns), available: Condvar::new(), live: AtomicUsize::new(size) })
    }

    pub fn size(&self) -> usize {
        self.config.pool_size.max(1)
    }

    /// Connections still open, idle or checked out
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Block until a connection is free. Fails once every connection has
    /// been lost.
    pub fn get(&self) -> Result<PooledConnection<'_>, GatewayError> {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(conn) = idle.pop() {
                return Ok(PooledConnection { pool: self, conn: Some(conn) });
            }
            if self.live.load(Ordering::Acquire) == 0 {
                return Err(GatewayError::Protocol("no live rcon connections left".into()));
            }
            idle = self.available.wait(idle).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn put(&self, conn: RconClient) {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).push(conn);
        self.available.notify_one();
    }

    fn forget(&self) {
        let _idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        self.live.fetch_sub(1, Ordering::AcqRel);
        self.available.notify_all();
    }
}

fn open(config: &RconConfig) -> Result<RconClient, GatewayError> {
    RconClient::connect(
        (config.host.as_str(), config.port),
        &config.password,
        Duration::from_millis(config.timeout_ms),
    )
}

/// Returned to the pool on drop
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<RconClient>,
}

impl PooledConnection<'_> {
    /// Swap the underlying connection for a fresh one
    fn reconnect(&mut self) -> Result<(), GatewayError> {
        self.conn = None;
        self.conn = Some(open(&self.pool.config)?);
        Ok(())
    }

    fn send(&mut self, command: &str) -> Result<String, GatewayError> {
        let first = match self.conn.as_mut() {
            Some(conn) => conn.command(command),
            None => Err(GatewayError::Protocol("connection lost".into())),
        };
        match first {
            Err(e) if e.is_connection_fault() => {
                warn!("rcon connection unusable ({e}), reconnecting");
                self.reconnect()?;
                self.command(command)
            }
            other => other,
        }
    }
}

impl CommandChannel for PooledConnection<'_> {
    fn command(&mut self, command: &str) -> Result<String, GatewayError> {
        match self.conn.as_mut() {
            Some(conn) => conn.command(command),
            None => Err(GatewayError::Protocol("connection lost".into())),
        }
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        match self.conn.take() {
            Some(conn) => self.pool.put(conn),
            None => match open(&self.pool.config) {
                Ok(conn) => self.pool.put(conn),
                Err(e) => {
                    warn!("rcon pool shrank, reconnect failed: {e}");
                    self.pool.forget();
                }
            },
        }
    }
}

/// Sends placement commands through a connection pool on a rayon pool of
/// the same size
pub struct RconSink {
    pool: ConnectionPool,
}

impl RconSink {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn connect(config: RconConfig) -> Result<Self, GatewayError> {
        Ok(Self::new(ConnectionPool::connect(config)?))
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

impl CommandSink for RconSink {
    fn dispatch(&mut self, instructions: &[PlacementInstruction]) -> Result<DispatchReport, GatewayError> {
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(self.pool.size())
            .build()
            .map_err(|e| GatewayError::ThreadPool(e.to_string()))?;

        info!("sending {} setblock commands over {} connections", instructions.len(), self.pool.size());
        let done = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let pool = &self.pool;

        workers.install(|| {
            instructions.par_iter().for_each(|inst| {
                let sent = pool.get().and_then(|mut conn| conn.send(&inst.to_command()));
                if let Err(e) = sent {
                    warn!("'{inst}' failed: {e}");
                    failed.fetch_add(1, Ordering::Relaxed);
                }
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                if n % PROGRESS_EVERY == 0 {
                    info!("  {n}/{} sent", instructions.len());
                }
            });
        });

        let failed = failed.into_inner();
        let report = DispatchReport { sent: instructions.len() - failed, failed };
        info!("dispatch finished: {} ok, {} failed", report.sent, report.failed);
        Ok(report)
    }
}
