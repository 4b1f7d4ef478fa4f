//! Bounded pool of initialized engine sessions.
//!
//! Admission is FIFO through a fair semaphore, so at most `size` sessions
//! exist and waiting callers are served in arrival order. Sessions are
//! spawned lazily and reused while healthy.

use crate::AnalysisError;
use engine::{EngineConfig, EngineSession};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::{Semaphore, SemaphorePermit};

pub struct EnginePool {
    config: EngineConfig,
    size: usize,
    permits: Semaphore,
    idle: Mutex<Vec<EngineSession>>,
    next_id: AtomicU64,
    spawned: AtomicU64,
}

/// Exclusive use of one session. Hand it back with [`PooledSession::release`]
/// or throw it away with [`PooledSession::discard`]; simply dropping it kills
/// the engine process and frees the slot.
pub struct PooledSession<'a> {
    pool: &'a EnginePool,
    session: EngineSession,
    _permit: SemaphorePermit<'a>,
}

impl EnginePool {
    pub fn new(config: EngineConfig, size: usize) -> Self {
        let size = size.max(1);
        Self {
            config,
            size,
            permits: Semaphore::new(size),
            idle: Mutex::new(Vec::with_capacity(size)),
            next_id: AtomicU64::new(1),
            spawned: AtomicU64::new(0),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Initialized sessions waiting for work.
    pub fn idle_count(&self) -> usize {
        self.idle().len()
    }

    /// Engine processes started over the pool's lifetime.
    pub fn spawned_count(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Wait for a free slot, then hand out a healthy idle session or start a new one.
    pub async fn acquire(&self) -> Result<PooledSession<'_>, AnalysisError> {
        let permit = self.permit().await?;
        loop {
            let candidate = self.idle().pop();
            let Some(mut session) = candidate else {
                break;
            };
            if session.is_healthy() {
                tracing::trace!(session = session.id(), "Reusing idle engine");
                return Ok(self.wrap(session, permit));
            }
            tracing::debug!(session = session.id(), "Dropping unhealthy idle engine");
            session.kill().await;
        }
        let session = self.spawn().await?;
        Ok(self.wrap(session, permit))
    }

    /// Like [`EnginePool::acquire`] but always starts a new engine process.
    pub async fn acquire_fresh(&self) -> Result<PooledSession<'_>, AnalysisError> {
        let permit = self.permit().await?;
        let session = self.spawn().await?;
        Ok(self.wrap(session, permit))
    }

    /// Refuse new work and shut down every idle session. Sessions currently
    /// checked out are discarded when they come back.
    pub async fn shutdown(&self) {
        self.permits.close();
        let idle = std::mem::take(&mut *self.idle());
        tracing::info!("Shutting down {} idle engine(s)", idle.len());
        for session in idle {
            session.shutdown().await;
        }
    }

    async fn permit(&self) -> Result<SemaphorePermit<'_>, AnalysisError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| AnalysisError::EngineUnavailable("engine pool is shut down".to_string()))
    }

    async fn spawn(&self) -> Result<EngineSession, AnalysisError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut session = EngineSession::start(id, self.config.clone())?;
        self.spawned.fetch_add(1, Ordering::Relaxed);
        session.initialize().await?;
        Ok(session)
    }

    fn wrap<'a>(&'a self, session: EngineSession, permit: SemaphorePermit<'a>) -> PooledSession<'a> {
        PooledSession {
            pool: self,
            session,
            _permit: permit,
        }
    }

    fn idle(&self) -> MutexGuard<'_, Vec<EngineSession>> {
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PooledSession<'_> {
    pub fn session(&mut self) -> &mut EngineSession {
        &mut self.session
    }

    /// Return the session for reuse. Unhealthy sessions are dropped instead.
    pub fn release(mut self) {
        if self.pool.permits.is_closed() || !self.session.is_healthy() {
            tracing::debug!(session = self.session.id(), "Not returning engine to pool");
            return;
        }
        self.pool.idle().push(self.session);
    }

    /// Kill the engine process and free the slot.
    pub async fn discard(mut self) {
        tracing::debug!(session = self.session.id(), "Discarding engine");
        self.session.kill().await;
    }
}
