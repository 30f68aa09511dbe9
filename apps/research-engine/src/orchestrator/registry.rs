//! Live Job Registry
//!
//! Tracks the cancellation token and task handle of every in-flight job.
//! One lock guards both maps and the shutdown flag so registration can never
//! race a shutdown sweep. Critical sections are synchronous and short; the
//! lock is never held across an await.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Default)]
struct RegistryInner {
    tokens: HashMap<Uuid, CancellationToken>,
    handles: HashMap<Uuid, JoinHandle<()>>,
    shutting_down: bool,
}

/// Registry of live jobs and their cancellation tokens.
#[derive(Default)]
pub struct JobRegistry {
    inner: Mutex<RegistryInner>,
}

impl JobRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job and mint its cancellation token.
    ///
    /// Returns `None` once shutdown has begun; no new jobs are accepted
    /// after that point.
    #[must_use]
    pub fn try_register(&self, job_id: Uuid) -> Option<CancellationToken> {
        let mut inner = self.inner.lock();
        if inner.shutting_down {
            return None;
        }
        let token = CancellationToken::new();
        inner.tokens.insert(job_id, token.clone());
        Some(token)
    }

    /// Track the spawned task so shutdown can await it.
    ///
    /// If the job already finished (its token is gone), the handle is
    /// dropped, which detaches the completed task.
    pub fn attach_handle(&self, job_id: Uuid, handle: JoinHandle<()>) {
        let mut inner = self.inner.lock();
        if inner.tokens.contains_key(&job_id) {
            inner.handles.insert(job_id, handle);
        }
    }

    /// Fire a job's cancellation token.
    ///
    /// Returns whether a live job was signalled.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        let inner = self.inner.lock();
        inner.tokens.get(&job_id).is_some_and(|token| {
            token.cancel();
            true
        })
    }

    /// Deregister a finished job.
    pub fn finish(&self, job_id: Uuid) {
        let mut inner = self.inner.lock();
        inner.tokens.remove(&job_id);
        inner.handles.remove(&job_id);
    }

    /// Number of jobs currently registered.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner.lock().tokens.len()
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.inner.lock().shutting_down
    }

    /// Begin shutdown: refuse new registrations, cancel every live job,
    /// and hand back the task handles to await.
    #[must_use]
    pub fn shutdown(&self) -> Vec<(Uuid, JoinHandle<()>)> {
        let mut inner = self.inner.lock();
        inner.shutting_down = true;
        for token in inner.tokens.values() {
            token.cancel();
        }
        inner.handles.drain().collect()
    }
}
