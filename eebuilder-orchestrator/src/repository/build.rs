//! Build Registry
//!
//! Single owner of every build record. Readers get clones, writers go
//! through [`JobRegistry::mutate`], which applies a transition while holding
//! the write lock so nobody observes a half-applied update.

use eebuilder_core::domain::build::{BuildJob, BuildListItem};
use eebuilder_core::dto::build::BuildRequest;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{BuildError, Result};

/// In-memory store of build records
#[derive(Default)]
pub struct JobRegistry {
    inner: RwLock<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<Uuid, Entry>,
    /// Ids of purged builds, kept so an id is never handed out twice
    retired: HashSet<Uuid>,
    next_seq: u64,
}

struct Entry {
    record: BuildJob,
    seq: u64,
    cancel: CancellationToken,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new running build for the request and returns its snapshot
    pub async fn create(&self, req: &BuildRequest) -> Result<BuildJob> {
        let job = BuildJob::new(
            Uuid::new_v4(),
            req.environments.clone(),
            req.container_runtime,
        );

        self.insert(job).await
    }

    /// Inserts a prepared record
    ///
    /// An id that is live or was retired is a registry invariant violation.
    pub async fn insert(&self, job: BuildJob) -> Result<BuildJob> {
        let mut state = self.inner.write().await;
        let id = job.build_id;

        if state.entries.contains_key(&id) || state.retired.contains(&id) {
            tracing::error!("Refusing to register duplicate build id {}", id);
            return Err(BuildError::RegistryCorruption(format!(
                "build id {} is already in use",
                id
            )));
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            id,
            Entry {
                record: job.clone(),
                seq,
                cancel: CancellationToken::new(),
            },
        );

        tracing::debug!("Registered build {} (seq {})", id, seq);

        Ok(job)
    }

    /// Returns a snapshot of a build
    pub async fn get(&self, id: Uuid) -> Option<BuildJob> {
        let state = self.inner.read().await;
        state.entries.get(&id).map(|entry| entry.record.clone())
    }

    /// Lists builds, most recent first
    ///
    /// Builds started at the same instant are ordered by insertion, newest first.
    pub async fn list(&self) -> Vec<BuildListItem> {
        let state = self.inner.read().await;

        let mut entries: Vec<&Entry> = state.entries.values().collect();
        entries.sort_by(|a, b| {
            b.record
                .start_time
                .cmp(&a.record.start_time)
                .then_with(|| b.seq.cmp(&a.seq))
        });

        entries
            .into_iter()
            .map(|entry| BuildListItem::from(&entry.record))
            .collect()
    }

    /// Applies `f` to a build while holding the write lock
    ///
    /// Returns `None` if the build does not exist.
    pub async fn mutate<F, R>(&self, id: Uuid, f: F) -> Option<R>
    where
        F: FnOnce(&mut BuildJob) -> R,
    {
        let mut state = self.inner.write().await;
        state.entries.get_mut(&id).map(|entry| f(&mut entry.record))
    }

    /// Cancellation token shared with the build's execution task
    pub async fn cancel_token(&self, id: Uuid) -> Option<CancellationToken> {
        let state = self.inner.read().await;
        state.entries.get(&id).map(|entry| entry.cancel.clone())
    }

    /// Purges a build. Its id stays reserved.
    pub async fn remove(&self, id: Uuid) -> Option<BuildJob> {
        let mut state = self.inner.write().await;
        let entry = state.entries.remove(&id)?;
        state.retired.insert(id);

        tracing::info!("Removed build {} from registry", id);

        Some(entry.record)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
