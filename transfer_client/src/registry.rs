use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task;

use crate::job::JobId;

/// Proof that the holder removed a job from its registry. Exactly one caller can
/// obtain it per job, so only that caller may resolve the job.
pub struct Claimed<J> {
    job: Arc<J>,
}

impl<J> Deref for Claimed<J> {
    type Target = J;

    fn deref(&self) -> &J {
        &self.job
    }
}

struct Entry<J> {
    job: Arc<J>,
    task: Option<task::Id>,
}

struct RegistryInner<J> {
    jobs: HashMap<JobId, Entry<J>>,
    tasks: HashMap<task::Id, JobId>,
}

/// Active jobs keyed by id, with a secondary index from the worker task to its job.
///
/// A job is in the registry from registration until whoever finishes it first (the
/// worker on completion or a caller cancelling it) removes it. Both maps are updated
/// under one lock, so the index never names a removed job.
pub struct JobRegistry<J> {
    inner: Mutex<RegistryInner<J>>,
}

impl<J> Default for JobRegistry<J> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                jobs: HashMap::new(),
                tasks: HashMap::new(),
            }),
        }
    }
}

impl<J> JobRegistry<J> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false, leaving the registry untouched, if the id is already in use.
    pub fn register(&self, id: JobId, job: Arc<J>) -> bool {
        let mut inner = self.inner.lock();
        if inner.jobs.contains_key(&id) {
            return false;
        }
        inner.jobs.insert(id, Entry { job, task: None });
        true
    }

    /// Records which task runs the job. Returns false if the job is no longer registered.
    pub fn bind_task(&self, id: JobId, task_id: task::Id) -> bool {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.jobs.get_mut(&id) else {
            return false;
        };
        if let Some(previous) = entry.task.replace(task_id) {
            inner.tasks.remove(&previous);
        }
        inner.tasks.insert(task_id, id);
        true
    }

    pub fn get(&self, id: JobId) -> Option<Arc<J>> {
        self.inner.lock().jobs.get(&id).map(|e| e.job.clone())
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.inner.lock().jobs.contains_key(&id)
    }

    pub fn lookup_task(&self, task_id: task::Id) -> Option<JobId> {
        self.inner.lock().tasks.get(&task_id).copied()
    }

    /// Removes the job and its task binding. Only the first call for an id returns it.
    pub fn remove(&self, id: JobId) -> Option<Claimed<J>> {
        let mut inner = self.inner.lock();
        let entry = inner.jobs.remove(&id)?;
        if let Some(task_id) = entry.task {
            inner.tasks.remove(&task_id);
        }
        Some(Claimed { job: entry.job })
    }

    /// Removes every job, e.g. on shutdown.
    pub fn drain(&self) -> Vec<Claimed<J>> {
        let mut inner = self.inner.lock();
        inner.tasks.clear();
        inner.jobs.drain().map(|(_, e)| Claimed { job: e.job }).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
