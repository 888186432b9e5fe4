use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::config::JobMemoryConfig;
use super::error::{JobMemoryError, JobMemoryResult};
use super::manager::JobMemory;
use super::store::JobMemoryStore;

/// Shared, per-job serialized access to a [`JobMemory`].
#[derive(Debug, Clone)]
pub struct JobMemoryHandle {
    job_id: Arc<str>,
    inner: Arc<Mutex<JobMemory>>,
}

impl JobMemoryHandle {
    pub fn new(memory: JobMemory) -> Self {
        Self {
            job_id: Arc::from(memory.job_id()),
            inner: Arc::new(Mutex::new(memory)),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Waits for exclusive access. Writers of one job queue here.
    pub async fn lock(&self) -> MutexGuard<'_, JobMemory> {
        self.inner.lock().await
    }

    pub async fn checkpoint(&self, store: &dyn JobMemoryStore) -> JobMemoryResult<()> {
        let record = self.lock().await.record().clone();
        store.save(&record).await
    }

    pub async fn compressed_context(&self) -> String {
        self.lock().await.get_compressed_context()
    }
}

/// Hands out one [`JobMemoryHandle`] per job id.
pub struct JobMemoryRegistry {
    jobs: RwLock<HashMap<String, JobMemoryHandle>>,
    store: Option<Arc<dyn JobMemoryStore>>,
    config: JobMemoryConfig,
}

impl std::fmt::Debug for JobMemoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobMemoryRegistry")
            .field("jobs", &self.jobs.read().len())
            .field("has_store", &self.store.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl JobMemoryRegistry {
    pub fn new(config: JobMemoryConfig) -> JobMemoryResult<Self> {
        config.validate().map_err(JobMemoryError::invalid_config)?;
        Ok(Self {
            jobs: RwLock::new(HashMap::new()),
            store: None,
            config,
        })
    }

    pub fn with_store(mut self, store: Arc<dyn JobMemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn store(&self) -> Option<&Arc<dyn JobMemoryStore>> {
        self.store.as_ref()
    }

    pub fn config(&self) -> &JobMemoryConfig {
        &self.config
    }

    pub fn get(&self, job_id: &str) -> Option<JobMemoryHandle> {
        self.jobs.read().get(job_id).cloned()
    }

    /// Returns the job's handle, loading it from the store or starting a new job.
    pub async fn open(&self, job_id: &str) -> JobMemoryResult<JobMemoryHandle> {
        if let Some(handle) = self.get(job_id) {
            return Ok(handle);
        }

        let memory = match &self.store {
            Some(store) => match JobMemory::load(job_id, store.as_ref(), self.config.clone()).await
            {
                Ok(memory) => {
                    debug!(job_id, "Loaded job memory from store");
                    memory
                }
                Err(JobMemoryError::NotFound { .. }) => {
                    JobMemory::new(job_id, self.config.clone())?
                }
                Err(e) => return Err(e),
            },
            None => JobMemory::new(job_id, self.config.clone())?,
        };

        Ok(self.insert_if_absent(memory))
    }

    /// Starts a job with a generated id.
    pub fn create(&self) -> JobMemoryResult<JobMemoryHandle> {
        Ok(self.insert_if_absent(JobMemory::create(self.config.clone())?))
    }

    fn insert_if_absent(&self, memory: JobMemory) -> JobMemoryHandle {
        let mut jobs = self.jobs.write();
        jobs.entry(memory.job_id().to_string())
            .or_insert_with(|| JobMemoryHandle::new(memory))
            .clone()
    }

    /// Forgets the job locally; the stored record is kept.
    pub fn evict(&self, job_id: &str) -> Option<JobMemoryHandle> {
        self.jobs.write().remove(job_id)
    }

    /// Persists every open job. Returns the number saved.
    pub async fn checkpoint_all(&self) -> JobMemoryResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };

        let handles: Vec<JobMemoryHandle> = self.jobs.read().values().cloned().collect();
        for handle in &handles {
            handle.checkpoint(store.as_ref()).await?;
        }
        Ok(handles.len())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}
