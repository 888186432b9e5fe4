//! Durable storage for [`JobMemoryRecord`]s.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::error::{JobMemoryError, JobMemoryResult};
use super::types::{JobMemoryRecord, SCHEMA_VERSION};

const JSON_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";
const MAX_JOB_ID_LEN: usize = 128;

#[async_trait]
/// Versioned job records keyed by job id.
pub trait JobMemoryStore: Send + Sync {
    async fn save(&self, record: &JobMemoryRecord) -> JobMemoryResult<()>;

    async fn load(&self, job_id: &str) -> JobMemoryResult<JobMemoryRecord>;

    async fn delete(&self, job_id: &str) -> JobMemoryResult<()>;

    async fn exists(&self, job_id: &str) -> JobMemoryResult<bool>;
}

/// Job ids double as file names: ASCII alphanumerics, `-`, `_` and `.`, not leading
/// with `.`.
pub fn validate_job_id(job_id: &str) -> JobMemoryResult<()> {
    let valid = !job_id.is_empty()
        && job_id.len() <= MAX_JOB_ID_LEN
        && !job_id.starts_with('.')
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(JobMemoryError::InvalidJobId {
            job_id: job_id.to_string(),
        })
    }
}

fn ensure_finite(record: &JobMemoryRecord) -> JobMemoryResult<()> {
    match record.non_finite_field() {
        Some(field) => Err(JobMemoryError::NonFiniteValue {
            job_id: record.job_id.clone(),
            field,
        }),
        None => Ok(()),
    }
}

fn decode(bytes: &[u8]) -> JobMemoryResult<JobMemoryRecord> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    let found = value
        .get("schema_version")
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0);

    if found == 0 || found > SCHEMA_VERSION {
        return Err(JobMemoryError::UnsupportedSchema {
            found,
            supported: SCHEMA_VERSION,
        });
    }

    Ok(serde_json::from_value(value)?)
}

#[derive(Debug, Clone)]
/// One pretty-printed JSON file per job under `root`.
pub struct FileJobStore {
    root: PathBuf,
}

impl FileJobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, job_id: &str) -> PathBuf {
        self.root.join(format!("{job_id}.{JSON_EXTENSION}"))
    }

    fn temp_path(&self, job_id: &str) -> PathBuf {
        self.root.join(format!("{job_id}.{TEMP_EXTENSION}"))
    }

    /// Lists job ids with a stored record.
    pub async fn list_jobs(&self) -> JobMemoryResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(JobMemoryError::io(&self.root, e)),
        };

        let mut jobs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| JobMemoryError::io(&self.root, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(JSON_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                jobs.push(stem.to_string());
            }
        }

        jobs.sort();
        Ok(jobs)
    }
}

#[async_trait]
impl JobMemoryStore for FileJobStore {
    async fn save(&self, record: &JobMemoryRecord) -> JobMemoryResult<()> {
        validate_job_id(&record.job_id)?;
        ensure_finite(record)?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| JobMemoryError::io(&self.root, e))?;

        let bytes = serde_json::to_vec_pretty(record)?;
        let temp_path = self.temp_path(&record.job_id);
        let final_path = self.record_path(&record.job_id);

        {
            let mut file = tokio::fs::File::create(&temp_path)
                .await
                .map_err(|e| JobMemoryError::io(&temp_path, e))?;
            file.write_all(&bytes)
                .await
                .map_err(|e| JobMemoryError::io(&temp_path, e))?;
            file.sync_all()
                .await
                .map_err(|e| JobMemoryError::io(&temp_path, e))?;
        }

        tokio::fs::rename(&temp_path, &final_path)
            .await
            .map_err(|e| JobMemoryError::io(&final_path, e))?;

        debug!(job_id = %record.job_id, path = %final_path.display(), "Persisted job memory");
        Ok(())
    }

    async fn load(&self, job_id: &str) -> JobMemoryResult<JobMemoryRecord> {
        validate_job_id(job_id)?;
        let path = self.record_path(job_id);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(JobMemoryError::NotFound {
                    job_id: job_id.to_string(),
                });
            }
            Err(e) => return Err(JobMemoryError::io(&path, e)),
        };

        decode(&bytes)
    }

    async fn delete(&self, job_id: &str) -> JobMemoryResult<()> {
        validate_job_id(job_id)?;
        let path = self.record_path(job_id);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(JobMemoryError::NotFound {
                job_id: job_id.to_string(),
            }),
            Err(e) => Err(JobMemoryError::io(&path, e)),
        }
    }

    async fn exists(&self, job_id: &str) -> JobMemoryResult<bool> {
        validate_job_id(job_id)?;
        let path = self.record_path(job_id);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| JobMemoryError::io(&path, e))
    }
}

/// Keeps records as serialized JSON so round trips go through the same encoding as
/// [`FileJobStore`].
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    records: RwLock<HashMap<String, String>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl JobMemoryStore for InMemoryJobStore {
    async fn save(&self, record: &JobMemoryRecord) -> JobMemoryResult<()> {
        validate_job_id(&record.job_id)?;
        ensure_finite(record)?;
        let json = serde_json::to_string(record)?;
        self.records.write().insert(record.job_id.clone(), json);
        Ok(())
    }

    async fn load(&self, job_id: &str) -> JobMemoryResult<JobMemoryRecord> {
        let json = self.records.read().get(job_id).cloned();
        match json {
            Some(json) => decode(json.as_bytes()),
            None => Err(JobMemoryError::NotFound {
                job_id: job_id.to_string(),
            }),
        }
    }

    async fn delete(&self, job_id: &str) -> JobMemoryResult<()> {
        match self.records.write().remove(job_id) {
            Some(_) => Ok(()),
            None => Err(JobMemoryError::NotFound {
                job_id: job_id.to_string(),
            }),
        }
    }

    async fn exists(&self, job_id: &str) -> JobMemoryResult<bool> {
        Ok(self.records.read().contains_key(job_id))
    }
}
