//! Saga instance persistence backends
//!
//! The dispatcher talks to storage through [`SagaRepository`]; the crate
//! ships an in-memory backend and a filesystem backend that keeps one JSON
//! file per instance under a base directory with a write-through cache.

use std::path::{Path, PathBuf};

use crate::correlation::CorrelationRule;
use crate::error::{Result, SagaError};
use crate::instance::{SagaData, SagaId, SagaInstance};

/// Storage backend for saga instances
pub trait SagaRepository<D: SagaData>: Send + Sync {
    /// List every stored instance
    fn find_all(&self) -> Result<Vec<SagaInstance<D>>>;

    /// Look up an instance by its identity
    fn find_by_id(&self, id: &SagaId) -> Result<Option<SagaInstance<D>>>;

    /// Look up the instance whose data carries the given correlation key
    ///
    /// The default implementation scans [`find_all`](SagaRepository::find_all);
    /// indexed backends can override it.
    fn find_by_key(
        &self,
        rule: &CorrelationRule<D>,
        key: &str,
    ) -> Result<Option<SagaInstance<D>>> {
        Ok(self
            .find_all()?
            .into_iter()
            .find(|instance| rule.matches(instance, key)))
    }

    /// Store or overwrite an instance
    fn save(&self, instance: &SagaInstance<D>) -> Result<()>;

    /// Delete an instance
    fn remove(&self, id: &SagaId) -> Result<()>;
}

/// In-memory saga instance repository
pub struct MemorySagaRepository<D: SagaData> {
    instances: dashmap::DashMap<SagaId, SagaInstance<D>>,
}

impl<D: SagaData> MemorySagaRepository<D> {
    /// Create an empty in-memory repository
    pub fn new() -> Self {
        Self {
            instances: dashmap::DashMap::new(),
        }
    }
}

impl<D: SagaData> Default for MemorySagaRepository<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: SagaData> SagaRepository<D> for MemorySagaRepository<D> {
    fn find_all(&self) -> Result<Vec<SagaInstance<D>>> {
        Ok(self
            .instances
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn find_by_id(&self, id: &SagaId) -> Result<Option<SagaInstance<D>>> {
        Ok(self.instances.get(id).map(|entry| entry.value().clone()))
    }

    fn save(&self, instance: &SagaInstance<D>) -> Result<()> {
        self.instances.insert(instance.id, instance.clone());
        Ok(())
    }

    fn remove(&self, id: &SagaId) -> Result<()> {
        self.instances
            .remove(id)
            .ok_or_else(|| SagaError::Storage(format!("saga instance not stored: {id}")))?;
        Ok(())
    }
}

/// File system saga instance repository
///
/// One `instance.json` per instance under `<base>/instances/<id>/`, with a
/// write-through cache reloaded from disk at construction.
pub struct FileSystemSagaRepository<D: SagaData> {
    base_path: PathBuf,
    cache: dashmap::DashMap<SagaId, SagaInstance<D>>,
}

impl<D: SagaData> FileSystemSagaRepository<D> {
    /// Open a repository rooted at `base_path`, creating it if needed
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        if !base_path.exists() {
            std::fs::create_dir_all(&base_path)?;
        }

        let repository = Self {
            base_path,
            cache: dashmap::DashMap::new(),
        };
        repository.reload_cache()?;

        Ok(repository)
    }

    /// Reload the cache from disk
    pub fn reload_cache(&self) -> Result<()> {
        self.cache.clear();

        let instances_dir = self.instances_dir();
        if !instances_dir.exists() {
            std::fs::create_dir_all(&instances_dir)?;
        }

        for entry in walkdir::WalkDir::new(&instances_dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.file_name().and_then(|s| s.to_str()) != Some("instance.json")
            {
                continue;
            }
            // Unreadable or stale-format files are skipped, not fatal
            if let Ok(content) = std::fs::read_to_string(path) {
                match serde_json::from_str::<SagaInstance<D>>(&content) {
                    Ok(instance) => {
                        self.cache.insert(instance.id, instance);
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unparsable saga instance file");
                    }
                }
            }
        }

        Ok(())
    }

    fn instances_dir(&self) -> PathBuf {
        self.base_path.join("instances")
    }

    fn instance_dir(&self, id: &SagaId) -> PathBuf {
        self.instances_dir().join(id.to_string())
    }

    fn instance_path(&self, id: &SagaId) -> PathBuf {
        self.instance_dir(id).join("instance.json")
    }
}

impl<D: SagaData> SagaRepository<D> for FileSystemSagaRepository<D> {
    fn find_all(&self) -> Result<Vec<SagaInstance<D>>> {
        Ok(self
            .cache
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn find_by_id(&self, id: &SagaId) -> Result<Option<SagaInstance<D>>> {
        if let Some(instance) = self.cache.get(id) {
            return Ok(Some(instance.clone()));
        }

        let path = self.instance_path(id);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        let instance: SagaInstance<D> = serde_json::from_str(&content)?;
        self.cache.insert(*id, instance.clone());

        Ok(Some(instance))
    }

    fn save(&self, instance: &SagaInstance<D>) -> Result<()> {
        let dir = self.instance_dir(&instance.id);
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }

        let content = serde_json::to_string_pretty(instance)?;
        std::fs::write(self.instance_path(&instance.id), content)?;

        self.cache.insert(instance.id, instance.clone());
        Ok(())
    }

    fn remove(&self, id: &SagaId) -> Result<()> {
        let dir = self.instance_dir(id);
        if !dir.exists() {
            return Err(SagaError::Storage(format!("saga instance not stored: {id}")));
        }

        std::fs::remove_dir_all(dir)?;
        self.cache.remove(id);
        Ok(())
    }
}
