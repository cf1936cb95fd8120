use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::models::Work;

/// The on-device store every save hits first. Operations are synchronous.
pub trait LocalCache: Send + Sync {
    /// All cached works, most recently modified first.
    fn load(&self) -> Result<Vec<Work>>;
    fn replace_all(&self, works: &[Work]) -> Result<()>;
    fn put(&self, work: &Work) -> Result<()>;
    fn remove(&self, id: &str) -> Result<()>;
}

type WorkMap = BTreeMap<String, Work>;

fn sorted(map: WorkMap) -> Vec<Work> {
    let mut works: Vec<Work> = map.into_values().collect();
    works.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    works
}

fn keyed(works: &[Work]) -> WorkMap {
    works.iter().map(|w| (w.id.clone(), w.clone())).collect()
}

/// Caches works as a single JSON object keyed by work id.
#[derive(Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileCache {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read(&self) -> Result<WorkMap> {
        if !self.path.exists() {
            return Ok(WorkMap::new());
        }
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading cache file {}", self.path.display()))?;
        if text.trim().is_empty() {
            return Ok(WorkMap::new());
        }
        serde_json::from_str(&text)
            .with_context(|| format!("parsing cache file {}", self.path.display()))
    }

    fn write(&self, map: &WorkMap) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string(map)?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("writing cache file {}", self.path.display()))
    }

    fn modify(&self, f: impl FnOnce(&mut WorkMap)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut map = self.read()?;
        f(&mut map);
        self.write(&map)
    }
}

impl LocalCache for JsonFileCache {
    fn load(&self) -> Result<Vec<Work>> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.read().map(sorted)
    }

    fn replace_all(&self, works: &[Work]) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.write(&keyed(works))
    }

    fn put(&self, work: &Work) -> Result<()> {
        self.modify(|map| {
            map.insert(work.id.clone(), work.clone());
        })
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.modify(|map| {
            map.remove(id);
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    works: Mutex<WorkMap>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_works(works: &[Work]) -> Self {
        MemoryCache {
            works: Mutex::new(keyed(works)),
        }
    }

    pub fn get(&self, id: &str) -> Option<Work> {
        self.map().get(id).cloned()
    }

    fn map(&self) -> std::sync::MutexGuard<'_, WorkMap> {
        self.works.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LocalCache for MemoryCache {
    fn load(&self) -> Result<Vec<Work>> {
        Ok(sorted(self.map().clone()))
    }

    fn replace_all(&self, works: &[Work]) -> Result<()> {
        *self.map() = keyed(works);
        Ok(())
    }

    fn put(&self, work: &Work) -> Result<()> {
        self.map().insert(work.id.clone(), work.clone());
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.map().remove(id);
        Ok(())
    }
}
