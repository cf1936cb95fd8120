use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error};

use crate::models::Work;
use crate::services::export::to_markdown;
use crate::utils::{decode_image_data, is_valid_work_id, safe_folder_name};

const DATA_FILE: &str = "data.json";

#[derive(Debug, Error)]
#[error("Invalid work id")]
pub struct InvalidWorkId;

fn check_id(id: &str) -> Result<()> {
    if !is_valid_work_id(id) {
        return Err(InvalidWorkId.into());
    }
    Ok(())
}

/// The id half of a `{safe-title}-{id}` folder name. Safe titles never
/// contain `-`, so the first dash is the separator.
fn folder_work_id(dir: &Path) -> Option<&str> {
    let name = dir.file_name()?.to_str()?;
    name.split_once('-').map(|(_, id)| id)
}

/// Works and images on disk: `novels/{safe-title}-{id}/` holds `data.json`
/// and a Markdown copy; `images/` holds uploads named by content hash.
#[derive(Debug, Clone)]
pub struct NovelStore {
    novels_dir: PathBuf,
    images_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub filename: String,
    pub path: PathBuf,
}

impl NovelStore {
    pub async fn open(novels_dir: impl Into<PathBuf>, images_dir: impl Into<PathBuf>) -> Result<Self> {
        let store = NovelStore {
            novels_dir: novels_dir.into(),
            images_dir: images_dir.into(),
        };
        fs::create_dir_all(&store.novels_dir)
            .await
            .with_context(|| format!("creating {}", store.novels_dir.display()))?;
        fs::create_dir_all(&store.images_dir)
            .await
            .with_context(|| format!("creating {}", store.images_dir.display()))?;
        Ok(store)
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    async fn work_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        let mut entries = fs::read_dir(&self.novels_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }

    async fn dirs_for(&self, id: &str) -> Result<Vec<PathBuf>> {
        Ok(self
            .work_dirs()
            .await?
            .into_iter()
            .filter(|dir| folder_work_id(dir) == Some(id))
            .collect())
    }

    /// Every readable work, newest first. Unparseable folders are skipped.
    pub async fn list_works(&self) -> Result<Vec<Work>> {
        let mut works = Vec::new();
        for dir in self.work_dirs().await? {
            let data_path = dir.join(DATA_FILE);
            if !data_path.is_file() {
                continue;
            }
            let parsed = fs::read_to_string(&data_path)
                .await
                .map_err(anyhow::Error::from)
                .and_then(|text| serde_json::from_str::<Work>(&text).map_err(anyhow::Error::from));
            match parsed {
                Ok(work) => works.push(work),
                Err(err) => error!("error reading {}: {:#}", data_path.display(), err),
            }
        }
        works.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(works)
    }

    pub async fn find_work(&self, id: &str) -> Result<Option<Work>> {
        Ok(self.list_works().await?.into_iter().find(|w| w.id == id))
    }

    /// Writes the work and returns its folder. A folder left over from an
    /// earlier title of the same work is removed.
    pub async fn save_work(&self, work: &Work) -> Result<PathBuf> {
        check_id(&work.id)?;
        let safe_title = safe_folder_name(&work.title);
        let work_dir = self.novels_dir.join(format!("{}-{}", safe_title, work.id));

        for stale in self.dirs_for(&work.id).await? {
            if stale != work_dir {
                debug!(work = %work.id, "removing stale folder {}", stale.display());
                fs::remove_dir_all(&stale).await?;
            }
        }

        fs::create_dir_all(&work_dir).await?;
        let data = serde_json::to_string_pretty(work)?;
        fs::write(work_dir.join(DATA_FILE), data)
            .await
            .with_context(|| format!("writing {}", work_dir.display()))?;
        fs::write(work_dir.join(format!("{safe_title}.md")), to_markdown(work)).await?;
        Ok(work_dir)
    }

    /// Returns `false` when no folder belongs to `id`.
    pub async fn delete_work(&self, id: &str) -> Result<bool> {
        check_id(id)?;
        let dirs = self.dirs_for(id).await?;
        for dir in &dirs {
            fs::remove_dir_all(dir).await?;
        }
        Ok(!dirs.is_empty())
    }

    /// Stores the image under the hash of its decoded bytes, so identical
    /// uploads share one file.
    pub async fn save_image(&self, image: &str) -> Result<StoredImage> {
        let decoded = decode_image_data(image);
        let hash = blake3::hash(&decoded.bytes);
        let filename = format!("{}.{}", hash.to_hex(), decoded.extension);
        let path = self.images_dir.join(&filename);
        fs::write(&path, &decoded.bytes)
            .await
            .with_context(|| format!("writing image {}", path.display()))?;
        Ok(StoredImage { filename, path })
    }
}
