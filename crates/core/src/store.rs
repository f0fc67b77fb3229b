use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::{AssemblyError, Result},
    types::AssetSource,
};

/// Default parent of per-run directories.
pub fn get_root_work_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("threadreel")
        .join("runs")
}

/// Name-keyed byte staging area for one run.
///
/// Backed by a fresh `run-<uuid>` directory so the encoder can address assets by
/// plain file name. The directory is removed when the last clone is dropped.
#[derive(Clone)]
pub struct AssetStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    root: PathBuf,
    http: reqwest::Client,
    keep: AtomicBool,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if self.keep.load(Ordering::Relaxed) {
            debug!(root = %self.root.display(), "keeping run directory");
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            warn!(root = %self.root.display(), "failed to remove run directory: {e}");
        }
    }
}

impl AssetStore {
    /// Create a new, empty run directory under `work_root`.
    pub async fn create_in(work_root: &Path) -> Result<Self> {
        let root = work_root.join(format!("run-{}", Uuid::new_v4()));
        fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "created run directory");

        Ok(Self {
            inner: Arc::new(StoreInner {
                root,
                http: reqwest::Client::new(),
                keep: AtomicBool::new(false),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Leave the run directory on disk when the store is dropped.
    pub fn keep_on_drop(&self) {
        self.inner.keep.store(true, Ordering::Relaxed);
    }

    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.inner.root.join(name))
    }

    pub async fn write(&self, name: &str, bytes: impl AsRef<[u8]>) -> Result<()> {
        let path = self.path_of(name)?;
        fs::write(&path, bytes).await?;
        Ok(())
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AssemblyError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn contains(&self, name: &str) -> bool {
        match self.path_of(name) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn remove(&self, name: &str) -> Result<()> {
        let path = self.path_of(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AssemblyError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Retrieve `source` and store it under `name`.
    pub async fn fetch_and_write(&self, name: &str, source: &AssetSource) -> Result<()> {
        validate_name(name)?;
        let bytes = match source {
            AssetSource::Url(url) => self.fetch_url(url).await?,
            AssetSource::File(path) => fs::read(path)
                .await
                .map_err(|e| AssemblyError::fetch(path.display().to_string(), e))?,
            AssetSource::Bytes(bytes) => bytes.clone(),
        };
        debug!(name, source = %source, len = bytes.len(), "staged asset");
        self.write(name, bytes).await
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .inner
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AssemblyError::fetch(url, e))?
            .error_for_status()
            .map_err(|e| AssemblyError::fetch(url, e))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AssemblyError::fetch(url, e))?;
        Ok(bytes.to_vec())
    }
}

fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');

    if invalid {
        return Err(AssemblyError::InvalidAssetName {
            name: name.to_string(),
        });
    }
    Ok(())
}
