//! Two-phase saving: the local cache is written synchronously, then the
//! remote store is tried on a detached task. Remote failures are logged and
//! go no further.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::models::Work;
use crate::services::cache::LocalCache;
use crate::services::remote::RemoteStore;
use crate::services::scheduler::{Debounce, Pending};

pub const AUTOSAVE_DELAY: Duration = Duration::from_millis(1500);

pub struct PersistenceCoordinator {
    cache: Arc<dyn LocalCache>,
    remote: Arc<dyn RemoteStore>,
    autosave: Debounce,
    delay: Duration,
    /// The work the outstanding autosave timer will write.
    pending: Arc<Mutex<Pending<Work>>>,
}

fn lock_pending(pending: &Mutex<Pending<Work>>) -> MutexGuard<'_, Pending<Work>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn persist(cache: &Arc<dyn LocalCache>, remote: &Arc<dyn RemoteStore>, work: Work) -> JoinHandle<()> {
    if let Err(err) = cache.put(&work) {
        error!("local cache save failed for {}: {:#}", work.id, err);
    }

    let remote = Arc::clone(remote);
    tokio::spawn(async move {
        match remote.upsert_work(&work).await {
            Ok(()) => debug!(work = %work.id, "saved to server"),
            Err(err) => warn!("server save error (offline mode) for {}: {:#}", work.id, err),
        }
    })
}

impl PersistenceCoordinator {
    pub fn new(cache: Arc<dyn LocalCache>, remote: Arc<dyn RemoteStore>) -> Self {
        Self::with_delay(cache, remote, AUTOSAVE_DELAY)
    }

    pub fn with_delay(cache: Arc<dyn LocalCache>, remote: Arc<dyn RemoteStore>, delay: Duration) -> Self {
        PersistenceCoordinator {
            cache,
            remote,
            autosave: Debounce::new(),
            delay,
            pending: Arc::new(Mutex::new(Pending::default())),
        }
    }

    /// Schedules a save of `work` once edits have been quiet for the delay.
    pub fn auto_save(&mut self, work: &Work) {
        let generation = {
            let mut pending = lock_pending(&self.pending);
            if let Some(previous) = pending.get().filter(|p| p.id != work.id) {
                debug!(work = %previous.id, "dropping pending autosave for another work");
            }
            pending.set(work.clone())
        };

        let pending = Arc::clone(&self.pending);
        let cache = Arc::clone(&self.cache);
        let remote = Arc::clone(&self.remote);
        self.autosave.trigger(self.delay, move || {
            let work = lock_pending(&pending).take_if_current(generation);
            if let Some(work) = work {
                persist(&cache, &remote, work);
            }
        });
    }

    /// Writes `work` locally right away and dispatches the remote save.
    pub fn save_now(&self, work: &Work) -> JoinHandle<()> {
        persist(&self.cache, &self.remote, work.clone())
    }

    /// Cancels the autosave timer and saves whatever it was holding.
    pub fn flush_pending(&mut self) -> Option<JoinHandle<()>> {
        self.autosave.cancel();
        let work = lock_pending(&self.pending).take()?;
        Some(persist(&self.cache, &self.remote, work))
    }

    /// Cancels the autosave timer and forgets the work it was holding.
    pub fn cancel_pending(&mut self) {
        self.autosave.cancel();
        lock_pending(&self.pending).take();
    }

    pub fn pending_work_id(&self) -> Option<String> {
        lock_pending(&self.pending).get().map(|w| w.id.clone())
    }

    /// Fetches every work from the server, falling back to the local cache
    /// when the server cannot be reached.
    pub async fn load_all(&self) -> Vec<Work> {
        match self.remote.list_works().await {
            Ok(works) => {
                info!("loaded {} works from server", works.len());
                if let Err(err) = self.cache.replace_all(&works) {
                    error!("local cache sync failed: {:#}", err);
                }
                works
            }
            Err(err) => {
                warn!("server connection error, falling back to local cache: {:#}", err);
                self.cache.load().unwrap_or_else(|err| {
                    error!("local cache load failed: {:#}", err);
                    Vec::new()
                })
            }
        }
    }

    pub fn delete(&mut self, id: &str) -> JoinHandle<()> {
        if self.pending_work_id().as_deref() == Some(id) {
            self.cancel_pending();
        }
        if let Err(err) = self.cache.remove(id) {
            error!("local cache delete failed for {}: {:#}", id, err);
        }

        let remote = Arc::clone(&self.remote);
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(err) = remote.delete_work(&id).await {
                warn!("server delete error (offline mode) for {}: {:#}", id, err);
            }
        })
    }

    /// Returns the server URL for the image, or `None` when the server is
    /// unavailable and the caller should keep the inline data.
    pub async fn save_image(&self, data: &str) -> Option<String> {
        match self.remote.upload_image(data).await {
            Ok(url) => Some(url),
            Err(err) => {
                warn!("image upload failed, keeping inline data: {:#}", err);
                None
            }
        }
    }
}
