#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use novelist::models::{Chapter, Work};
use novelist::services::cache::{LocalCache, MemoryCache};
use novelist::services::llm::{ContentGenerator, GenerationError};
use novelist::services::persistence::PersistenceCoordinator;
use novelist::services::remote::RemoteStore;
use novelist::services::session::SessionController;

pub const AUTOSAVE: Duration = Duration::from_millis(1500);

/// In-memory stand-in for the storage server that can be switched offline.
#[derive(Default)]
pub struct FakeRemote {
    online: AtomicBool,
    works: Mutex<Vec<Work>>,
    upserts: Mutex<Vec<Work>>,
    deletes: Mutex<Vec<String>>,
    /// When set, each upsert records whether this cache already held the work.
    watch: Option<Arc<MemoryCache>>,
    cache_had_work: Mutex<Vec<bool>>,
}

impl FakeRemote {
    pub fn online() -> Self {
        let remote = FakeRemote::default();
        remote.set_online(true);
        remote
    }

    pub fn offline() -> Self {
        FakeRemote::default()
    }

    pub fn watching(cache: Arc<MemoryCache>, online: bool) -> Self {
        let remote = FakeRemote {
            watch: Some(cache),
            ..FakeRemote::default()
        };
        remote.set_online(online);
        remote
    }

    pub fn with_works(self, works: Vec<Work>) -> Self {
        *self.works.lock().unwrap() = works;
        self
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn upserts(&self) -> Vec<Work> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn upserts_of(&self, id: &str) -> usize {
        self.upserts().iter().filter(|w| w.id == id).count()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn cache_had_work(&self) -> Vec<bool> {
        self.cache_had_work.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        if !self.online.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn list_works(&self) -> Result<Vec<Work>> {
        self.check()?;
        Ok(self.works.lock().unwrap().clone())
    }

    async fn upsert_work(&self, work: &Work) -> Result<()> {
        if let Some(cache) = &self.watch {
            let held = cache.get(&work.id).as_ref() == Some(work);
            self.cache_had_work.lock().unwrap().push(held);
        }
        self.check()?;
        self.upserts.lock().unwrap().push(work.clone());
        let mut works = self.works.lock().unwrap();
        works.retain(|w| w.id != work.id);
        works.push(work.clone());
        Ok(())
    }

    async fn delete_work(&self, id: &str) -> Result<()> {
        self.check()?;
        self.deletes.lock().unwrap().push(id.to_string());
        self.works.lock().unwrap().retain(|w| w.id != id);
        Ok(())
    }

    async fn upload_image(&self, _data: &str) -> Result<String> {
        self.check()?;
        Ok("http://localhost:3001/images/abc.png".to_string())
    }
}

pub const FAKE_IMAGE: &str = "data:image/png;base64,aGVsbG8=";

#[derive(Default)]
pub struct FakeGenerator {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn failing() -> Self {
        FakeGenerator {
            fail: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<(), GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(GenerationError::InvalidResponse("model unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentGenerator for FakeGenerator {
    async fn generate_illustration(&self, _snippet: &str) -> Result<String, GenerationError> {
        self.begin()?;
        Ok(FAKE_IMAGE.to_string())
    }

    async fn generate_chapter_title(&self, _content: &str) -> Result<String, GenerationError> {
        self.begin()?;
        Ok("The Violet Beam".to_string())
    }
}

pub fn work_with(id: &str, chapters: Vec<Chapter>) -> Work {
    Work {
        id: id.to_string(),
        title: format!("Work {id}"),
        chapters,
        illustrations: Vec::new(),
        last_modified: 1,
    }
}

pub fn chapter(id: &str, title: &str, content: &str) -> Chapter {
    Chapter {
        id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
    }
}

pub struct Harness {
    pub session: SessionController,
    pub cache: Arc<MemoryCache>,
    pub remote: Arc<FakeRemote>,
    pub generator: Arc<FakeGenerator>,
}

impl Harness {
    pub fn new(cached: &[Work], remote: FakeRemote, generator: FakeGenerator) -> Self {
        let cache = Arc::new(MemoryCache::with_works(cached));
        let remote = Arc::new(remote);
        let generator = Arc::new(generator);
        let persistence = PersistenceCoordinator::with_delay(
            cache.clone() as Arc<dyn LocalCache>,
            remote.clone() as Arc<dyn RemoteStore>,
            AUTOSAVE,
        );
        let session = SessionController::new(persistence, generator.clone() as Arc<dyn ContentGenerator>);
        Harness {
            session,
            cache,
            remote,
            generator,
        }
    }

    /// A loaded, offline session with the given works cached locally.
    pub async fn offline(cached: &[Work]) -> Self {
        let mut harness = Harness::new(cached, FakeRemote::offline(), FakeGenerator::default());
        harness.session.load().await;
        harness
    }

    pub fn chapters(&self) -> Vec<Chapter> {
        self.session.active_chapters().unwrap_or_default().to_vec()
    }
}

/// Lets paused time run past `delay` and the tasks it wakes finish.
pub async fn settle(delay: Duration) {
    tokio::time::sleep(delay + Duration::from_millis(100)).await;
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }
}
