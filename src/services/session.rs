//! The editing session: owns the work list, tracks which work is open, and
//! routes every mutation through history and autosave.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{ClientConfig, GeneratorConfig};
use crate::models::{
    Chapter, ChapterField, EditorSettings, Illustration, SettingKey, Work, WorkSummary,
};
use crate::services::cache::JsonFileCache;
use crate::services::export;
use crate::services::history::HistoryManager;
use crate::services::llm::{self, ContentGenerator, GenerationError, LLMClient};
use crate::services::persistence::PersistenceCoordinator;
use crate::services::remote::HttpRemoteStore;
use crate::utils::{new_id, now_millis};

pub struct SessionController {
    works: Vec<Work>,
    active: Option<String>,
    history: HistoryManager,
    persistence: PersistenceCoordinator,
    generator: Arc<dyn ContentGenerator>,
    settings: EditorSettings,
    /// Whatever text was last selected in any chapter surface.
    selection: String,
}

impl SessionController {
    pub fn new(persistence: PersistenceCoordinator, generator: Arc<dyn ContentGenerator>) -> Self {
        Self::with_history(persistence, generator, HistoryManager::new())
    }

    /// A session backed by a JSON cache file, the HTTP storage server and
    /// the HTTP generator.
    pub fn from_config(client: &ClientConfig, generator: &GeneratorConfig) -> Self {
        let persistence = PersistenceCoordinator::with_delay(
            Arc::new(JsonFileCache::new(client.cache_file.clone())),
            Arc::new(HttpRemoteStore::new(client.api_url.clone())),
            client.autosave_delay,
        );
        Self::new(persistence, Arc::new(LLMClient::new(generator)))
    }

    pub fn with_history(
        persistence: PersistenceCoordinator,
        generator: Arc<dyn ContentGenerator>,
        history: HistoryManager,
    ) -> Self {
        SessionController {
            works: Vec::new(),
            active: None,
            history,
            persistence,
            generator,
            settings: EditorSettings::default(),
            selection: String::new(),
        }
    }

    pub async fn load(&mut self) -> &[Work] {
        self.works = self.persistence.load_all().await;
        if let Some(id) = self.active.clone() {
            if !self.works.iter().any(|w| w.id == id) {
                self.leave_work();
            }
        }
        &self.works
    }

    pub fn works(&self) -> &[Work] {
        &self.works
    }

    /// Library cards, most recently modified first.
    pub fn library(&self) -> Vec<WorkSummary> {
        let mut summaries: Vec<WorkSummary> = self.works.iter().map(Work::summary).collect();
        summaries.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        summaries
    }

    pub fn active_work_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_work(&self) -> Option<&Work> {
        let id = self.active.as_deref()?;
        self.works.iter().find(|w| w.id == id)
    }

    fn active_work_mut(&mut self) -> Option<&mut Work> {
        let id = self.active.as_deref()?;
        self.works.iter_mut().find(|w| w.id == id)
    }

    pub fn active_chapters(&self) -> Option<&[Chapter]> {
        self.active_work().map(|w| w.chapters.as_slice())
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn update_settings(&mut self, key: SettingKey, value: impl Into<String>) {
        self.settings.set(key, value);
    }

    pub fn selection(&self) -> &str {
        &self.selection
    }

    pub fn set_selection(&mut self, text: impl Into<String>) {
        self.selection = text.into();
    }

    pub fn select_work(&mut self, id: &str) -> bool {
        let Some(work) = self.works.iter().find(|w| w.id == id) else {
            return false;
        };
        let chapters = work.chapters.clone();

        self.persistence.flush_pending();
        self.history.reset(&chapters);
        self.active = Some(id.to_string());
        self.selection.clear();
        info!(work = %id, "opened work");
        true
    }

    pub fn leave_work(&mut self) {
        self.persistence.flush_pending();
        self.history.clear();
        self.selection.clear();
        if let Some(id) = self.active.take() {
            info!(work = %id, "closed work");
        }
    }

    /// Creates, persists and opens a new empty work.
    pub fn create_work(&mut self) -> String {
        let work = Work::untitled();
        let id = work.id.clone();
        self.persistence.save_now(&work);
        self.works.insert(0, work);
        self.select_work(&id);
        id
    }

    pub fn delete_work(&mut self, id: &str) -> bool {
        let before = self.works.len();
        self.works.retain(|w| w.id != id);
        if self.works.len() == before {
            return false;
        }

        if self.active.as_deref() == Some(id) {
            self.active = None;
            self.history.clear();
            self.selection.clear();
        }
        self.persistence.delete(id);
        info!(work = %id, "deleted work");
        true
    }

    /// Touches the active work and schedules its autosave.
    fn after_mutation(&mut self) {
        let Some(work) = self.active_work_mut() else {
            return;
        };
        work.touch();
        let snapshot = work.clone();
        self.persistence.auto_save(&snapshot);
    }

    pub fn update_work_title(&mut self, title: impl Into<String>) -> bool {
        let Some(work) = self.active_work_mut() else {
            return false;
        };
        work.title = title.into();
        self.after_mutation();
        true
    }

    pub fn update_chapter(&mut self, chapter_id: &str, field: ChapterField, value: impl Into<String>) -> bool {
        let Some(work) = self.active_work_mut() else {
            return false;
        };
        let Some(chapter) = work.chapter_mut(chapter_id) else {
            return false;
        };
        match field {
            ChapterField::Title => chapter.title = value.into(),
            ChapterField::Content => chapter.content = value.into(),
        }

        let chapters = work.chapters.clone();
        self.history.record_change(&chapters);
        self.after_mutation();
        true
    }

    pub fn add_chapter(&mut self) -> Option<String> {
        let work = self.active_work_mut()?;
        let chapter = Chapter::new(format!("Chapter {}", work.chapters.len() + 1), "");
        let id = chapter.id.clone();
        work.chapters.push(chapter);

        let chapters = work.chapters.clone();
        self.history.record_structural_change(&chapters);
        self.after_mutation();
        Some(id)
    }

    /// Refused when `chapter_id` is unknown or is the work's last chapter.
    pub fn delete_chapter(&mut self, chapter_id: &str) -> bool {
        let Some(work) = self.active_work_mut() else {
            return false;
        };
        if work.chapters.len() <= 1 {
            return false;
        }
        let before = work.chapters.len();
        work.chapters.retain(|ch| ch.id != chapter_id);
        if work.chapters.len() == before {
            return false;
        }

        let chapters = work.chapters.clone();
        self.history.record_structural_change(&chapters);
        self.after_mutation();
        true
    }

    fn restore(&mut self, chapters: Vec<Chapter>) -> bool {
        let Some(work) = self.active_work_mut() else {
            return false;
        };
        work.chapters = chapters;
        self.after_mutation();
        true
    }

    pub fn undo(&mut self) -> bool {
        if self.active.is_none() {
            return false;
        }
        match self.history.undo() {
            Some(chapters) => self.restore(chapters),
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        if self.active.is_none() {
            return false;
        }
        match self.history.redo() {
            Some(chapters) => self.restore(chapters),
            None => false,
        }
    }

    pub fn export_markdown(&self) -> Option<String> {
        self.active_work().map(export::to_markdown)
    }

    pub fn export_epub(&self) -> anyhow::Result<Option<Vec<u8>>> {
        self.active_work().map(export::to_epub).transpose()
    }

    /// Illustrates the current selection and prepends it to the open work.
    pub async fn generate_illustration(&mut self) -> Result<Illustration, GenerationError> {
        if self.active.is_none() {
            return Err(GenerationError::NoActiveWork);
        }
        let snippet = self.selection.clone();
        llm::validate_snippet(&snippet)?;

        let generator = Arc::clone(&self.generator);
        let image_data = generator.generate_illustration(&snippet).await?;
        let uploaded = self.persistence.save_image(&image_data).await;
        let image_url = uploaded.unwrap_or(image_data);

        let illustration = Illustration {
            id: new_id(),
            image_url,
            prompt_snippet: snippet,
            timestamp: now_millis(),
        };
        let work = self.active_work_mut().ok_or(GenerationError::NoActiveWork)?;
        work.illustrations.insert(0, illustration.clone());
        self.after_mutation();
        debug!(illustration = %illustration.id, "added illustration");
        Ok(illustration)
    }

    /// Asks the generator for a title and applies it like a typed edit.
    pub async fn generate_chapter_title(&mut self, chapter_id: &str) -> Result<String, GenerationError> {
        let work = self.active_work().ok_or(GenerationError::NoActiveWork)?;
        let content = work
            .chapters
            .iter()
            .find(|ch| ch.id == chapter_id)
            .map(|ch| ch.content.clone())
            .ok_or(GenerationError::UnknownChapter)?;
        llm::validate_title_content(&content)?;

        let generator = Arc::clone(&self.generator);
        let title = generator.generate_chapter_title(&content).await?;
        self.update_chapter(chapter_id, ChapterField::Title, title.clone());
        Ok(title)
    }
}
