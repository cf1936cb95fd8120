use serde::{Deserialize, Serialize};

use crate::utils::{new_id, now_millis, word_count};

pub const DEFAULT_WORK_TITLE: &str = "Untitled Novel";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub content: String,
}

impl Chapter {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Chapter {
            id: new_id(),
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Which half of a chapter an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterField {
    Title,
    Content,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Illustration {
    pub id: String,
    /// Either a `data:` URI or a URL served by the storage server.
    pub image_url: String,
    pub prompt_snippet: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Work {
    pub id: String,
    pub title: String,
    pub chapters: Vec<Chapter>,
    /// Most recent first.
    #[serde(default)]
    pub illustrations: Vec<Illustration>,
    pub last_modified: i64,
}

impl Work {
    /// A fresh work with a single empty chapter.
    pub fn untitled() -> Self {
        Work {
            id: new_id(),
            title: DEFAULT_WORK_TITLE.to_string(),
            chapters: vec![Chapter::new("Chapter 1", "")],
            illustrations: Vec::new(),
            last_modified: now_millis(),
        }
    }

    pub fn touch(&mut self) {
        self.last_modified = now_millis();
    }

    pub fn chapter_mut(&mut self, chapter_id: &str) -> Option<&mut Chapter> {
        self.chapters.iter_mut().find(|ch| ch.id == chapter_id)
    }

    pub fn word_count(&self) -> usize {
        self.chapters.iter().map(|ch| word_count(&ch.content)).sum()
    }

    pub fn summary(&self) -> WorkSummary {
        WorkSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            last_modified: self.last_modified,
            word_count: self.word_count(),
            illustration_count: self.illustrations.len(),
            cover_url: self.illustrations.first().map(|il| il.image_url.clone()),
        }
    }
}

/// What the library view shows for one work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkSummary {
    pub id: String,
    pub title: String,
    pub last_modified: i64,
    pub word_count: usize,
    pub illustration_count: usize,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSettings {
    pub font_family: String,
    pub font_size: String,
    pub line_height: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        EditorSettings {
            font_family: "font-serif".to_string(),
            font_size: "text-lg".to_string(),
            line_height: "leading-loose".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    FontFamily,
    FontSize,
    LineHeight,
}

impl EditorSettings {
    pub fn set(&mut self, key: SettingKey, value: impl Into<String>) {
        let slot = match key {
            SettingKey::FontFamily => &mut self.font_family,
            SettingKey::FontSize => &mut self.font_size,
            SettingKey::LineHeight => &mut self.line_height,
        };
        *slot = value.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_serializes_with_camel_case_keys() {
        let work = Work::untitled();
        let value = serde_json::to_value(&work).unwrap();
        assert!(value.get("lastModified").is_some());
        assert!(value.get("last_modified").is_none());
        assert_eq!(value["chapters"][0]["title"], "Chapter 1");
    }

    #[test]
    fn missing_illustrations_deserialize_as_empty() {
        let json = r#"{"id":"w1","title":"T","chapters":[{"id":"1","title":"A","content":"x"}],"lastModified":5}"#;
        let work: Work = serde_json::from_str(json).unwrap();
        assert!(work.illustrations.is_empty());
        assert_eq!(work.last_modified, 5);
    }

    #[test]
    fn summary_counts_words_and_picks_latest_cover() {
        let mut work = Work::untitled();
        work.chapters[0].content = "  one two\nthree ".to_string();
        work.chapters.push(Chapter::new("Chapter 2", "four"));
        work.illustrations = vec![
            Illustration {
                id: "b".into(),
                image_url: "newest.png".into(),
                prompt_snippet: "s".into(),
                timestamp: 2,
            },
            Illustration {
                id: "a".into(),
                image_url: "oldest.png".into(),
                prompt_snippet: "s".into(),
                timestamp: 1,
            },
        ];

        let summary = work.summary();
        assert_eq!(summary.word_count, 4);
        assert_eq!(summary.illustration_count, 2);
        assert_eq!(summary.cover_url.as_deref(), Some("newest.png"));
    }

    #[test]
    fn settings_update_one_key() {
        let mut settings = EditorSettings::default();
        settings.set(SettingKey::FontSize, "text-xl");
        assert_eq!(settings.font_size, "text-xl");
        assert_eq!(settings.font_family, "font-serif");
    }
}
