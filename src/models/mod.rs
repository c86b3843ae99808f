// Domain models module
// Contains the video scripts loaded from data files

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::config::format::{FormatProfile, VideoFormat};
use crate::errors::{AppError, AppResult};

/// Элемент основной части сценария: строка или список вариантов
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ContentItem {
    Line(String),
    Options(Vec<String>),
}

/// Текст видео на одном языке
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LanguageContent {
    #[serde(default)]
    pub intro: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(default)]
    pub outro: Option<String>,
}

impl LanguageContent {
    /// Строки для синтеза в порядке интро -> контент -> аутро.
    ///
    /// Пустые строки контента (после очистки текста) не озвучиваются.
    /// Интро и аутро обязательны, если профиль отводит им слот.
    pub fn script_lines(&self, format: VideoFormat, profile: &FormatProfile) -> AppResult<Vec<String>> {
        let intro = render_fixed(format, self.intro.as_deref(), "intro", profile.has_intro())?;
        let outro = render_fixed(format, self.outro.as_deref(), "outro", profile.has_outro())?;

        let mut lines = Vec::with_capacity(self.content.len() + 2);
        lines.extend(intro);
        for item in &self.content {
            let line = format.render_item(item)?;
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines.extend(outro);
        Ok(lines)
    }
}

fn render_fixed(
    format: VideoFormat,
    text: Option<&str>,
    section: &str,
    required: bool,
) -> AppResult<Option<String>> {
    let line = match text {
        Some(text) => format.render_item(&ContentItem::Line(text.to_string()))?,
        None => String::new(),
    };
    if !line.is_empty() {
        return Ok(Some(line));
    }
    if required {
        return Err(AppError::Script(format!(
            "{} line is missing or empty but the {} profile has a {} slot",
            section, format, section
        )));
    }
    Ok(None)
}

/// Запись о видео из файла данных
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoEntry {
    pub name: String,
    pub format: String,
    /// Код языка -> текст
    pub content: BTreeMap<String, LanguageContent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DataFile {
    Many(Vec<VideoEntry>),
    One(VideoEntry),
}

/// Загружает и объединяет видео из всех файлов данных.
///
/// Каталоги обходятся рекурсивно, берутся файлы `*.json` в
/// отсортированном порядке.
pub fn load_data_files(paths: &[PathBuf]) -> AppResult<Vec<VideoEntry>> {
    let mut videos = Vec::new();

    for path in paths {
        for file in collect_json_files(path)? {
            let entries = load_data_file(&file)?;
            debug!("Loaded {} video(s) from {}", entries.len(), file.display());
            videos.extend(entries);
        }
    }

    info!("Loaded {} video entries from {} data path(s)", videos.len(), paths.len());
    Ok(videos)
}

fn collect_json_files(path: &Path) -> AppResult<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            AppError::Configuration(format!("Failed to read data directory {}: {}", path.display(), e))
        })?;
        let is_json = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if entry.file_type().is_file() && is_json {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn load_data_file(path: &Path) -> AppResult<Vec<VideoEntry>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::Configuration(format!("Failed to read data file {}: {}", path.display(), e))
    })?;
    let parsed: DataFile = serde_json::from_str(&content).map_err(|e| {
        AppError::Configuration(format!("Error parsing data file {}: {}", path.display(), e))
    })?;

    Ok(match parsed {
        DataFile::Many(entries) => entries,
        DataFile::One(entry) => vec![entry],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(intro: u64, outro: u64) -> FormatProfile {
        FormatProfile {
            intro_duration: intro,
            outro_duration: outro,
            body_segment_duration: 3000,
            intro_initial_silence: 0,
            outro_initial_silence: 0,
            body_initial_silence: 0,
        }
    }

    const QUIZ_JSON: &str = r#"[
        {
            "name": "capitals_1",
            "format": "quiz",
            "content": {
                "en": {
                    "intro": "Guess the capital!",
                    "content": ["France?", ["Paris", "Lyon", "Nice"], ""],
                    "outro": "Follow for more"
                }
            }
        }
    ]"#;

    #[test]
    fn test_script_lines_order_and_empty_lines() {
        let videos: Vec<VideoEntry> = serde_json::from_str(QUIZ_JSON).unwrap();
        let lines = videos[0].content["en"].script_lines(VideoFormat::Quiz, &profile(1000, 1000))
            .unwrap();
        assert_eq!(
            lines,
            vec!["Guess the capital!", "France?", "Paris, Lyon, Nice", "Follow for more"]
        );
    }

    #[test]
    fn test_missing_intro_and_outro() {
        let content = LanguageContent {
            intro: None,
            content: vec![ContentItem::Options(vec!["swim".into(), "run".into()])],
            outro: Some("   ".into()),
        };
        let lines = content
            .script_lines(VideoFormat::WouldYouRather, &profile(0, 0))
            .unwrap();
        assert_eq!(lines, vec!["swim, or run"]);
    }

    #[test]
    fn test_required_intro_and_outro() {
        let content = LanguageContent {
            intro: None,
            content: vec![ContentItem::Line("France?".into()), ContentItem::Line("Paris".into())],
            outro: Some("Bye".into()),
        };
        // без интро первая строка контента не должна занять слот интро
        let error = content.script_lines(VideoFormat::Quiz, &profile(1000, 1000)).unwrap_err();
        assert!(matches!(error, AppError::Script(ref msg) if msg.starts_with("intro line")));

        let blank_outro = LanguageContent {
            intro: Some("Hi".into()),
            outro: Some("<br> ".into()),
            ..content.clone()
        };
        let error = blank_outro
            .script_lines(VideoFormat::Quiz, &profile(1000, 1000))
            .unwrap_err();
        assert!(matches!(error, AppError::Script(ref msg) if msg.starts_with("outro line")));

        // слота нет: отсутствие интро допустимо
        let lines = content.script_lines(VideoFormat::Quiz, &profile(0, 1000)).unwrap();
        assert_eq!(lines, vec!["France?", "Paris", "Bye"]);
    }

    #[test]
    fn test_load_data_files_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), QUIZ_JSON).unwrap();
        std::fs::write(
            dir.path().join("b.json"),
            r#"{"name": "wyr_1", "format": "wyr", "content": {}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let videos = load_data_files(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].name, "capitals_1");
        assert_eq!(videos[1].name, "wyr_1");
    }

    #[test]
    fn test_broken_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let error = load_data_files(&[path]).unwrap_err();
        assert!(matches!(error, AppError::Configuration(_)));
    }
}
