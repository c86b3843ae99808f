// Configuration module
// Centralized management of application configuration

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use log::{debug, info};
use path_clean::PathClean;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

pub mod format;

pub use format::{FormatCatalog, FormatProfile, VideoFormat, load_format_profile};

/// Путь или список путей
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(path) => vec![path.clone()],
            OneOrMany::Many(paths) => paths.clone(),
        }
    }
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

/// Формат экспортируемого файла
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Wav,
    #[default]
    Mp3,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
        }
    }
}

/// Поведение при ошибке одного из запросов синтеза
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Первая ошибка отменяет остальные запросы единицы
    #[default]
    AbortUnit,
    /// Все запросы выполняются, ошибки собираются в одну
    ReportAll,
}

/// Настройки TTS
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TtsSettings {
    pub model: String,
    pub speed: f32,
    pub max_concurrent_requests: usize,
    pub cache_dir: Option<PathBuf>,
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            model: "tts-1".to_string(),
            speed: 1.0,
            max_concurrent_requests: 5,
            cache_dir: None,
        }
    }
}

/// Настройки выходного аудио
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioSettings {
    /// Частота дискретизации итогового трека
    pub sample_rate: u32,
    pub export_format: ExportFormat,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            export_format: ExportFormat::default(),
        }
    }
}

/// Настройки пакетной обработки
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchSettings {
    /// Сколько пар (видео, язык) обрабатывается одновременно
    pub max_concurrent_units: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_concurrent_units: 2,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Содержимое config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Код языка -> голос TTS
    #[serde(default)]
    pub voices: BTreeMap<String, String>,
    #[serde(default)]
    pub data_file_paths: OneOrMany,
    #[serde(default = "default_video_format_path")]
    pub video_format_path: String,
    #[serde(default)]
    pub export_dirs: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub default_export_dirs: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub tts: TtsSettings,
    #[serde(default)]
    pub audio: AudioSettings,
    #[serde(default)]
    pub batch: BatchSettings,
    /// Каталог файла конфигурации, от него разрешаются относительные пути
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_video_format_path() -> String {
    "video_format.json".to_string()
}

/// Каталоги экспорта по типам результата
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDirs {
    pub video: Vec<PathBuf>,
    pub image: Vec<PathBuf>,
    pub audio: Vec<PathBuf>,
}

const EXPORT_KEYS: [&str; 3] = ["video", "image", "audio"];

impl AppConfig {
    /// Загружает config.json
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Configuration(format!(
                "Configuration file not found at {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: AppConfig = serde_json::from_str(&content).map_err(|e| {
            AppError::Configuration(format!("Error parsing the configuration file: {}", e))
        })?;

        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.validate()?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        if self.audio.sample_rate == 0 {
            errors.push("audio.sample_rate must be positive".to_string());
        }
        if self.tts.max_concurrent_requests == 0 {
            errors.push("tts.max_concurrent_requests must be positive".to_string());
        }
        if self.batch.max_concurrent_units == 0 {
            errors.push("batch.max_concurrent_units must be positive".to_string());
        }
        if !(0.25..=4.0).contains(&self.tts.speed) {
            errors.push(format!("tts.speed must be within 0.25..=4.0, got {}", self.tts.speed));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Configuration(errors.join("\n")))
        }
    }

    /// Разрешает путь относительно каталога конфигурации
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf().clean()
        } else {
            self.base_dir.join(path).clean()
        }
    }

    pub fn video_format_file(&self) -> PathBuf {
        self.resolve_path(&self.video_format_path)
    }

    pub fn data_files(&self) -> Vec<PathBuf> {
        self.data_file_paths
            .to_vec()
            .iter()
            .map(|path| self.resolve_path(path))
            .collect()
    }

    pub fn tts_cache_dir(&self) -> Option<PathBuf> {
        self.tts
            .cache_dir
            .as_ref()
            .map(|dir| self.resolve_path(&dir.to_string_lossy()))
    }

    /// Объединяет `export_dirs` и `default_export_dirs` и проверяет результат.
    ///
    /// `export_dirs` имеет приоритет. Все проблемы собираются в одну ошибку.
    pub fn export_dirs(&self) -> AppResult<ExportDirs> {
        let mut merged = self.default_export_dirs.clone();
        merged.extend(self.export_dirs.clone());

        let mut errors = Vec::new();

        let mut unexpected: Vec<&str> = merged
            .keys()
            .map(String::as_str)
            .filter(|key| !EXPORT_KEYS.contains(key))
            .collect();
        unexpected.sort_unstable();
        if !unexpected.is_empty() {
            errors.push(format!(
                "Unexpected keys in 'export_dirs' / 'default_export_dirs': {}",
                unexpected.join(", ")
            ));
        }

        let missing: Vec<&str> = EXPORT_KEYS
            .into_iter()
            .filter(|key| !merged.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            errors.push(format!(
                "Missing required keys in 'export_dirs' / 'default_export_dirs': {}",
                missing.join(", ")
            ));
        }

        let mut resolved: HashMap<&str, Vec<PathBuf>> = HashMap::new();
        for key in EXPORT_KEYS {
            let Some(value) = merged.get(key) else {
                continue;
            };
            match serde_json::from_value::<OneOrMany>(value.clone()) {
                Ok(paths) if !paths.to_vec().is_empty() => {
                    resolved.insert(
                        key,
                        paths.to_vec().iter().map(|p| self.resolve_path(p)).collect(),
                    );
                }
                _ => errors.push(format!(
                    "Invalid value for '{}': must be a string or a non-empty list of strings representing directory paths.",
                    key
                )),
            }
        }

        if !errors.is_empty() {
            return Err(AppError::Configuration(errors.join("\n")));
        }

        let mut take = |key: &str| resolved.remove(key).unwrap_or_default();
        Ok(ExportDirs {
            video: take("video"),
            image: take("image"),
            audio: take("audio"),
        })
    }
}

impl ExportDirs {
    /// Создаёт все каталоги экспорта
    pub fn ensure_exist(&self) -> AppResult<()> {
        for dir in self.video.iter().chain(&self.image).chain(&self.audio) {
            std::fs::create_dir_all(dir)?;
            debug!("Export directory ready: {}", dir.display());
        }
        Ok(())
    }
}
