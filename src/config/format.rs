//! Профили форматов видео
//!
//! Каждый формат (quiz, wyr, ...) описывается одинаковой схемой из шести
//! числовых полей. Профиль загружается один раз на формат и проверяется
//! целиком: все ошибки полей собираются в одну ошибку конфигурации.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AppError, AppResult};
use crate::models::ContentItem;

/// Доступные форматы видео
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VideoFormat {
    #[serde(rename = "quiz")]
    Quiz,
    #[serde(rename = "wyr")]
    WouldYouRather,
}

impl VideoFormat {
    pub const ALL: [VideoFormat; 2] = [VideoFormat::Quiz, VideoFormat::WouldYouRather];

    /// Формат по имени из файла данных
    pub fn from_name(name: &str) -> AppResult<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.config_key() == name.trim())
            .ok_or_else(|| AppError::Configuration(format!("Unsupported video format: {}", name)))
    }

    /// Ключ секции в файле конфигурации форматов
    pub fn config_key(&self) -> &'static str {
        match self {
            VideoFormat::Quiz => "quiz",
            VideoFormat::WouldYouRather => "wyr",
        }
    }

    /// Превращает элемент сценария в строку для озвучивания.
    ///
    /// Quiz: варианты ответа перечисляются через запятую.
    /// WYR: ровно два варианта, "A, or B".
    pub fn render_item(&self, item: &ContentItem) -> AppResult<String> {
        let line = match (self, item) {
            (_, ContentItem::Line(text)) => text.clone(),
            (VideoFormat::Quiz, ContentItem::Options(options)) => options.join(", "),
            (VideoFormat::WouldYouRather, ContentItem::Options(options)) => {
                match options.as_slice() {
                    [first, second] => format!("{}, or {}", first.trim(), second.trim()),
                    _ => {
                        return Err(AppError::Script(format!(
                            "would-you-rather item needs exactly 2 options, got {}",
                            options.len()
                        )));
                    }
                }
            }
        };
        Ok(prepare_text_for_tts(&line))
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Подготовка текста для TTS: HTML-теги, сущности, пробелы
pub fn prepare_text_for_tts(text: &str) -> String {
    let text = HTML_TAG.replace_all(text, "");

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");

    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Профиль длительностей формата (все значения в миллисекундах)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatProfile {
    pub intro_duration: u64,
    pub outro_duration: u64,
    pub body_segment_duration: u64,
    pub intro_initial_silence: u64,
    pub outro_initial_silence: u64,
    pub body_initial_silence: u64,
}

impl FormatProfile {
    pub fn has_intro(&self) -> bool {
        self.intro_duration > 0
    }

    pub fn has_outro(&self) -> bool {
        self.outro_duration > 0
    }

    /// Количество фиксированных слотов (интро + аутро)
    pub fn fixed_slots(&self) -> usize {
        usize::from(self.has_intro()) + usize::from(self.has_outro())
    }
}

/// Поля профиля: (ключ в JSON, допустимые синонимы)
const PROFILE_FIELDS: [(&str, &[&str]); 6] = [
    ("intro_duration", &[]),
    ("outro_duration", &[]),
    ("video_segment_duration", &["body_segment_duration"]),
    ("intro_initial_silence", &[]),
    ("outro_initial_silence", &[]),
    ("video_segment_initial_silence", &["body_initial_silence"]),
];

/// Загружает и проверяет профиль формата из уже разобранного JSON.
///
/// Либо возвращает полный профиль, либо одну ошибку конфигурации со
/// списком всех проблем.
pub fn load_format_profile(config: &Value, format: VideoFormat) -> AppResult<FormatProfile> {
    let section = config
        .get(format.config_key())
        .and_then(Value::as_object)
        .filter(|section| !section.is_empty())
        .ok_or_else(|| {
            AppError::Configuration(format!(
                "{} configuration section is missing in the configuration file",
                format.config_key()
            ))
        })?;

    let mut errors = Vec::new();
    let mut values = [0u64; 6];

    for (slot, (field, aliases)) in values.iter_mut().zip(PROFILE_FIELDS) {
        let value = std::iter::once(field)
            .chain(aliases.iter().copied())
            .find_map(|key| section.get(key))
            .filter(|value| !value.is_null());

        match value {
            None => errors.push(format!("Missing required field: {}", field)),
            Some(value) => match value.as_f64() {
                None => errors.push(format!(
                    "Invalid type for field '{}': expected int or float, got {}",
                    field,
                    json_type_name(value)
                )),
                Some(number) if !number.is_finite() || number < 0.0 => errors.push(format!(
                    "Invalid value for field '{}': expected a non-negative number, got {}",
                    field, value
                )),
                Some(number) => *slot = number.round() as u64,
            },
        }
    }

    if !errors.is_empty() {
        return Err(AppError::Configuration(format!(
            "{} profile validation failed with the following errors:\n{}",
            format.config_key(),
            errors.join("\n")
        )));
    }

    let [
        intro_duration,
        outro_duration,
        body_segment_duration,
        intro_initial_silence,
        outro_initial_silence,
        body_initial_silence,
    ] = values;

    let profile = FormatProfile {
        intro_duration,
        outro_duration,
        body_segment_duration,
        intro_initial_silence,
        outro_initial_silence,
        body_initial_silence,
    };
    debug!("Loaded {} profile: {:?}", format, profile);
    Ok(profile)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Кэш профилей: каждый формат загружается один раз за запуск.
///
/// Ошибка загрузки тоже кэшируется, чтобы все видео этого формата
/// пропускались с одной и той же причиной.
#[derive(Debug)]
pub struct FormatCatalog {
    config: Value,
    profiles: HashMap<VideoFormat, Result<FormatProfile, String>>,
}

impl FormatCatalog {
    pub fn new(config: Value) -> Self {
        Self {
            config,
            profiles: HashMap::new(),
        }
    }

    /// Читает JSON-файл с секциями форматов
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Configuration(format!(
                "Failed to read video format file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Value = serde_json::from_str(&content).map_err(|e| {
            AppError::Configuration(format!(
                "Error parsing video format file {}: {}",
                path.display(),
                e
            ))
        })?;
        info!("Loaded video format configuration from {}", path.display());
        Ok(Self::new(config))
    }

    /// Профиль формата; повторные вызовы не перечитывают конфигурацию
    pub fn profile(&mut self, format: VideoFormat) -> AppResult<FormatProfile> {
        let config = &self.config;
        self.profiles
            .entry(format)
            .or_insert_with(|| load_format_profile(config, format).map_err(|e| e.to_string()))
            .clone()
            .map_err(AppError::Configuration)
    }
}
