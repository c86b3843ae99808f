//! Типы ошибок voicetrack
//!
//! Все стадии конвейера возвращают `AppResult`; ошибки длительности
//! вынесены в отдельную структуру, потому что они агрегируются и
//! сообщаются уже после экспорта трека.

use std::fmt;

use thiserror::Error;

use crate::pipeline::segments::Section;

/// Ошибки приложения
#[derive(Debug, Error)]
pub enum AppError {
    /// Ошибка конфигурации (отсутствующие/неверные поля профиля, каталоги экспорта)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Для языка не настроен голос
    #[error("No voice configured for language code '{language_code}'")]
    VoiceNotFound { language_code: String },

    /// Ошибка синтеза речи
    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    /// Количество клипов не согласуется со слотами формата
    #[error(
        "Segment cardinality error: {clips} clip(s) cannot fill {fixed_slots} fixed intro/outro slot(s)"
    )]
    SegmentCardinality { clips: usize, fixed_slots: usize },

    /// Превышение длительности трека или сегментов
    #[error(transparent)]
    DurationExceeded(#[from] DurationExceededError),

    /// Некорректный сценарий видео
    #[error("Invalid script: {0}")]
    Script(String),

    /// Ошибка обработки аудио
    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Короткое имя категории для отчёта по пакету
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "configuration",
            AppError::VoiceNotFound { .. } => "voice",
            AppError::Synthesis(_) => "synthesis",
            AppError::SegmentCardinality { .. } => "cardinality",
            AppError::DurationExceeded(_) => "duration",
            AppError::Script(_) => "script",
            AppError::AudioProcessing(_) => "audio",
            AppError::Io(_) => "io",
            AppError::Json(_) => "json",
            AppError::Http(_) => "http",
            AppError::Other(_) => "other",
        }
    }
}

/// Одно нарушение ограничения длительности
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurationViolation {
    /// Итоговый трек длиннее ожидаемого
    Total { actual_ms: u64, expected_ms: u64 },
    /// Отдельный сегмент длиннее своего слота
    Segment {
        index: usize,
        section: Section,
        actual_ms: u64,
        target_ms: u64,
    },
}

impl fmt::Display for DurationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationViolation::Total {
                actual_ms,
                expected_ms,
            } => write!(
                f,
                "final track with {}ms exceeds the expected duration {}ms",
                actual_ms, expected_ms
            ),
            DurationViolation::Segment {
                index,
                section,
                actual_ms,
                target_ms,
            } => write!(
                f,
                "segment #{} ({}) with {}ms exceeds its slot of {}ms",
                index, section, actual_ms, target_ms
            ),
        }
    }
}

/// Агрегированный отчёт о превышениях длительности.
///
/// Ошибка предупредительного класса: трек к этому моменту уже экспортирован.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationExceededError {
    pub violations: Vec<DurationViolation>,
}

impl fmt::Display for DurationExceededError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration exceeded ({} violation(s))", self.violations.len())?;
        for violation in &self.violations {
            write!(f, "\n  - {}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for DurationExceededError {}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::Other(anyhow::anyhow!(s.to_string()))
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Other(anyhow::anyhow!(s))
    }
}

/// Тип Result для всего приложения
pub type AppResult<T> = Result<T, AppError>;
