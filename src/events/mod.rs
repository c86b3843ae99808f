// Events module
// Progress updates emitted while a batch runs

use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc::Sender;

/// Обновление прогресса для отправки клиенту
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    /// Началась обработка пакета
    BatchStarted { units: usize },
    /// Началась обработка пары (видео, язык)
    UnitStarted { video: String, language: String },
    /// Строки отправлены синтезатору
    Synthesizing {
        video: String,
        language: String,
        lines: usize,
    },
    /// Клипы приводятся к слотам формата
    Normalizing {
        video: String,
        language: String,
        segments: usize,
    },
    /// Трек записан
    Exported {
        video: String,
        language: String,
        paths: Vec<PathBuf>,
        duration_ms: u64,
    },
    /// Пара не обработана
    UnitFailed {
        video: String,
        language: String,
        reason: String,
    },
    /// Пакет завершён
    BatchFinished {
        exported: usize,
        failed: usize,
        skipped: usize,
    },
}

impl fmt::Display for ProgressUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressUpdate::BatchStarted { units } => write!(f, "batch started: {} unit(s)", units),
            ProgressUpdate::UnitStarted { video, language } => {
                write!(f, "{} [{}]: started", video, language)
            }
            ProgressUpdate::Synthesizing {
                video,
                language,
                lines,
            } => write!(f, "{} [{}]: synthesizing {} line(s)", video, language, lines),
            ProgressUpdate::Normalizing {
                video,
                language,
                segments,
            } => write!(f, "{} [{}]: normalizing {} segment(s)", video, language, segments),
            ProgressUpdate::Exported {
                video,
                language,
                paths,
                duration_ms,
            } => write!(
                f,
                "{} [{}]: exported {}ms track to {} file(s)",
                video,
                language,
                duration_ms,
                paths.len()
            ),
            ProgressUpdate::UnitFailed {
                video,
                language,
                reason,
            } => write!(f, "{} [{}]: failed: {}", video, language, reason),
            ProgressUpdate::BatchFinished {
                exported,
                failed,
                skipped,
            } => write!(
                f,
                "batch finished: {} exported, {} failed, {} skipped",
                exported, failed, skipped
            ),
        }
    }
}

/// Отправляет обновление, если канал задан; закрытый канал игнорируется
pub async fn send_progress(sender: &Option<Sender<ProgressUpdate>>, update: ProgressUpdate) {
    if let Some(sender) = sender {
        let _ = sender.send(update).await;
    }
}
