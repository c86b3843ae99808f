//! Экспорт итоговых треков в каталоги аудио

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::audio::{encode_mp3, encode_wav};
use crate::config::ExportFormat;
use crate::errors::{AppError, AppResult};
use crate::pipeline::assembler::FinalTrack;
use crate::utils::sanitize_filename;

/// Записывает трек в каждый каталог экспорта
#[derive(Debug, Clone)]
pub struct Exporter {
    audio_dirs: Vec<PathBuf>,
    format: ExportFormat,
}

impl Exporter {
    pub fn new(audio_dirs: Vec<PathBuf>, format: ExportFormat) -> Self {
        Self { audio_dirs, format }
    }

    /// Имя файла: `{base}_final_{lang}.{ext}`
    pub fn file_name(&self, base_name: &str, language_code: &str) -> String {
        format!(
            "{}_final_{}.{}",
            sanitize_filename(base_name),
            sanitize_filename(language_code),
            self.format.extension()
        )
    }

    /// Кодирует трек один раз и копирует результат в остальные каталоги.
    ///
    /// Каталоги не создаются: они готовятся при загрузке конфигурации.
    pub fn export(
        &self,
        track: &FinalTrack,
        base_name: &str,
        language_code: &str,
    ) -> AppResult<Vec<PathBuf>> {
        let Some((first_dir, other_dirs)) = self.audio_dirs.split_first() else {
            return Err(AppError::Configuration(
                "No audio export directories configured".to_string(),
            ));
        };

        let file_name = self.file_name(base_name, language_code);
        let first = first_dir.join(&file_name);
        self.encode(track, &first)?;
        debug!("Encoded {}ms track to {}", track.duration_ms(), first.display());

        let mut written = vec![first];
        for dir in other_dirs {
            let target = dir.join(&file_name);
            std::fs::copy(&written[0], &target).map_err(|e| {
                AppError::AudioProcessing(format!(
                    "Failed to copy {} to {}: {}",
                    written[0].display(),
                    target.display(),
                    e
                ))
            })?;
            written.push(target);
        }

        info!("Exported {} to {} location(s)", file_name, written.len());
        Ok(written)
    }

    fn encode(&self, track: &FinalTrack, path: &Path) -> AppResult<()> {
        match self.format {
            ExportFormat::Wav => encode_wav(track.clip(), path),
            ExportFormat::Mp3 => encode_mp3(track.clip(), path),
        }
    }
}
