//! Модуль для кэширования результатов TTS
//!
//! Ответы синтезатора сохраняются на диск под md5-ключом из текста, голоса,
//! модели и скорости. Ошибки кэша не прерывают синтез.
//!
//! Файл пишется во временный файл в каталоге кэша и переименовывается на
//! место ключа, так что параллельный читатель видит либо всё аудио, либо
//! ничего.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, warn};

use crate::errors::AppResult;
use crate::tts::SpeechSynthesizer;

/// Синтезатор с дисковым кэшем поверх другого синтезатора
pub struct CachedSynthesizer<S> {
    inner: S,
    cache_dir: PathBuf,
    model: String,
    speed: f32,
}

impl<S: SpeechSynthesizer> CachedSynthesizer<S> {
    pub fn new(inner: S, cache_dir: impl Into<PathBuf>, model: &str, speed: f32) -> Self {
        Self {
            inner,
            cache_dir: cache_dir.into(),
            model: model.to_string(),
            speed,
        }
    }

    /// Генерировать ключ для кэша
    fn cache_key(&self, text: &str, voice: &str) -> String {
        let mut hasher = md5::Context::new();
        for part in [text, voice, self.model.as_str()] {
            hasher.consume(part.as_bytes());
            hasher.consume([0u8]);
        }
        hasher.consume(self.speed.to_le_bytes());
        format!("{:x}", hasher.compute())
    }

    fn cache_file(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.mp3", key))
    }

    async fn store(&self, path: &Path, audio: &Bytes) {
        let dir = self.cache_dir.clone();
        let target = path.to_path_buf();
        let audio = audio.clone();

        match tokio::task::spawn_blocking(move || write_atomically(&dir, &target, &audio)).await {
            Ok(Ok(())) => debug!("Cached TTS audio at {}", path.display()),
            Ok(Err(e)) => warn!("Failed to write TTS cache file {}: {}", path.display(), e),
            Err(e) => warn!("TTS cache write task failed: {}", e),
        }
    }
}

fn write_atomically(dir: &Path, path: &Path, audio: &[u8]) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(audio)?;
    file.flush()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl<S: SpeechSynthesizer> SpeechSynthesizer for CachedSynthesizer<S> {
    async fn synthesize(&self, text: &str, voice: &str) -> AppResult<Bytes> {
        let path = self.cache_file(&self.cache_key(text, voice));

        match tokio::fs::read(&path).await {
            Ok(data) if !data.is_empty() => {
                debug!("Using cached TTS for '{}'", text);
                return Ok(Bytes::from(data));
            }
            Ok(_) => debug!("Ignoring empty cache file {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to read TTS cache file {}: {}", path.display(), e),
        }

        let audio = self.inner.synthesize(text, voice).await?;
        self.store(&path, &audio).await;
        Ok(audio)
    }
}
