//! # Speech synthesis
//!
//! Интерфейс синтезатора речи и параллельная озвучка строк сценария.
//! Результаты всегда упорядочены по входным строкам, а не по времени
//! завершения запросов.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::{join_all, try_join_all};
use log::{debug, error};

use crate::config::FailurePolicy;
use crate::errors::{AppError, AppResult};

pub mod cache;
pub mod openai;

pub use cache::CachedSynthesizer;
pub use openai::OpenAiSynthesizer;

/// Бэкенд синтеза речи: текст + голос -> закодированное аудио
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> AppResult<Bytes>;
}

/// Соответствие кода языка голосу
#[derive(Debug, Clone, Default)]
pub struct VoiceMap {
    voices: BTreeMap<String, String>,
}

impl VoiceMap {
    pub fn new(voices: BTreeMap<String, String>) -> Self {
        Self { voices }
    }

    pub fn resolve(&self, language_code: &str) -> AppResult<&str> {
        self.voices
            .get(language_code)
            .map(String::as_str)
            .ok_or_else(|| AppError::VoiceNotFound {
                language_code: language_code.to_string(),
            })
    }
}

/// Озвучивает все строки одновременно.
///
/// `AbortUnit`: первая ошибка отменяет остальные запросы.
/// `ReportAll`: дожидается всех запросов и возвращает сводную ошибку.
pub async fn synthesize_lines<S>(
    synthesizer: &S,
    lines: &[String],
    voice: &str,
    policy: FailurePolicy,
) -> AppResult<Vec<Bytes>>
where
    S: SpeechSynthesizer + ?Sized,
{
    debug!("Synthesizing {} line(s) with voice '{}'", lines.len(), voice);
    let requests = lines
        .iter()
        .map(|line| synthesizer.synthesize(line, voice));

    match policy {
        FailurePolicy::AbortUnit => try_join_all(requests).await,
        FailurePolicy::ReportAll => {
            let results = join_all(requests).await;
            let mut audio = Vec::with_capacity(results.len());
            let mut failures = Vec::new();

            for (index, result) in results.into_iter().enumerate() {
                match result {
                    Ok(bytes) => audio.push(bytes),
                    Err(e) => {
                        error!("Synthesis of line #{} failed: {}", index, e);
                        failures.push(format!("line #{}: {}", index, e));
                    }
                }
            }

            if failures.is_empty() {
                Ok(audio)
            } else {
                Err(AppError::Synthesis(format!(
                    "{} of {} line(s) failed:\n{}",
                    failures.len(),
                    lines.len(),
                    failures.join("\n")
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Отвечает текстом строки; чем раньше строка, тем дольше ответ
    struct SlowEcho {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechSynthesizer for SlowEcho {
        async fn synthesize(&self, text: &str, voice: &str) -> AppResult<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = 40u64.saturating_sub(text.len() as u64 * 10);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if text.contains("FAIL") {
                return Err(AppError::Synthesis(format!("backend refused '{}'", text)));
            }
            Ok(Bytes::from(format!("{}:{}", voice, text)))
        }
    }

    fn echo() -> SlowEcho {
        SlowEcho {
            calls: AtomicUsize::new(0),
        }
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let synth = echo();
        let input = lines(&["a", "bb", "ccc"]);
        let audio = synthesize_lines(&synth, &input, "nova", FailurePolicy::AbortUnit)
            .await
            .unwrap();

        assert_eq!(
            audio,
            vec![
                Bytes::from("nova:a"),
                Bytes::from("nova:bb"),
                Bytes::from("nova:ccc")
            ]
        );
    }

    #[tokio::test]
    async fn test_abort_unit_returns_first_error() {
        let synth = echo();
        let input = lines(&["a", "FAIL", "c"]);
        let result = synthesize_lines(&synth, &input, "nova", FailurePolicy::AbortUnit).await;
        assert!(matches!(result, Err(AppError::Synthesis(_))));
    }

    #[tokio::test]
    async fn test_report_all_runs_every_request() {
        let synth = echo();
        let input = lines(&["FAIL-1", "b", "FAIL-2"]);
        let error = synthesize_lines(&synth, &input, "nova", FailurePolicy::ReportAll)
            .await
            .unwrap_err();

        assert_eq!(synth.calls.load(Ordering::SeqCst), 3);
        let message = error.to_string();
        assert!(message.contains("2 of 3 line(s) failed"));
        assert!(message.contains("line #0"));
        assert!(message.contains("line #2"));
    }

    #[tokio::test]
    async fn test_empty_script() {
        let synth = echo();
        let audio = synthesize_lines(&synth, &[], "nova", FailurePolicy::ReportAll)
            .await
            .unwrap();
        assert!(audio.is_empty());
    }

    #[test]
    fn test_voice_map() {
        let voices = VoiceMap::new(BTreeMap::from([("en".to_string(), "alloy".to_string())]));
        assert_eq!(voices.resolve("en").unwrap(), "alloy");
        assert!(matches!(
            voices.resolve("de"),
            Err(AppError::VoiceNotFound { language_code }) if language_code == "de"
        ));
    }
}
