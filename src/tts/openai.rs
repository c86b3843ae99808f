//! # OpenAI TTS
//!
//! Синтез речи через `POST /v1/audio/speech`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, warn};
use reqwest::{Client, StatusCode, header};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::config::TtsSettings;
use crate::errors::{AppError, AppResult};
use crate::tts::SpeechSynthesizer;

const SPEECH_ENDPOINT: &str = "https://api.openai.com/v1/audio/speech";
const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_STEP: Duration = Duration::from_secs(2);

/// Параметры запроса к API OpenAI TTS
#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
    response_format: &'a str,
}

/// Клиент OpenAI TTS с ограничением числа одновременных запросов
#[derive(Clone)]
pub struct OpenAiSynthesizer {
    client: Client,
    api_key: String,
    model: String,
    speed: f32,
    semaphore: Arc<Semaphore>,
}

impl OpenAiSynthesizer {
    pub fn new(api_key: &str, settings: &TtsSettings) -> AppResult<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::Configuration(
                "OpenAI API key is required for speech synthesis".to_string(),
            ));
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            model: settings.model.clone(),
            speed: settings.speed,
            semaphore: Arc::new(Semaphore::new(settings.max_concurrent_requests)),
        })
    }

    fn request_body<'a>(&'a self, text: &'a str, voice: &'a str) -> TtsRequest<'a> {
        TtsRequest {
            model: &self.model,
            input: text,
            voice,
            speed: self.speed,
            response_format: "mp3",
        }
    }

    /// Одна попытка; `Ok(None)` означает ошибку, которую стоит повторить
    async fn attempt(&self, body: &TtsRequest<'_>) -> AppResult<Option<Bytes>> {
        let response = match self
            .client
            .post(SPEECH_ENDPOINT)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("HTTP error while calling OpenAI TTS: {}", e);
                return Ok(None);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = api_error_message(&error_text);
            if is_retryable(status) {
                warn!("OpenAI TTS returned {}: {}", status, message);
                return Ok(None);
            }
            return Err(AppError::Synthesis(format!(
                "OpenAI API error ({}): {}",
                status, message
            )));
        }

        match response.bytes().await {
            Ok(bytes) if !bytes.is_empty() => Ok(Some(bytes)),
            Ok(_) => {
                warn!("OpenAI TTS returned an empty body");
                Ok(None)
            }
            Err(e) => {
                warn!("Failed to read OpenAI TTS response: {}", e);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str) -> AppResult<Bytes> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| AppError::Synthesis(format!("request limiter closed: {}", e)))?;

        let body = self.request_body(text, voice);
        for attempt in 1..=MAX_ATTEMPTS {
            debug!(
                "TTS request for '{}' with voice '{}' (attempt {}/{})",
                text, voice, attempt, MAX_ATTEMPTS
            );
            if let Some(bytes) = self.attempt(&body).await? {
                debug!("Received {} bytes of audio", bytes.len());
                return Ok(bytes);
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(RETRY_STEP * attempt).await;
            }
        }

        Err(AppError::Synthesis(format!(
            "no audio received for '{}' after {} attempts",
            text, MAX_ATTEMPTS
        )))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Текст ошибки из тела ответа `{"error": {"message": ...}}`
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
