//! # Batch driver
//!
//! Обрабатывает пары (видео, язык). Каждая пара заканчивается явным
//! `UnitOutcome`; ошибка одной пары не останавливает остальные. Ошибка
//! конфигурации формата пропускает все видео этого формата.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};
use log::{error, info, warn};
use rayon::prelude::*;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::Sender;

use crate::audio::decode_clip;
use crate::config::{AppConfig, FailurePolicy, FormatCatalog, FormatProfile, VideoFormat};
use crate::errors::{AppError, AppResult, DurationExceededError};
use crate::events::{ProgressUpdate, send_progress};
use crate::export::Exporter;
use crate::models::{LanguageContent, VideoEntry, load_data_files};
use crate::pipeline::assembler::{assemble, validate};
use crate::pipeline::normalizer::normalize;
use crate::pipeline::segments::section_layout;
use crate::tts::{SpeechSynthesizer, VoiceMap, synthesize_lines};

/// Ограничение обработки отдельными видео и языками; пустой список - все
#[derive(Debug, Clone, Default)]
pub struct UnitFilter {
    pub videos: Vec<String>,
    pub languages: Vec<String>,
}

impl UnitFilter {
    fn matches_video(&self, name: &str) -> bool {
        self.videos.is_empty() || self.videos.iter().any(|v| v == name)
    }

    fn matches_language(&self, code: &str) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|l| l == code)
    }
}

/// Результат обработки одной пары
#[derive(Debug)]
pub enum UnitOutcome {
    /// Трек записан; `warning` - нарушения длительности, найденные после экспорта
    Exported {
        paths: Vec<PathBuf>,
        duration_ms: u64,
        warning: Option<DurationExceededError>,
    },
    Failed(AppError),
    /// Пара не запускалась (например, формат без валидного профиля)
    Skipped(String),
}

#[derive(Debug)]
pub struct UnitReport {
    pub video: String,
    pub language: String,
    pub outcome: UnitOutcome,
}

/// Итог пакета
#[derive(Debug)]
pub struct BatchReport {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub units: Vec<UnitReport>,
}

impl BatchReport {
    fn count(&self, predicate: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.units.iter().filter(|unit| predicate(&unit.outcome)).count()
    }

    pub fn exported(&self) -> usize {
        self.count(|outcome| matches!(outcome, UnitOutcome::Exported { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, UnitOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, UnitOutcome::Skipped(_)))
    }

    /// Экспортированные треки с нарушением длительности
    pub fn warnings(&self) -> usize {
        self.count(|outcome| {
            matches!(
                outcome,
                UnitOutcome::Exported {
                    warning: Some(_),
                    ..
                }
            )
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0 || self.skipped() > 0
    }

    /// Одна строка на каждую неудачную пару и общий итог
    pub fn log_summary(&self) {
        for unit in &self.units {
            match &unit.outcome {
                UnitOutcome::Failed(e) => error!(
                    "{} [{}] failed ({}): {}",
                    unit.video,
                    unit.language,
                    e.kind(),
                    e
                ),
                UnitOutcome::Skipped(reason) => {
                    warn!("{} [{}] skipped: {}", unit.video, unit.language, reason)
                }
                UnitOutcome::Exported { .. } => {}
            }
        }

        let elapsed = self.finished_at - self.started_at;
        info!(
            "Batch finished in {:.1}s: {} exported ({} with duration warnings), {} failed, {} skipped",
            elapsed.num_milliseconds() as f64 / 1000.0,
            self.exported(),
            self.warnings(),
            self.failed(),
            self.skipped()
        );
    }
}

/// Пути экспорта, длительность трека, нарушения длительности
type Rendered = (Vec<PathBuf>, u64, Option<DurationExceededError>);

/// Запланированная пара (видео, язык)
struct Unit {
    video: String,
    language: String,
    format: VideoFormat,
    profile: FormatProfile,
    content: LanguageContent,
}

/// Выполняет пакет: синтез, нормализация, сборка, экспорт, проверка
pub struct BatchRunner {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voices: VoiceMap,
    exporter: Exporter,
    sample_rate: u32,
    failure_policy: FailurePolicy,
    max_concurrent_units: usize,
    progress: Option<Sender<ProgressUpdate>>,
}

impl BatchRunner {
    /// Создаёт исполнителя; каталоги экспорта проверяются и создаются
    pub fn from_config(
        config: &AppConfig,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> AppResult<Self> {
        let dirs = config.export_dirs()?;
        dirs.ensure_exist()?;

        Ok(Self {
            synthesizer,
            voices: VoiceMap::new(config.voices.clone()),
            exporter: Exporter::new(dirs.audio, config.audio.export_format),
            sample_rate: config.audio.sample_rate,
            failure_policy: config.batch.failure_policy,
            max_concurrent_units: config.batch.max_concurrent_units.max(1),
            progress: None,
        })
    }

    pub fn with_progress(mut self, sender: Sender<ProgressUpdate>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Обрабатывает все подходящие пары
    pub async fn run(
        &self,
        videos: &[VideoEntry],
        catalog: &mut FormatCatalog,
        filter: &UnitFilter,
    ) -> BatchReport {
        let started_at = Local::now();
        let (units, mut reports) = plan_units(videos, catalog, filter);

        send_progress(
            &self.progress,
            ProgressUpdate::BatchStarted { units: units.len() },
        )
        .await;
        info!(
            "Processing {} unit(s), {} skipped before start",
            units.len(),
            reports.len()
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_units));
        let tasks = units.into_iter().map(|unit| {
            let semaphore = semaphore.clone();
            async move {
                let outcome = match semaphore.acquire().await {
                    Ok(_permit) => self.process_unit(&unit).await,
                    Err(e) => UnitOutcome::Failed(AppError::Other(e.into())),
                };
                UnitReport {
                    video: unit.video,
                    language: unit.language,
                    outcome,
                }
            }
        });
        reports.extend(futures::future::join_all(tasks).await);

        let report = BatchReport {
            started_at,
            finished_at: Local::now(),
            units: reports,
        };
        send_progress(
            &self.progress,
            ProgressUpdate::BatchFinished {
                exported: report.exported(),
                failed: report.failed(),
                skipped: report.skipped(),
            },
        )
        .await;
        report
    }

    async fn process_unit(&self, unit: &Unit) -> UnitOutcome {
        info!("Processing {} [{}]", unit.video, unit.language);
        send_progress(
            &self.progress,
            ProgressUpdate::UnitStarted {
                video: unit.video.clone(),
                language: unit.language.clone(),
            },
        )
        .await;

        match self.render_unit(unit).await {
            Ok((paths, duration_ms, warning)) => {
                if let Some(violations) = &warning {
                    warn!("{} [{}]: {}", unit.video, unit.language, violations);
                }
                send_progress(
                    &self.progress,
                    ProgressUpdate::Exported {
                        video: unit.video.clone(),
                        language: unit.language.clone(),
                        paths: paths.clone(),
                        duration_ms,
                    },
                )
                .await;
                UnitOutcome::Exported {
                    paths,
                    duration_ms,
                    warning,
                }
            }
            Err(e) => {
                error!("{} [{}] failed: {}", unit.video, unit.language, e);
                send_progress(
                    &self.progress,
                    ProgressUpdate::UnitFailed {
                        video: unit.video.clone(),
                        language: unit.language.clone(),
                        reason: e.to_string(),
                    },
                )
                .await;
                UnitOutcome::Failed(e)
            }
        }
    }

    async fn render_unit(&self, unit: &Unit) -> AppResult<Rendered> {
        let voice = self.voices.resolve(&unit.language)?;
        let lines = unit.content.script_lines(unit.format, &unit.profile)?;
        // проверка до синтеза, чтобы не платить за заведомо неверный сценарий
        let layout = section_layout(lines.len(), &unit.profile)?;

        send_progress(
            &self.progress,
            ProgressUpdate::Synthesizing {
                video: unit.video.clone(),
                language: unit.language.clone(),
                lines: lines.len(),
            },
        )
        .await;
        let audio =
            synthesize_lines(self.synthesizer.as_ref(), &lines, voice, self.failure_policy).await?;

        send_progress(
            &self.progress,
            ProgressUpdate::Normalizing {
                video: unit.video.clone(),
                language: unit.language.clone(),
                segments: audio.len(),
            },
        )
        .await;

        let profile = unit.profile;
        let sample_rate = self.sample_rate;
        let exporter = self.exporter.clone();
        let video = unit.video.clone();
        let language = unit.language.clone();

        tokio::task::spawn_blocking(move || -> AppResult<Rendered> {
            let clips = audio
                .par_iter()
                .map(|bytes| decode_clip(bytes, sample_rate))
                .collect::<AppResult<Vec<_>>>()?;

            let processed = normalize(clips, &profile)?;
            let track = assemble(processed, &layout, sample_rate)?;
            let paths = exporter.export(&track, &video, &language)?;
            let warning = validate(&track, &profile).err();
            Ok((paths, track.duration_ms(), warning))
        })
        .await
        .map_err(|e| AppError::AudioProcessing(format!("processing task failed: {}", e)))?
    }
}

/// Разворачивает видео в пары; пропуски по формату сразу попадают в отчёт
fn plan_units(
    videos: &[VideoEntry],
    catalog: &mut FormatCatalog,
    filter: &UnitFilter,
) -> (Vec<Unit>, Vec<UnitReport>) {
    let mut units = Vec::new();
    let mut skipped = Vec::new();

    for video in videos.iter().filter(|v| filter.matches_video(&v.name)) {
        let languages: Vec<(&String, &LanguageContent)> = video
            .content
            .iter()
            .filter(|(code, _)| filter.matches_language(code))
            .collect();
        if languages.is_empty() {
            continue;
        }

        let profile = VideoFormat::from_name(&video.format)
            .and_then(|format| catalog.profile(format).map(|profile| (format, profile)));

        match profile {
            Ok((format, profile)) => {
                for (language, content) in languages {
                    units.push(Unit {
                        video: video.name.clone(),
                        language: language.clone(),
                        format,
                        profile,
                        content: content.clone(),
                    });
                }
            }
            Err(e) => {
                let reason = e.to_string();
                for (language, _) in languages {
                    skipped.push(UnitReport {
                        video: video.name.clone(),
                        language: language.clone(),
                        outcome: UnitOutcome::Skipped(reason.clone()),
                    });
                }
            }
        }
    }

    (units, skipped)
}

/// Полный запуск по конфигурации: данные, профили форматов, пакет
pub async fn run_batch(
    config: &AppConfig,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    filter: &UnitFilter,
    progress: Option<Sender<ProgressUpdate>>,
) -> AppResult<BatchReport> {
    let videos = load_data_files(&config.data_files())?;
    for name in &filter.videos {
        if !videos.iter().any(|v| &v.name == name) {
            warn!("Video '{}' not found in data files", name);
        }
    }

    let mut catalog = FormatCatalog::from_file(&config.video_format_file())?;
    let mut runner = BatchRunner::from_config(config, synthesizer)?;
    if let Some(sender) = progress {
        runner = runner.with_progress(sender);
    }

    let report = runner.run(&videos, &mut catalog, filter).await;
    report.log_summary();
    Ok(report)
}

/// Проверяет конфигурацию без синтеза: каталоги, данные, профили, голоса, сценарии.
///
/// Возвращает список найденных проблем; ошибка - только если не читается
/// сам набор данных или файл форматов.
pub fn check_config(config: &AppConfig) -> AppResult<Vec<String>> {
    let mut problems = Vec::new();
    if let Err(e) = config.export_dirs() {
        problems.push(e.to_string());
    }

    let videos = load_data_files(&config.data_files())?;
    let mut catalog = FormatCatalog::from_file(&config.video_format_file())?;
    let voices = VoiceMap::new(config.voices.clone());

    for video in &videos {
        let format = match VideoFormat::from_name(&video.format) {
            Ok(format) => format,
            Err(e) => {
                problems.push(format!("{}: {}", video.name, e));
                continue;
            }
        };
        let profile = match catalog.profile(format) {
            Ok(profile) => profile,
            Err(e) => {
                problems.push(format!("{}: {}", video.name, e));
                continue;
            }
        };

        for (language, content) in &video.content {
            let checked = voices.resolve(language).and_then(|_| {
                let lines = content.script_lines(format, &profile)?;
                section_layout(lines.len(), &profile)
            });
            if let Err(e) = checked {
                problems.push(format!("{} [{}]: {}", video.name, language, e));
            }
        }
    }

    info!(
        "Checked {} video(s): {} problem(s) found",
        videos.len(),
        problems.len()
    );
    Ok(problems)
}
