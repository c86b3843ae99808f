//! # Audio Codec
//!
//! Декодирование ответов TTS в PCM, ресемплинг к частоте вывода и
//! кодирование итогового трека (WAV через hound, MP3 через ffmpeg).

use std::io::{self, Cursor};
use std::path::Path;
use std::process::Command;

use hound::{SampleFormat, WavSpec, WavWriter};
use log::{debug, warn};
use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::clip::SpeechClip;
use crate::errors::{AppError, AppResult};

/// Размер входного блока для ресемплера
const RESAMPLE_CHUNK: usize = 1024;

/// Декодирует байты аудио (MP3, WAV, AAC) в моно клип.
///
/// Многоканальное аудио микшируется в моно.
pub fn decode_audio_bytes(data: &[u8]) -> AppResult<SpeechClip> {
    if data.is_empty() {
        return Err(AppError::AudioProcessing(
            "received empty audio data".to_string(),
        ));
    }

    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let format_opts = FormatOptions {
        enable_gapless: true,
        ..Default::default()
    };

    let probed = symphonia::default::get_probe()
        .format(&Hint::new(), mss, &format_opts, &MetadataOptions::default())
        .map_err(|e| AppError::AudioProcessing(format!("unrecognized audio format: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AppError::AudioProcessing("no audio track found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AppError::AudioProcessing(format!("failed to create decoder: {}", e)))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut pcm_data = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(AppError::AudioProcessing(format!(
                    "failed to read audio packet: {}",
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                let channels = spec.channels.count().max(1);

                let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);
                let samples = sample_buf.samples();

                if channels > 1 {
                    for frame in samples.chunks_exact(channels) {
                        pcm_data.push(frame.iter().sum::<f32>() / channels as f32);
                    }
                } else {
                    pcm_data.extend_from_slice(samples);
                }
            }
            Err(SymphoniaError::DecodeError(e)) => {
                // Пропускаем битый пакет
                warn!("Skipping undecodable audio packet: {}", e);
            }
            Err(e) => {
                return Err(AppError::AudioProcessing(format!(
                    "audio decoding failed: {}",
                    e
                )));
            }
        }
    }

    if pcm_data.is_empty() || sample_rate == 0 {
        return Err(AppError::AudioProcessing(
            "decoded 0 samples from audio data".to_string(),
        ));
    }

    debug!(
        "Decoded {} samples at {} Hz from {} bytes",
        pcm_data.len(),
        sample_rate,
        data.len()
    );
    Ok(SpeechClip::new(pcm_data, sample_rate))
}

/// Декодирует байты и приводит клип к частоте `target_rate`
pub fn decode_clip(data: &[u8], target_rate: u32) -> AppResult<SpeechClip> {
    let clip = decode_audio_bytes(data)?;
    resample(clip, target_rate)
}

/// Ресемплинг клипа через rubato (FFT).
///
/// Длина результата всегда `len * target / source` семплов.
pub fn resample(clip: SpeechClip, target_rate: u32) -> AppResult<SpeechClip> {
    let source_rate = clip.sample_rate();
    if source_rate == target_rate || clip.is_empty() {
        return Ok(SpeechClip::new(clip.into_samples(), target_rate));
    }
    if target_rate == 0 || source_rate == 0 {
        return Err(AppError::AudioProcessing(format!(
            "invalid resampling rates {} Hz -> {} Hz",
            source_rate, target_rate
        )));
    }

    let input = clip.into_samples();
    let expected_len = (input.len() as u128 * target_rate as u128 / source_rate as u128) as usize;

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        RESAMPLE_CHUNK,
        2,
        1, // моно
    )
    .map_err(|e| AppError::AudioProcessing(format!("failed to create resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected_len + delay + RESAMPLE_CHUNK);
    let mut position = 0;

    while position + resampler.input_frames_next() <= input.len() {
        let frames = resampler.input_frames_next();
        let chunk = [&input[position..position + frames]];
        let out = resampler
            .process(&chunk[..], None)
            .map_err(|e| AppError::AudioProcessing(format!("resampling failed: {}", e)))?;
        output.extend_from_slice(&out[0]);
        position += frames;
    }

    if position < input.len() {
        let chunk = [&input[position..]];
        let out = resampler
            .process_partial(Some(&chunk[..]), None)
            .map_err(|e| AppError::AudioProcessing(format!("resampling failed: {}", e)))?;
        output.extend_from_slice(&out[0]);
    }

    // Выталкиваем задержку ресемплера
    while output.len() < expected_len + delay {
        let out = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| AppError::AudioProcessing(format!("resampling failed: {}", e)))?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected_len, 0.0);

    debug!(
        "Resampled clip {} Hz -> {} Hz ({} samples)",
        source_rate,
        target_rate,
        output.len()
    );
    Ok(SpeechClip::new(output, target_rate))
}

/// Кодирует клип в 32-bit float WAV
pub fn encode_wav(clip: &SpeechClip, output_path: &Path) -> AppResult<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate(),
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(output_path, spec).map_err(wav_error)?;
    for &sample in clip.samples() {
        writer.write_sample(sample).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;

    debug!(
        "Saved WAV file: {} ({} samples, {} Hz)",
        output_path.display(),
        clip.len_samples(),
        clip.sample_rate()
    );
    Ok(())
}

/// Кодирует клип в MP3: временный WAV + ffmpeg
pub fn encode_mp3(clip: &SpeechClip, output_path: &Path) -> AppResult<()> {
    let ffmpeg = which::which("ffmpeg").map_err(|e| {
        AppError::AudioProcessing(format!("ffmpeg is required for MP3 export: {}", e))
    })?;

    let temp_wav = tempfile::Builder::new().suffix(".wav").tempfile()?;
    encode_wav(clip, temp_wav.path())?;

    let output = Command::new(ffmpeg)
        .arg("-y")
        .args(["-loglevel", "error"])
        .arg("-i")
        .arg(temp_wav.path())
        .arg(output_path)
        .output()?;

    if !output.status.success() {
        return Err(AppError::AudioProcessing(format!(
            "ffmpeg failed with status {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    debug!("Saved MP3 file: {}", output_path.display());
    Ok(())
}

fn wav_error(e: hound::Error) -> AppError {
    AppError::AudioProcessing(format!("WAV encoding failed: {}", e))
}
