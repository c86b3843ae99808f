//! Речевой клип: моно PCM (f32) с частотой дискретизации.
//!
//! Длительность считается в целых миллисекундах, как и все значения
//! профиля формата.

use crate::errors::{AppError, AppResult};

/// Переводит миллисекунды в количество семплов (с округлением)
pub fn ms_to_samples(duration_ms: u64, sample_rate: u32) -> usize {
    ((duration_ms as u128 * sample_rate as u128 + 500) / 1000) as usize
}

/// Переводит количество семплов в миллисекунды (с округлением)
pub fn samples_to_ms(sample_count: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    let rate = sample_rate as u128;
    ((sample_count as u128 * 1000 + rate / 2) / rate) as u64
}

/// Декодированный аудиофрагмент одной строки сценария
#[derive(Debug, PartialEq)]
pub struct SpeechClip {
    /// Семплы PCM (f32, моно)
    samples: Vec<f32>,
    /// Частота дискретизации
    sample_rate: u32,
}

impl SpeechClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Клип из тишины заданной длительности
    pub fn silent(duration_ms: u64, sample_rate: u32) -> Self {
        Self::new(vec![0.0; ms_to_samples(duration_ms, sample_rate)], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Длительность клипа в миллисекундах
    pub fn duration_ms(&self) -> u64 {
        samples_to_ms(self.samples.len(), self.sample_rate)
    }

    /// Добавляет тишину в начало клипа
    pub fn prepend_silence(&mut self, duration_ms: u64) {
        let count = ms_to_samples(duration_ms, self.sample_rate);
        if count == 0 {
            return;
        }
        let mut samples = vec![0.0; count + self.samples.len()];
        samples[count..].copy_from_slice(&self.samples);
        self.samples = samples;
    }

    /// Добивает тишиной в конце до заданной длительности.
    ///
    /// Длина считается в семплах от итоговой длительности, поэтому
    /// округление не накапливается. Клип не укорачивается.
    pub fn pad_to(&mut self, duration_ms: u64) {
        let target = ms_to_samples(duration_ms, self.sample_rate);
        if target > self.samples.len() {
            self.samples.resize(target, 0.0);
        }
    }

    /// Приклеивает другой клип в конец; частоты должны совпадать
    pub fn append(&mut self, other: SpeechClip) -> AppResult<()> {
        if other.sample_rate != self.sample_rate {
            return Err(AppError::AudioProcessing(format!(
                "cannot concatenate clips with different sample rates ({} Hz and {} Hz)",
                self.sample_rate, other.sample_rate
            )));
        }
        if self.samples.is_empty() {
            self.samples = other.samples;
        } else {
            self.samples.extend_from_slice(&other.samples);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_conversions() {
        assert_eq!(ms_to_samples(1000, 44100), 44100);
        assert_eq!(ms_to_samples(250, 8000), 2000);
        assert_eq!(samples_to_ms(24000, 24000), 1000);
        assert_eq!(samples_to_ms(441, 44100), 10);
        assert_eq!(samples_to_ms(100, 0), 0);
    }

    #[test]
    fn test_silence_is_added_on_both_sides() {
        let mut clip = SpeechClip::new(vec![0.5; 800], 8000);
        assert_eq!(clip.duration_ms(), 100);

        clip.prepend_silence(50);
        clip.pad_to(175);

        assert_eq!(clip.duration_ms(), 175);
        assert_eq!(clip.samples()[0], 0.0);
        assert_eq!(clip.samples()[400], 0.5);
        assert_eq!(clip.samples()[clip.len_samples() - 1], 0.0);
    }

    #[test]
    fn test_pad_to_lands_on_exact_duration() {
        // 44100 Гц не кратно 1000: отдельное округление добивки давало +1мс
        for count in 1..2000 {
            let mut clip = SpeechClip::new(vec![0.5; count], 44100);
            clip.pad_to(1000);
            assert_eq!(clip.len_samples(), 44100);
            assert_eq!(clip.duration_ms(), 1000);
        }

        let mut long = SpeechClip::new(vec![0.5; 50000], 44100);
        long.pad_to(1000);
        assert_eq!(long.len_samples(), 50000);
    }

    #[test]
    fn test_append_rejects_rate_mismatch() {
        let mut clip = SpeechClip::silent(100, 8000);
        let result = clip.append(SpeechClip::silent(100, 16000));
        assert!(matches!(result, Err(AppError::AudioProcessing(_))));

        clip.append(SpeechClip::silent(100, 8000)).unwrap();
        assert_eq!(clip.duration_ms(), 200);
    }
}
