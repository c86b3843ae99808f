//! # Segment Normalizer
//!
//! Приводит клипы к длительностям слотов формата. Аудио никогда не
//! обрезается: если сегмент длиннее слота, превышение (carry) уменьшает
//! тишину, добавляемую к следующему сегменту.

use log::debug;

use crate::audio::SpeechClip;
use crate::config::FormatProfile;
use crate::errors::AppResult;
use crate::pipeline::segments::{SegmentMap, Slot};

/// Решение, принятое для одного сегмента
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadOutcome {
    /// Длительность после начальной тишины, до добивки
    pub total_ms: u64,
    /// Добавленная в конец тишина
    pub padding_ms: u64,
    /// Превышение, переносимое на следующий сегмент
    pub carry_out: u64,
}

/// Расчёт добивки без работы с семплами.
///
/// `total_ms` уже включает начальную тишину слота.
pub fn plan_padding(total_ms: u64, target_ms: u64, carry_in: u64) -> PadOutcome {
    let (padding_ms, carry_out) = if total_ms < target_ms {
        let free = target_ms - total_ms;
        if carry_in <= free {
            (free - carry_in, 0)
        } else {
            // Перенос больше свободного места: остаток уходит дальше
            (0, carry_in - free)
        }
    } else if total_ms > target_ms {
        (0, total_ms - target_ms)
    } else {
        (0, 0)
    };

    PadOutcome {
        total_ms,
        padding_ms,
        carry_out,
    }
}

/// Добивает один клип до слота: начальная тишина, затем тишина в конце.
///
/// Возвращает обработанный клип и новый перенос.
pub fn pad_to_slot(mut clip: SpeechClip, slot: Slot, carry_in: u64) -> (SpeechClip, u64) {
    clip.prepend_silence(slot.initial_silence_ms);

    let outcome = plan_padding(clip.duration_ms(), slot.target_ms, carry_in);
    if outcome.padding_ms > 0 {
        clip.pad_to(outcome.total_ms + outcome.padding_ms);
    }

    debug!(
        "{} slot {}ms: total {}ms, carry in {}ms, padded {}ms, carry out {}ms",
        slot.section,
        slot.target_ms,
        outcome.total_ms,
        carry_in,
        outcome.padding_ms,
        outcome.carry_out
    );
    (clip, outcome.carry_out)
}

/// Нормализует упорядоченные клипы под профиль формата.
///
/// Один выходной клип на каждый входной, порядок сохраняется.
pub fn normalize(clips: Vec<SpeechClip>, profile: &FormatProfile) -> AppResult<Vec<SpeechClip>> {
    let map = SegmentMap::partition(clips, profile)?;
    let mut processed = Vec::with_capacity(map.len());
    let mut carry = 0;

    for (section, clip) in map.into_ordered() {
        let (clip, carry_out) = pad_to_slot(clip, Slot::for_section(section, profile), carry);
        carry = carry_out;
        processed.push(clip);
    }

    if carry > 0 {
        debug!("Discarding {}ms overflow left after the last segment", carry);
    }
    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    const RATE: u32 = 8000;

    fn profile(intro: u64, outro: u64, body: u64) -> FormatProfile {
        FormatProfile {
            intro_duration: intro,
            outro_duration: outro,
            body_segment_duration: body,
            intro_initial_silence: 0,
            outro_initial_silence: 0,
            body_initial_silence: 0,
        }
    }

    /// Клип из единиц, чтобы отличать речь от тишины
    fn voiced(ms: u64) -> SpeechClip {
        let count = crate::audio::ms_to_samples(ms, RATE);
        SpeechClip::new(vec![1.0; count], RATE)
    }

    fn durations(clips: &[SpeechClip]) -> Vec<u64> {
        clips.iter().map(SpeechClip::duration_ms).collect()
    }

    #[test]
    fn test_plan_padding_cases() {
        assert_eq!(plan_padding(800, 1000, 0), PadOutcome { total_ms: 800, padding_ms: 200, carry_out: 0 });
        assert_eq!(plan_padding(2500, 3000, 300), PadOutcome { total_ms: 2500, padding_ms: 200, carry_out: 0 });
        assert_eq!(plan_padding(2500, 3000, 500), PadOutcome { total_ms: 2500, padding_ms: 0, carry_out: 0 });
        assert_eq!(plan_padding(2500, 3000, 800), PadOutcome { total_ms: 2500, padding_ms: 0, carry_out: 300 });
        assert_eq!(plan_padding(3500, 3000, 0), PadOutcome { total_ms: 3500, padding_ms: 0, carry_out: 500 });
        assert_eq!(plan_padding(3500, 3000, 200), PadOutcome { total_ms: 3500, padding_ms: 0, carry_out: 500 });
        assert_eq!(plan_padding(3000, 3000, 700), PadOutcome { total_ms: 3000, padding_ms: 0, carry_out: 0 });
    }

    #[test]
    fn test_scenario_all_segments_fit() {
        let clips = vec![voiced(800), voiced(2500), voiced(2500), voiced(900)];
        let processed = normalize(clips, &profile(1000, 1000, 3000)).unwrap();
        assert_eq!(durations(&processed), vec![1000, 3000, 3000, 1000]);
    }

    #[test]
    fn test_overflow_borrows_from_next_segment() {
        let clips = vec![voiced(1200), voiced(2500), voiced(2000), voiced(900)];
        let processed = normalize(clips, &profile(1000, 1000, 3000)).unwrap();
        // интро длиннее на 200 -> первый контент получает 300 вместо 500
        assert_eq!(durations(&processed), vec![1200, 2800, 3000, 1000]);
        let total: u64 = durations(&processed).iter().sum();
        assert_eq!(total, 8000);
    }

    #[test]
    fn test_residual_carry_skips_one_more_segment() {
        let clips = vec![voiced(4000), voiced(2900), voiced(1000)];
        let processed = normalize(clips, &profile(0, 0, 3000)).unwrap();
        // 1000 переноса, свободно 100 -> остаток 900 гасит добивку третьего
        assert_eq!(durations(&processed), vec![4000, 2900, 2100]);
    }

    #[test]
    fn test_carry_is_not_accumulated() {
        let clips = vec![voiced(3500), voiced(3200), voiced(1000)];
        let processed = normalize(clips, &profile(0, 0, 3000)).unwrap();
        // второй сегмент заменяет перенос 500 своим превышением 200
        assert_eq!(durations(&processed), vec![3500, 3200, 2800]);
    }

    #[test]
    fn test_outro_overflow_is_kept() {
        let clips = vec![voiced(800), voiced(2500), voiced(2500), voiced(1500)];
        let processed = normalize(clips, &profile(1000, 1000, 3000)).unwrap();
        assert_eq!(durations(&processed), vec![1000, 3000, 3000, 1500]);
    }

    #[test]
    fn test_without_intro_and_outro_only_body_rules_apply() {
        let mut fmt = profile(0, 0, 2000);
        fmt.intro_initial_silence = 700;
        fmt.outro_initial_silence = 700;
        fmt.body_initial_silence = 100;

        let processed = normalize(vec![voiced(500), voiced(1000)], &fmt).unwrap();
        assert_eq!(durations(&processed), vec![2000, 2000]);
        // речь начинается после 100мс тишины
        assert_eq!(processed[0].samples()[ms_to(99)], 0.0);
        assert_eq!(processed[0].samples()[ms_to(100)], 1.0);
    }

    #[test]
    fn test_initial_silence_counts_towards_slot() {
        let mut fmt = profile(1000, 0, 3000);
        fmt.intro_initial_silence = 300;

        let processed = normalize(vec![voiced(900), voiced(3000)], &fmt).unwrap();
        // 300 + 900 = 1200 > 1000: перенос 200 на контент, который ровно 3000
        assert_eq!(durations(&processed), vec![1200, 3000]);
    }

    #[test]
    fn test_no_truncation_and_order_preserved() {
        let inputs = [450u64, 5000, 120, 3000, 2999, 7000, 10];
        let clips: Vec<SpeechClip> = inputs.iter().map(|&ms| voiced(ms)).collect();
        let processed = normalize(clips, &profile(600, 400, 3000)).unwrap();

        assert_eq!(processed.len(), inputs.len());
        for (clip, &input_ms) in processed.iter().zip(inputs.iter()) {
            let voiced_samples = clip.samples().iter().filter(|&&s| s == 1.0).count();
            // каждый клип содержит всю исходную речь
            assert_eq!(voiced_samples, crate::audio::ms_to_samples(input_ms, RATE));
            assert!(clip.duration_ms() >= input_ms);
        }
    }

    #[test]
    fn test_empty_input_without_fixed_slots() {
        assert!(normalize(Vec::new(), &profile(0, 0, 3000)).unwrap().is_empty());
    }

    #[test]
    fn test_cardinality_error_surfaces() {
        let result = normalize(vec![voiced(100)], &profile(1000, 1000, 3000));
        assert!(matches!(result, Err(AppError::SegmentCardinality { .. })));
    }

    #[test]
    fn test_fitting_clips_match_slots_at_44100() {
        let mut fmt = profile(1000, 1000, 3000);
        fmt.body_initial_silence = 137;
        let rate = 44100;
        // длины в семплах подобраны так, что длительность клипа не целая в мс
        let clips: Vec<SpeechClip> = [30_893usize, 88_219, 101_017, 21_071]
            .iter()
            .map(|&count| SpeechClip::new(vec![1.0; count], rate))
            .collect();

        let processed = normalize(clips, &fmt).unwrap();
        assert_eq!(durations(&processed), vec![1000, 3000, 3000, 1000]);
        assert_eq!(processed[1].len_samples(), 3 * rate as usize);
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let make = || vec![voiced(1300), voiced(2000), voiced(3100), voiced(200)];
        let first = normalize(make(), &profile(1000, 1000, 3000)).unwrap();
        let second = normalize(make(), &profile(1000, 1000, 3000)).unwrap();
        assert_eq!(first, second);
    }

    fn ms_to(ms: u64) -> usize {
        crate::audio::ms_to_samples(ms, RATE)
    }
}
