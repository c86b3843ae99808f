//! Сборка итогового трека и проверка длительности

use log::debug;

use crate::audio::SpeechClip;
use crate::config::FormatProfile;
use crate::errors::{AppError, AppResult, DurationExceededError, DurationViolation};
use crate::pipeline::segments::{Section, Slot};

/// Итоговый трек одного видео на одном языке.
///
/// Хранит длительности участников, чтобы проверка работала уже после
/// того, как сами клипы склеены.
#[derive(Debug, PartialEq)]
pub struct FinalTrack {
    clip: SpeechClip,
    segments: Vec<(Section, u64)>,
}

impl FinalTrack {
    pub fn empty(sample_rate: u32) -> Self {
        Self {
            clip: SpeechClip::new(Vec::new(), sample_rate),
            segments: Vec::new(),
        }
    }

    pub fn clip(&self) -> &SpeechClip {
        &self.clip
    }

    /// Секции и длительности участников в порядке склейки
    pub fn segments(&self) -> &[(Section, u64)] {
        &self.segments
    }

    pub fn sample_rate(&self) -> u32 {
        self.clip.sample_rate()
    }

    pub fn duration_ms(&self) -> u64 {
        self.clip.duration_ms()
    }

    fn push(&mut self, section: Section, clip: SpeechClip) -> AppResult<()> {
        let duration_ms = clip.duration_ms();
        self.clip.append(clip)?;
        self.segments.push((section, duration_ms));
        Ok(())
    }

    /// Приклеивает другой трек в конец
    pub fn append(&mut self, other: FinalTrack) -> AppResult<()> {
        self.clip.append(other.clip)?;
        self.segments.extend(other.segments);
        Ok(())
    }
}

/// Склеивает обработанные клипы без потерь и промежутков
pub fn assemble(
    processed: Vec<SpeechClip>,
    sections: &[Section],
    sample_rate: u32,
) -> AppResult<FinalTrack> {
    if processed.len() != sections.len() {
        return Err(AppError::AudioProcessing(format!(
            "{} clip(s) given for {} section(s)",
            processed.len(),
            sections.len()
        )));
    }

    let mut track = FinalTrack::empty(sample_rate);
    for (clip, &section) in processed.into_iter().zip(sections) {
        track.push(section, clip)?;
    }

    debug!(
        "Assembled {} segment(s) into a {}ms track",
        track.segments.len(),
        track.duration_ms()
    );
    Ok(track)
}

/// Ожидаемая длительность: сумма целевых длительностей по позициям
pub fn expected_total_ms(sections: &[Section], profile: &FormatProfile) -> u64 {
    sections
        .iter()
        .map(|&section| Slot::for_section(section, profile).target_ms)
        .sum()
}

/// Проверяет трек: итог не длиннее ожидаемого, каждый сегмент не длиннее слота.
///
/// Все нарушения собираются в одну ошибку.
pub fn validate(track: &FinalTrack, profile: &FormatProfile) -> Result<(), DurationExceededError> {
    let sections: Vec<Section> = track.segments.iter().map(|(section, _)| *section).collect();
    let expected_ms = expected_total_ms(&sections, profile);
    let actual_ms = track.duration_ms();

    let mut violations = Vec::new();
    if actual_ms > expected_ms {
        violations.push(DurationViolation::Total {
            actual_ms,
            expected_ms,
        });
    }

    for (index, &(section, segment_ms)) in track.segments.iter().enumerate() {
        let target_ms = Slot::for_section(section, profile).target_ms;
        if segment_ms > target_ms {
            violations.push(DurationViolation::Segment {
                index,
                section,
                actual_ms: segment_ms,
                target_ms,
            });
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(DurationExceededError { violations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalizer::normalize;
    use crate::pipeline::segments::section_layout;

    const RATE: u32 = 8000;

    fn profile(intro: u64, outro: u64) -> FormatProfile {
        FormatProfile {
            intro_duration: intro,
            outro_duration: outro,
            body_segment_duration: 3000,
            intro_initial_silence: 0,
            outro_initial_silence: 0,
            body_initial_silence: 0,
        }
    }

    fn clips(durations: &[u64]) -> Vec<SpeechClip> {
        durations
            .iter()
            .map(|&ms| SpeechClip::new(vec![0.25; crate::audio::ms_to_samples(ms, RATE)], RATE))
            .collect()
    }

    fn run(durations: &[u64], profile: &FormatProfile) -> FinalTrack {
        let sections = section_layout(durations.len(), profile).unwrap();
        let processed = normalize(clips(durations), profile).unwrap();
        assemble(processed, &sections, RATE).unwrap()
    }

    #[test]
    fn test_duration_is_sum_of_members() {
        let sections = [Section::Content, Section::Content, Section::Content];
        let track = assemble(clips(&[100, 250, 650]), &sections, RATE).unwrap();
        assert_eq!(track.duration_ms(), 1000);
        assert_eq!(
            track.segments(),
            &[(Section::Content, 100), (Section::Content, 250), (Section::Content, 650)]
        );
    }

    #[test]
    fn test_append_is_associative() {
        let sections = [Section::Intro, Section::Content, Section::Content, Section::Outro];
        let whole = assemble(clips(&[10, 20, 30, 40]), &sections, RATE).unwrap();

        let mut head = assemble(clips(&[10, 20]), &sections[..2], RATE).unwrap();
        let tail = assemble(clips(&[30, 40]), &sections[2..], RATE).unwrap();
        head.append(tail).unwrap();

        assert_eq!(head, whole);

        let mut empty = FinalTrack::empty(RATE);
        empty.append(whole).unwrap();
        assert_eq!(empty.duration_ms(), 100);
    }

    #[test]
    fn test_section_count_mismatch() {
        let result = assemble(clips(&[10, 20]), &[Section::Content], RATE);
        assert!(matches!(result, Err(AppError::AudioProcessing(_))));
    }

    #[test]
    fn test_scenario_all_fit_passes_validation() {
        let fmt = profile(1000, 1000);
        let track = run(&[800, 2500, 2500, 900], &fmt);
        assert_eq!(track.duration_ms(), 8000);
        assert!(validate(&track, &fmt).is_ok());
    }

    #[test]
    fn test_scenario_long_outro_reports_all_violations() {
        let fmt = profile(1000, 1000);
        let track = run(&[800, 2500, 2500, 1500], &fmt);

        let error = validate(&track, &fmt).unwrap_err();
        assert_eq!(
            error.violations,
            vec![
                DurationViolation::Total {
                    actual_ms: 8500,
                    expected_ms: 8000
                },
                DurationViolation::Segment {
                    index: 3,
                    section: Section::Outro,
                    actual_ms: 1500,
                    target_ms: 1000
                },
            ]
        );
    }

    #[test]
    fn test_segment_overrun_without_total_overrun() {
        let fmt = profile(1000, 1000);
        // интро 1200 съедает 200 из добивки первого контента
        let track = run(&[1200, 2000, 2000, 500], &fmt);
        assert_eq!(track.duration_ms(), 8000);

        let error = validate(&track, &fmt).unwrap_err();
        assert_eq!(error.violations.len(), 1);
        assert!(matches!(
            error.violations[0],
            DurationViolation::Segment {
                section: Section::Intro,
                ..
            }
        ));
    }

    #[test]
    fn test_everything_is_content_without_fixed_sections() {
        let fmt = profile(0, 0);
        let track = run(&[800, 2500, 2500, 900], &fmt);
        assert!(track.segments().iter().all(|(s, _)| *s == Section::Content));
        assert_eq!(track.duration_ms(), 12000);
        assert!(validate(&track, &fmt).is_ok());
    }

    #[test]
    fn test_expected_total_differs_from_fixed_two_slot_formula() {
        let fmt = profile(0, 0);
        let sections = section_layout(4, &fmt).unwrap();

        // старая формула всегда вычитала два сегмента под интро и аутро
        let legacy = fmt.intro_duration
            + fmt.body_segment_duration * (sections.len() as u64 - 2)
            + fmt.outro_duration;
        let expected = expected_total_ms(&sections, &fmt);

        assert_eq!(legacy, 6000);
        assert_eq!(expected, 12000);

        // с интро и аутро формулы совпадают
        let both = profile(1000, 1000);
        let sections = section_layout(4, &both).unwrap();
        assert_eq!(expected_total_ms(&sections, &both), 8000);
    }

    #[test]
    fn test_empty_track_is_valid() {
        let fmt = profile(0, 0);
        assert!(validate(&FinalTrack::empty(RATE), &fmt).is_ok());
    }
}
