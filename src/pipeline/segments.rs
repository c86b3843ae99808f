//! Разбиение клипов по секциям формата
//!
//! Разбиение определяется только профилем: интро есть, если
//! `intro_duration > 0`, аутро есть, если `outro_duration > 0`.

use std::fmt;

use crate::audio::SpeechClip;
use crate::config::FormatProfile;
use crate::errors::{AppError, AppResult};

/// Секция трека
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Intro,
    Content,
    Outro,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Section::Intro => "intro",
            Section::Content => "content",
            Section::Outro => "outro",
        })
    }
}

/// Слот: целевая длительность и начальная тишина секции
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub section: Section,
    pub target_ms: u64,
    pub initial_silence_ms: u64,
}

impl Slot {
    pub fn for_section(section: Section, profile: &FormatProfile) -> Self {
        let (target_ms, initial_silence_ms) = match section {
            Section::Intro => (profile.intro_duration, profile.intro_initial_silence),
            Section::Content => (profile.body_segment_duration, profile.body_initial_silence),
            Section::Outro => (profile.outro_duration, profile.outro_initial_silence),
        };
        Self {
            section,
            target_ms,
            initial_silence_ms,
        }
    }
}

/// Секция для каждой позиции из `count` клипов
pub fn section_layout(count: usize, profile: &FormatProfile) -> AppResult<Vec<Section>> {
    let fixed_slots = profile.fixed_slots();
    if count < fixed_slots {
        return Err(AppError::SegmentCardinality {
            clips: count,
            fixed_slots,
        });
    }

    let mut layout = Vec::with_capacity(count);
    if profile.has_intro() {
        layout.push(Section::Intro);
    }
    layout.extend(std::iter::repeat_n(Section::Content, count - fixed_slots));
    if profile.has_outro() {
        layout.push(Section::Outro);
    }
    Ok(layout)
}

/// Клипы, сгруппированные по секциям
#[derive(Debug)]
pub struct SegmentMap {
    pub intro: Option<SpeechClip>,
    pub content: Vec<SpeechClip>,
    pub outro: Option<SpeechClip>,
}

impl SegmentMap {
    /// Разбивает упорядоченные клипы: первый - интро, последний - аутро
    pub fn partition(clips: Vec<SpeechClip>, profile: &FormatProfile) -> AppResult<Self> {
        let fixed_slots = profile.fixed_slots();
        if clips.len() < fixed_slots {
            return Err(AppError::SegmentCardinality {
                clips: clips.len(),
                fixed_slots,
            });
        }

        let mut content = clips;
        let outro = if profile.has_outro() { content.pop() } else { None };
        let intro = if profile.has_intro() {
            Some(content.remove(0))
        } else {
            None
        };

        Ok(Self {
            intro,
            content,
            outro,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.content.len() + usize::from(self.intro.is_some()) + usize::from(self.outro.is_some())
    }

    /// Клипы с секциями в порядке обработки: интро, контент, аутро
    pub fn into_ordered(self) -> impl Iterator<Item = (Section, SpeechClip)> {
        self.intro
            .map(|clip| (Section::Intro, clip))
            .into_iter()
            .chain(self.content.into_iter().map(|clip| (Section::Content, clip)))
            .chain(self.outro.map(|clip| (Section::Outro, clip)))
    }
}
