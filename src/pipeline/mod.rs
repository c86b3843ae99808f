//! Конвейер сборки озвучки: разбиение, нормализация, сборка, пакетный запуск

pub mod assembler;
pub mod batch;
pub mod normalizer;
pub mod segments;

pub use assembler::{FinalTrack, assemble, expected_total_ms, validate};
pub use batch::{BatchReport, BatchRunner, UnitFilter, UnitOutcome, UnitReport, check_config, run_batch};
pub use normalizer::{normalize, pad_to_slot};
pub use segments::{Section, SegmentMap, Slot, section_layout};
