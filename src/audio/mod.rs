//! # Audio
//!
//! In-memory клипы и кодеки.

pub mod clip;
pub mod codec;

pub use clip::{SpeechClip, ms_to_samples, samples_to_ms};
pub use codec::{decode_audio_bytes, decode_clip, encode_mp3, encode_wav, resample};
