//! voicetrack: озвучка коротких видео (quiz, would-you-rather) с подгонкой
//! сегментов под слоты формата.

pub mod audio;
pub mod config;
pub mod errors;
pub mod events;
pub mod export;
pub mod models;
pub mod pipeline;
pub mod tts;
pub mod utils;

pub use errors::{AppError, AppResult};
