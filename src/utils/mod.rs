pub mod common;
pub mod logger;

pub use common::sanitize_filename;
pub use logger::init_logger;
