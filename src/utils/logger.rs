use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

const DEFAULT_FILTER: &str = "warn,voicetrack=info";
const DEBUG_FILTER: &str = "warn,voicetrack=debug";

/// Инициализирует логгер; `RUST_LOG` имеет приоритет над `debug`
pub fn init_logger(debug: bool) {
    let default_filter = if debug { DEBUG_FILTER } else { DEFAULT_FILTER };

    if std::env::var("RUST_LOG").is_err() {
        // Use unsafe block for setting environment variables
        unsafe {
            std::env::set_var("RUST_LOG", default_filter);
        }
    }

    let env = Env::default().filter_or("RUST_LOG", default_filter);
    let mut builder = Builder::from_env(env);

    // Явно подавляем логи от HTTP-стека и декодеров
    builder
        .filter_module("hyper", LevelFilter::Warn)
        .filter_module("hyper_util", LevelFilter::Warn)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("rustls", LevelFilter::Warn)
        .filter_module("mio", LevelFilter::Error)
        .filter_module("symphonia", LevelFilter::Warn)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();
}
