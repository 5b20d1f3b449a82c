// Camwatch - camera presence reconciliation library

pub mod constants;
pub mod error;
pub mod tools;
pub mod config;
pub mod db;
pub mod camera;
pub mod probe;
pub mod reconcile;

use env_logger::Env;
use log::LevelFilter;

pub use config::Config;
pub use error::{CamwatchError, Result};
pub use reconcile::worker::{start_reconciliation_loop, LoopHandle, SessionFactory, SqliteSessionFactory};

/// Install the env_logger backend. RUST_LOG, when set, wins over `level`.
pub fn init_logging(level: LevelFilter) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(level.as_str()));
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}
