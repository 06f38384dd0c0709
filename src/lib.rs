pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod geometry;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, CliConfig};

pub use config::toml_config::TomlConfig;
pub use core::{engine::ZoneEngine, pipeline::run_analysis, pipeline::ZonePipeline};
pub use utils::error::{Result, ZoneError};
