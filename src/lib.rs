pub mod app;
pub mod catalog;
pub mod config;
pub mod core;
pub mod domain;
pub mod image;
#[cfg(feature = "cli")]
pub mod supervisor;
pub mod utils;

pub use app::pipelines::CardDbPipeline;
pub use config::{cli::LocalStorage, toml_config::ImageConfig, CliConfig};
pub use core::etl::EtlEngine;
pub use utils::error::{BlingError, Result};
