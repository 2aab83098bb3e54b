pub mod cli;
pub mod toml_config;

use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BULK_DATA_URL: &str = "https://api.scryfall.com/bulk-data";
pub const DEFAULT_BULK_DATA_TYPE: &str = "default_cards";
pub const DEFAULT_DATA_DIR: &str = "app/data";
pub const DEFAULT_DATABASE_FILENAME: &str = "cards.db";
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Options for the card database build (the image's data-preparation step).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "bling-deck"))]
#[cfg_attr(
    feature = "cli",
    command(about = "Build the card lookup database from Scryfall bulk data")
)]
pub struct CliConfig {
    #[cfg_attr(feature = "cli", arg(long, default_value = DEFAULT_BULK_DATA_URL))]
    pub bulk_data_url: String,

    #[cfg_attr(feature = "cli", arg(long, default_value = DEFAULT_BULK_DATA_TYPE))]
    pub bulk_type: String,

    #[cfg_attr(feature = "cli", arg(long, default_value = DEFAULT_DATA_DIR))]
    pub data_dir: String,

    #[cfg_attr(feature = "cli", arg(long, default_value = DEFAULT_DATABASE_FILENAME))]
    pub database_file: String,

    #[cfg_attr(feature = "cli", arg(long, default_value_t = DEFAULT_BATCH_SIZE))]
    pub batch_size: usize,

    #[cfg_attr(feature = "cli", arg(long, help = "Log CPU and memory after each phase"))]
    pub monitor: bool,

    #[cfg_attr(feature = "cli", arg(short, long, help = "Enable verbose output"))]
    pub verbose: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            bulk_data_url: DEFAULT_BULK_DATA_URL.to_string(),
            bulk_type: DEFAULT_BULK_DATA_TYPE.to_string(),
            data_dir: DEFAULT_DATA_DIR.to_string(),
            database_file: DEFAULT_DATABASE_FILENAME.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            monitor: false,
            verbose: false,
        }
    }
}

impl ConfigProvider for CliConfig {
    fn bulk_data_url(&self) -> &str {
        &self.bulk_data_url
    }

    fn bulk_data_type(&self) -> &str {
        &self.bulk_type
    }

    fn database_filename(&self) -> &str {
        &self.database_file
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("bulk_data_url", &self.bulk_data_url)?;
        validation::validate_non_empty_string("bulk_type", &self.bulk_type)?;
        validation::validate_path("data_dir", &self.data_dir)?;
        validation::validate_path("database_file", &self.database_file)?;
        validation::validate_positive_number("batch_size", self.batch_size, 1)?;
        Ok(())
    }
}
