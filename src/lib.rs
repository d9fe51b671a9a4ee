// Library exports for survey-charts

pub mod chart;
pub mod coerce;
pub mod config;
pub mod data;
pub mod error;
pub mod filter;
pub mod graph;
pub mod mapping;
pub mod palette;
pub mod pipeline;
pub mod report;

pub use error::SurveyError;
pub use pipeline::run;

use log::LevelFilter;
use serde::Deserialize;
use std::{env, sync::OnceLock};

/// Pixel size of a distribution chart; the other chart kinds scale from it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_width() -> u32 { 1000 }
fn default_height() -> u32 { 600 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

static LOGGER: OnceLock<()> = OnceLock::new();

/// Install the env_logger backend once. `RUST_LOG` wins when set.
pub fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("survey_charts", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}
