use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use survey_charts::config::ReportConfig;

#[derive(Parser, Debug)]
#[command(name = "survey-charts")]
#[command(about = "Clean survey responses and render descriptive bar charts", long_about = None)]
struct Args {
    /// JSON report configuration; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Survey responses spreadsheet (.xlsx, .xls, .ods or .csv)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Column mapping spreadsheet with old_name, new_name and recommended_type
    #[arg(short, long)]
    mapping: Option<PathBuf>,

    /// Brand styling document with `HEX:` color lines
    #[arg(long)]
    brand_colors: Option<PathBuf>,

    /// Directory the charts are written to
    #[arg(long)]
    chart_dir: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<ReportConfig> {
        let mut config = match &self.config {
            Some(path) => ReportConfig::load(path)?,
            None => ReportConfig::default(),
        };
        if let Some(input) = self.input {
            config.input = input;
        }
        if let Some(mapping) = self.mapping {
            config.mapping = mapping;
        }
        if let Some(brand_colors) = self.brand_colors {
            config.brand_colors = brand_colors;
        }
        if let Some(chart_dir) = self.chart_dir {
            config.chart_dir = chart_dir;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    survey_charts::init_logging();
    let args = Args::parse();

    let config = args.into_config().context("Failed to build report configuration")?;

    survey_charts::run(&config).context("Report aborted")?;

    Ok(())
}
