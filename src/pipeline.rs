use crate::chart::ChartContext;
use crate::coerce::{apply_data_types, LikertScale};
use crate::config::{DataSource, ReportConfig};
use crate::data::ResponseTable;
use crate::error::SurveyError;
use crate::mapping::{load_column_mapping, ColumnMapping};
use crate::palette::{resolve_palette, BrandColors};
use crate::report::{Outcome, RunSummary, Stage};
use log::{error, info, warn};

const PREVIEW_ROWS: usize = 5;

/// Run the whole report: load, rename, retype, filter, chart.
///
/// Fails only when the primary input cannot be loaded. Every other problem
/// is logged, recorded in the returned summary and skipped.
pub fn run(config: &ReportConfig) -> Result<RunSummary, SurveyError> {
    let mut table = match ResponseTable::load(&config.input) {
        Ok(table) => {
            info!("Data loaded successfully ({} responses)", table.row_count());
            table
        }
        Err(e) => {
            error!("{}", e);
            return Err(e);
        }
    };

    let mut summary = RunSummary::new(table.row_count());

    let mapping = match load_column_mapping(&config.mapping) {
        Outcome::Done(mapping) => {
            let unit = config.mapping.display().to_string();
            summary.record(Stage::Mapping, unit, &Outcome::Done(()));
            mapping
        }
        skipped => {
            let unit = config.mapping.display().to_string();
            summary.record(Stage::Mapping, unit, &skipped);
            inspect(&table);
            summary.inspect_only = true;
            summary.log();
            return Ok(summary);
        }
    };

    prepare(&mut table, &mapping, &config.likert, &mut summary);

    let subgroup = match config.subgroup.apply(&table) {
        Ok(subset) => {
            info!(
                "Found {} {} respondents out of {} total responses",
                subset.row_count(),
                config.subgroup.name,
                table.row_count()
            );
            summary.subgroup_rows = Some(subset.row_count());
            summary.record(Stage::Filter, &config.subgroup.name, &Outcome::Done(()));
            Some(subset)
        }
        Err(e) => {
            warn!("Cannot select {} respondents: {}", config.subgroup.name, e);
            summary.record::<()>(Stage::Filter, &config.subgroup.name, &Outcome::Skipped(e));
            None
        }
    };
    if let Some(subset) = &subgroup {
        info!(
            "First {} rows of the {} data:\n{}",
            PREVIEW_ROWS,
            config.subgroup.name,
            subset.head(PREVIEW_ROWS)
        );
        info!("{} data types:\n{}", config.subgroup.name, subset.describe());
    }

    let palette = resolve_palette(&config.brand_colors);
    summary.record(
        Stage::Palette,
        config.brand_colors.display().to_string(),
        &palette,
    );
    let palette = palette.done().flatten();
    let ctx = ChartContext {
        chart_dir: config.chart_dir.clone(),
        colors: BrandColors::resolve(palette.as_deref(), &config.fallback_colors),
        render: config.render.clone(),
    };

    for plan in &config.charts {
        let name = plan.request.describe();
        let source = match plan.source {
            DataSource::Full => Some(&table),
            DataSource::Subgroup => subgroup.as_ref(),
        };
        let outcome = match source {
            Some(source) => plan.request.render(source, &ctx),
            None => Outcome::Skipped(SurveyError::missing_column(&config.subgroup.column)),
        };
        summary.record(Stage::Chart, name, &outcome);
    }

    summary.log();
    Ok(summary)
}

/// Rename and retype `table` in place, recording each column's outcome.
pub fn prepare(
    table: &mut ResponseTable,
    mapping: &ColumnMapping,
    likert: &LikertScale,
    summary: &mut RunSummary,
) {
    if mapping.is_empty() {
        warn!("Column mapping has no entries; columns keep their loaded names and types");
    }
    let renamed = mapping.rename(table);
    info!(
        "Columns renamed ({} of {} mapping entries)",
        renamed,
        mapping.entries().len()
    );

    for report in apply_data_types(table, mapping, likert) {
        summary.record(Stage::Coercion, report.column, &report.outcome);
    }
}

/// Reduced path for when no mapping is available: show what was loaded.
fn inspect(table: &ResponseTable) {
    info!(
        "First {} rows of the survey data:\n{}",
        PREVIEW_ROWS,
        table.head(PREVIEW_ROWS)
    );
    info!("Data types:\n{}", table.describe());
}
