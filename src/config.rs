use crate::chart::{ChartRequest, DistributionRequest, ReasonColumn, ReasonsRequest};
use crate::coerce::LikertScale;
use crate::filter::Subgroup;
use crate::palette::FallbackColors;
use crate::RenderOptions;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Which table a chart reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Every response.
    Full,
    /// Only the configured subgroup.
    #[default]
    Subgroup,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChartPlan {
    #[serde(default)]
    pub source: DataSource,
    #[serde(flatten)]
    pub request: ChartRequest,
}

/// Settings for one report run. Every field has a default, so a config file
/// only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub input: PathBuf,
    pub mapping: PathBuf,
    pub brand_colors: PathBuf,
    pub chart_dir: PathBuf,
    pub render: RenderOptions,
    pub fallback_colors: FallbackColors,
    pub likert: LikertScale,
    pub subgroup: Subgroup,
    pub charts: Vec<ChartPlan>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("survey_responses.xlsx"),
            mapping: PathBuf::from("column_mapping.xlsx"),
            brand_colors: PathBuf::from("BrandColours.md"),
            chart_dir: PathBuf::from("charts"),
            render: RenderOptions::default(),
            fallback_colors: FallbackColors::default(),
            likert: LikertScale::default(),
            subgroup: Subgroup::default(),
            charts: default_charts(),
        }
    }
}

impl ReportConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {:?}", path))
    }
}

fn distribution(source: DataSource, column: &str, chart_name: &str, title: &str) -> ChartPlan {
    ChartPlan {
        source,
        request: ChartRequest::Distribution(DistributionRequest {
            column: column.to_string(),
            title: Some(title.to_string()),
            highlight: None,
            chart_name: Some(chart_name.to_string()),
        }),
    }
}

/// The standard end-of-season report.
pub fn default_charts() -> Vec<ChartPlan> {
    let mut charts = vec![
        distribution(
            DataSource::Subgroup,
            "desired_masters_season_extension",
            "desired_masters_season_extension_distribution",
            "Desired Masters Season Extension",
        ),
        distribution(
            DataSource::Subgroup,
            "prefer_canning_bridge_masters",
            "prefer_canning_bridge_masters_distribution",
            "Preference for Canning Bridge for Masters Regattas",
        ),
        distribution(
            DataSource::Subgroup,
            "prefer_champion_lakes_masters",
            "prefer_champion_lakes_masters_distribution",
            "Preference for Champion Lakes for Masters Regattas",
        ),
        distribution(
            DataSource::Subgroup,
            "support_1st_place_medals_masters",
            "support_1st_place_medals_masters_distribution",
            "Support for 1st Place Medals for Masters",
        ),
    ];

    for (column, title) in [
        ("rating_promotion_governance", "Rating of Promotion and Governance"),
        ("rating_accessibility", "Rating of Accessibility"),
        ("rating_positive_experience", "Rating of Positive Experience"),
        ("rating_high_performance_pathways", "Rating of High-Performance Pathways"),
    ] {
        let name = format!("{}_distribution", column);
        charts.push(distribution(DataSource::Full, column, &name, title));
    }

    let reasons = [
        ("reason_recreational_time_commitment", "Time Commitment"),
        ("reason_recreational_skill_level", "Skill Level"),
        ("reason_recreational_cost", "Cost"),
        ("reason_recreational_social_aspect", "Prefer Social Aspect"),
    ];
    charts.push(ChartPlan {
        source: DataSource::Subgroup,
        request: ChartRequest::ReasonsSummary(ReasonsRequest {
            reasons: reasons
                .iter()
                .map(|(column, label)| ReasonColumn {
                    column: column.to_string(),
                    label: label.to_string(),
                })
                .collect(),
            title: Some("Primary Reasons Masters Rowers Do Not Compete".to_string()),
            chart_name: Some("masters_reasons_not_competing".to_string()),
        }),
    });

    charts.push(distribution(
        DataSource::Subgroup,
        "support_transition_to_competitive",
        "masters_support_transition_to_competitive",
        "Support for Transitioning to Competitive Rowing (Masters)",
    ));
    charts
}
