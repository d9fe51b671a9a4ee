//! Chart requests and the policies that turn table columns into bars.
//!
//! Counting and ordering are plain functions over the table so they can be
//! checked without drawing anything; `render_*` wrap them with the
//! missing-column guard, the canvas and the file write.

use crate::data::{compare_labels, Column, ColumnKind, ResponseTable, Value};
use crate::error::SurveyError;
use crate::graph::{AxisLabels, Bar, BarSeries, Canvas};
use crate::palette::BrandColors;
use crate::report::Outcome;
use crate::RenderOptions;
use log::info;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Where and how charts are written for one run.
#[derive(Debug, Clone)]
pub struct ChartContext {
    pub chart_dir: PathBuf,
    pub colors: BrandColors,
    pub render: RenderOptions,
}

/// Bar per category of one column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DistributionRequest {
    pub column: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Category drawn in the highlight color.
    #[serde(default)]
    pub highlight: Option<String>,
    #[serde(default)]
    pub chart_name: Option<String>,
}

/// Paired bars comparing the categories of two columns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComparisonRequest {
    pub first: String,
    pub second: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub chart_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReasonColumn {
    pub column: String,
    pub label: String,
}

/// Citation counts for a set of 0/1 indicator columns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReasonsRequest {
    pub reasons: Vec<ReasonColumn>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub chart_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartRequest {
    Distribution(DistributionRequest),
    Comparison(ComparisonRequest),
    ReasonsSummary(ReasonsRequest),
}

impl ChartRequest {
    /// Output file name, from the explicit name or the column name(s).
    pub fn file_name(&self) -> String {
        let (explicit, derived) = match self {
            ChartRequest::Distribution(r) => {
                (&r.chart_name, format!("{}_distribution", r.column))
            }
            ChartRequest::Comparison(r) => (
                &r.chart_name,
                format!("{}_{}_comparison", r.first, r.second),
            ),
            ChartRequest::ReasonsSummary(r) => (&r.chart_name, "reasons_summary".to_string()),
        };
        format!("{}.png", explicit.clone().unwrap_or(derived))
    }

    /// Short name used in logs and the run summary.
    pub fn describe(&self) -> String {
        self.file_name().trim_end_matches(".png").to_string()
    }

    pub fn render(&self, table: &ResponseTable, ctx: &ChartContext) -> Outcome<PathBuf> {
        match self {
            ChartRequest::Distribution(r) => render_distribution(table, r, ctx),
            ChartRequest::Comparison(r) => render_comparison(table, r, ctx),
            ChartRequest::ReasonsSummary(r) => render_reasons_summary(table, r, ctx),
        }
    }
}

/// Categories of `column` with their counts, in display order.
///
/// Ordered categorical columns follow their levels, empty levels included.
/// Everything else is ranked by descending count, ties in order of first
/// appearance; unused levels of an unordered categorical go last.
pub fn distribution_counts(column: &Column) -> Vec<(String, usize)> {
    let (labels, counts) = count_labels(column);

    if let Some(levels) = column.kind.ordered_levels() {
        return levels
            .iter()
            .map(|l| (l.clone(), counts.get(l).copied().unwrap_or(0)))
            .collect();
    }

    let mut ranked: Vec<(String, usize)> = labels
        .into_iter()
        .map(|l| {
            let n = counts[&l];
            (l, n)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    if let ColumnKind::Category { levels, .. } = &column.kind {
        for level in levels {
            if !counts.contains_key(level) {
                ranked.push((level.clone(), 0));
            }
        }
    }
    ranked
}

/// Counts for two columns over the union of their categories.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonCounts {
    pub categories: Vec<String>,
    pub first: Vec<usize>,
    pub second: Vec<usize>,
}

pub fn comparison_counts(first: &Column, second: &Column) -> ComparisonCounts {
    let (first_labels, first_counts) = count_labels(first);
    let (second_labels, second_counts) = count_labels(second);

    let levels: Vec<String> = first
        .kind
        .ordered_levels()
        .or_else(|| second.kind.ordered_levels())
        .map(|l| l.to_vec())
        .unwrap_or_default();

    let mut rest: Vec<String> = first_labels
        .into_iter()
        .chain(second_labels)
        .filter(|l| !levels.contains(l))
        .collect();
    rest.sort_by(|a, b| compare_labels(a, b));
    rest.dedup();

    let categories: Vec<String> = levels
        .into_iter()
        .filter(|l| first_counts.contains_key(l) || second_counts.contains_key(l))
        .chain(rest)
        .collect();

    let lookup = |counts: &HashMap<String, usize>| -> Vec<usize> {
        categories
            .iter()
            .map(|c| counts.get(c).copied().unwrap_or(0))
            .collect()
    };
    let first = lookup(&first_counts);
    let second = lookup(&second_counts);
    ComparisonCounts {
        categories,
        first,
        second,
    }
}

/// Sum of each reason column read as 0/1 indicators, relabelled and sorted
/// by descending count. Ties keep the request order.
pub fn reason_counts(
    table: &ResponseTable,
    reasons: &[ReasonColumn],
) -> Result<Vec<(String, f64)>, SurveyError> {
    let mut counts = Vec::with_capacity(reasons.len());
    for reason in reasons {
        let column = table
            .column(&reason.column)
            .ok_or_else(|| SurveyError::missing_column(&reason.column))?;
        let total: f64 = column.values.iter().map(indicator).sum();
        counts.push((reason.label.clone(), total));
    }
    counts.sort_by(|a, b| b.1.total_cmp(&a.1));
    Ok(counts)
}

fn indicator(value: &Value) -> f64 {
    match value {
        Value::Missing => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Int(_) | Value::Float(_) => value.as_number().unwrap_or(0.0),
        Value::Text(_) | Value::Category(_) => value
            .as_number()
            .or_else(|| crate::coerce::parse_bool(value).map(|b| f64::from(u8::from(b))))
            .unwrap_or(0.0),
    }
}

/// Distinct labels in first-appearance order plus their counts.
fn count_labels(column: &Column) -> (Vec<String>, HashMap<String, usize>) {
    let mut order = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in column.values.iter().filter_map(Value::label) {
        let n = counts.entry(label.clone()).or_insert(0);
        if *n == 0 {
            order.push(label);
        }
        *n += 1;
    }
    (order, counts)
}

/// Bars in the default color, except the one whose label equals `highlight`.
/// A highlight naming no category leaves every bar in the default color.
pub fn highlight_bars(
    counts: Vec<(String, usize)>,
    highlight: Option<&str>,
    colors: &BrandColors,
) -> Vec<Bar> {
    counts
        .into_iter()
        .map(|(label, n)| Bar {
            color: if highlight == Some(label.as_str()) {
                colors.highlight
            } else {
                colors.default
            },
            label,
            value: n as f64,
        })
        .collect()
}

fn require<'a>(table: &'a ResponseTable, column: &str) -> Result<&'a Column, SurveyError> {
    table
        .column(column)
        .ok_or_else(|| SurveyError::missing_column(column))
}

pub fn render_distribution(
    table: &ResponseTable,
    request: &DistributionRequest,
    ctx: &ChartContext,
) -> Outcome<PathBuf> {
    let column = match require(table, &request.column) {
        Ok(c) => c,
        Err(e) => return Outcome::Skipped(e),
    };

    if let Some(levels) = column.kind.ordered_levels() {
        info!("Using ordered categories for '{}': {:?}", column.name, levels);
    }
    let bars = highlight_bars(
        distribution_counts(column),
        request.highlight.as_deref(),
        &ctx.colors,
    );

    let title = request
        .title
        .clone()
        .unwrap_or_else(|| format!("Distribution of Responses for \"{}\"", request.column));
    let axes = AxisLabels {
        x: "Count".to_string(),
        y: "Response".to_string(),
    };
    let chart = ChartRequest::Distribution(request.clone());
    draw_and_save(&chart, ctx, &ctx.render, title, |canvas| {
        canvas.draw_horizontal_bars(&bars, &axes)
    })
}

pub fn render_comparison(
    table: &ResponseTable,
    request: &ComparisonRequest,
    ctx: &ChartContext,
) -> Outcome<PathBuf> {
    let (first, second) = match (require(table, &request.first), require(table, &request.second)) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => return Outcome::Skipped(e),
    };

    let counts = comparison_counts(first, second);
    let series = vec![
        BarSeries {
            name: request.first.clone(),
            values: counts.first.iter().map(|&n| n as f64).collect(),
            color: ctx.colors.default,
        },
        BarSeries {
            name: request.second.clone(),
            values: counts.second.iter().map(|&n| n as f64).collect(),
            color: ctx.colors.secondary,
        },
    ];

    let title = request.title.clone().unwrap_or_else(|| {
        format!(
            "Comparison of '{}' and '{}' Responses",
            request.first, request.second
        )
    });
    let axes = AxisLabels {
        x: "Response Categories".to_string(),
        y: "Count".to_string(),
    };
    let size = RenderOptions {
        width: ctx.render.width * 6 / 5,
        height: ctx.render.height * 4 / 3,
    };
    let chart = ChartRequest::Comparison(request.clone());
    draw_and_save(&chart, ctx, &size, title, |canvas| {
        canvas.draw_grouped_bars(&counts.categories, &series, &axes)
    })
}

pub fn render_reasons_summary(
    table: &ResponseTable,
    request: &ReasonsRequest,
    ctx: &ChartContext,
) -> Outcome<PathBuf> {
    let counts = match reason_counts(table, &request.reasons) {
        Ok(c) => c,
        Err(e) => return Outcome::Skipped(e),
    };
    let bars: Vec<Bar> = counts
        .into_iter()
        .map(|(label, value)| Bar {
            label,
            value,
            color: ctx.colors.default,
        })
        .collect();

    let axes = AxisLabels {
        x: "Number of Respondents Citing Reason".to_string(),
        y: "Reason".to_string(),
    };
    let size = RenderOptions {
        width: ctx.render.width,
        height: ctx.render.height * 7 / 6,
    };
    let chart = ChartRequest::ReasonsSummary(request.clone());
    let title = request.title.clone().unwrap_or_default();
    draw_and_save(&chart, ctx, &size, title, |canvas| {
        canvas.draw_horizontal_bars(&bars, &axes)
    })
}

/// Draw on a fresh canvas and write the PNG. The canvas lives only inside
/// this call.
fn draw_and_save<F>(
    chart: &ChartRequest,
    ctx: &ChartContext,
    size: &RenderOptions,
    title: String,
    draw: F,
) -> Outcome<PathBuf>
where
    F: FnOnce(&mut Canvas) -> anyhow::Result<()>,
{
    let png = (|| {
        let mut canvas = Canvas::new(size.width, size.height, title)?;
        draw(&mut canvas)?;
        canvas.render()
    })();
    let png = match png {
        Ok(bytes) => bytes,
        Err(e) => {
            return Outcome::Skipped(SurveyError::Render {
                chart: chart.describe(),
                message: format!("{:#}", e),
            })
        }
    };

    match write_chart(&ctx.chart_dir, &chart.file_name(), &png) {
        Ok(path) => {
            info!("Chart saved to '{}'", path.display());
            Outcome::Done(path)
        }
        Err(e) => Outcome::Skipped(e),
    }
}

fn write_chart(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, SurveyError> {
    let io_err = |path: &Path, e: std::io::Error| SurveyError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    let path = dir.join(file_name);
    fs::write(&path, bytes).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::LikertScale;

    fn column(name: &str, values: &[&str]) -> Column {
        Column::new(name, values.iter().map(|v| Value::infer(v)).collect())
    }

    fn likert_column(name: &str, labels: &[&str]) -> Column {
        let scale = LikertScale::default();
        Column {
            name: name.to_string(),
            kind: ColumnKind::Category {
                levels: scale.labels.clone(),
                ordered: true,
            },
            values: labels
                .iter()
                .map(|l| Value::Category(l.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_distribution_frequency_order() {
        let col = column("season", &["Yes", "No", "", "No", "Unsure", "No", "Yes"]);
        assert_eq!(
            distribution_counts(&col),
            vec![
                ("No".to_string(), 3),
                ("Yes".to_string(), 2),
                ("Unsure".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_distribution_ordered_keeps_empty_levels() {
        let col = likert_column("rating_accessibility", &["Agree", "Agree", "Strongly Disagree"]);
        let counts = distribution_counts(&col);
        let labels: Vec<&str> = counts.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Strongly Disagree", "Disagree", "Neutral", "Agree", "Strongly Agree"]
        );
        let values: Vec<usize> = counts.iter().map(|(_, n)| *n).collect();
        assert_eq!(values, vec![1, 0, 0, 2, 0]);
    }

    #[test]
    fn test_distribution_unordered_category_appends_unused_levels() {
        let col = Column {
            name: "venue".to_string(),
            kind: ColumnKind::Category {
                levels: vec!["A".to_string(), "B".to_string(), "C".to_string()],
                ordered: false,
            },
            values: ["C", "A", "C"]
                .iter()
                .map(|l| Value::Category(l.to_string()))
                .collect(),
        };
        let labels: Vec<String> = distribution_counts(&col).into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_comparison_union_and_zero_fill() {
        let a = column("prefer_a", &["1", "2", "2", ""]);
        let b = column("prefer_b", &["2", "3", "10"]);
        let counts = comparison_counts(&a, &b);
        assert_eq!(counts.categories, vec!["1", "2", "3", "10"]);
        assert_eq!(counts.first, vec![1, 2, 0, 0]);
        assert_eq!(counts.second, vec![0, 1, 1, 1]);
    }

    #[test]
    fn test_comparison_keeps_numeric_spellings_apart() {
        let a = Column::new("a", vec![Value::Int(1), Value::Text("01".to_string())]);
        let b = Column::new("b", vec![Value::Int(1)]);
        let counts = comparison_counts(&a, &b);
        assert_eq!(counts.categories, vec!["01", "1"]);
        assert_eq!(counts.first, vec![1, 1]);
        assert_eq!(counts.second, vec![0, 1]);
    }

    #[test]
    fn test_comparison_follows_ordered_levels() {
        let a = likert_column("a", &["Agree", "Disagree"]);
        let b = likert_column("b", &["Strongly Agree"]);
        let counts = comparison_counts(&a, &b);
        assert_eq!(counts.categories, vec!["Disagree", "Agree", "Strongly Agree"]);
        assert_eq!(counts.second, vec![0, 0, 1]);
    }

    #[test]
    fn test_reason_counts_example() {
        let table = ResponseTable::from_columns(vec![
            column("a", &["1", "0", "1"]),
            column("b", &["0", "0", "1"]),
        ])
        .unwrap();
        let reasons = vec![
            ReasonColumn {
                column: "b".to_string(),
                label: "Time".to_string(),
            },
            ReasonColumn {
                column: "a".to_string(),
                label: "Cost".to_string(),
            },
        ];
        let counts = reason_counts(&table, &reasons).unwrap();
        assert_eq!(
            counts,
            vec![("Cost".to_string(), 2.0), ("Time".to_string(), 1.0)]
        );
    }

    #[test]
    fn test_reason_counts_booleans_and_missing() {
        let table = ResponseTable::from_columns(vec![Column::new(
            "social",
            vec![
                Value::Bool(true),
                Value::Missing,
                Value::Text("yes".to_string()),
                Value::Bool(false),
            ],
        )])
        .unwrap();
        let reasons = vec![ReasonColumn {
            column: "social".to_string(),
            label: "Social".to_string(),
        }];
        assert_eq!(reason_counts(&table, &reasons).unwrap()[0].1, 2.0);
    }

    #[test]
    fn test_file_names() {
        let dist = ChartRequest::Distribution(DistributionRequest {
            column: "rating_accessibility".to_string(),
            title: None,
            highlight: None,
            chart_name: None,
        });
        assert_eq!(dist.file_name(), "rating_accessibility_distribution.png");

        let cmp = ChartRequest::Comparison(ComparisonRequest {
            first: "a".to_string(),
            second: "b".to_string(),
            title: None,
            chart_name: None,
        });
        assert_eq!(cmp.file_name(), "a_b_comparison.png");

        let named = ChartRequest::ReasonsSummary(ReasonsRequest {
            reasons: vec![],
            title: None,
            chart_name: Some("masters_reasons_not_competing".to_string()),
        });
        assert_eq!(named.file_name(), "masters_reasons_not_competing.png");
    }

    #[test]
    fn test_missing_column_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ChartContext {
            chart_dir: dir.path().join("charts"),
            colors: BrandColors::default(),
            render: RenderOptions::default(),
        };
        let table = ResponseTable::from_columns(vec![column("a", &["1"])]).unwrap();
        let request = ChartRequest::Comparison(ComparisonRequest {
            first: "a".to_string(),
            second: "ghost".to_string(),
            title: None,
            chart_name: None,
        });
        let outcome = request.render(&table, &ctx);
        assert_eq!(outcome, Outcome::Skipped(SurveyError::missing_column("ghost")));
        assert!(!ctx.chart_dir.exists());
    }

    #[test]
    fn test_highlight_colors_only_matching_bar() {
        let colors = BrandColors::default();
        let counts = vec![("Yes".to_string(), 3), ("No".to_string(), 2)];

        let bars = highlight_bars(counts.clone(), Some("No"), &colors);
        let fills: Vec<_> = bars.iter().map(|b| b.color).collect();
        assert_eq!(fills, vec![colors.default, colors.highlight]);
        assert_eq!(bars[1].value, 2.0);

        let bars = highlight_bars(counts, Some("Maybe"), &colors);
        assert!(bars.iter().all(|b| b.color == colors.default));
    }

    #[test]
    fn test_render_failure_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ChartContext {
            chart_dir: dir.path().join("charts"),
            colors: BrandColors::default(),
            render: RenderOptions {
                width: 0,
                height: 0,
            },
        };
        let table = ResponseTable::from_columns(vec![column("age", &["27-40"])]).unwrap();
        let request = ChartRequest::Distribution(DistributionRequest {
            column: "age".to_string(),
            title: None,
            highlight: None,
            chart_name: None,
        });

        match request.render(&table, &ctx) {
            Outcome::Skipped(SurveyError::Render { chart, .. }) => {
                assert_eq!(chart, "age_distribution")
            }
            other => panic!("expected a render failure, got {:?}", other),
        }
        assert!(!ctx.chart_dir.exists());
    }

    #[test]
    fn test_deserialize_request() {
        let json = r#"{"kind": "distribution", "column": "age_category", "highlight": "41-60"}"#;
        let request: ChartRequest = serde_json::from_str(json).unwrap();
        match request {
            ChartRequest::Distribution(r) => {
                assert_eq!(r.column, "age_category");
                assert_eq!(r.highlight.as_deref(), Some("41-60"));
            }
            other => panic!("unexpected request {:?}", other),
        }
    }
}
