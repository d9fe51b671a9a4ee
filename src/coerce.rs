//! Type coercion driven by the column mapping.
//!
//! Each mapped column present in the table is retyped by exactly one rule,
//! checked in this order:
//!
//! 1. Likert columns get the fixed five-level ordered scale, whatever the
//!    mapping declares.
//! 2. Nullable integer types (`Int8` .. `Int64`) parse numbers leniently,
//!    turning anything unparseable into a missing value.
//! 3. `float64` does the same without narrowing.
//! 4. Everything else is a strict cast.
//!
//! A column that fails is left untouched and reported; the others go on.

use crate::data::{compare_labels, Column, ColumnKind, IntWidth, ResponseTable, Value};
use crate::error::SurveyError;
use crate::mapping::ColumnMapping;
use crate::report::Outcome;
use log::{debug, info, warn};
use serde::Deserialize;

/// Survey answer labels for codes 1 through 5, lowest first.
///
/// This encodes the questionnaire's numeric scale and is not read from the
/// mapping file. If the survey changes its scale, override it in the report
/// configuration.
pub const LIKERT_LABELS: [&str; 5] = [
    "Strongly Disagree",
    "Disagree",
    "Neutral",
    "Agree",
    "Strongly Agree",
];

/// Columns answered on the Likert scale.
pub const ORDERED_LIKERT_COLUMNS: [&str; 5] = [
    "support_1st_place_medals_masters",
    "rating_promotion_governance",
    "rating_accessibility",
    "rating_positive_experience",
    "rating_high_performance_pathways",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LikertScale {
    /// Labels for codes `1..=labels.len()`, lowest first.
    pub labels: Vec<String>,
    pub columns: Vec<String>,
}

impl Default for LikertScale {
    fn default() -> Self {
        Self {
            labels: LIKERT_LABELS.iter().map(|s| s.to_string()).collect(),
            columns: ORDERED_LIKERT_COLUMNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl LikertScale {
    pub fn applies_to(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Label for an integer code, `None` outside the scale.
    pub fn label_for(&self, value: &Value) -> Option<&str> {
        let n = value.as_number()?;
        if n.fract() != 0.0 || n < 1.0 || n > self.labels.len() as f64 {
            return None;
        }
        self.labels.get(n as usize - 1).map(|s| s.as_str())
    }

    fn apply(&self, column: &Column) -> Column {
        let values = column
            .values
            .iter()
            .map(|v| match self.label_for(v) {
                Some(label) => Value::Category(label.to_string()),
                None => Value::Missing,
            })
            .collect();
        Column {
            name: column.name.clone(),
            kind: ColumnKind::Category {
                levels: self.labels.clone(),
                ordered: true,
            },
            values,
        }
    }
}

/// Target of a plain cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastTarget {
    Category,
    Int(IntWidth),
    Float,
    Bool,
    Text,
}

/// Parsed form of a mapping row's `recommended_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendedType {
    NullableInt(IntWidth),
    Float64,
    Cast(CastTarget),
}

impl RecommendedType {
    /// `None` for an unrecognised type name.
    pub fn parse(dtype: &str) -> Option<Self> {
        let dtype = dtype.trim();
        if let Some(bits) = dtype.strip_prefix("Int") {
            return IntWidth::from_bits(bits).map(RecommendedType::NullableInt);
        }
        if let Some(bits) = dtype.strip_prefix("int") {
            return IntWidth::from_bits(bits).map(|w| RecommendedType::Cast(CastTarget::Int(w)));
        }
        let target = match dtype {
            "float64" => return Some(RecommendedType::Float64),
            "category" => CastTarget::Category,
            "float" | "float32" => CastTarget::Float,
            "bool" | "boolean" => CastTarget::Bool,
            "object" | "string" | "str" => CastTarget::Text,
            _ => return None,
        };
        Some(RecommendedType::Cast(target))
    }
}

/// What happened to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Coercion {
    OrderedLikert,
    Typed(RecommendedType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoercionReport {
    pub column: String,
    pub outcome: Outcome<Coercion>,
}

/// Retype every mapped column present in `table`, in mapping order.
pub fn apply_data_types(
    table: &mut ResponseTable,
    mapping: &ColumnMapping,
    likert: &LikertScale,
) -> Vec<CoercionReport> {
    let mut reports = Vec::new();

    for entry in mapping.entries() {
        let name = entry.new_name.as_str();
        let Some(column) = table.column(name) else {
            debug!("Column '{}' not in table, skipping coercion", name);
            continue;
        };

        let outcome = match coerce_column(column, &entry.recommended_type, likert) {
            Ok((coerced, how)) => {
                table.replace_column(coerced);
                if how == Coercion::OrderedLikert {
                    info!("Applied ordered categorical type to '{}'", name);
                }
                Outcome::Done(how)
            }
            Err(e) => {
                warn!("{}", e);
                Outcome::Skipped(e)
            }
        };
        reports.push(CoercionReport {
            column: name.to_string(),
            outcome,
        });
    }

    let applied = reports.iter().filter(|r| r.outcome.is_done()).count();
    info!("Data types applied to {} column(s)", applied);
    reports
}

/// Produce the retyped column without touching the original.
pub fn coerce_column(
    column: &Column,
    dtype: &str,
    likert: &LikertScale,
) -> Result<(Column, Coercion), SurveyError> {
    if likert.applies_to(&column.name) {
        return Ok((likert.apply(column), Coercion::OrderedLikert));
    }

    let recommended = RecommendedType::parse(dtype).ok_or_else(|| SurveyError::UnknownType {
        column: column.name.clone(),
        dtype: dtype.to_string(),
    })?;

    let coerced = match recommended {
        RecommendedType::NullableInt(width) => to_nullable_int(column, width, dtype)?,
        RecommendedType::Float64 => to_float(column, false, dtype)?,
        RecommendedType::Cast(target) => cast(column, target, dtype)?,
    };
    Ok((coerced, Coercion::Typed(recommended)))
}

fn retyped(column: &Column, kind: ColumnKind, values: Vec<Value>) -> Column {
    Column {
        name: column.name.clone(),
        kind,
        values,
    }
}

fn to_nullable_int(column: &Column, width: IntWidth, dtype: &str) -> Result<Column, SurveyError> {
    let mut values = Vec::with_capacity(column.values.len());
    for value in &column.values {
        values.push(match value.as_number() {
            None => Value::Missing,
            Some(n) if width.holds(n) => Value::Int(n as i64),
            Some(n) => {
                return Err(SurveyError::malformed(
                    &column.name,
                    dtype,
                    format!("{} cannot be represented as {}", n, dtype),
                ))
            }
        });
    }
    Ok(retyped(
        column,
        ColumnKind::Int {
            width,
            nullable: true,
        },
        values,
    ))
}

fn to_float(column: &Column, strict: bool, dtype: &str) -> Result<Column, SurveyError> {
    let mut values = Vec::with_capacity(column.values.len());
    for value in &column.values {
        values.push(match value.as_number() {
            Some(n) => Value::Float(n),
            None if strict && !value.is_missing() => {
                return Err(SurveyError::malformed(
                    &column.name,
                    dtype,
                    format!("could not convert '{}' to float", value),
                ))
            }
            None => Value::Missing,
        });
    }
    Ok(retyped(column, ColumnKind::Float, values))
}

fn cast(column: &Column, target: CastTarget, dtype: &str) -> Result<Column, SurveyError> {
    match target {
        CastTarget::Float => to_float(column, true, dtype),
        CastTarget::Category => {
            let values: Vec<Value> = column
                .values
                .iter()
                .map(|v| match v.label() {
                    Some(label) => Value::Category(label),
                    None => Value::Missing,
                })
                .collect();
            let mut levels: Vec<String> = Vec::new();
            for v in &values {
                if let Value::Category(label) = v {
                    if !levels.contains(label) {
                        levels.push(label.clone());
                    }
                }
            }
            levels.sort_by(|a, b| compare_labels(a, b));
            Ok(retyped(
                column,
                ColumnKind::Category {
                    levels,
                    ordered: false,
                },
                values,
            ))
        }
        CastTarget::Int(width) => {
            let mut values = Vec::with_capacity(column.values.len());
            for value in &column.values {
                match value.as_number() {
                    Some(n) if width.holds(n) => values.push(Value::Int(n as i64)),
                    _ => {
                        return Err(SurveyError::malformed(
                            &column.name,
                            dtype,
                            format!("cannot convert '{}' to integer", value),
                        ))
                    }
                }
            }
            Ok(retyped(
                column,
                ColumnKind::Int {
                    width,
                    nullable: false,
                },
                values,
            ))
        }
        CastTarget::Bool => {
            let mut values = Vec::with_capacity(column.values.len());
            for value in &column.values {
                values.push(match parse_bool(value) {
                    Some(b) => Value::Bool(b),
                    None if value.is_missing() => Value::Missing,
                    None => {
                        return Err(SurveyError::malformed(
                            &column.name,
                            dtype,
                            format!("cannot interpret '{}' as boolean", value),
                        ))
                    }
                });
            }
            Ok(retyped(column, ColumnKind::Bool, values))
        }
        CastTarget::Text => {
            let values = column
                .values
                .iter()
                .map(|v| match v.label() {
                    Some(label) => Value::Text(label),
                    None => Value::Missing,
                })
                .collect();
            Ok(retyped(column, ColumnKind::Text, values))
        }
    }
}

/// Boolean reading of a cell: booleans, the numbers 1 and 0, and the usual
/// spellings of yes/no.
pub fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Missing => None,
        Value::Bool(b) => Some(*b),
        Value::Int(_) | Value::Float(_) => match value.as_number() {
            Some(n) if n == 1.0 => Some(true),
            Some(n) if n == 0.0 => Some(false),
            _ => None,
        },
        Value::Text(s) | Value::Category(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingEntry;

    fn single(name: &str, values: Vec<Value>) -> ResponseTable {
        ResponseTable::from_columns(vec![Column::new(name, values)]).unwrap()
    }

    fn mapping(entries: &[(&str, &str)]) -> ColumnMapping {
        ColumnMapping::new(
            entries
                .iter()
                .map(|(name, dtype)| MappingEntry {
                    old_name: name.to_string(),
                    new_name: name.to_string(),
                    recommended_type: dtype.to_string(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_recommended_type() {
        assert_eq!(
            RecommendedType::parse("Int8"),
            Some(RecommendedType::NullableInt(IntWidth::W8))
        );
        assert_eq!(RecommendedType::parse("float64"), Some(RecommendedType::Float64));
        assert_eq!(
            RecommendedType::parse("category"),
            Some(RecommendedType::Cast(CastTarget::Category))
        );
        assert_eq!(
            RecommendedType::parse("int16"),
            Some(RecommendedType::Cast(CastTarget::Int(IntWidth::W16)))
        );
        assert_eq!(RecommendedType::parse("Int7"), None);
        assert_eq!(RecommendedType::parse("datetime64[ns]"), None);
    }

    #[test]
    fn test_likert_example_scenario() {
        let mut table = single("rating_accessibility", vec![Value::Int(3)]);
        let reports = apply_data_types(
            &mut table,
            &mapping(&[("rating_accessibility", "Int8")]),
            &LikertScale::default(),
        );
        assert_eq!(reports[0].outcome, Outcome::Done(Coercion::OrderedLikert));

        let column = table.column("rating_accessibility").unwrap();
        assert_eq!(column.values[0], Value::Category("Neutral".to_string()));
        let levels = column.kind.ordered_levels().unwrap();
        assert_eq!(levels.iter().position(|l| l == "Neutral"), Some(2));
        assert_eq!(levels.len(), 5);
    }

    #[test]
    fn test_likert_levels_independent_of_data() {
        let mut table = single(
            "rating_positive_experience",
            vec![Value::Int(5), Value::Missing, Value::Int(9), Value::Float(1.0)],
        );
        apply_data_types(
            &mut table,
            &mapping(&[("rating_positive_experience", "category")]),
            &LikertScale::default(),
        );
        let column = table.column("rating_positive_experience").unwrap();
        assert_eq!(column.kind.ordered_levels().unwrap(), &LIKERT_LABELS.map(String::from)[..]);
        assert_eq!(
            column.values,
            vec![
                Value::Category("Strongly Agree".to_string()),
                Value::Missing,
                Value::Missing,
                Value::Category("Strongly Disagree".to_string()),
            ]
        );
    }

    #[test]
    fn test_likert_code_positions() {
        let scale = LikertScale::default();
        for k in 1..=5 {
            let label = scale.label_for(&Value::Int(k)).unwrap();
            assert_eq!(scale.labels.iter().position(|l| l == label), Some(k as usize - 1));
        }
        assert_eq!(scale.label_for(&Value::Int(0)), None);
        assert_eq!(scale.label_for(&Value::Float(2.5)), None);
    }

    #[test]
    fn test_nullable_int_coercion() {
        let mut table = single(
            "years_rowing",
            vec![
                Value::Int(4),
                Value::Text("n/a".to_string()),
                Value::Text(" 7".to_string()),
                Value::Missing,
                Value::Float(2.0),
            ],
        );
        apply_data_types(
            &mut table,
            &mapping(&[("years_rowing", "Int8")]),
            &LikertScale::default(),
        );
        let column = table.column("years_rowing").unwrap();
        assert_eq!(
            column.values,
            vec![Value::Int(4), Value::Missing, Value::Missing, Value::Missing, Value::Int(2)]
        );
        assert_eq!(
            column.kind,
            ColumnKind::Int {
                width: IntWidth::W8,
                nullable: true
            }
        );
    }

    #[test]
    fn test_nullable_int_out_of_range_leaves_column() {
        let original = vec![Value::Int(300), Value::Int(1)];
        let mut table = single("count", original.clone());
        let reports = apply_data_types(
            &mut table,
            &mapping(&[("count", "Int8")]),
            &LikertScale::default(),
        );
        assert!(matches!(
            reports[0].outcome,
            Outcome::Skipped(SurveyError::MalformedValue { .. })
        ));
        let column = table.column("count").unwrap();
        assert_eq!(column.values, original);
        assert_eq!(column.kind, ColumnKind::Mixed);
    }

    #[test]
    fn test_float64_coercion() {
        let mut table = single(
            "cost",
            vec![Value::Text("12.5".to_string()), Value::Text("12.5$".to_string()), Value::Int(3)],
        );
        apply_data_types(
            &mut table,
            &mapping(&[("cost", "float64")]),
            &LikertScale::default(),
        );
        assert_eq!(
            table.column("cost").unwrap().values,
            vec![Value::Float(12.5), Value::Missing, Value::Float(3.0)]
        );
    }

    #[test]
    fn test_category_cast() {
        let mut table = single(
            "age_category",
            vec![
                Value::Text("41-60".to_string()),
                Value::Missing,
                Value::Text("18-26".to_string()),
                Value::Text("41-60".to_string()),
            ],
        );
        apply_data_types(
            &mut table,
            &mapping(&[("age_category", "category")]),
            &LikertScale::default(),
        );
        let column = table.column("age_category").unwrap();
        assert_eq!(
            column.kind,
            ColumnKind::Category {
                levels: vec!["18-26".to_string(), "41-60".to_string()],
                ordered: false
            }
        );
        assert_eq!(column.values[1], Value::Missing);
    }

    #[test]
    fn test_strict_int_cast_rejects_missing() {
        let mut table = single("n", vec![Value::Int(1), Value::Missing]);
        let reports = apply_data_types(
            &mut table,
            &mapping(&[("n", "int8")]),
            &LikertScale::default(),
        );
        assert!(!reports[0].outcome.is_done());
        assert_eq!(table.column("n").unwrap().kind, ColumnKind::Mixed);
    }

    #[test]
    fn test_unknown_type_does_not_stop_other_columns() {
        let mut table = ResponseTable::from_columns(vec![
            Column::new("when", vec![Value::Text("2025-03-01".to_string())]),
            Column::new("score", vec![Value::Text("7".to_string())]),
        ])
        .unwrap();
        let reports = apply_data_types(
            &mut table,
            &mapping(&[("when", "datetime64[ns]"), ("score", "float64"), ("absent", "Int8")]),
            &LikertScale::default(),
        );
        assert_eq!(reports.len(), 2);
        assert!(matches!(reports[0].outcome, Outcome::Skipped(SurveyError::UnknownType { .. })));
        assert!(reports[1].outcome.is_done());
        assert_eq!(table.column("score").unwrap().values, vec![Value::Float(7.0)]);
    }

    #[test]
    fn test_bool_cast() {
        let mut table = single(
            "reason_recreational_cost",
            vec![Value::Int(1), Value::Int(0), Value::Missing, Value::Text("Yes".to_string())],
        );
        apply_data_types(
            &mut table,
            &mapping(&[("reason_recreational_cost", "bool")]),
            &LikertScale::default(),
        );
        assert_eq!(
            table.column("reason_recreational_cost").unwrap().values,
            vec![Value::Bool(true), Value::Bool(false), Value::Missing, Value::Bool(true)]
        );
    }

    #[test]
    fn test_bool_cast_rejects_other_numbers() {
        assert_eq!(parse_bool(&Value::Float(1.0)), Some(true));
        assert_eq!(parse_bool(&Value::Int(0)), Some(false));
        assert_eq!(parse_bool(&Value::Int(2)), None);
        assert_eq!(parse_bool(&Value::Float(-1.0)), None);

        let original = vec![Value::Int(1), Value::Int(2)];
        let mut table = single("reason_social", original.clone());
        let reports = apply_data_types(
            &mut table,
            &mapping(&[("reason_social", "bool")]),
            &LikertScale::default(),
        );
        assert!(matches!(
            reports[0].outcome,
            Outcome::Skipped(SurveyError::MalformedValue { .. })
        ));
        assert_eq!(table.column("reason_social").unwrap().values, original);
    }
}
