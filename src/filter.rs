use crate::data::ResponseTable;
use crate::error::SurveyError;
use serde::Deserialize;

/// A named group of respondents, selected by the labels of one column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Subgroup {
    pub name: String,
    pub column: String,
    pub allow: Vec<String>,
}

impl Default for Subgroup {
    fn default() -> Self {
        Self {
            name: "Masters".to_string(),
            column: "age_category".to_string(),
            allow: vec!["27-40".to_string(), "41-60".to_string(), "61+".to_string()],
        }
    }
}

impl Subgroup {
    pub fn apply(&self, table: &ResponseTable) -> Result<ResponseTable, SurveyError> {
        filter_subgroup(table, &self.column, &self.allow)
    }
}

/// Copy of the rows whose `column` label is in `allow`. Missing values never
/// match. The source table is left as it was.
pub fn filter_subgroup(
    table: &ResponseTable,
    column: &str,
    allow: &[String],
) -> Result<ResponseTable, SurveyError> {
    let values = &table
        .column(column)
        .ok_or_else(|| SurveyError::missing_column(column))?
        .values;
    Ok(table.select_rows(|row| {
        values[row]
            .label()
            .is_some_and(|label| allow.iter().any(|a| *a == label))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, Value};

    fn survey() -> ResponseTable {
        let ages = ["18-26", "27-40", "", "61+", "41-60", "U17"];
        ResponseTable::from_columns(vec![
            Column::new("id", (1..=6).map(Value::Int).collect()),
            Column::new("age_category", ages.iter().map(|a| Value::infer(a)).collect()),
        ])
        .unwrap()
    }

    #[test]
    fn test_filter_keeps_allowed_labels() {
        let table = survey();
        let masters = Subgroup::default().apply(&table).unwrap();
        assert_eq!(
            masters.column("id").unwrap().values,
            vec![Value::Int(2), Value::Int(4), Value::Int(5)]
        );
    }

    #[test]
    fn test_filter_is_idempotent_and_non_mutating() {
        let table = survey();
        let before = table.clone();
        let first = Subgroup::default().apply(&table).unwrap();
        let second = Subgroup::default().apply(&table).unwrap();
        assert_eq!(first, second);
        assert_eq!(table, before);
        assert_eq!(table.row_count(), 6);
    }

    #[test]
    fn test_subset_does_not_alias_source() {
        let table = survey();
        let mut masters = Subgroup::default().apply(&table).unwrap();
        masters.column_mut("id").unwrap().values[0] = Value::Missing;
        assert_eq!(table.column("id").unwrap().values[1], Value::Int(2));
    }

    #[test]
    fn test_filter_missing_column() {
        let err = filter_subgroup(&survey(), "club", &["A".to_string()]).unwrap_err();
        assert_eq!(err, SurveyError::missing_column("club"));
    }
}
