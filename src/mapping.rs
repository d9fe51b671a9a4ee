use crate::data::{ResponseTable, Value};
use crate::error::SurveyError;
use crate::report::Outcome;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::path::Path;

pub const OLD_NAME: &str = "old_name";
pub const NEW_NAME: &str = "new_name";
pub const RECOMMENDED_TYPE: &str = "recommended_type";

/// One row of the mapping table.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingEntry {
    pub old_name: String,
    pub new_name: String,
    pub recommended_type: String,
}

/// Declarative table driving column renames and type coercion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnMapping {
    entries: Vec<MappingEntry>,
}

impl ColumnMapping {
    /// Build a mapping, rejecting duplicate `old_name` values.
    pub fn new(entries: Vec<MappingEntry>) -> Result<Self, SurveyError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.old_name.as_str()) {
                return Err(SurveyError::read(
                    "<mapping>",
                    format!("duplicate old_name '{}'", entry.old_name),
                ));
            }
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, SurveyError> {
        let table = ResponseTable::load(path)?;
        Self::from_table(&table).map_err(|e| match e {
            SurveyError::Read { message, .. } => SurveyError::read(path, message),
            other => other,
        })
    }

    /// Read entries out of a loaded mapping sheet.
    pub fn from_table(table: &ResponseTable) -> Result<Self, SurveyError> {
        let column = |name: &str| {
            table.column(name).ok_or_else(|| {
                SurveyError::read("<mapping>", format!("mapping table lacks column '{}'", name))
            })
        };
        let old = column(OLD_NAME)?;
        let new = column(NEW_NAME)?;
        let dtype = column(RECOMMENDED_TYPE)?;

        let mut entries = Vec::with_capacity(table.row_count());
        for row in 0..table.row_count() {
            let Some(old_name) = cell_text(&old.values[row]) else {
                debug!("Mapping row {} has no old_name, ignoring", row + 1);
                continue;
            };
            let new_name = cell_text(&new.values[row]).unwrap_or_else(|| old_name.clone());
            let recommended_type = cell_text(&dtype.values[row]).unwrap_or_default();
            entries.push(MappingEntry {
                old_name,
                new_name,
                recommended_type,
            });
        }
        Self::new(entries)
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rename every mapped column present in `table`. Returns the count renamed.
    pub fn rename(&self, table: &mut ResponseTable) -> usize {
        let mut renamed = 0;
        for entry in &self.entries {
            if entry.old_name == entry.new_name {
                continue;
            }
            if !table.has_column(&entry.old_name) {
                continue;
            }
            if table.rename_column(&entry.old_name, &entry.new_name) {
                renamed += 1;
            } else {
                warn!(
                    "Cannot rename '{}' to '{}': a column with that name already exists",
                    entry.old_name, entry.new_name
                );
            }
        }
        renamed
    }
}

fn cell_text(value: &Value) -> Option<String> {
    value
        .label()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Load the mapping, reporting any failure. A skipped outcome means no
/// mapping is available and the dependent stages should not run.
pub fn load_column_mapping(path: &Path) -> Outcome<ColumnMapping> {
    match ColumnMapping::load(path) {
        Ok(mapping) => {
            info!(
                "Column mapping loaded successfully ({} entries)",
                mapping.entries().len()
            );
            Outcome::Done(mapping)
        }
        Err(e) => {
            match &e {
                SurveyError::SourceNotFound { .. } => error!("The mapping {}", e),
                _ => error!("An error occurred while reading the mapping file: {}", e),
            }
            Outcome::Skipped(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping_table(rows: Vec<[&str; 3]>) -> ResponseTable {
        ResponseTable::from_rows(
            vec![OLD_NAME.to_string(), NEW_NAME.to_string(), RECOMMENDED_TYPE.to_string()],
            rows.into_iter()
                .map(|r| r.iter().map(|s| Value::infer(s)).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_from_table() {
        let table = mapping_table(vec![
            ["Q1", "rating_accessibility", "Int8"],
            ["What is your age?", "age_category", "category"],
        ]);
        let mapping = ColumnMapping::from_table(&table).unwrap();
        assert_eq!(mapping.entries().len(), 2);
        assert_eq!(mapping.entries()[1].new_name, "age_category");
        assert_eq!(mapping.entries()[0].recommended_type, "Int8");
    }

    #[test]
    fn test_blank_new_name_keeps_old() {
        let table = mapping_table(vec![["Q1", "", "float64"], ["", "ignored", "Int8"]]);
        let mapping = ColumnMapping::from_table(&table).unwrap();
        assert_eq!(mapping.entries().len(), 1);
        assert_eq!(mapping.entries()[0].new_name, "Q1");
    }

    #[test]
    fn test_duplicate_old_name_rejected() {
        let table = mapping_table(vec![["Q1", "a", "Int8"], ["Q1", "b", "Int8"]]);
        assert!(ColumnMapping::from_table(&table).is_err());
    }

    #[test]
    fn test_missing_header_rejected() {
        let table = ResponseTable::from_rows(
            vec![OLD_NAME.to_string(), NEW_NAME.to_string()],
            vec![vec![Value::infer("Q1"), Value::infer("a")]],
        )
        .unwrap();
        let err = ColumnMapping::from_table(&table).unwrap_err();
        assert!(err.to_string().contains(RECOMMENDED_TYPE));
    }

    #[test]
    fn test_rename_present_columns_only() {
        let mapping = ColumnMapping::from_table(&mapping_table(vec![
            ["Q1", "rating_accessibility", "Int8"],
            ["Q9", "never_asked", "Int8"],
        ]))
        .unwrap();
        let mut table = ResponseTable::from_rows(
            vec!["Q1".to_string(), "Q2".to_string()],
            vec![vec![Value::Int(3), Value::Int(4)]],
        )
        .unwrap();
        assert_eq!(mapping.rename(&mut table), 1);
        assert_eq!(table.column_names(), vec!["rating_accessibility", "Q2"]);
    }

    #[test]
    fn test_load_column_mapping_missing_file() {
        let outcome = load_column_mapping(Path::new("no/such/mapping.xlsx"));
        assert!(matches!(
            outcome,
            Outcome::Skipped(SurveyError::SourceNotFound { .. })
        ));
    }
}
