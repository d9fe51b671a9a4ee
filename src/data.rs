use crate::error::SurveyError;
use calamine::{open_workbook_auto, DataType, Reader};
use log::debug;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// A single cell of the response table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Category(String),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Display label of a present value, `None` when missing.
    pub fn label(&self) -> Option<String> {
        match self {
            Value::Missing => None,
            other => Some(other.to_string()),
        }
    }

    /// Numeric reading of the cell. Text must parse exactly; whitespace or
    /// stray characters make it unparseable. NaN counts as missing.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Text(s) | Value::Category(s) => s.parse::<f64>().ok()?,
            Value::Missing => return None,
        };
        if n.is_nan() {
            None
        } else {
            Some(n)
        }
    }

    /// Build a cell from a CSV field, inferring the narrowest type.
    pub fn infer(raw: &str) -> Value {
        if raw.is_empty() {
            Value::Missing
        } else if let Ok(i) = raw.parse::<i64>() {
            Value::Int(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            if f.is_nan() {
                Value::Missing
            } else {
                Value::Float(f)
            }
        } else if raw.eq_ignore_ascii_case("true") {
            Value::Bool(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Value::Bool(false)
        } else {
            Value::Text(raw.to_string())
        }
    }

    fn from_cell(cell: &DataType) -> Value {
        match cell {
            DataType::Empty => Value::Missing,
            DataType::String(s) if s.is_empty() => Value::Missing,
            DataType::String(s) => Value::Text(s.clone()),
            DataType::Int(i) => Value::Int(*i),
            DataType::Float(f) if f.is_nan() => Value::Missing,
            DataType::Float(f) => Value::Float(*f),
            DataType::Bool(b) => Value::Bool(*b),
            DataType::Error(_) => Value::Missing,
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => write!(f, "<NA>"),
            Value::Text(s) | Value::Category(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }

    pub fn from_bits(bits: &str) -> Option<IntWidth> {
        match bits {
            "8" => Some(IntWidth::W8),
            "16" => Some(IntWidth::W16),
            "32" => Some(IntWidth::W32),
            "64" => Some(IntWidth::W64),
            _ => None,
        }
    }

    /// Whether `n` fits this width as an exact integer.
    pub fn holds(self, n: f64) -> bool {
        // Powers of two are exact in f64, so `-min` is a precise exclusive
        // upper bound where `MAX as f64` would round up for 64 bits.
        let min = match self {
            IntWidth::W8 => i8::MIN as f64,
            IntWidth::W16 => i16::MIN as f64,
            IntWidth::W32 => i32::MIN as f64,
            IntWidth::W64 => i64::MIN as f64,
        };
        n.fract() == 0.0 && n >= min && n < -min
    }
}

/// Logical type carried by a column after loading or coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    /// As loaded; cells may hold any value.
    Mixed,
    Text,
    Int { width: IntWidth, nullable: bool },
    Float,
    Bool,
    Category { levels: Vec<String>, ordered: bool },
}

impl ColumnKind {
    pub fn ordered_levels(&self) -> Option<&[String]> {
        match self {
            ColumnKind::Category {
                levels,
                ordered: true,
            } => Some(levels.as_slice()),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Mixed => write!(f, "object"),
            ColumnKind::Text => write!(f, "string"),
            ColumnKind::Int {
                width,
                nullable: true,
            } => write!(f, "Int{}", width.bits()),
            ColumnKind::Int {
                width,
                nullable: false,
            } => write!(f, "int{}", width.bits()),
            ColumnKind::Float => write!(f, "float64"),
            ColumnKind::Bool => write!(f, "bool"),
            ColumnKind::Category { levels, ordered } => {
                let ord = if *ordered { ", ordered" } else { "" };
                write!(f, "category[{} levels{}]", levels.len(), ord)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Mixed,
            values,
        }
    }

    pub fn non_missing(&self) -> usize {
        self.values.iter().filter(|v| !v.is_missing()).count()
    }
}

/// Column-major table of survey responses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseTable {
    columns: Vec<Column>,
    row_count: usize,
}

impl ResponseTable {
    /// Build a table from equal-length columns. Column names must be unique.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, SurveyError> {
        let row_count = columns.first().map(|c| c.values.len()).unwrap_or(0);
        let mut seen = HashSet::new();
        for column in &columns {
            if column.values.len() != row_count {
                return Err(SurveyError::read(
                    "<memory>",
                    format!(
                        "column '{}' has {} rows, expected {}",
                        column.name,
                        column.values.len(),
                        row_count
                    ),
                ));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(SurveyError::read(
                    "<memory>",
                    format!("duplicate column '{}'", column.name),
                ));
            }
        }
        Ok(Self { columns, row_count })
    }

    /// Build a table from a header row and cell rows, padding short rows.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, SurveyError> {
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|h| Column::new(h, Vec::with_capacity(rows.len())))
            .collect();
        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.values.push(cells.next().unwrap_or(Value::Missing));
            }
        }
        Self::from_columns(columns)
    }

    /// Load a spreadsheet. `.csv` goes through the csv reader, anything else
    /// through calamine (first worksheet). Repeated or blank header cells are
    /// renamed rather than rejected; see [`unique_headers`].
    pub fn load(path: &Path) -> Result<Self, SurveyError> {
        if !path.exists() {
            return Err(SurveyError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        let (headers, rows) = if is_csv {
            read_csv(path)?
        } else {
            read_workbook(path)?
        };
        debug!(
            "Loaded {} row(s) x {} column(s) from {:?}",
            rows.len(),
            headers.len(),
            path
        );
        Self::from_rows(unique_headers(headers), rows).map_err(|e| match e {
            SurveyError::Read { message, .. } => SurveyError::read(path, message),
            other => other,
        })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Rename `from` to `to`. Returns false when `from` is absent or `to`
    /// would collide with another column.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        if from != to && self.has_column(to) {
            return false;
        }
        match self.column_mut(from) {
            Some(column) => {
                column.name = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Swap in a retyped column of the same name and length.
    pub fn replace_column(&mut self, column: Column) -> bool {
        if column.values.len() != self.row_count {
            return false;
        }
        match self.column_mut(&column.name.clone()) {
            Some(slot) => {
                *slot = column;
                true
            }
            None => false,
        }
    }

    /// New table holding only the rows for which `keep` is true.
    pub fn select_rows<F>(&self, keep: F) -> ResponseTable
    where
        F: Fn(usize) -> bool,
    {
        let indices: Vec<usize> = (0..self.row_count).filter(|&i| keep(i)).collect();
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                kind: c.kind.clone(),
                values: indices.iter().map(|&i| c.values[i].clone()).collect(),
            })
            .collect();
        ResponseTable {
            columns,
            row_count: indices.len(),
        }
    }

    /// First `n` rows rendered as a small text grid.
    pub fn head(&self, n: usize) -> String {
        let mut out = self.column_names().join(" | ");
        for row in 0..self.row_count.min(n) {
            out.push('\n');
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|c| c.values[row].to_string())
                .collect();
            out.push_str(&cells.join(" | "));
        }
        out
    }

    /// Column listing with kind and non-missing count.
    pub fn describe(&self) -> String {
        let mut out = format!(
            "{} entries, {} columns",
            self.row_count,
            self.columns.len()
        );
        for (idx, column) in self.columns.iter().enumerate() {
            out.push_str(&format!(
                "\n{:>3}  {:<40} {:>6} non-null  {}",
                idx,
                column.name,
                column.non_missing(),
                column.kind
            ));
        }
        out
    }
}

/// Natural ordering of labels: numbers numerically first, then text.
/// Distinct spellings of one number ("1", "01") fall back to text order, so
/// only identical labels compare equal.
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Make header names unique the way spreadsheet exports are usually read:
/// a blank header at position `i` becomes `Unnamed: i`, and the second and
/// later copies of `name` become `name.1`, `name.2`, ...
pub fn unique_headers(headers: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut repeats: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(headers.len());
    for (idx, header) in headers.into_iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            header
        };
        let mut name = base.clone();
        if used.contains(&name) {
            let n = repeats.entry(base.clone()).or_insert(0);
            while used.contains(&name) {
                *n += 1;
                name = format!("{}.{}", base, n);
            }
            debug!("Duplicate header '{}' renamed to '{}'", base, name);
        }
        used.insert(name.clone());
        out.push(name);
    }
    out
}

fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<Value>>), SurveyError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| SurveyError::read(path, e))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SurveyError::read(path, e))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SurveyError::read(path, e))?;
        rows.push(record.iter().map(Value::infer).collect());
    }
    Ok((headers, rows))
}

fn read_workbook(path: &Path) -> Result<(Vec<String>, Vec<Vec<Value>>), SurveyError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| SurveyError::read(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SurveyError::read(path, "workbook has no worksheets"))?
        .map_err(|e| SurveyError::read(path, e))?;

    let mut iter = range.rows();
    let headers: Vec<String> = match iter.next() {
        Some(header) => header.iter().map(|cell| cell.to_string()).collect(),
        None => return Err(SurveyError::read(path, "worksheet is empty")),
    };
    let rows = iter
        .map(|row| row.iter().map(Value::from_cell).collect())
        .collect();
    Ok((headers, rows))
}
