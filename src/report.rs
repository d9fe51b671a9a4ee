use crate::error::SurveyError;
use log::{info, warn};
use std::fmt;

/// Result of one unit of work: it either happened, or it was skipped for a
/// reason that does not stop the run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    Skipped(SurveyError),
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn reason(&self) -> Option<&SurveyError> {
        match self {
            Outcome::Done(_) => None,
            Outcome::Skipped(e) => Some(e),
        }
    }

    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(v) => Some(v),
            Outcome::Skipped(_) => None,
        }
    }
}

impl<T> From<Result<T, SurveyError>> for Outcome<T> {
    fn from(result: Result<T, SurveyError>) -> Self {
        match result {
            Ok(v) => Outcome::Done(v),
            Err(e) => Outcome::Skipped(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Mapping,
    Coercion,
    Filter,
    Palette,
    Chart,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Mapping => "mapping",
            Stage::Coercion => "coercion",
            Stage::Filter => "filter",
            Stage::Palette => "palette",
            Stage::Chart => "chart",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitReport {
    pub stage: Stage,
    pub unit: String,
    /// `None` when the unit completed.
    pub skipped: Option<SurveyError>,
}

/// Everything a run did, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total_rows: usize,
    pub subgroup_rows: Option<usize>,
    pub inspect_only: bool,
    units: Vec<UnitReport>,
}

impl RunSummary {
    pub fn new(total_rows: usize) -> Self {
        Self {
            total_rows,
            ..Self::default()
        }
    }

    pub fn record<T>(&mut self, stage: Stage, unit: impl Into<String>, outcome: &Outcome<T>) {
        self.units.push(UnitReport {
            stage,
            unit: unit.into(),
            skipped: outcome.reason().cloned(),
        });
    }

    pub fn units(&self) -> &[UnitReport] {
        &self.units
    }

    pub fn completed(&self, stage: Stage) -> usize {
        self.units
            .iter()
            .filter(|u| u.stage == stage && u.skipped.is_none())
            .count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|u| u.skipped.is_some())
    }

    pub fn log(&self) {
        if self.inspect_only {
            info!("Run finished in inspect-only mode ({} rows)", self.total_rows);
        } else {
            info!(
                "Run finished: {} column(s) typed, {} chart(s) written",
                self.completed(Stage::Coercion),
                self.completed(Stage::Chart)
            );
        }
        for unit in self.skipped() {
            if let Some(reason) = &unit.skipped {
                warn!("Skipped {} '{}': {}", unit.stage, unit.unit, reason);
            }
        }
    }
}
