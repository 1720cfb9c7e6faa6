use polars::prelude::*;

/// Raw classifier label as written by the evaluator, e.g. `ibk_fold3`.
pub const CLASSIFIER_COL: &str = "Classifier";
/// Canonical classifier name derived from [`CLASSIFIER_COL`].
pub const CLASSIFIER_CLEAN_COL: &str = "classifier_clean";
pub const METRIC_COL: &str = "Metric";
pub const VALUE_COL: &str = "Value";

/// Metrics shown in the report, one facet each, left to right.
pub const METRICS: [&str; 5] = ["Precision", "Recall", "AUC", "Kappa", "NPofB20"];

/// Category order on every facet's x axis.
pub const CLASSIFIER_ORDER: [&str; 3] = ["NaiveBayes", "RandomForest", "IBk"];

pub const DEFAULT_PROJECT: &str = "bookkeeper";

/// Wraps any foreign error (io, plotters, serde) into a `PolarsError` so the
/// whole pipeline can keep returning `PolarsResult`.
pub fn polars_err(e: Box<dyn std::error::Error>) -> PolarsError {
    PolarsError::ComputeError(e.to_string().into())
}

pub trait Dataset {
    fn load(&self) -> PolarsResult<DataFrame>;

    /// Derives the columns the report needs from the raw frame.
    fn clean(df: DataFrame) -> PolarsResult<DataFrame>;

    fn load_validated(&self) -> PolarsResult<DataFrame>
    where
        Self: Sized,
    {
        Self::clean(self.load()?)
    }
}

/// Project label taken from the command line. Lower case is used for paths,
/// upper case for titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLabel {
    name: String,
}

impl ProjectLabel {
    pub fn new(raw: &str) -> Self {
        ProjectLabel { name: raw.to_lowercase() }
    }

    pub fn from_arg(arg: Option<&str>) -> Self {
        Self::new(arg.unwrap_or(DEFAULT_PROJECT))
    }

    pub fn path_name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> String {
        self.name.to_uppercase()
    }
}

impl Default for ProjectLabel {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_label_defaults_to_bookkeeper() {
        let label = ProjectLabel::from_arg(None);
        assert_eq!(label.path_name(), "bookkeeper");
        assert_eq!(label.display_name(), "BOOKKEEPER");
    }

    #[test]
    fn project_label_normalizes_case() {
        let label = ProjectLabel::from_arg(Some("Hive"));
        assert_eq!(label.path_name(), "hive");
        assert_eq!(label.display_name(), "HIVE");
    }
}
