use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{error, info, warn};

use crate::helper_functions::read_csv;
use crate::models::{Dataset, CLASSIFIER_CLEAN_COL, CLASSIFIER_COL, CLASSIFIER_ORDER, METRICS};

/// Where the evaluator drops its per-fold results, relative to the project root.
pub const FOLD_RESULTS_PATH: &str = "csv_output/fold_results.csv";

// Applied in order, case-insensitively, anywhere in the token.
const LABEL_REWRITES: [(&str, &str); 3] = [
    ("(?i)ibk", "IBk"),
    ("(?i)naivebayes", "NaiveBayes"),
    ("(?i)randomforest", "RandomForest"),
];

/// Per-fold classifier evaluation results (`Classifier, ..., Precision,
/// Recall, ..., AUC, Kappa, NPofB20`).
pub struct FoldResultsDataset {
    pub path: PathBuf,
}

impl FoldResultsDataset {
    pub fn at_project_root(root: &Path) -> Self {
        FoldResultsDataset {
            path: root.join(FOLD_RESULTS_PATH),
        }
    }
}

impl Dataset for FoldResultsDataset {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading fold results from {}", self.path.display());
        let df = match read_csv(&self.path) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read fold results CSV: {}", e);
                return Err(e);
            }
        };
        check_required_columns(&df)?;
        info!("Loaded {} fold result rows", df.height());
        Ok(df)
    }

    /// Adds `classifier_clean` and casts every metric column to `Float64`.
    /// A metric cell that is not a number fails the whole load.
    fn clean(df: DataFrame) -> PolarsResult<DataFrame> {
        check_required_columns(&df)?;

        let metric_casts: Vec<Expr> = METRICS
            .iter()
            .map(|m| col(*m).strict_cast(DataType::Float64))
            .collect();

        let df = df
            .lazy()
            .with_column(normalized_classifier_expr().alias(CLASSIFIER_CLEAN_COL))
            .with_columns(metric_casts)
            .collect()?;

        warn_unrecognized_labels(&df)?;
        Ok(df)
    }
}

/// Token before the first `_` of the raw label, with the known classifier
/// names rewritten to their canonical spelling. Anything else passes through.
pub fn normalized_classifier_expr() -> Expr {
    let mut label = col(CLASSIFIER_COL)
        .cast(DataType::String)
        .str()
        .split(lit("_"))
        .list()
        .get(lit(0), false);

    for (pattern, canonical) in LABEL_REWRITES {
        label = label.str().replace_all(lit(pattern), lit(canonical), false);
    }
    label
}

fn check_required_columns(df: &DataFrame) -> PolarsResult<()> {
    let present = df.get_column_names();
    let missing: Vec<&str> = std::iter::once(CLASSIFIER_COL)
        .chain(METRICS)
        .filter(|name| !present.iter().any(|p| p.as_str() == *name))
        .collect();

    if !missing.is_empty() {
        error!("Fold results are missing required column(s): {:?}", missing);
        return Err(PolarsError::ColumnNotFound(
            format!("missing required column(s): {}", missing.join(", ")).into(),
        ));
    }
    Ok(())
}

fn warn_unrecognized_labels(df: &DataFrame) -> PolarsResult<()> {
    let labels = df.column(CLASSIFIER_CLEAN_COL)?.str()?;
    let mut unknown: Vec<&str> = labels
        .into_iter()
        .flatten()
        .filter(|l| !CLASSIFIER_ORDER.contains(l))
        .collect();
    unknown.sort();
    unknown.dedup();

    if !unknown.is_empty() {
        warn!(
            "Classifier labels outside {:?} are kept as-is and will not be plotted: {:?}",
            CLASSIFIER_ORDER, unknown
        );
    }
    Ok(())
}
