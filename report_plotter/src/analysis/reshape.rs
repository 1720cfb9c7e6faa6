use polars::prelude::*;
use tracing::debug;

use crate::models::{CLASSIFIER_CLEAN_COL, METRIC_COL, VALUE_COL};

/// Wide → long. Every input row fans out into one `(classifier_clean, Metric,
/// Value)` row per metric. Output is metric-major: all rows of the first
/// metric in input order, then all rows of the second, and so on.
pub fn melt_metrics(df: &DataFrame, metrics: &[&str]) -> PolarsResult<DataFrame> {
    let classifiers = df.column(CLASSIFIER_CLEAN_COL)?.str()?;

    let n_rows = df.height() * metrics.len();
    let mut classifier_out: Vec<Option<&str>> = Vec::with_capacity(n_rows);
    let mut metric_out: Vec<&str> = Vec::with_capacity(n_rows);
    let mut value_out: Vec<Option<f64>> = Vec::with_capacity(n_rows);

    for &metric in metrics {
        let values = df.column(metric)?.cast(&DataType::Float64)?;
        let values = values.f64()?;

        for (classifier, value) in classifiers.into_iter().zip(values.into_iter()) {
            classifier_out.push(classifier);
            metric_out.push(metric);
            value_out.push(value);
        }
    }

    let long = DataFrame::new(vec![
        Column::from(Series::new(CLASSIFIER_CLEAN_COL.into(), classifier_out)),
        Column::from(Series::new(METRIC_COL.into(), metric_out)),
        Column::from(Series::new(VALUE_COL.into(), value_out)),
    ])?;

    debug!("Melted {} wide rows into {} long rows", df.height(), long.height());
    Ok(long)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::METRICS;
    use polars::df;

    fn wide() -> DataFrame {
        df![
            "classifier_clean" => &["IBk", "NaiveBayes", "RandomForest"],
            "Precision" => &[0.8, 0.6, 0.9],
            "Recall" => &[0.7, 0.5, 0.85],
            "AUC" => &[0.9, 0.8, 0.95],
            "Kappa" => &[0.5, 0.4, 0.6],
            "NPofB20" => &[0.3, 0.2, 0.35],
        ]
        .unwrap()
    }

    #[test]
    fn row_count_is_multiplied_by_metric_count() {
        let long = melt_metrics(&wide(), &METRICS).unwrap();
        assert_eq!(long.height(), 3 * METRICS.len());
        assert_eq!(long.width(), 3);
    }

    #[test]
    fn output_is_metric_major_and_keeps_row_order() {
        let long = melt_metrics(&wide(), &METRICS).unwrap();
        let metrics: Vec<&str> = long.column("Metric").unwrap().str().unwrap().into_no_null_iter().collect();
        let classifiers: Vec<&str> = long
            .column("classifier_clean")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();

        assert_eq!(&metrics[0..3], &["Precision"; 3]);
        assert_eq!(&metrics[12..15], &["NPofB20"; 3]);
        assert_eq!(&classifiers[3..6], &["IBk", "NaiveBayes", "RandomForest"]);
    }

    #[test]
    fn pivoting_back_reproduces_the_wide_matrix() {
        let wide = wide();
        let long = melt_metrics(&wide, &METRICS).unwrap();
        let metric_col = long.column("Metric").unwrap().str().unwrap();
        let value_col = long.column("Value").unwrap().f64().unwrap();

        for metric in METRICS {
            let back: Vec<f64> = metric_col
                .into_iter()
                .zip(value_col.into_iter())
                .filter(|(m, _)| *m == Some(metric))
                .filter_map(|(_, v)| v)
                .collect();
            let original: Vec<f64> = wide.column(metric).unwrap().f64().unwrap().into_no_null_iter().collect();
            assert_eq!(back, original, "metric {metric}");
        }
    }

    #[test]
    fn nulls_survive_the_reshape() {
        let wide = df![
            "classifier_clean" => &[Some("IBk"), None],
            "Precision" => &[None, Some(0.4)],
        ]
        .unwrap();
        let long = melt_metrics(&wide, &["Precision"]).unwrap();
        assert_eq!(long.column("Value").unwrap().null_count(), 1);
        assert_eq!(long.column("classifier_clean").unwrap().null_count(), 1);
    }
}
