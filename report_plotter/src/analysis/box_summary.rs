use polars::prelude::*;
use serde::Serialize;

use crate::analysis::faceted_boxplot::FacetFigure;
use crate::models::VALUE_COL;

// Whiskers reach the furthest point within this many IQRs of the box.
const WHISKER_IQR: f64 = 1.5;

/// Quartile box plus whisker ends for one (metric, classifier) group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoxStats {
    pub count: usize,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_low: f64,
    pub whisker_high: f64,
}

impl BoxStats {
    /// `None` when no non-NaN value is left.
    pub fn from_values(values: &[f64]) -> PolarsResult<Option<Self>> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if finite.is_empty() {
            return Ok(None);
        }

        let ca = Float64Chunked::from_vec(VALUE_COL.into(), finite.clone());
        let q1 = linear_quantile(&ca, 0.25)?;
        let median = linear_quantile(&ca, 0.5)?;
        let q3 = linear_quantile(&ca, 0.75)?;

        let iqr = q3 - q1;
        let low_fence = q1 - WHISKER_IQR * iqr;
        let high_fence = q3 + WHISKER_IQR * iqr;

        let whisker_low = finite
            .iter()
            .copied()
            .filter(|v| *v >= low_fence)
            .fold(f64::INFINITY, f64::min)
            .min(q1);
        let whisker_high = finite
            .iter()
            .copied()
            .filter(|v| *v <= high_fence)
            .fold(f64::NEG_INFINITY, f64::max)
            .max(q3);

        Ok(Some(BoxStats {
            count: finite.len(),
            q1,
            median,
            q3,
            whisker_low,
            whisker_high,
        }))
    }
}

fn linear_quantile(ca: &Float64Chunked, q: f64) -> PolarsResult<f64> {
    ca.quantile(q, QuantileMethod::Linear)?
        .ok_or_else(|| PolarsError::ComputeError(format!("no {q} quantile for empty group").into()))
}

#[derive(Debug, Clone, Serialize)]
pub struct BoxSummaryRecord {
    pub metric: String,
    pub classifier: String,
    #[serde(flatten)]
    pub stats: BoxStats,
}

/// One record per drawn box, panel by panel in figure order.
pub fn summary_records(figure: &FacetFigure) -> Vec<BoxSummaryRecord> {
    figure
        .panels
        .iter()
        .flat_map(|panel| {
            panel.groups.iter().filter_map(move |group| {
                group.stats.map(|stats| BoxSummaryRecord {
                    metric: panel.metric.clone(),
                    classifier: group.classifier.to_string(),
                    stats,
                })
            })
        })
        .collect()
}
