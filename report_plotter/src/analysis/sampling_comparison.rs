//! Sampling comparison: for each metric, one chart with a box per
//! (classifier, strategy) pair, where the strategy comes from the `SMOTE`
//! flag of each fold.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use polars::prelude::*;
use tracing::{debug, info};

use crate::analysis::box_summary::BoxStats;
use crate::analysis::faceted_boxplot::{category_tick, draw_box, draw_heavy_text, tick_style};
use crate::helper_functions::ensure_dir;
use crate::models::{polars_err, ProjectLabel, CLASSIFIER_CLEAN_COL};

pub const SMOTE_COL: &str = "SMOTE";
pub const STRATEGY_COL: &str = "strategy";

pub const NO_SAMPLING: &str = "NoSampling";
pub const UNDER_SAMPLING: &str = "UnderSampling";
/// Series order inside each category.
pub const STRATEGIES: [&str; 2] = [NO_SAMPLING, UNDER_SAMPLING];

const CHART_SIZE: (u32, u32) = (1000, 600);
const TITLE_BAND: i32 = 50;
const TITLE_PX: f64 = 20.0;
const AXIS_PX: f64 = 14.0;
const TICK_PX: f64 = 13.0;
const LEGEND_PX: f64 = 13.0;
const CHART_MARGIN: i32 = 20;
const X_LABEL_AREA: u32 = 50;
const Y_LABEL_AREA: u32 = 70;
const LINE_WIDTH: u32 = 2;
// each category is one unit wide; its boxes sit side by side inside it
const SERIES_OFFSET: f64 = 0.2;
const BOX_HALF_WIDTH: f64 = 0.17;
const RANGE_PADDING: f64 = 0.05;

const SERIES_COLORS: [RGBColor; 2] = [RGBColor(173, 216, 230), RGBColor(70, 130, 180)];

#[derive(Debug, Clone)]
pub struct ComparisonBox {
    pub classifier: String,
    pub strategy: &'static str,
    pub values: Vec<f64>,
    pub stats: Option<BoxStats>,
}

#[derive(Debug, Clone)]
pub struct ComparisonChart {
    pub metric: String,
    pub title: String,
    pub classifiers: Vec<String>,
    /// Classifier-major, strategies in [`STRATEGIES`] order within each.
    pub boxes: Vec<ComparisonBox>,
}

impl ComparisonChart {
    pub fn file_name(&self, project: &ProjectLabel) -> String {
        comparison_file_name(project, &self.metric)
    }

    /// Whisker-to-whisker range over every box, padded by 5 %.
    fn value_range(&self) -> (f64, f64) {
        let (lo, hi) = self
            .boxes
            .iter()
            .filter_map(|b| b.stats)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.whisker_low), hi.max(s.whisker_high))
            });

        if !lo.is_finite() || !hi.is_finite() {
            return (0.0, 1.0);
        }
        let pad = ((hi - lo) * RANGE_PADDING).max(RANGE_PADDING * 0.1);
        (lo - pad, hi + pad)
    }
}

pub fn comparison_file_name(project: &ProjectLabel, metric: &str) -> String {
    format!("{}_comparison_{}.png", project.path_name(), metric.to_lowercase())
}

/// `UnderSampling` where the `SMOTE` flag reads `true` (any case), `NoSampling`
/// for anything else, nulls included.
pub fn strategy_expr() -> Expr {
    when(
        col(SMOTE_COL)
            .cast(DataType::String)
            .str()
            .to_lowercase()
            .eq(lit("true")),
    )
    .then(lit(UNDER_SAMPLING))
    .otherwise(lit(NO_SAMPLING))
    .alias(STRATEGY_COL)
}

pub fn with_strategy(df: &DataFrame) -> PolarsResult<DataFrame> {
    df.clone().lazy().with_column(strategy_expr()).collect()
}

// Known classifiers first, in `order`; any other label after them in order
// of first appearance.
fn classifier_categories(labels: &StringChunked, order: &[&str]) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    for label in labels.into_iter().flatten() {
        if !seen.contains(&label) {
            seen.push(label);
        }
    }

    let mut categories: Vec<String> = order
        .iter()
        .filter(|c| seen.contains(*c))
        .map(|c| c.to_string())
        .collect();
    categories.extend(
        seen.iter()
            .filter(|c| !order.contains(*c))
            .map(|c| c.to_string()),
    );
    categories
}

/// One chart per metric from the cleaned fold results. Frames without a
/// `SMOTE` column yield no charts.
pub fn comparison_charts(
    df: &DataFrame,
    metrics: &[&str],
    order: &[&str],
    project: &ProjectLabel,
) -> PolarsResult<Vec<ComparisonChart>> {
    if df.column(SMOTE_COL).is_err() {
        info!("No {} column in fold results; skipping sampling comparison", SMOTE_COL);
        return Ok(Vec::new());
    }

    let split = with_strategy(df)?;
    let labels = split.column(CLASSIFIER_CLEAN_COL)?.str()?;
    let strategies = split.column(STRATEGY_COL)?.str()?;

    let classifiers = classifier_categories(labels, order);
    let classifier_idx: HashMap<&str, usize> = classifiers
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let mut charts = Vec::with_capacity(metrics.len());
    for metric in metrics {
        let values = split.column(metric)?.f64()?;
        let mut cells = vec![vec![Vec::<f64>::new(); STRATEGIES.len()]; classifiers.len()];

        for ((label, strategy), value) in labels
            .into_iter()
            .zip(strategies.into_iter())
            .zip(values.into_iter())
        {
            let (Some(label), Some(strategy), Some(value)) = (label, strategy, value) else {
                continue;
            };
            if value.is_nan() {
                continue;
            }
            let c = classifier_idx[label];
            let s = if strategy == UNDER_SAMPLING { 1 } else { 0 };
            cells[c][s].push(value);
        }

        let mut boxes = Vec::with_capacity(classifiers.len() * STRATEGIES.len());
        for (classifier, slots) in classifiers.iter().zip(cells) {
            for (strategy, values) in STRATEGIES.iter().zip(slots) {
                let stats = BoxStats::from_values(&values)?;
                debug!("{metric}/{classifier}/{strategy}: {} values", values.len());
                boxes.push(ComparisonBox {
                    classifier: classifier.clone(),
                    strategy: *strategy,
                    values,
                    stats,
                });
            }
        }

        charts.push(ComparisonChart {
            metric: metric.to_string(),
            title: format!("{}: Sampling impact on {}", project.display_name(), metric),
            classifiers: classifiers.clone(),
            boxes,
        });
    }
    Ok(charts)
}

pub fn render_comparison_chart(chart_data: &ComparisonChart, output_path: &Path) -> PolarsResult<()> {
    let root = BitMapBackend::new(output_path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| polars_err(Box::new(e)))?;

    let (header, body) = root.split_vertically(TITLE_BAND);
    draw_heavy_text(&header, &chart_data.title, TITLE_PX)?;

    let categories: Vec<&str> = chart_data.classifiers.iter().map(String::as_str).collect();
    let n = categories.len().max(1);
    let (y_lo, y_hi) = chart_data.value_range();

    let mut chart = ChartBuilder::on(&body)
        .margin(CHART_MARGIN)
        .x_label_area_size(X_LABEL_AREA)
        .y_label_area_size(Y_LABEL_AREA)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), y_lo..y_hi)
        .map_err(|e| polars_err(Box::new(e)))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&|v: &f64| category_tick(&categories, *v))
        .y_label_formatter(&|v: &f64| format!("{v:.2}"))
        .x_desc("Classifier")
        .y_desc("Value")
        .axis_desc_style(("sans-serif", AXIS_PX))
        .label_style(tick_style(TICK_PX))
        .draw()
        .map_err(|e| polars_err(Box::new(e)))?;

    // legend entries only; the boxes themselves are drawn below
    for (strategy, color) in STRATEGIES.iter().zip(SERIES_COLORS) {
        chart
            .draw_series(std::iter::empty::<Rectangle<(f64, f64)>>())
            .map_err(|e| polars_err(Box::new(e)))?
            .label(*strategy)
            .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 14, y + 6)], color.filled()));
    }

    for (idx, cell) in chart_data.boxes.iter().enumerate() {
        let Some(stats) = cell.stats else { continue };
        let category = (idx / STRATEGIES.len()) as f64;
        let series = idx % STRATEGIES.len();
        let x = category + if series == 0 { -SERIES_OFFSET } else { SERIES_OFFSET };
        draw_box(&mut chart, x, BOX_HALF_WIDTH, &stats, SERIES_COLORS[series], LINE_WIDTH)?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerMiddle)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", LEGEND_PX))
        .draw()
        .map_err(|e| polars_err(Box::new(e)))?;

    root.present().map_err(|e| polars_err(Box::new(e)))?;
    info!("Rendered {} comparison to {}", chart_data.metric, output_path.display());
    Ok(())
}

/// Renders every chart into `output_dir` (created if missing) and returns
/// the PNG paths in metric order.
pub fn write_comparison_charts(
    charts: &[ComparisonChart],
    project: &ProjectLabel,
    output_dir: &Path,
) -> PolarsResult<Vec<PathBuf>> {
    if charts.is_empty() {
        return Ok(Vec::new());
    }
    ensure_dir(output_dir)?;

    let mut written = Vec::with_capacity(charts.len());
    for chart in charts {
        let path = output_dir.join(chart.file_name(project));
        render_comparison_chart(chart, &path)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CLASSIFIER_ORDER, METRICS};
    use polars::df;

    fn strategies_of(df: &DataFrame) -> Vec<String> {
        with_strategy(df)
            .unwrap()
            .column(STRATEGY_COL)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|s| s.unwrap().to_string())
            .collect()
    }

    fn folds(rows: &[(&str, bool, f64)]) -> DataFrame {
        let labels: Vec<&str> = rows.iter().map(|r| r.0).collect();
        let smote: Vec<bool> = rows.iter().map(|r| r.1).collect();
        let values: Vec<f64> = rows.iter().map(|r| r.2).collect();
        df![
            "classifier_clean" => labels,
            "SMOTE" => smote,
            "Precision" => values.clone(),
            "Recall" => values.clone(),
            "AUC" => values.clone(),
            "Kappa" => values.clone(),
            "NPofB20" => values,
        ]
        .unwrap()
    }

    #[test]
    fn boolean_flag_splits_strategies() {
        let df = df!["SMOTE" => [true, false, true]].unwrap();
        assert_eq!(strategies_of(&df), vec![UNDER_SAMPLING, NO_SAMPLING, UNDER_SAMPLING]);
    }

    #[test]
    fn text_flag_reads_like_a_boolean() {
        let df = df!["SMOTE" => [Some("TRUE"), Some("false"), Some("yes"), None]].unwrap();
        assert_eq!(
            strategies_of(&df),
            vec![UNDER_SAMPLING, NO_SAMPLING, NO_SAMPLING, NO_SAMPLING]
        );
    }

    #[test]
    fn one_chart_per_metric_with_box_per_pair() {
        let df = folds(&[
            ("IBk", true, 0.8),
            ("IBk", false, 0.6),
            ("IBk", true, 0.9),
            ("NaiveBayes", false, 0.5),
        ]);
        let charts = comparison_charts(&df, &METRICS, &CLASSIFIER_ORDER, &ProjectLabel::new("Hive")).unwrap();
        assert_eq!(charts.len(), 5);
        assert_eq!(charts[2].metric, "AUC");
        assert_eq!(charts[2].title, "HIVE: Sampling impact on AUC");

        let precision = &charts[0];
        assert_eq!(precision.classifiers, vec!["NaiveBayes", "IBk"]);

        let pairs: Vec<(&str, &str, usize)> = precision
            .boxes
            .iter()
            .map(|b| (b.classifier.as_str(), b.strategy, b.values.len()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("NaiveBayes", NO_SAMPLING, 1),
                ("NaiveBayes", UNDER_SAMPLING, 0),
                ("IBk", NO_SAMPLING, 1),
                ("IBk", UNDER_SAMPLING, 2),
            ]
        );
        assert!(precision.boxes[1].stats.is_none());
        let under = precision.boxes[3].stats.unwrap();
        assert!((under.median - 0.85).abs() < 1e-12);
    }

    #[test]
    fn unknown_classifiers_follow_known_ones() {
        let df = folds(&[("J48", false, 0.3), ("RandomForest", true, 0.7), ("J48", true, 0.4)]);
        let charts = comparison_charts(&df, &METRICS, &CLASSIFIER_ORDER, &ProjectLabel::default()).unwrap();
        assert_eq!(charts[0].classifiers, vec!["RandomForest", "J48"]);
    }

    #[test]
    fn nan_values_are_left_out() {
        let df = folds(&[("IBk", false, f64::NAN), ("IBk", false, 0.4)]);
        let charts = comparison_charts(&df, &METRICS, &CLASSIFIER_ORDER, &ProjectLabel::default()).unwrap();
        assert_eq!(charts[0].boxes[0].values, vec![0.4]);
    }

    #[test]
    fn no_smote_column_means_no_charts() {
        let df = df![
            "classifier_clean" => ["IBk"],
            "Precision" => [0.5],
        ]
        .unwrap();
        let charts = comparison_charts(&df, &["Precision"], &CLASSIFIER_ORDER, &ProjectLabel::default()).unwrap();
        assert!(charts.is_empty());
    }

    #[test]
    fn file_names_use_lowercase_project_and_metric() {
        assert_eq!(
            comparison_file_name(&ProjectLabel::new("Hive"), "NPofB20"),
            "hive_comparison_npofb20.png"
        );
        assert_eq!(
            comparison_file_name(&ProjectLabel::default(), "AUC"),
            "bookkeeper_comparison_auc.png"
        );
    }

    #[test]
    fn writes_one_png_per_metric() {
        let dir = tempfile::tempdir().unwrap();
        let df = folds(&[
            ("IBk", true, 0.8),
            ("IBk", false, 0.6),
            ("RandomForest", true, 0.9),
            ("RandomForest", false, 0.7),
        ]);
        let project = ProjectLabel::new("hive");
        let charts = comparison_charts(&df, &METRICS, &CLASSIFIER_ORDER, &project).unwrap();

        let out = dir.path().join("plots").join("hive_detailed");
        let written = write_comparison_charts(&charts, &project, &out).unwrap();

        assert_eq!(written.len(), 5);
        assert_eq!(written[4], out.join("hive_comparison_npofb20.png"));
        assert!(written.iter().all(|p| p.is_file()));
    }
}
