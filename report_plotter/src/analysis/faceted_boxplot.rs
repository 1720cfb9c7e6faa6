//! Faceted box-and-strip figure: one panel per metric, one box per classifier.
//!
//! The figure is assembled as plain data first ([`FacetFigure`]) so that
//! titles, panel order and category order can be checked without drawing,
//! then rasterized with plotters onto a PNG sized for 300 DPI.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters_backend::{FontStyle, FontTransform};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::analysis::box_summary::{summary_records, BoxStats};
use crate::helper_functions::{dataframe_to_csv, ensure_dir, write_json};
use crate::models::{polars_err, ProjectLabel, CLASSIFIER_CLEAN_COL, METRIC_COL, VALUE_COL};

// --------------------------------------------------------
//  Layout (inches / points, converted at DPI)
// --------------------------------------------------------
const DPI: f64 = 300.0;
const PANEL_WIDTH_IN: f64 = 3.5;
const PANEL_HEIGHT_IN: f64 = 5.0;
// Fraction of the canvas height left to the panels; the rest holds the title.
const PANELS_TOP: f64 = 0.85;
const FONT_SIZE_SUPTITLE_PT: f64 = 16.0;
const FONT_SIZE_TITLE_PT: f64 = 12.0;
const FONT_SIZE_AXIS_PT: f64 = 11.0;
const FONT_SIZE_TICK_PT: f64 = 10.0;
const PANEL_MARGIN: i32 = 30;
const X_LABEL_AREA: u32 = 330;
const Y_LABEL_AREA: u32 = 220;
// panel caption band, in multiples of the caption font size
const CAPTION_BAND_EM: f64 = 1.8;
const LINE_WIDTH: u32 = 5;
const POINT_RADIUS: u32 = 10;

// --------------------------------------------------------
//  Boxes and strips
// --------------------------------------------------------
const BOX_HALF_WIDTH: f64 = 0.4;
// caps span half the box width
const CAP_RATIO: f64 = 0.5;
const STRIP_JITTER: f64 = 0.2;
const STRIP_ALPHA: f64 = 0.3;
const JITTER_SEED: u64 = 42;
const RANGE_PADDING: f64 = 0.05;

pub const FIGURE_FILE: &str = "faceted_boxplots.png";
pub const SUMMARY_FILE: &str = "box_summary.json";
pub const LONG_FORM_FILE: &str = "long_form.csv";

// muted palette, one colour per category slot
const PALETTE: [RGBColor; 3] = [
    RGBColor(72, 120, 208),
    RGBColor(238, 133, 74),
    RGBColor(106, 204, 100),
];
const EDGE: RGBColor = RGBColor(64, 64, 64);
const STRIP: RGBColor = RGBColor(77, 77, 77);
const GRID: RGBColor = RGBColor(234, 234, 242);

#[derive(Debug, Clone)]
pub struct CategoryGroup {
    pub classifier: &'static str,
    pub values: Vec<f64>,
    pub stats: Option<BoxStats>,
}

#[derive(Debug, Clone)]
pub struct FacetPanel {
    pub metric: String,
    pub groups: Vec<CategoryGroup>,
}

impl FacetPanel {
    pub fn categories(&self) -> Vec<&'static str> {
        self.groups.iter().map(|g| g.classifier).collect()
    }

    /// Data range of the panel padded by 5 % on both ends; every panel gets
    /// its own y scale.
    pub fn value_range(&self) -> (f64, f64) {
        let values = self.groups.iter().flat_map(|g| g.values.iter().copied());
        let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

        if !lo.is_finite() || !hi.is_finite() {
            return (0.0, 1.0);
        }
        if (hi - lo).abs() < 1e-9 {
            return (lo - RANGE_PADDING, hi + RANGE_PADDING);
        }
        let pad = (hi - lo) * RANGE_PADDING;
        (lo - pad, hi + pad)
    }
}

#[derive(Debug, Clone)]
pub struct FacetFigure {
    pub title: String,
    pub panels: Vec<FacetPanel>,
}

impl FacetFigure {
    /// Groups the long-form observations into one panel per metric and one
    /// slot per category in `order`. Slots with no data stay in place; rows
    /// whose classifier is not in `order` are left out of the figure.
    pub fn from_long_frame(
        long: &DataFrame,
        metrics: &[&str],
        order: &[&'static str],
        project: &ProjectLabel,
    ) -> PolarsResult<Self> {
        let classifiers = long.column(CLASSIFIER_CLEAN_COL)?.str()?;
        let metric_col = long.column(METRIC_COL)?.str()?;
        let values = long.column(VALUE_COL)?.f64()?;

        let metric_idx: HashMap<&str, usize> =
            metrics.iter().enumerate().map(|(i, m)| (*m, i)).collect();
        let category_idx: HashMap<&str, usize> =
            order.iter().enumerate().map(|(i, c)| (*c, i)).collect();

        let mut buckets = vec![vec![Vec::<f64>::new(); order.len()]; metrics.len()];
        let mut skipped = 0usize;

        for ((classifier, metric), value) in classifiers
            .into_iter()
            .zip(metric_col.into_iter())
            .zip(values.into_iter())
        {
            let slot = metric
                .and_then(|m| metric_idx.get(m))
                .zip(classifier.and_then(|c| category_idx.get(c)));
            match (slot, value) {
                (Some((&m, &c)), Some(v)) if !v.is_nan() => buckets[m][c].push(v),
                (Some(_), _) => {}
                (None, _) => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!("Skipped {} observations with a classifier outside {:?}", skipped, order);
        }

        let mut panels = Vec::with_capacity(metrics.len());
        for (metric, slots) in metrics.iter().zip(buckets) {
            let mut groups = Vec::with_capacity(order.len());
            for (classifier, values) in order.iter().zip(slots) {
                let stats = BoxStats::from_values(&values)?;
                debug!("{metric}/{classifier}: {} values, {:?}", values.len(), stats);
                groups.push(CategoryGroup { classifier: *classifier, values, stats });
            }
            panels.push(FacetPanel { metric: metric.to_string(), groups });
        }

        Ok(FacetFigure {
            title: format!("Performance Distribution across Metrics - {}", project.display_name()),
            panels,
        })
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        let panel_w = PANEL_WIDTH_IN * DPI;
        let panel_h = PANEL_HEIGHT_IN * DPI;
        let width = panel_w * self.panels.len().max(1) as f64;
        let height = panel_h / PANELS_TOP;
        (width.round() as u32, height.round() as u32)
    }
}

fn pt(points: f64) -> f64 {
    points * DPI / 72.0
}

pub(crate) fn tick_style(size_px: f64) -> TextStyle<'static> {
    ("sans-serif", size_px).into_font().into()
}

// matplotlib would tilt these 45°; plotters only rotates in quarter turns
fn category_tick_style() -> TextStyle<'static> {
    tick_style(pt(FONT_SIZE_TICK_PT)).transform(FontTransform::Rotate90)
}

/// Label at integer category positions, blank everywhere else.
pub(crate) fn category_tick(categories: &[&str], v: f64) -> String {
    let idx = v.round();
    if (v - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    categories.get(idx as usize).map(|c| c.to_string()).unwrap_or_default()
}

// font-kit falls back to the regular face when the family has no bold one
// installed, so heavy text is also overstruck a few pixels wide.
fn overstrike_offsets(size_px: f64) -> Vec<i32> {
    let extra = (size_px / 30.0).round().max(1.0) as i32;
    (0..=extra).map(|dx| dx - extra / 2).collect()
}

/// Bold text centred in `area`.
pub(crate) fn draw_heavy_text<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    text: &str,
    size_px: f64,
) -> PolarsResult<()>
where
    DB::ErrorType: 'static,
{
    let (w, h) = area.dim_in_pixel();
    let style = TextStyle::from(("sans-serif", size_px).into_font().style(FontStyle::Bold))
        .pos(Pos::new(HPos::Center, VPos::Center));
    let (cx, cy) = (w as i32 / 2, h as i32 / 2);

    for dx in overstrike_offsets(size_px) {
        area.draw(&Text::new(text, (cx + dx, cy), style.clone()))
            .map_err(|e| polars_err(Box::new(e)))?;
    }
    Ok(())
}

/// Draws `figure` into a PNG at `output_path`.
pub fn render_faceted_boxplots(figure: &FacetFigure, output_path: &Path) -> PolarsResult<()> {
    let (width, height) = figure.canvas_size();
    let root = BitMapBackend::new(output_path, (width, height)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| polars_err(Box::new(e)))?;

    let axis_font = ("sans-serif", pt(FONT_SIZE_AXIS_PT));
    let title_band = (height as f64 * (1.0 - PANELS_TOP)).round() as i32;
    let caption_band = (pt(FONT_SIZE_TITLE_PT) * CAPTION_BAND_EM).round() as i32;

    let (header, body) = root.split_vertically(title_band);
    draw_heavy_text(&header, &figure.title, pt(FONT_SIZE_SUPTITLE_PT))?;
    let areas = body.split_evenly((1, figure.panels.len().max(1)));

    let mut rng = StdRng::seed_from_u64(JITTER_SEED);

    for (panel, area) in figure.panels.iter().zip(areas.iter()) {
        let categories = panel.categories();
        let n = categories.len();
        let (y_lo, y_hi) = panel.value_range();

        let (caption, plot_area) = area.split_vertically(caption_band);
        draw_heavy_text(&caption, &panel.metric, pt(FONT_SIZE_TITLE_PT))?;

        let mut chart = ChartBuilder::on(&plot_area)
            .margin(PANEL_MARGIN)
            .x_label_area_size(X_LABEL_AREA)
            .y_label_area_size(Y_LABEL_AREA)
            .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), y_lo..y_hi)
            .map_err(|e| polars_err(Box::new(e)))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .bold_line_style(GRID.stroke_width(2))
            .light_line_style(WHITE.stroke_width(0))
            .x_labels(n)
            .x_label_formatter(&|v: &f64| category_tick(&categories, *v))
            .y_labels(6)
            .y_label_formatter(&|v: &f64| format!("{v:.2}"))
            .y_desc("Score")
            .axis_desc_style(axis_font)
            .x_label_style(category_tick_style())
            .y_label_style(tick_style(pt(FONT_SIZE_TICK_PT)))
            .draw()
            .map_err(|e| polars_err(Box::new(e)))?;

        for (idx, group) in panel.groups.iter().enumerate() {
            let x = idx as f64;
            if let Some(stats) = group.stats {
                draw_box(&mut chart, x, BOX_HALF_WIDTH, &stats, PALETTE[idx % PALETTE.len()], LINE_WIDTH)?;
            }

            chart
                .draw_series(group.values.iter().map(|&v| {
                    let dx = rng.gen_range(-STRIP_JITTER..=STRIP_JITTER);
                    Circle::new((x + dx, v), POINT_RADIUS, STRIP.mix(STRIP_ALPHA).filled())
                }))
                .map_err(|e| polars_err(Box::new(e)))?;
        }
    }

    root.present().map_err(|e| polars_err(Box::new(e)))?;
    info!("Rendered {} panels to {}", figure.panels.len(), output_path.display());
    Ok(())
}

/// Box, median, whiskers and caps centred on `x`; outliers are never drawn.
pub(crate) fn draw_box<DB: DrawingBackend>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    x: f64,
    half_width: f64,
    stats: &BoxStats,
    fill: RGBColor,
    line_width: u32,
) -> PolarsResult<()>
where
    DB::ErrorType: 'static,
{
    let edge = EDGE.stroke_width(line_width);
    let (left, right) = (x - half_width, x + half_width);
    let cap = half_width * CAP_RATIO;

    chart
        .draw_series(std::iter::once(Rectangle::new(
            [(left, stats.q1), (right, stats.q3)],
            fill.filled(),
        )))
        .map_err(|e| polars_err(Box::new(e)))?;
    chart
        .draw_series(std::iter::once(Rectangle::new([(left, stats.q1), (right, stats.q3)], edge)))
        .map_err(|e| polars_err(Box::new(e)))?;

    let segments = vec![
        // median
        vec![(left, stats.median), (right, stats.median)],
        // whiskers
        vec![(x, stats.q3), (x, stats.whisker_high)],
        vec![(x, stats.q1), (x, stats.whisker_low)],
        // caps
        vec![(x - cap, stats.whisker_high), (x + cap, stats.whisker_high)],
        vec![(x - cap, stats.whisker_low), (x + cap, stats.whisker_low)],
    ];
    chart
        .draw_series(segments.into_iter().map(|points| PathElement::new(points, edge)))
        .map_err(|e| polars_err(Box::new(e)))?;

    Ok(())
}

/// Writes the PNG, the per-box summary and the long-form table into
/// `output_dir` (created if missing). Returns the PNG path.
pub fn write_report(figure: &FacetFigure, long: &mut DataFrame, output_dir: &Path) -> PolarsResult<PathBuf> {
    ensure_dir(output_dir)?;

    let figure_path = output_dir.join(FIGURE_FILE);
    render_faceted_boxplots(figure, &figure_path)?;

    write_json(&summary_records(figure), &output_dir.join(SUMMARY_FILE))?;
    dataframe_to_csv(long, &output_dir.join(LONG_FORM_FILE))?;

    Ok(figure_path)
}
