use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use polars::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::analysis::faceted_boxplot::{write_report, FacetFigure};
use crate::analysis::reshape::melt_metrics;
use crate::analysis::sampling_comparison::{comparison_charts, write_comparison_charts, ComparisonChart};
use crate::data_handling::fold_results::FoldResultsDataset;
use crate::helper_functions::project_root;
use crate::models::{Dataset, ProjectLabel, CLASSIFIER_ORDER, METRICS};

mod analysis;
mod data_handling;
mod helper_functions;
mod models;

/// Everything a run needs: where the fold results live, which project the
/// figure is for, and where the `plots/` tree goes.
#[derive(Debug, Clone)]
struct ReportConfig {
    csv_path: PathBuf,
    project: ProjectLabel,
    plots_root: PathBuf,
}

impl ReportConfig {
    /// `report_plotter [project]`; anything after the first argument is ignored.
    fn from_args<I: IntoIterator<Item = String>>(args: I) -> Self {
        let project_arg = args.into_iter().nth(1);
        ReportConfig {
            csv_path: FoldResultsDataset::at_project_root(&project_root()).path,
            project: ProjectLabel::from_arg(project_arg.as_deref()),
            plots_root: PathBuf::from("."),
        }
    }

    fn output_dir(&self) -> PathBuf {
        self.plots_root
            .join("plots")
            .join(format!("{}_detailed", self.project.path_name()))
    }
}

struct PreparedReport {
    figure: FacetFigure,
    long: DataFrame,
    comparisons: Vec<ComparisonChart>,
}

#[derive(Debug)]
struct WrittenReport {
    figure: PathBuf,
    comparisons: Vec<PathBuf>,
}

// Load, clean and reshape; nothing touches the output tree yet.
fn prepare(config: &ReportConfig) -> anyhow::Result<PreparedReport> {
    let fold_results = FoldResultsDataset { path: config.csv_path.clone() }
        .load_validated()
        .with_context(|| format!("could not load fold results from {}", config.csv_path.display()))?;

    let long = melt_metrics(&fold_results, &METRICS).context("reshaping metrics to long form")?;
    info!("{} observations across {} metrics", long.height(), METRICS.len());

    let figure = FacetFigure::from_long_frame(&long, &METRICS, &CLASSIFIER_ORDER, &config.project)
        .context("grouping observations by metric and classifier")?;

    let comparisons = comparison_charts(&fold_results, &METRICS, &CLASSIFIER_ORDER, &config.project)
        .context("grouping observations by classifier and sampling strategy")?;

    Ok(PreparedReport { figure, long, comparisons })
}

fn run(config: &ReportConfig) -> anyhow::Result<WrittenReport> {
    let PreparedReport { figure, mut long, comparisons } = prepare(config)?;

    let output_dir = config.output_dir();
    let figure = write_report(&figure, &mut long, &output_dir)
        .with_context(|| format!("writing report to {}", output_dir.display()))?;
    let comparisons = write_comparison_charts(&comparisons, &config.project, &output_dir)
        .with_context(|| format!("writing sampling comparison to {}", output_dir.display()))?;

    Ok(WrittenReport { figure, comparisons })
}

/// Hands the saved figure to the system viewer. A viewer that cannot be
/// started is only worth a warning; the PNG is already on disk.
fn display_figure<E, F>(path: &Path, open: F) -> bool
where
    E: Display,
    F: FnOnce(&Path) -> Result<(), E>,
{
    match open(path) {
        Ok(()) => {
            info!("Opened {} in the system viewer", path.display());
            true
        }
        Err(e) => {
            warn!("Could not display {}: {}", path.display(), e);
            false
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ReportConfig::from_args(env::args());
    info!("Plotting fold results for {}", config.project.display_name());

    match run(&config) {
        Ok(written) => {
            for path in &written.comparisons {
                println!("✓ Sampling comparison written: {}", path.display());
            }
            println!("✓ Faceted box plots written: {}", written.figure.display());
            display_figure(&written.figure, |p: &Path| opener::open(p));
        }
        Err(e) => {
            error!("{:#}", e);
            println!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
