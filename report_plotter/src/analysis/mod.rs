pub mod box_summary;
pub mod faceted_boxplot;
pub mod reshape;
pub mod sampling_comparison;
