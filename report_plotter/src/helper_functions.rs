use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::models::polars_err;

/// Root the fixed input path is resolved against: `PROJECT_ROOT` when set,
/// the working directory otherwise.
pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Reads a headed CSV and strips surrounding whitespace from every column name.
pub fn read_csv(file_path: &Path) -> PolarsResult<DataFrame> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    df.set_column_names(trimmed)?;

    debug!("Read {} rows x {} columns from {}", df.height(), df.width(), file_path.display());
    Ok(df)
}

/// `mkdir -p`; an existing directory is fine.
pub fn ensure_dir(dir: &Path) -> PolarsResult<()> {
    if !dir.exists() {
        info!("Creating output directory {}", dir.display());
    }
    fs::create_dir_all(dir).map_err(|e| polars_err(Box::new(e)))
}

pub fn dataframe_to_csv(df: &mut DataFrame, path: &Path) -> PolarsResult<()> {
    let mut file = File::create(path).map_err(|e| polars_err(Box::new(e)))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;
    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> PolarsResult<()> {
    let file = File::create(path).map_err(|e| polars_err(Box::new(e)))?;
    serde_json::to_writer_pretty(file, value).map_err(|e| polars_err(Box::new(e)))?;
    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn read_csv_strips_header_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("padded.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, " Classifier , Precision").unwrap();
        writeln!(f, "ibk_fold1,0.5").unwrap();
        drop(f);

        let df = read_csv(&path).unwrap();
        let columns = df.get_column_names();
        let names: Vec<&str> = columns.iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["Classifier", "Precision"]);
    }

    #[test]
    fn read_csv_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_csv(&dir.path().join("absent.csv")).is_err());
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("plots").join("hive_detailed");
        ensure_dir(&nested).unwrap();
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
