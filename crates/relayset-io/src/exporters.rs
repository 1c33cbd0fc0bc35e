//! Study table export.
//!
//! One file per table, named after the table: `max_bus.csv`,
//! `min_transformer.parquet`, ...

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, Context, Result};
use polars::prelude::{CsvWriter, DataFrame, DataType, SerWriter};
#[cfg(feature = "parquet")]
use polars::prelude::ParquetWriter;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    #[default]
    Csv,
    Parquet,
    Json,
}

impl TableFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Parquet => "parquet",
            TableFormat::Json => "json",
        }
    }
}

impl FromStr for TableFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(TableFormat::Csv),
            "parquet" => Ok(TableFormat::Parquet),
            "json" => Ok(TableFormat::Json),
            other => Err(anyhow!(
                "unsupported table format '{other}' (use csv, parquet or json)"
            )),
        }
    }
}

/// Rows as JSON objects; nulls stay `null`.
pub fn dataframe_to_json_rows(df: &DataFrame) -> Result<Vec<Value>> {
    let columns = df.get_columns();
    let mut rows = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        let mut obj = Map::new();
        for series in columns {
            let value = match series.dtype() {
                DataType::Float64 => series
                    .f64()?
                    .get(row_idx)
                    .and_then(Number::from_f64)
                    .map(Value::Number),
                DataType::Int64 => series.i64()?.get(row_idx).map(|v| Value::Number(v.into())),
                DataType::UInt64 => series.u64()?.get(row_idx).map(|v| Value::Number(v.into())),
                DataType::UInt32 => series.u32()?.get(row_idx).map(|v| Value::Number(v.into())),
                DataType::Boolean => series.bool()?.get(row_idx).map(Value::Bool),
                DataType::Utf8 => series
                    .utf8()?
                    .get(row_idx)
                    .map(|s| Value::String(s.to_string())),
                other => {
                    return Err(anyhow!(
                        "column '{}' has unsupported type {other} for JSON export",
                        series.name()
                    ))
                }
            };
            obj.insert(series.name().to_string(), value.unwrap_or(Value::Null));
        }
        rows.push(Value::Object(obj));
    }
    Ok(rows)
}

/// Write one table to `path`.
pub fn write_table(df: &DataFrame, path: &Path, format: TableFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut df = df.clone();
    match format {
        TableFormat::Csv => CsvWriter::new(&mut file)
            .finish(&mut df)
            .with_context(|| format!("writing CSV to {}", path.display()))?,
        #[cfg(feature = "parquet")]
        TableFormat::Parquet => {
            ParquetWriter::new(&mut file)
                .finish(&mut df)
                .with_context(|| format!("writing Parquet to {}", path.display()))?;
        }
        #[cfg(not(feature = "parquet"))]
        TableFormat::Parquet => {
            return Err(anyhow!(
                "parquet support is disabled; rebuild with the 'parquet' feature"
            ))
        }
        TableFormat::Json => {
            let rows = dataframe_to_json_rows(&df)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &rows)
                .with_context(|| format!("writing JSON to {}", path.display()))?;
            writer.flush()?;
        }
    }
    debug!("wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// Write every named table into `dir`, returning the written paths in order.
pub fn export_tables<'a>(
    tables: impl IntoIterator<Item = (String, &'a DataFrame)>,
    dir: &Path,
    format: TableFormat,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory '{}'", dir.display()))?;
    tables
        .into_iter()
        .map(|(name, df)| {
            let path = dir.join(format!("{name}.{}", format.extension()));
            write_table(df, &path, format)?;
            Ok(path)
        })
        .collect()
}
