//! Column helpers shared by the result, terminal and setpoint tables.

use polars::prelude::*;
use relayset_core::{Kiloamperes, RelayError, RelayResult};

pub(crate) fn table_error(err: PolarsError) -> RelayError {
    RelayError::Other(format!("table operation failed: {err}"))
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().contains(&name)
}

/// Read a numeric column as nullable `f64` values.
pub fn f64_column(df: &DataFrame, name: &str) -> RelayResult<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .map_err(|_| RelayError::InvalidInput(format!("missing column '{name}'")))?
        .cast(&DataType::Float64)
        .map_err(table_error)?;
    let values = series.f64().map_err(table_error)?;
    Ok(values.into_iter().collect())
}

/// Read a string column; non-string columns are cast.
pub fn str_column(df: &DataFrame, name: &str) -> RelayResult<Vec<Option<String>>> {
    let series = df
        .column(name)
        .map_err(|_| RelayError::InvalidInput(format!("missing column '{name}'")))?
        .cast(&DataType::Utf8)
        .map_err(table_error)?;
    let values = series.utf8().map_err(table_error)?;
    Ok(values
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

pub(crate) fn ka_values(values: impl IntoIterator<Item = Option<Kiloamperes>>) -> Vec<Option<f64>> {
    values.into_iter().map(|v| v.map(Kiloamperes::value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_nullable_columns() {
        let df = DataFrame::new(vec![
            Series::new("name", vec!["a", "b"]),
            Series::new("value", vec![Some(1i64), None]),
        ])
        .unwrap();

        assert!(has_column(&df, "value"));
        assert!(!has_column(&df, "other"));
        assert_eq!(f64_column(&df, "value").unwrap(), vec![Some(1.0), None]);
        assert_eq!(
            str_column(&df, "name").unwrap(),
            vec![Some("a".to_string()), Some("b".to_string())]
        );
        assert!(matches!(
            f64_column(&df, "missing"),
            Err(RelayError::InvalidInput(_))
        ));
    }
}
