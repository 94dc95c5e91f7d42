//! Lagged differencing of a table column.

use tracing::debug;

use crate::domain::{Column, DifferenceConfig, TableView};
use crate::error::{Result, TsError};

/// Name of the appended column, e.g. `sales(-1)`.
pub fn difference_column_name(column: &str, lag: usize) -> String {
    format!("{column}(-{lag})")
}

/// `y_t - y_{t-lag}` for every row; rows without a partner are missing.
pub fn lagged_difference(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|t| {
            let prev = t.checked_sub(lag)?;
            Some(values[t]? - values[prev]?)
        })
        .collect()
}

/// Append the differenced column to a copy of `table`.
pub fn difference(table: &TableView, config: &DifferenceConfig) -> Result<TableView> {
    if config.lag == 0 {
        return Err(TsError::invalid_parameter("lag", "must be >= 1"));
    }
    let values = table.numeric(&config.column)?;
    let diffed = lagged_difference(values, config.lag);

    let mut out = table.clone();
    out.push_column(Column::numeric(
        difference_column_name(&config.column, config.lag),
        diffed,
    ))?;
    debug!(column = %config.column, lag = config.lag, "column differenced");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_lagged_difference() {
        let table = TableView::new(vec![Column::numeric(
            "sales",
            vec![Some(1.0), Some(4.0), None, Some(10.0), Some(15.0)],
        )])
        .unwrap();
        let config = DifferenceConfig {
            column: "sales".into(),
            lag: 2,
        };
        let out = difference(&table, &config).unwrap();
        assert_eq!(out.column_names(), vec!["sales", "sales(-2)"]);
        assert_eq!(
            out.numeric("sales(-2)").unwrap(),
            &[None, None, None, Some(6.0), None]
        );
    }

    #[test]
    fn zero_lag_and_text_columns_are_rejected() {
        let table = TableView::new(vec![Column::text("name", vec![Some("a".into())])]).unwrap();
        let zero = DifferenceConfig {
            column: "name".into(),
            lag: 0,
        };
        assert!(matches!(difference(&table, &zero), Err(TsError::InvalidParameter { .. })));
        let text = DifferenceConfig {
            column: "name".into(),
            lag: 1,
        };
        assert!(matches!(difference(&table, &text), Err(TsError::TypeMismatch { .. })));
    }
}
