//! Diagnostics engine: autocorrelation, partial autocorrelation and
//! stationarity statistics.

pub mod correlation;
pub mod residuals;
pub mod stationarity;

pub use correlation::*;
pub use residuals::*;
pub use stationarity::*;

use tracing::{debug, warn};

use crate::domain::{DiagnosticResult, LagStatistic, PacfMethod, TimeSeries};
use crate::error::{Result, TsError};
use crate::math::two_sided_z;

/// ACF and PACF for lags `0..=max_lag` plus the ADF test over the full series.
///
/// `alpha` is the significance level of the reported margins of error. Lag 0
/// is the trivial correlation 1 with a zero margin.
pub fn compute_acf_pacf(
    series: &TimeSeries,
    max_lag: usize,
    method: PacfMethod,
    alpha: f64,
) -> Result<DiagnosticResult> {
    let n = series.len();
    if max_lag == 0 || max_lag >= n {
        return Err(TsError::invalid_parameter(
            "max lag",
            format!("must satisfy 1 <= max lag < {n} (series length), got {max_lag}"),
        ));
    }
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(TsError::invalid_parameter("alpha", format!("must be in (0, 1), got {alpha}")));
    }
    let x = series.dense_values()?;
    let z = two_sided_z(1.0 - alpha)?;

    let r = acf(&x, max_lag)?;
    let pacf = match method {
        PacfMethod::DurbinLevinson => pacf_durbin_levinson(&r),
        PacfMethod::Ols => pacf_ols(&x, max_lag)?,
    };
    let acf_margin = acf_margins(&r, n, z);
    let pacf_margin = pacf_margin(n, z);

    let origin = LagStatistic {
        lag: 0,
        acf: r[0],
        acf_margin: 0.0,
        pacf: 1.0,
        pacf_margin: 0.0,
    };
    let lags = std::iter::once(origin)
        .chain((1..=max_lag).map(|k| LagStatistic {
            lag: k,
            acf: r[k],
            acf_margin: acf_margin[k - 1],
            pacf: pacf[k - 1],
            pacf_margin,
        }))
        .collect();

    let adf = match adf_test(&x, None) {
        Ok(adf) => Some(adf),
        Err(err) => {
            warn!(series = %series.name, error = %err, "ADF test skipped");
            None
        }
    };
    debug!(series = %series.name, max_lag, ?method, "autocorrelation computed");

    Ok(DiagnosticResult { lags, adf })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SimulationSpec, simulate_arima};

    #[test]
    fn lag_table_starts_at_zero_and_attaches_adf() {
        let x = simulate_arima(&SimulationSpec::ar1(0.5, 200, 1)).unwrap();
        let s = TimeSeries::from_values("y", &x);
        let d = compute_acf_pacf(&s, 12, PacfMethod::DurbinLevinson, 0.05).unwrap();
        assert_eq!(d.lags.len(), 13);
        let origin = d.lags[0];
        assert_eq!(origin.lag, 0);
        assert!((origin.acf - 1.0).abs() < 1e-12);
        assert_eq!(origin.pacf, 1.0);
        assert_eq!((origin.acf_margin, origin.pacf_margin), (0.0, 0.0));
        assert_eq!(d.lags[12].lag, 12);
        assert!((d.lags[1].pacf - d.lags[1].acf).abs() < 1e-12);
        assert!(d.adf.unwrap().p_value < 0.05);
    }

    #[test]
    fn max_lag_must_be_below_length() {
        let s = TimeSeries::from_values("y", &[1.0, 2.0, 4.0, 3.0]);
        let err = compute_acf_pacf(&s, 4, PacfMethod::DurbinLevinson, 0.05).unwrap_err();
        assert!(matches!(err, TsError::InvalidParameter { .. }));
        let err = compute_acf_pacf(&s, 0, PacfMethod::DurbinLevinson, 0.05).unwrap_err();
        assert!(matches!(err, TsError::InvalidParameter { .. }));
    }

    #[test]
    fn short_series_has_no_adf() {
        let s = TimeSeries::from_values("y", &[1.0, 3.0, 2.0, 5.0]);
        let d = compute_acf_pacf(&s, 2, PacfMethod::DurbinLevinson, 0.05).unwrap();
        assert!(d.adf.is_none());
    }
}
