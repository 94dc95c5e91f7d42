//! Read/write saved model JSON files.
//!
//! A saved model is the portable form of a fit: the model orders, estimated
//! coefficients and the training tail the forecast recursion needs. The
//! `apply` command reloads it to forecast without refitting.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::forecast::FittedModel;

/// Format version written into every saved model.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// On-disk envelope around a [`FittedModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedModel {
    pub tool: String,
    pub version: u32,
    pub model: FittedModel,
}

impl SavedModel {
    pub fn new(model: FittedModel) -> Self {
        Self {
            tool: "tsa".to_string(),
            version: MODEL_FORMAT_VERSION,
            model,
        }
    }
}

/// Write a saved model JSON file.
pub fn write_model_json(path: &Path, model: &FittedModel) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(4, format!("Failed to create model JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, &SavedModel::new(model.clone()))
        .map_err(|e| AppError::new(4, format!("Failed to write model JSON: {e}")))?;
    Ok(())
}

/// Read a saved model JSON file.
pub fn read_model_json(path: &Path) -> Result<FittedModel, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(4, format!("Failed to open model JSON '{}': {e}", path.display())))?;
    let saved: SavedModel =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid model JSON: {e}")))?;
    if saved.version != MODEL_FORMAT_VERSION {
        return Err(AppError::new(
            2,
            format!(
                "Unsupported model format version {} (expected {MODEL_FORMAT_VERSION}).",
                saved.version
            ),
        ));
    }
    Ok(saved.model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SimulationSpec, simulate_arima};
    use crate::domain::{FitOptions, ModelSpec, TimeSeries};
    use crate::forecast::fit_model;

    #[test]
    fn saved_model_round_trips_through_a_file() {
        let y = simulate_arima(&SimulationSpec::ar1(0.4, 60, 3)).unwrap();
        let fit = fit_model(
            &TimeSeries::from_values("y", &y),
            &[],
            &ModelSpec::arima(1, 0, 0),
            &FitOptions::default(),
            None,
        )
        .unwrap();

        let path = std::env::temp_dir().join(format!("tsa-model-{}.json", std::process::id()));
        write_model_json(&path, &fit.model).unwrap();
        let back = read_model_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(back.spec, fit.model.spec);
        assert_eq!(back.history, fit.model.history);
        assert!((back.coefficients.ar[0] - fit.model.coefficients.ar[0]).abs() < 1e-12);
    }
}
