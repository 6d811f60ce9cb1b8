use tracing::debug;

use crate::engine::{ImageEngine, StatField};
use crate::error::{ReductionError, Result};
use crate::frame::FrameFile;

use super::CalibrationStage;

/// One statistic per frame, in input order.
///
/// The values are used as divisors, so a zero or non-finite result is a
/// calibration failure rather than a silently broken flat.
pub fn frame_statistics(
    engine: &dyn ImageEngine,
    frames: &[FrameFile],
    field: StatField,
) -> Result<Vec<f64>> {
    let stage = CalibrationStage::Statistics;
    frames
        .iter()
        .map(|frame| {
            if !frame.exists() {
                return Err(ReductionError::calibration(
                    stage,
                    frame.stem(),
                    format!("missing input {}", frame.path().display()),
                ));
            }
            let value = engine
                .statistic(&frame.path(), field)
                .map_err(|e| ReductionError::calibration(stage, frame.stem(), e))?;
            if !value.is_finite() || value == 0.0 {
                return Err(ReductionError::calibration(
                    stage,
                    frame.stem(),
                    format!("degenerate {field} value {value}"),
                ));
            }
            debug!(frame = %frame.stem(), %field, value, "Statistic");
            Ok(value)
        })
        .collect()
}
