use crate::pipeline::{Envelope, PipelineError, Transform};
use energycsv_client::MeterReading;
use time::macros::datetime;

/// Pure validation of a `MeterReading`.
///
/// Rules:
/// - value must be finite and non-negative.
/// - timestamp must be within a broad sanity window [2000-01-01, 2100-01-01].
pub fn validate_reading(env: Envelope<MeterReading>) -> Result<Envelope<MeterReading>, PipelineError> {
    let r = &env.payload;

    if !r.value.is_finite() || r.value < 0.0 {
        return Err(PipelineError::Rejected {
            row: env.row,
            reason: format!("value must be a non-negative number, got {}", r.value),
        });
    }

    let min_ts = datetime!(2000-01-01 00:00:00 UTC);
    let max_ts = datetime!(2100-01-01 00:00:00 UTC);

    if r.timestamp < min_ts || r.timestamp > max_ts {
        return Err(PipelineError::Rejected {
            row: env.row,
            reason: "timestamp out of allowed range".to_string(),
        });
    }

    Ok(env)
}

#[derive(Clone, Default)]
pub struct ReadingValidation;

#[async_trait::async_trait]
impl Transform<MeterReading, MeterReading> for ReadingValidation {
    async fn apply(
        &self,
        input: Envelope<MeterReading>,
    ) -> Result<Envelope<MeterReading>, PipelineError> {
        match validate_reading(input) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("energycsv_validation_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}
