//! Numerical hygiene helpers
//!
//! Denormals are flushed on a cadence (see `DENORMAL_FLUSH_INTERVAL`), not per
//! operation. Non-finite values are scrubbed at the edges of the pipeline.

/// Values below this magnitude are treated as denormal and flushed to zero
pub const DENORMAL_THRESHOLD: f64 = 1e-30;

/// Flush denormal-range values in place (single precision)
#[inline]
pub fn flush_denormals_f32(values: &mut [f32]) {
    let threshold = DENORMAL_THRESHOLD as f32;
    for v in values.iter_mut() {
        if v.abs() < threshold {
            *v = 0.0;
        }
    }
}

/// Replace NaN/Inf with zero
#[inline(always)]
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
