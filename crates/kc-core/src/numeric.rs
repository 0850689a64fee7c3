use crate::{KcError, KcResult};

/// Floating point type used for every measurement, gain and time.
pub type Real = f64;

/// Reject NaN and infinities.
pub fn ensure_finite(v: Real, what: &'static str) -> KcResult<Real> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(KcError::NonFinite { what, value: v })
    }
}

/// Clamp `v` into `[-limit, +limit]`. `limit` is taken by magnitude.
pub fn clamp_symmetric(v: Real, limit: Real) -> Real {
    let limit = limit.abs();
    v.clamp(-limit, limit)
}

/// Round to a fixed number of decimal places (half away from zero).
///
/// Returns `v` unchanged when scaling it would leave the finite range.
pub fn round_to(v: Real, places: u32) -> Real {
    let scale = 10_f64.powi(places.min(i32::MAX as u32) as i32);
    let scaled = v * scale;
    if scaled.is_finite() {
        scaled.round() / scale
    } else {
        v
    }
}
