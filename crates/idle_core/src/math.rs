//! Decimal precision helpers for currency arithmetic.
//!
//! Currency and rates are `f64`. To keep long sessions from drifting into
//! visibly inconsistent values, every additive or multiplicative update is
//! rounded to [`PRECISION_DECIMALS`] places, and affordability compares
//! against the floored balance so fractional residue never decides a
//! purchase.

/// Decimal places kept after every currency update.
pub const PRECISION_DECIMALS: i32 = 10;

const PRECISION_SCALE: f64 = 1e10;

/// Round `value` to [`PRECISION_DECIMALS`] decimal places.
///
/// Values too large to carry ten fractional digits in an `f64` come back
/// unchanged, as do non-finite values.
#[must_use]
pub fn round_to_precision(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scaled = value * PRECISION_SCALE;
    if !scaled.is_finite() || scaled.abs() >= 2f64.powi(f64::MANTISSA_DIGITS as i32) {
        return value;
    }
    scaled.round() / PRECISION_SCALE
}

/// Round `value` to an arbitrary number of decimal places.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(decimals);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / scale
}

/// Spendable part of a balance: the integer floor, never negative.
#[must_use]
pub fn spendable(currency: f64) -> f64 {
    if currency.is_finite() {
        currency.floor().max(0.0)
    } else {
        0.0
    }
}

/// Replace a NaN or infinite intermediate with zero.
///
/// `what` names the quantity in the warning so a recovered anomaly can be
/// traced back to the computation that produced it.
#[must_use]
pub fn finite_or_zero(value: f64, what: &'static str) -> f64 {
    if value.is_finite() {
        value
    } else {
        tracing::warn!(quantity = what, value = %value, "Non-finite computation treated as zero");
        0.0
    }
}

/// Clamp an elapsed duration to a finite, non-negative number of seconds.
#[must_use]
pub fn sanitize_elapsed(seconds: f64) -> f64 {
    let seconds = finite_or_zero(seconds, "elapsed_seconds");
    if seconds < 0.0 {
        tracing::warn!(elapsed = seconds, "Negative elapsed time clamped to zero");
        0.0
    } else {
        seconds
    }
}
