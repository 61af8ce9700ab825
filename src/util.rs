const FLOAT_TO_INT_MAX: f64 = 9007199254740991_f64;

/// Flag sources written in languages without a distinct integer type will happily emit `10.0`
/// where `10` was meant. Accept those, but only when the float has no fractional part and lies
/// within 2**53 - 1, after which 64-bit floats no longer retain integer precision.
pub(crate) fn integral_f64_to_i64(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() <= FLOAT_TO_INT_MAX {
        Some(f as i64)
    } else {
        None
    }
}
