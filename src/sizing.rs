//! Sizing Policy
//!
//! Output and working-buffer dimensions are derived from the camera's pixel
//! size: each dimension is divided by the desampling rate and snapped to the
//! closest power of two. Exact ties between the two bounding powers round
//! up, so `384` becomes `512`.

use crate::settings::DesamplingRate;

/// Largest power of two representable in a `u32`.
const MAX_POWER_OF_TWO: u32 = 1 << 31;

/// Returns the power of two numerically closest to `value`.
///
/// `0` maps to `0`; ties round up; values above `2^31` saturate.
#[must_use]
pub fn closest_power_of_two(value: u32) -> u32 {
    if value == 0 {
        return 0;
    }
    let Some(upper) = value.checked_next_power_of_two() else {
        return MAX_POWER_OF_TWO;
    };
    if upper == value {
        return value;
    }
    let lower = upper >> 1;
    if value - lower < upper - value {
        lower
    } else {
        upper
    }
}

/// Computes `(width, height)` for a camera of `pixel_size` at `rate`.
///
/// [`DesamplingRate::None`] passes the camera size through unchanged.
#[must_use]
pub fn compute_size(pixel_size: (u32, u32), rate: DesamplingRate) -> (u32, u32) {
    let (width, height) = pixel_size;
    match rate.divisor() {
        None => (width, height),
        Some(divisor) => (
            closest_power_of_two(width / divisor),
            closest_power_of_two(height / divisor),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_powers_are_kept() {
        for shift in 0..32 {
            let p = 1u32 << shift;
            assert_eq!(closest_power_of_two(p), p);
        }
    }

    #[test]
    fn nearest_bound_wins() {
        assert_eq!(closest_power_of_two(3), 4);
        assert_eq!(closest_power_of_two(5), 4);
        assert_eq!(closest_power_of_two(700), 512);
        assert_eq!(closest_power_of_two(800), 1024);
    }

    #[test]
    fn ties_round_up() {
        assert_eq!(closest_power_of_two(384), 512);
        assert_eq!(closest_power_of_two(6), 8);
        assert_eq!(closest_power_of_two(3 << 29), MAX_POWER_OF_TWO);
    }

    #[test]
    fn zero_and_overflow() {
        assert_eq!(closest_power_of_two(0), 0);
        assert_eq!(closest_power_of_two(u32::MAX), MAX_POWER_OF_TWO);
    }
}
