/*
 *   Copyright (c) 2025 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Math helpers for counters that wrap and statistics that stream.

use crate::Count;

/// Implemented for the unsigned counter widths used in this crate so the
/// helpers below stay generic without pulling in a numerics crate.
pub trait WrappingCounter: Copy + PartialOrd {
    #[must_use]
    fn wrapping_difference(self, other: Self) -> Self;
    #[must_use]
    fn absolute_difference(self, other: Self) -> Self;
}

macro_rules! impl_wrapping_counter {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl WrappingCounter for $ty {
                fn wrapping_difference(self, other: Self) -> Self {
                    self.wrapping_sub(other)
                }

                fn absolute_difference(self, other: Self) -> Self {
                    if self >= other { self - other } else { other - self }
                }
            }
        )+
    };
}

impl_wrapping_counter!(u8, u16, u32, u64, usize);

/// The difference `expected_larger - expected_smaller`, modulo the width of
/// the type. When the expected-larger value has wrapped past zero (so it now
/// reads smaller), the wrapped distance is returned, which is what callers
/// tracking tick counters want.
#[must_use]
pub fn difference_between<T: WrappingCounter>(
    expected_larger: T,
    expected_smaller: T,
) -> T {
    expected_larger.wrapping_difference(expected_smaller)
}

/// Implemented for the value types that stream through [`running_average`].
pub trait Averageable: Copy {
    #[must_use]
    fn fold_average(self, new_value: Self, num_values: Count) -> Self;
}

macro_rules! impl_averageable_int {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Averageable for $ty {
                fn fold_average(self, new_value: Self, num_values: Count) -> Self {
                    // Widen so the scaled current average can not overflow.
                    let scaled = u128::from(self) * u128::from(num_values - 1)
                        + u128::from(new_value);
                    (scaled / u128::from(num_values)) as $ty
                }
            }
        )+
    };
}

impl_averageable_int!(u16, u32, u64);

macro_rules! impl_averageable_float {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Averageable for $ty {
                fn fold_average(self, new_value: Self, num_values: Count) -> Self {
                    (self * (num_values - 1) as $ty + new_value)
                        / num_values as $ty
                }
            }
        )+
    };
}

impl_averageable_float!(f32, f64);

/// Calculate a running average over `num_values` samples, where `new_value`
/// is the latest sample and `current_average` covers the previous
/// `num_values - 1`. An average of k identical samples is that sample.
#[must_use]
pub fn running_average<T: Averageable>(
    current_average: T,
    new_value: T,
    num_values: Count,
) -> T {
    match num_values {
        0 => current_average,
        1 => new_value,
        _ => current_average.fold_average(new_value, num_values),
    }
}

/// Test whether two values agree within the given error.
#[must_use]
pub fn within_error<T: WrappingCounter>(value_1: T, value_2: T, error: T) -> bool {
    value_1.absolute_difference(value_2) <= error
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(10u32, 4u32, 6u32; "no wrap")]
    #[test_case(4u32, 10u32, u32::MAX - 5; "wrapped counter")]
    #[test_case(0u32, u32::MAX, 1u32; "wrap to zero counts as an increment")]
    fn test_difference_between(larger: u32, smaller: u32, expected: u32) {
        assert_eq!(difference_between(larger, smaller), expected);
    }

    #[test]
    fn test_difference_between_matches_wrapping_sub() {
        for (a, b) in [(0u16, 1u16), (u16::MAX, 0), (700, 900)] {
            assert_eq!(difference_between(a, b), a.wrapping_sub(b));
        }
    }

    #[test]
    fn test_running_average_of_identical_values_is_that_value() {
        let mut average = 0u32;
        for count in 1..=50 {
            average = running_average(average, 42, count);
            assert_eq!(average, 42);
        }

        let mut float_average = 0.0f32;
        for count in 1..=50 {
            float_average = running_average(float_average, 2.5, count);
            assert!((float_average - 2.5).abs() < f32::EPSILON * 8.0);
        }
    }

    #[test]
    fn test_running_average_converges() {
        // 10, 20 -> 15; 10, 20, 30 -> 20.
        let average = running_average(10u32, 20, 2);
        assert_eq!(average, 15);
        assert_eq!(running_average(average, 30, 3), 20);
    }

    #[test]
    fn test_within_error() {
        assert!(within_error(100u32, 98, 2));
        assert!(!within_error(100u32, 97, 2));
        assert!(within_error(5u32, 9, 4));
    }
}
