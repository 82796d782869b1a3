//! Marker trait for image element storage, letting a [`crate::image::Image`]
//! be instantiated over `u8`/`u16`/`u32`/`f32`/`f64` without duplicating
//! the accumulation logic.

use num_traits::{NumCast, Zero};

/// Anything an image can store: the accumulation arithmetic needs only
/// `Zero` (for a fresh bin) and `NumCast` (to convert a sampled `f64`
/// weight into the configured storage type).
pub trait BinElement: NumCast + Zero + Copy + Send + Sync + 'static {}

impl<T> BinElement for T where T: NumCast + Zero + Copy + Send + Sync + 'static {}

/// Converts an `f64` contribution into `T`, saturating rather than
/// panicking if `T` is a narrow integer type and the value overflows.
pub fn cast_contribution<T: BinElement>(value: f64) -> T {
    T::from(value).unwrap_or_else(T::zero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casts_into_float_and_integer_storage() {
        assert_eq!(cast_contribution::<f64>(2.5), 2.5);
        assert_eq!(cast_contribution::<u32>(2.5), 2u32);
    }
}
