//! Math kernel: quadratic solving, real-number comparison, direction
//! rotation and the seeded PRNG.

mod quadratic;
mod rng;
mod rotation;

pub use quadratic::{reals_equal, solve_quadratic};
pub use rng::{PcgRng, Rng, RngState, StreamKind, ONE_MINUS_EPSILON};
pub use rotation::rotate_about_direction;
