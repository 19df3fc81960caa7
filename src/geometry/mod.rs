//! Spatial primitives: vectors, orthant indices, and axis-aligned boxes.

pub mod bounds;
pub mod orthant;

pub use bounds::BoundingBox;
pub use orthant::Orthant;

use nalgebra::Vector3;

/// Spatial dimension count.
pub const DIMENSIONS: usize = 3;

/// Spatial vector of one double per dimension.
pub type Vector = Vector3<f64>;

/// True if any element of `vector` is strictly less than `scalar`.
pub fn any_less_than(vector: &Vector, scalar: f64) -> bool {
    vector.iter().any(|&element| element < scalar)
}

/// True if any element of `vector` is less than or equal to `scalar`.
pub fn any_less_than_or_equal_to(vector: &Vector, scalar: f64) -> bool {
    vector.iter().any(|&element| element <= scalar)
}
