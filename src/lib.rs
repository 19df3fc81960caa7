//! Concurrent, approximate N-body force evaluation on a loose dynamic
//! octree.
//!
//! Particles live in an [`Octree`] that reshapes itself cheaply as they
//! move: nodes branch and merge around a capacity, and the root grows and
//! shrinks within configured limits. A [`BarnesHut`] evaluator walks the
//! tree under the s/d criterion, approximating distant subtrees as point
//! masses aggregated by a memoised, thread-safe [`MassCalculator`], and
//! delegating close-range interactions to a caller-supplied force
//! [`Field`]. Tree updates can be spread over a [`ThreadPool`].
//!
//! # Example
//! ```
//! # fn main() -> Result<(), gravitree::Error> {
//! use gravitree::{BarnesHut, BoundingBox, NewtonianField, Octree, Particle, Vector};
//!
//! let bounds = BoundingBox::new(Vector::zeros(), Vector::repeat(10.0))?;
//! let mut tree = Octree::new(bounds);
//!
//! let a = Particle::new(1.0e9, Vector::new(-2.0, 0.0, 0.0), Vector::zeros()).shared();
//! let b = Particle::new(1.0e9, Vector::new(2.0, 0.0, 0.0), Vector::zeros()).shared();
//! assert!(tree.insert(&a));
//! assert!(tree.insert(&b));
//!
//! let algorithm = BarnesHut::new(tree, NewtonianField::default());
//!
//! // Gravity pulls `a` toward `b`.
//! let acceleration = algorithm.acceleration(&a);
//! assert!(acceleration[0] > 0.0);
//! # Ok(())
//! # }
//! ```

pub mod algorithm;
pub mod error;
pub mod forces;
pub mod geometry;
pub mod mass;
pub mod particle;
pub mod threads;
pub mod tree;

pub use algorithm::{BarnesHut, DEFAULT_THRESHOLD};
pub use error::{Error, ErrorList};
pub use forces::{Field, NewtonianField, PlummerField, G};
pub use geometry::{BoundingBox, Orthant, Vector, DIMENSIONS};
pub use mass::{MassCalculator, PointMass};
pub use particle::{Particle, ParticleRef};
pub use threads::{TaskHandle, TaskQueue, ThreadPool};
pub use tree::{
    Node, NodeId, Octree, OctreeConfig, DEFAULT_CAPACITY, DEFAULT_GROWTH_LIMIT, DEFAULT_LOOSENESS,
    DEFAULT_MIN_WIDTH, DEFAULT_SHRINK_LIMIT,
};
