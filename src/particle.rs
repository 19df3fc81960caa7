use std::sync::Arc;

use parking_lot::RwLock;

use crate::geometry::{BoundingBox, Vector};

/// Shared handle to a particle.
///
/// The tree stores these handles and tracks particles by handle identity
/// (`Arc::ptr_eq`), so the same handle must be used for insertion, removal,
/// and evaluation. The tree only ever reads through the lock; callers mutate
/// particle state between update steps. Callers must not hold a particle's
/// lock across a call into the tree or the evaluator.
pub type ParticleRef = Arc<RwLock<Particle>>;

/// A massive body in the simulation.
///
/// The per-axis radii describe an ellipsoid around the displacement; the
/// particle's bounds are the axis-aligned box they span.
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub mass: f64,
    pub displacement: Vector,
    pub velocity: Vector,
    pub acceleration: Vector,
    pub radii: Vector,
}

impl Particle {
    pub const DEFAULT_RADIUS: f64 = 1.0;

    pub fn new(mass: f64, displacement: Vector, velocity: Vector) -> Self {
        Self {
            mass,
            displacement,
            velocity,
            acceleration: Vector::zeros(),
            radii: Vector::repeat(Self::DEFAULT_RADIUS),
        }
    }

    pub fn with_radii(mut self, radii: Vector) -> Self {
        self.radii = radii;
        self
    }

    /// An ephemeral, dimensionless source particle. Used to feed aggregated
    /// subtree masses through a force field; not insertable into a tree.
    pub fn point_mass(mass: f64, displacement: Vector) -> Self {
        Self {
            mass,
            displacement,
            velocity: Vector::zeros(),
            acceleration: Vector::zeros(),
            radii: Vector::zeros(),
        }
    }

    /// Axis-aligned bounds: centred on the displacement, radii as extents.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_extents(self.displacement, self.radii)
    }

    /// Wrap into the shared handle the tree works with.
    pub fn shared(self) -> ParticleRef {
        Arc::new(RwLock::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_centred_on_the_displacement() {
        let particle = Particle::new(1.0, Vector::new(1.0, 2.0, 3.0), Vector::zeros())
            .with_radii(Vector::new(0.5, 1.0, 1.5));

        let bounds = particle.bounds();
        assert_eq!(bounds.centre(), &Vector::new(1.0, 2.0, 3.0));
        assert_eq!(bounds.extents(), &Vector::new(0.5, 1.0, 1.5));
    }

    #[test]
    fn point_masses_have_no_extent() {
        let source = Particle::point_mass(4.0, Vector::new(3.0, 0.0, 0.0));

        assert_eq!(source.mass, 4.0);
        assert_eq!(source.radii, Vector::zeros());
        assert_eq!(source.velocity, Vector::zeros());
    }
}
