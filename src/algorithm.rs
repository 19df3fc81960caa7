//! The Barnes-Hut evaluator.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Error;
use crate::forces::Field;
use crate::geometry::{any_less_than, BoundingBox, Vector};
use crate::mass::MassCalculator;
use crate::particle::{Particle, ParticleRef};
use crate::threads::ThreadPool;
use crate::tree::{Node, Octree};

pub const DEFAULT_THRESHOLD: f64 = 1.0;

/// Approximate evaluator for the net force on one particle due to a
/// population of particles held in an [`Octree`].
///
/// The tree is walked from the root. A node whose every extent is small
/// compared to its distance from the subject (the s/d criterion) is treated
/// as a single point mass, aggregated by a [`MassCalculator`]; otherwise the
/// walk descends, eventually summing direct pairwise interactions through
/// the force [`Field`]. The approximation threshold trades accuracy for
/// speed: `0.0` degenerates to an exact direct summation, values between
/// `1.0` and `2.0` are a reasonable trade-off.
///
/// The evaluator is thread-safe. Reads ([`BarnesHut::acceleration`],
/// [`BarnesHut::force`]) run concurrently under a shared lock; mutations
/// (the setters and [`BarnesHut::update`]) are exclusive.
pub struct BarnesHut {
    state: RwLock<State>,
    calculator: MassCalculator,
}

struct State {
    threshold: f64,
    tree: Option<Octree>,
    field: Option<Box<dyn Field>>,
}

impl BarnesHut {
    /// Evaluator owning `tree` and `field`, with the default threshold.
    pub fn new(tree: Octree, field: impl Field + 'static) -> Self {
        Self {
            state: RwLock::new(State {
                threshold: DEFAULT_THRESHOLD,
                tree: Some(tree),
                field: Some(Box::new(field)),
            }),
            calculator: MassCalculator::new(),
        }
    }

    /// The acceleration `particle` is subject to due to every particle in
    /// the tree. Zero when no tree or field is installed. The subject does
    /// not have to be stored in the tree.
    pub fn acceleration(&self, particle: &ParticleRef) -> Vector {
        let state = self.state.read();

        let (Some(tree), Some(field)) = (&state.tree, &state.field) else {
            return Vector::zeros();
        };

        let subject = particle.read().clone();
        let mut acceleration = Vector::zeros();

        self.add_acceleration(
            tree.root(),
            field.as_ref(),
            state.threshold,
            particle,
            &subject,
            &mut acceleration,
        );

        acceleration
    }

    /// The force `particle` is subject to due to every particle in the tree.
    pub fn force(&self, particle: &ParticleRef) -> Vector {
        let mass = particle.read().mass;

        mass * self.acceleration(particle)
    }

    pub fn threshold(&self) -> f64 {
        self.state.read().threshold
    }

    /// Set the approximation threshold. Must be at least zero; zero disables
    /// approximation entirely. Larger values collapse more of the tree into
    /// point masses, trading accuracy for speed.
    pub fn set_threshold(&self, threshold: f64) -> Result<(), Error> {
        if !(threshold >= 0.0) {
            return Err(Error::InvalidArgument(
                "approximation threshold must be >= 0.0".to_owned(),
            ));
        }

        self.state.write().threshold = threshold;

        Ok(())
    }

    /// Transfer the tree to the caller, who may mutate it freely. The mass
    /// cache is flushed; reads return zero until a tree is installed again.
    pub fn take_tree(&self) -> Option<Octree> {
        let mut state = self.state.write();

        self.calculator.clear();

        state.tree.take()
    }

    /// Install a tree, flushing the mass cache.
    pub fn set_tree(&self, tree: Octree) {
        let mut state = self.state.write();

        self.calculator.clear();

        state.tree = Some(tree);
    }

    /// Transfer the force field to the caller. Reads return zero until a
    /// field is installed again.
    pub fn take_field(&self) -> Option<Box<dyn Field>> {
        self.state.write().field.take()
    }

    pub fn set_field(&self, field: impl Field + 'static) {
        self.state.write().field = Some(Box::new(field));
    }

    /// Update the tree to the particles' current bounds, flushing the mass
    /// cache. Returns the particles that no longer fit the tree at its
    /// growth limit. With a pool, subtree updates run in parallel.
    pub fn update(&self, pool: Option<&ThreadPool>) -> Result<Vec<ParticleRef>, Error> {
        let mut state = self.state.write();

        self.calculator.clear();

        match state.tree.as_mut() {
            Some(tree) => tree.update(pool),
            None => Ok(Vec::new()),
        }
    }

    /// The s/d criterion: approximate when any extent of the node is small
    /// against the threshold-scaled distance, so the node's longest
    /// dimension decides.
    fn should_approximate(threshold: f64, point: &Vector, bounds: &BoundingBox) -> bool {
        let distance = (point - bounds.centre()).norm();

        any_less_than(bounds.extents(), threshold * distance)
    }

    fn add_acceleration(
        &self,
        node: &Node,
        field: &dyn Field,
        threshold: f64,
        particle: &ParticleRef,
        subject: &Particle,
        acceleration: &mut Vector,
    ) {
        if Self::should_approximate(threshold, &subject.displacement, node.bounds()) {
            let aggregate = self.calculator.calculate(node);
            let source = Particle::point_mass(aggregate.mass, aggregate.displacement);

            field.add_acceleration(&source, subject, acceleration);

            return;
        }

        for other in node.particles() {
            if Arc::ptr_eq(other, particle) {
                continue;
            }

            let source = other.read();

            field.add_acceleration(&source, subject, acceleration);
        }

        for child in node.children() {
            self.add_acceleration(child, field, threshold, particle, subject, acceleration);
        }
    }
}
