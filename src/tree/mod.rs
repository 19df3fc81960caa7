//! The loose dynamic octree.

mod node;

pub use node::{Node, NodeId};

pub(crate) use node::TreeParams;

use crate::error::Error;
use crate::geometry::BoundingBox;
use crate::particle::ParticleRef;
use crate::threads::ThreadPool;

pub const DEFAULT_LOOSENESS: f64 = 1.25;
pub const DEFAULT_MIN_WIDTH: f64 = 1.0;
pub const DEFAULT_CAPACITY: usize = 8;
pub const DEFAULT_GROWTH_LIMIT: u32 = 10;
pub const DEFAULT_SHRINK_LIMIT: u32 = 10;

/// Tuning for an [`Octree`].
///
/// * `looseness` scales node bounds during containment tests, so particles
///   straddling an orthant boundary can stay put; must be at least `1.0`.
/// * `min_width` bounds the half-extent of the smallest node, limiting tree
///   depth; must be positive.
/// * `capacity` is the particle count a leaf holds before branching; at
///   least one.
/// * `growth_limit` and `shrink_limit` bound how many times the root may
///   double or halve its bounds relative to its original size.
#[derive(Clone, Copy, Debug)]
pub struct OctreeConfig {
    pub looseness: f64,
    pub min_width: f64,
    pub capacity: usize,
    pub growth_limit: u32,
    pub shrink_limit: u32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            looseness: DEFAULT_LOOSENESS,
            min_width: DEFAULT_MIN_WIDTH,
            capacity: DEFAULT_CAPACITY,
            growth_limit: DEFAULT_GROWTH_LIMIT,
            shrink_limit: DEFAULT_SHRINK_LIMIT,
        }
    }
}

/// A dynamic octree that automatically branches and merges its nodes as
/// particles are inserted, removed, and moved, and that grows and shrinks
/// its root bounds within configured limits.
#[derive(Debug)]
pub struct Octree {
    root: Node,
    params: TreeParams,
    growth_limit: u32,
    shrink_limit: u32,
    resized: i32,
}

impl Octree {
    /// Tree over `bounds` with the default configuration.
    pub fn new(bounds: BoundingBox) -> Self {
        Self {
            root: Node::new(bounds),
            params: TreeParams {
                looseness: DEFAULT_LOOSENESS,
                min_width: DEFAULT_MIN_WIDTH,
                capacity: DEFAULT_CAPACITY,
            },
            growth_limit: DEFAULT_GROWTH_LIMIT,
            shrink_limit: DEFAULT_SHRINK_LIMIT,
            resized: 0,
        }
    }

    /// Tree over `bounds` with an explicit configuration.
    pub fn with_config(bounds: BoundingBox, config: OctreeConfig) -> Result<Self, Error> {
        if config.looseness < 1.0 {
            return Err(Error::InvalidArgument(
                "looseness cannot be less than 1.0".to_owned(),
            ));
        }

        if !(config.min_width > 0.0) {
            return Err(Error::InvalidArgument(
                "minimum width must be greater than 0.0".to_owned(),
            ));
        }

        if config.capacity == 0 {
            return Err(Error::InvalidArgument(
                "node capacity must be at least 1".to_owned(),
            ));
        }

        Ok(Self {
            root: Node::new(bounds),
            params: TreeParams {
                looseness: config.looseness,
                min_width: config.min_width,
                capacity: config.capacity,
            },
            growth_limit: config.growth_limit,
            shrink_limit: config.shrink_limit,
            resized: 0,
        })
    }

    /// Insert a particle, growing the root toward it if necessary.
    ///
    /// Returns `false` when the particle does not fit even after growing to
    /// the limit; the root is then shrunk back toward its original size.
    pub fn insert(&mut self, particle: &ParticleRef) -> bool {
        if self.root.insert(particle, self.params) {
            return true;
        }

        while self.resized < self.growth_limit as i32 {
            let point = particle.read().displacement;

            self.root.grow(&point, self.params);
            self.resized += 1;

            if self.root.insert(particle, self.params) {
                return true;
            }
        }

        self.shrink_to_fit();

        false
    }

    /// Remove a particle by handle identity. On success the root shrinks
    /// opportunistically.
    pub fn remove(&mut self, particle: &ParticleRef) -> bool {
        if !self.root.remove(particle, self.params) {
            return false;
        }

        self.shrink_to_fit();

        true
    }

    /// Re-home every particle whose bounds moved since the last call.
    ///
    /// Particles evicted from the whole subtree are re-inserted at the root,
    /// growing it if needed. The returned particles are those left outside
    /// the largest region the tree may cover. With a pool, the root's child
    /// subtrees update in parallel.
    pub fn update(&mut self, pool: Option<&ThreadPool>) -> Result<Vec<ParticleRef>, Error> {
        let mut removed = self.root.update(self.params, pool)?;

        removed.retain(|particle| !self.insert(particle));

        Ok(removed)
    }

    /// True if `bounds` is loosely contained by the root.
    pub fn contains(&self, bounds: &BoundingBox) -> bool {
        self.root.contains(bounds, self.params.looseness)
    }

    /// True if any stored particle's tight bounds intersect `bounds`.
    pub fn is_colliding(&self, bounds: &BoundingBox) -> bool {
        self.root.is_colliding(bounds, self.params.looseness)
    }

    /// Every stored particle whose tight bounds intersect `bounds`.
    pub fn colliding(&self, bounds: &BoundingBox) -> Vec<ParticleRef> {
        let mut colliding = Vec::new();
        self.root.colliding(bounds, self.params.looseness, &mut colliding);
        colliding
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Every particle in the tree, in traversal order.
    pub fn particles(&self) -> Vec<ParticleRef> {
        let mut particles = Vec::new();
        self.root.collect_particles(&mut particles);
        particles
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn bounds(&self) -> &BoundingBox {
        self.root.bounds()
    }

    pub fn looseness(&self) -> f64 {
        self.params.looseness
    }

    pub fn min_width(&self) -> f64 {
        self.params.min_width
    }

    pub fn capacity(&self) -> usize {
        self.params.capacity
    }

    pub fn growth_limit(&self) -> u32 {
        self.growth_limit
    }

    pub fn shrink_limit(&self) -> u32 {
        self.shrink_limit
    }

    /// How many times the root has grown (positive) or shrunk (negative)
    /// from its original bounds.
    pub fn resized(&self) -> i32 {
        self.resized
    }

    fn shrink_to_fit(&mut self) {
        while self.resized > -(self.shrink_limit as i32) && self.root.shrink() {
            self.resized -= 1;
        }
    }
}
