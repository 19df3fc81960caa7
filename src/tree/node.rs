use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Error;
use crate::geometry::{any_less_than_or_equal_to, BoundingBox, Orthant, Vector};
use crate::particle::ParticleRef;
use crate::threads::ThreadPool;

/// Stable surrogate identity for a node.
///
/// Nodes are stored by value and move when their owning vectors reallocate,
/// so anything that must refer to a node across calls (the mass cache) keys
/// on this id rather than an address. Ids are unique across every tree in
/// the process and are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Branch/merge tuning threaded through every structural operation.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TreeParams {
    pub looseness: f64,
    pub min_width: f64,
    pub capacity: usize,
}

/// A node of the loose octree.
///
/// A node is either a leaf (no children) or holds exactly
/// `Orthant::MAX` children indexed by orthant. Every particle in the
/// subtree is loosely contained by the node's bounds; particles that
/// straddle the loose boundary of every matching child are held directly by
/// the node itself.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    bounds: BoundingBox,
    particles: Vec<ParticleRef>,
    children: Vec<Node>,
}

impl Node {
    pub(crate) fn new(bounds: BoundingBox) -> Self {
        Self {
            id: NodeId::next(),
            bounds,
            particles: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Particles held directly by this node.
    pub fn particles(&self) -> &[ParticleRef] {
        &self.particles
    }

    /// Child nodes, either empty or one per orthant.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// True if no particle is stored anywhere in the subtree.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty() && self.children.iter().all(Node::is_empty)
    }

    /// Number of particles stored in the subtree.
    pub(crate) fn subtree_len(&self) -> usize {
        self.particles.len() + self.children.iter().map(Node::subtree_len).sum::<usize>()
    }

    /// Insert a particle into the subtree.
    ///
    /// Fails if the particle's bounds are not loosely contained by this
    /// node. A leaf below capacity, or at the minimum width, takes the
    /// particle directly; otherwise the node branches and the particle is
    /// pushed toward the nearest child, staying here if it straddles that
    /// child's loose boundary. Duplicate insertions of one handle are not
    /// checked.
    pub(crate) fn insert(&mut self, particle: &ParticleRef, params: TreeParams) -> bool {
        if !self.bounds.contains(&particle.read().bounds(), params.looseness) {
            return false;
        }

        if self.is_leaf() {
            if self.particles.len() < params.capacity || self.is_min_width(params.min_width) {
                self.particles.push(Arc::clone(particle));
                return true;
            }

            self.branch(params);
        }

        // Try inserting into a child node, else keep it in this node.
        if !self.nearest_child(particle).insert(particle, params) {
            self.particles.push(Arc::clone(particle));
        }

        true
    }

    /// Remove a particle, by handle identity, from the subtree. Nodes left
    /// holding few enough particles merge their children back in.
    pub(crate) fn remove(&mut self, particle: &ParticleRef, params: TreeParams) -> bool {
        if let Some(index) = self
            .particles
            .iter()
            .position(|other| Arc::ptr_eq(other, particle))
        {
            self.particles.remove(index);
            return true;
        }

        if self.is_leaf() || !self.nearest_child(particle).remove(particle, params) {
            return false;
        }

        if self.should_merge(params.capacity) {
            self.merge();
        }

        true
    }

    /// Re-home particles whose bounds moved since insertion.
    ///
    /// Runs post-order: children first, then this node evicts direct
    /// particles it no longer loosely contains, adopts whatever deeper nodes
    /// gave up, and pushes straddlers that now fit a child back down. The
    /// returned list holds the particles no node in the subtree could keep.
    ///
    /// With a pool, the top-level child updates run as parallel tasks and
    /// their eviction lists are merged in ascending orthant order before
    /// this node's own sweep. If a task fails, the affected children are
    /// lost and the aggregated error is returned.
    pub(crate) fn update(
        &mut self,
        params: TreeParams,
        pool: Option<&ThreadPool>,
    ) -> Result<Vec<ParticleRef>, Error> {
        let mut removed = Vec::new();

        match pool {
            Some(pool) if !self.is_leaf() => {
                let children = mem::take(&mut self.children);

                let results = pool.for_each(children, move |mut child| {
                    let mut local = Vec::new();
                    child.update_into(params, &mut local);
                    (child, local)
                })?;

                self.children.reserve(results.len());
                for (child, mut local) in results {
                    self.children.push(child);
                    removed.append(&mut local);
                }
            }
            _ => {
                for child in &mut self.children {
                    child.update_into(params, &mut removed);
                }
            }
        }

        self.update_own(params, &mut removed);

        Ok(removed)
    }

    fn update_into(&mut self, params: TreeParams, removed: &mut Vec<ParticleRef>) {
        for child in &mut self.children {
            child.update_into(params, removed);
        }

        self.update_own(params, removed);
    }

    fn update_own(&mut self, params: TreeParams, removed: &mut Vec<ParticleRef>) {
        // Evict direct particles this node no longer loosely contains.
        let bounds = self.bounds;
        let mut evicted = Vec::new();

        self.particles.retain(|particle| {
            if bounds.contains(&particle.read().bounds(), params.looseness) {
                true
            } else {
                evicted.push(Arc::clone(particle));
                false
            }
        });

        // Adopt particles evicted elsewhere that fit here now.
        removed.retain(|particle| !self.insert(particle, params));

        // Straddlers whose bounds moved inside a child sink back down.
        if !self.is_leaf() {
            let direct = mem::take(&mut self.particles);

            for particle in direct {
                if !self.nearest_child(&particle).insert(&particle, params) {
                    self.particles.push(particle);
                }
            }
        }

        // This node's own evictions go in front, where only ancestors will
        // attempt them.
        evicted.append(removed);
        *removed = evicted;

        if !self.is_leaf() && self.should_merge(params.capacity) {
            self.merge();
        }
    }

    /// Collapse this node onto its only occupied child. Fails on leaves, on
    /// nodes holding direct particles, and when zero or several children are
    /// occupied.
    pub(crate) fn shrink(&mut self) -> bool {
        if self.is_leaf() || !self.particles.is_empty() {
            return false;
        }

        let Some(index) = self.lone_occupied_child() else {
            return false;
        };

        let child = self.children.swap_remove(index);
        *self = child;

        true
    }

    /// Double the bounds away from `point`, so that a following insertion
    /// in that direction can succeed. A branch node becomes one orthant of
    /// the replacement root; a leaf just takes the expanded bounds.
    pub(crate) fn grow(&mut self, point: &Vector, params: TreeParams) {
        // The expansion must place this node in the orthant opposite the
        // point, so the new bounds reach toward it.
        let orthant = self.bounds.orthant_of(point).invert();

        if self.is_leaf() {
            self.bounds = self.bounds.expand_from(orthant);
            return;
        }

        let mut root = Node::new(self.bounds.expand_from(orthant));
        root.branch(params);

        mem::swap(&mut root.children[orthant.index()], self);
        *self = root;
    }

    pub(crate) fn contains(&self, bounds: &BoundingBox, looseness: f64) -> bool {
        self.bounds.contains(bounds, looseness)
    }

    /// True if any particle in the subtree has tight bounds intersecting
    /// `bounds`.
    pub(crate) fn is_colliding(&self, bounds: &BoundingBox, looseness: f64) -> bool {
        if !self.bounds.intersects(bounds, looseness) {
            return false;
        }

        if self
            .particles
            .iter()
            .any(|particle| particle.read().bounds().intersects(bounds, 1.0))
        {
            return true;
        }

        self.children
            .iter()
            .any(|child| child.is_colliding(bounds, looseness))
    }

    /// Collect every particle in the subtree whose tight bounds intersect
    /// `bounds`.
    pub(crate) fn colliding(
        &self,
        bounds: &BoundingBox,
        looseness: f64,
        colliding: &mut Vec<ParticleRef>,
    ) {
        if !self.bounds.intersects(bounds, looseness) {
            return;
        }

        for particle in &self.particles {
            if particle.read().bounds().intersects(bounds, 1.0) {
                colliding.push(Arc::clone(particle));
            }
        }

        for child in &self.children {
            child.colliding(bounds, looseness, colliding);
        }
    }

    pub(crate) fn collect_particles(&self, particles: &mut Vec<ParticleRef>) {
        particles.extend(self.particles.iter().cloned());

        for child in &self.children {
            child.collect_particles(particles);
        }
    }

    fn is_min_width(&self, min_width: f64) -> bool {
        any_less_than_or_equal_to(self.bounds.extents(), min_width / 2.0)
    }

    /// True when the whole subtree fits within one node's capacity.
    fn should_merge(&self, capacity: usize) -> bool {
        let mut count = self.particles.len();

        for child in &self.children {
            count += child.subtree_len();

            if count > capacity {
                return false;
            }
        }

        count <= capacity
    }

    /// The child whose orthant matches the particle's displacement. The
    /// child's bounds do not necessarily contain the particle, only its
    /// axes do, hence nearest.
    fn nearest_child(&mut self, particle: &ParticleRef) -> &mut Node {
        debug_assert!(!self.is_leaf());

        let orthant = self.bounds.orthant_of(&particle.read().displacement);
        &mut self.children[orthant.index()]
    }

    /// Split a leaf into one child per orthant and push the direct particles
    /// down where possible.
    fn branch(&mut self, params: TreeParams) {
        debug_assert!(self.is_leaf());

        self.children = Orthant::all()
            .map(|orthant| Node::new(self.bounds.shrink_to(orthant)))
            .collect();

        let particles = mem::take(&mut self.particles);

        for particle in particles {
            if !self.nearest_child(&particle).insert(&particle, params) {
                self.particles.push(particle);
            }
        }
    }

    /// Pull every particle of the subtree into this node and drop the
    /// children. Children are drained in ascending orthant order; within a
    /// child, particle order is preserved.
    fn merge(&mut self) {
        let children = mem::take(&mut self.children);

        for mut child in children {
            child.drain_into(&mut self.particles);
        }
    }

    fn drain_into(&mut self, particles: &mut Vec<ParticleRef>) {
        particles.append(&mut self.particles);

        for child in &mut self.children {
            child.drain_into(particles);
        }
    }

    fn lone_occupied_child(&self) -> Option<usize> {
        let mut occupied = None;

        for (index, child) in self.children.iter().enumerate() {
            if child.is_empty() {
                continue;
            }

            if occupied.is_some() {
                return None;
            }

            occupied = Some(index);
        }

        occupied
    }
}
