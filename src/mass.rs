//! Concurrent, memoised centre-of-mass aggregation over tree nodes.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::geometry::Vector;
use crate::tree::{Node, NodeId};

/// Total mass and centre of mass of all particles within a subtree.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointMass {
    pub mass: f64,
    /// Centre of mass. Zero when the subtree is massless.
    pub displacement: Vector,
}

/// One-shot result slot. The first thread to claim the entry computes,
/// everyone else blocks on the condition variable until the result lands.
#[derive(Default)]
struct CacheEntry {
    result: Mutex<Option<PointMass>>,
    ready: Condvar,
}

impl CacheEntry {
    fn wait(&self) -> PointMass {
        let mut result = self.result.lock();

        loop {
            if let Some(point_mass) = *result {
                return point_mass;
            }

            self.ready.wait(&mut result);
        }
    }

    fn fulfil(&self, point_mass: PointMass) {
        *self.result.lock() = Some(point_mass);
        self.ready.notify_all();
    }
}

/// Computes and caches the total mass and centre of mass of tree nodes.
///
/// The calculator is thread-safe: for a given node and cache lifetime the
/// aggregation body runs exactly once, no matter how many threads ask
/// concurrently. Losing threads block on the winner's result. Entries are
/// keyed by [`NodeId`], so they must be dropped, via [`MassCalculator::clear`],
/// whenever the tree is structurally mutated or replaced; results are only
/// deterministic between mutations.
#[derive(Default)]
pub struct MassCalculator {
    cache: Mutex<HashMap<NodeId, Arc<CacheEntry>>>,
}

impl MassCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total mass and centre of mass of `node`'s subtree, computed on demand
    /// and cached per node. Child aggregates are cached recursively.
    pub fn calculate(&self, node: &Node) -> PointMass {
        self.find_or_calculate(node)
    }

    /// Drop every cached result.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    /// Drop the cached result for `node` only. Cached results for its
    /// ancestors are retained and become stale, so this is a tool for
    /// callers that track consistency themselves.
    pub fn clear_node(&self, node: &Node) {
        self.cache.lock().remove(&node.id());
    }

    /// Number of nodes with a cache entry.
    pub(crate) fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    fn find_or_calculate(&self, node: &Node) -> PointMass {
        // Claim or find the entry under the cache lock, but never compute
        // while holding it.
        let (entry, winner) = {
            let mut cache = self.cache.lock();

            match cache.entry(node.id()) {
                Entry::Occupied(occupied) => (Arc::clone(occupied.get()), false),
                Entry::Vacant(vacant) => {
                    (Arc::clone(vacant.insert(Arc::new(CacheEntry::default()))), true)
                }
            }
        };

        if !winner {
            return entry.wait();
        }

        let point_mass = self.sum(node);
        entry.fulfil(point_mass);

        point_mass
    }

    /// Mass-weighted sum over child aggregates and direct particles. The
    /// recursion only ever waits on descendants, so the dependency graph is
    /// the tree itself and cannot cycle.
    fn sum(&self, node: &Node) -> PointMass {
        let mut total = PointMass::default();

        for child in node.children() {
            let aggregate = self.find_or_calculate(child);

            total.mass += aggregate.mass;
            total.displacement += aggregate.mass * aggregate.displacement;
        }

        for particle in node.particles() {
            let particle = particle.read();

            total.mass += particle.mass;
            total.displacement += particle.mass * particle.displacement;
        }

        if total.mass != 0.0 {
            total.displacement /= total.mass;
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::geometry::BoundingBox;
    use crate::particle::Particle;
    use crate::tree::{Octree, OctreeConfig};

    fn tree_with(particles: &[(f64, [f64; 3])]) -> Octree {
        let bounds = BoundingBox::new(Vector::zeros(), Vector::repeat(16.0)).unwrap();
        let config = OctreeConfig {
            capacity: 2,
            min_width: 0.01,
            ..OctreeConfig::default()
        };
        let mut tree = Octree::with_config(bounds, config).unwrap();

        for &(mass, displacement) in particles {
            let particle = Particle::new(mass, Vector::from(displacement), Vector::zeros())
                .with_radii(Vector::repeat(1e-3))
                .shared();
            assert!(tree.insert(&particle));
        }

        tree
    }

    #[test]
    fn aggregates_mass_and_centre_of_mass() {
        let tree = tree_with(&[(1.0, [0.0, 0.0, 0.0]), (3.0, [4.0, 0.0, 0.0])]);
        let calculator = MassCalculator::new();

        let aggregate = calculator.calculate(tree.root());

        assert_abs_diff_eq!(aggregate.mass, 4.0);
        assert_abs_diff_eq!(
            aggregate.displacement,
            Vector::new(3.0, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn empty_subtrees_have_zero_mass_and_centre() {
        let tree = tree_with(&[]);
        let calculator = MassCalculator::new();

        let aggregate = calculator.calculate(tree.root());

        assert_eq!(aggregate.mass, 0.0);
        assert_eq!(aggregate.displacement, Vector::zeros());
    }

    #[test]
    fn branched_trees_sum_their_subtrees() {
        let particles: Vec<_> = (0..4)
            .flat_map(|x| (0..4).map(move |y| (1.0, [f64::from(x), f64::from(y), 0.0])))
            .collect();
        let tree = tree_with(&particles);
        let calculator = MassCalculator::new();

        let aggregate = calculator.calculate(tree.root());

        assert_abs_diff_eq!(aggregate.mass, 16.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            aggregate.displacement,
            Vector::new(1.5, 1.5, 0.0),
            epsilon = 1e-12
        );

        // Every node of the walk is now cached.
        fn count_nodes(node: &Node) -> usize {
            1 + node.children().iter().map(count_nodes).sum::<usize>()
        }
        assert_eq!(calculator.cached_len(), count_nodes(tree.root()));
    }

    #[test]
    fn results_are_stable_until_cleared() {
        let tree = tree_with(&[(1.0, [1.0, 1.0, 1.0]), (2.0, [-1.0, -1.0, -1.0])]);
        let calculator = MassCalculator::new();

        let first = calculator.calculate(tree.root());
        let second = calculator.calculate(tree.root());
        assert_eq!(first, second);

        calculator.clear();
        assert_eq!(calculator.cached_len(), 0);

        let third = calculator.calculate(tree.root());
        assert_eq!(first, third);
    }

    #[test]
    fn clearing_one_node_keeps_ancestor_entries() {
        let tree = tree_with(&[
            (1.0, [1.0, 1.0, 1.0]),
            (1.0, [-1.0, 1.0, 1.0]),
            (1.0, [1.0, -1.0, 1.0]),
        ]);
        let calculator = MassCalculator::new();

        calculator.calculate(tree.root());
        let cached = calculator.cached_len();

        calculator.clear_node(&tree.root().children()[0]);
        assert_eq!(calculator.cached_len(), cached - 1);
    }

    #[test]
    fn child_aggregates_are_cached_by_the_parent_walk() {
        let tree = tree_with(&[
            (2.0, [1.0, 1.0, 1.0]),
            (2.0, [-1.0, 1.0, 1.0]),
            (4.0, [1.0, -1.0, 1.0]),
        ]);
        let calculator = MassCalculator::new();

        let total = calculator.calculate(tree.root());
        assert_abs_diff_eq!(total.mass, 8.0);

        // A later query against a child hits the entry the root walk left.
        let child = &tree.root().children()[0];
        let aggregate = calculator.calculate(child);
        assert_abs_diff_eq!(aggregate.mass, 2.0);
        assert_abs_diff_eq!(
            aggregate.displacement,
            Vector::new(1.0, 1.0, 1.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn interleaved_clears_still_produce_correct_results() {
        let particles: Vec<_> = (0..5)
            .flat_map(|x| (0..5).map(move |y| (2.0, [f64::from(x) - 2.0, f64::from(y) - 2.0, 0.5])))
            .collect();
        let tree = tree_with(&particles);
        let calculator = MassCalculator::new();

        let expected = calculator.calculate(tree.root());

        thread::scope(|scope| {
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        let mut last = PointMass::default();
                        for _ in 0..50 {
                            last = calculator.calculate(tree.root());
                        }
                        last
                    })
                })
                .collect();

            // Concurrent flushes force repeated recomputation; the tree is
            // unchanged, so every answer stays the same.
            for _ in 0..20 {
                calculator.clear();
                std::thread::yield_now();
            }

            for reader in readers {
                let aggregate = reader.join().unwrap();
                assert_abs_diff_eq!(aggregate.mass, expected.mass, epsilon = 1e-9);
                assert_abs_diff_eq!(
                    aggregate.displacement,
                    expected.displacement,
                    epsilon = 1e-9
                );
            }
        });
    }

    #[test]
    fn concurrent_calls_agree() {
        let particles: Vec<_> = (0..6)
            .flat_map(|x| {
                (0..6).map(move |y| (1.0 + f64::from(x), [f64::from(x), f64::from(y), 1.0]))
            })
            .collect();
        let tree = tree_with(&particles);
        let calculator = MassCalculator::new();

        let expected = {
            let mut total = PointMass::default();
            for &(mass, displacement) in &particles {
                total.mass += mass;
                total.displacement += mass * Vector::from(displacement);
            }
            total.displacement /= total.mass;
            total
        };

        thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| calculator.calculate(tree.root())))
                .collect();

            for handle in handles {
                let aggregate = handle.join().unwrap();
                assert_abs_diff_eq!(aggregate.mass, expected.mass, epsilon = 1e-9);
                assert_abs_diff_eq!(
                    aggregate.displacement,
                    expected.displacement,
                    epsilon = 1e-9
                );
            }
        });
    }
}
