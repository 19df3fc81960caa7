use crate::error::Error;

use super::{any_less_than_or_equal_to, Orthant, Vector, DIMENSIONS};

/// Axis-aligned box stored as a centre and strictly positive per-axis
/// half-widths (extents).
///
/// Containment and intersection tests optionally scale this box's extents by
/// a looseness factor, which lets a loose octree keep particles that straddle
/// the boundaries of its children. Looseness values below `1.0` are treated
/// as `1.0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    centre: Vector,
    extents: Vector,
}

impl BoundingBox {
    /// Box centred at `centre` spanning the full side length `width` on each
    /// axis. Widths must be strictly positive.
    pub fn new(centre: Vector, width: Vector) -> Result<Self, Error> {
        let extents = width * 0.5;

        if any_less_than_or_equal_to(&extents, 0.0) {
            return Err(Error::InvalidArgument(
                "bounding box width must be > 0.0 on every axis".to_owned(),
            ));
        }

        Ok(Self { centre, extents })
    }

    pub(crate) fn from_extents(centre: Vector, extents: Vector) -> Self {
        Self { centre, extents }
    }

    pub fn centre(&self) -> &Vector {
        &self.centre
    }

    /// Per-axis half-widths.
    pub fn extents(&self) -> &Vector {
        &self.extents
    }

    fn loose_extent(&self, axis: usize, looseness: f64) -> f64 {
        let half_width = self.extents[axis];

        if looseness > 1.0 {
            half_width * looseness
        } else {
            half_width
        }
    }

    /// True if `other` overlaps this box when this box's extents are scaled
    /// by `looseness`.
    pub fn intersects(&self, other: &BoundingBox, looseness: f64) -> bool {
        for axis in 0..DIMENSIONS {
            let half_width = self.loose_extent(axis, looseness);

            let this_min = self.centre[axis] - half_width;
            let this_max = self.centre[axis] + half_width;
            let other_min = other.centre[axis] - other.extents[axis];
            let other_max = other.centre[axis] + other.extents[axis];

            if this_min > other_max || this_max < other_min {
                return false;
            }
        }

        true
    }

    /// True if `point` lies within this box scaled by `looseness`.
    pub fn contains_point(&self, point: &Vector, looseness: f64) -> bool {
        for axis in 0..DIMENSIONS {
            let half_width = self.loose_extent(axis, looseness);

            if point[axis] > self.centre[axis] + half_width
                || point[axis] < self.centre[axis] - half_width
            {
                return false;
            }
        }

        true
    }

    /// True if both per-axis extremes of `other` lie within this box scaled
    /// by `looseness`.
    pub fn contains(&self, other: &BoundingBox, looseness: f64) -> bool {
        for axis in 0..DIMENSIONS {
            let half_width = self.loose_extent(axis, looseness);

            let this_min = self.centre[axis] - half_width;
            let this_max = self.centre[axis] + half_width;
            let other_min = other.centre[axis] - other.extents[axis];
            let other_max = other.centre[axis] + other.extents[axis];

            if other_min < this_min || other_max > this_max {
                return false;
            }
        }

        true
    }

    /// The orthant this box assigns to `point`, defined for every point,
    /// including points outside the box.
    pub fn orthant_of(&self, point: &Vector) -> Orthant {
        let mut orthant = Orthant::default();

        for axis in 0..DIMENSIONS {
            orthant.align_axis(axis, point[axis] >= self.centre[axis]);
        }

        orthant
    }

    /// The sub-box occupying `orthant`: half the extents, centre shifted into
    /// that orthant.
    pub fn shrink_to(&self, orthant: Orthant) -> BoundingBox {
        let extents = self.extents * 0.5;
        let mut centre = self.centre;

        for axis in 0..DIMENSIONS {
            if orthant.is_axis_aligned(axis) {
                centre[axis] += extents[axis];
            } else {
                centre[axis] -= extents[axis];
            }
        }

        Self::from_extents(centre, extents)
    }

    /// The super-box of which this box is the given `orthant`: double the
    /// extents, centre shifted outward. Inverse of [`BoundingBox::shrink_to`].
    pub fn expand_from(&self, orthant: Orthant) -> BoundingBox {
        let mut centre = self.centre;

        for axis in 0..DIMENSIONS {
            if orthant.is_axis_aligned(axis) {
                centre[axis] -= self.extents[axis];
            } else {
                centre[axis] += self.extents[axis];
            }
        }

        Self::from_extents(centre, self.extents * 2.0)
    }
}
