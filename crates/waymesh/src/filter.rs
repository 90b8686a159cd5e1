//! Polygon filtering and traversal cost for queries

use crate::{Poly, PolyFlags};

/// Number of distinct area ids a filter can cost
pub const MAX_AREAS: usize = 32;

/// Inclusion/exclusion flags plus per-area cost multipliers, threaded by
/// value through every search.
///
/// A polygon passes when its flags intersect `include_flags` and do not
/// intersect `exclude_flags`. Traversal cost into a polygon is scaled by
/// the multiplier for its area id (default 1.0, never negative).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    /// Flags a polygon must carry at least one of
    pub include_flags: PolyFlags,
    /// Flags that disqualify a polygon outright
    pub exclude_flags: PolyFlags,
    area_cost: [f32; MAX_AREAS],
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            include_flags: PolyFlags::all(),
            exclude_flags: PolyFlags::empty(),
            area_cost: [1.0; MAX_AREAS],
        }
    }
}

impl QueryFilter {
    /// Creates a filter with explicit flag sets and default costs
    pub fn new(include_flags: PolyFlags, exclude_flags: PolyFlags) -> Self {
        Self {
            include_flags,
            exclude_flags,
            ..Default::default()
        }
    }

    /// Whether a polygon passes this filter
    #[inline]
    pub fn passes(&self, poly: &Poly) -> bool {
        poly.flags.intersects(self.include_flags) && !poly.flags.intersects(self.exclude_flags)
    }

    /// Cost multiplier for an area id. Areas beyond [`MAX_AREAS`] share the
    /// last table slot.
    #[inline]
    pub fn area_cost(&self, area: u8) -> f32 {
        self.area_cost[(area as usize).min(MAX_AREAS - 1)]
    }

    /// Sets the cost multiplier for an area id. Negative costs are clamped
    /// to zero to keep the search heuristic admissible.
    pub fn set_area_cost(&mut self, area: u8, cost: f32) {
        self.area_cost[(area as usize).min(MAX_AREAS - 1)] = cost.max(0.0);
    }

    /// Smallest multiplier in the cost table. Scaling the straight-line
    /// heuristic by this keeps it a lower bound on real traversal cost.
    pub fn min_area_cost(&self) -> f32 {
        self.area_cost.iter().copied().fold(f32::MAX, f32::min)
    }
}
