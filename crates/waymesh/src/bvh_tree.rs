//! Bounding-volume hierarchy over polygon AABBs
//!
//! Built once when a [`crate::MeshStore`] loads and never mutated. Queries
//! walk the tree depth-first, left child before right child, and leaf items
//! in their insertion order (tile-major, polygon-minor). That order is part
//! of the engine's contract: nearest-polygon ties resolve to the first
//! candidate this traversal yields.

use crate::PolyRef;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    /// Minimum bounds
    pub min: [f32; 3],
    /// Maximum bounds
    pub max: [f32; 3],
}

impl Aabb {
    /// Creates an Aabb from min and max points
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    /// Creates an empty Aabb (inverted bounds)
    pub fn empty() -> Self {
        Self {
            min: [f32::MAX; 3],
            max: [f32::MIN; 3],
        }
    }

    /// Expands this Aabb to include another
    pub fn expand(&mut self, other: &Aabb) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(other.min[axis]);
            self.max[axis] = self.max[axis].max(other.max[axis]);
        }
    }

    /// Expands this Aabb to include a point
    pub fn expand_point(&mut self, point: &[f32; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(point[axis]);
            self.max[axis] = self.max[axis].max(point[axis]);
        }
    }

    /// Checks if this Aabb overlaps another
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min[0] <= other.max[0]
            && self.max[0] >= other.min[0]
            && self.min[1] <= other.max[1]
            && self.max[1] >= other.min[1]
            && self.min[2] <= other.max[2]
            && self.max[2] >= other.min[2]
    }

    /// Center of the Aabb
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Axis with the largest extent
    fn longest_axis(&self) -> usize {
        let dx = self.max[0] - self.min[0];
        let dy = self.max[1] - self.min[1];
        let dz = self.max[2] - self.min[2];

        if dx >= dy && dx >= dz {
            0
        } else if dy >= dz {
            1
        } else {
            2
        }
    }
}

/// Item stored in the tree
#[derive(Debug, Clone)]
pub struct BvhItem {
    /// Polygon reference
    pub poly_ref: PolyRef,
    /// Bounding box of the polygon
    pub bounds: Aabb,
}

/// Node in the tree
#[derive(Debug)]
enum BvhNode {
    Leaf {
        bounds: Aabb,
        items: Vec<BvhItem>,
    },
    Internal {
        bounds: Aabb,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn bounds(&self) -> &Aabb {
        match self {
            BvhNode::Leaf { bounds, .. } => bounds,
            BvhNode::Internal { bounds, .. } => bounds,
        }
    }

    /// Collects all overlapping items, left subtree before right.
    fn query(&self, query_bounds: &Aabb, results: &mut Vec<PolyRef>) {
        if !self.bounds().overlaps(query_bounds) {
            return;
        }

        match self {
            BvhNode::Leaf { items, .. } => {
                for item in items {
                    if item.bounds.overlaps(query_bounds) {
                        results.push(item.poly_ref);
                    }
                }
            }
            BvhNode::Internal { left, right, .. } => {
                left.query(query_bounds, results);
                right.query(query_bounds, results);
            }
        }
    }
}

/// Maximum items per leaf node
const MAX_LEAF_SIZE: usize = 4;

/// Static bounding-volume tree for spatial polygon lookup
#[derive(Debug, Default)]
pub struct BvhTree {
    root: Option<BvhNode>,
}

impl BvhTree {
    /// Builds a tree from items. The item order defines leaf visit order,
    /// so callers pass polygons tile-major, polygon-minor.
    pub fn build(items: Vec<BvhItem>) -> Self {
        if items.is_empty() {
            return Self { root: None };
        }

        Self {
            root: Some(Self::build_node(items)),
        }
    }

    /// Splits at the median item along the longest bounds axis. The split
    /// is a stable partition, preserving insertion order within each side.
    fn build_node(items: Vec<BvhItem>) -> BvhNode {
        let mut bounds = Aabb::empty();
        for item in &items {
            bounds.expand(&item.bounds);
        }

        if items.len() <= MAX_LEAF_SIZE {
            return BvhNode::Leaf { bounds, items };
        }

        let axis = bounds.longest_axis();

        let mut centers: Vec<f32> = items.iter().map(|i| i.bounds.center()[axis]).collect();
        centers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let pivot = centers[centers.len() / 2];

        let mut left_items = Vec::new();
        let mut right_items = Vec::new();
        for item in items {
            if item.bounds.center()[axis] < pivot {
                left_items.push(item);
            } else {
                right_items.push(item);
            }
        }

        // Degenerate pivot (many identical centers): fall back to an
        // index split so recursion always terminates.
        if left_items.is_empty() || right_items.is_empty() {
            let mut all = if left_items.is_empty() {
                right_items
            } else {
                left_items
            };
            let right = all.split_off(all.len() / 2);
            left_items = all;
            right_items = right;
        }

        BvhNode::Internal {
            bounds,
            left: Box::new(Self::build_node(left_items)),
            right: Box::new(Self::build_node(right_items)),
        }
    }

    /// Returns references of all items whose bounds overlap `query_bounds`,
    /// in the fixed depth-first traversal order.
    pub fn query(&self, query_bounds: &Aabb) -> Vec<PolyRef> {
        let mut results = Vec::new();
        if let Some(root) = &self.root {
            root.query(query_bounds, &mut results);
        }
        results
    }
}
