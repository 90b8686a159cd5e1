//! Navigation-mesh query engine
//!
//! Given a precomputed, static mesh of convex walkable polygons, this crate
//! answers spatial questions: which polygon is nearest a point, a random
//! walkable point, the shortest connected polygon corridor between two
//! points, and the minimal-vertex straight-line path through that corridor.
//!
//! The entry points are [`MeshStore::load`] for the immutable mesh data and
//! [`MeshQuery`] for the per-caller query state. A [`MeshStore`] is safe to
//! share read-only across threads; each thread keeps its own [`MeshQuery`].

pub mod binary_format;
mod bvh_tree;
mod filter;
mod mesh;
mod node_pool;
mod query;
mod rand;

pub mod test_mesh_helpers;

mod binary_format_tests;
mod path_search_tests;
mod random_point_tests;

pub use filter::QueryFilter;
pub use mesh::{Link, MeshStore, MeshTile, Poly};
pub use query::{MeshQuery, PathResult, StraightPath, StraightPathPoint};
pub use rand::SampleRng;

/// Maximum number of vertices per polygon
pub const MAX_VERTS_PER_POLY: usize = 6;

/// Number of bits for the polygon index within a reference
const POLY_BITS: u32 = 16;
/// Number of bits for the tile index within a reference
const TILE_BITS: u32 = 10;
/// Number of bits for the generation salt within a reference
const SALT_BITS: u32 = 6;

const POLY_MASK: u32 = (1 << POLY_BITS) - 1;
const TILE_MASK: u32 = (1 << TILE_BITS) - 1;
const SALT_MASK: u32 = (1 << SALT_BITS) - 1;

/// Maximum number of tiles a store can hold (limited by [`TILE_BITS`])
pub const MAX_TILES: usize = 1 << TILE_BITS;
/// Maximum number of polygons per tile (limited by [`POLY_BITS`])
pub const MAX_POLYS_PER_TILE: usize = 1 << POLY_BITS;

/// Opaque stable identifier for a polygon in a [`MeshStore`].
///
/// Encodes (generation salt, tile index, polygon index) so references remain
/// validatable across reloads: a reference minted by one store instance is
/// rejected by [`MeshStore::is_valid_poly_ref`] rather than silently misread.
/// `PolyRef::NULL` never names a polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct PolyRef(u32);

impl PolyRef {
    /// The null reference
    pub const NULL: PolyRef = PolyRef(0);

    /// Creates a reference from a raw id
    #[inline]
    pub fn new(id: u32) -> Self {
        PolyRef(id)
    }

    /// Encodes a reference from its parts. The tile id is 1-based so that
    /// the all-zero reference stays null.
    #[inline]
    pub(crate) fn encode(salt: u32, tile_id: u32, poly_idx: u32) -> Self {
        PolyRef(
            ((salt & SALT_MASK) << (POLY_BITS + TILE_BITS))
                | ((tile_id & TILE_MASK) << POLY_BITS)
                | (poly_idx & POLY_MASK),
        )
    }

    /// Raw id value
    #[inline]
    pub fn id(&self) -> u32 {
        self.0
    }

    /// Generation salt component
    #[inline]
    pub(crate) fn salt(&self) -> u32 {
        (self.0 >> (POLY_BITS + TILE_BITS)) & SALT_MASK
    }

    /// 1-based tile id component
    #[inline]
    pub(crate) fn tile_id(&self) -> u32 {
        (self.0 >> POLY_BITS) & TILE_MASK
    }

    /// Polygon index component
    #[inline]
    pub(crate) fn poly_idx(&self) -> u32 {
        self.0 & POLY_MASK
    }

    /// Whether this reference could name a polygon at all
    #[inline]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

bitflags::bitflags! {
    /// Polygon capability flags used by [`QueryFilter`] inclusion/exclusion
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PolyFlags: u16 {
        /// Ability to walk (ground, grass, road)
        const WALK = 0x01;
        /// Ability to swim (water)
        const SWIM = 0x02;
        /// Ability to move through doors
        const DOOR = 0x04;
        /// Ability to jump
        const JUMP = 0x08;
        /// Disabled polygon
        const DISABLED = 0x10;
    }
}

bitflags::bitflags! {
    /// Flags attached to each straight-path output point
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StraightPathFlags: u8 {
        /// The point is the path start
        const START = 0x01;
        /// The point is the path end
        const END = 0x02;
        /// The point is the start of an off-mesh connection jump
        const OFFMESH_CONNECTION = 0x04;
    }
}

/// Kind of polygon stored in a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum PolyType {
    /// Regular convex walkable polygon
    #[default]
    Ground,
    /// Two-vertex off-mesh connection segment
    OffMeshConnection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poly_ref_round_trip() {
        let r = PolyRef::encode(5, 130, 4242);
        assert_eq!(r.salt(), 5);
        assert_eq!(r.tile_id(), 130);
        assert_eq!(r.poly_idx(), 4242);
        assert!(!r.is_null());
    }

    #[test]
    fn test_poly_ref_null() {
        assert!(PolyRef::NULL.is_null());
        assert!(PolyRef::encode(0, 0, 0).is_null());
        assert!(!PolyRef::encode(1, 1, 0).is_null());
    }

    #[test]
    fn test_poly_ref_masks_overflow() {
        // Components beyond their bit width wrap instead of bleeding
        // into neighboring fields.
        let r = PolyRef::encode(SALT_MASK + 1, 0, 0);
        assert_eq!(r.salt(), 0);
        assert_eq!(r.tile_id(), 0);
    }
}
