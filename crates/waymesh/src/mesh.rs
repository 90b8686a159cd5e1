//! Immutable polygon mesh store
//!
//! A [`MeshStore`] is constructed once by [`MeshStore::load`] and answers
//! read-only geometry questions from then on. Replacing a mesh means
//! loading a new store; references minted by the old one fail validation
//! instead of aliasing into the new data.

use glam::Vec3;

use waymesh_common::{
    closest_height_on_triangle, closest_point_on_segment, dist_point_segment_sqr_2d,
    point_in_polygon_2d, triangle_area, vlerp, Error, Result,
};

use crate::binary_format::MeshData;
use crate::bvh_tree::{Aabb, BvhItem, BvhTree};
use crate::{PolyFlags, PolyRef, PolyType, MAX_VERTS_PER_POLY};

/// Generation salt assigned to every tile of a freshly loaded store.
/// References carrying any other salt value are rejected as stale.
const STORE_SALT: u32 = 1;

/// Directed adjacency from one polygon's edge to a neighboring polygon
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct Link {
    /// Reference to the connected polygon
    pub target: PolyRef,
    /// Edge index on the owning polygon
    pub edge: u8,
    /// Start of the overlap span along the edge, quantized to 0..=255
    pub span_min: u8,
    /// End of the overlap span along the edge, quantized to 0..=255
    pub span_max: u8,
}

impl Link {
    /// A link whose overlap span is empty connects nothing traversable
    #[inline]
    pub fn is_empty_span(&self) -> bool {
        self.span_min >= self.span_max
    }
}

/// Convex polygon in a mesh tile
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct Poly {
    /// Vertex indices into the tile vertex array
    pub verts: [u16; MAX_VERTS_PER_POLY],
    /// Number of vertices used
    pub vert_count: u8,
    /// Area id (selects the filter cost multiplier)
    pub area: u8,
    /// Capability flags
    pub flags: PolyFlags,
    /// Polygon kind
    pub poly_type: PolyType,
    /// Range of this polygon's links in the tile link array
    pub(crate) first_link: Option<(u32, u8)>,
}

/// Tile of polygons sharing a vertex array and a link table
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshTile {
    /// Generation salt for reference validation
    pub salt: u32,
    /// Minimum corner of the tile bounds
    pub bmin: [f32; 3],
    /// Maximum corner of the tile bounds
    pub bmax: [f32; 3],
    /// Vertex positions, xyz triplets
    pub verts: Vec<f32>,
    /// Polygons in the tile
    pub polys: Vec<Poly>,
    /// Links of all polygons, grouped per polygon
    pub links: Vec<Link>,
}

impl MeshTile {
    /// Position of a polygon vertex
    #[inline]
    pub fn vertex(&self, idx: u16) -> [f32; 3] {
        let base = idx as usize * 3;
        [self.verts[base], self.verts[base + 1], self.verts[base + 2]]
    }

    /// Links of a polygon, in blob order
    pub fn links_of(&self, poly: &Poly) -> &[Link] {
        match poly.first_link {
            Some((start, count)) => &self.links[start as usize..start as usize + count as usize],
            None => &[],
        }
    }
}

/// Immutable mesh plus its bounding-volume index.
///
/// Safe to share across threads once loaded; all query scratch lives in
/// [`crate::MeshQuery`] instances instead.
#[derive(Debug)]
pub struct MeshStore {
    tiles: Vec<MeshTile>,
    /// One bounding-volume tree per tile, parallel to `tiles`
    tile_bvhs: Vec<BvhTree>,
}

impl MeshStore {
    /// Validates and loads a mesh blob. On any failure no store is
    /// produced; there is no partially-usable state.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let data = MeshData::from_bytes(bytes)?;

        let mut tiles = Vec::with_capacity(data.tiles.len());
        for tile_data in &data.tiles {
            let mut polys = Vec::with_capacity(tile_data.polys.len());
            let mut links = Vec::new();

            for poly_data in &tile_data.polys {
                let mut verts = [0u16; MAX_VERTS_PER_POLY];
                verts[..poly_data.verts.len()].copy_from_slice(&poly_data.verts);

                let first_link = if poly_data.links.is_empty() {
                    None
                } else {
                    Some((links.len() as u32, poly_data.links.len() as u8))
                };

                for link in &poly_data.links {
                    links.push(Link {
                        target: PolyRef::encode(
                            STORE_SALT,
                            link.target_tile as u32 + 1,
                            link.target_poly as u32,
                        ),
                        edge: link.edge,
                        span_min: link.span_min,
                        span_max: link.span_max,
                    });
                }

                polys.push(Poly {
                    verts,
                    vert_count: poly_data.verts.len() as u8,
                    area: poly_data.area,
                    flags: PolyFlags::from_bits_truncate(poly_data.flags),
                    poly_type: poly_data.poly_type,
                    first_link,
                });
            }

            tiles.push(MeshTile {
                salt: STORE_SALT,
                bmin: tile_data.bmin,
                bmax: tile_data.bmax,
                verts: tile_data.verts.clone(),
                polys,
                links,
            });
        }

        let mut store = Self {
            tiles,
            tile_bvhs: Vec::new(),
        };
        store.check_links_bidirectional()?;
        store.tile_bvhs = store.build_tile_bvhs();

        log::info!(
            "loaded mesh: {} tiles, {} polygons",
            store.tile_count(),
            store.poly_count()
        );

        Ok(store)
    }

    /// Every link must have a reverse link on its target polygon, possibly
    /// with a differently clipped span.
    fn check_links_bidirectional(&self) -> Result<()> {
        for (tile_idx, tile) in self.tiles.iter().enumerate() {
            for (poly_idx, poly) in tile.polys.iter().enumerate() {
                let own_ref = self.poly_ref(tile_idx, poly_idx);

                for link in tile.links_of(poly) {
                    let (target_tile, target_poly) = self.poly_at(link.target).map_err(|_| {
                        Error::InvalidMesh(format!(
                            "tile {tile_idx} poly {poly_idx}: dangling link target"
                        ))
                    })?;

                    let has_reverse = target_tile
                        .links_of(target_poly)
                        .iter()
                        .any(|back| back.target == own_ref);
                    if !has_reverse {
                        return Err(Error::InvalidMesh(format!(
                            "tile {tile_idx} poly {poly_idx}: link without reverse link"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Items are inserted in polygon order per tile; together with the
    /// tree's fixed traversal this pins down candidate visit order.
    fn build_tile_bvhs(&self) -> Vec<BvhTree> {
        self.tiles
            .iter()
            .enumerate()
            .map(|(tile_idx, tile)| {
                let items = tile
                    .polys
                    .iter()
                    .enumerate()
                    .map(|(poly_idx, poly)| {
                        let mut bounds = Aabb::empty();
                        for i in 0..poly.vert_count as usize {
                            bounds.expand_point(&tile.vertex(poly.verts[i]));
                        }

                        BvhItem {
                            poly_ref: self.poly_ref(tile_idx, poly_idx),
                            bounds,
                        }
                    })
                    .collect();

                BvhTree::build(items)
            })
            .collect()
    }

    /// Number of tiles
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Total number of polygons across all tiles
    pub fn poly_count(&self) -> usize {
        self.tiles.iter().map(|t| t.polys.len()).sum()
    }

    /// Tile by index
    pub fn tile(&self, idx: usize) -> Option<&MeshTile> {
        self.tiles.get(idx)
    }

    /// Reference for a polygon by position in the store
    pub(crate) fn poly_ref(&self, tile_idx: usize, poly_idx: usize) -> PolyRef {
        PolyRef::encode(STORE_SALT, tile_idx as u32 + 1, poly_idx as u32)
    }

    /// All polygon references, tile-major then polygon-minor
    pub fn poly_refs(&self) -> impl Iterator<Item = PolyRef> + '_ {
        self.tiles.iter().enumerate().flat_map(move |(tile_idx, tile)| {
            (0..tile.polys.len()).map(move |poly_idx| self.poly_ref(tile_idx, poly_idx))
        })
    }

    /// Whether a reference names a polygon in this store instance
    pub fn is_valid_poly_ref(&self, reference: PolyRef) -> bool {
        self.poly_at(reference).is_ok()
    }

    /// Resolves a reference to its tile and polygon. Stale or out-of-range
    /// references fail; they are never silently misread.
    pub fn poly_at(&self, reference: PolyRef) -> Result<(&MeshTile, &Poly)> {
        if reference.is_null() {
            return Err(Error::InvalidPolyRef);
        }

        let tile_id = reference.tile_id();
        if tile_id == 0 {
            return Err(Error::InvalidPolyRef);
        }

        let tile = self
            .tiles
            .get(tile_id as usize - 1)
            .ok_or(Error::InvalidPolyRef)?;

        if reference.salt() != tile.salt {
            return Err(Error::InvalidPolyRef);
        }

        let poly = tile
            .polys
            .get(reference.poly_idx() as usize)
            .ok_or(Error::InvalidPolyRef)?;

        Ok((tile, poly))
    }

    /// Indices of tiles whose bounds overlap the query box, ascending.
    ///
    /// Selection is on the ground (XZ) plane only; the vertical axis is
    /// resolved inside each tile by clamping the query box into the tile
    /// bounds, so a query hovering above a walkable surface still reaches
    /// its polygons.
    pub fn tiles_overlapping(&self, bmin: &[f32; 3], bmax: &[f32; 3]) -> Vec<usize> {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| {
                bmin[0] <= tile.bmax[0]
                    && bmax[0] >= tile.bmin[0]
                    && bmin[2] <= tile.bmax[2]
                    && bmax[2] >= tile.bmin[2]
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    /// References of polygons whose bounds overlap the query box, in the
    /// index's fixed traversal order: ascending tiles, then each tile's
    /// tree depth-first with left children before right.
    pub fn query_polygons(&self, bmin: &[f32; 3], bmax: &[f32; 3]) -> Vec<PolyRef> {
        let mut results = Vec::new();

        for tile_idx in self.tiles_overlapping(bmin, bmax) {
            let tile = &self.tiles[tile_idx];

            let mut cbmin = [0.0f32; 3];
            let mut cbmax = [0.0f32; 3];
            for axis in 0..3 {
                cbmin[axis] = bmin[axis].clamp(tile.bmin[axis], tile.bmax[axis]);
                cbmax[axis] = bmax[axis].clamp(tile.bmin[axis], tile.bmax[axis]);
            }

            results.extend(self.tile_bvhs[tile_idx].query(&Aabb::new(cbmin, cbmax)));
        }

        results
    }

    /// Closest point on a polygon to a position.
    ///
    /// Projects the position onto the polygon surface when its XZ footprint
    /// contains it, otherwise clamps to the nearest boundary edge. The
    /// returned flag tells which case applied: `true` means the position
    /// was over the walkable surface, merely above or below it.
    pub fn closest_point_on_poly(
        &self,
        reference: PolyRef,
        pos: &[f32; 3],
    ) -> Result<([f32; 3], bool)> {
        let (tile, poly) = self.poly_at(reference)?;

        if poly.poly_type == PolyType::OffMeshConnection {
            let a = tile.vertex(poly.verts[0]);
            let b = tile.vertex(poly.verts[1]);
            return Ok((closest_point_on_segment(pos, &a, &b), false));
        }

        let vert_count = poly.vert_count as usize;
        let mut verts = [0.0f32; MAX_VERTS_PER_POLY * 3];
        for i in 0..vert_count {
            let v = tile.vertex(poly.verts[i]);
            verts[i * 3..i * 3 + 3].copy_from_slice(&v);
        }

        if point_in_polygon_2d(pos, &verts[..vert_count * 3], vert_count) {
            let mut closest = *pos;
            closest[1] = self.poly_surface_height(tile, poly, pos);
            return Ok((closest, true));
        }

        // Outside the footprint: clamp to the nearest boundary edge
        let mut closest = tile.vertex(poly.verts[0]);
        let mut closest_dist_sqr = f32::MAX;

        for i in 0..vert_count {
            let j = (i + 1) % vert_count;
            let vi = tile.vertex(poly.verts[i]);
            let vj = tile.vertex(poly.verts[j]);

            let (dist_sqr, t) = dist_point_segment_sqr_2d(pos, &vi, &vj);
            if dist_sqr < closest_dist_sqr {
                closest_dist_sqr = dist_sqr;
                closest = vlerp(&vi, &vj, t);
            }
        }

        Ok((closest, false))
    }

    /// Surface height at an XZ position known to be inside the polygon
    /// footprint, from the fan triangle containing it.
    fn poly_surface_height(&self, tile: &MeshTile, poly: &Poly, pos: &[f32; 3]) -> f32 {
        let v0 = tile.vertex(poly.verts[0]);

        for i in 1..poly.vert_count as usize - 1 {
            let v1 = tile.vertex(poly.verts[i]);
            let v2 = tile.vertex(poly.verts[i + 1]);

            if let Some(height) = closest_height_on_triangle(pos, &v0, &v1, &v2) {
                return height;
            }
        }

        // Numeric edge case: on a fan boundary no triangle claimed the
        // point. Average the vertex heights instead of guessing.
        let mut sum = 0.0;
        for i in 0..poly.vert_count as usize {
            sum += tile.vertex(poly.verts[i])[1];
        }
        sum / poly.vert_count as f32
    }

    /// Surface area of a polygon (sum of its fan triangle areas).
    /// Off-mesh connections have no area.
    pub fn poly_area(&self, tile: &MeshTile, poly: &Poly) -> f32 {
        if poly.poly_type == PolyType::OffMeshConnection {
            return 0.0;
        }

        let v0: Vec3 = tile.vertex(poly.verts[0]).into();
        let mut area = 0.0;

        for i in 1..poly.vert_count as usize - 1 {
            let v1: Vec3 = tile.vertex(poly.verts[i]).into();
            let v2: Vec3 = tile.vertex(poly.verts[i + 1]).into();
            area += triangle_area(&v0, &v1, &v2);
        }

        area
    }

    /// Center of a polygon (vertex average)
    pub fn poly_center(&self, reference: PolyRef) -> Result<[f32; 3]> {
        let (tile, poly) = self.poly_at(reference)?;

        let mut center = [0.0f32; 3];
        for i in 0..poly.vert_count as usize {
            let v = tile.vertex(poly.verts[i]);
            center[0] += v[0];
            center[1] += v[1];
            center[2] += v[2];
        }

        let count = poly.vert_count as f32;
        Ok([center[0] / count, center[1] / count, center[2] / count])
    }
}
