//! Binary mesh blob format
//!
//! The store consumes a single little-endian blob: a header (magic,
//! version, tile count) followed by one record per tile (bounds, vertex
//! array, polygon array with per-edge link tables). The write path exists
//! for the CLI and the test suite; authoring pipelines live elsewhere.
//!
//! Layout per tile:
//! - `bmin`, `bmax` as 3 × f32 each
//! - `u32` vertex count, `u32` polygon count
//! - vertices as xyz f32 triplets
//! - per polygon: `u8` vertex count, `u8` area, `u8` type, `u16` flags,
//!   `u16` vertex indices, `u8` link count, then per link: `u8` edge,
//!   `u16` target tile, `u16` target polygon, `u8` span min, `u8` span max

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use waymesh_common::{Error, Result};

use crate::{PolyType, MAX_POLYS_PER_TILE, MAX_TILES, MAX_VERTS_PER_POLY};

/// Magic number for mesh blobs ('WNAV' in little-endian)
pub const MESH_MAGIC: u32 = 0x5641_4E57;

/// Current mesh blob version
pub const MESH_VERSION: u32 = 1;

/// One directed adjacency record in a tile blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkData {
    /// Edge index on the owning polygon
    pub edge: u8,
    /// Target tile index within the blob
    pub target_tile: u16,
    /// Target polygon index within the target tile
    pub target_poly: u16,
    /// Start of the overlap span along the edge, quantized to 0..=255
    pub span_min: u8,
    /// End of the overlap span along the edge, quantized to 0..=255
    pub span_max: u8,
}

/// One polygon record in a tile blob
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct PolyData {
    /// Ordered vertex indices into the tile vertex array
    pub verts: Vec<u16>,
    /// Area id (selects the filter cost multiplier)
    pub area: u8,
    /// Polygon kind
    pub poly_type: PolyType,
    /// Capability flags bit pattern
    pub flags: u16,
    /// Outgoing links, one or more per edge
    pub links: Vec<LinkData>,
}

/// One tile record in a mesh blob
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct TileData {
    /// Minimum corner of the tile bounds
    pub bmin: [f32; 3],
    /// Maximum corner of the tile bounds
    pub bmax: [f32; 3],
    /// Vertex positions, xyz triplets
    pub verts: Vec<f32>,
    /// Polygons in the tile
    pub polys: Vec<PolyData>,
}

/// A full mesh blob in memory
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshData {
    /// Tiles in index order
    pub tiles: Vec<TileData>,
}

impl Default for PolyData {
    fn default() -> Self {
        Self {
            verts: Vec::new(),
            area: 0,
            poly_type: PolyType::Ground,
            flags: 0,
            links: Vec::new(),
        }
    }
}

fn truncated() -> Error {
    Error::InvalidMesh("truncated mesh blob".into())
}

impl MeshData {
    /// Serializes to the blob layout. Fails when any count exceeds what
    /// the format (or the reference encoding) can express.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.tiles.is_empty() || self.tiles.len() > MAX_TILES {
            return Err(Error::InvalidMesh(format!(
                "tile count {} outside 1..={}",
                self.tiles.len(),
                MAX_TILES
            )));
        }

        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(MESH_MAGIC)?;
        out.write_u32::<LittleEndian>(MESH_VERSION)?;
        out.write_u32::<LittleEndian>(self.tiles.len() as u32)?;

        for tile in &self.tiles {
            tile.write(&mut out)?;
        }

        Ok(out)
    }

    /// Parses and validates a blob. Cross-tile link targets are range
    /// checked here; reverse-link consistency is the store's concern.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);

        let magic = cursor.read_u32::<LittleEndian>().map_err(|_| truncated())?;
        if magic != MESH_MAGIC {
            return Err(Error::InvalidMesh(format!("bad magic {magic:#010x}")));
        }

        let version = cursor.read_u32::<LittleEndian>().map_err(|_| truncated())?;
        if version != MESH_VERSION {
            return Err(Error::InvalidMesh(format!(
                "unsupported version {version}, expected {MESH_VERSION}"
            )));
        }

        let tile_count = cursor.read_u32::<LittleEndian>().map_err(|_| truncated())? as usize;
        if tile_count == 0 || tile_count > MAX_TILES {
            return Err(Error::InvalidMesh(format!(
                "tile count {tile_count} outside 1..={MAX_TILES}"
            )));
        }

        let mut tiles = Vec::with_capacity(tile_count);
        for tile_idx in 0..tile_count {
            tiles.push(TileData::read(&mut cursor, tile_idx)?);
        }

        let data = MeshData { tiles };
        data.validate_link_targets()?;
        Ok(data)
    }

    fn validate_link_targets(&self) -> Result<()> {
        for (tile_idx, tile) in self.tiles.iter().enumerate() {
            for (poly_idx, poly) in tile.polys.iter().enumerate() {
                for link in &poly.links {
                    let target_tile = self
                        .tiles
                        .get(link.target_tile as usize)
                        .ok_or_else(|| {
                            Error::InvalidMesh(format!(
                                "tile {tile_idx} poly {poly_idx}: link targets missing tile {}",
                                link.target_tile
                            ))
                        })?;

                    if link.target_poly as usize >= target_tile.polys.len() {
                        return Err(Error::InvalidMesh(format!(
                            "tile {tile_idx} poly {poly_idx}: link targets missing poly {} in tile {}",
                            link.target_poly, link.target_tile
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl TileData {
    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.verts.len() % 3 != 0 {
            return Err(Error::InvalidMesh("vertex array not xyz triplets".into()));
        }
        let vert_count = self.verts.len() / 3;
        if vert_count > u16::MAX as usize {
            return Err(Error::InvalidMesh(format!("{vert_count} verts exceed u16 indices")));
        }
        if self.polys.len() > MAX_POLYS_PER_TILE {
            return Err(Error::InvalidMesh(format!(
                "poly count {} exceeds {MAX_POLYS_PER_TILE}",
                self.polys.len()
            )));
        }

        for v in self.bmin.iter().chain(self.bmax.iter()) {
            out.write_f32::<LittleEndian>(*v)?;
        }
        out.write_u32::<LittleEndian>(vert_count as u32)?;
        out.write_u32::<LittleEndian>(self.polys.len() as u32)?;

        for v in &self.verts {
            out.write_f32::<LittleEndian>(*v)?;
        }

        for poly in &self.polys {
            poly.write(out)?;
        }

        Ok(())
    }

    fn read(cursor: &mut Cursor<&[u8]>, tile_idx: usize) -> Result<Self> {
        let mut bmin = [0.0f32; 3];
        let mut bmax = [0.0f32; 3];
        for v in bmin.iter_mut() {
            *v = cursor.read_f32::<LittleEndian>().map_err(|_| truncated())?;
        }
        for v in bmax.iter_mut() {
            *v = cursor.read_f32::<LittleEndian>().map_err(|_| truncated())?;
        }

        for axis in 0..3 {
            if !bmin[axis].is_finite() || !bmax[axis].is_finite() || bmin[axis] > bmax[axis] {
                return Err(Error::InvalidMesh(format!(
                    "tile {tile_idx}: invalid bounds on axis {axis}"
                )));
            }
        }

        let vert_count = cursor.read_u32::<LittleEndian>().map_err(|_| truncated())? as usize;
        let poly_count = cursor.read_u32::<LittleEndian>().map_err(|_| truncated())? as usize;

        if vert_count > u16::MAX as usize {
            return Err(Error::InvalidMesh(format!(
                "tile {tile_idx}: {vert_count} verts exceed u16 indices"
            )));
        }
        if poly_count > MAX_POLYS_PER_TILE {
            return Err(Error::InvalidMesh(format!(
                "tile {tile_idx}: poly count {poly_count} exceeds {MAX_POLYS_PER_TILE}"
            )));
        }

        let mut verts = Vec::with_capacity(vert_count * 3);
        for _ in 0..vert_count * 3 {
            verts.push(cursor.read_f32::<LittleEndian>().map_err(|_| truncated())?);
        }

        let mut polys = Vec::with_capacity(poly_count);
        for poly_idx in 0..poly_count {
            polys.push(PolyData::read(cursor, tile_idx, poly_idx, vert_count)?);
        }

        Ok(Self {
            bmin,
            bmax,
            verts,
            polys,
        })
    }
}

impl PolyData {
    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        check_poly_shape(self.verts.len(), self.poly_type)?;
        if self.links.len() > u8::MAX as usize {
            return Err(Error::InvalidMesh(format!(
                "{} links exceed the per-poly limit",
                self.links.len()
            )));
        }

        out.write_u8(self.verts.len() as u8)?;
        out.write_u8(self.area)?;
        out.write_u8(match self.poly_type {
            PolyType::Ground => 0,
            PolyType::OffMeshConnection => 1,
        })?;
        out.write_u16::<LittleEndian>(self.flags)?;
        for idx in &self.verts {
            out.write_u16::<LittleEndian>(*idx)?;
        }

        out.write_u8(self.links.len() as u8)?;
        for link in &self.links {
            if link.edge as usize >= self.verts.len() {
                return Err(Error::InvalidMesh(format!(
                    "link edge {} out of range for {}-vertex poly",
                    link.edge,
                    self.verts.len()
                )));
            }
            out.write_u8(link.edge)?;
            out.write_u16::<LittleEndian>(link.target_tile)?;
            out.write_u16::<LittleEndian>(link.target_poly)?;
            out.write_u8(link.span_min)?;
            out.write_u8(link.span_max)?;
        }

        Ok(())
    }

    fn read(
        cursor: &mut Cursor<&[u8]>,
        tile_idx: usize,
        poly_idx: usize,
        tile_vert_count: usize,
    ) -> Result<Self> {
        let vert_count = cursor.read_u8().map_err(|_| truncated())? as usize;
        let area = cursor.read_u8().map_err(|_| truncated())?;
        let poly_type = match cursor.read_u8().map_err(|_| truncated())? {
            0 => PolyType::Ground,
            1 => PolyType::OffMeshConnection,
            other => {
                return Err(Error::InvalidMesh(format!(
                    "tile {tile_idx} poly {poly_idx}: unknown poly type {other}"
                )))
            }
        };
        let flags = cursor.read_u16::<LittleEndian>().map_err(|_| truncated())?;

        check_poly_shape(vert_count, poly_type).map_err(|_| {
            Error::InvalidMesh(format!(
                "tile {tile_idx} poly {poly_idx}: invalid vertex count {vert_count}"
            ))
        })?;

        let mut verts = Vec::with_capacity(vert_count);
        for _ in 0..vert_count {
            let idx = cursor.read_u16::<LittleEndian>().map_err(|_| truncated())?;
            if idx as usize >= tile_vert_count {
                return Err(Error::InvalidMesh(format!(
                    "tile {tile_idx} poly {poly_idx}: vertex index {idx} out of range"
                )));
            }
            verts.push(idx);
        }

        let link_count = cursor.read_u8().map_err(|_| truncated())? as usize;
        let mut links = Vec::with_capacity(link_count);
        for _ in 0..link_count {
            let edge = cursor.read_u8().map_err(|_| truncated())?;
            let target_tile = cursor.read_u16::<LittleEndian>().map_err(|_| truncated())?;
            let target_poly = cursor.read_u16::<LittleEndian>().map_err(|_| truncated())?;
            let span_min = cursor.read_u8().map_err(|_| truncated())?;
            let span_max = cursor.read_u8().map_err(|_| truncated())?;

            if edge as usize >= vert_count {
                return Err(Error::InvalidMesh(format!(
                    "tile {tile_idx} poly {poly_idx}: link edge {edge} out of range"
                )));
            }

            links.push(LinkData {
                edge,
                target_tile,
                target_poly,
                span_min,
                span_max,
            });
        }

        Ok(Self {
            verts,
            area,
            poly_type,
            flags,
            links,
        })
    }
}

/// Ground polygons are convex boundaries of at least three vertices;
/// off-mesh connections are exactly a two-endpoint segment.
fn check_poly_shape(vert_count: usize, poly_type: PolyType) -> Result<()> {
    let valid = match poly_type {
        PolyType::Ground => (3..=MAX_VERTS_PER_POLY).contains(&vert_count),
        PolyType::OffMeshConnection => vert_count == 2,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidMesh(format!(
            "invalid vertex count {vert_count} for {poly_type:?}"
        )))
    }
}
