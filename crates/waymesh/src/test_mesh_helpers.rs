//! Mesh construction helpers for tests
//!
//! Every helper assembles a [`MeshData`], serializes it, and loads the
//! bytes through [`MeshStore::load`], so each consumer also exercises blob
//! validation end to end.

use waymesh_common::Result;

use crate::binary_format::{LinkData, MeshData, PolyData, TileData};
use crate::{MeshStore, PolyFlags, PolyType};

/// Cell edge length used by the grid helpers
pub const CELL_SIZE: f32 = 10.0;

fn walkable_poly(verts: Vec<u16>, area: u8, flags: PolyFlags, links: Vec<LinkData>) -> PolyData {
    PolyData {
        verts,
        area,
        poly_type: PolyType::Ground,
        flags: flags.bits(),
        links,
    }
}

fn full_span_link(edge: u8, target_tile: u16, target_poly: u16) -> LinkData {
    LinkData {
        edge,
        target_tile,
        target_poly,
        span_min: 0,
        span_max: 255,
    }
}

/// Blob data for a single flat 10x10 square at the origin
pub fn single_square_data() -> MeshData {
    MeshData {
        tiles: vec![TileData {
            bmin: [0.0, 0.0, 0.0],
            bmax: [10.0, 0.0, 10.0],
            verts: vec![
                0.0, 0.0, 0.0, //
                10.0, 0.0, 0.0, //
                10.0, 0.0, 10.0, //
                0.0, 0.0, 10.0,
            ],
            polys: vec![walkable_poly(vec![0, 1, 2, 3], 0, PolyFlags::WALK, Vec::new())],
        }],
    }
}

/// A single flat 10x10 square at the origin
pub fn single_square_mesh() -> Result<MeshStore> {
    MeshStore::load(&single_square_data().to_bytes()?)
}

/// Blob data for an n-by-n grid of connected squares in one tile
pub fn grid_data(n: usize) -> MeshData {
    let stride = n + 1;
    let mut verts = Vec::with_capacity(stride * stride * 3);
    for z in 0..stride {
        for x in 0..stride {
            verts.extend_from_slice(&[x as f32 * CELL_SIZE, 0.0, z as f32 * CELL_SIZE]);
        }
    }

    let vidx = |x: usize, z: usize| (z * stride + x) as u16;
    let pidx = |x: usize, z: usize| (z * n + x) as u16;

    let mut polys = Vec::with_capacity(n * n);
    for cz in 0..n {
        for cx in 0..n {
            let mut links = Vec::new();
            if cz > 0 {
                links.push(full_span_link(0, 0, pidx(cx, cz - 1)));
            }
            if cx + 1 < n {
                links.push(full_span_link(1, 0, pidx(cx + 1, cz)));
            }
            if cz + 1 < n {
                links.push(full_span_link(2, 0, pidx(cx, cz + 1)));
            }
            if cx > 0 {
                links.push(full_span_link(3, 0, pidx(cx - 1, cz)));
            }

            polys.push(walkable_poly(
                vec![
                    vidx(cx, cz),
                    vidx(cx + 1, cz),
                    vidx(cx + 1, cz + 1),
                    vidx(cx, cz + 1),
                ],
                0,
                PolyFlags::WALK,
                links,
            ));
        }
    }

    let extent = n as f32 * CELL_SIZE;
    MeshData {
        tiles: vec![TileData {
            bmin: [0.0, 0.0, 0.0],
            bmax: [extent, 0.0, extent],
            verts,
            polys,
        }],
    }
}

/// An n-by-n grid of connected 10x10 squares in one tile
pub fn grid_mesh(n: usize) -> Result<MeshStore> {
    MeshStore::load(&grid_data(n).to_bytes()?)
}

/// A 3x3 connected grid plus an unreachable square far away, all in one
/// tile. Polygon 9 is the isolated component.
pub fn two_component_mesh() -> Result<MeshStore> {
    let mut data = grid_data(3);
    let tile = &mut data.tiles[0];

    let base = (tile.verts.len() / 3) as u16;
    tile.verts.extend_from_slice(&[
        100.0, 0.0, 100.0, //
        110.0, 0.0, 100.0, //
        110.0, 0.0, 110.0, //
        100.0, 0.0, 110.0,
    ]);
    tile.polys.push(walkable_poly(
        vec![base, base + 1, base + 2, base + 3],
        0,
        PolyFlags::WALK,
        Vec::new(),
    ));
    tile.bmax = [110.0, 0.0, 110.0];

    MeshStore::load(&data.to_bytes()?)
}

/// Three squares in a row with distinct areas and flags:
/// areas 0, 1, 2 and flags WALK, WALK|SWIM, WALK.
pub fn multi_area_strip_mesh() -> Result<MeshStore> {
    let mut verts = Vec::new();
    for x in 0..4 {
        verts.extend_from_slice(&[x as f32 * CELL_SIZE, 0.0, 0.0]);
        verts.extend_from_slice(&[x as f32 * CELL_SIZE, 0.0, CELL_SIZE]);
    }
    // verts laid out as pairs: 2*x = (x, 0), 2*x+1 = (x, CELL_SIZE)

    let cell = |x: u16| vec![2 * x, 2 * (x + 1), 2 * (x + 1) + 1, 2 * x + 1];

    let flags = [
        PolyFlags::WALK,
        PolyFlags::WALK | PolyFlags::SWIM,
        PolyFlags::WALK,
    ];

    let mut polys = Vec::new();
    for x in 0..3u16 {
        let mut links = Vec::new();
        if x > 0 {
            links.push(full_span_link(3, 0, x - 1));
        }
        if x < 2 {
            links.push(full_span_link(1, 0, x + 1));
        }
        polys.push(walkable_poly(cell(x), x as u8, flags[x as usize], links));
    }

    let data = MeshData {
        tiles: vec![TileData {
            bmin: [0.0, 0.0, 0.0],
            bmax: [30.0, 0.0, 10.0],
            verts,
            polys,
        }],
    };

    MeshStore::load(&data.to_bytes()?)
}

/// Two single-square tiles joined along x = 10 by cross-tile links
pub fn two_tile_mesh() -> Result<MeshStore> {
    let square = |x0: f32| {
        vec![
            x0, 0.0, 0.0, //
            x0 + 10.0, 0.0, 0.0, //
            x0 + 10.0, 0.0, 10.0, //
            x0, 0.0, 10.0,
        ]
    };

    let data = MeshData {
        tiles: vec![
            TileData {
                bmin: [0.0, 0.0, 0.0],
                bmax: [10.0, 0.0, 10.0],
                verts: square(0.0),
                polys: vec![walkable_poly(
                    vec![0, 1, 2, 3],
                    0,
                    PolyFlags::WALK,
                    vec![full_span_link(1, 1, 0)],
                )],
            },
            TileData {
                bmin: [10.0, 0.0, 0.0],
                bmax: [20.0, 0.0, 10.0],
                verts: square(10.0),
                polys: vec![walkable_poly(
                    vec![0, 1, 2, 3],
                    0,
                    PolyFlags::WALK,
                    vec![full_span_link(3, 0, 0)],
                )],
            },
        ],
    };

    MeshStore::load(&data.to_bytes()?)
}

/// Two squares separated by a gap, bridged by a two-endpoint off-mesh
/// connection from (5,0,5) to (25,0,5). Polygon 2 is the connection.
pub fn offmesh_link_mesh() -> Result<MeshStore> {
    let data = MeshData {
        tiles: vec![TileData {
            bmin: [0.0, 0.0, 0.0],
            bmax: [30.0, 0.0, 10.0],
            verts: vec![
                0.0, 0.0, 0.0, //
                10.0, 0.0, 0.0, //
                10.0, 0.0, 10.0, //
                0.0, 0.0, 10.0, //
                20.0, 0.0, 0.0, //
                30.0, 0.0, 0.0, //
                30.0, 0.0, 10.0, //
                20.0, 0.0, 10.0, //
                5.0, 0.0, 5.0, //
                25.0, 0.0, 5.0,
            ],
            polys: vec![
                walkable_poly(
                    vec![0, 1, 2, 3],
                    0,
                    PolyFlags::WALK,
                    vec![full_span_link(1, 0, 2)],
                ),
                walkable_poly(
                    vec![4, 5, 6, 7],
                    0,
                    PolyFlags::WALK,
                    vec![full_span_link(3, 0, 2)],
                ),
                PolyData {
                    verts: vec![8, 9],
                    area: 0,
                    poly_type: PolyType::OffMeshConnection,
                    flags: PolyFlags::WALK.bits(),
                    links: vec![full_span_link(0, 0, 0), full_span_link(1, 0, 1)],
                },
            ],
        }],
    };

    MeshStore::load(&data.to_bytes()?)
}
