//! CLI for querying waymesh navigation mesh blobs

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use waymesh::binary_format::{LinkData, MeshData, PolyData, TileData};
use waymesh::{MeshQuery, MeshStore, PolyFlags, PolyType, QueryFilter, SampleRng};

/// Query engine for precomputed navigation meshes
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a demo mesh blob (an n-by-n grid of walkable squares)
    Demo {
        /// Output blob path
        #[clap(long)]
        output: PathBuf,

        /// Grid dimension
        #[clap(long, default_value_t = 8)]
        size: usize,
    },

    /// Print summary information about a mesh blob
    Info {
        /// Mesh blob path
        mesh: PathBuf,
    },

    /// Find the polygon nearest to a position
    Nearest {
        /// Mesh blob path
        mesh: PathBuf,

        /// Query position as x,y,z
        #[clap(long, value_parser = parse_point)]
        position: [f32; 3],

        /// Search half-extents as x,y,z
        #[clap(long, value_parser = parse_point, default_value = "2,4,2")]
        extents: [f32; 3],
    },

    /// Find a corridor and its straight path between two positions
    Path {
        /// Mesh blob path
        mesh: PathBuf,

        /// Start position as x,y,z
        #[clap(long, value_parser = parse_point)]
        start: [f32; 3],

        /// End position as x,y,z
        #[clap(long, value_parser = parse_point)]
        end: [f32; 3],

        /// Search half-extents as x,y,z
        #[clap(long, value_parser = parse_point, default_value = "2,4,2")]
        extents: [f32; 3],

        /// Maximum nodes the search may expand
        #[clap(long, default_value_t = 2048)]
        node_budget: usize,

        /// Maximum straight-path points to emit
        #[clap(long, default_value_t = 256)]
        max_points: usize,
    },

    /// Sample random walkable points
    Random {
        /// Mesh blob path
        mesh: PathBuf,

        /// Random seed
        #[clap(long, default_value_t = 1)]
        seed: u32,

        /// Number of points to sample
        #[clap(long, default_value_t = 1)]
        count: usize,
    },
}

fn parse_point(raw: &str) -> std::result::Result<[f32; 3], String> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected x,y,z but got '{raw}'"));
    }

    let mut point = [0.0f32; 3];
    for (slot, part) in point.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse()
            .map_err(|_| format!("invalid coordinate '{part}'"))?;
    }
    Ok(point)
}

fn load_store(path: &PathBuf) -> Result<MeshStore> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    MeshStore::load(&bytes).with_context(|| format!("loading mesh from {}", path.display()))
}

/// Builds the demo grid the same way authoring pipelines would: explicit
/// polygons with full-span links on every interior edge.
fn demo_grid(n: usize) -> MeshData {
    const CELL: f32 = 10.0;
    let stride = n + 1;

    let mut verts = Vec::with_capacity(stride * stride * 3);
    for z in 0..stride {
        for x in 0..stride {
            verts.extend_from_slice(&[x as f32 * CELL, 0.0, z as f32 * CELL]);
        }
    }

    let vidx = |x: usize, z: usize| (z * stride + x) as u16;
    let pidx = |x: usize, z: usize| (z * n + x) as u16;

    let mut polys = Vec::with_capacity(n * n);
    for cz in 0..n {
        for cx in 0..n {
            let mut links = Vec::new();
            let mut link = |edge: u8, poly: u16| {
                links.push(LinkData {
                    edge,
                    target_tile: 0,
                    target_poly: poly,
                    span_min: 0,
                    span_max: 255,
                });
            };

            if cz > 0 {
                link(0, pidx(cx, cz - 1));
            }
            if cx + 1 < n {
                link(1, pidx(cx + 1, cz));
            }
            if cz + 1 < n {
                link(2, pidx(cx, cz + 1));
            }
            if cx > 0 {
                link(3, pidx(cx - 1, cz));
            }

            polys.push(PolyData {
                verts: vec![
                    vidx(cx, cz),
                    vidx(cx + 1, cz),
                    vidx(cx + 1, cz + 1),
                    vidx(cx, cz + 1),
                ],
                area: 0,
                poly_type: PolyType::Ground,
                flags: PolyFlags::WALK.bits(),
                links,
            });
        }
    }

    let extent = n as f32 * CELL;
    MeshData {
        tiles: vec![TileData {
            bmin: [0.0, 0.0, 0.0],
            bmax: [extent, 0.0, extent],
            verts,
            polys,
        }],
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Demo { output, size } => {
            anyhow::ensure!(size > 0, "grid size must be at least 1");
            let bytes = demo_grid(size).to_bytes()?;
            fs::write(&output, &bytes)
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "wrote {} ({} polygons, {} bytes)",
                output.display(),
                size * size,
                bytes.len()
            );
        }

        Commands::Info { mesh } => {
            let store = load_store(&mesh)?;
            println!("tiles:    {}", store.tile_count());
            println!("polygons: {}", store.poly_count());
            for idx in 0..store.tile_count() {
                if let Some(tile) = store.tile(idx) {
                    println!(
                        "tile {idx}: {} polys, {} links, bounds {:?} .. {:?}",
                        tile.polys.len(),
                        tile.links.len(),
                        tile.bmin,
                        tile.bmax
                    );
                }
            }
        }

        Commands::Nearest {
            mesh,
            position,
            extents,
        } => {
            let store = load_store(&mesh)?;
            let query = MeshQuery::new(&store);

            let (poly_ref, point) = query
                .find_nearest_poly(&position, &extents, &QueryFilter::default())
                .context("no polygon near position")?;
            println!(
                "poly {:#010x} at ({:.3}, {:.3}, {:.3})",
                poly_ref.id(),
                point[0],
                point[1],
                point[2]
            );
        }

        Commands::Path {
            mesh,
            start,
            end,
            extents,
            node_budget,
            max_points,
        } => {
            let store = load_store(&mesh)?;
            let mut query = MeshQuery::new(&store);
            let filter = QueryFilter::default();

            let (start_ref, start_pt) = query
                .find_nearest_poly(&start, &extents, &filter)
                .context("no polygon near start")?;
            let (end_ref, end_pt) = query
                .find_nearest_poly(&end, &extents, &filter)
                .context("no polygon near end")?;

            let result = query
                .find_path(start_ref, end_ref, &start_pt, &end_pt, &filter, node_budget)
                .context("path search failed")?;
            if result.is_partial() {
                log::warn!("corridor is partial; raise --node-budget to search further");
            }
            println!("corridor: {} polygons", result.corridor().len());

            let straight =
                query.find_straight_path(&start_pt, &end_pt, result.corridor(), max_points)?;
            if straight.is_truncated() {
                log::warn!("straight path truncated at {max_points} points");
            }
            for point in straight.points() {
                println!(
                    "({:.3}, {:.3}, {:.3}) {:?}",
                    point.pos[0], point.pos[1], point.pos[2], point.flags
                );
            }
        }

        Commands::Random { mesh, seed, count } => {
            let store = load_store(&mesh)?;
            let mut query = MeshQuery::new(&store);
            let mut rng = SampleRng::from_seed(seed);

            for _ in 0..count {
                let (poly_ref, point) = query
                    .find_random_point(&QueryFilter::default(), &mut rng)
                    .context("no walkable polygon to sample")?;
                println!(
                    "poly {:#010x} at ({:.3}, {:.3}, {:.3})",
                    poly_ref.id(),
                    point[0],
                    point[1],
                    point[2]
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("1,2,3").unwrap(), [1.0, 2.0, 3.0]);
        assert_eq!(parse_point(" 1.5, -2 , 0 ").unwrap(), [1.5, -2.0, 0.0]);
        assert!(parse_point("1,2").is_err());
        assert!(parse_point("a,b,c").is_err());
    }

    #[test]
    fn test_demo_grid_loads() {
        let bytes = demo_grid(4).to_bytes().unwrap();
        let store = MeshStore::load(&bytes).unwrap();
        assert_eq!(store.poly_count(), 16);
    }
}
