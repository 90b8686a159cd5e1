//! Queries against a loaded mesh store
//!
//! A [`MeshQuery`] borrows a [`crate::MeshStore`] read-only and owns all
//! scratch state a search needs (node arena, open list, sampler cache).
//! Queries on the same store from different threads each use their own
//! `MeshQuery`; nothing here is shared.

use waymesh_common::{
    dist_point_segment_sqr_2d, sqr, tri_area_2d, vdist, vdist_sqr, vlerp, Error, Result,
};

use crate::filter::QueryFilter;
use crate::mesh::{Link, MeshStore, MeshTile, Poly};
use crate::node_pool::{NodePool, NodeState, OpenList};
use crate::rand::SampleRng;
use crate::{PolyRef, PolyType, StraightPathFlags};

/// Default capacity of the search node arena
const DEFAULT_MAX_NODES: usize = 4096;

/// Outcome of a corridor search. A partial corridor is a degraded but
/// usable success: the polygons from the start toward the node nearest
/// the goal that the search managed to reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathResult {
    /// The corridor reaches the end polygon
    Complete(Vec<PolyRef>),
    /// The search ran out of budget or nodes before reaching the end
    Partial(Vec<PolyRef>),
}

impl PathResult {
    /// The polygon corridor, start to reached node inclusive
    pub fn corridor(&self) -> &[PolyRef] {
        match self {
            PathResult::Complete(path) | PathResult::Partial(path) => path,
        }
    }

    /// Consumes the result, yielding the corridor
    pub fn into_corridor(self) -> Vec<PolyRef> {
        match self {
            PathResult::Complete(path) | PathResult::Partial(path) => path,
        }
    }

    /// Whether the corridor stops short of the end polygon
    pub fn is_partial(&self) -> bool {
        matches!(self, PathResult::Partial(_))
    }
}

/// One output point of the straight-path builder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StraightPathPoint {
    /// Position of the point
    pub pos: [f32; 3],
    /// Start/end/off-mesh marker; empty flags mean a normal funnel corner
    pub flags: StraightPathFlags,
    /// Polygon entered at this point (the corridor's last polygon for the
    /// end point)
    pub poly: PolyRef,
}

/// Outcome of the straight-path builder. `Truncated` carries everything
/// that fit before the output capacity ran out.
#[derive(Debug, Clone, PartialEq)]
pub enum StraightPath {
    /// The full minimal vertex sequence
    Complete(Vec<StraightPathPoint>),
    /// Capacity was reached; the sequence is a usable prefix
    Truncated(Vec<StraightPathPoint>),
}

impl StraightPath {
    /// The output points in path order
    pub fn points(&self) -> &[StraightPathPoint] {
        match self {
            StraightPath::Complete(points) | StraightPath::Truncated(points) => points,
        }
    }

    /// Whether output stopped at the capacity limit
    pub fn is_truncated(&self) -> bool {
        matches!(self, StraightPath::Truncated(_))
    }
}

/// Cached area-weighted distribution for one filter
#[derive(Debug)]
struct SampleCache {
    filter: QueryFilter,
    polys: Vec<PolyRef>,
    cumulative: Vec<f32>,
}

/// Per-caller query state over an immutable mesh store
pub struct MeshQuery<'m> {
    store: &'m MeshStore,
    pool: NodePool,
    open: OpenList,
    sample_cache: Option<SampleCache>,
}

impl<'m> MeshQuery<'m> {
    /// Creates a query with the default node arena size
    pub fn new(store: &'m MeshStore) -> Self {
        Self::with_max_nodes(store, DEFAULT_MAX_NODES)
    }

    /// Creates a query whose searches may hold at most `max_nodes` nodes.
    /// A search that outgrows the arena returns a partial corridor.
    pub fn with_max_nodes(store: &'m MeshStore, max_nodes: usize) -> Self {
        Self {
            store,
            pool: NodePool::new(max_nodes.max(2)),
            open: OpenList::new(),
            sample_cache: None,
        }
    }

    /// The mesh store this query reads from
    pub fn store(&self) -> &MeshStore {
        self.store
    }

    /// Finds the polygon nearest to `center` within the box spanned by
    /// `half_extents`, along with the closest point on it.
    ///
    /// Candidates come from the bounding-volume index in its fixed
    /// traversal order; exact distance ties keep the first candidate.
    pub fn find_nearest_poly(
        &self,
        center: &[f32; 3],
        half_extents: &[f32; 3],
        filter: &QueryFilter,
    ) -> Result<(PolyRef, [f32; 3])> {
        let bmin = [
            center[0] - half_extents[0],
            center[1] - half_extents[1],
            center[2] - half_extents[2],
        ];
        let bmax = [
            center[0] + half_extents[0],
            center[1] + half_extents[1],
            center[2] + half_extents[2],
        ];

        let mut nearest: Option<(PolyRef, [f32; 3])> = None;
        let mut nearest_dist_sqr = f32::MAX;

        for poly_ref in self.store.query_polygons(&bmin, &bmax) {
            let (_, poly) = self.store.poly_at(poly_ref)?;
            if !filter.passes(poly) {
                continue;
            }

            let (closest, _over) = self.store.closest_point_on_poly(poly_ref, center)?;
            let dist_sqr = vdist_sqr(center, &closest);

            if dist_sqr < nearest_dist_sqr {
                nearest_dist_sqr = dist_sqr;
                nearest = Some((poly_ref, closest));
            }
        }

        nearest.ok_or(Error::NoNearestPoly)
    }

    /// Searches the polygon adjacency graph for a corridor from
    /// `start_ref` to `end_ref`.
    ///
    /// Best-first search where traversing a link costs the distance
    /// between portal midpoints scaled by the destination polygon's area
    /// multiplier. `node_budget` caps how many nodes may be expanded;
    /// exhausting it (or the node arena) yields [`PathResult::Partial`]
    /// toward the most promising node seen. A drained open list without
    /// reaching the end means the graph is disjoint: [`Error::NoPathFound`].
    pub fn find_path(
        &mut self,
        start_ref: PolyRef,
        end_ref: PolyRef,
        start_pos: &[f32; 3],
        end_pos: &[f32; 3],
        filter: &QueryFilter,
        node_budget: usize,
    ) -> Result<PathResult> {
        self.store.poly_at(start_ref)?;
        self.store.poly_at(end_ref)?;

        if start_ref == end_ref {
            return Ok(PathResult::Complete(vec![start_ref]));
        }

        self.pool.clear();
        self.open.clear();

        // Scaling the straight-line estimate by the smallest multiplier in
        // the cost table keeps it a lower bound on real traversal cost.
        let h_scale = filter.min_area_cost();

        let start_idx = match self.pool.get_or_alloc(start_ref) {
            Some(idx) => idx,
            None => return Err(Error::NoPathFound),
        };
        {
            let start_h = vdist(start_pos, end_pos) * h_scale;
            let node = self.pool.get_mut(start_idx);
            node.pos = *start_pos;
            node.g = 0.0;
            node.h = start_h;
            node.total = start_h;
            node.state = NodeState::Open;
            self.open.push(start_idx, start_h, start_h);
        }

        let mut best_idx = start_idx;
        let mut best_h = self.pool.get(start_idx).h;
        let mut found = false;
        let mut out_of_resources = false;
        let mut expansions = 0usize;

        'search: while let Some(current_idx) = self.open.pop() {
            // Stale entry from a lazy priority update
            if self.pool.get(current_idx).state == NodeState::Closed {
                continue;
            }
            self.pool.get_mut(current_idx).state = NodeState::Closed;

            let current = self.pool.get(current_idx);
            let (current_poly_ref, current_pos, current_g, current_h) =
                (current.poly, current.pos, current.g, current.h);
            let parent_poly = current
                .parent
                .map(|parent_idx| self.pool.get(parent_idx).poly);

            if current_poly_ref == end_ref {
                best_idx = current_idx;
                found = true;
                break;
            }

            if current_h < best_h {
                best_h = current_h;
                best_idx = current_idx;
            }

            if expansions >= node_budget {
                out_of_resources = true;
                break;
            }
            expansions += 1;

            let (tile, poly) = self.store.poly_at(current_poly_ref)?;

            for &link in tile.links_of(poly) {
                // An empty overlap span has no traversable crossing
                if link.is_empty_span() {
                    continue;
                }
                if Some(link.target) == parent_poly {
                    continue;
                }

                let target_poly = match self.store.poly_at(link.target) {
                    Ok((_, target_poly)) => target_poly,
                    Err(_) => continue,
                };
                if !filter.passes(target_poly) {
                    continue;
                }

                let (left, right) = self.portal_toward(current_poly_ref, tile, poly, &link)?;
                let portal_mid = [
                    (left[0] + right[0]) * 0.5,
                    (left[1] + right[1]) * 0.5,
                    (left[2] + right[2]) * 0.5,
                ];

                let cost = vdist(&current_pos, &portal_mid) * filter.area_cost(target_poly.area);
                let new_g = current_g + cost;

                let neighbor_idx = match self.pool.get_or_alloc(link.target) {
                    Some(idx) => idx,
                    None => {
                        log::warn!("search node arena exhausted after {expansions} expansions");
                        out_of_resources = true;
                        break 'search;
                    }
                };

                let neighbor = self.pool.get_mut(neighbor_idx);
                if neighbor.state == NodeState::Closed {
                    continue;
                }
                if neighbor.state == NodeState::Open && new_g >= neighbor.g {
                    continue;
                }

                let h = if link.target == end_ref {
                    0.0
                } else {
                    vdist(&portal_mid, end_pos) * h_scale
                };

                neighbor.pos = portal_mid;
                neighbor.parent = Some(current_idx);
                neighbor.g = new_g;
                neighbor.h = h;
                neighbor.total = new_g + h;
                neighbor.state = NodeState::Open;
                self.open.push(neighbor_idx, new_g + h, h);
            }
        }

        if found {
            return Ok(PathResult::Complete(self.reconstruct(best_idx)));
        }

        if out_of_resources {
            log::debug!("path search stopped early after {expansions} expansions");
            return Ok(PathResult::Partial(self.reconstruct(best_idx)));
        }

        Err(Error::NoPathFound)
    }

    /// Walks parent indices back to the start and returns the corridor in
    /// travel order.
    fn reconstruct(&self, from_idx: u32) -> Vec<PolyRef> {
        let mut path = Vec::new();
        let mut current = Some(from_idx);

        while let Some(idx) = current {
            let node = self.pool.get(idx);
            path.push(node.poly);
            current = node.parent;
        }

        path.reverse();
        path
    }

    /// Turns a polygon corridor into the minimal ordered vertex sequence
    /// using the funnel algorithm.
    ///
    /// Portals between consecutive polygons are clipped to the link's
    /// overlap span. At most `max_points` points are produced; hitting the
    /// cap returns [`StraightPath::Truncated`] with the prefix instead of
    /// silently dropping vertices. A single-polygon corridor yields exactly
    /// the start and end points.
    pub fn find_straight_path(
        &self,
        start_pos: &[f32; 3],
        end_pos: &[f32; 3],
        corridor: &[PolyRef],
        max_points: usize,
    ) -> Result<StraightPath> {
        let (&first_ref, &last_ref) = match (corridor.first(), corridor.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(Error::InvalidPolyRef),
        };

        // Anchor both endpoints onto the corridor so a sloppy input
        // position cannot fold the funnel.
        let (start, _) = self.store.closest_point_on_poly(first_ref, start_pos)?;
        let (end, _) = self.store.closest_point_on_poly(last_ref, end_pos)?;

        let mut points: Vec<StraightPathPoint> = Vec::new();
        if !append_point(&mut points, start, StraightPathFlags::START, first_ref, max_points) {
            return Ok(StraightPath::Truncated(points));
        }

        if corridor.len() == 1 {
            if !append_point(&mut points, end, StraightPathFlags::END, last_ref, max_points) {
                return Ok(StraightPath::Truncated(points));
            }
            return Ok(StraightPath::Complete(points));
        }

        let mut apex = start;
        let mut left = start;
        let mut right = start;
        let mut apex_index = 0usize;
        let mut left_index = 0usize;
        let mut right_index = 0usize;
        let mut left_poly = first_ref;
        let mut right_poly = first_ref;

        let mut i = 0usize;
        while i < corridor.len() {
            let (portal_left, portal_right, entered_ref) = if i + 1 < corridor.len() {
                let (l, r) = self.portal_points(corridor[i], corridor[i + 1])?;
                (l, r, corridor[i + 1])
            } else {
                (end, end, last_ref)
            };

            if i == 0 {
                // Starting on the portal itself: nothing to funnel yet
                let (dist_sqr, _) = dist_point_segment_sqr_2d(&apex, &portal_left, &portal_right);
                if dist_sqr < sqr(0.001) {
                    i += 1;
                    continue;
                }
            }

            // Right side of the funnel
            if tri_area_2d(&apex, &right, &portal_right) <= 0.0 {
                if vequal_2d(&apex, &right) || tri_area_2d(&apex, &left, &portal_right) > 0.0 {
                    right = portal_right;
                    right_poly = entered_ref;
                    right_index = i;
                } else {
                    // Right crossed over left: emit the left corner and
                    // restart the funnel from it
                    if !append_point(
                        &mut points,
                        left,
                        self.corner_flags(left_poly),
                        left_poly,
                        max_points,
                    ) {
                        return Ok(StraightPath::Truncated(points));
                    }

                    apex = left;
                    apex_index = left_index;
                    left = apex;
                    right = apex;
                    left_index = apex_index;
                    right_index = apex_index;
                    i = apex_index + 1;
                    continue;
                }
            }

            // Left side of the funnel
            if tri_area_2d(&apex, &left, &portal_left) >= 0.0 {
                if vequal_2d(&apex, &left) || tri_area_2d(&apex, &right, &portal_left) < 0.0 {
                    left = portal_left;
                    left_poly = entered_ref;
                    left_index = i;
                } else {
                    if !append_point(
                        &mut points,
                        right,
                        self.corner_flags(right_poly),
                        right_poly,
                        max_points,
                    ) {
                        return Ok(StraightPath::Truncated(points));
                    }

                    apex = right;
                    apex_index = right_index;
                    left = apex;
                    right = apex;
                    left_index = apex_index;
                    right_index = apex_index;
                    i = apex_index + 1;
                    continue;
                }
            }

            i += 1;
        }

        if !append_point(&mut points, end, StraightPathFlags::END, last_ref, max_points) {
            return Ok(StraightPath::Truncated(points));
        }

        Ok(StraightPath::Complete(points))
    }

    /// Off-mesh connection corners carry their marker flag; ordinary
    /// funnel corners carry none.
    fn corner_flags(&self, poly_ref: PolyRef) -> StraightPathFlags {
        match self.store.poly_at(poly_ref) {
            Ok((_, poly)) if poly.poly_type == PolyType::OffMeshConnection => {
                StraightPathFlags::OFFMESH_CONNECTION
            }
            _ => StraightPathFlags::empty(),
        }
    }

    /// Portal segment crossed when moving from `from` to `to`.
    ///
    /// Returns (left, right) endpoints as seen in travel direction. Fails
    /// when the polygons share no traversable link.
    pub fn portal_points(&self, from: PolyRef, to: PolyRef) -> Result<([f32; 3], [f32; 3])> {
        let (tile, poly) = self.store.poly_at(from)?;

        let link = tile
            .links_of(poly)
            .iter()
            .find(|link| link.target == to && !link.is_empty_span())
            .ok_or(Error::NoPathFound)?;

        self.portal_toward(from, tile, poly, link)
    }

    /// Portal for a specific link out of a polygon. For off-mesh
    /// connections on either side the portal collapses to the connection
    /// endpoint, making the jump a discrete point pair in the output.
    fn portal_toward(
        &self,
        from: PolyRef,
        tile: &MeshTile,
        poly: &Poly,
        link: &Link,
    ) -> Result<([f32; 3], [f32; 3])> {
        if poly.poly_type == PolyType::OffMeshConnection {
            let pos = tile.vertex(poly.verts[link.edge as usize]);
            return Ok((pos, pos));
        }

        let (target_tile, target_poly) = self.store.poly_at(link.target)?;
        if target_poly.poly_type == PolyType::OffMeshConnection {
            // The connection's own back link names which endpoint attaches
            // to this polygon.
            let back = target_tile
                .links_of(target_poly)
                .iter()
                .find(|back| back.target == from)
                .ok_or(Error::NoPathFound)?;

            let pos = target_tile.vertex(target_poly.verts[back.edge as usize]);
            return Ok((pos, pos));
        }

        let edge = link.edge as usize;
        let vert_count = poly.vert_count as usize;
        let v_from = tile.vertex(poly.verts[edge]);
        let v_to = tile.vertex(poly.verts[(edge + 1) % vert_count]);

        // Polygons wind counter-clockwise on the XZ plane, so the edge's
        // second vertex is the left portal endpoint in travel direction.
        // Clip to the link's overlap span along the edge.
        let t_min = link.span_min as f32 / 255.0;
        let t_max = link.span_max as f32 / 255.0;

        let right = vlerp(&v_from, &v_to, t_min);
        let left = vlerp(&v_from, &v_to, t_max);

        Ok((left, right))
    }

    /// Picks a uniformly distributed walkable point.
    ///
    /// Polygons satisfying the filter are weighted by surface area through
    /// a cumulative table (cached per filter); within the chosen polygon a
    /// fan triangle is picked by its own area and sampled via folded
    /// barycentric coordinates. The caller-supplied [`SampleRng`] makes
    /// results reproducible per seed.
    pub fn find_random_point(
        &mut self,
        filter: &QueryFilter,
        rng: &mut SampleRng,
    ) -> Result<(PolyRef, [f32; 3])> {
        let needs_rebuild = self
            .sample_cache
            .as_ref()
            .map(|cache| &cache.filter != filter)
            .unwrap_or(true);

        if needs_rebuild {
            self.sample_cache = Some(self.build_sample_cache(filter));
        }

        let cache = self
            .sample_cache
            .as_ref()
            .ok_or(Error::NoRandomPoint)?;

        let total = cache.cumulative.last().copied().unwrap_or(0.0);
        if total <= 0.0 {
            return Err(Error::NoRandomPoint);
        }

        let pick = rng.next_f32() * total;
        let slot = cache
            .cumulative
            .partition_point(|&bound| bound <= pick)
            .min(cache.polys.len() - 1);
        let poly_ref = cache.polys[slot];

        let point = self.random_point_in_poly(poly_ref, rng)?;
        Ok((poly_ref, point))
    }

    fn build_sample_cache(&self, filter: &QueryFilter) -> SampleCache {
        let mut polys = Vec::new();
        let mut cumulative = Vec::new();
        let mut running = 0.0f32;

        for poly_ref in self.store.poly_refs() {
            let Ok((tile, poly)) = self.store.poly_at(poly_ref) else {
                continue;
            };
            if poly.poly_type == PolyType::OffMeshConnection || !filter.passes(poly) {
                continue;
            }

            let area = self.store.poly_area(tile, poly);
            if area <= 0.0 {
                continue;
            }

            running += area;
            polys.push(poly_ref);
            cumulative.push(running);
        }

        SampleCache {
            filter: filter.clone(),
            polys,
            cumulative,
        }
    }

    /// Uniform point inside a polygon: fan triangle by area, then folded
    /// barycentric coordinates inside it.
    fn random_point_in_poly(&self, poly_ref: PolyRef, rng: &mut SampleRng) -> Result<[f32; 3]> {
        let (tile, poly) = self.store.poly_at(poly_ref)?;
        let vert_count = poly.vert_count as usize;

        let v0 = tile.vertex(poly.verts[0]);
        let total_area = self.store.poly_area(tile, poly);

        let pick = rng.next_f32() * total_area;
        let mut running = 0.0f32;
        let mut tri = 1usize;

        for i in 1..vert_count - 1 {
            let v1 = tile.vertex(poly.verts[i]);
            let v2 = tile.vertex(poly.verts[i + 1]);
            running += waymesh_common::triangle_area(&v0.into(), &v1.into(), &v2.into());
            tri = i;
            if running > pick {
                break;
            }
        }

        let v1 = tile.vertex(poly.verts[tri]);
        let v2 = tile.vertex(poly.verts[tri + 1]);

        let r1 = rng.next_f32();
        let r2 = rng.next_f32();
        let s = r1.sqrt();
        let u = 1.0 - s;
        let v = r2 * s;
        let w = 1.0 - u - v;

        Ok([
            v0[0] * u + v1[0] * v + v2[0] * w,
            v0[1] * u + v1[1] * v + v2[1] * w,
            v0[2] * u + v1[2] * v + v2[2] * w,
        ])
    }
}

/// Appends a point unless capacity is reached, merging consecutive
/// duplicates so a corner coinciding with the end point keeps the
/// stronger flags. Returns false when the cap is hit.
fn append_point(
    points: &mut Vec<StraightPathPoint>,
    pos: [f32; 3],
    flags: StraightPathFlags,
    poly: PolyRef,
    max_points: usize,
) -> bool {
    if let Some(last) = points.last_mut() {
        if last.pos == pos {
            last.flags = flags;
            last.poly = poly;
            return true;
        }
    }

    if points.len() >= max_points {
        return false;
    }

    points.push(StraightPathPoint { pos, flags, poly });
    true
}

/// Positions closer than a millimeter on the XZ plane count as equal
/// for funnel bookkeeping.
fn vequal_2d(a: &[f32; 3], b: &[f32; 3]) -> bool {
    let dx = a[0] - b[0];
    let dz = a[2] - b[2];
    dx * dx + dz * dz < sqr(0.001)
}
