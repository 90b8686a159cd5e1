//! 2D geometry operations on the XZ plane (Y-up coordinate system)
//!
//! Query code treats the walkable surface as roughly horizontal, so most
//! predicates project out the Y component and reason in 2D.

/// Calculate twice the signed area of a 2D triangle on the XZ plane.
///
/// The sign indicates the winding order:
/// - Positive: clockwise (when looking down the Y axis)
/// - Negative: counter-clockwise
/// - Zero: degenerate (collinear points)
#[inline]
pub fn tri_area_2d(a: &[f32; 3], b: &[f32; 3], c: &[f32; 3]) -> f32 {
    let abx = b[0] - a[0];
    let abz = b[2] - a[2];
    let acx = c[0] - a[0];
    let acz = c[2] - a[2];
    acx * abz - abx * acz
}

/// Check if a point lies inside a polygon on the XZ plane.
///
/// `verts` is a flat xyz array; `nverts` the number of polygon vertices.
/// Points exactly on an edge count as inside.
pub fn point_in_polygon_2d(p: &[f32; 3], verts: &[f32], nverts: usize) -> bool {
    let mut inside = false;
    let mut j = nverts - 1;

    for i in 0..nverts {
        let vi = &verts[i * 3..i * 3 + 3];
        let vj = &verts[j * 3..j * 3 + 3];

        if ((vi[2] > p[2]) != (vj[2] > p[2]))
            && (p[0] < (vj[0] - vi[0]) * (p[2] - vi[2]) / (vj[2] - vi[2]) + vi[0])
        {
            inside = !inside;
        }

        j = i;
    }

    inside
}

/// Squared XZ distance from a point to a segment, plus the clamped
/// parametric position of the closest point along the segment.
pub fn dist_point_segment_sqr_2d(p: &[f32; 3], a: &[f32; 3], b: &[f32; 3]) -> (f32, f32) {
    let bx = b[0] - a[0];
    let bz = b[2] - a[2];
    let dx = p[0] - a[0];
    let dz = p[2] - a[2];

    let d = bx * bx + bz * bz;
    let mut t = bx * dx + bz * dz;

    if d > 0.0 {
        t /= d;
    }
    t = t.clamp(0.0, 1.0);

    let cx = a[0] + t * bx - p[0];
    let cz = a[2] + t * bz - p[2];

    (cx * cx + cz * cz, t)
}

/// Closest point on a 3D segment to a point.
pub fn closest_point_on_segment(p: &[f32; 3], a: &[f32; 3], b: &[f32; 3]) -> [f32; 3] {
    let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let ap = [p[0] - a[0], p[1] - a[1], p[2] - a[2]];

    let ab_len_sq = ab[0] * ab[0] + ab[1] * ab[1] + ab[2] * ab[2];
    if ab_len_sq < f32::EPSILON {
        return *a;
    }

    let t = ((ap[0] * ab[0] + ap[1] * ab[1] + ap[2] * ab[2]) / ab_len_sq).clamp(0.0, 1.0);

    [a[0] + ab[0] * t, a[1] + ab[1] * t, a[2] + ab[2] * t]
}

/// Check if two axis-aligned bounding boxes overlap.
#[inline]
pub fn overlap_bounds(amin: &[f32; 3], amax: &[f32; 3], bmin: &[f32; 3], bmax: &[f32; 3]) -> bool {
    amin[0] <= bmax[0]
        && amax[0] >= bmin[0]
        && amin[1] <= bmax[1]
        && amax[1] >= bmin[1]
        && amin[2] <= bmax[2]
        && amax[2] >= bmin[2]
}
