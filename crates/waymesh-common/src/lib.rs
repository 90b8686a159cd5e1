//! Common utilities shared across the waymesh workspace

mod geometry;
mod math;

pub use geometry::*;
pub use math::*;

/// Represents a 3D position
pub type Vec3 = glam::Vec3;

/// Error types for the library
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The mesh blob was rejected before any store was produced.
    #[error("invalid mesh data: {0}")]
    InvalidMesh(String),

    /// A polygon reference was stale or out of range.
    #[error("invalid polygon reference")]
    InvalidPolyRef,

    /// No polygon satisfied the filter within the search extents.
    #[error("no polygon found near query point")]
    NoNearestPoly,

    /// The polygon graph has no connection between start and end.
    #[error("no path between start and end polygons")]
    NoPathFound,

    /// No polygon satisfies the filter, so nothing can be sampled.
    #[error("no random point available for filter")]
    NoRandomPoint,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for waymesh operations
pub type Result<T> = std::result::Result<T, Error>;
