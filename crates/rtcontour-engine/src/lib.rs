//! rtcontour-engine: Mask to polygon contour engine (sans-IO).
//!
//! Converts binary pixel masks into vector polygons and back:
//! boundary tracing with nested holes -> smoothing -> hole merging ->
//! scanline rasterization. A flood-fill hole detector gives an independent
//! route from mask to filled mask for cross-checking the round trip.
//!
//! This crate has **no I/O** -- it operates on in-memory grids and
//! returns structured data. Image files are read by `rtcontour-bench`.

pub mod diagnostics;
pub mod fill;
pub mod geometry;
pub mod grid;
pub mod slices;
pub mod smooth;
pub mod trace;
pub mod types;

pub use geometry::{BoundingBox, FloatPoint, IntPoint};
pub use grid::{Dims, Grid};
pub use smooth::{RimSmoother, SmoothingKind};
pub use types::{
    ContourConfig, ContourError, ContourRim, ErrorKind, NestedContour, PointPosition, Polarity,
    SmoothedPolygon, VoxelCounts,
};

/// Convert slice 0 of a binary mask into merged polygons.
///
/// Traces with the configured nesting levels, then smooths every rim and
/// merges each hole into its parent, giving one polygon per top-level
/// structure in scan order.
///
/// # Errors
///
/// Returns [`ContourError::InvalidConfig`] for an invalid configuration,
/// [`ContourError::NonBinaryMask`] for a non-binary mask, and any
/// geometry error raised while merging.
pub fn mask_to_polygons(
    mask: &Grid<u8>,
    config: &ContourConfig,
) -> Result<Vec<SmoothedPolygon>, ContourError> {
    let contours = trace::trace_with_config(mask, config)?;
    smooth::smooth_and_merge_all(&contours, config.smoothing)
}

/// Rasterize polygons into a new single-slice mask of the given size.
#[must_use]
pub fn polygons_to_mask(polygons: &[SmoothedPolygon], width: usize, height: usize) -> Grid<u8> {
    let mut mask = Grid::new_2d(width, height);
    fill::fill_all(polygons, &mut mask, 1);
    mask
}
